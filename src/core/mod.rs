pub mod cancel;
pub mod catalog;
pub mod error;
pub mod message;
pub mod publisher;
pub mod subscriber;
