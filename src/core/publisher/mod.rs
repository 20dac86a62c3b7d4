//! Publishing with broker confirmation.
//!
//! Provides the `Publisher`, which submits one message and waits for its id.

#[allow(clippy::module_inception)]
pub mod publisher;

pub use publisher::Publisher;
