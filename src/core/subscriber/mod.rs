//! Subscription side: deliveries, acknowledgement, and the bounded consumer.

pub mod consumer;
pub mod delivery;

pub use consumer::{BoundedConsumer, Completed, DeliveryCounter, Tally};
pub use delivery::{AckHandle, AckOutcome, Delivery};
