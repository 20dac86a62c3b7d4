//! # Broker Module
//!
//! - `client`: the `BrokerClient` trait every operation in this crate talks
//!   through (paged listing, publish with confirmation, streaming pull).
//! - `emulator`: `InMemoryBroker`, an in-process implementation used by the
//!   CLI and the tests.

pub mod client;
pub mod emulator;

pub use self::client::{BrokerClient, DeliveryHandler, Page, PublishFuture};
pub use self::emulator::InMemoryBroker;
