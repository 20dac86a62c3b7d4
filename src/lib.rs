//! blipsub – a small client for a managed publish/subscribe service.
//!
//! This crate exports
//!  * `core`   – messages, catalog listing, publishing, bounded consumption
//!  * `broker` – the `BrokerClient` seam and an in-memory broker behind it
//!  * `config` – TOML + environment runtime configuration
//!  * `app`    – the orchestrator the `blipsub` binary drives
//!
//! The consumer is the interesting part: deliveries are handled on many
//! workers at once, and a single lock-guarded counter decides the one
//! delivery that asks the transport to stop.

// ───────────────────────────────────────────────────────────
// Public modules
// ───────────────────────────────────────────────────────────
pub mod app;
pub mod broker;
pub mod config;
pub mod core;
pub mod logging;

// ───────────────────────────────────────────────────────────
// Re-exports
// ───────────────────────────────────────────────────────────
pub use app::{Orchestrator, RunSummary};
pub use broker::{BrokerClient, InMemoryBroker};
pub use config::Config;
pub use self::core::error::{PubSubError, TransportError};
