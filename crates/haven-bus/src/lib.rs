//! # haven-bus
//!
//! MQTT bus adapter for the Haven home-safety bridge.
//!
//! Bridges the device-facing bus to the routing core in both directions:
//! an ingest subscription forwards inbound publishes to the
//! [`EventRouter`](haven_core::EventRouter), and the publish path carries
//! display commands back to the bedside unit.
//!
//! The transport contract toward the core is deliberately thin: topics
//! plus payload bytes, in arrival order per topic, at-least-once. QoS
//! negotiation, session state, and reconnect backoff stay inside this
//! crate.

mod publisher;
mod subscriber;

pub use publisher::MqttCommandGateway;
pub use subscriber::{Bus, BusConfig, BusSubscription};
