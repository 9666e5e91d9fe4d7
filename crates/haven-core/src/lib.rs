//! # haven-core
//!
//! Event model, classification, and routing core for the Haven
//! home-safety bridge.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Classifier** - fixed topic table mapping bus topics to event kinds
//!   and routing policies
//! - **Heat** - wet-bulb-weighted heat-stress metric
//! - **ObserverHub** - the set of connected observers and broadcast fan-out
//! - **EventRouter** - ingest, dispatch, persistence queue, and the
//!   observer command path
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Bus adapter│────▶│ EventRouter │────▶│ ObserverHub │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                        │        │
//!                        ▼        ▼
//!                 ┌───────────┐ ┌───────────┐
//!                 │Persistence│ │  Command  │
//!                 │  Gateway  │ │  Gateway  │
//!                 └───────────┘ └───────────┘
//! ```

pub mod classify;
pub mod event;
pub mod gateway;
pub mod heat;
pub mod hub;
pub mod router;

pub use classify::{classify, BroadcastClass, PersistAction, RoutingPolicy};
pub use event::{
    CommunicationEvent, DecodeError, DecodedEvent, EnvironmentalReading, EventKind, RawMessage,
};
pub use gateway::{CommandError, CommandGateway, PersistenceError, PersistenceGateway};
pub use heat::{heat_stress_index, HeatIndex};
pub use hub::{ObserverHub, ObserverId};
pub use router::{EventRouter, RouterConfig};
