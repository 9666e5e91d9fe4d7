//! # haven-store
//!
//! PostgreSQL persistence for the Haven home-safety bridge.
//!
//! Implements the core's [`PersistenceGateway`](haven_core::PersistenceGateway)
//! as two single-row appends over a pooled connection, wrapped in a
//! bounded retry/backoff policy. The store is a best-effort collaborator:
//! callers log failures and keep serving the real-time path.

mod client;
mod gateway;
mod retry;

pub use client::{StoreClient, StoreConfig};
pub use gateway::PostgresPersistenceGateway;
pub use retry::RetryPolicy;
