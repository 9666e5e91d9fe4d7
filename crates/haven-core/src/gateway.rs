//! Gateway seams to the persistence store and the device command path.
//!
//! The router depends only on these traits; concrete implementations live
//! in `haven-store` (PostgreSQL) and `haven-bus` (MQTT publish). Tests
//! inject stubs.

use crate::event::{CommunicationEvent, EnvironmentalReading};
use async_trait::async_trait;
use haven_protocol::DisplayCommand;
use thiserror::Error;

/// Persistence failures.
///
/// The router logs these and continues: persistence is best-effort
/// relative to the real-time path and never a precondition for broadcast
/// or command publish.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The store could not be reached or no connection was available.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the write.
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Command publish failures, logged and swallowed by the router.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The bus publish did not go through.
    #[error("Bus publish failed: {0}")]
    PublishFailed(String),
}

/// Narrow write surface over the durable store: two single-row appends
/// and a health probe. No update or delete operations exist.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Append one communication audit row.
    async fn append_communication(
        &self,
        event: &CommunicationEvent,
    ) -> Result<(), PersistenceError>;

    /// Append one environmental reading row.
    async fn append_reading(
        &self,
        reading: &EnvironmentalReading,
    ) -> Result<(), PersistenceError>;

    /// Whether the store currently accepts writes.
    async fn health_check(&self) -> bool;
}

/// Publish path back to a device.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Publish a display command to the bedside unit.
    async fn publish_display(&self, command: &DisplayCommand) -> Result<(), CommandError>;
}
