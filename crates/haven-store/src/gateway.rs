//! PostgreSQL persistence gateway.
//!
//! Two single-row appends and a health probe over the pooled client.
//! Row shapes follow the store schema: `commu (time, emerg, msg)` and
//! `heat (time, temp, hum, wbgt)`.

use crate::client::StoreClient;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::Utc;
use haven_core::{CommunicationEvent, EnvironmentalReading, PersistenceError, PersistenceGateway};
use tokio_postgres::types::ToSql;
use tracing::debug;

/// [`PersistenceGateway`] backed by PostgreSQL.
pub struct PostgresPersistenceGateway {
    client: StoreClient,
    retry: RetryPolicy,
}

impl PostgresPersistenceGateway {
    /// Wrap a pooled client with the given retry policy.
    #[must_use]
    pub fn new(client: StoreClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// Run one append statement with retry. The connection is acquired
    /// per attempt and returned to the pool when the attempt ends, even
    /// on failure.
    async fn append(
        &self,
        label: &'static str,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<(), PersistenceError> {
        self.retry
            .run(label, || async move {
                let conn = self
                    .client
                    .get()
                    .await
                    .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;

                conn.execute(statement, params)
                    .await
                    .map_err(|e| PersistenceError::Rejected(e.to_string()))?;

                Ok(())
            })
            .await
    }
}

#[async_trait]
impl PersistenceGateway for PostgresPersistenceGateway {
    async fn append_communication(
        &self,
        event: &CommunicationEvent,
    ) -> Result<(), PersistenceError> {
        let recorded_at = Utc::now();
        self.append(
            "append_communication",
            "INSERT INTO commu (time, emerg, msg) VALUES ($1, $2, $3)",
            &[&recorded_at, &event.is_emergency, &event.message],
        )
        .await?;

        debug!(emergency = event.is_emergency, "Appended communication row");
        Ok(())
    }

    async fn append_reading(
        &self,
        reading: &EnvironmentalReading,
    ) -> Result<(), PersistenceError> {
        let recorded_at = Utc::now();
        self.append(
            "append_reading",
            "INSERT INTO heat (time, temp, hum, wbgt) VALUES ($1, $2, $3, $4)",
            &[
                &recorded_at,
                &reading.temperature_c,
                &reading.humidity_pct,
                &reading.heat_index_c,
            ],
        )
        .await?;

        debug!(temp = reading.temperature_c, "Appended environmental reading");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        self.client.ping().await.is_ok()
    }
}
