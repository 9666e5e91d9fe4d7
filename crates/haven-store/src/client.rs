//! PostgreSQL client wrapper with connection pooling.

use crate::retry::RetryPolicy;
use anyhow::Result;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use serde::{Deserialize, Serialize};
use tokio_postgres::NoTls;
use tracing::debug;

/// Store connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Database port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Database name.
    #[serde(default = "default_dbname")]
    pub dbname: String,

    /// Database user.
    #[serde(default = "default_user")]
    pub user: String,

    /// Database password.
    #[serde(default)]
    pub password: String,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Retry policy for transient write failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_dbname() -> String {
    "haven".to_string()
}

fn default_user() -> String {
    "haven".to_string()
}

fn default_pool_size() -> usize {
    8
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dbname: default_dbname(),
            user: default_user(),
            password: String::new(),
            pool_size: default_pool_size(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Pooled store client.
///
/// Connections are acquired per write and returned to the pool on drop,
/// so a failed write cannot leak one.
#[derive(Clone)]
pub struct StoreClient {
    pool: Pool,
}

impl StoreClient {
    /// Create a pooled client.
    ///
    /// Does not touch the database; use [`StoreClient::ping`] to verify
    /// connectivity.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be constructed.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let mut cfg = PoolConfig::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.dbname.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;
        pool.resize(config.pool_size);

        Ok(Self { pool })
    }

    /// Round-trip to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if no connection can be acquired or the probe
    /// query fails.
    pub async fn ping(&self) -> Result<()> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        debug!("Store connection verified");
        Ok(())
    }

    /// Acquire a connection from the pool.
    pub(crate) async fn get(&self) -> Result<deadpool_postgres::Client> {
        Ok(self.pool.get().await?)
    }
}
