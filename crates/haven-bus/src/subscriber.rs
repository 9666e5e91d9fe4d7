//! Bus ingest: the subscription loop from the broker into the router.

use crate::publisher::MqttCommandGateway;
use haven_core::classify::CONSUMED_TOPICS;
use haven_core::{EventRouter, RawMessage};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bus connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Broker host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// MQTT keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Capacity of the client request channel.
    #[serde(default = "default_capacity")]
    pub channel_capacity: usize,

    /// Delay before retrying after a connection error, in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "haven-server".to_string()
}

fn default_keep_alive() -> u64 {
    30
}

fn default_capacity() -> usize {
    100
}

fn default_reconnect_delay() -> u64 {
    3_000
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive(),
            channel_capacity: default_capacity(),
            reconnect_delay_ms: default_reconnect_delay(),
        }
    }
}

/// An open connection to the bus.
///
/// The connection is lazy: the broker is first reached once the ingest
/// loop starts polling. The publish side shares the same client, so a
/// single session carries both directions.
pub struct Bus {
    client: AsyncClient,
    event_loop: EventLoop,
    reconnect_delay: Duration,
}

impl Bus {
    /// Build the client and event loop for the configured broker.
    #[must_use]
    pub fn connect(config: &BusConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity);

        Self {
            client,
            event_loop,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        }
    }

    /// The publish-side gateway sharing this connection.
    #[must_use]
    pub fn command_gateway(&self) -> MqttCommandGateway {
        MqttCommandGateway::new(self.client.clone())
    }

    /// Spawn the ingest loop, consuming the connection.
    ///
    /// The returned handle is the cancellation point for the
    /// subscription; dropping it does not stop the loop.
    #[must_use]
    pub fn spawn_ingest(self, router: Arc<EventRouter>) -> BusSubscription {
        let token = CancellationToken::new();
        let task = tokio::spawn(run_ingest(
            self.client,
            self.event_loop,
            router,
            self.reconnect_delay,
            token.clone(),
        ));

        BusSubscription { token, task }
    }
}

/// A running bus subscription.
pub struct BusSubscription {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl BusSubscription {
    /// Cancel the subscription and wait for the ingest loop to stop.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Bus ingest task ended abnormally");
        }
    }
}

/// Poll the broker event loop until cancelled.
///
/// Subscriptions are (re)issued on every `ConnAck`, so a broker reconnect
/// restores the full topic set without extra bookkeeping.
async fn run_ingest(
    client: AsyncClient,
    mut event_loop: EventLoop,
    router: Arc<EventRouter>,
    reconnect_delay: Duration,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("Bus ingest cancelled");
                let _ = client.disconnect().await;
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to bus broker");
                    for topic in CONSUMED_TOPICS {
                        if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                            warn!(topic, error = %e, "Subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(_))) => {
                    debug!("Subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let msg = RawMessage::new(publish.topic.clone(), publish.payload.clone());
                    router.on_message(&msg);
                }
                Ok(_) => {
                    // Outgoing packets, pings.
                }
                Err(e) => {
                    warn!(error = %e, "Bus connection error; retrying");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_delay) => {}
                    }
                }
            }
        }
    }

    info!("Bus ingest stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 1883);
        assert_eq!(config.keep_alive_secs, 30);
    }

    #[test]
    fn test_config_from_toml() {
        let config: BusConfig = toml::from_str(
            r#"
            host = "broker.lan"
            port = 8883
        "#,
        )
        .unwrap();

        assert_eq!(config.host, "broker.lan");
        assert_eq!(config.port, 8883);
        // Unspecified fields keep their defaults.
        assert_eq!(config.client_id, "haven-server");
        assert_eq!(config.reconnect_delay_ms, 3_000);
    }
}
