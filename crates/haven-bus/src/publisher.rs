//! Command publish path back to the devices.

use async_trait::async_trait;
use haven_core::classify::TOPIC_DISPLAY;
use haven_core::{CommandError, CommandGateway};
use haven_protocol::DisplayCommand;
use rumqttc::{AsyncClient, QoS};
use tracing::debug;

/// [`CommandGateway`] backed by the shared MQTT client.
///
/// Cloneable; clones share the underlying session.
#[derive(Clone)]
pub struct MqttCommandGateway {
    client: AsyncClient,
}

impl MqttCommandGateway {
    /// Wrap an MQTT client.
    #[must_use]
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommandGateway for MqttCommandGateway {
    async fn publish_display(&self, command: &DisplayCommand) -> Result<(), CommandError> {
        let payload = serde_json::to_vec(command)
            .map_err(|e| CommandError::PublishFailed(e.to_string()))?;

        self.client
            .publish(TOPIC_DISPLAY, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| CommandError::PublishFailed(e.to_string()))?;

        debug!(topic = TOPIC_DISPLAY, msg = %command.msg, "Published display command");
        Ok(())
    }
}
