//! The event router: ingest, classify, compute, dispatch.
//!
//! One `EventRouter` owns the pipeline from raw bus message to dispatch
//! decision. Its collaborators are injected at construction so the routing
//! logic can be exercised with stub gateways.
//!
//! Delivery policy: urgent events (falls, help requests) are broadcast to
//! observers before their persistence write is enqueued, and every
//! persistence write is fire-and-forget through a bounded queue. A stalled
//! store can delay or drop a durable row; it can never delay a broadcast.

use crate::classify::{classify, BroadcastClass, PersistAction};
use crate::event::{
    CommunicationEvent, DecodedEvent, EnvironmentalReading, EventKind, RawMessage,
};
use crate::gateway::{CommandGateway, PersistenceGateway};
use crate::heat::heat_stress_index;
use crate::hub::ObserverHub;
use haven_protocol::{AlertKind, DisplayCommand, ServerFrame};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Capacity of the persistence write queue. When the queue is full,
    /// writes are dropped with a warning rather than blocking ingestion.
    pub write_queue_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            write_queue_capacity: 256,
        }
    }
}

/// A queued persistence write.
#[derive(Debug)]
enum WriteJob {
    Communication(CommunicationEvent),
    Reading(EnvironmentalReading),
}

/// The core orchestrator between the bus, the observers, and the store.
pub struct EventRouter {
    hub: Arc<ObserverHub>,
    commands: Arc<dyn CommandGateway>,
    /// Taken at shutdown to close the write queue.
    write_tx: Mutex<Option<mpsc::Sender<WriteJob>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl EventRouter {
    /// Create a router with injected collaborators and spawn its write
    /// worker. Must be called within a Tokio runtime.
    #[must_use]
    pub fn new(
        hub: Arc<ObserverHub>,
        persistence: Arc<dyn PersistenceGateway>,
        commands: Arc<dyn CommandGateway>,
        config: RouterConfig,
    ) -> Self {
        let (write_tx, write_rx) = mpsc::channel(config.write_queue_capacity);
        let writer = tokio::spawn(run_write_worker(write_rx, persistence));

        Self {
            hub,
            commands,
            write_tx: Mutex::new(Some(write_tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Handle one inbound bus message.
    ///
    /// Never fails toward the caller: malformed payloads and unrecognized
    /// topics are logged and dropped without side effects. A re-delivered
    /// message is processed again in full: the bus is at-least-once and
    /// deduplication is not this layer's concern.
    pub fn on_message(&self, msg: &RawMessage) {
        let Some((kind, policy)) = classify(&msg.topic) else {
            warn!(topic = %msg.topic, "Dropping message on unrecognized topic");
            return;
        };

        let event = match DecodedEvent::decode(kind, &msg.payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(topic = %msg.topic, error = %e, "Dropping undecodable payload");
                return;
            }
        };

        debug!(topic = %msg.topic, kind = kind.label(), "Routing event");

        // Broadcast first: urgent kinds must reach observers before any
        // persistence is attempted.
        match policy.class {
            BroadcastClass::Alert => {
                let alert_kind = match kind {
                    EventKind::Fall => AlertKind::Fall,
                    _ => AlertKind::Help,
                };
                self.hub
                    .broadcast(ServerFrame::alert(alert_kind, event.to_value()));
            }
            BroadcastClass::Status => {
                self.hub.broadcast(ServerFrame::status(event.to_value()));
            }
        }

        match policy.persist {
            PersistAction::None => {}
            PersistAction::Communication => {
                self.enqueue_write(WriteJob::Communication(
                    CommunicationEvent::emergency_button(),
                ));
            }
            PersistAction::Reading => {
                if let Some(reading) = reading_from(&event) {
                    self.enqueue_write(WriteJob::Reading(reading));
                }
            }
        }
    }

    /// Handle an observer-originated display command.
    ///
    /// Fire-and-forget from the observer's point of view: the command is
    /// published with defaults applied, and a non-emergency communication
    /// row is recorded unconditionally. Publish failure and persistence
    /// failure are independent and each only logged.
    pub async fn on_observer_command(&self, msg: Option<String>, color: Option<String>) {
        let command = DisplayCommand::from_parts(msg, color);
        info!(msg = %command.msg, color = %command.color, "Forwarding display command");

        if let Err(e) = self.commands.publish_display(&command).await {
            warn!(error = %e, "Display command publish failed");
        }

        self.enqueue_write(WriteJob::Communication(CommunicationEvent::outbound_display(
            &command.msg,
            &command.color,
        )));
    }

    /// Close the write queue and wait up to `drain` for pending writes.
    ///
    /// Best-effort: writes still queued when the timeout fires are lost.
    pub async fn shutdown(&self, drain: Duration) {
        if let Ok(mut guard) = self.write_tx.lock() {
            guard.take();
        }

        let handle = match self.writer.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(drain, handle).await.is_err() {
                abort.abort();
                warn!("Persistence writes still pending at shutdown; abandoning drain");
            }
        }

        info!("Router shut down");
    }

    fn enqueue_write(&self, job: WriteJob) {
        let Ok(guard) = self.write_tx.lock() else {
            return;
        };

        match guard.as_ref() {
            Some(tx) => {
                if let Err(e) = tx.try_send(job) {
                    warn!(error = %e, "Write queue full or closed; dropping persistence write");
                }
            }
            None => warn!("Router shut down; dropping persistence write"),
        }
    }
}

/// Build a reading when both temperature and humidity are present and
/// numeric; telemetry without them is broadcast-only.
fn reading_from(event: &DecodedEvent) -> Option<EnvironmentalReading> {
    let temperature_c = event.number("temp")?;
    let humidity_pct = event.number("humidity")?;

    let index = heat_stress_index(temperature_c, humidity_pct);
    if index.fallback {
        warn!(
            temp = temperature_c,
            humidity = humidity_pct,
            "Heat index fell back to raw temperature"
        );
    }

    Some(EnvironmentalReading {
        temperature_c,
        humidity_pct,
        heat_index_c: index.value,
    })
}

/// Drain the write queue, applying each job against the store.
///
/// Failures are logged and the worker moves on. There is no retry at this
/// level; retry policy belongs to the gateway implementation.
async fn run_write_worker(
    mut rx: mpsc::Receiver<WriteJob>,
    store: Arc<dyn PersistenceGateway>,
) {
    while let Some(job) = rx.recv().await {
        let result = match &job {
            WriteJob::Communication(event) => store.append_communication(event).await,
            WriteJob::Reading(reading) => store.append_reading(reading).await,
        };

        if let Err(e) = result {
            warn!(error = %e, "Persistence write failed");
        }
    }

    debug!("Write worker drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{TOPIC_ENV, TOPIC_FALL, TOPIC_HELP};
    use crate::gateway::{CommandError, PersistenceError};
    use async_trait::async_trait;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingStore {
        communications: Mutex<Vec<CommunicationEvent>>,
        readings: Mutex<Vec<EnvironmentalReading>>,
    }

    #[async_trait]
    impl PersistenceGateway for RecordingStore {
        async fn append_communication(
            &self,
            event: &CommunicationEvent,
        ) -> Result<(), PersistenceError> {
            self.communications.lock().unwrap().push(event.clone());
            Ok(())
        }

        async fn append_reading(
            &self,
            reading: &EnvironmentalReading,
        ) -> Result<(), PersistenceError> {
            self.readings.lock().unwrap().push(reading.clone());
            Ok(())
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    /// Gateway whose writes never complete.
    struct StalledStore;

    #[async_trait]
    impl PersistenceGateway for StalledStore {
        async fn append_communication(
            &self,
            _event: &CommunicationEvent,
        ) -> Result<(), PersistenceError> {
            std::future::pending().await
        }

        async fn append_reading(
            &self,
            _reading: &EnvironmentalReading,
        ) -> Result<(), PersistenceError> {
            std::future::pending().await
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    #[derive(Default)]
    struct RecordingCommands {
        published: Mutex<Vec<DisplayCommand>>,
    }

    #[async_trait]
    impl CommandGateway for RecordingCommands {
        async fn publish_display(&self, command: &DisplayCommand) -> Result<(), CommandError> {
            self.published.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    struct Harness {
        hub: Arc<ObserverHub>,
        store: Arc<RecordingStore>,
        commands: Arc<RecordingCommands>,
        router: EventRouter,
    }

    fn harness() -> Harness {
        harness_with_config(RouterConfig::default())
    }

    fn harness_with_config(config: RouterConfig) -> Harness {
        let hub = Arc::new(ObserverHub::new());
        let store = Arc::new(RecordingStore::default());
        let commands = Arc::new(RecordingCommands::default());
        let router = EventRouter::new(
            Arc::clone(&hub),
            Arc::clone(&store) as Arc<dyn PersistenceGateway>,
            Arc::clone(&commands) as Arc<dyn CommandGateway>,
            config,
        );

        Harness {
            hub,
            store,
            commands,
            router,
        }
    }

    const DRAIN: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_help_request_broadcasts_and_persists() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        h.router.on_message(&RawMessage::new(TOPIC_HELP, "{}"));

        let frame = rx.try_recv().unwrap();
        assert_eq!(
            serde_json::to_value(&*frame).unwrap(),
            json!({"event": "alert", "data": {"type": "HELP", "data": {}}})
        );

        h.router.shutdown(DRAIN).await;
        let rows = h.store.communications.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_emergency);
        assert_eq!(rows[0].message, "Emergency button pressed");
    }

    #[tokio::test]
    async fn test_env_telemetry_broadcasts_and_persists_reading() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        h.router.on_message(&RawMessage::new(
            TOPIC_ENV,
            r#"{"temp": 30, "humidity": 80}"#,
        ));

        let frame = rx.try_recv().unwrap();
        assert_eq!(
            serde_json::to_value(&*frame).unwrap(),
            json!({"event": "status", "data": {"temp": 30, "humidity": 80}})
        );

        h.router.shutdown(DRAIN).await;
        let rows = h.store.readings.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temperature_c, 30.0);
        assert_eq!(rows[0].humidity_pct, 80.0);
        assert_eq!(rows[0].heat_index_c, heat_stress_index(30.0, 80.0).value);
    }

    #[tokio::test]
    async fn test_telemetry_without_humidity_is_broadcast_only() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        h.router
            .on_message(&RawMessage::new(TOPIC_ENV, r#"{"temp": 30}"#));

        assert!(rx.try_recv().is_ok());

        h.router.shutdown(DRAIN).await;
        assert!(h.store.readings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fall_broadcasts_without_persistence() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        h.router
            .on_message(&RawMessage::new(TOPIC_FALL, r#"{"impact": 2.4}"#));

        let frame = rx.try_recv().unwrap();
        assert_eq!(
            serde_json::to_value(&*frame).unwrap(),
            json!({"event": "alert", "data": {"type": "FALL", "data": {"impact": 2.4}}})
        );

        h.router.shutdown(DRAIN).await;
        assert!(h.store.communications.lock().unwrap().is_empty());
        assert!(h.store.readings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_topic_has_no_side_effects() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        h.router
            .on_message(&RawMessage::new("home/unknown/x", r#"{"a": 1}"#));

        assert!(rx.try_recv().is_err());

        h.router.shutdown(DRAIN).await;
        assert!(h.store.communications.lock().unwrap().is_empty());
        assert!(h.store.readings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_payload_has_no_side_effects() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        h.router
            .on_message(&RawMessage::new(TOPIC_HELP, "not json"));
        h.router
            .on_message(&RawMessage::new(TOPIC_HELP, "[1, 2]"));

        assert!(rx.try_recv().is_err());

        h.router.shutdown(DRAIN).await;
        assert!(h.store.communications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replayed_message_is_not_deduplicated() {
        let h = harness();
        let (_id, mut rx) = h.hub.connect();

        let msg = RawMessage::new(TOPIC_HELP, "{}");
        h.router.on_message(&msg);
        h.router.on_message(&msg);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());

        h.router.shutdown(DRAIN).await;
        assert_eq!(h.store.communications.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_store_does_not_delay_alert_broadcast() {
        let hub = Arc::new(ObserverHub::new());
        let commands = Arc::new(RecordingCommands::default());
        let router = EventRouter::new(
            Arc::clone(&hub),
            Arc::new(StalledStore),
            Arc::clone(&commands) as Arc<dyn CommandGateway>,
            RouterConfig::default(),
        );
        let (_id, mut rx) = hub.connect();

        // on_message returns synchronously; the broadcast must already be
        // delivered even though the store write will never finish.
        router.on_message(&RawMessage::new(TOPIC_HELP, "{}"));

        assert_eq!(rx.try_recv().unwrap().event_name(), "alert");
    }

    #[tokio::test]
    async fn test_full_write_queue_drops_without_blocking() {
        let hub = Arc::new(ObserverHub::new());
        let commands = Arc::new(RecordingCommands::default());
        let router = EventRouter::new(
            Arc::clone(&hub),
            Arc::new(StalledStore),
            Arc::clone(&commands) as Arc<dyn CommandGateway>,
            RouterConfig {
                write_queue_capacity: 1,
            },
        );
        let (_id, mut rx) = hub.connect();

        for _ in 0..4 {
            router.on_message(&RawMessage::new(TOPIC_HELP, "{}"));
        }

        // Every broadcast went out even though the queue saturated.
        for _ in 0..4 {
            assert!(rx.try_recv().is_ok());
        }
    }

    #[tokio::test]
    async fn test_observer_command_applies_defaults_and_audits() {
        let h = harness();

        h.router.on_observer_command(None, None).await;

        {
            let published = h.commands.published.lock().unwrap();
            assert_eq!(published.len(), 1);
            assert_eq!(published[0].msg, "Hello");
            assert_eq!(published[0].color, "white");
            assert_eq!(published[0].duration, 5);
        }

        h.router.shutdown(DRAIN).await;
        let rows = h.store.communications.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].is_emergency);
        assert!(rows[0].message.contains("Hello"));
    }

    #[tokio::test]
    async fn test_observer_command_passes_fields_through() {
        let h = harness();

        h.router
            .on_observer_command(Some("Take pills".into()), Some("green".into()))
            .await;

        let published = h.commands.published.lock().unwrap();
        assert_eq!(published[0].msg, "Take pills");
        assert_eq!(published[0].color, "green");
    }

    #[tokio::test]
    async fn test_command_audit_survives_publish_failure() {
        struct FailingCommands;

        #[async_trait]
        impl CommandGateway for FailingCommands {
            async fn publish_display(
                &self,
                _command: &DisplayCommand,
            ) -> Result<(), CommandError> {
                Err(CommandError::PublishFailed("broker down".into()))
            }
        }

        let hub = Arc::new(ObserverHub::new());
        let store = Arc::new(RecordingStore::default());
        let router = EventRouter::new(
            Arc::clone(&hub),
            Arc::clone(&store) as Arc<dyn PersistenceGateway>,
            Arc::new(FailingCommands),
            RouterConfig::default(),
        );

        router.on_observer_command(None, None).await;

        router.shutdown(DRAIN).await;
        assert_eq!(store.communications.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_writes_after_shutdown_are_dropped() {
        let h = harness();
        h.router.shutdown(DRAIN).await;

        // No panic, no queue: the message is broadcast and the write is
        // dropped.
        let (_id, mut rx) = h.hub.connect();
        h.router.on_message(&RawMessage::new(TOPIC_HELP, "{}"));
        assert!(rx.try_recv().is_ok());
        assert!(h.store.communications.lock().unwrap().is_empty());
    }
}
