//! Topic classification for the Haven bus.
//!
//! The topic set is closed: each consumed topic maps to exactly one event
//! kind and routing policy, and everything else fails closed. Supporting a
//! new device type means adding a row here.

use crate::event::EventKind;

/// Fall alerts from the wearable belt.
pub const TOPIC_FALL: &str = "home/user_belt/safety/alert";

/// Help button presses from the bedside unit.
pub const TOPIC_HELP: &str = "home/bedside/comm/button";

/// Belt heartbeat/status reports.
pub const TOPIC_BELT_STATUS: &str = "home/user_belt/safety/status";

/// Environmental telemetry from the living-room sensor.
pub const TOPIC_ENV: &str = "home/living_room/env/telemetry";

/// Bedside unit heartbeat/status reports.
pub const TOPIC_COMM_STATUS: &str = "home/bedside/comm/status";

/// Display commands published to the bedside unit.
pub const TOPIC_DISPLAY: &str = "home/bedside/comm/display";

/// All topics the router consumes.
pub const CONSUMED_TOPICS: [&str; 5] = [
    TOPIC_FALL,
    TOPIC_HELP,
    TOPIC_BELT_STATUS,
    TOPIC_ENV,
    TOPIC_COMM_STATUS,
];

/// How an event reaches observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastClass {
    /// Urgent, delivered under the `alert` event.
    Alert,
    /// Informational, delivered under the `status` event.
    Status,
}

/// What, if anything, is persisted for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    /// No durable record.
    None,
    /// Append a communication row for the emergency signal.
    Communication,
    /// Append an environmental reading when temperature and humidity are
    /// both present.
    Reading,
}

/// Routing policy derived from the topic alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingPolicy {
    /// Broadcast event class.
    pub class: BroadcastClass,
    /// Urgent events are broadcast before any persistence is attempted.
    pub urgent: bool,
    /// Persistence action for this kind.
    pub persist: PersistAction,
}

/// Classify a bus topic into its event kind and routing policy.
///
/// Returns `None` for topics outside the fixed set; the caller drops the
/// message without side effects.
#[must_use]
pub fn classify(topic: &str) -> Option<(EventKind, RoutingPolicy)> {
    if topic.ends_with("safety/alert") {
        Some((
            EventKind::Fall,
            RoutingPolicy {
                class: BroadcastClass::Alert,
                urgent: true,
                persist: PersistAction::None,
            },
        ))
    } else if topic.ends_with("comm/button") {
        Some((
            EventKind::HelpRequest,
            RoutingPolicy {
                class: BroadcastClass::Alert,
                urgent: true,
                persist: PersistAction::Communication,
            },
        ))
    } else if topic.ends_with("safety/status") {
        Some((
            EventKind::BeltStatus,
            RoutingPolicy {
                class: BroadcastClass::Status,
                urgent: false,
                persist: PersistAction::None,
            },
        ))
    } else if topic.ends_with("env/telemetry") {
        Some((
            EventKind::EnvTelemetry,
            RoutingPolicy {
                class: BroadcastClass::Status,
                urgent: false,
                persist: PersistAction::Reading,
            },
        ))
    } else if topic.ends_with("comm/status") {
        Some((
            EventKind::CommStatus,
            RoutingPolicy {
                class: BroadcastClass::Status,
                urgent: false,
                persist: PersistAction::None,
            },
        ))
    } else {
        None
    }
}
