//! Namespaced, topic-based publish/subscribe message bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Direction | Depth |
//! |---|---|---|
//! | [`Topic::VehicleStatus`] | vehicle → mode | 1 (best effort) |
//! | [`Topic::ArmingCheckRequest`] | authority → mode | default |
//! | [`Topic::ArmingCheckReply`] | mode → authority | default |
//! | [`Topic::ModeCompleted`] | mode → authority | default |
//! | [`Topic::ControlMode`] | mode → vehicle | default |
//! | [`Topic::ManualControlSetpoint`] | vehicle → mode | 1 (best effort) |
//! | [`Topic::Setpoint`] | mode → vehicle | default |
//! | [`Topic::LandDetected`] | vehicle → mode | 1 (best effort) |
//! | [`Topic::VtolStatus`] | vehicle → mode | 1 (best effort) |
//! | [`Topic::HomePosition`] | vehicle → mode | 1 (best effort) |
//! | [`Topic::BatteryStatus`] | vehicle → mode | 1 (best effort) |
//!
//! Depth-1 topics keep only the newest message: a slow subscriber loses
//! older samples but never sees them out of order.
//!
//! # Namespaces
//!
//! Every topic name is prefixed with the bus namespace, so several vehicles
//! (or several instances of the same mode) can share one process.
//! [`MessageBus::namespaced`] returns a handle that shares the underlying
//! channel table but publishes under a different prefix.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use skymode_types::Message;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for topics that are not best-effort.
const DEFAULT_CAPACITY: usize = 32;

/// All routing topics on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    VehicleStatus,
    ArmingCheckRequest,
    ArmingCheckReply,
    ModeCompleted,
    ControlMode,
    ManualControlSetpoint,
    Setpoint,
    LandDetected,
    VtolStatus,
    HomePosition,
    BatteryStatus,
}

impl Topic {
    /// Topic path below the namespace.
    pub fn path(self) -> &'static str {
        match self {
            Topic::VehicleStatus => "fmu/out/vehicle_status",
            Topic::ArmingCheckRequest => "fmu/out/arming_check_request",
            Topic::ArmingCheckReply => "fmu/in/arming_check_reply",
            Topic::ModeCompleted => "fmu/in/mode_completed",
            Topic::ControlMode => "fmu/in/config_control_setpoints",
            Topic::ManualControlSetpoint => "fmu/out/manual_control_setpoint",
            Topic::Setpoint => "fmu/in/setpoint",
            Topic::LandDetected => "fmu/out/vehicle_land_detected",
            Topic::VtolStatus => "fmu/out/vtol_vehicle_status",
            Topic::HomePosition => "fmu/out/home_position",
            Topic::BatteryStatus => "fmu/out/battery_status",
        }
    }

    /// Channel depth.
    pub fn depth(self) -> usize {
        match self {
            Topic::VehicleStatus
            | Topic::ManualControlSetpoint
            | Topic::LandDetected
            | Topic::VtolStatus
            | Topic::HomePosition
            | Topic::BatteryStatus => 1,
            _ => DEFAULT_CAPACITY,
        }
    }

    /// The topic a [`Message`] variant belongs on.
    pub fn of(message: &Message) -> Topic {
        match message {
            Message::VehicleStatus(_) => Topic::VehicleStatus,
            Message::ArmingCheckRequest(_) => Topic::ArmingCheckRequest,
            Message::ArmingCheckReply(_) => Topic::ArmingCheckReply,
            Message::ModeCompleted(_) => Topic::ModeCompleted,
            Message::ControlMode(_) => Topic::ControlMode,
            Message::ManualControlSetpoint(_) => Topic::ManualControlSetpoint,
            Message::Setpoint(_) => Topic::Setpoint,
            Message::LandDetected(_) => Topic::LandDetected,
            Message::VtolStatus(_) => Topic::VtolStatus,
            Message::HomePosition(_) => Topic::HomePosition,
            Message::BatteryStatus(_) => Topic::BatteryStatus,
        }
    }
}

type ChannelTable = HashMap<String, broadcast::Sender<Message>>;

/// Shared message bus. Clone it cheaply – all clones share the same
/// underlying broadcast channels.
#[derive(Clone, Debug, Default)]
pub struct MessageBus {
    namespace: String,
    channels: Arc<Mutex<ChannelTable>>,
}

impl MessageBus {
    /// Create an empty bus with the root namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle onto the same channel table under `prefix`.
    ///
    /// Leading and trailing slashes are ignored; an empty prefix is the root
    /// namespace.
    pub fn namespaced(&self, prefix: &str) -> Self {
        Self {
            namespace: prefix.trim_matches('/').to_string(),
            channels: Arc::clone(&self.channels),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully-qualified name of `topic` in this namespace.
    pub fn topic_name(&self, topic: Topic) -> String {
        if self.namespace.is_empty() {
            format!("/{}", topic.path())
        } else {
            format!("/{}/{}", self.namespace, topic.path())
        }
    }

    /// Publish `message` on its topic.
    ///
    /// Fire-and-forget: returns the number of subscribers that were handed
    /// the message, `0` when nobody is listening.
    pub fn publish(&self, message: Message) -> usize {
        let topic = Topic::of(&message);
        let sender = self.sender(topic);
        match sender.send(message) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                trace!(topic = %self.topic_name(topic), "published with no subscribers");
                0
            }
        }
    }

    /// Subscribe to `topic` in this namespace.
    pub fn subscribe(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            name: self.topic_name(topic),
            receiver: self.sender(topic).subscribe(),
        }
    }

    fn sender(&self, topic: Topic) -> broadcast::Sender<Message> {
        let name = self.topic_name(topic);
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(name)
            .or_insert_with(|| broadcast::channel(topic.depth()).0)
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Topic receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to one namespaced topic.
///
/// Obtained via [`MessageBus::subscribe`].
pub struct TopicReceiver {
    name: String,
    receiver: broadcast::Receiver<Message>,
}

impl TopicReceiver {
    /// Wait for the next message on this topic.
    ///
    /// Returns:
    /// * `Ok(message)` – a successfully received message.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Message, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Wait for the next message, skipping over any that were dropped while
    /// the subscriber lagged. Returns `None` once the bus is closed.
    pub async fn recv_latest(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(topic = %self.name, dropped = n, "subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv_latest`][Self::recv_latest]: `None`
    /// when nothing is queued or the bus is closed.
    pub fn try_recv_latest(&mut self) -> Option<Message> {
        loop {
            match self.receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    debug!(topic = %self.name, dropped = n, "subscriber lagged");
                    continue;
                }
                Err(_) => return None,
            }
        }
    }

    /// Fully-qualified topic name.
    pub fn name(&self) -> &str {
        &self.name
    }
}
