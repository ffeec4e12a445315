//! `skymode-types` – shared vocabulary for the flight-mode workspace.
//!
//! Every message exchanged between an external flight mode and the
//! autopilot's mode authority is defined here, together with the
//! [`ModeRequirements`] record, the setpoint configuration flags and the
//! workspace-wide [`ModeError`].
//!
//! # Modules
//!
//! - [`mode`] – [`ModeId`], [`ModeResult`] and [`ModeRequirements`].
//! - [`setpoint`] – [`SetpointConfiguration`], the [`ControlMode`] descriptor
//!   and [`SetpointValue`] payloads.
//! - [`events`] – event ids, [`LogLevels`] and fixed-size argument encoding
//!   for health and arming check failures.
//! - [`messages`] – the bus [`Message`] envelope and every concrete message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod events;
pub mod messages;
pub mod mode;
pub mod setpoint;

pub use events::{
    event_id, EventArgument, EventArguments, EventType, LogLevel, LogLevels, EVENT_ARGUMENTS_LEN,
};
pub use messages::{
    schema_versions, timestamp_micros, ArmingCheckReply, ArmingCheckRequest, ArmingState,
    BatteryStatus, BatteryWarning, HomePosition, ManualControlSetpoint, Message, MessageVersion,
    ModeCompleted, SetpointMessage, VehicleLandDetected, VehicleStatus, VtolState,
    VtolVehicleStatus, ARMING_CHECK_MAX_EVENTS,
};
pub use mode::{ModeId, ModeRequirements, ModeResult};
pub use setpoint::{ControlMode, SetpointConfiguration, SetpointValue};

/// Error type shared by the mode runtime, the message bus and the kernel
/// helpers.
///
/// Failures that cross the mode/authority boundary are still reported as
/// booleans or flagged data; this type is used on the inner paths that
/// propagate with `?`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModeError {
    #[error("Registration of mode '{name}' failed: {reason}")]
    Registration { name: String, reason: String },

    #[error("Message schema incompatible: {0}")]
    Incompatible(String),

    #[error("Mode '{0}' has no setpoint types; add at least one before registering")]
    NoSetpointTypes(String),

    #[error("Mode '{0}' is not registered")]
    NotRegistered(String),

    #[error("Mode '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Unknown setpoint type index {0}")]
    UnknownSetpointType(usize),

    #[error("No arming check request received for mode '{0}' within the watchdog period")]
    WatchdogTimeout(String),
}
