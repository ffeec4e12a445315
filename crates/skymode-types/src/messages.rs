//! Messages exchanged between a flight mode and the mode authority.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::events::EventType;
use crate::mode::{ModeId, ModeRequirements, ModeResult};
use crate::setpoint::{ControlMode, SetpointValue};

/// Event slots carried by a default [`ArmingCheckReply`].
pub const ARMING_CHECK_MAX_EVENTS: usize = 5;

/// Current wall-clock time in microseconds since the Unix epoch.
pub fn timestamp_micros() -> u64 {
    u64::try_from(Utc::now().timestamp_micros()).unwrap_or_default()
}

// ────────────────────────────────────────────────────────────────────────────
// Schema versions
// ────────────────────────────────────────────────────────────────────────────

/// Name and version of one message schema, compared against the authority's
/// schemas before registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageVersion {
    pub name: String,
    pub version: u32,
}

const SCHEMA_VERSIONS: &[(&str, u32)] = &[
    ("arming_check_reply", 1),
    ("arming_check_request", 0),
    ("battery_status", 1),
    ("config_control_setpoints", 0),
    ("home_position", 0),
    ("manual_control_setpoint", 0),
    ("mode_completed", 0),
    ("register_ext_component", 1),
    ("vehicle_land_detected", 0),
    ("vehicle_status", 1),
    ("vtol_vehicle_status", 0),
];

/// Schemas of every message this workspace sends or receives.
pub fn schema_versions() -> Vec<MessageVersion> {
    SCHEMA_VERSIONS
        .iter()
        .map(|(name, version)| MessageVersion {
            name: (*name).to_string(),
            version: *version,
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Vehicle status
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmingState {
    Disarmed,
    Armed,
}

/// Periodic vehicle status; best-effort delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleStatus {
    pub timestamp: u64,
    pub arming_state: ArmingState,
    /// Currently selected navigation state.
    pub nav_state: ModeId,
}

impl VehicleStatus {
    pub fn new(armed: bool, nav_state: ModeId) -> Self {
        Self {
            timestamp: timestamp_micros(),
            arming_state: if armed {
                ArmingState::Armed
            } else {
                ArmingState::Disarmed
            },
            nav_state,
        }
    }

    pub fn armed(&self) -> bool {
        self.arming_state == ArmingState::Armed
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Mode completion
// ────────────────────────────────────────────────────────────────────────────

/// Published at most once per activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCompleted {
    pub timestamp: u64,
    pub nav_state: ModeId,
    pub result: ModeResult,
}

// ────────────────────────────────────────────────────────────────────────────
// Arming checks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmingCheckRequest {
    pub timestamp: u64,
    pub request_id: u8,
}

/// Reply to one [`ArmingCheckRequest`].
///
/// Holds at most `N` events. `can_arm_and_run` starts `true`; any attached
/// failure forces it `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmingCheckReply<const N: usize = ARMING_CHECK_MAX_EVENTS> {
    pub timestamp: u64,
    pub request_id: u8,
    pub registration_id: u8,
    pub health_component_index: u8,
    pub health_component_is_present: bool,
    pub health_component_warning: bool,
    pub health_component_error: bool,
    pub can_arm_and_run: bool,
    pub mode_requirements: ModeRequirements,
    num_events: usize,
    events: [EventType; N],
}

impl<const N: usize> ArmingCheckReply<N> {
    pub fn new(request_id: u8, registration_id: u8) -> Self {
        Self {
            timestamp: 0,
            request_id,
            registration_id,
            health_component_index: 0,
            health_component_is_present: false,
            health_component_warning: false,
            health_component_error: false,
            can_arm_and_run: true,
            mode_requirements: ModeRequirements::default(),
            num_events: 0,
            events: [EventType::EMPTY; N],
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.num_events >= N
    }

    /// Attached events, in insertion order.
    pub fn events(&self) -> &[EventType] {
        &self.events[..self.num_events]
    }

    /// Append `event`. Returns `false` and leaves the reply untouched when
    /// every slot is taken.
    pub fn push_event(&mut self, event: EventType) -> bool {
        if self.is_full() {
            return false;
        }
        self.events[self.num_events] = event;
        self.num_events += 1;
        true
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Manual control and setpoints
// ────────────────────────────────────────────────────────────────────────────

/// Pilot stick input. Axes in `[-1, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualControlSetpoint {
    pub timestamp: u64,
    pub valid: bool,
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub throttle: f32,
    pub aux: [f32; 6],
}

/// A setpoint value tagged with the mode and setpoint type that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointMessage {
    pub timestamp: u64,
    pub source_id: ModeId,
    pub setpoint_type: String,
    pub value: SetpointValue,
}

// ────────────────────────────────────────────────────────────────────────────
// Vehicle state
// ────────────────────────────────────────────────────────────────────────────

/// Land detector output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleLandDetected {
    pub timestamp: u64,
    pub landed: bool,
    pub maybe_landed: bool,
    pub ground_contact: bool,
    pub freefall: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VtolState {
    #[default]
    Undefined = 0,
    TransitionToFixedWing = 1,
    TransitionToMulticopter = 2,
    Multicopter = 3,
    FixedWing = 4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VtolVehicleStatus {
    pub timestamp: u64,
    pub vehicle_vtol_state: VtolState,
    pub fixed_wing_system_failure: bool,
}

/// Home location, global and in the local NED frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HomePosition {
    pub timestamp: u64,
    pub lat: f64,
    pub lon: f64,
    pub alt: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,
    pub valid_alt: bool,
    pub valid_hpos: bool,
    pub valid_lpos: bool,
    pub manual_home: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BatteryWarning {
    #[default]
    None = 0,
    Low = 1,
    Critical = 2,
    Emergency = 3,
    Failed = 4,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryStatus {
    pub timestamp: u64,
    pub connected: bool,
    pub voltage_v: f32,
    pub current_a: f32,
    /// State of charge in `[0, 1]`.
    pub remaining: f32,
    pub warning: BatteryWarning,
}

// ────────────────────────────────────────────────────────────────────────────
// Bus envelope
// ────────────────────────────────────────────────────────────────────────────

/// Envelope routed over the message bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    VehicleStatus(VehicleStatus),
    ArmingCheckRequest(ArmingCheckRequest),
    ArmingCheckReply(ArmingCheckReply),
    ModeCompleted(ModeCompleted),
    ControlMode(ControlMode),
    ManualControlSetpoint(ManualControlSetpoint),
    Setpoint(SetpointMessage),
    LandDetected(VehicleLandDetected),
    VtolStatus(VtolVehicleStatus),
    HomePosition(HomePosition),
    BatteryStatus(BatteryStatus),
}
