//! Setpoint configuration flags, the control-mode descriptor and setpoint
//! payloads.

use serde::{Deserialize, Serialize};

use crate::mode::ModeId;

/// Which controllers a setpoint type drives, and therefore which physical
/// quantities it needs estimated.
///
/// Every flag defaults to `false`; use one of the presets for the common
/// setpoint families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SetpointConfiguration {
    pub rates_enabled: bool,
    pub attitude_enabled: bool,
    pub altitude_enabled: bool,
    pub acceleration_enabled: bool,
    pub velocity_enabled: bool,
    pub position_enabled: bool,
    pub climb_rate_enabled: bool,
    pub control_allocation_enabled: bool,
}

impl SetpointConfiguration {
    /// Body rates plus thrust.
    pub fn rates() -> Self {
        Self {
            rates_enabled: true,
            control_allocation_enabled: true,
            ..Default::default()
        }
    }

    /// Attitude plus thrust; the rate loop stays engaged underneath.
    pub fn attitude() -> Self {
        Self {
            attitude_enabled: true,
            ..Self::rates()
        }
    }

    /// Position / velocity / acceleration trajectory.
    pub fn trajectory() -> Self {
        Self {
            altitude_enabled: true,
            acceleration_enabled: true,
            velocity_enabled: true,
            position_enabled: true,
            climb_rate_enabled: true,
            ..Self::attitude()
        }
    }

    /// Smoothed go-to target; uses the full position stack.
    pub fn goto() -> Self {
        Self::trajectory()
    }

    /// Copy the controller flags into a [`ControlMode`] descriptor.
    pub fn fill_control_mode(&self, control_mode: &mut ControlMode) {
        control_mode.flag_control_rates_enabled = self.rates_enabled;
        control_mode.flag_control_attitude_enabled = self.attitude_enabled;
        control_mode.flag_control_altitude_enabled = self.altitude_enabled;
        control_mode.flag_control_acceleration_enabled = self.acceleration_enabled;
        control_mode.flag_control_velocity_enabled = self.velocity_enabled;
        control_mode.flag_control_position_enabled = self.position_enabled;
        control_mode.flag_control_climb_rate_enabled = self.climb_rate_enabled;
        control_mode.flag_control_allocation_enabled = self.control_allocation_enabled;
    }
}

/// Capability descriptor published whenever a setpoint type is activated.
///
/// Tells the autopilot which of its own controllers to keep running beneath
/// the external mode's setpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMode {
    /// Microseconds since the Unix epoch.
    pub timestamp: u64,
    pub source_id: ModeId,
    pub flag_control_rates_enabled: bool,
    pub flag_control_attitude_enabled: bool,
    pub flag_control_altitude_enabled: bool,
    pub flag_control_acceleration_enabled: bool,
    pub flag_control_velocity_enabled: bool,
    pub flag_control_position_enabled: bool,
    pub flag_control_climb_rate_enabled: bool,
    pub flag_control_allocation_enabled: bool,
}

/// Setpoint payload produced by a mode. Vectors are NED, angles in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum SetpointValue {
    Rates {
        rates_rad_s: [f32; 3],
        thrust_body: [f32; 3],
    },
    Attitude {
        /// Quaternion `[w, x, y, z]`.
        q_d: [f32; 4],
        thrust_body: [f32; 3],
        yaw_sp_move_rate: f32,
    },
    Trajectory {
        position: Option<[f32; 3]>,
        velocity: Option<[f32; 3]>,
        acceleration: Option<[f32; 3]>,
        yaw: Option<f32>,
        yawspeed: Option<f32>,
    },
    Goto {
        position: [f32; 3],
        heading: Option<f32>,
        max_horizontal_speed: Option<f32>,
        max_vertical_speed: Option<f32>,
    },
}
