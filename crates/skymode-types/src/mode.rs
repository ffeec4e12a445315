//! Mode identity, completion results and operational requirements.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// ModeId
// ────────────────────────────────────────────────────────────────────────────

/// Navigation-state identifier broadcast by the vehicle.
///
/// Built-in modes use fixed ids; external modes receive one of
/// [`ModeId::EXTERNAL1`]..=[`ModeId::EXTERNAL8`] from the registration
/// authority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ModeId(pub u8);

impl ModeId {
    pub const MANUAL: ModeId = ModeId(0);
    pub const ALTITUDE: ModeId = ModeId(1);
    pub const POSITION: ModeId = ModeId(2);
    pub const MISSION: ModeId = ModeId(3);
    pub const HOLD: ModeId = ModeId(4);
    pub const RETURN: ModeId = ModeId(5);
    pub const ACRO: ModeId = ModeId(10);
    pub const DESCEND: ModeId = ModeId(12);
    pub const TERMINATION: ModeId = ModeId(13);
    pub const OFFBOARD: ModeId = ModeId(14);
    pub const STABILIZED: ModeId = ModeId(15);
    pub const TAKEOFF: ModeId = ModeId(17);
    pub const LAND: ModeId = ModeId(18);
    pub const FOLLOW_TARGET: ModeId = ModeId(19);
    pub const PRECISION_LAND: ModeId = ModeId(20);
    pub const ORBIT: ModeId = ModeId(21);
    pub const VTOL_TAKEOFF: ModeId = ModeId(22);
    pub const EXTERNAL1: ModeId = ModeId(23);
    pub const EXTERNAL8: ModeId = ModeId(30);

    /// Sentinel for "no id assigned yet".
    pub const INVALID: ModeId = ModeId(0xff);

    /// `true` for ids inside the external-mode range.
    pub fn is_external(self) -> bool {
        (Self::EXTERNAL1.0..=Self::EXTERNAL8.0).contains(&self.0)
    }

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for ModeId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            write!(f, "invalid")
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ModeResult
// ────────────────────────────────────────────────────────────────────────────

/// Result code carried by a mode completion notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ModeResult {
    Success = 0,
    /// The mode could not be activated or refused to run.
    Rejected = 1,
    /// The mode was interrupted, e.g. by the pilot switching modes.
    Interrupted = 2,
    Timeout = 3,
    Deactivated = 4,
    FailureOther = 100,
}

impl ModeResult {
    pub fn code(self) -> u8 {
        self as u8
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ModeRequirements
// ────────────────────────────────────────────────────────────────────────────

/// Operational capabilities a mode needs before it may be selected or armed.
///
/// Every flag is independent. After aggregation `local_position` and
/// `local_position_relaxed` are never both set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct ModeRequirements {
    pub angular_velocity: bool,
    pub attitude: bool,
    pub local_alt: bool,
    pub local_position: bool,
    pub local_position_relaxed: bool,
    pub global_position: bool,
    pub mission: bool,
    pub home_position: bool,
    pub prevent_arming: bool,
    pub manual_control: bool,
}

impl ModeRequirements {
    /// Reset every flag to `false`.
    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    /// All flags paired with their names, in declaration order.
    pub fn flags(&self) -> [(&'static str, bool); 10] {
        [
            ("angular_velocity", self.angular_velocity),
            ("attitude", self.attitude),
            ("local_alt", self.local_alt),
            ("local_position", self.local_position),
            ("local_position_relaxed", self.local_position_relaxed),
            ("global_position", self.global_position),
            ("mission", self.mission),
            ("home_position", self.home_position),
            ("prevent_arming", self.prevent_arming),
            ("manual_control", self.manual_control),
        ]
    }

    /// Names of the flags set here but not in `available`.
    ///
    /// An exact local position also satisfies a relaxed one.
    pub fn missing_from(&self, available: &ModeRequirements) -> Vec<&'static str> {
        let mut offered = *available;
        offered.local_position_relaxed |= available.local_position;
        self.flags()
            .into_iter()
            .zip(offered.flags())
            .filter(|((_, required), (_, present))| *required && !*present)
            .map(|((name, _), _)| name)
            .collect()
    }
}

impl BitOrAssign for ModeRequirements {
    fn bitor_assign(&mut self, rhs: Self) {
        self.angular_velocity |= rhs.angular_velocity;
        self.attitude |= rhs.attitude;
        self.local_alt |= rhs.local_alt;
        self.local_position |= rhs.local_position;
        self.local_position_relaxed |= rhs.local_position_relaxed;
        self.global_position |= rhs.global_position;
        self.mission |= rhs.mission;
        self.home_position |= rhs.home_position;
        self.prevent_arming |= rhs.prevent_arming;
        self.manual_control |= rhs.manual_control;
    }
}

impl BitOr for ModeRequirements {
    type Output = Self;

    fn bitor(mut self, rhs: Self) -> Self {
        self |= rhs;
        self
    }
}
