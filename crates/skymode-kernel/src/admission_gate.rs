//! [`AdmissionGate`] – the authority's decision whether a mode may run.
//!
//! A mode is admitted only when three independent checks pass, in order:
//!
//! 1. **Reply freshness**: the mode answered the latest arming check within
//!    the deadline. No reply is an implicit failure.
//! 2. **Reported health**: the reply says `can_arm_and_run`.
//! 3. **Requirements**: every capability in the reply's
//!    [`ModeRequirements`] is currently available on the vehicle, and the
//!    mode did not set `prevent_arming`.

use skymode_types::{ArmingCheckReply, ModeId, ModeRequirements};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("mode {0} did not reply to the arming check in time")]
    NoReply(ModeId),

    #[error("mode {0} reported it cannot arm and run")]
    CannotArm(ModeId),

    #[error("mode {0} prevents arming")]
    PreventArming(ModeId),

    #[error("mode {mode_id} requires '{requirement}' which is not available")]
    MissingRequirement {
        mode_id: ModeId,
        requirement: &'static str,
    },
}

/// Holds the capabilities the vehicle currently provides and evaluates
/// replies against them.
///
/// # Example
///
/// ```
/// use skymode_kernel::admission_gate::AdmissionGate;
/// use skymode_types::{ArmingCheckReply, ModeId, ModeRequirements};
///
/// let gate = AdmissionGate::new(ModeRequirements { attitude: true, ..Default::default() });
///
/// let mut reply: ArmingCheckReply = ArmingCheckReply::new(0, 0);
/// reply.mode_requirements.attitude = true;
/// assert!(gate.admit(ModeId::EXTERNAL1, Some(&reply)).is_ok());
///
/// reply.mode_requirements.global_position = true;
/// assert!(gate.admit(ModeId::EXTERNAL1, Some(&reply)).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AdmissionGate {
    available: ModeRequirements,
}

impl AdmissionGate {
    pub fn new(available: ModeRequirements) -> Self {
        Self { available }
    }

    pub fn set_available(&mut self, available: ModeRequirements) {
        self.available = available;
    }

    pub fn available(&self) -> &ModeRequirements {
        &self.available
    }

    /// Decide admission for `mode_id` given its latest fresh `reply`.
    ///
    /// # Errors
    ///
    /// The first failing check, see the module documentation.
    pub fn admit(
        &self,
        mode_id: ModeId,
        reply: Option<&ArmingCheckReply>,
    ) -> Result<(), AdmissionError> {
        let reply = reply.ok_or(AdmissionError::NoReply(mode_id))?;
        if !reply.can_arm_and_run {
            return Err(AdmissionError::CannotArm(mode_id));
        }
        let required = reply.mode_requirements;
        if required.prevent_arming {
            return Err(AdmissionError::PreventArming(mode_id));
        }
        if let Some(requirement) = required.missing_from(&self.available).into_iter().next() {
            return Err(AdmissionError::MissingRequirement {
                mode_id,
                requirement,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymode_types::{event_id, EventType, LogLevel};

    const MODE: ModeId = ModeId::EXTERNAL1;

    fn full_vehicle() -> ModeRequirements {
        ModeRequirements {
            angular_velocity: true,
            attitude: true,
            local_alt: true,
            local_position: true,
            global_position: true,
            home_position: true,
            manual_control: true,
            ..Default::default()
        }
    }

    fn healthy_reply(requirements: ModeRequirements) -> ArmingCheckReply {
        let mut reply = ArmingCheckReply::new(1, 1);
        reply.mode_requirements = requirements;
        reply
    }

    #[test]
    fn missing_reply_is_implicit_failure() {
        let gate = AdmissionGate::new(full_vehicle());
        assert_eq!(gate.admit(MODE, None), Err(AdmissionError::NoReply(MODE)));
    }

    #[test]
    fn failed_health_blocks_before_requirements() {
        // Even with nothing required, a failed reply is rejected.
        let gate = AdmissionGate::new(ModeRequirements::default());
        let mut reply = healthy_reply(ModeRequirements::default());
        reply.can_arm_and_run = false;
        reply.push_event(EventType::new(event_id("x"), LogLevel::Error.into(), ()));
        assert_eq!(
            gate.admit(MODE, Some(&reply)),
            Err(AdmissionError::CannotArm(MODE))
        );
    }

    #[test]
    fn prevent_arming_always_blocks() {
        let gate = AdmissionGate::new(full_vehicle());
        let reply = healthy_reply(ModeRequirements {
            prevent_arming: true,
            ..Default::default()
        });
        assert_eq!(
            gate.admit(MODE, Some(&reply)),
            Err(AdmissionError::PreventArming(MODE))
        );
    }

    #[test]
    fn unavailable_requirement_is_named() {
        let gate = AdmissionGate::new(ModeRequirements {
            attitude: true,
            ..Default::default()
        });
        let reply = healthy_reply(ModeRequirements {
            attitude: true,
            mission: true,
            ..Default::default()
        });
        assert_eq!(
            gate.admit(MODE, Some(&reply)),
            Err(AdmissionError::MissingRequirement {
                mode_id: MODE,
                requirement: "mission",
            })
        );
    }

    #[test]
    fn relaxed_position_satisfied_by_exact_estimate() {
        let gate = AdmissionGate::new(full_vehicle());
        let reply = healthy_reply(ModeRequirements {
            local_position_relaxed: true,
            manual_control: true,
            ..Default::default()
        });
        assert!(gate.admit(MODE, Some(&reply)).is_ok());
    }

    #[test]
    fn set_available_changes_decision() {
        let mut gate = AdmissionGate::default();
        let reply = healthy_reply(ModeRequirements {
            home_position: true,
            ..Default::default()
        });
        assert!(gate.admit(MODE, Some(&reply)).is_err());
        gate.set_available(full_vehicle());
        assert!(gate.admit(MODE, Some(&reply)).is_ok());
    }
}
