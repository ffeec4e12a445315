//! [`LocalAuthority`] – in-process mode authority.
//!
//! Plays the flight controller's side of the contract: it hands out mode and
//! arming-check ids, issues check requests, tracks reply freshness with a
//! [`Watchdog`], and decides through the [`AdmissionGate`] whether a
//! registered mode may currently be selected.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use skymode_types::{
    schema_versions, timestamp_micros, ArmingCheckReply, ArmingCheckRequest, MessageVersion,
    ModeId, ModeRequirements,
};
use tracing::{debug, info, warn};

use crate::admission_gate::{AdmissionError, AdmissionGate};
use crate::registration::{
    validate_name, RegisteredIdentity, RegistrationAuthority, RegistrationError,
    RegistrationSettings,
};
use crate::watchdog::{ComponentHealth, Watchdog};

/// How long a reply stays valid after it was received.
pub const DEFAULT_REPLY_DEADLINE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Registration {
    name: String,
    mode_id: ModeId,
    arming_check_id: u8,
    replaces: Option<ModeId>,
}

/// Registry and admission logic of an in-process authority.
///
/// # Example
///
/// ```
/// use skymode_kernel::authority::LocalAuthority;
/// use skymode_kernel::registration::{RegistrationAuthority, RegistrationSettings};
/// use skymode_types::ModeId;
///
/// let mut authority = LocalAuthority::new();
/// let identity = authority.register(&RegistrationSettings::mode("Orbit", None)).unwrap();
/// assert_eq!(identity.mode_id, ModeId::EXTERNAL1);
/// assert_eq!(authority.mode_name(identity.mode_id), Some("Orbit"));
/// ```
pub struct LocalAuthority {
    schema_versions: Vec<MessageVersion>,
    registrations: Vec<Registration>,
    next_request_id: u8,
    reply_deadline: Duration,
    replies: HashMap<u8, ArmingCheckReply>,
    watchdog: Watchdog<u8>,
    gate: AdmissionGate,
}

impl Default for LocalAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalAuthority {
    pub fn new() -> Self {
        Self {
            schema_versions: schema_versions(),
            registrations: Vec::new(),
            next_request_id: 0,
            reply_deadline: DEFAULT_REPLY_DEADLINE,
            replies: HashMap::new(),
            watchdog: Watchdog::new(),
            gate: AdmissionGate::default(),
        }
    }

    /// Override the schema versions advertised to registering modes.
    pub fn with_schema_versions(mut self, versions: Vec<MessageVersion>) -> Self {
        self.schema_versions = versions;
        self
    }

    pub fn with_reply_deadline(mut self, deadline: Duration) -> Self {
        self.reply_deadline = deadline;
        self
    }

    /// Update the capabilities the vehicle currently provides.
    pub fn set_available(&mut self, available: ModeRequirements) {
        self.gate.set_available(available);
    }

    pub fn mode_name(&self, mode_id: ModeId) -> Option<&str> {
        self.registrations
            .iter()
            .find(|r| r.mode_id == mode_id && mode_id.is_valid())
            .map(|r| r.name.as_str())
    }

    /// The external mode registered in place of `internal`, if any.
    pub fn replacement_for(&self, internal: ModeId) -> Option<ModeId> {
        self.registrations
            .iter()
            .find(|r| r.replaces == Some(internal))
            .map(|r| r.mode_id)
    }

    pub fn registered_modes(&self) -> Vec<ModeId> {
        self.registrations
            .iter()
            .map(|r| r.mode_id)
            .filter(|id| id.is_valid())
            .collect()
    }

    /// Next check request. Request ids wrap around.
    pub fn next_check_request(&mut self) -> ArmingCheckRequest {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        ArmingCheckRequest {
            timestamp: timestamp_micros(),
            request_id,
        }
    }

    /// Record a reply. Replies from unknown registrations are ignored.
    pub fn record_reply(&mut self, reply: &ArmingCheckReply, now: Instant) {
        let known = self
            .registrations
            .iter()
            .any(|r| r.arming_check_id == reply.registration_id);
        if !known {
            warn!(registration_id = reply.registration_id, "reply from unknown arming check");
            return;
        }
        self.watchdog.heartbeat(&reply.registration_id, now);
        self.replies.insert(reply.registration_id, *reply);
    }

    /// Decide whether `mode_id` may currently be selected.
    ///
    /// # Errors
    ///
    /// [`AdmissionError::NoReply`] when the mode is unknown or its last reply
    /// is missing or stale, otherwise whatever the [`AdmissionGate`] reports.
    pub fn admit(&self, mode_id: ModeId, now: Instant) -> Result<(), AdmissionError> {
        let registration = self
            .registrations
            .iter()
            .find(|r| r.mode_id == mode_id && mode_id.is_valid())
            .ok_or(AdmissionError::NoReply(mode_id))?;
        let id = registration.arming_check_id;
        let reply = match self.watchdog.health(&id, now) {
            ComponentHealth::Healthy => self.replies.get(&id),
            ComponentHealth::Pending | ComponentHealth::TimedOut => None,
        };
        self.gate.admit(mode_id, reply)
    }

    fn next_free_mode_id(&self) -> Option<ModeId> {
        (ModeId::EXTERNAL1.0..=ModeId::EXTERNAL8.0)
            .map(ModeId)
            .find(|id| self.registrations.iter().all(|r| r.mode_id != *id))
    }

    fn next_free_arming_check_id(&self) -> Option<u8> {
        (0..=u8::MAX).find(|id| self.registrations.iter().all(|r| r.arming_check_id != *id))
    }
}

impl RegistrationAuthority for LocalAuthority {
    fn schema_versions(&self) -> Vec<MessageVersion> {
        self.schema_versions.clone()
    }

    fn register(
        &mut self,
        settings: &RegistrationSettings,
    ) -> Result<RegisteredIdentity, RegistrationError> {
        validate_name(&settings.name)?;
        if self.registrations.iter().any(|r| r.name == settings.name) {
            return Err(RegistrationError::DuplicateName(settings.name.clone()));
        }
        let mode_id = if settings.register_mode {
            self.next_free_mode_id().ok_or(RegistrationError::NoFreeModeId)?
        } else {
            ModeId::INVALID
        };
        let arming_check_id = self
            .next_free_arming_check_id()
            .ok_or(RegistrationError::NoFreeArmingCheckId)?;

        if settings.register_arming_check {
            self.watchdog
                .register(arming_check_id, self.reply_deadline, Instant::now());
        }
        self.registrations.push(Registration {
            name: settings.name.clone(),
            mode_id,
            arming_check_id,
            replaces: settings.replace_internal_mode,
        });
        info!(
            name = %settings.name,
            mode_id = %mode_id,
            arming_check_id,
            "component registered"
        );
        Ok(RegisteredIdentity {
            mode_id,
            arming_check_id,
        })
    }

    fn unregister(&mut self, mode_id: ModeId) -> Result<(), RegistrationError> {
        let index = self
            .registrations
            .iter()
            .position(|r| r.mode_id == mode_id && mode_id.is_valid())
            .ok_or(RegistrationError::UnknownMode(mode_id))?;
        let removed = self.registrations.remove(index);
        self.watchdog.unregister(&removed.arming_check_id);
        self.replies.remove(&removed.arming_check_id);
        debug!(name = %removed.name, mode_id = %mode_id, "component unregistered");
        Ok(())
    }
}
