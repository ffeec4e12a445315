//! Health and arming checks.
//!
//! The mode authority periodically sends an [`ArmingCheckRequest`]. For each
//! request [`HealthAndArmingChecks::handle_request`] allocates a fresh
//! [`ArmingCheckReply`], hands a [`HealthAndArmingCheckReporter`] bound to it
//! to the registered [`ArmingCheck`], attaches the current
//! [`ModeRequirements`] and returns the reply. Replies are never retained
//! between requests.
//!
//! # Watchdog
//!
//! [`HealthAndArmingChecks::watchdog_tick`] must be called once per watchdog
//! period. If no request arrived since the previous tick the authority has
//! stopped asking (e.g. the flight controller rebooted) and the tick reports
//! [`WatchdogVerdict::Timeout`]; whether that escalates to shutting the
//! owning process down is configured with
//! [`HealthAndArmingChecks::set_shutdown_on_timeout`].

use std::time::Duration;

use skymode_types::{
    schema_versions, timestamp_micros, ArmingCheckReply, ArmingCheckRequest, EventArguments,
    EventType, LogLevels, ModeRequirements, ARMING_CHECK_MAX_EVENTS,
};
use tracing::{debug, error, warn};

use crate::compatibility::check_message_compatibility;
use crate::registration::{RegistrationAuthority, RegistrationSettings};

/// Default period between two watchdog ticks.
pub const DEFAULT_WATCHDOG_PERIOD: Duration = Duration::from_secs(4);

// ────────────────────────────────────────────────────────────────────────────
// Reporter
// ────────────────────────────────────────────────────────────────────────────

/// Write access to one in-flight [`ArmingCheckReply`].
///
/// # Example
///
/// ```
/// use skymode_kernel::health_checks::HealthAndArmingCheckReporter;
/// use skymode_types::{event_id, ArmingCheckReply, LogLevel};
///
/// let mut reply = ArmingCheckReply::<2>::new(0, 0);
/// let mut reporter = HealthAndArmingCheckReporter::new(&mut reply);
/// reporter.report_failure(event_id("no_gps"), LogLevel::Error, "No GPS fix", (3u8,));
///
/// assert!(!reply.can_arm_and_run);
/// assert_eq!(reply.events().len(), 1);
/// ```
pub struct HealthAndArmingCheckReporter<'a, const N: usize = ARMING_CHECK_MAX_EVENTS> {
    reply: &'a mut ArmingCheckReply<N>,
}

impl<'a, const N: usize> HealthAndArmingCheckReporter<'a, N> {
    pub fn new(reply: &'a mut ArmingCheckReply<N>) -> Self {
        Self { reply }
    }

    /// Report a condition that prevents arming or running the mode.
    ///
    /// `can_arm_and_run` is forced `false`. The event is attached unless the
    /// reply is already full, in which case it is dropped with a warning.
    /// `message` is only logged; the receiver resolves the text from
    /// `event_id`.
    pub fn report_failure<A: EventArguments>(
        &mut self,
        event_id: u32,
        log_levels: impl Into<LogLevels>,
        message: &str,
        args: A,
    ) {
        self.reply.can_arm_and_run = false;
        let event = EventType::new(event_id, log_levels.into(), args);
        if !self.reply.push_event(event) {
            warn!(
                event_id,
                capacity = N,
                text = message,
                "too many events, dropping arming check failure"
            );
        } else {
            debug!(event_id, text = message, "arming check failure reported");
        }
    }

    /// Set the single health component tuple. Last write wins.
    pub fn set_component_health(
        &mut self,
        health_component_index: u8,
        is_present: bool,
        warning: bool,
        error: bool,
    ) {
        self.reply.health_component_index = health_component_index;
        self.reply.health_component_is_present = is_present;
        self.reply.health_component_warning = warning;
        self.reply.health_component_error = error;
    }

    pub fn can_arm_and_run(&self) -> bool {
        self.reply.can_arm_and_run
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Check callback
// ────────────────────────────────────────────────────────────────────────────

/// Callback invoked once per check request.
///
/// Implemented for every `FnMut(&mut HealthAndArmingCheckReporter)`.
pub trait ArmingCheck {
    fn check(&mut self, reporter: &mut HealthAndArmingCheckReporter<'_>);
}

impl<F> ArmingCheck for F
where
    F: FnMut(&mut HealthAndArmingCheckReporter<'_>),
{
    fn check(&mut self, reporter: &mut HealthAndArmingCheckReporter<'_>) {
        self(reporter)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HealthAndArmingChecks
// ────────────────────────────────────────────────────────────────────────────

/// Progress of the current check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckCycle {
    /// A check is due; no request seen since the last watchdog tick.
    Idle,
    /// A request is being answered.
    Requested,
    /// A reply was produced since the last watchdog tick.
    Reported,
}

/// Outcome of one watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    Ok,
    /// No request was received during the last period.
    Timeout { shutdown: bool },
}

/// Answers arming check requests on behalf of one registered component.
pub struct HealthAndArmingChecks {
    name: String,
    arming_check_id: Option<u8>,
    mode_requirements: ModeRequirements,
    cycle: CheckCycle,
    check_triggered: bool,
    shutdown_on_timeout: bool,
}

impl HealthAndArmingChecks {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arming_check_id: None,
            mode_requirements: ModeRequirements::default(),
            cycle: CheckCycle::Idle,
            check_triggered: true,
            shutdown_on_timeout: true,
        }
    }

    /// Register as a standalone arming check (no mode) with `authority`.
    ///
    /// Returns `false` when the message schemas are incompatible or the
    /// authority rejects the registration.
    pub fn do_register<A: RegistrationAuthority + ?Sized>(&mut self, authority: &mut A) -> bool {
        if let Err(e) = check_message_compatibility(&schema_versions(), &authority.schema_versions())
        {
            error!(component = %self.name, error = %e, "message compatibility check failed");
            return false;
        }
        let settings = RegistrationSettings::arming_check_only(&self.name);
        match authority.register(&settings) {
            Ok(identity) => {
                self.bind(identity.arming_check_id);
                true
            }
            Err(e) => {
                error!(component = %self.name, error = %e, "arming check registration failed");
                false
            }
        }
    }

    /// Bind to the arming-check id assigned by the authority. Requests are
    /// only answered once bound.
    pub fn bind(&mut self, arming_check_id: u8) {
        self.arming_check_id = Some(arming_check_id);
        self.check_triggered = true;
        self.cycle = CheckCycle::Idle;
    }

    pub fn is_bound(&self) -> bool {
        self.arming_check_id.is_some()
    }

    pub fn arming_check_id(&self) -> Option<u8> {
        self.arming_check_id
    }

    pub fn set_mode_requirements(&mut self, mode_requirements: ModeRequirements) {
        self.mode_requirements = mode_requirements;
    }

    pub fn mode_requirements(&self) -> &ModeRequirements {
        &self.mode_requirements
    }

    pub fn set_shutdown_on_timeout(&mut self, shutdown_on_timeout: bool) {
        self.shutdown_on_timeout = shutdown_on_timeout;
    }

    pub fn cycle(&self) -> CheckCycle {
        self.cycle
    }

    /// Answer `request` by running `check` against a fresh reply.
    ///
    /// Returns `None` while unbound.
    pub fn handle_request<C: ArmingCheck + ?Sized>(
        &mut self,
        request: &ArmingCheckRequest,
        check: &mut C,
    ) -> Option<ArmingCheckReply> {
        let registration_id = self.arming_check_id?;
        self.cycle = CheckCycle::Requested;

        let mut reply = ArmingCheckReply::new(request.request_id, registration_id);
        {
            let mut reporter = HealthAndArmingCheckReporter::new(&mut reply);
            check.check(&mut reporter);
        }
        reply.mode_requirements = self.mode_requirements;
        reply.timestamp = timestamp_micros();

        self.check_triggered = true;
        self.cycle = CheckCycle::Reported;
        debug!(
            component = %self.name,
            request_id = request.request_id,
            can_arm_and_run = reply.can_arm_and_run,
            "arming check reply"
        );
        Some(reply)
    }

    /// Advance the watchdog by one period.
    pub fn watchdog_tick(&mut self) -> WatchdogVerdict {
        if !self.is_bound() {
            return WatchdogVerdict::Ok;
        }
        let verdict = if self.check_triggered {
            WatchdogVerdict::Ok
        } else {
            if self.shutdown_on_timeout {
                error!(
                    component = %self.name,
                    "timeout, no arming check request received (this can happen on flight controller reboots)"
                );
            } else {
                warn!(component = %self.name, "no arming check request received");
            }
            WatchdogVerdict::Timeout {
                shutdown: self.shutdown_on_timeout,
            }
        };
        self.check_triggered = false;
        self.cycle = CheckCycle::Idle;
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymode_types::{event_id, LogLevel};

    fn request(request_id: u8) -> ArmingCheckRequest {
        ArmingCheckRequest {
            timestamp: 0,
            request_id,
        }
    }

    #[test]
    fn capacity_overflow_drops_events_but_still_fails() {
        let mut reply = ArmingCheckReply::<2>::new(0, 0);
        let mut reporter = HealthAndArmingCheckReporter::new(&mut reply);
        for i in 0..3u8 {
            reporter.report_failure(event_id("failure"), LogLevel::Error, "failure", (i,));
        }
        assert_eq!(reply.events().len(), 2);
        assert!(!reply.can_arm_and_run);
        assert_eq!(reply.events()[1].arguments[0], 1);
    }

    #[test]
    fn component_health_last_write_wins() {
        let mut reply: ArmingCheckReply = ArmingCheckReply::new(0, 0);
        let mut reporter = HealthAndArmingCheckReporter::new(&mut reply);
        reporter.set_component_health(1, true, true, false);
        reporter.set_component_health(4, true, false, true);
        assert!(reporter.can_arm_and_run());
        assert_eq!(reply.health_component_index, 4);
        assert!(reply.health_component_is_present);
        assert!(!reply.health_component_warning);
        assert!(reply.health_component_error);
    }

    #[test]
    fn unbound_checks_do_not_reply() {
        let mut checks = HealthAndArmingChecks::new("orbit");
        let mut called = false;
        let reply = checks.handle_request(&request(1), &mut |_: &mut HealthAndArmingCheckReporter<'_>| {
            called = true;
        });
        assert!(reply.is_none());
        assert!(!called);
    }

    #[test]
    fn reply_carries_request_identity_and_requirements() {
        let mut checks = HealthAndArmingChecks::new("orbit");
        checks.bind(7);
        let requirements = ModeRequirements {
            attitude: true,
            ..Default::default()
        };
        checks.set_mode_requirements(requirements);

        let reply = checks
            .handle_request(&request(42), &mut |_: &mut HealthAndArmingCheckReporter<'_>| {})
            .unwrap();
        assert_eq!(reply.request_id, 42);
        assert_eq!(reply.registration_id, 7);
        assert_eq!(reply.mode_requirements, requirements);
        assert!(reply.can_arm_and_run);
        assert_eq!(checks.cycle(), CheckCycle::Reported);
    }

    #[test]
    fn each_request_gets_a_fresh_reply() {
        let mut checks = HealthAndArmingChecks::new("orbit");
        checks.bind(1);
        let mut fail = true;
        let mut callback = |reporter: &mut HealthAndArmingCheckReporter<'_>| {
            if fail {
                reporter.report_failure(event_id("once"), LogLevel::Warning, "once", ());
            }
            fail = false;
        };
        let first = checks.handle_request(&request(1), &mut callback).unwrap();
        let second = checks.handle_request(&request(2), &mut callback).unwrap();
        assert!(!first.can_arm_and_run);
        assert!(second.can_arm_and_run);
        assert!(second.events().is_empty());
    }

    #[test]
    fn watchdog_times_out_without_requests() {
        let mut checks = HealthAndArmingChecks::new("orbit");
        checks.bind(1);
        // Binding counts as a fresh start.
        assert_eq!(checks.watchdog_tick(), WatchdogVerdict::Ok);
        assert_eq!(checks.cycle(), CheckCycle::Idle);
        assert_eq!(
            checks.watchdog_tick(),
            WatchdogVerdict::Timeout { shutdown: true }
        );
    }

    #[test]
    fn watchdog_satisfied_by_request() {
        let mut checks = HealthAndArmingChecks::new("orbit");
        checks.set_shutdown_on_timeout(false);
        checks.bind(1);
        checks.watchdog_tick();
        checks.handle_request(&request(1), &mut |_: &mut HealthAndArmingCheckReporter<'_>| {});
        assert_eq!(checks.watchdog_tick(), WatchdogVerdict::Ok);
        assert_eq!(
            checks.watchdog_tick(),
            WatchdogVerdict::Timeout { shutdown: false }
        );
    }

    #[test]
    fn watchdog_idle_while_unbound() {
        let mut checks = HealthAndArmingChecks::new("orbit");
        assert_eq!(checks.watchdog_tick(), WatchdogVerdict::Ok);
        assert_eq!(checks.watchdog_tick(), WatchdogVerdict::Ok);
    }
}
