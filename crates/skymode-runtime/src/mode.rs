//! [`ModeBase`] – the flight-mode state machine.
//!
//! A `ModeBase` wraps a user [`Mode`] and owns everything the mode needs to
//! take part in the vehicle's mode switching:
//!
//! - the [`SetpointRegistry`] and the periodic [`SetpointTimer`],
//! - the aggregated [`ModeRequirements`] and the arming check responder,
//! - the vehicle state mirrors the mode tracks,
//! - the `Inactive`/`Active` state and the one-shot completion flag.
//!
//! Vehicle status updates drive activation once the mode is registered. A mode is active exactly while
//! the vehicle's nav state is this mode's id and the vehicle is armed (or the
//! mode may run disarmed). On activation the mode's hook runs, one setpoint
//! is computed right away and the timer is armed; on deactivation the hook
//! runs and the timer is cancelled.
//!
//! Everything here is synchronous. [`ModeRunner`][crate::runner::ModeRunner]
//! feeds bus messages and timer deadlines in from a single task.

use std::time::Duration;

use skymode_kernel::{
    aggregate_with, check_message_compatibility, HealthAndArmingCheckReporter, HealthAndArmingChecks,
    RegistrationAuthority, RegistrationSettings, WatchdogVerdict, DEFAULT_WATCHDOG_PERIOD,
};
use skymode_middleware::{MessageBus, Topic};
use skymode_types::{
    schema_versions, timestamp_micros, ArmingCheckReply, ArmingCheckRequest,
    ManualControlSetpoint, Message, ModeCompleted, ModeError, ModeId, ModeRequirements,
    ModeResult, SetpointMessage, SetpointValue, VehicleStatus,
};
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::manual_control::ManualControlInput;
use crate::setpoint::{
    control_mode_for, SetpointId, SetpointRegistry, SetpointType, UPDATE_RATE_EPSILON_HZ,
};
use crate::timer::{period_for_rate, SetpointTimer};
use crate::vehicle_state::{LatestSample, VehicleStateMessage, VehicleStateMirrors};

// ─────────────────────────────────────────────────────────────────────────────
// Settings and state
// ─────────────────────────────────────────────────────────────────────────────

/// Construction-time settings of a mode. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeSettings {
    /// Unique, shorter than
    /// [`MAX_NAME_LENGTH`][skymode_kernel::MAX_NAME_LENGTH] characters.
    pub name: String,
    /// Built-in mode to take the place of.
    pub replace_internal_mode: Option<ModeId>,
    pub activate_even_while_disarmed: bool,
}

impl ModeSettings {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replace_internal_mode: None,
            activate_even_while_disarmed: false,
        }
    }

    pub fn replacing(mut self, internal_mode: ModeId) -> Self {
        self.replace_internal_mode = Some(internal_mode);
        self
    }

    pub fn activate_even_while_disarmed(mut self, allow: bool) -> Self {
        self.activate_even_while_disarmed = allow;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    Inactive,
    Active,
}

// ─────────────────────────────────────────────────────────────────────────────
// Mode hooks
// ─────────────────────────────────────────────────────────────────────────────

/// User logic of a flight mode.
///
/// Every hook runs to completion on the runner's task; none may block.
pub trait Mode {
    fn on_activate(&mut self, ctx: &mut ModeContext<'_>);

    fn on_deactivate(&mut self, ctx: &mut ModeContext<'_>);

    /// Compute and send setpoints. `dt_s` is the time since the previous
    /// call, or the nominal period for the first call after activation.
    fn update_setpoint(&mut self, _dt_s: f32, _ctx: &mut ModeContext<'_>) {}

    /// Report anything that should keep the vehicle from arming into, or
    /// keep running, this mode.
    fn check_arming_and_run_conditions(&mut self, _reporter: &mut HealthAndArmingCheckReporter<'_>) {}
}

/// The operations a [`Mode`] may perform on its owning [`ModeBase`] from
/// inside a hook.
pub struct ModeContext<'a> {
    core: &'a mut ModeCore,
}

impl ModeContext<'_> {
    pub fn mode_id(&self) -> ModeId {
        self.core.mode_id
    }

    pub fn name(&self) -> &str {
        &self.core.settings.name
    }

    pub fn is_armed(&self) -> bool {
        self.core.armed
    }

    /// See [`ModeBase::completed`].
    pub fn completed(&mut self, result: ModeResult) {
        self.core.completed(result);
    }

    /// Switch the active setpoint type. Publishes a new control-mode
    /// descriptor even when `id` is already active.
    ///
    /// # Errors
    ///
    /// [`ModeError::UnknownSetpointType`] for a foreign handle.
    pub fn activate_setpoint_type(&mut self, id: SetpointId) -> Result<(), ModeError> {
        self.core.activate_setpoint_type(id)
    }

    /// Publish `value` through setpoint type `id`, activating it first if
    /// another type is active.
    ///
    /// # Errors
    ///
    /// [`ModeError::UnknownSetpointType`] for a foreign handle.
    pub fn send_setpoint(&mut self, id: SetpointId, value: SetpointValue) -> Result<(), ModeError> {
        self.core.send_setpoint(id, value)
    }

    /// See [`ModeBase::set_setpoint_update_rate`].
    pub fn set_setpoint_update_rate(&mut self, rate_hz: f32) {
        self.core.set_setpoint_update_rate(rate_hz, Instant::now());
    }

    pub fn manual_control_input(&self) -> Option<&ManualControlInput> {
        self.core.manual_control.as_ref()
    }

    /// Mirror of `T`, when the mode tracks it.
    pub fn vehicle_state<T: VehicleStateMessage>(&self) -> Option<&LatestSample<T>> {
        self.core.vehicle_state.get::<T>()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Core state
// ─────────────────────────────────────────────────────────────────────────────

struct ModeCore {
    settings: ModeSettings,
    bus: MessageBus,
    mode_id: ModeId,
    registered: bool,
    state: ModeState,
    armed: bool,
    completed: bool,
    completed_twice_logged: bool,
    setpoints: SetpointRegistry,
    declared_requirements: ModeRequirements,
    require_manual_control: bool,
    manual_control: Option<ManualControlInput>,
    vehicle_state: VehicleStateMirrors,
    checks: HealthAndArmingChecks,
    watchdog_period: Duration,
    update_rate_hz: f32,
    timer: SetpointTimer,
    last_setpoint_update: Instant,
}

impl ModeCore {
    fn update_requirements(&mut self) {
        let requirements = aggregate_with(
            self.setpoints.configurations(),
            self.declared_requirements,
            self.require_manual_control,
        );
        self.checks.set_mode_requirements(requirements);
    }

    fn completed(&mut self, result: ModeResult) {
        if self.completed {
            if !self.completed_twice_logged {
                self.completed_twice_logged = true;
                debug!(mode = %self.settings.name, "completed was already called");
            }
            return;
        }
        self.bus.publish(Message::ModeCompleted(ModeCompleted {
            timestamp: timestamp_micros(),
            nav_state: self.mode_id,
            result,
        }));
        self.completed = true;
        debug!(mode = %self.settings.name, result = ?result, "mode completed");
    }

    fn activate_setpoint_type(&mut self, id: SetpointId) -> Result<(), ModeError> {
        let changed = self.setpoints.activate(id)?;
        let setpoint_type = self
            .setpoints
            .get(id)
            .ok_or(ModeError::UnknownSetpointType(id.index()))?;
        if changed {
            debug!(
                mode = %self.settings.name,
                setpoint_type = setpoint_type.name(),
                "changing setpoint type"
            );
        }
        let control_mode = control_mode_for(self.mode_id, setpoint_type.configuration());
        self.bus.publish(Message::ControlMode(control_mode));
        Ok(())
    }

    fn send_setpoint(&mut self, id: SetpointId, value: SetpointValue) -> Result<(), ModeError> {
        if !self.setpoints.is_active(id) {
            self.activate_setpoint_type(id)?;
        }
        let setpoint_type = self
            .setpoints
            .get(id)
            .ok_or(ModeError::UnknownSetpointType(id.index()))?;
        self.bus.publish(Message::Setpoint(SetpointMessage {
            timestamp: timestamp_micros(),
            source_id: self.mode_id,
            setpoint_type: setpoint_type.name().to_string(),
            value,
        }));
        Ok(())
    }

    fn update_setpoint_timer(&mut self, now: Instant) {
        match period_for_rate(self.update_rate_hz) {
            Some(period) if self.state == ModeState::Active => {
                if !self.timer.is_running() {
                    self.timer.start(period, now);
                }
            }
            _ => self.timer.cancel(),
        }
    }

    fn set_setpoint_update_rate(&mut self, rate_hz: f32, now: Instant) {
        self.timer.cancel();
        self.update_rate_hz = rate_hz;
        self.update_setpoint_timer(now);
    }

    fn context(&mut self) -> ModeContext<'_> {
        ModeContext { core: self }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ModeBase
// ─────────────────────────────────────────────────────────────────────────────

/// State machine around a user [`Mode`].
///
/// # Example
///
/// ```
/// use skymode_kernel::LocalAuthority;
/// use skymode_middleware::MessageBus;
/// use skymode_runtime::mode::{Mode, ModeBase, ModeContext, ModeSettings};
/// use skymode_runtime::setpoint::SetpointType;
/// use skymode_types::VehicleStatus;
///
/// struct Idle;
/// impl Mode for Idle {
///     fn on_activate(&mut self, _: &mut ModeContext<'_>) {}
///     fn on_deactivate(&mut self, _: &mut ModeContext<'_>) {}
/// }
///
/// let bus = MessageBus::new();
/// let mut authority = LocalAuthority::new();
/// let mut mode = ModeBase::new(Idle, ModeSettings::new("Idle"), &bus, "");
/// mode.add_setpoint_type(SetpointType::rates()).unwrap();
/// assert!(mode.do_register(&mut authority));
///
/// mode.vehicle_status_updated(&VehicleStatus::new(true, mode.id()), false);
/// assert!(mode.is_active());
/// ```
pub struct ModeBase<M> {
    mode: M,
    core: ModeCore,
}

impl<M: Mode> ModeBase<M> {
    /// Create an unregistered mode publishing under `topic_namespace_prefix`
    /// on `bus` (the bus's own namespace when empty).
    pub fn new(mode: M, settings: ModeSettings, bus: &MessageBus, topic_namespace_prefix: &str) -> Self {
        let bus = if topic_namespace_prefix.is_empty() {
            bus.clone()
        } else {
            bus.namespaced(topic_namespace_prefix)
        };
        let checks = HealthAndArmingChecks::new(settings.name.clone());
        Self {
            mode,
            core: ModeCore {
                settings,
                bus,
                mode_id: ModeId::INVALID,
                registered: false,
                state: ModeState::Inactive,
                armed: false,
                completed: false,
                completed_twice_logged: false,
                setpoints: SetpointRegistry::default(),
                declared_requirements: ModeRequirements::default(),
                require_manual_control: false,
                manual_control: None,
                vehicle_state: VehicleStateMirrors::default(),
                checks,
                watchdog_period: DEFAULT_WATCHDOG_PERIOD,
                update_rate_hz: 0.0,
                timer: SetpointTimer::new(),
                last_setpoint_update: Instant::now(),
            },
        }
    }

    /// Whether a watchdog timeout shuts the mode down.
    pub fn set_shutdown_on_watchdog_timeout(&mut self, shutdown: bool) {
        self.core.checks.set_shutdown_on_timeout(shutdown);
    }

    pub fn set_watchdog_period(&mut self, period: Duration) {
        self.core.watchdog_period = period;
    }

    // ── Setup (before registration) ─────────────────────────────────────────

    /// Add a setpoint type and refresh the aggregated requirements.
    ///
    /// # Errors
    ///
    /// [`ModeError::AlreadyRegistered`] once the mode is registered.
    pub fn add_setpoint_type(&mut self, setpoint_type: SetpointType) -> Result<SetpointId, ModeError> {
        self.ensure_unregistered()?;
        let id = self.core.setpoints.add(setpoint_type);
        self.core.update_requirements();
        Ok(id)
    }

    /// Subscribe the mode to manual control input. A non-optional input
    /// makes manual control a requirement of the mode.
    ///
    /// # Errors
    ///
    /// [`ModeError::AlreadyRegistered`] once the mode is registered.
    pub fn create_manual_control_input(&mut self, optional: bool) -> Result<(), ModeError> {
        self.ensure_unregistered()?;
        if !optional {
            self.core.require_manual_control = true;
            self.core.update_requirements();
        }
        self.core.manual_control.get_or_insert_with(ManualControlInput::new);
        Ok(())
    }

    /// Declare requirements the setpoint types do not imply, such as
    /// `global_position`, `mission` or `prevent_arming`. Flags accumulate.
    ///
    /// # Errors
    ///
    /// [`ModeError::AlreadyRegistered`] once the mode is registered.
    pub fn add_mode_requirements(&mut self, requirements: ModeRequirements) -> Result<(), ModeError> {
        self.ensure_unregistered()?;
        self.core.declared_requirements |= requirements;
        self.core.update_requirements();
        Ok(())
    }

    /// Mirror vehicle state message `T` and take on its requirements.
    ///
    /// # Errors
    ///
    /// [`ModeError::AlreadyRegistered`] once the mode is registered.
    pub fn track_vehicle_state<T: VehicleStateMessage>(&mut self) -> Result<(), ModeError> {
        self.ensure_unregistered()?;
        let requirements = self.core.vehicle_state.track::<T>();
        self.core.declared_requirements |= requirements;
        self.core.update_requirements();
        Ok(())
    }

    fn ensure_unregistered(&self) -> Result<(), ModeError> {
        if self.core.registered {
            Err(ModeError::AlreadyRegistered(self.core.settings.name.clone()))
        } else {
            Ok(())
        }
    }

    // ── Registration ────────────────────────────────────────────────────────

    /// Register with `authority` and return the assigned id.
    ///
    /// On success the first setpoint type is activated and the setpoint
    /// update rate is derived from all setpoint types.
    ///
    /// # Errors
    ///
    /// - [`ModeError::AlreadyRegistered`] when called twice.
    /// - [`ModeError::Incompatible`] when the message schemas differ.
    /// - [`ModeError::NoSetpointTypes`] when no setpoint type was added.
    /// - [`ModeError::Registration`] when the authority rejects the mode.
    pub fn try_register<A: RegistrationAuthority + ?Sized>(
        &mut self,
        authority: &mut A,
    ) -> Result<ModeId, ModeError> {
        self.ensure_unregistered()?;
        let name = self.core.settings.name.clone();

        check_message_compatibility(&schema_versions(), &authority.schema_versions())
            .map_err(|e| ModeError::Incompatible(e.to_string()))?;

        let first = self.core.setpoints.first().ok_or_else(|| {
            error!(mode = %name, fatal = true, "at least one setpoint type must be added");
            ModeError::NoSetpointTypes(name.clone())
        })?;

        let settings = RegistrationSettings::mode(&name, self.core.settings.replace_internal_mode);
        let identity = authority
            .register(&settings)
            .map_err(|e| ModeError::Registration {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        self.core.mode_id = identity.mode_id;
        self.core.checks.bind(identity.arming_check_id);
        self.core.registered = true;

        self.core.activate_setpoint_type(first)?;
        if let Some(rate_hz) = self.core.setpoints.update_rate_hz().filter(|r| *r > 0.0) {
            self.set_setpoint_update_rate(rate_hz);
        }
        info!(mode = %name, mode_id = %identity.mode_id, "mode registered");
        Ok(identity.mode_id)
    }

    /// [`try_register`][Self::try_register] that logs the failure and
    /// returns `false` instead.
    pub fn do_register<A: RegistrationAuthority + ?Sized>(&mut self, authority: &mut A) -> bool {
        match self.try_register(authority) {
            Ok(_) => true,
            Err(e) => {
                error!(mode = %self.core.settings.name, error = %e, "mode registration failed");
                false
            }
        }
    }

    // ── Inbound events ──────────────────────────────────────────────────────

    /// React to a vehicle status update. Ignored until the mode is
    /// registered.
    ///
    /// With `suppress_activation` the armed state is recorded but an
    /// activation is skipped; the mode stays inactive.
    pub fn vehicle_status_updated(&mut self, status: &VehicleStatus, suppress_activation: bool) {
        if !self.core.registered {
            return;
        }
        self.core.armed = status.armed();
        let should_be_active = status.nav_state == self.core.mode_id
            && (self.core.armed || self.core.settings.activate_even_while_disarmed);
        let is_active = self.core.state == ModeState::Active;

        if should_be_active == is_active {
            return;
        }
        if should_be_active {
            if !suppress_activation {
                self.activate(Instant::now());
            }
        } else {
            self.deactivate(Instant::now());
        }
    }

    fn activate(&mut self, now: Instant) {
        debug!(mode = %self.core.settings.name, "mode activated");
        self.core.state = ModeState::Active;
        self.core.completed = false;
        self.core.last_setpoint_update = now;
        self.mode.on_activate(&mut self.core.context());

        let rate_hz = self.core.update_rate_hz;
        let dt_s = if rate_hz > UPDATE_RATE_EPSILON_HZ {
            1.0 / rate_hz
        } else {
            0.0
        };
        self.mode.update_setpoint(dt_s, &mut self.core.context());
        self.core.update_setpoint_timer(now);
    }

    fn deactivate(&mut self, now: Instant) {
        debug!(mode = %self.core.settings.name, "mode deactivated");
        self.core.state = ModeState::Inactive;
        self.mode.on_deactivate(&mut self.core.context());
        self.core.update_setpoint_timer(now);
    }

    /// Run the periodic setpoint update if its deadline has passed. Returns
    /// whether an update ran.
    pub fn poll_setpoint_timer(&mut self, now: Instant) -> bool {
        if !self.core.timer.poll(now) {
            return false;
        }
        let dt_s = now
            .saturating_duration_since(self.core.last_setpoint_update)
            .as_secs_f32();
        self.core.last_setpoint_update = now;
        self.mode.update_setpoint(dt_s, &mut self.core.context());
        true
    }

    /// Change the periodic setpoint rate. The timer restarts; rates at or
    /// below [`UPDATE_RATE_EPSILON_HZ`] stop periodic updates.
    pub fn set_setpoint_update_rate(&mut self, rate_hz: f32) {
        self.core.set_setpoint_update_rate(rate_hz, Instant::now());
    }

    /// Answer an arming check request and publish the reply.
    pub fn handle_check_request(&mut self, request: &ArmingCheckRequest) -> Option<ArmingCheckReply> {
        let mode = &mut self.mode;
        let reply = self.core.checks.handle_request(
            request,
            &mut |reporter: &mut HealthAndArmingCheckReporter<'_>| {
                mode.check_arming_and_run_conditions(reporter)
            },
        )?;
        self.core.bus.publish(Message::ArmingCheckReply(reply));
        Some(reply)
    }

    pub fn watchdog_tick(&mut self) -> WatchdogVerdict {
        self.core.checks.watchdog_tick()
    }

    pub fn handle_manual_control(&mut self, sample: ManualControlSetpoint, now: Instant) {
        if let Some(input) = self.core.manual_control.as_mut() {
            input.update(sample, now);
        }
    }

    /// Store a vehicle state sample in its mirror. Returns `false` for
    /// messages the mode does not track.
    pub fn handle_vehicle_state(&mut self, message: Message, now: Instant) -> bool {
        self.core.vehicle_state.update(message, now)
    }

    // ── Outbound ────────────────────────────────────────────────────────────

    /// Report that the mode finished. Only the first call per activation
    /// publishes a completion; later calls are ignored.
    pub fn completed(&mut self, result: ModeResult) {
        self.core.completed(result);
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    /// Assigned id, [`ModeId::INVALID`] before registration.
    pub fn id(&self) -> ModeId {
        self.core.mode_id
    }

    pub fn name(&self) -> &str {
        &self.core.settings.name
    }

    pub fn settings(&self) -> &ModeSettings {
        &self.core.settings
    }

    pub fn state(&self) -> ModeState {
        self.core.state
    }

    pub fn is_active(&self) -> bool {
        self.core.state == ModeState::Active
    }

    pub fn is_armed(&self) -> bool {
        self.core.armed
    }

    pub fn is_registered(&self) -> bool {
        self.core.registered
    }

    pub fn is_completed(&self) -> bool {
        self.core.completed
    }

    pub fn mode_requirements(&self) -> &ModeRequirements {
        self.core.checks.mode_requirements()
    }

    pub fn setpoints(&self) -> &SetpointRegistry {
        &self.core.setpoints
    }

    pub fn setpoint_update_rate_hz(&self) -> f32 {
        self.core.update_rate_hz
    }

    /// Period of the running setpoint timer.
    pub fn setpoint_timer_period(&self) -> Option<Duration> {
        self.core.timer.period()
    }

    pub fn setpoint_deadline(&self) -> Option<Instant> {
        self.core.timer.deadline()
    }

    pub fn watchdog_period(&self) -> Duration {
        self.core.watchdog_period
    }

    pub fn has_manual_control_input(&self) -> bool {
        self.core.manual_control.is_some()
    }

    pub fn tracks_vehicle_state(&self, topic: Topic) -> bool {
        self.core.vehicle_state.is_tracked(topic)
    }

    pub fn vehicle_state<T: VehicleStateMessage>(&self) -> Option<&LatestSample<T>> {
        self.core.vehicle_state.get::<T>()
    }

    pub fn bus(&self) -> &MessageBus {
        &self.core.bus
    }

    pub fn mode(&self) -> &M {
        &self.mode
    }

    pub fn mode_mut(&mut self) -> &mut M {
        &mut self.mode
    }
}
