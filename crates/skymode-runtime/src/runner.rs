//! [`ModeRunner`] – drives a registered [`ModeBase`] from the message bus.
//!
//! One task, one `select!` loop. Each iteration handles exactly one of:
//!
//! 1. a vehicle status update (best effort, newest sample wins),
//! 2. an arming check request,
//! 3. a manual control sample, when the mode has a manual control input,
//! 4. a vehicle state sample for a mirror the mode tracks,
//! 5. the setpoint timer deadline,
//! 6. a watchdog tick,
//! 7. the shutdown signal.
//!
//! Because every handler runs to completion before the next message is
//! looked at, the mode's state needs no locking.

use std::future::{pending, Future};

use skymode_kernel::WatchdogVerdict;
use skymode_middleware::{Topic, TopicReceiver};
use skymode_types::{Message, ModeError};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::mode::{Mode, ModeBase};

pub struct ModeRunner<M> {
    mode: ModeBase<M>,
    vehicle_status: TopicReceiver,
    check_requests: TopicReceiver,
    manual_control: Option<TopicReceiver>,
    land_detected: Option<TopicReceiver>,
    vtol_status: Option<TopicReceiver>,
    home_position: Option<TopicReceiver>,
    battery: Option<TopicReceiver>,
}

impl<M: Mode> ModeRunner<M> {
    /// Subscribe `mode`'s inbound topics. Messages published after this
    /// call are delivered once [`run`][Self::run] starts.
    pub fn new(mode: ModeBase<M>) -> Self {
        let bus = mode.bus();
        let vehicle_status = bus.subscribe(Topic::VehicleStatus);
        let check_requests = bus.subscribe(Topic::ArmingCheckRequest);
        let manual_control = mode
            .has_manual_control_input()
            .then(|| bus.subscribe(Topic::ManualControlSetpoint));
        let tracked = |topic: Topic| mode.tracks_vehicle_state(topic).then(|| bus.subscribe(topic));
        let land_detected = tracked(Topic::LandDetected);
        let vtol_status = tracked(Topic::VtolStatus);
        let home_position = tracked(Topic::HomePosition);
        let battery = tracked(Topic::BatteryStatus);
        Self {
            mode,
            vehicle_status,
            check_requests,
            manual_control,
            land_detected,
            vtol_status,
            home_position,
            battery,
        }
    }

    pub fn mode(&self) -> &ModeBase<M> {
        &self.mode
    }

    /// Run until `shutdown` resolves, then hand the mode back.
    ///
    /// # Errors
    ///
    /// - [`ModeError::NotRegistered`] when the mode was never registered.
    /// - [`ModeError::WatchdogTimeout`] when arming check requests stopped
    ///   and the mode is configured to shut down on timeout.
    pub async fn run<F>(self, shutdown: F) -> Result<ModeBase<M>, ModeError>
    where
        F: Future<Output = ()>,
    {
        let ModeRunner {
            mut mode,
            mut vehicle_status,
            mut check_requests,
            mut manual_control,
            mut land_detected,
            mut vtol_status,
            mut home_position,
            mut battery,
        } = self;

        if !mode.is_registered() {
            return Err(ModeError::NotRegistered(mode.name().to_string()));
        }

        let period = mode.watchdog_period();
        let mut watchdog = interval_at(Instant::now() + period, period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(mode = %mode.name(), mode_id = %mode.id(), "mode runner started");
        loop {
            let deadline = mode.setpoint_deadline();
            tokio::select! {
                _ = &mut shutdown => {
                    info!(mode = %mode.name(), "mode runner stopped");
                    return Ok(mode);
                }
                Some(message) = vehicle_status.recv_latest() => {
                    if let Message::VehicleStatus(status) = message {
                        mode.vehicle_status_updated(&status, false);
                        mode.handle_vehicle_state(message, Instant::now());
                    }
                }
                Some(message) = check_requests.recv_latest() => {
                    if let Message::ArmingCheckRequest(request) = message {
                        mode.handle_check_request(&request);
                    }
                }
                Some(message) = recv_optional(&mut manual_control) => {
                    if let Message::ManualControlSetpoint(sample) = message {
                        mode.handle_manual_control(sample, Instant::now());
                    }
                }
                Some(message) = recv_optional(&mut land_detected) => {
                    mode.handle_vehicle_state(message, Instant::now());
                }
                Some(message) = recv_optional(&mut vtol_status) => {
                    mode.handle_vehicle_state(message, Instant::now());
                }
                Some(message) = recv_optional(&mut home_position) => {
                    mode.handle_vehicle_state(message, Instant::now());
                }
                Some(message) = recv_optional(&mut battery) => {
                    mode.handle_vehicle_state(message, Instant::now());
                }
                _ = sleep_until_deadline(deadline) => {
                    mode.poll_setpoint_timer(Instant::now());
                }
                _ = watchdog.tick() => {
                    match mode.watchdog_tick() {
                        WatchdogVerdict::Ok => {}
                        WatchdogVerdict::Timeout { shutdown: true } => {
                            error!(mode = %mode.name(), "shutting down after arming check timeout");
                            return Err(ModeError::WatchdogTimeout(mode.name().to_string()));
                        }
                        WatchdogVerdict::Timeout { shutdown: false } => {
                            debug!(mode = %mode.name(), "arming check timeout ignored");
                        }
                    }
                }
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn recv_optional(receiver: &mut Option<TopicReceiver>) -> Option<Message> {
    match receiver {
        Some(receiver) => receiver.recv_latest().await,
        None => pending().await,
    }
}
