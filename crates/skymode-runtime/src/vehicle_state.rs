//! Latest-sample mirrors of vehicle state topics.
//!
//! A mode opts into a mirror with
//! [`ModeBase::track_vehicle_state`][crate::mode::ModeBase::track_vehicle_state]
//! before registering. Tracking may raise a requirement: a mode that reads
//! the home position can only run once the vehicle has one.
//!
//! | Message | Topic | Requirement |
//! |---|---|---|
//! | [`VehicleStatus`] | [`Topic::VehicleStatus`] | – |
//! | [`VehicleLandDetected`] | [`Topic::LandDetected`] | – |
//! | [`VtolVehicleStatus`] | [`Topic::VtolStatus`] | – |
//! | [`HomePosition`] | [`Topic::HomePosition`] | `home_position` |
//! | [`BatteryStatus`] | [`Topic::BatteryStatus`] | – |

use std::time::Duration;

use skymode_middleware::Topic;
use skymode_types::{
    BatteryStatus, HomePosition, Message, ModeRequirements, VehicleLandDetected, VehicleStatus,
    VtolVehicleStatus,
};
use tokio::time::Instant;

/// A vehicle status older than this no longer says anything about arming.
pub const VEHICLE_STATUS_TIMEOUT: Duration = Duration::from_secs(2);

/// Newest sample of one topic together with its arrival time.
#[derive(Debug, Clone)]
pub struct LatestSample<T> {
    last: Option<T>,
    received_at: Option<Instant>,
}

impl<T> Default for LatestSample<T> {
    fn default() -> Self {
        Self {
            last: None,
            received_at: None,
        }
    }
}

impl<T> LatestSample<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: T, now: Instant) {
        self.last = Some(sample);
        self.received_at = Some(now);
    }

    /// Newest sample, however old.
    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }

    pub fn received_at(&self) -> Option<Instant> {
        self.received_at
    }

    /// A sample exists and arrived less than `max_age` before `now`.
    pub fn last_valid(&self, max_age: Duration, now: Instant) -> bool {
        self.received_at
            .is_some_and(|at| now.saturating_duration_since(at) < max_age)
    }
}

impl LatestSample<VehicleStatus> {
    /// Armed according to a status younger than [`VEHICLE_STATUS_TIMEOUT`].
    pub fn armed(&self, now: Instant) -> bool {
        self.last_valid(VEHICLE_STATUS_TIMEOUT, now) && self.last.is_some_and(|s| s.armed())
    }
}

impl LatestSample<VehicleLandDetected> {
    pub fn landed(&self) -> bool {
        self.last.is_some_and(|s| s.landed)
    }
}

/// A message that can be mirrored into [`VehicleStateMirrors`].
pub trait VehicleStateMessage: Sized {
    const TOPIC: Topic;

    /// Requirements raised by tracking this message.
    fn requirements() -> ModeRequirements {
        ModeRequirements::default()
    }

    fn slot(mirrors: &VehicleStateMirrors) -> &Option<LatestSample<Self>>;

    fn slot_mut(mirrors: &mut VehicleStateMirrors) -> &mut Option<LatestSample<Self>>;
}

impl VehicleStateMessage for VehicleStatus {
    const TOPIC: Topic = Topic::VehicleStatus;

    fn slot(mirrors: &VehicleStateMirrors) -> &Option<LatestSample<Self>> {
        &mirrors.vehicle_status
    }

    fn slot_mut(mirrors: &mut VehicleStateMirrors) -> &mut Option<LatestSample<Self>> {
        &mut mirrors.vehicle_status
    }
}

impl VehicleStateMessage for VehicleLandDetected {
    const TOPIC: Topic = Topic::LandDetected;

    fn slot(mirrors: &VehicleStateMirrors) -> &Option<LatestSample<Self>> {
        &mirrors.land_detected
    }

    fn slot_mut(mirrors: &mut VehicleStateMirrors) -> &mut Option<LatestSample<Self>> {
        &mut mirrors.land_detected
    }
}

impl VehicleStateMessage for VtolVehicleStatus {
    const TOPIC: Topic = Topic::VtolStatus;

    fn slot(mirrors: &VehicleStateMirrors) -> &Option<LatestSample<Self>> {
        &mirrors.vtol_status
    }

    fn slot_mut(mirrors: &mut VehicleStateMirrors) -> &mut Option<LatestSample<Self>> {
        &mut mirrors.vtol_status
    }
}

impl VehicleStateMessage for HomePosition {
    const TOPIC: Topic = Topic::HomePosition;

    fn requirements() -> ModeRequirements {
        ModeRequirements {
            home_position: true,
            ..Default::default()
        }
    }

    fn slot(mirrors: &VehicleStateMirrors) -> &Option<LatestSample<Self>> {
        &mirrors.home_position
    }

    fn slot_mut(mirrors: &mut VehicleStateMirrors) -> &mut Option<LatestSample<Self>> {
        &mut mirrors.home_position
    }
}

impl VehicleStateMessage for BatteryStatus {
    const TOPIC: Topic = Topic::BatteryStatus;

    fn slot(mirrors: &VehicleStateMirrors) -> &Option<LatestSample<Self>> {
        &mirrors.battery
    }

    fn slot_mut(mirrors: &mut VehicleStateMirrors) -> &mut Option<LatestSample<Self>> {
        &mut mirrors.battery
    }
}

/// The set of mirrors a mode tracks. Untracked messages are dropped.
#[derive(Debug, Clone, Default)]
pub struct VehicleStateMirrors {
    vehicle_status: Option<LatestSample<VehicleStatus>>,
    land_detected: Option<LatestSample<VehicleLandDetected>>,
    vtol_status: Option<LatestSample<VtolVehicleStatus>>,
    home_position: Option<LatestSample<HomePosition>>,
    battery: Option<LatestSample<BatteryStatus>>,
}

impl VehicleStateMirrors {
    /// Start mirroring `T`. Returns the requirements that come with it.
    pub fn track<T: VehicleStateMessage>(&mut self) -> ModeRequirements {
        T::slot_mut(self).get_or_insert_with(LatestSample::new);
        T::requirements()
    }

    pub fn get<T: VehicleStateMessage>(&self) -> Option<&LatestSample<T>> {
        T::slot(self).as_ref()
    }

    pub fn is_tracked(&self, topic: Topic) -> bool {
        match topic {
            Topic::VehicleStatus => self.vehicle_status.is_some(),
            Topic::LandDetected => self.land_detected.is_some(),
            Topic::VtolStatus => self.vtol_status.is_some(),
            Topic::HomePosition => self.home_position.is_some(),
            Topic::BatteryStatus => self.battery.is_some(),
            _ => false,
        }
    }

    /// Store `message` in its mirror. Returns `false` when the message is
    /// not vehicle state or its mirror is not tracked.
    pub fn update(&mut self, message: Message, now: Instant) -> bool {
        match message {
            Message::VehicleStatus(m) => store(&mut self.vehicle_status, m, now),
            Message::LandDetected(m) => store(&mut self.land_detected, m, now),
            Message::VtolStatus(m) => store(&mut self.vtol_status, m, now),
            Message::HomePosition(m) => store(&mut self.home_position, m, now),
            Message::BatteryStatus(m) => store(&mut self.battery, m, now),
            _ => false,
        }
    }
}

fn store<T>(slot: &mut Option<LatestSample<T>>, sample: T, now: Instant) -> bool {
    match slot {
        Some(mirror) => {
            mirror.update(sample, now);
            true
        }
        None => false,
    }
}
