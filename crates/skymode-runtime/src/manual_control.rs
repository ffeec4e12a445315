//! Mirror of the pilot's stick input.

use std::time::Duration;

use skymode_types::ManualControlSetpoint;
use tokio::time::Instant;

use crate::vehicle_state::LatestSample;

/// A sample older than this is no longer valid.
pub const MANUAL_CONTROL_TIMEOUT: Duration = Duration::from_millis(500);

/// Latest [`ManualControlSetpoint`] with its arrival time.
///
/// Axis accessors return `0.0` until the first sample arrives.
#[derive(Debug, Clone, Default)]
pub struct ManualControlInput {
    sample: LatestSample<ManualControlSetpoint>,
}

impl ManualControlInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: ManualControlSetpoint, now: Instant) {
        self.sample.update(sample, now);
    }

    /// The sample is flagged valid and younger than
    /// [`MANUAL_CONTROL_TIMEOUT`].
    pub fn is_valid(&self, now: Instant) -> bool {
        self.sample.last_valid(MANUAL_CONTROL_TIMEOUT, now) && self.latest().valid
    }

    pub fn roll(&self) -> f32 {
        self.latest().roll
    }

    pub fn pitch(&self) -> f32 {
        self.latest().pitch
    }

    pub fn yaw(&self) -> f32 {
        self.latest().yaw
    }

    pub fn throttle(&self) -> f32 {
        self.latest().throttle
    }

    /// Auxiliary channel `1..=6`.
    pub fn aux(&self, channel: usize) -> Option<f32> {
        channel
            .checked_sub(1)
            .and_then(|i| self.latest().aux.get(i).copied())
    }

    fn latest(&self) -> ManualControlSetpoint {
        self.sample.last().copied().unwrap_or_default()
    }
}
