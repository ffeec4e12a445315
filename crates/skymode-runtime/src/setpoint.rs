//! Setpoint types and the per-mode [`SetpointRegistry`].
//!
//! A mode declares up front which kinds of setpoints it may produce. Exactly
//! one of them is active at a time; switching publishes a new
//! [`ControlMode`] descriptor so the autopilot reconfigures the controllers
//! running beneath the mode.

use skymode_types::{timestamp_micros, ControlMode, ModeError, ModeId, SetpointConfiguration};

/// Rates at or below this are treated as "no periodic updates".
pub const UPDATE_RATE_EPSILON_HZ: f32 = f32::EPSILON;

/// Rate used when a setpoint type does not ask for anything else.
pub const DEFAULT_UPDATE_RATE_HZ: f32 = 30.0;

/// A named setpoint family with its controller configuration and desired
/// update rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SetpointType {
    name: String,
    configuration: SetpointConfiguration,
    desired_rate_hz: f32,
}

impl SetpointType {
    pub fn new(name: impl Into<String>, configuration: SetpointConfiguration) -> Self {
        Self {
            name: name.into(),
            configuration,
            desired_rate_hz: DEFAULT_UPDATE_RATE_HZ,
        }
    }

    pub fn with_rate_hz(mut self, desired_rate_hz: f32) -> Self {
        self.desired_rate_hz = desired_rate_hz;
        self
    }

    pub fn rates() -> Self {
        Self::new("rates", SetpointConfiguration::rates())
    }

    pub fn attitude() -> Self {
        Self::new("attitude", SetpointConfiguration::attitude())
    }

    pub fn trajectory() -> Self {
        Self::new("trajectory", SetpointConfiguration::trajectory())
    }

    pub fn goto() -> Self {
        Self::new("goto", SetpointConfiguration::goto())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn configuration(&self) -> &SetpointConfiguration {
        &self.configuration
    }

    pub fn desired_rate_hz(&self) -> f32 {
        self.desired_rate_hz
    }
}

/// Handle to a setpoint type added to a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetpointId(usize);

impl SetpointId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Ordered setpoint types of one mode plus the index of the active one.
///
/// Selection is a single index, so two types can never be active at the
/// same time.
///
/// # Example
///
/// ```
/// use skymode_runtime::setpoint::{SetpointRegistry, SetpointType};
///
/// let mut registry = SetpointRegistry::default();
/// let rates = registry.add(SetpointType::rates().with_rate_hz(10.0));
/// let goto = registry.add(SetpointType::goto().with_rate_hz(5.0));
///
/// assert!(registry.is_active(rates));
/// registry.activate(goto).unwrap();
/// assert!(registry.is_active(goto) && !registry.is_active(rates));
/// assert_eq!(registry.update_rate_hz(), Some(10.0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SetpointRegistry {
    types: Vec<SetpointType>,
    active: Option<usize>,
}

impl SetpointRegistry {
    /// Append `setpoint_type`. The first type added becomes the active one.
    pub fn add(&mut self, setpoint_type: SetpointType) -> SetpointId {
        self.types.push(setpoint_type);
        let index = self.types.len() - 1;
        if self.active.is_none() {
            self.active = Some(index);
        }
        SetpointId(index)
    }

    /// Make `id` the active type. Returns `true` when the selection changed.
    ///
    /// # Errors
    ///
    /// [`ModeError::UnknownSetpointType`] when `id` does not belong to this
    /// registry.
    pub fn activate(&mut self, id: SetpointId) -> Result<bool, ModeError> {
        if id.0 >= self.types.len() {
            return Err(ModeError::UnknownSetpointType(id.0));
        }
        let changed = self.active != Some(id.0);
        self.active = Some(id.0);
        Ok(changed)
    }

    pub fn is_active(&self, id: SetpointId) -> bool {
        self.active == Some(id.0)
    }

    pub fn active(&self) -> Option<SetpointId> {
        self.active.map(SetpointId)
    }

    pub fn first(&self) -> Option<SetpointId> {
        (!self.types.is_empty()).then_some(SetpointId(0))
    }

    pub fn get(&self, id: SetpointId) -> Option<&SetpointType> {
        self.types.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn configurations(&self) -> impl Iterator<Item = &SetpointConfiguration> {
        self.types.iter().map(SetpointType::configuration)
    }

    /// Highest desired rate over all types; `None` when empty.
    pub fn update_rate_hz(&self) -> Option<f32> {
        self.types
            .iter()
            .map(SetpointType::desired_rate_hz)
            .reduce(f32::max)
    }
}

/// Control-mode descriptor announcing `configuration` on behalf of `source_id`.
pub fn control_mode_for(source_id: ModeId, configuration: &SetpointConfiguration) -> ControlMode {
    let mut control_mode = ControlMode {
        source_id,
        ..Default::default()
    };
    configuration.fill_control_mode(&mut control_mode);
    control_mode.timestamp = timestamp_micros();
    control_mode
}
