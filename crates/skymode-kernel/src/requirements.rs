//! Requirements aggregation.
//!
//! A mode's [`ModeRequirements`] are derived from the setpoint types it can
//! emit, the flags the mode declares itself, and whether it needs pilot
//! stick input. [`aggregate`] and [`aggregate_with`] are pure functions: they
//! are re-run from scratch whenever any of those inputs changes.

use skymode_types::{ModeRequirements, SetpointConfiguration};

/// OR-combine the needs of every setpoint configuration.
///
/// | Configuration flag | Requirement |
/// |---|---|
/// | `rates_enabled` | `angular_velocity` |
/// | `attitude_enabled` | `attitude` |
/// | `altitude_enabled`, `climb_rate_enabled` | `local_alt` |
/// | `velocity_enabled`, `position_enabled` | `local_position` |
///
/// When `manual_control_required` is set, `manual_control` is raised and an
/// exact local position is downgraded to `local_position_relaxed`.
///
/// The result does not depend on the order of `configs`.
///
/// # Example
///
/// ```
/// use skymode_kernel::requirements::aggregate;
/// use skymode_types::SetpointConfiguration;
///
/// let velocity = SetpointConfiguration { velocity_enabled: true, ..Default::default() };
/// let req = aggregate([&velocity], true);
///
/// assert!(req.manual_control);
/// assert!(req.local_position_relaxed);
/// assert!(!req.local_position);
/// ```
pub fn aggregate<'a, I>(configs: I, manual_control_required: bool) -> ModeRequirements
where
    I: IntoIterator<Item = &'a SetpointConfiguration>,
{
    aggregate_with(configs, ModeRequirements::default(), manual_control_required)
}

/// [`aggregate`] on top of `declared`, the flags a mode raises for itself
/// (home position, mission, prevent arming, ...).
///
/// The manual-control downgrade runs after `declared` is merged in. Without
/// manual control an exact local position wins over a declared relaxed one.
pub fn aggregate_with<'a, I>(
    configs: I,
    declared: ModeRequirements,
    manual_control_required: bool,
) -> ModeRequirements
where
    I: IntoIterator<Item = &'a SetpointConfiguration>,
{
    let mut requirements = declared;
    for config in configs {
        requirements.angular_velocity |= config.rates_enabled;
        requirements.attitude |= config.attitude_enabled;
        requirements.local_alt |= config.altitude_enabled;
        requirements.local_position |= config.velocity_enabled;
        requirements.local_position |= config.position_enabled;
        requirements.local_alt |= config.climb_rate_enabled;
    }

    if manual_control_required {
        if requirements.local_position {
            requirements.local_position = false;
            requirements.local_position_relaxed = true;
        }
        requirements.manual_control = true;
    } else if requirements.local_position {
        requirements.local_position_relaxed = false;
    }
    requirements
}
