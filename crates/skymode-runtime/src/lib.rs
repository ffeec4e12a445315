//! `skymode-runtime` – Mode Execution
//!
//! Turns user flight-mode logic into a participant in the vehicle's mode
//! switching: registration, activation in lockstep with vehicle status,
//! periodic setpoint computation and arming check replies.
//!
//! # Modules
//!
//! - [`mode`] – [`ModeBase`][mode::ModeBase]: the state machine around a
//!   user [`Mode`][mode::Mode], plus the [`ModeContext`][mode::ModeContext]
//!   handed to every hook.
//! - [`setpoint`] – [`SetpointType`][setpoint::SetpointType] and the
//!   [`SetpointRegistry`][setpoint::SetpointRegistry] that keeps exactly one
//!   type active.
//! - [`timer`] – [`SetpointTimer`][timer::SetpointTimer]: the periodic
//!   setpoint deadline.
//! - [`manual_control`] – [`ManualControlInput`][manual_control::ManualControlInput]:
//!   latest stick input with a staleness check.
//! - [`vehicle_state`] – [`LatestSample`][vehicle_state::LatestSample]
//!   mirrors of land detection, VTOL status, home position, battery and
//!   vehicle status.
//! - [`runner`] – [`ModeRunner`][runner::ModeRunner]: the single-task event
//!   loop feeding bus messages and deadlines into a `ModeBase`.
//! - [`config`] – [`ModeConfig`][config::ModeConfig]: TOML mode settings.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: the global
//!   `tracing` subscriber with optional OTLP export.

pub mod config;
pub mod manual_control;
pub mod mode;
pub mod runner;
pub mod setpoint;
pub mod telemetry;
pub mod timer;
pub mod vehicle_state;

pub use config::{config_schema, ConfigError, ModeConfig};
pub use manual_control::{ManualControlInput, MANUAL_CONTROL_TIMEOUT};
pub use mode::{Mode, ModeBase, ModeContext, ModeSettings, ModeState};
pub use runner::ModeRunner;
pub use setpoint::{SetpointId, SetpointRegistry, SetpointType};
pub use telemetry::{init_tracing, LogFormat, TracerProviderGuard};
pub use timer::SetpointTimer;
pub use vehicle_state::{
    LatestSample, VehicleStateMessage, VehicleStateMirrors, VEHICLE_STATUS_TIMEOUT,
};
