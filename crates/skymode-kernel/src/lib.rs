//! `skymode-kernel` – Rules & Bookkeeping
//!
//! The synchronous core of the flight-mode workspace. Nothing here touches
//! the message bus or a clock of its own; callers pass messages and time in
//! and get decisions back.
//!
//! # Modules
//!
//! - [`requirements`] – [`aggregate`][requirements::aggregate]: derives a
//!   mode's [`ModeRequirements`][skymode_types::ModeRequirements] from the
//!   setpoint configurations it uses and the flags it declares itself.
//! - [`health_checks`] – [`HealthAndArmingChecks`][health_checks::HealthAndArmingChecks]
//!   and its per-request [`HealthAndArmingCheckReporter`][health_checks::HealthAndArmingCheckReporter]:
//!   answers arming check requests and watches for an authority that went
//!   silent.
//! - [`registration`] – the [`RegistrationAuthority`][registration::RegistrationAuthority]
//!   trait and the naming rules every authority enforces.
//! - [`compatibility`] – message schema version comparison performed before
//!   registering.
//! - [`authority`] – [`LocalAuthority`][authority::LocalAuthority]: an
//!   in-process authority that assigns ids, issues check requests and
//!   decides admission.
//! - [`admission_gate`] – [`AdmissionGate`][admission_gate::AdmissionGate]:
//!   evaluates an arming check reply against the capabilities the vehicle
//!   currently provides.
//! - [`watchdog`] – [`Watchdog`][watchdog::Watchdog]: deadline tracking for
//!   arming check replies.

pub mod admission_gate;
pub mod authority;
pub mod compatibility;
pub mod health_checks;
pub mod registration;
pub mod requirements;
pub mod watchdog;

pub use admission_gate::{AdmissionError, AdmissionGate};
pub use authority::LocalAuthority;
pub use compatibility::{check_message_compatibility, CompatibilityError};
pub use health_checks::{
    ArmingCheck, CheckCycle, HealthAndArmingCheckReporter, HealthAndArmingChecks,
    WatchdogVerdict, DEFAULT_WATCHDOG_PERIOD,
};
pub use registration::{
    RegisteredIdentity, RegistrationAuthority, RegistrationError, RegistrationSettings,
    MAX_NAME_LENGTH,
};
pub use requirements::{aggregate, aggregate_with};
pub use watchdog::{ComponentHealth, Watchdog};
