//! Registration contract between a mode and the mode authority.
//!
//! The authority owns mode identity: it assigns the [`ModeId`] and the
//! arming-check id, enforces name uniqueness and the name length limit, and
//! tells the mode which message schemas it speaks. Modes only see the
//! [`RegistrationAuthority`] trait; [`LocalAuthority`][crate::authority::LocalAuthority]
//! is the in-process implementation.

use skymode_types::{MessageVersion, ModeId};
use thiserror::Error;

/// Names must be strictly shorter than this many characters.
pub const MAX_NAME_LENGTH: usize = 25;

/// What a component asks the authority for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSettings {
    pub name: String,
    pub register_arming_check: bool,
    pub register_mode: bool,
    /// Built-in mode this external mode takes the place of.
    pub replace_internal_mode: Option<ModeId>,
}

impl RegistrationSettings {
    /// A mode with its own arming check.
    pub fn mode(name: &str, replace_internal_mode: Option<ModeId>) -> Self {
        Self {
            name: name.to_string(),
            register_arming_check: true,
            register_mode: true,
            replace_internal_mode,
        }
    }

    /// A standalone arming check without a mode.
    pub fn arming_check_only(name: &str) -> Self {
        Self {
            name: name.to_string(),
            register_arming_check: true,
            register_mode: false,
            replace_internal_mode: None,
        }
    }
}

/// Identity handed out on successful registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisteredIdentity {
    /// [`ModeId::INVALID`] when no mode was registered.
    pub mode_id: ModeId,
    pub arming_check_id: u8,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("registration name must not be empty")]
    EmptyName,

    #[error("registration name '{name}' is {len} characters, limit is {max}", max = MAX_NAME_LENGTH - 1)]
    NameTooLong { name: String, len: usize },

    #[error("a component named '{0}' is already registered")]
    DuplicateName(String),

    #[error("no free external mode id")]
    NoFreeModeId,

    #[error("no free arming check id")]
    NoFreeArmingCheckId,

    #[error("mode {0} is not registered")]
    UnknownMode(ModeId),
}

/// The external authority that assigns and validates mode identity.
pub trait RegistrationAuthority {
    /// Message schemas the authority speaks.
    fn schema_versions(&self) -> Vec<MessageVersion>;

    /// Register a component.
    ///
    /// # Errors
    ///
    /// Rejects empty, oversized and duplicate names, and fails when the
    /// external id range is exhausted.
    fn register(
        &mut self,
        settings: &RegistrationSettings,
    ) -> Result<RegisteredIdentity, RegistrationError>;

    /// Release a previously registered mode.
    fn unregister(&mut self, mode_id: ModeId) -> Result<(), RegistrationError>;
}

/// Validate `name` against the authority's naming rules.
pub fn validate_name(name: &str) -> Result<(), RegistrationError> {
    let len = name.chars().count();
    if len == 0 {
        Err(RegistrationError::EmptyName)
    } else if len >= MAX_NAME_LENGTH {
        Err(RegistrationError::NameTooLong {
            name: name.to_string(),
            len,
        })
    } else {
        Ok(())
    }
}
