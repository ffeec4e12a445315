//! Message schema compatibility between a mode and its authority.

use std::collections::HashMap;

use skymode_types::MessageVersion;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompatibilityError {
    #[error("message '{0}' is unknown to the authority")]
    Missing(String),

    #[error("message '{name}' version mismatch: local v{local}, authority v{remote}")]
    VersionMismatch { name: String, local: u32, remote: u32 },
}

/// Verify that every schema in `local` exists in `remote` with the same
/// version. Extra schemas on the authority side are ignored.
pub fn check_message_compatibility(
    local: &[MessageVersion],
    remote: &[MessageVersion],
) -> Result<(), CompatibilityError> {
    let remote: HashMap<&str, u32> = remote.iter().map(|m| (m.name.as_str(), m.version)).collect();
    for message in local {
        match remote.get(message.name.as_str()) {
            None => return Err(CompatibilityError::Missing(message.name.clone())),
            Some(&version) if version != message.version => {
                return Err(CompatibilityError::VersionMismatch {
                    name: message.name.clone(),
                    local: message.version,
                    remote: version,
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skymode_types::schema_versions;

    fn version(name: &str, version: u32) -> MessageVersion {
        MessageVersion {
            name: name.to_string(),
            version,
        }
    }

    #[test]
    fn identical_schemas_are_compatible() {
        assert!(check_message_compatibility(&schema_versions(), &schema_versions()).is_ok());
    }

    #[test]
    fn extra_remote_schemas_are_ignored() {
        let mut remote = schema_versions();
        remote.push(version("battery_status", 3));
        assert!(check_message_compatibility(&schema_versions(), &remote).is_ok());
    }

    #[test]
    fn missing_schema_is_rejected() {
        let local = vec![version("vehicle_status", 1), version("mode_completed", 0)];
        let remote = vec![version("vehicle_status", 1)];
        assert_eq!(
            check_message_compatibility(&local, &remote),
            Err(CompatibilityError::Missing("mode_completed".to_string()))
        );
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let local = vec![version("vehicle_status", 1)];
        let remote = vec![version("vehicle_status", 2)];
        let err = check_message_compatibility(&local, &remote).unwrap_err();
        assert!(matches!(err, CompatibilityError::VersionMismatch { remote: 2, .. }));
        assert!(err.to_string().contains("vehicle_status"));
    }
}
