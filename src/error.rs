//! Error taxonomy for a credential refresh run.
//!
//! Variants split into two groups. User-recoverable conditions (a missing file, a missing
//! profile, no MFA device, a rejected code) are reported on stderr and turn into exit status
//! `1`. Everything else is fatal and propagates out of `main` with its cause chain.

use std::path::PathBuf;

use aws_smithy_types::date_time::DateTimeFormatError;

#[derive(Debug, thiserror::Error)]
pub enum MfaError {
    #[error(
        "{} does not exist. Please run 'aws configure' or specify an alternate credentials \
         file with --aws-credentials.",
        .0.display()
    )]
    NotFound(PathBuf),

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("section [{0}] not found in credentials file")]
    MissingSection(String),

    #[error("key {key} not found in section [{section}]")]
    MissingKey { section: String, key: String },

    #[error(
        "The config profile ({profile}) could not be found\nAvailable profiles: {}",
        available.join(", ")
    )]
    ProfileNotFound {
        profile: String,
        available: Vec<String>,
    },

    #[error("There are no MFA devices associated with this user.")]
    NoDevice,

    #[error(
        "cannot discover MFA devices for {0}; pass --serial-number to name the device explicitly"
    )]
    UnsupportedPrincipal(String),

    #[error("{0}")]
    AccessDenied(String),

    #[error("access key {0} is configured locally but does not exist in the account")]
    KeyNotFound(String),

    #[error(
        "access key {deleted} was deleted but creating its replacement failed; \
         create a new access key manually: {cause:#}"
    )]
    RotationIncomplete {
        deleted: String,
        cause: anyhow::Error,
    },

    #[error("{0:#}")]
    Remote(anyhow::Error),

    #[error("failed to format credential expiration: {0}")]
    Timestamp(#[from] DateTimeFormatError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MfaError {
    /// Whether `main` should report this and exit `1` instead of failing hard.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::ProfileNotFound { .. }
                | Self::NoDevice
                | Self::UnsupportedPrincipal(_)
                | Self::AccessDenied(_)
        )
    }
}

pub type Result<T, E = MfaError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(MfaError::NotFound(PathBuf::from("/tmp/x")).is_user_recoverable());
        assert!(MfaError::NoDevice.is_user_recoverable());
        assert!(MfaError::AccessDenied("denied".into()).is_user_recoverable());
        assert!(
            MfaError::ProfileNotFound {
                profile: "identity".into(),
                available: vec![],
            }
            .is_user_recoverable()
        );

        assert!(!MfaError::KeyNotFound("AKIA1".into()).is_user_recoverable());
        assert!(!MfaError::Remote(anyhow::anyhow!("boom")).is_user_recoverable());
        assert!(!MfaError::MissingSection("x".into()).is_user_recoverable());
    }

    #[test]
    fn test_profile_not_found_lists_available() {
        let err = MfaError::ProfileNotFound {
            profile: "identity".into(),
            available: vec!["default".into(), "work".into()],
        };
        let message = err.to_string();
        assert!(message.contains("(identity)"));
        assert!(message.ends_with("Available profiles: default, work"));
    }

    #[test]
    fn test_not_found_names_path() {
        let err = MfaError::NotFound(PathBuf::from("/home/me/.aws/credentials"));
        assert!(err.to_string().starts_with("/home/me/.aws/credentials does not exist."));
    }
}
