//! MFA device resolution.

use log::{info, warn};

use crate::{
    error::{MfaError, Result},
    provider::CredentialProvider,
};

/// The kind of principal the identity credentials belong to. Root and IAM users list
/// their MFA devices through different calls; root cannot call the per-user listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Root,
    Named { user_name: String },
}

impl Principal {
    /// Classifies a caller ARN such as `arn:aws:iam::123456789012:root` or
    /// `arn:aws:iam::123456789012:user/path/alice`.
    pub fn from_arn(arn: &str) -> Result<Self> {
        if arn.ends_with(":root") {
            return Ok(Self::Root);
        }
        let resource = arn.splitn(6, ':').nth(5).unwrap_or_default();
        match resource.strip_prefix("user/") {
            Some(path) => {
                let user_name = path.rsplit('/').next().unwrap_or(path);
                Ok(Self::Named {
                    user_name: user_name.to_string(),
                })
            }
            None => Err(MfaError::UnsupportedPrincipal(arn.to_string())),
        }
    }
}

pub struct DeviceResolver<'a> {
    provider: &'a dyn CredentialProvider,
}

impl<'a> DeviceResolver<'a> {
    pub fn new(provider: &'a dyn CredentialProvider) -> Self {
        Self { provider }
    }

    /// Returns `explicit` when given, otherwise the first MFA device the account reports
    /// for the caller. The listing order is whatever IAM returns; nothing is sorted.
    pub async fn resolve(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(serial) = explicit.filter(|s| !s.is_empty()) {
            return Ok(serial.to_string());
        }

        let arn = self.provider.caller_arn().await.map_err(remote)?;
        let devices = match Principal::from_arn(&arn)? {
            Principal::Root => self.provider.list_root_mfa_devices().await,
            Principal::Named { user_name } => {
                self.provider.list_user_mfa_devices(&user_name).await
            }
        }
        .map_err(remote)?;

        let mut devices = devices.into_iter();
        let first = devices.next().ok_or(MfaError::NoDevice)?;
        let others = devices.len();
        if others > 0 {
            warn!("User has {} MFA devices, using the first", others + 1);
        }
        info!("Using MFA device {first}");
        Ok(first)
    }
}

fn remote(err: crate::provider::ProviderError) -> MfaError {
    MfaError::Remote(err.into())
}
