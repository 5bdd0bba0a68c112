//! Exchange of identity credentials for temporary ones.

use log::info;

use crate::{
    credentials::TemporaryCredentials,
    error::{MfaError, Result},
    provider::{AssumeRoleRequest, CredentialProvider, MfaToken, ProviderError, SessionTokenRequest},
};

/// AssumeRole rejects longer sessions even though GetSessionToken accepts them.
pub const MAX_ROLE_DURATION_SECONDS: u32 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTarget {
    pub role_arn: String,
    pub role_session_name: String,
}

pub struct CredentialAcquirer<'a> {
    provider: &'a dyn CredentialProvider,
}

impl<'a> CredentialAcquirer<'a> {
    pub fn new(provider: &'a dyn CredentialProvider) -> Self {
        Self { provider }
    }

    /// Exchanges the provider's credentials for temporary ones.
    ///
    /// Without `mfa` the request carries no serial number or token code at all, and the
    /// result will not satisfy `aws:MultiFactorAuthPresent`. With `role` the duration is
    /// clamped to [`MAX_ROLE_DURATION_SECONDS`].
    pub async fn acquire(
        &self,
        mfa: Option<MfaToken>,
        duration_seconds: u32,
        role: Option<&RoleTarget>,
    ) -> Result<TemporaryCredentials> {
        let result = match role {
            Some(role) => {
                let duration_seconds = duration_seconds.min(MAX_ROLE_DURATION_SECONDS);
                info!("Assuming {} - Duration: {duration_seconds}s", role.role_arn);
                self.provider
                    .assume_role(AssumeRoleRequest {
                        role_arn: role.role_arn.clone(),
                        role_session_name: role.role_session_name.clone(),
                        duration_seconds,
                        mfa,
                    })
                    .await
            }
            None => {
                info!("Fetching credentials - Duration: {duration_seconds}s");
                self.provider
                    .get_session_token(SessionTokenRequest {
                        duration_seconds,
                        mfa,
                    })
                    .await
            }
        };

        result.map_err(|e| match e {
            ProviderError::AccessDenied(message) => MfaError::AccessDenied(message),
            ProviderError::Remote(e) => MfaError::Remote(e),
        })
    }
}
