//! Remote credential services.
//!
//! [`CredentialProvider`] is the seam between the refresh logic and AWS. [`AwsProvider`]
//! backs it with the STS and IAM SDK clients, signing every call with one fixed set of
//! credentials. [`Connector`] builds a provider for a given set of credentials so the
//! rotation step can sign with the session just written to the target profile.

use async_trait::async_trait;
use aws_config::{Region, SdkConfig, meta::region::RegionProviderChain};
use aws_sdk_sts::{
    config::Credentials,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use log::debug;

use crate::credentials::{LongLivedKeyPair, TemporaryCredentials};

/// IAM and STS are global; any region reaches them.
const FALLBACK_REGION: &str = "us-east-1";

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{0}")]
    AccessDenied(String),

    #[error("{0:#}")]
    Remote(anyhow::Error),
}

impl ProviderError {
    pub fn remote(message: impl std::fmt::Display) -> Self {
        Self::Remote(anyhow::anyhow!("{message}"))
    }
}

/// Proof of MFA presence sent along with an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfaToken {
    pub serial_number: String,
    pub token_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokenRequest {
    pub duration_seconds: u32,
    pub mfa: Option<MfaToken>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    pub duration_seconds: u32,
    pub mfa: Option<MfaToken>,
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// ARN of the principal the provider signs as.
    async fn caller_arn(&self) -> Result<String, ProviderError>;

    /// MFA devices of the account root. Only callable as root.
    async fn list_root_mfa_devices(&self) -> Result<Vec<String>, ProviderError>;

    /// MFA devices of the named IAM user.
    async fn list_user_mfa_devices(&self, user_name: &str) -> Result<Vec<String>, ProviderError>;

    async fn get_session_token(
        &self,
        request: SessionTokenRequest,
    ) -> Result<TemporaryCredentials, ProviderError>;

    async fn assume_role(
        &self,
        request: AssumeRoleRequest,
    ) -> Result<TemporaryCredentials, ProviderError>;

    /// Access key ids of the calling user.
    async fn list_access_keys(&self) -> Result<Vec<String>, ProviderError>;

    async fn delete_access_key(&self, access_key_id: &str) -> Result<(), ProviderError>;

    async fn create_access_key(&self) -> Result<LongLivedKeyPair, ProviderError>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Box<dyn CredentialProvider>;
}

/// Connects [`AwsProvider`]s using the ambient AWS configuration for everything
/// except credentials.
pub struct AwsConnector;

#[async_trait]
impl Connector for AwsConnector {
    async fn connect(&self, credentials: &Credentials) -> Box<dyn CredentialProvider> {
        Box::new(AwsProvider::new(credentials.clone()).await)
    }
}

pub struct AwsProvider {
    sts: aws_sdk_sts::Client,
    iam: aws_sdk_iam::Client,
}

impl AwsProvider {
    pub async fn new(credentials: Credentials) -> Self {
        let region = RegionProviderChain::default_provider().or_else(Region::new(FALLBACK_REGION));
        let config: SdkConfig = aws_config::from_env()
            .region(region)
            .credentials_provider(credentials)
            .load()
            .await;

        Self {
            sts: aws_sdk_sts::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
        }
    }
}

fn map_sdk_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if err.code() == Some("AccessDenied") {
        return ProviderError::AccessDenied(format!(
            "An error occurred (AccessDenied) when calling the {operation} operation: {}",
            err.message().unwrap_or("access denied")
        ));
    }
    ProviderError::Remote(
        anyhow::anyhow!("{}", DisplayErrorContext(&err)).context(format!("{operation} failed")),
    )
}

fn temporary_from_sts(
    operation: &'static str,
    credentials: Option<&aws_sdk_sts::types::Credentials>,
) -> Result<TemporaryCredentials, ProviderError> {
    let credentials = credentials
        .ok_or_else(|| ProviderError::remote(format!("{operation} returned no credentials")))?;
    Ok(TemporaryCredentials {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: Some(credentials.session_token().to_string()),
        expiration: *credentials.expiration(),
    })
}

#[async_trait]
impl CredentialProvider for AwsProvider {
    async fn caller_arn(&self) -> Result<String, ProviderError> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| map_sdk_error("GetCallerIdentity", e))?;
        output
            .arn()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::remote("GetCallerIdentity returned no ARN"))
    }

    async fn list_root_mfa_devices(&self) -> Result<Vec<String>, ProviderError> {
        // Without a user name IAM lists the devices of the caller, which for the
        // root principal are the account's root devices.
        let output = self
            .iam
            .list_mfa_devices()
            .send()
            .await
            .map_err(|e| map_sdk_error("ListMFADevices", e))?;
        Ok(output
            .mfa_devices()
            .iter()
            .map(|d| d.serial_number().to_string())
            .collect())
    }

    async fn list_user_mfa_devices(&self, user_name: &str) -> Result<Vec<String>, ProviderError> {
        let output = self
            .iam
            .list_mfa_devices()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| map_sdk_error("ListMFADevices", e))?;
        Ok(output
            .mfa_devices()
            .iter()
            .map(|d| d.serial_number().to_string())
            .collect())
    }

    async fn get_session_token(
        &self,
        request: SessionTokenRequest,
    ) -> Result<TemporaryCredentials, ProviderError> {
        debug!("GetSessionToken {request:?}");
        let (serial_number, token_code) = request
            .mfa
            .map(|m| (m.serial_number, m.token_code))
            .unzip();
        let output = self
            .sts
            .get_session_token()
            .duration_seconds(request.duration_seconds as i32)
            .set_serial_number(serial_number)
            .set_token_code(token_code)
            .send()
            .await
            .map_err(|e| map_sdk_error("GetSessionToken", e))?;
        temporary_from_sts("GetSessionToken", output.credentials())
    }

    async fn assume_role(
        &self,
        request: AssumeRoleRequest,
    ) -> Result<TemporaryCredentials, ProviderError> {
        debug!("AssumeRole {request:?}");
        let (serial_number, token_code) = request
            .mfa
            .map(|m| (m.serial_number, m.token_code))
            .unzip();
        let output = self
            .sts
            .assume_role()
            .role_arn(request.role_arn)
            .role_session_name(request.role_session_name)
            .duration_seconds(request.duration_seconds as i32)
            .set_serial_number(serial_number)
            .set_token_code(token_code)
            .send()
            .await
            .map_err(|e| map_sdk_error("AssumeRole", e))?;
        temporary_from_sts("AssumeRole", output.credentials())
    }

    async fn list_access_keys(&self) -> Result<Vec<String>, ProviderError> {
        let output = self
            .iam
            .list_access_keys()
            .send()
            .await
            .map_err(|e| map_sdk_error("ListAccessKeys", e))?;
        Ok(output
            .access_key_metadata()
            .iter()
            .filter_map(|k| k.access_key_id().map(str::to_string))
            .collect())
    }

    async fn delete_access_key(&self, access_key_id: &str) -> Result<(), ProviderError> {
        self.iam
            .delete_access_key()
            .access_key_id(access_key_id)
            .send()
            .await
            .map_err(|e| map_sdk_error("DeleteAccessKey", e))?;
        Ok(())
    }

    async fn create_access_key(&self) -> Result<LongLivedKeyPair, ProviderError> {
        let output = self
            .iam
            .create_access_key()
            .send()
            .await
            .map_err(|e| map_sdk_error("CreateAccessKey", e))?;
        let key = output
            .access_key()
            .ok_or_else(|| ProviderError::remote("CreateAccessKey returned no access key"))?;
        Ok(LongLivedKeyPair {
            access_key_id: key.access_key_id().to_string(),
            secret_access_key: key.secret_access_key().to_string(),
        })
    }
}
