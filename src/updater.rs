//! AWS MFA Credentials Updater
//!
//! Drives one refresh run against the AWS credentials file:
//!
//! 1. Load the file once and read the long-lived keys of the identity profile
//! 2. Resolve the MFA device (explicit serial, else discovered from IAM)
//! 3. Exchange keys plus MFA code for a session or an assumed role
//! 4. Write the temporary credentials to the target profile (first writeback)
//! 5. Optionally rotate the identity access key, signing with the new session
//!    (second, independent writeback)
//! 6. Optionally print shell export statements for the target profile
//!
//! ## File Format
//!
//! ```ini
//! [identity]
//! aws_access_key_id=AKIA...           # Permanent IAM user access key
//! aws_secret_access_key=...           # Permanent IAM user secret key
//! region=eu-west-1                    # Copied to the target profile as is
//!
//! [default]
//! aws_access_key_id=ASIA...           # Temporary access key
//! aws_secret_access_key=...           # Temporary secret key
//! aws_session_token=...               # Session token (primary)
//! aws_security_token=...              # Session token (legacy compatibility)
//! awsmfa_expiration=2023-12-01T12:00:00Z
//! region=eu-west-1
//! ```

use std::{io, time::SystemTime};

use log::{info, warn};

use crate::{
    acquirer::CredentialAcquirer,
    config::{Config, TokenCode},
    credentials::{self, TemporaryCredentials},
    device::DeviceResolver,
    error::{MfaError, Result},
    export,
    provider::{Connector, MfaToken},
    rotator::KeyRotator,
    store::ConfigStore,
    writer::ProfileWriter,
};

pub struct AwsMfaUpdater<'a> {
    config: &'a Config,
    connector: &'a dyn Connector,
}

impl<'a> AwsMfaUpdater<'a> {
    pub fn new(config: &'a Config, connector: &'a dyn Connector) -> Self {
        Self { config, connector }
    }

    /// Runs the whole refresh. `prompt` is asked for an MFA code when none was configured
    /// and is called again until it returns six ASCII digits. Returns the shell export
    /// lines when `env` output was requested.
    pub async fn run<F>(&self, prompt: F) -> Result<Vec<String>>
    where
        F: FnMut() -> io::Result<String>,
    {
        let path = &self.config.credentials_path;
        if !path.exists() {
            return Err(MfaError::NotFound(path.clone()));
        }
        let mut store = ConfigStore::load(path).await?;

        self.update_credentials(&mut store, prompt).await?;

        if self.config.rotate_identity_keys {
            self.rotate_identity_keys(&mut store).await?;
        }

        if self.config.env {
            return export::export_lines(&store, &self.config.target_profile);
        }
        Ok(Vec::new())
    }

    async fn update_credentials<F>(&self, store: &mut ConfigStore, prompt: F) -> Result<()>
    where
        F: FnMut() -> io::Result<String>,
    {
        let config = self.config;
        let identity = credentials::identity_from_section(store, &config.identity_profile)?;

        let issued = if config.testing_mode {
            warn!("Skipping AWS API calls because AWSMFA_TESTING_MODE is set.");
            TemporaryCredentials::offline(&identity, SystemTime::now())
        } else {
            let provider = self.connector.connect(&identity).await;
            let mfa = match &config.token_code {
                Some(TokenCode::Skip) => None,
                code => {
                    let serial_number = DeviceResolver::new(provider.as_ref())
                        .resolve(config.serial_number.as_deref())
                        .await?;
                    let token_code = match code {
                        Some(TokenCode::Code(code)) => code.clone(),
                        _ => read_token_code(prompt)?,
                    };
                    Some(MfaToken {
                        serial_number,
                        token_code,
                    })
                }
            };
            CredentialAcquirer::new(provider.as_ref())
                .acquire(mfa, config.duration, config.role.as_ref())
                .await?
        };

        info!(
            "Temporary credentials will expire in {}.",
            issued.remaining(SystemTime::now())
        );
        ProfileWriter::new(store)
            .write_credentials(&config.target_profile, &config.identity_profile, &issued)
            .await?;
        info!(
            "Success! {} profile updated in {}.",
            config.target_profile,
            store.path().display()
        );
        Ok(())
    }

    async fn rotate_identity_keys(&self, store: &mut ConfigStore) -> Result<()> {
        let session = credentials::from_section(store, &self.config.target_profile)?;
        let provider = self.connector.connect(&session).await;
        KeyRotator::new(provider.as_ref())
            .rotate(store, &self.config.identity_profile)
            .await?;
        Ok(())
    }
}

fn read_token_code<F>(mut prompt: F) -> Result<String>
where
    F: FnMut() -> io::Result<String>,
{
    loop {
        let input = prompt()?;
        let code = input.trim();
        if TokenCode::is_valid_code(code) {
            return Ok(code.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use tempfile::TempDir;
    use tokio::fs;

    use super::*;
    use crate::{
        acquirer::RoleTarget,
        credentials::{ACCESS_KEY_ID, EXPIRATION, SESSION_TOKEN},
        provider::{
            AssumeRoleRequest, SessionTokenRequest,
            fake::{Call, FakeProvider},
        },
    };

    const SAMPLE: &str = "\
[identity]
aws_access_key_id = AKIAOLD
aws_secret_access_key = identity-secret
region = us-east-1

[default]
aws_access_key_id = ASIASTALE
aws_secret_access_key = stale
";

    const DEVICE: &str = "arn:aws:iam::123456789012:mfa/alice";

    async fn write_sample(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("credentials");
        fs::write(&path, SAMPLE).await.unwrap();
        path
    }

    fn config(path: &Path) -> Config {
        Config {
            credentials_path: path.to_path_buf(),
            duration: 7200,
            identity_profile: "identity".into(),
            target_profile: "default".into(),
            serial_number: None,
            role: None,
            token_code: Some(TokenCode::Code("123456".into())),
            rotate_identity_keys: false,
            env: false,
            testing_mode: false,
        }
    }

    fn no_prompt() -> io::Result<String> {
        panic!("unexpected prompt")
    }

    #[tokio::test]
    async fn test_session_exchange() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let config = config(&path);

        let lines = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap();

        assert!(lines.is_empty());
        assert_eq!(
            provider.calls(),
            vec![
                Call::Connect("AKIAOLD".into()),
                Call::CallerArn,
                Call::ListUserMfaDevices("alice".into()),
                Call::GetSessionToken(SessionTokenRequest {
                    duration_seconds: 7200,
                    mfa: Some(MfaToken {
                        serial_number: DEVICE.into(),
                        token_code: "123456".into(),
                    }),
                }),
            ]
        );

        let store = ConfigStore::load(&path).await.unwrap();
        let target = store.section("default").unwrap();
        assert_eq!(target.get(ACCESS_KEY_ID), Some("ASIASESSIONTEMP"));
        assert_eq!(target.get(SESSION_TOKEN), Some("ASIASESSION-token"));
        assert_eq!(target.get("region"), Some("us-east-1"));
        assert!(target.get(EXPIRATION).is_some());
        assert_eq!(store.get_value("identity", ACCESS_KEY_ID).unwrap(), "AKIAOLD");
    }

    #[tokio::test]
    async fn test_role_exchange_with_explicit_serial() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let mut config = config(&path);
        config.serial_number = Some("arn:aws:iam::1:mfa/x".into());
        config.role = Some(RoleTarget {
            role_arn: "arn:aws:iam::1:role/admin".into(),
            role_session_name: "awsmfa_test".into(),
        });

        AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap();

        assert_eq!(
            provider.calls(),
            vec![
                Call::Connect("AKIAOLD".into()),
                Call::AssumeRole(AssumeRoleRequest {
                    role_arn: "arn:aws:iam::1:role/admin".into(),
                    role_session_name: "awsmfa_test".into(),
                    duration_seconds: 3600,
                    mfa: Some(MfaToken {
                        serial_number: "arn:aws:iam::1:mfa/x".into(),
                        token_code: "123456".into(),
                    }),
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_skip_token_code() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let mut config = config(&path);
        config.token_code = Some(TokenCode::Skip);

        AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap();

        assert_eq!(
            provider.calls(),
            vec![
                Call::Connect("AKIAOLD".into()),
                Call::GetSessionToken(SessionTokenRequest {
                    duration_seconds: 7200,
                    mfa: None,
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_prompt_until_valid() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let mut config = config(&path);
        config.token_code = None;

        let mut answers = vec!["654321\n", "12ab56\n", "123\n"];
        AwsMfaUpdater::new(&config, &provider)
            .run(|| Ok(answers.pop().unwrap().to_string()))
            .await
            .unwrap();

        assert!(answers.is_empty());
        assert!(provider.calls().iter().any(|c| matches!(
            c,
            Call::GetSessionToken(SessionTokenRequest { mfa: Some(MfaToken { token_code, .. }), .. })
                if token_code == "654321"
        )));
    }

    #[tokio::test]
    async fn test_no_device_stops_before_exchange() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        provider.state().user_devices.clear();
        let mut config = config(&path);
        config.token_code = None;

        let err = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, MfaError::NoDevice));
        assert!(!provider.calls().iter().any(|c| matches!(
            c,
            Call::GetSessionToken(_) | Call::AssumeRole(_)
        )));
        assert_eq!(fs::read_to_string(&path).await.unwrap(), SAMPLE);
    }

    #[tokio::test]
    async fn test_access_denied_leaves_file() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        provider.state().deny_exchange = true;
        let config = config(&path);

        let err = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, MfaError::AccessDenied(_)));
        assert_eq!(fs::read_to_string(&path).await.unwrap(), SAMPLE);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let provider = FakeProvider::default();
        let config = config(&dir.path().join("credentials"));

        let err = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, MfaError::NotFound(_)));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_identity_profile() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let mut config = config(&path);
        config.identity_profile = "nobody".into();

        let err = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap_err();

        match err {
            MfaError::ProfileNotFound { profile, available } => {
                assert_eq!(profile, "nobody");
                assert_eq!(available, vec!["default", "identity"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rotation_after_exchange() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        provider.state().access_keys = vec!["AKIAOLD".into()];
        let mut config = config(&path);
        config.serial_number = Some(DEVICE.into());
        config.rotate_identity_keys = true;

        AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(
            &calls[2..],
            &[
                Call::Connect("ASIASESSIONTEMP".into()),
                Call::ListAccessKeys,
                Call::DeleteAccessKey("AKIAOLD".into()),
                Call::CreateAccessKey,
            ]
        );

        let store = ConfigStore::load(&path).await.unwrap();
        assert_eq!(store.get_value("identity", ACCESS_KEY_ID).unwrap(), "AKIANEW1");
        assert_eq!(store.get_value("identity", "region").unwrap(), "us-east-1");
        assert_eq!(store.get_value("default", ACCESS_KEY_ID).unwrap(), "ASIASESSIONTEMP");
    }

    #[tokio::test]
    async fn test_rotation_failure_keeps_session_writeback() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        provider.state().access_keys = vec!["AKIADIFFERENT".into()];
        let mut config = config(&path);
        config.serial_number = Some(DEVICE.into());
        config.rotate_identity_keys = true;

        let err = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap_err();

        assert!(matches!(err, MfaError::KeyNotFound(_)));
        let store = ConfigStore::load(&path).await.unwrap();
        assert_eq!(store.get_value("default", ACCESS_KEY_ID).unwrap(), "ASIASESSIONTEMP");
        assert_eq!(store.get_value("identity", ACCESS_KEY_ID).unwrap(), "AKIAOLD");
    }

    #[tokio::test]
    async fn test_env_output() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let mut config = config(&path);
        config.env = true;

        let lines = AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap();

        assert_eq!(
            lines,
            vec![
                "AWS_ACCESS_KEY_ID=ASIASESSIONTEMP; export AWS_ACCESS_KEY_ID;",
                "AWS_SECRET_ACCESS_KEY=ASIASESSION-secret; export AWS_SECRET_ACCESS_KEY;",
                "AWS_SESSION_TOKEN=ASIASESSION-token; export AWS_SESSION_TOKEN;",
            ]
        );
    }

    #[tokio::test]
    async fn test_testing_mode_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let path = write_sample(&dir).await;
        let provider = FakeProvider::default();
        let mut config = config(&path);
        config.testing_mode = true;
        config.token_code = None;

        AwsMfaUpdater::new(&config, &provider)
            .run(no_prompt)
            .await
            .unwrap();

        assert!(provider.calls().is_empty());
        let store = ConfigStore::load(&path).await.unwrap();
        assert_eq!(store.get_value("default", ACCESS_KEY_ID).unwrap(), "AKIAOLD");
        assert_eq!(store.get_value("default", SESSION_TOKEN).unwrap(), "420");
    }
}
