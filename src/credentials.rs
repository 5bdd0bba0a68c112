use std::time::{Duration, SystemTime};

use aws_sdk_sts::config::Credentials;
use aws_smithy_types::{DateTime, date_time::Format};

use crate::{
    error::{MfaError, Result},
    store::ConfigStore,
};

pub const ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const SESSION_TOKEN: &str = "aws_session_token";
/// Older SDKs still read the session token under this name.
pub const SECURITY_TOKEN: &str = "aws_security_token";
pub const EXPIRATION: &str = "awsmfa_expiration";

const PROVIDER_NAME: &str = "awsmfa";

/// Credentials issued by STS for a session or an assumed role.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: DateTime,
}

/// A permanent IAM access key pair. Carries no session token and no expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongLivedKeyPair {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Key/value edits that flatten a credential set into a profile section.
/// `None` removes the key.
pub trait ProfileFields {
    fn profile_fields(&self) -> Result<Vec<(&'static str, Option<String>)>>;
}

impl ProfileFields for TemporaryCredentials {
    fn profile_fields(&self) -> Result<Vec<(&'static str, Option<String>)>> {
        let mut fields = vec![
            (ACCESS_KEY_ID, Some(self.access_key_id.clone())),
            (SECRET_ACCESS_KEY, Some(self.secret_access_key.clone())),
        ];
        match &self.session_token {
            Some(token) => fields.extend([
                (SESSION_TOKEN, Some(token.clone())),
                (SECURITY_TOKEN, Some(token.clone())),
                (EXPIRATION, Some(self.expiration.fmt(Format::DateTime)?)),
            ]),
            None => fields.extend(stale_session_fields()),
        }
        Ok(fields)
    }
}

impl ProfileFields for LongLivedKeyPair {
    fn profile_fields(&self) -> Result<Vec<(&'static str, Option<String>)>> {
        let mut fields = vec![
            (ACCESS_KEY_ID, Some(self.access_key_id.clone())),
            (SECRET_ACCESS_KEY, Some(self.secret_access_key.clone())),
        ];
        fields.extend(stale_session_fields());
        Ok(fields)
    }
}

fn stale_session_fields() -> [(&'static str, Option<String>); 3] {
    [(SESSION_TOKEN, None), (SECURITY_TOKEN, None), (EXPIRATION, None)]
}

impl TemporaryCredentials {
    /// Stand-in used by the offline testing mode: the identity keys with a dummy
    /// session token that expires in five minutes.
    pub fn offline(identity: &Credentials, now: SystemTime) -> Self {
        Self {
            access_key_id: identity.access_key_id().to_string(),
            secret_access_key: identity.secret_access_key().to_string(),
            session_token: Some("420".to_string()),
            expiration: DateTime::from(now + Duration::from_secs(5 * 60)),
        }
    }

    /// `H:MM:SS` left until expiry, or `expired`.
    pub fn remaining(&self, now: SystemTime) -> String {
        let secs = self.expiration.secs() - DateTime::from(now).secs();
        if secs <= 0 {
            return "expired".to_string();
        }
        format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
    }
}

/// Reads the signing credentials stored in `section`.
pub fn from_section(store: &ConfigStore, section: &str) -> Result<Credentials> {
    Ok(Credentials::new(
        store.get_value(section, ACCESS_KEY_ID)?,
        store.get_value(section, SECRET_ACCESS_KEY)?,
        store.get_optional(section, SESSION_TOKEN)?,
        None,
        PROVIDER_NAME,
    ))
}

/// Reads the identity profile, listing the known profiles when it is absent.
pub fn identity_from_section(store: &ConfigStore, profile: &str) -> Result<Credentials> {
    if !store.has_section(profile) {
        return Err(MfaError::ProfileNotFound {
            profile: profile.to_string(),
            available: {
                let mut names = store.sections();
                names.sort();
                names
            },
        });
    }
    from_section(store, profile)
}
