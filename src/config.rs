//! Run configuration, resolved once from the command line and environment.

use std::{path::PathBuf, str::FromStr, time::SystemTime};

use anyhow::{Context, Result};
use aws_smithy_types::{DateTime, date_time::Format};

use crate::{acquirer::RoleTarget, cli::Args};

/// An MFA code as accepted on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenCode {
    /// Acquire credentials without MFA.
    Skip,
    Code(String),
}

impl TokenCode {
    pub fn parse(s: &str) -> Result<Self, String> {
        s.parse()
    }

    pub fn is_valid_code(code: &str) -> bool {
        code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
    }
}

impl FromStr for TokenCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "skip" => Ok(Self::Skip),
            code if Self::is_valid_code(code) => Ok(Self::Code(code.to_string())),
            _ => Err("expected a 6 digit code or \"skip\"".to_string()),
        }
    }
}

/// Everything one run needs, resolved once from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credentials file to read and rewrite
    pub credentials_path: PathBuf,
    /// Requested session length in seconds; role sessions are clamped further
    pub duration: u32,
    /// Section holding the long-lived keys
    pub identity_profile: String,
    /// Section that receives the temporary credentials
    pub target_profile: String,
    /// MFA device ARN; `None` means ask IAM
    pub serial_number: Option<String>,
    /// Role to assume instead of a plain session token
    pub role: Option<RoleTarget>,
    /// Code given up front; `None` means prompt
    pub token_code: Option<TokenCode>,
    pub rotate_identity_keys: bool,
    /// Print shell exports for the target profile on success
    pub env: bool,
    /// Write placeholder credentials without calling AWS
    pub testing_mode: bool,
}

impl Config {
    pub fn from_args(args: Args, now: SystemTime) -> Result<Self> {
        let credentials_path = args
            .aws_credentials
            .or_else(|| dirs::home_dir().map(|d| d.join(".aws").join("credentials")))
            .context("Could not determine home directory")?;

        let role = match args.role_to_assume.filter(|arn| !arn.is_empty()) {
            Some(role_arn) => Some(RoleTarget {
                role_arn,
                role_session_name: match args.role_session_name {
                    Some(name) => name,
                    None => default_session_name(now)?,
                },
            }),
            None => None,
        };

        Ok(Self {
            credentials_path,
            duration: args.duration,
            identity_profile: args.identity_profile,
            target_profile: args.target_profile,
            serial_number: args.serial_number,
            role,
            token_code: args.token_code,
            rotate_identity_keys: args.rotate_identity_keys,
            env: args.env,
            testing_mode: args.testing_mode,
        })
    }
}

/// `awsmfa_YYYYMMDDTHHMMSS` in UTC.
fn default_session_name(now: SystemTime) -> Result<String> {
    let now = DateTime::from_secs(DateTime::from(now).secs());
    let stamp: String = now
        .fmt(Format::DateTime)?
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | 'Z'))
        .collect();
    Ok(format!("awsmfa_{stamp}"))
}
