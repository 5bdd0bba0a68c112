//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, builder::BoolishValueParser};

use crate::config::TokenCode;

/// AWS MFA credential manager.
///
/// Exchanges the long-lived keys in the identity profile plus an MFA code for temporary
/// credentials and writes them to the target profile. Every value in the identity profile
/// (including custom settings such as `region`) is copied to the target profile, with the
/// access key, secret key, and session token replaced. Optionally rotates the identity
/// profile's access key pair afterwards.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Full ARN of the role to assume. Without it the temporary credentials inherit the
    /// user's policies and satisfy the aws:MultiFactorAuthPresent condition
    #[arg(value_name = "ROLE_TO_ASSUME", env = "AWS_MFA_ROLE_TO_ASSUME")]
    pub role_to_assume: Option<String>,

    /// Path to AWS credentials file [default: ~/.aws/credentials]
    #[arg(long, env = "AWS_SHARED_CREDENTIALS_FILE")]
    pub aws_credentials: Option<PathBuf>,

    /// Session duration in seconds (900-129600). Role sessions are limited to an hour
    #[arg(
        short,
        long,
        env = "AWS_MFA_DURATION",
        default_value = "21600",
        value_parser = clap::value_parser!(u32).range(900..=129_600)
    )]
    pub duration: u32,

    /// Section holding the long-lived credentials used for the exchange
    #[arg(short, long, env = "AWS_MFA_IDENTITY_PROFILE", default_value = "identity")]
    pub identity_profile: String,

    /// Full ARN of the MFA device [default: queried from IAM]
    #[arg(long, env = "AWS_MFA_SERIAL_NUMBER")]
    pub serial_number: Option<String>,

    /// Section to overwrite with the temporary credentials
    #[arg(short, long, env = "AWS_MFA_TARGET_PROFILE", default_value = "default")]
    pub target_profile: String,

    /// Name of the temporary session when assuming a role [default: awsmfa_<timestamp>]
    #[arg(long, env = "AWS_MFA_ROLE_SESSION_NAME")]
    pub role_session_name: Option<String>,

    /// The 6 digit MFA code, or "skip" to acquire credentials that do not satisfy
    /// aws:MultiFactorAuthPresent [default: prompt]
    #[arg(short = 'c', long, env = "AWS_MFA_TOKEN_CODE", value_parser = TokenCode::parse)]
    pub token_code: Option<TokenCode>,

    /// Rotate the identity profile's access key pair after acquiring temporary credentials
    #[arg(long, env = "AWS_MFA_ROTATE_IDENTITY_KEYS", value_parser = BoolishValueParser::new())]
    pub rotate_identity_keys: bool,

    /// Print AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and AWS_SESSION_TOKEN as shell exports
    #[arg(long, env = "AWS_MFA_ENV", value_parser = BoolishValueParser::new())]
    pub env: bool,

    /// Skip AWS calls during the exchange and write placeholder session credentials
    #[arg(
        long,
        env = "AWSMFA_TESTING_MODE",
        value_parser = BoolishValueParser::new(),
        hide = true
    )]
    pub testing_mode: bool,
}
