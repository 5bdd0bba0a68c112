//! AWS MFA Token Manager
//!
//! This program exchanges long-lived AWS credentials plus an MFA code for temporary
//! credentials and stores them in the local credentials file under a separate profile.
//! It can also rotate the long-lived access key pair in the same run.
//!
//! Exit status is `0` on success and `1` for conditions the user can fix (missing file or
//! profile, no MFA device, rejected code). Anything else fails with the full error chain.

use std::{
    io::Write,
    process::ExitCode,
    time::SystemTime,
};

use anyhow::Result;
use clap::Parser;

mod acquirer;
mod cli;
mod config;
mod credentials;
mod device;
mod error;
mod export;
mod provider;
mod rotator;
mod store;
mod updater;
mod writer;

use cli::Args;
use config::Config;
use provider::AwsConnector;
use updater::AwsMfaUpdater;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // INFO by default, RUST_LOG overrides.
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let config = Config::from_args(Args::parse(), SystemTime::now())?;

    match AwsMfaUpdater::new(&config, &AwsConnector)
        .run(prompt_token_code)
        .await
    {
        Ok(exports) => {
            for line in exports {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_user_recoverable() => {
            eprintln!("{e}");
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}

/// Asks for the MFA code on the terminal. The prompt goes to stderr so `--env` output
/// on stdout stays evaluable.
fn prompt_token_code() -> std::io::Result<String> {
    eprint!("MFA Token Code: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "no MFA token code entered",
        ));
    }
    Ok(input)
}
