//! Shell export statements for `eval "$(awsmfa --env)"`.

use crate::{
    credentials::{ACCESS_KEY_ID, SECRET_ACCESS_KEY, SESSION_TOKEN},
    error::Result,
    store::ConfigStore,
};

const EXPORTS: [(&str, &str); 3] = [
    ("AWS_ACCESS_KEY_ID", ACCESS_KEY_ID),
    ("AWS_SECRET_ACCESS_KEY", SECRET_ACCESS_KEY),
    ("AWS_SESSION_TOKEN", SESSION_TOKEN),
];

/// One `KEY=value; export KEY;` line per credential in `profile`.
pub fn export_lines(store: &ConfigStore, profile: &str) -> Result<Vec<String>> {
    let mut lines = Vec::with_capacity(EXPORTS.len());
    for (var, key) in EXPORTS {
        let value = store.get_value(profile, key)?;
        lines.push(format!("{var}={}; export {var};", shell_words::quote(&value)));
    }
    Ok(lines)
}
