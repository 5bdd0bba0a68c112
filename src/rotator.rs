//! Rotation of the identity profile's long-lived access key.
//!
//! Rotation runs locate, delete, create, persist in that order and never rolls back.
//! IAM allows two keys per user, but the configured key is deleted before its replacement
//! is created so rotation also works for users already at the limit. If the create call
//! fails after the delete succeeded, the profile still names a key that no longer exists
//! and the user has to create one by hand; that window is reported as
//! [`MfaError::RotationIncomplete`].
//!
//! Two concurrent rotations against the same file are not guarded against.

use log::{error, info};

use crate::{
    credentials::{ACCESS_KEY_ID, LongLivedKeyPair},
    error::{MfaError, Result},
    provider::CredentialProvider,
    store::ConfigStore,
    writer::ProfileWriter,
};

/// Rotates the long-lived access key of one profile against IAM.
pub struct KeyRotator<'a> {
    provider: &'a dyn CredentialProvider,
}

impl<'a> KeyRotator<'a> {
    pub fn new(provider: &'a dyn CredentialProvider) -> Self {
        Self { provider }
    }

    /// Replaces the access key configured in `section` with a freshly created one and
    /// writes the new pair back into the same section.
    pub async fn rotate(&self, store: &mut ConfigStore, section: &str) -> Result<LongLivedKeyPair> {
        let current = store.get_value(section, ACCESS_KEY_ID)?;

        let remote_keys = self
            .provider
            .list_access_keys()
            .await
            .map_err(|e| MfaError::Remote(e.into()))?;
        if !remote_keys.iter().any(|k| *k == current) {
            return Err(MfaError::KeyNotFound(current));
        }

        self.provider
            .delete_access_key(&current)
            .await
            .map_err(|e| MfaError::Remote(e.into()))?;

        let replacement = match self.provider.create_access_key().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("Deleted access key {current} but could not create a replacement");
                return Err(MfaError::RotationIncomplete {
                    deleted: current,
                    cause: e.into(),
                });
            }
        };

        info!("Rotating from {current} to {}.", replacement.access_key_id);
        ProfileWriter::new(store)
            .write_credentials(section, section, &replacement)
            .await?;
        info!("{section} profile updated.");

        Ok(replacement)
    }
}
