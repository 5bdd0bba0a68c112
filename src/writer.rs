//! Writes issued credentials into a profile section.

use crate::{
    credentials::ProfileFields,
    error::Result,
    store::{ConfigStore, merge},
};

/// Writes credential fields into a profile of a [`ConfigStore`].
///
/// The target starts as a copy of the source profile, so settings like `region` follow
/// the keys. Each write ends in exactly one [`ConfigStore::persist`].
pub struct ProfileWriter<'a> {
    store: &'a mut ConfigStore,
}

impl<'a> ProfileWriter<'a> {
    pub fn new(store: &'a mut ConfigStore) -> Self {
        Self { store }
    }

    /// Writes `credentials` into `target` and persists the document.
    ///
    /// When `target` differs from `source`, `target` is first rebuilt as a copy of `source`
    /// so settings such as `region` carry over. Credentials without a session token remove
    /// any session token and expiry left in `target`. Each call is one atomic writeback.
    pub async fn write_credentials(
        &mut self,
        target: &str,
        source: &str,
        credentials: &impl ProfileFields,
    ) -> Result<()> {
        self.store.copy_section(source, target)?;

        let base = if self.store.has_section(target) {
            self.store.section(target)?
        } else {
            Default::default()
        };
        let updated = merge(&base, &credentials.profile_fields()?);
        self.store.replace_section(target, updated);

        self.store.persist().await
    }
}
