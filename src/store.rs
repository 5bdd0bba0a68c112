//! AWS credentials file store.
//!
//! [`ConfigStore`] owns the parsed credentials document for the whole run. It is loaded
//! once, edited section by section, and written back with [`ConfigStore::persist`], which
//! never touches the real file until a complete copy exists next to it:
//!
//! ```text
//! ~/.aws/credentials.tmp   <- full document written and fsynced here
//! ~/.aws/credentials       <- replaced by a single rename
//! ```
//!
//! Other AWS tools read this file while we run, so the rename is the only step that can
//! make new content visible under the final name.

use std::path::{Path, PathBuf};

use configparser::ini::{Ini, WriteOptions};
use log::debug;
use tokio::{fs, io::AsyncWriteExt};

use crate::error::{MfaError, Result};

/// Name configparser files header-less keys under. `[default]` is a real AWS profile,
/// so it must not double as the unnamed section.
const UNSECTIONED: &str = "\u{1}unsectioned";

/// Ordered key/value pairs of one section. A `None` value is a bare key with no `=`.
///
/// Keys are case-insensitive and stored lower-cased, the way Python's `ConfigParser` and
/// botocore read the file. Section names keep their case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    entries: Vec<(String, Option<String>)>,
}

impl Section {
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    #[cfg(test)]
    pub fn contains_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Sets `key`, keeping its position if it already exists.
    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into().to_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        let key = key.to_lowercase();
        self.entries.retain(|(k, _)| *k != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Into<String>> FromIterator<(K, Option<String>)> for Section {
    fn from_iter<T: IntoIterator<Item = (K, Option<String>)>>(iter: T) -> Self {
        let mut section = Section::default();
        for (k, v) in iter {
            section.insert(k, v);
        }
        section
    }
}

/// Returns `base` with `updates` applied on top: `Some` sets the key, `None` removes it.
/// Keys of `base` that `updates` does not mention are carried over untouched.
pub fn merge(base: &Section, updates: &[(&str, Option<String>)]) -> Section {
    let mut merged = base.clone();
    for (key, value) in updates {
        match value {
            Some(value) => merged.insert(*key, Some(value.clone())),
            None => merged.remove(key),
        }
    }
    merged
}

/// The AWS credentials file, parsed once and owned for the whole run.
///
/// Every mutation happens in memory; nothing reaches the disk until
/// [`persist`](Self::persist), which rewrites the whole document. Comments in the file are
/// not preserved; values, multi-line blocks such as a nested `s3 =` section, and key order
/// are.
pub struct ConfigStore {
    /// Path the document was loaded from and is written back to
    path: PathBuf,
    /// Parsed sections, keys lower-cased
    ini: Ini,
}

impl ConfigStore {
    /// Loads the credentials document at `path`.
    ///
    /// Callers are expected to have checked that the file exists so they can print a
    /// friendlier hint; a missing file still maps to [`MfaError::NotFound`].
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MfaError::NotFound(path));
            }
            Err(e) => return Err(e.into()),
        };

        let mut ini = new_ini();
        ini.read(content).map_err(|message| MfaError::Parse {
            path: path.clone(),
            message,
        })?;
        for entries in ini.get_mut_map().values_mut() {
            for (key, value) in std::mem::take(entries) {
                entries.insert(key.to_lowercase(), value);
            }
        }
        debug!("Loaded {} sections from {}", ini.sections().len(), path.display());

        Ok(Self { path, ini })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Section names in file order.
    pub fn sections(&self) -> Vec<String> {
        self.ini
            .get_map_ref()
            .keys()
            .filter(|name| name.as_str() != UNSECTIONED)
            .cloned()
            .collect()
    }

    pub fn has_section(&self, name: &str) -> bool {
        name != UNSECTIONED && self.ini.get_map_ref().contains_key(name)
    }

    /// Returns a copy of section `name`.
    pub fn section(&self, name: &str) -> Result<Section> {
        if name == UNSECTIONED {
            return Err(MfaError::MissingSection(name.to_string()));
        }
        let entries = self
            .ini
            .get_map_ref()
            .get(name)
            .ok_or_else(|| MfaError::MissingSection(name.to_string()))?;
        Ok(entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn get_value(&self, section: &str, key: &str) -> Result<String> {
        self.section(section)?
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| MfaError::MissingKey {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Like [`get_value`](Self::get_value) but a missing key is `None`.
    pub fn get_optional(&self, section: &str, key: &str) -> Result<Option<String>> {
        Ok(self.section(section)?.get(key).map(str::to_string))
    }

    /// Sets `key` in `section`, creating either as needed.
    #[cfg(test)]
    pub fn set_value(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.ini.set(section, &key.to_lowercase(), Some(value.into()));
    }

    /// Removes `key` from `section`. Absent keys and sections are not an error.
    #[cfg(test)]
    pub fn remove_key(&mut self, section: &str, key: &str) {
        self.ini.remove_key(section, &key.to_lowercase());
    }

    /// Replaces `target` with a fresh copy of every key in `source`. Keys that only
    /// existed in the old `target` are dropped. Copying a section onto itself does nothing.
    pub fn copy_section(&mut self, source: &str, target: &str) -> Result<()> {
        if source == target {
            return Ok(());
        }
        let section = self.section(source)?;
        self.replace_section(target, section);
        Ok(())
    }

    /// Swaps the content of section `name` for `section`, creating it if absent.
    pub fn replace_section(&mut self, name: &str, section: Section) {
        let map = self.ini.get_mut_map();
        map.insert(
            name.to_string(),
            section
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        );
    }

    /// Writes the whole document back to its path atomically.
    pub async fn persist(&self) -> Result<()> {
        self.stage().await?.commit().await?;
        debug!("Wrote {}", self.path.display());
        Ok(())
    }

    /// Writes the serialized document to `<path>.tmp` without touching `path`.
    pub async fn stage(&self) -> Result<StagedWrite> {
        let temp = temp_path(&self.path);
        let content = self
            .ini
            .pretty_writes(&WriteOptions::new_with_params(true, 2, 1));
        if let Err(e) = write_synced(&temp, content.as_bytes()).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(StagedWrite {
            temp,
            target: self.path.clone(),
        })
    }
}

/// A fully written temporary copy waiting to be renamed over its target.
#[derive(Debug)]
pub struct StagedWrite {
    temp: PathBuf,
    target: PathBuf,
}

impl StagedWrite {
    #[cfg(test)]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    pub async fn commit(self) -> Result<()> {
        fs::rename(&self.temp, &self.target).await?;
        Ok(())
    }
}

/// Reads the file the way botocore does: no inline comments, indented continuation
/// lines belong to the previous value. Keys are lower-cased after loading so that section
/// names keep their case.
fn new_ini() -> Ini {
    let mut defaults = Ini::new_cs().defaults();
    defaults.default_section = UNSECTIONED.to_string();
    defaults.multiline = true;
    defaults.inline_comment_symbols = Some(vec![]);
    Ini::new_from_defaults(defaults)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

async fn write_synced(path: &Path, content: &[u8]) -> std::io::Result<()> {
    // A temp file left by a crashed run keeps its old mode unless recreated.
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}
