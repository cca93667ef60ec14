//! Token store persisted as a single JSON file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, instrument};

use phantom_core::Result;
use phantom_core::TokenStore;
use phantom_core::error::{Error, StorageError};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

type Entries = BTreeMap<String, String>;

/// A [`TokenStore`] backed by one JSON object file.
///
/// Every operation reads the file afresh, so several processes can share
/// one store. Writes hold an exclusive lock on a sibling `.lock` file and
/// replace the data file through a rename, so readers never see a partial
/// write. On Unix the file is readable by its owner only.
///
/// A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Use the store file at `path`. Nothing is created until the first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the data file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        sibling(&self.path, "lock")
    }

    fn temp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    fn io_error(&self, source: io::Error) -> Error {
        Error::Storage(StorageError::Io {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn read_entries(&self) -> Result<Entries> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        if content.trim().is_empty() {
            return Ok(Entries::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })
    }

    fn write_entries(&self, entries: &Entries) -> Result<()> {
        let content = serde_json::to_string_pretty(entries)?;
        let temp_path = self.temp_path();

        let mut file = File::create(&temp_path).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| self.io_error(e))?;

        file.write_all(content.as_bytes())
            .map_err(|e| self.io_error(e))?;
        file.sync_data().map_err(|e| self.io_error(e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Read, change and write back the entries under the exclusive lock.
    fn update(&self, change: impl FnOnce(&mut Entries) -> bool) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| self.io_error(e))?;

        lock_file.lock_exclusive().map_err(|e| self.io_error(e))?;

        let result = self.read_entries().and_then(|mut entries| {
            if change(&mut entries) {
                self.write_entries(&entries)
            } else {
                Ok(())
            }
        });

        lock_file.unlock().map_err(|e| self.io_error(e))?;
        result
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.remove(key))
    }

    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })?;
        debug!("Stored key");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn remove(&self, key: &str) -> Result<()> {
        let mut removed = false;
        self.update(|entries| {
            removed = entries.remove(key).is_some();
            removed
        })?;
        if removed {
            debug!("Removed key");
        }
        Ok(())
    }
}

fn sibling(path: &Path, extension: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(extension);
    path.with_file_name(name)
}
