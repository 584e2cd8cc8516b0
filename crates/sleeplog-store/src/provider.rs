//! Storage location resolution

use sleeplog_util::default_data_dir;
use std::path::{Path, PathBuf};

use crate::StorageError;

/// Resolves a writable file location for a logical file name
///
/// Called on every load and every write, so an implementation may start
/// failing (or pointing elsewhere) at any time.
pub trait StoragePathProvider: Send + Sync {
    fn storage_path(&self, file_name: &str) -> Result<PathBuf, StorageError>;
}

impl<F> StoragePathProvider for F
where
    F: Fn(&str) -> Result<PathBuf, StorageError> + Send + Sync,
{
    fn storage_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        self(file_name)
    }
}

/// Places files in a directory, creating it on demand
#[derive(Debug, Clone)]
pub struct DataDirProvider {
    dir: PathBuf,
}

impl DataDirProvider {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl Default for DataDirProvider {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

impl StoragePathProvider for DataDirProvider {
    fn storage_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| StorageError::Unresolvable {
            file_name: file_name.to_string(),
            reason: format!("cannot create {}: {}", self.dir.display(), e),
        })?;

        Ok(self.dir.join(file_name))
    }
}
