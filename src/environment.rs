//! On-disk layout for a node: config tree and per-index data stores.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Environment {
    home: PathBuf,
    config: PathBuf,
    data: PathBuf,
}

impl Environment {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            config: home.join("config"),
            data: home.join("data"),
            home,
        }
    }

    pub fn home_dir(&self) -> &Path {
        &self.home
    }

    pub fn config_dir(&self) -> &Path {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data
    }

    /// Root of the operator-provided mapping tree (`<config>/mappings`).
    pub fn mappings_dir(&self) -> PathBuf {
        self.config.join("mappings")
    }

    pub fn index_store_path(&self, index: &str) -> PathBuf {
        self.data.join("indices").join(index)
    }

    /// Creates the backing directory for an index store. Unlike mapping
    /// files, a directory that cannot be created fails the operation.
    pub fn prepare_index_store(&self, index: &str) -> Result<PathBuf, EnvironmentError> {
        let path = self.index_store_path(index);
        fs::create_dir_all(&path).map_err(|source| EnvironmentError::CreateDirectory {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Removes the backing directory for an index store, tolerating one
    /// that never existed.
    pub fn remove_index_store(&self, index: &str) -> Result<(), EnvironmentError> {
        let path = self.index_store_path(index);
        match fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(EnvironmentError::RemoveDirectory { path, source }),
        }
    }
}

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("failed to create index store directory [{path}]: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove index store directory [{path}]: {source}")]
    RemoveDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
