//! Per-node index stores and their mapper services.
//!
//! The coordinator consumes these through trait objects; the crate ships
//! an in-memory store and a filesystem-backed store that adds a per-index
//! directory under the node environment.

use crate::environment::{Environment, EnvironmentError};
use crate::settings::Settings;
use log::debug;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapperError {
    #[error("failed to parse mapping source: {0}")]
    InvalidSource(String),
}

#[derive(Debug, Error)]
pub enum IndexStoreError {
    #[error("index [{0}] already exists in this store")]
    AlreadyExists(String),
    #[error("no index service for [{0}]")]
    Missing(String),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

/// Parses and canonicalizes mapping sources for one index.
pub trait MapperService: Send + Sync {
    /// Registers a mapping type. The source is validated and stored in
    /// canonical form; canonicalization is idempotent.
    fn add(&self, mapping_type: &str, source: &str) -> Result<(), MapperError>;

    /// All registered mappings as `(type, canonical_source)` pairs.
    fn mappings(&self) -> Vec<(String, String)>;
}

pub trait IndexService: Send + Sync {
    fn mapper_service(&self) -> Arc<dyn MapperService>;
}

/// The per-node materialization of indices, consumed by the coordinator
/// to validate a create before the metadata commit.
pub trait LocalIndexStore: Send + Sync {
    fn create(
        &self,
        index: &str,
        settings: &Settings,
        local_node_id: &str,
    ) -> Result<(), IndexStoreError>;

    fn delete(&self, index: &str) -> Result<(), IndexStoreError>;

    fn index_service_safe(&self, index: &str) -> Result<Arc<dyn IndexService>, IndexStoreError>;
}

/// Mapper that treats mapping sources as JSON documents and canonicalizes
/// them to their compact serialization.
#[derive(Default)]
pub struct JsonMapperService {
    mappings: Mutex<BTreeMap<String, String>>,
}

impl MapperService for JsonMapperService {
    fn add(&self, mapping_type: &str, source: &str) -> Result<(), MapperError> {
        let value: serde_json::Value = serde_json::from_str(source)
            .map_err(|err| MapperError::InvalidSource(err.to_string()))?;
        let canonical = serde_json::to_string(&value)
            .map_err(|err| MapperError::InvalidSource(err.to_string()))?;
        self.mappings
            .lock()
            .insert(mapping_type.to_string(), canonical);
        Ok(())
    }

    fn mappings(&self) -> Vec<(String, String)> {
        self.mappings
            .lock()
            .iter()
            .map(|(mapping_type, source)| (mapping_type.clone(), source.clone()))
            .collect()
    }
}

struct MemoryIndexService {
    mapper: Arc<JsonMapperService>,
}

impl IndexService for MemoryIndexService {
    fn mapper_service(&self) -> Arc<dyn MapperService> {
        self.mapper.clone()
    }
}

/// Purely in-memory index store.
#[derive(Default)]
pub struct MemoryIndexStore {
    indices: Mutex<BTreeMap<String, Arc<MemoryIndexService>>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, index: &str) -> bool {
        self.indices.lock().contains_key(index)
    }
}

impl LocalIndexStore for MemoryIndexStore {
    fn create(
        &self,
        index: &str,
        _settings: &Settings,
        local_node_id: &str,
    ) -> Result<(), IndexStoreError> {
        let mut indices = self.indices.lock();
        if indices.contains_key(index) {
            return Err(IndexStoreError::AlreadyExists(index.to_string()));
        }
        debug!("creating index [{index}] on node [{local_node_id}]");
        indices.insert(
            index.to_string(),
            Arc::new(MemoryIndexService {
                mapper: Arc::new(JsonMapperService::default()),
            }),
        );
        Ok(())
    }

    fn delete(&self, index: &str) -> Result<(), IndexStoreError> {
        self.indices.lock().remove(index);
        Ok(())
    }

    fn index_service_safe(&self, index: &str) -> Result<Arc<dyn IndexService>, IndexStoreError> {
        self.indices
            .lock()
            .get(index)
            .cloned()
            .map(|service| service as Arc<dyn IndexService>)
            .ok_or_else(|| IndexStoreError::Missing(index.to_string()))
    }
}

/// Index store that also materializes a per-index directory under the
/// node's data path. A directory that cannot be created fails the create.
pub struct FsIndexStore {
    environment: Environment,
    memory: MemoryIndexStore,
}

impl FsIndexStore {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            memory: MemoryIndexStore::new(),
        }
    }

    pub fn exists(&self, index: &str) -> bool {
        self.memory.exists(index)
    }
}

impl LocalIndexStore for FsIndexStore {
    fn create(
        &self,
        index: &str,
        settings: &Settings,
        local_node_id: &str,
    ) -> Result<(), IndexStoreError> {
        let path = self.environment.prepare_index_store(index)?;
        debug!("index [{index}] store at [{}]", path.display());
        self.memory.create(index, settings, local_node_id)
    }

    fn delete(&self, index: &str) -> Result<(), IndexStoreError> {
        self.memory.delete(index)?;
        self.environment.remove_index_store(index)?;
        Ok(())
    }

    fn index_service_safe(&self, index: &str) -> Result<Arc<dyn IndexService>, IndexStoreError> {
        self.memory.index_service_safe(index)
    }
}
