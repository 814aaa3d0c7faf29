//! Index metadata and the cluster-wide metadata catalog.

use crate::settings::{
    Settings, DEFAULT_NUMBER_OF_REPLICAS, DEFAULT_NUMBER_OF_SHARDS, SETTING_NUMBER_OF_REPLICAS,
    SETTING_NUMBER_OF_SHARDS,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Immutable description of a single index: its name, resolved settings,
/// and the canonical mapping source per type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetaData {
    name: String,
    settings: Settings,
    mappings: BTreeMap<String, String>,
}

impl IndexMetaData {
    pub fn builder(name: impl Into<String>) -> IndexMetaDataBuilder {
        IndexMetaDataBuilder {
            name: name.into(),
            settings: Settings::default(),
            mappings: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mappings(&self) -> &BTreeMap<String, String> {
        &self.mappings
    }

    pub fn mapping(&self, mapping_type: &str) -> Option<&str> {
        self.mappings.get(mapping_type).map(String::as_str)
    }

    pub fn number_of_shards(&self) -> u32 {
        self.settings
            .as_int(SETTING_NUMBER_OF_SHARDS, DEFAULT_NUMBER_OF_SHARDS as i64)
            .ok()
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(DEFAULT_NUMBER_OF_SHARDS)
    }

    pub fn number_of_replicas(&self) -> u32 {
        self.settings
            .as_int(
                SETTING_NUMBER_OF_REPLICAS,
                DEFAULT_NUMBER_OF_REPLICAS as i64,
            )
            .ok()
            .and_then(|value| u32::try_from(value).ok())
            .unwrap_or(DEFAULT_NUMBER_OF_REPLICAS)
    }

    /// Total shard copies this index will occupy once allocated.
    pub fn total_number_of_shards(&self) -> u32 {
        self.number_of_shards() * (1 + self.number_of_replicas())
    }
}

#[derive(Debug, Clone)]
pub struct IndexMetaDataBuilder {
    name: String,
    settings: Settings,
    mappings: BTreeMap<String, String>,
}

impl IndexMetaDataBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn put_mapping(mut self, mapping_type: impl Into<String>, source: impl Into<String>) -> Self {
        self.mappings.insert(mapping_type.into(), source.into());
        self
    }

    pub fn build(self) -> IndexMetaData {
        IndexMetaData {
            name: self.name,
            settings: self.settings,
            mappings: self.mappings,
        }
    }
}

/// The portion of cluster state describing indices and aliases. At most
/// one `IndexMetaData` per name; aliases are disjoint from index names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaData {
    indices: BTreeMap<String, IndexMetaData>,
    aliases: BTreeSet<String>,
}

impl MetaData {
    pub fn builder() -> MetaDataBuilder {
        MetaDataBuilder::default()
    }

    pub fn builder_from(existing: &MetaData) -> MetaDataBuilder {
        MetaDataBuilder {
            indices: existing.indices.clone(),
            aliases: existing.aliases.clone(),
        }
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.contains_key(index)
    }

    pub fn index(&self, index: &str) -> Option<&IndexMetaData> {
        self.indices.get(index)
    }

    pub fn indices(&self) -> impl Iterator<Item = &IndexMetaData> {
        self.indices.values()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn aliases(&self) -> &BTreeSet<String> {
        &self.aliases
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetaDataBuilder {
    indices: BTreeMap<String, IndexMetaData>,
    aliases: BTreeSet<String>,
}

impl MetaDataBuilder {
    pub fn put(mut self, index: IndexMetaData) -> Self {
        self.indices.insert(index.name.clone(), index);
        self
    }

    pub fn remove(mut self, index: &str) -> Self {
        self.indices.remove(index);
        self
    }

    pub fn add_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn build(self) -> MetaData {
        MetaData {
            indices: self.indices,
            aliases: self.aliases,
        }
    }
}
