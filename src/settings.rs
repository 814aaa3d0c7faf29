//! Immutable dotted-key settings with layered overrides.
//!
//! Request-level settings are layered over cluster defaults by building a
//! new `Settings` from an existing one; later `put` calls win.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Primary shard count for a newly created index.
pub const SETTING_NUMBER_OF_SHARDS: &str = "index.number_of_shards";
/// Replica count per primary for a newly created index.
pub const SETTING_NUMBER_OF_REPLICAS: &str = "index.number_of_replicas";

pub const DEFAULT_NUMBER_OF_SHARDS: u32 = 5;
pub const DEFAULT_NUMBER_OF_REPLICAS: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    entries: BTreeMap<String, String>,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn as_int(&self, key: &str, default: i64) -> Result<i64, SettingsError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| SettingsError::Unparsable {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "integer",
            }),
        }
    }

    pub fn as_bool(&self, key: &str, default: bool) -> Result<bool, SettingsError> {
        match self.get(key) {
            None => Ok(default),
            Some("true") | Some("on") | Some("yes") | Some("1") => Ok(true),
            Some("false") | Some("off") | Some("no") | Some("0") => Ok(false),
            Some(raw) => Err(SettingsError::Unparsable {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "boolean",
            }),
        }
    }

    /// Parses a duration value. A bare number is interpreted as
    /// milliseconds; `ms`, `s`, `m`, and `h` suffixes are recognized.
    pub fn as_duration(&self, key: &str, default: Duration) -> Result<Duration, SettingsError> {
        let raw = match self.get(key) {
            None => return Ok(default),
            Some(raw) => raw.trim(),
        };
        parse_duration(raw).ok_or_else(|| SettingsError::Unparsable {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "duration",
        })
    }

    /// Parses a byte-size value. A bare number is a byte count; `b`, `kb`,
    /// `mb`, and `gb` suffixes are recognized (1024 multiples).
    pub fn as_bytes(&self, key: &str, default: u64) -> Result<u64, SettingsError> {
        let raw = match self.get(key) {
            None => return Ok(default),
            Some(raw) => raw.trim(),
        };
        parse_bytes(raw).ok_or_else(|| SettingsError::Unparsable {
            key: key.to_string(),
            value: raw.to_string(),
            expected: "byte size",
        })
    }
}

fn parse_duration(raw: &str) -> Option<Duration> {
    let lower = raw.to_ascii_lowercase();
    let (digits, scale_ms) = if let Some(prefix) = lower.strip_suffix("ms") {
        (prefix, 1u64)
    } else if let Some(prefix) = lower.strip_suffix('s') {
        (prefix, 1_000)
    } else if let Some(prefix) = lower.strip_suffix('m') {
        (prefix, 60_000)
    } else if let Some(prefix) = lower.strip_suffix('h') {
        (prefix, 3_600_000)
    } else {
        (lower.as_str(), 1)
    };
    let value: u64 = digits.trim().parse().ok()?;
    Some(Duration::from_millis(value.checked_mul(scale_ms)?))
}

fn parse_bytes(raw: &str) -> Option<u64> {
    let lower = raw.to_ascii_lowercase();
    let (digits, scale) = if let Some(prefix) = lower.strip_suffix("kb") {
        (prefix, 1024u64)
    } else if let Some(prefix) = lower.strip_suffix("mb") {
        (prefix, 1024 * 1024)
    } else if let Some(prefix) = lower.strip_suffix("gb") {
        (prefix, 1024 * 1024 * 1024)
    } else if let Some(prefix) = lower.strip_suffix('b') {
        (prefix, 1)
    } else {
        (lower.as_str(), 1)
    };
    let value: u64 = digits.trim().parse().ok()?;
    value.checked_mul(scale)
}

#[derive(Debug, Clone, Default)]
pub struct SettingsBuilder {
    entries: BTreeMap<String, String>,
}

impl SettingsBuilder {
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn put_int(self, key: impl Into<String>, value: i64) -> Self {
        self.put(key, value.to_string())
    }

    /// Layers every entry of `settings` over the current contents.
    pub fn put_all(mut self, settings: &Settings) -> Self {
        for (key, value) in settings.iter() {
            self.entries.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn build(self) -> Settings {
        Settings {
            entries: self.entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    #[error("setting [{key}] has unparsable {expected} value [{value}]")]
    Unparsable {
        key: String,
        value: String,
        expected: &'static str,
    },
}
