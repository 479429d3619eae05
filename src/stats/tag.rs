//! Tag keys and tag maps.
//!
//! # Responsibilities
//! - Mint validated, process-unique tag keys
//! - Carry tag values from producers to the view registry
//!
//! # Design Decisions
//! - Keys are interned by name: minting the same name twice returns the same key
//! - The registry is written during startup and only read afterwards

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use super::error::{check_name, StatsError, StatsResult};

/// A named grouping dimension.
///
/// Cloning is cheap; equality and ordering follow the name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagKey {
    name: Arc<str>,
}

impl TagKey {
    /// The key's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TagKey({})", self.name)
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Allocates tag keys for one stats context.
#[derive(Debug, Default)]
pub struct TagKeyRegistry {
    keys: DashMap<String, TagKey>,
}

impl TagKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a key, or return the existing key with the same name.
    pub fn new_key(&self, name: &str) -> StatsResult<TagKey> {
        check_name(name).map_err(|reason| StatsError::InvalidKeyName {
            name: name.to_string(),
            reason,
        })?;

        let key = self
            .keys
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(key = name, "Tag key created");
                TagKey { name: Arc::from(name) }
            })
            .value()
            .clone();
        Ok(key)
    }

    /// Whether `key` was minted by this registry.
    pub fn contains(&self, key: &TagKey) -> bool {
        self.keys
            .get(key.name())
            .map(|k| Arc::ptr_eq(&k.name, &key.name))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Tag values attached to one recording call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    tags: BTreeMap<TagKey, String>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert; a later value for the same key wins.
    pub fn with(mut self, key: &TagKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &TagKey, value: impl Into<String>) {
        self.tags.insert(key.clone(), value.into());
    }

    pub fn get(&self, key: &TagKey) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &str)> {
        self.tags.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}
