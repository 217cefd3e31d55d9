//! Persisted location registry abstraction.
//!
//! The registry holds locations operators created by hand, independent of the
//! warehouse configuration. It is read once at the start of a run and frozen
//! into a [`RegistrySnapshot`] so resolution never touches I/O.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use super::{LocationCategory, WarehouseConfig};
use crate::prelude::*;

/// A manually created location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Location code as entered
    pub code: String,
    /// Declared category
    pub category: LocationCategory,
    /// Declared capacity in units
    pub capacity: u32,
    /// Zone of the location
    #[serde(default)]
    pub zone: Option<String>,
}

impl RegistryEntry {
    /// Creates a new registry entry.
    pub fn new(code: impl Into<String>, category: LocationCategory, capacity: u32) -> Self {
        Self {
            code: code.into(),
            category,
            capacity,
            zone: None,
        }
    }

    /// Sets the zone.
    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }
}

/// Source of persisted locations, implemented by the storage collaborator.
#[async_trait]
pub trait LocationRegistry: Debug + Send + Sync {
    /// Loads every registered location for a warehouse.
    async fn load_locations(&self, warehouse_id: &str) -> Result<Vec<RegistryEntry>>;
}

/// Registry with no entries, for warehouses that only use configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyLocationRegistry;

#[async_trait]
impl LocationRegistry for EmptyLocationRegistry {
    async fn load_locations(&self, _warehouse_id: &str) -> Result<Vec<RegistryEntry>> {
        Ok(Vec::new())
    }
}

/// In-memory registry for tests, demos and caching layers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocationRegistry {
    entries: Arc<RwLock<HashMap<String, Vec<RegistryEntry>>>>,
}

impl InMemoryLocationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated for one warehouse.
    pub fn with_entries(warehouse_id: impl Into<String>, entries: Vec<RegistryEntry>) -> Self {
        let mut data = HashMap::new();
        data.insert(warehouse_id.into(), entries);
        Self {
            entries: Arc::new(RwLock::new(data)),
        }
    }

    /// Registers a location.
    pub async fn insert(&self, warehouse_id: &str, entry: RegistryEntry) {
        let mut data = self.entries.write().await;
        data.entry(warehouse_id.to_string()).or_default().push(entry);
    }

    /// Removes every entry with the given code (case-insensitive); returns
    /// whether anything was removed.
    pub async fn remove(&self, warehouse_id: &str, code: &str) -> bool {
        let mut data = self.entries.write().await;
        let Some(entries) = data.get_mut(warehouse_id) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| !e.code.trim().eq_ignore_ascii_case(code.trim()));
        entries.len() != before
    }

    /// Returns the number of entries for a warehouse.
    pub async fn len(&self, warehouse_id: &str) -> usize {
        self.entries
            .read()
            .await
            .get(warehouse_id)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl LocationRegistry for InMemoryLocationRegistry {
    async fn load_locations(&self, warehouse_id: &str) -> Result<Vec<RegistryEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .get(warehouse_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Frozen registry contents keyed by normalized code.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    entries: HashMap<String, RegistryEntry>,
}

impl RegistrySnapshot {
    /// A snapshot with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot, normalizing codes with the warehouse rules.
    ///
    /// Blank codes are dropped. When two entries normalize to the same code
    /// the first one wins.
    pub fn from_entries(config: &WarehouseConfig, entries: Vec<RegistryEntry>) -> Self {
        let mut map = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = config.normalize_code(&entry.code);
            if key.is_empty() {
                warn!("Skipping registry entry with a blank location code");
                continue;
            }
            if map.contains_key(&key) {
                warn!(location.code = %key, "Duplicate registry entry ignored");
                continue;
            }
            map.insert(key, entry);
        }
        Self { entries: map }
    }

    /// Loads the registry for the configured warehouse and freezes it.
    #[instrument(skip(registry, config), fields(warehouse.id = %config.warehouse_id))]
    pub async fn load(registry: &dyn LocationRegistry, config: &WarehouseConfig) -> Result<Self> {
        let entries = registry
            .load_locations(&config.warehouse_id)
            .await
            .with_context(|| format!("Failed to load registry for {}", config.warehouse_id))?;
        let snapshot = Self::from_entries(config, entries);
        debug!(entries = snapshot.len(), "Location registry snapshot ready");
        Ok(snapshot)
    }

    /// Looks up an already-normalized code.
    pub fn get(&self, normalized_code: &str) -> Option<&RegistryEntry> {
        self.entries.get(normalized_code)
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
