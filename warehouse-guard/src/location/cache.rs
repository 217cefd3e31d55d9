use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, instrument};

use super::{LocationDescriptor, LocationResolver};
use crate::log_location;
use crate::logging::LogConfig;

/// Per-run memo of resolved locations.
///
/// Built eagerly before any rule runs so evaluators can share it read-only.
/// Raw codes that normalize to the same code share one descriptor.
#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    raw_to_normalized: HashMap<String, String>,
    descriptors: BTreeMap<String, Arc<LocationDescriptor>>,
    fingerprint: String,
}

impl LocationIndex {
    /// Resolves every distinct code once.
    #[instrument(skip(resolver, codes, log), fields(fingerprint = %resolver.fingerprint()))]
    pub fn build<'a, I>(resolver: &LocationResolver, codes: I, log: &LogConfig) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut raw_to_normalized = HashMap::new();
        let mut descriptors: BTreeMap<String, Arc<LocationDescriptor>> = BTreeMap::new();

        for raw in codes {
            if raw_to_normalized.contains_key(raw) {
                continue;
            }
            let normalized = resolver.normalize(raw);
            if !descriptors.contains_key(&normalized) {
                let descriptor = resolver.resolve_normalized(normalized.clone());
                log_location!(
                    log,
                    location.raw = %log.field(raw),
                    location.code = %log.field(&descriptor.code),
                    location.category = %descriptor.category,
                    location.source = %descriptor.source,
                    "Resolved location"
                );
                descriptors.insert(normalized.clone(), Arc::new(descriptor));
            }
            raw_to_normalized.insert(raw.to_string(), normalized);
        }

        let index = Self {
            raw_to_normalized,
            descriptors,
            fingerprint: resolver.fingerprint().to_string(),
        };
        debug!(
            distinct_locations = index.len(),
            invalid_locations = index.invalid_count(),
            "Location index built"
        );
        index
    }

    /// Descriptor for a raw code seen during the build.
    pub fn get(&self, raw: &str) -> Option<&Arc<LocationDescriptor>> {
        self.raw_to_normalized
            .get(raw)
            .and_then(|normalized| self.descriptors.get(normalized))
    }

    /// Descriptor for an already-normalized code.
    pub fn get_normalized(&self, code: &str) -> Option<&Arc<LocationDescriptor>> {
        self.descriptors.get(code)
    }

    /// Number of distinct normalized locations.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if no locations were indexed.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Distinct descriptors in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LocationDescriptor>> {
        self.descriptors.values()
    }

    /// Number of distinct locations that resolved to invalid.
    pub fn invalid_count(&self) -> usize {
        self.descriptors.values().filter(|d| d.is_invalid()).count()
    }

    /// Fingerprint of the configuration the index was built against.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether this index may be reused for a resolver with the given fingerprint.
    pub fn is_current(&self, fingerprint: &str) -> bool {
        self.fingerprint == fingerprint
    }
}
