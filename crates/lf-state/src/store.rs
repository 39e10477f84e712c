//! Favorite persistence contract
//!
//! [`FavoriteStore`] is what the rest of the application relies on; the
//! backing medium is up to the implementation. [`MemoryFavoriteStore`] keeps
//! everything in process and enforces the same limits a persistent store
//! must.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::error::{StateError, StateResult};
use crate::favorite::{FavoriteRecord, StorageLimits, StorageStats, ValidationCode, ValidationResult};
use crate::settings::PracticeSettings;
use crate::validate::{generate_favorite_id, validate_favorite_limit, validate_total_storage};

// ============ Store Contract ============

pub trait FavoriteStore: Send + Sync {
    /// Insert a new record or replace the one with the same id
    fn save(&self, record: FavoriteRecord) -> ValidationResult;

    fn load(&self, id: &str) -> Option<FavoriteRecord>;

    /// Every record in display order
    fn load_all(&self) -> Vec<FavoriteRecord>;

    /// Returns whether a record was removed
    fn remove(&self, id: &str) -> bool;

    /// Set display order; `ids` must name every stored record exactly once
    fn reorder(&self, ids: &[String]) -> StateResult<()>;

    fn clear_all(&self);

    fn stats(&self) -> StorageStats;

    /// Replace the settings stored with a record
    fn update_settings(&self, id: &str, settings: PracticeSettings) -> ValidationResult {
        let Some(mut record) = self.load(id) else {
            return ValidationResult::fail(ValidationCode::InvalidFormat, format!("Favorite not found: {id}"));
        };
        record.settings = settings.normalized();
        self.save(record)
    }
}

// ============ Memory Store ============

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<String, FavoriteRecord>,
    order: Vec<String>,
}

impl StoreInner {
    fn total_size(&self) -> u64 {
        self.records.values().map(|r| r.size).sum()
    }

    fn check_limits(&self, record: &FavoriteRecord, limits: &StorageLimits) -> ValidationResult {
        let is_update = self.records.contains_key(&record.id);

        if !is_update {
            let count = validate_favorite_limit(self.records.len(), limits);
            if !count.is_valid {
                return count;
            }
            if self.records.values().any(|r| r.file_name == record.file_name) {
                return ValidationResult::fail(
                    ValidationCode::DuplicateFile,
                    format!("A favorite named \"{}\" already exists", record.file_name),
                );
            }
        }

        let others: u64 = self
            .records
            .values()
            .filter(|r| r.id != record.id)
            .map(|r| r.size)
            .sum();
        validate_total_storage(others, record.size, limits)
    }
}

/// In-process favorite store
#[derive(Debug, Default)]
pub struct MemoryFavoriteStore {
    limits: StorageLimits,
    inner: RwLock<StoreInner>,
}

impl MemoryFavoriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: StorageLimits) -> Self {
        Self {
            limits,
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn limits(&self) -> &StorageLimits {
        &self.limits
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_file_name(&self, file_name: &str) -> bool {
        self.inner.read().records.values().any(|r| r.file_name == file_name)
    }
}

impl FavoriteStore for MemoryFavoriteStore {
    fn save(&self, record: FavoriteRecord) -> ValidationResult {
        let mut inner = self.inner.write();

        let verdict = inner.check_limits(&record, &self.limits);
        if !verdict.is_valid {
            log::warn!(
                "[Favorites] Rejected {}: {}",
                record.file_name,
                verdict.error_message.as_deref().unwrap_or("limit")
            );
            return verdict;
        }

        let id = record.id.clone();
        if inner.records.insert(id.clone(), record).is_none() {
            inner.order.push(id.clone());
            log::info!("[Favorites] Added {id}");
        } else {
            log::debug!("[Favorites] Updated {id}");
        }
        ValidationResult::saved(id)
    }

    fn load(&self, id: &str) -> Option<FavoriteRecord> {
        self.inner.read().records.get(id).cloned()
    }

    fn load_all(&self) -> Vec<FavoriteRecord> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.records.remove(id).is_none() {
            return false;
        }
        inner.order.retain(|other| other != id);
        log::info!("[Favorites] Removed {id}");
        true
    }

    fn reorder(&self, ids: &[String]) -> StateResult<()> {
        let mut inner = self.inner.write();

        if ids.len() != inner.records.len() {
            return Err(StateError::InvalidOrder(format!(
                "expected {} ids, got {}",
                inner.records.len(),
                ids.len()
            )));
        }
        let mut seen = std::collections::HashSet::with_capacity(ids.len());
        for id in ids {
            if !inner.records.contains_key(id) {
                return Err(StateError::NotFound(id.clone()));
            }
            if !seen.insert(id.as_str()) {
                return Err(StateError::InvalidOrder(format!("duplicate id {id}")));
            }
        }

        inner.order = ids.to_vec();
        Ok(())
    }

    fn clear_all(&self) {
        let mut inner = self.inner.write();
        inner.records.clear();
        inner.order.clear();
        log::info!("[Favorites] Cleared");
    }

    fn stats(&self) -> StorageStats {
        let inner = self.inner.read();
        StorageStats::compute(inner.records.len(), inner.total_size(), &self.limits)
    }
}

// ============ Import / Export ============

/// Pretty JSON for a single record
pub fn export_json(record: &FavoriteRecord) -> StateResult<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

/// Parse a record exported by [`export_json`] and store it under a fresh id
/// and timestamp
pub fn import_json(store: &dyn FavoriteStore, json: &str) -> ValidationResult {
    let mut record: FavoriteRecord = match serde_json::from_str(json) {
        Ok(record) => record,
        Err(e) => {
            log::warn!("[Favorites] Import failed: {e}");
            return ValidationResult::fail(ValidationCode::InvalidFormat, "Invalid favorite JSON");
        }
    };

    if record.size != record.audio_data.len() as u64 {
        return ValidationResult::fail(ValidationCode::CorruptedData, "Audio data does not match recorded size");
    }

    record.id = generate_favorite_id();
    record.timestamp = Utc::now();
    record.settings = record.settings.normalized();
    store.save(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, size: usize) -> FavoriteRecord {
        FavoriteRecord::new(name, "audio/wav", vec![0u8; size], 1.0, PracticeSettings::default())
    }

    #[test]
    fn test_save_and_load() {
        let store = MemoryFavoriteStore::new();
        let result = store.save(record("a.wav", 10));
        assert!(result.is_valid);

        let id = result.favorite_id.unwrap();
        assert_eq!(store.load(&id).unwrap().file_name, "a.wav");
        assert!(store.has_file_name("a.wav"));
    }

    #[test]
    fn test_remove_missing_is_false() {
        let store = MemoryFavoriteStore::new();
        assert!(!store.remove("nope"));
    }

    #[test]
    fn test_reorder_must_be_permutation() {
        let store = MemoryFavoriteStore::new();
        let a = store.save(record("a.wav", 1)).favorite_id.unwrap();
        let b = store.save(record("b.wav", 1)).favorite_id.unwrap();

        assert!(matches!(store.reorder(&[a.clone()]), Err(StateError::InvalidOrder(_))));
        assert!(matches!(
            store.reorder(&[a.clone(), a.clone()]),
            Err(StateError::InvalidOrder(_))
        ));
        assert!(matches!(
            store.reorder(&[a.clone(), "ghost".into()]),
            Err(StateError::NotFound(_))
        ));

        store.reorder(&[b.clone(), a.clone()]).unwrap();
        let names: Vec<_> = store.load_all().into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, ["b.wav", "a.wav"]);
    }

    #[test]
    fn test_import_rejects_garbage() {
        let store = MemoryFavoriteStore::new();
        let result = import_json(&store, "{not json");
        assert_eq!(result.error_code, Some(ValidationCode::InvalidFormat));
    }

    #[test]
    fn test_import_rejects_size_mismatch() {
        let store = MemoryFavoriteStore::new();
        let mut original = record("a.wav", 4);
        original.size = 400;
        let json = export_json(&original).unwrap();

        let result = import_json(&store, &json);
        assert_eq!(result.error_code, Some(ValidationCode::CorruptedData));
        assert!(store.is_empty());
    }
}
