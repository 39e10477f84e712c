//! Favorite store limits and lifecycle

use lf_state::{
    FavoriteRecord, FavoriteStore, MemoryFavoriteStore, PracticeSettings, StorageLimits,
    ValidationCode, export_json, import_json,
};

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

const MIB: usize = 1024 * 1024;

fn favorite(name: &str, size: usize) -> FavoriteRecord {
    FavoriteRecord::new(name, "audio/mpeg", vec![7u8; size], 30.0, PracticeSettings::default())
}

fn fill(store: &MemoryFavoriteStore, count: usize, size: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let result = store.save(favorite(&format!("track-{i}.mp3"), size));
            assert!(result.is_valid, "{result:?}");
            result.favorite_id.unwrap()
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_eleventh_favorite_rejected() {
    let store = MemoryFavoriteStore::new();
    fill(&store, 10, 1024);

    let result = store.save(favorite("one-more.mp3", 1024));
    assert!(!result.is_valid);
    assert_eq!(result.error_code, Some(ValidationCode::MaxFavorites));
    assert_eq!(store.len(), 10);
}

#[test]
fn test_update_allowed_at_record_limit() {
    let store = MemoryFavoriteStore::new();
    let ids = fill(&store, 10, 1024);

    let mut existing = store.load(&ids[3]).unwrap();
    existing.settings.pitch = 4;
    let result = store.save(existing);

    assert!(result.is_valid);
    assert_eq!(result.favorite_id.as_deref(), Some(ids[3].as_str()));
    assert_eq!(store.load(&ids[3]).unwrap().settings.pitch, 4);
}

#[test]
fn test_duplicate_file_name_rejected_on_insert() {
    let store = MemoryFavoriteStore::new();
    store.save(favorite("song.mp3", 10));

    let result = store.save(favorite("song.mp3", 10));
    assert_eq!(result.error_code, Some(ValidationCode::DuplicateFile));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_aggregate_size_limit() {
    let store = MemoryFavoriteStore::new();
    fill(&store, 9, 10 * MIB + 100 * 1024);

    // 9 × 10.1 MiB already stored; another 10 MiB crosses 100 MiB
    let result = store.save(favorite("big.mp3", 10 * MIB));
    assert_eq!(result.error_code, Some(ValidationCode::MaxSize));
}

#[test]
fn test_update_size_excludes_replaced_record() {
    let limits = StorageLimits {
        max_favorites: 10,
        max_total_size: 1000,
    };
    let store = MemoryFavoriteStore::with_limits(limits);
    let id = store.save(favorite("a.mp3", 600)).favorite_id.unwrap();

    // 600 + 700 would exceed, but the 600 is being replaced
    let mut bigger = store.load(&id).unwrap();
    bigger.audio_data = vec![0; 700];
    bigger.size = 700;
    assert!(store.save(bigger).is_valid);
    assert_eq!(store.stats().total_size, 700);
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_load_all_keeps_insertion_order_until_reordered() {
    let store = MemoryFavoriteStore::new();
    let ids = fill(&store, 3, 10);

    let loaded: Vec<_> = store.load_all().into_iter().map(|r| r.id).collect();
    assert_eq!(loaded, ids);

    let reversed: Vec<String> = ids.iter().rev().cloned().collect();
    store.reorder(&reversed).unwrap();
    let loaded: Vec<_> = store.load_all().into_iter().map(|r| r.id).collect();
    assert_eq!(loaded, reversed);

    store.remove(&ids[1]);
    let loaded: Vec<_> = store.load_all().into_iter().map(|r| r.id).collect();
    assert_eq!(loaded, vec![ids[2].clone(), ids[0].clone()]);
}

#[test]
fn test_stats_track_contents() {
    let store = MemoryFavoriteStore::new();
    fill(&store, 2, 5 * MIB);

    let stats = store.stats();
    assert_eq!(stats.current_count, 2);
    assert_eq!(stats.total_size, (10 * MIB) as u64);
    assert_eq!(stats.usage_percentage, 10.0);

    store.clear_all();
    let stats = store.stats();
    assert_eq!(stats.current_count, 0);
    assert_eq!(stats.available_space, (100 * MIB) as u64);
    assert!(store.load_all().is_empty());
}

#[test]
fn test_update_settings() {
    let store = MemoryFavoriteStore::new();
    let id = fill(&store, 1, 10).remove(0);

    let settings = PracticeSettings {
        pitch: -2,
        playback_rate: 0.75,
        loop_start: Some(4.0),
        loop_end: Some(8.0),
        loop_enabled: true,
        ..Default::default()
    };
    assert!(store.update_settings(&id, settings.clone()).is_valid);
    assert_eq!(store.load(&id).unwrap().settings, settings);

    let missing = store.update_settings("ghost", settings);
    assert!(!missing.is_valid);
}

#[test]
fn test_export_import_assigns_new_identity() {
    let store = MemoryFavoriteStore::new();
    let original = favorite("groove.mp3", 64);
    let json = export_json(&original).unwrap();

    let result = import_json(&store, &json);
    assert!(result.is_valid, "{result:?}");

    let imported_id = result.favorite_id.unwrap();
    assert_ne!(imported_id, original.id);

    let imported = store.load(&imported_id).unwrap();
    assert_eq!(imported.file_name, "groove.mp3");
    assert_eq!(imported.audio_data, original.audio_data);
    assert!(imported.timestamp >= original.timestamp);
}
