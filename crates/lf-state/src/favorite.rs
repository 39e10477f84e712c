//! Favorite records and validation outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::PracticeSettings;
use crate::validate::generate_favorite_id;

// ============ Favorite Record ============

/// An audio file saved together with its practice settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    /// Encoded file contents as uploaded
    pub audio_data: Vec<u8>,
    pub settings: PracticeSettings,
    pub timestamp: DateTime<Utc>,
    /// Size of `audio_data` in bytes
    pub size: u64,
    /// Track length in seconds
    pub duration: f64,
}

impl FavoriteRecord {
    /// New record with a fresh id and the current time
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        audio_data: Vec<u8>,
        duration: f64,
        settings: PracticeSettings,
    ) -> Self {
        let size = audio_data.len() as u64;
        Self {
            id: generate_favorite_id(),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            audio_data,
            settings: settings.normalized(),
            timestamp: Utc::now(),
            size,
            duration,
        }
    }
}

// ============ Validation ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    MaxFavorites,
    MaxSize,
    InvalidFormat,
    DuplicateFile,
    QuotaExceeded,
    CorruptedData,
    StorageError,
}

/// Outcome of a validation or store operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ValidationCode>,
    /// Id of the record created or updated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favorite_id: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            is_valid: true,
            error_message: None,
            error_code: None,
            favorite_id: None,
        }
    }

    pub fn saved(id: impl Into<String>) -> Self {
        Self {
            favorite_id: Some(id.into()),
            ..Self::ok()
        }
    }

    pub fn fail(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
            error_code: Some(code),
            favorite_id: None,
        }
    }
}

// ============ Storage Limits ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLimits {
    pub max_favorites: usize,
    /// Aggregate `size` of all records, in bytes
    pub max_total_size: u64,
}

impl Default for StorageLimits {
    fn default() -> Self {
        Self {
            max_favorites: 10,
            max_total_size: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub current_count: usize,
    pub total_size: u64,
    pub available_space: u64,
    /// 0–100, two decimals
    pub usage_percentage: f64,
}

impl StorageStats {
    pub fn compute(current_count: usize, total_size: u64, limits: &StorageLimits) -> Self {
        let usage = if limits.max_total_size == 0 {
            100.0
        } else {
            total_size as f64 / limits.max_total_size as f64 * 100.0
        };
        Self {
            current_count,
            total_size,
            available_space: limits.max_total_size.saturating_sub(total_size),
            usage_percentage: (usage * 100.0).round() / 100.0,
        }
    }

    /// Room for another record, ignoring its size
    pub fn can_add_more(&self, limits: &StorageLimits) -> bool {
        self.current_count < limits.max_favorites && self.usage_percentage < 100.0
    }
}
