//! Upload validation and display helpers

use crate::favorite::{StorageLimits, ValidationCode, ValidationResult};

/// Accepted MIME types
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "audio/mp3",
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "audio/mp4",
    "audio/x-m4a",
];

/// Accepted file extensions, lowercase
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a"];

/// Largest single file that can be stored (10 MiB)
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const MIB: u64 = 1024 * 1024;

pub fn validate_file_size(size: u64) -> ValidationResult {
    if size == 0 {
        return ValidationResult::fail(ValidationCode::InvalidFormat, "File size must be greater than 0");
    }
    if size > MAX_FILE_SIZE {
        return ValidationResult::fail(
            ValidationCode::MaxSize,
            format!("File exceeds the maximum size of {} MB", MAX_FILE_SIZE / MIB),
        );
    }
    ValidationResult::ok()
}

pub fn validate_mime_type(mime_type: &str) -> ValidationResult {
    if mime_type.is_empty() {
        return ValidationResult::fail(ValidationCode::InvalidFormat, "File type not specified");
    }
    if !SUPPORTED_MIME_TYPES.contains(&mime_type) {
        return ValidationResult::fail(
            ValidationCode::InvalidFormat,
            format!("Unsupported format. Accepted formats: {}", SUPPORTED_EXTENSIONS.join(", ")),
        );
    }
    ValidationResult::ok()
}

pub fn validate_file_name(file_name: &str) -> ValidationResult {
    if file_name.trim().is_empty() {
        return ValidationResult::fail(ValidationCode::InvalidFormat, "File name cannot be empty");
    }
    let lower = file_name.to_lowercase();
    if !SUPPORTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return ValidationResult::fail(
            ValidationCode::InvalidFormat,
            format!(
                "Unsupported file extension. Accepted extensions: {}",
                SUPPORTED_EXTENSIONS.join(", ")
            ),
        );
    }
    ValidationResult::ok()
}

/// Name, then type, then size; first failure wins
pub fn validate_audio_file(file_name: &str, mime_type: &str, size: u64) -> ValidationResult {
    for result in [
        validate_file_name(file_name),
        validate_mime_type(mime_type),
        validate_file_size(size),
    ] {
        if !result.is_valid {
            return result;
        }
    }
    ValidationResult::ok()
}

pub fn validate_favorite_limit(current_count: usize, limits: &StorageLimits) -> ValidationResult {
    if current_count >= limits.max_favorites {
        return ValidationResult::fail(
            ValidationCode::MaxFavorites,
            format!("Limit of {} favorites reached", limits.max_favorites),
        );
    }
    ValidationResult::ok()
}

pub fn validate_total_storage(current_total: u64, new_size: u64, limits: &StorageLimits) -> ValidationResult {
    if current_total.saturating_add(new_size) > limits.max_total_size {
        return ValidationResult::fail(
            ValidationCode::MaxSize,
            format!(
                "Storage limit of {} MB exceeded (currently {} MB)",
                limits.max_total_size / MIB,
                current_total / MIB
            ),
        );
    }
    ValidationResult::ok()
}

/// Random v4 UUID
pub fn generate_favorite_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Human-readable size, e.g. `"1.50 MB"`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// `m:ss`
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
