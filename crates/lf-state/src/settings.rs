//! Practice settings
//!
//! Everything needed to put a listener back where they left off: transform
//! parameters, transport position, loop region and output level.

use std::path::Path;

use serde::{Deserialize, Serialize};

use lf_core::{TEMPO_DEFAULT, TransformKey, clamp_pitch, clamp_tempo};

use crate::error::StateResult;

/// Full-scale volume
pub const VOLUME_MAX: f64 = 100.0;

// ============ Practice Settings ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeSettings {
    /// Pitch shift in semitones (-6..=6)
    pub pitch: i32,
    /// Tempo ratio (0.25..=2.0)
    pub playback_rate: f64,
    /// Playback position in seconds
    pub current_time: f64,
    pub loop_start: Option<f64>,
    pub loop_end: Option<f64>,
    pub loop_enabled: bool,
    /// Output level, 0..=100
    pub volume: f64,
    pub is_muted: bool,
}

impl Default for PracticeSettings {
    fn default() -> Self {
        Self {
            pitch: 0,
            playback_rate: TEMPO_DEFAULT,
            current_time: 0.0,
            loop_start: None,
            loop_end: None,
            loop_enabled: false,
            volume: VOLUME_MAX,
            is_muted: false,
        }
    }
}

impl PracticeSettings {
    /// Transform parameters these settings ask for
    pub fn key(&self) -> TransformKey {
        TransformKey::new(self.pitch, self.playback_rate)
    }

    /// Both loop markers, if set
    pub fn loop_region(&self) -> Option<(f64, f64)> {
        match (self.loop_start, self.loop_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    /// Bring every field into its valid range.
    ///
    /// An unusable loop (missing marker, negative, start >= end) is dropped
    /// and disabled.
    pub fn normalized(mut self) -> Self {
        self.pitch = clamp_pitch(self.pitch);
        self.playback_rate = clamp_tempo(self.playback_rate);
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, VOLUME_MAX)
        } else {
            VOLUME_MAX
        };
        self.current_time = finite_non_negative(self.current_time).unwrap_or(0.0);

        let start = self.loop_start.and_then(finite_non_negative);
        let end = self.loop_end.and_then(finite_non_negative);
        match (start, end) {
            (Some(s), Some(e)) if s < e => {
                self.loop_start = Some(s);
                self.loop_end = Some(e);
            }
            _ => {
                self.loop_start = None;
                self.loop_end = None;
                self.loop_enabled = false;
            }
        }
        self
    }

    pub fn to_json(&self) -> StateResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and normalize
    pub fn from_json(json: &str) -> StateResult<Self> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.normalized())
    }

    /// Write the snapshot to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> StateResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::debug!("[Settings] Saved to {:?}", path);
        Ok(())
    }

    /// Restore a snapshot written by [`PracticeSettings::save_to`]
    pub fn load_from(path: &Path) -> StateResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

fn finite_non_negative(value: f64) -> Option<f64> {
    (value.is_finite() && value >= 0.0).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PracticeSettings::default();
        assert_eq!(settings.pitch, 0);
        assert_eq!(settings.playback_rate, 1.0);
        assert_eq!(settings.volume, 100.0);
        assert!(settings.loop_region().is_none());
        assert!(settings.key().is_identity());
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = serde_json::to_value(PracticeSettings::default()).unwrap();
        assert!(json.get("playbackRate").is_some());
        assert!(json.get("isMuted").is_some());
        assert!(json.get("loopStart").unwrap().is_null());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings = PracticeSettings::from_json(r#"{"pitch": 2}"#).unwrap();
        assert_eq!(settings.pitch, 2);
        assert_eq!(settings.playback_rate, 1.0);
        assert_eq!(settings.volume, 100.0);
    }

    #[test]
    fn test_normalize_clamps_ranges() {
        let settings = PracticeSettings {
            pitch: 11,
            playback_rate: 3.0,
            volume: 140.0,
            current_time: -4.0,
            ..Default::default()
        }
        .normalized();

        assert_eq!(settings.pitch, 6);
        assert_eq!(settings.playback_rate, 2.0);
        assert_eq!(settings.volume, 100.0);
        assert_eq!(settings.current_time, 0.0);
    }

    #[test]
    fn test_normalize_drops_inverted_loop() {
        let settings = PracticeSettings {
            loop_start: Some(20.0),
            loop_end: Some(10.0),
            loop_enabled: true,
            ..Default::default()
        }
        .normalized();

        assert!(settings.loop_region().is_none());
        assert!(!settings.loop_enabled);
    }

    #[test]
    fn test_normalize_keeps_valid_loop() {
        let settings = PracticeSettings {
            loop_start: Some(5.0),
            loop_end: Some(9.5),
            loop_enabled: true,
            ..Default::default()
        }
        .normalized();

        assert_eq!(settings.loop_region(), Some((5.0, 9.5)));
        assert!(settings.loop_enabled);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("settings.json");

        let settings = PracticeSettings {
            pitch: -3,
            playback_rate: 0.75,
            current_time: 12.5,
            is_muted: true,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();

        let restored = PracticeSettings::load_from(&path).unwrap();
        assert_eq!(restored, settings);
    }
}
