//! Parameter store: the user's requested pitch and tempo

use tokio::sync::watch;

use lf_core::{Observable, TEMPO_DEFAULT, TransformKey, clamp_pitch, clamp_tempo};

/// Clamped pitch/tempo request. Setters report whether the stored value
/// actually changed; only a change should schedule work.
#[derive(Debug)]
pub struct ParameterStore {
    pitch: Observable<i32>,
    tempo: Observable<f64>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            pitch: Observable::new(0),
            tempo: Observable::new(TEMPO_DEFAULT),
        }
    }

    pub fn set_pitch(&self, semitones: i32) -> bool {
        self.pitch.set_if_changed(clamp_pitch(semitones))
    }

    pub fn set_playback_rate(&self, ratio: f64) -> bool {
        self.tempo.set_if_changed(clamp_tempo(ratio))
    }

    pub fn pitch(&self) -> i32 {
        self.pitch.get()
    }

    pub fn tempo(&self) -> f64 {
        self.tempo.get()
    }

    pub fn key(&self) -> TransformKey {
        TransformKey::new(self.pitch(), self.tempo())
    }

    /// Back to identity; true if anything changed
    pub fn reset(&self) -> bool {
        let pitch = self.set_pitch(0);
        let tempo = self.set_playback_rate(TEMPO_DEFAULT);
        pitch || tempo
    }

    pub fn subscribe_pitch(&self) -> watch::Receiver<i32> {
        self.pitch.subscribe()
    }

    pub fn subscribe_tempo(&self) -> watch::Receiver<f64> {
        self.tempo.subscribe()
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_identity() {
        assert!(ParameterStore::new().key().is_identity());
    }

    #[test]
    fn test_set_reports_change() {
        let params = ParameterStore::new();
        assert!(params.set_pitch(3));
        assert!(!params.set_pitch(3));
        assert!(params.set_playback_rate(0.75));
        assert!(!params.set_playback_rate(0.75));
        assert_eq!(params.key(), TransformKey::new(3, 0.75));
    }

    #[test]
    fn test_clamped_request_equal_to_current_is_noop() {
        let params = ParameterStore::new();
        assert!(params.set_pitch(6));
        assert!(!params.set_pitch(9));
        assert!(params.set_playback_rate(2.0));
        assert!(!params.set_playback_rate(8.0));
        // Non-finite falls back to the default tempo
        assert!(params.set_playback_rate(f64::NAN));
        assert_eq!(params.tempo(), 1.0);
    }

    #[test]
    fn test_subscribers_see_changes() {
        let params = ParameterStore::new();
        let mut pitch = params.subscribe_pitch();

        params.set_pitch(-8);
        assert!(pitch.has_changed().unwrap());
        assert_eq!(*pitch.borrow_and_update(), -6);

        params.set_pitch(-6);
        assert!(!pitch.has_changed().unwrap());
    }

    #[test]
    fn test_reset() {
        let params = ParameterStore::new();
        assert!(!params.reset());
        params.set_pitch(2);
        assert!(params.reset());
        assert!(params.key().is_identity());
    }
}
