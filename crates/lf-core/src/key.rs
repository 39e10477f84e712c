//! Transform key: the (pitch, tempo) pair that identifies a transformed buffer

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Lowest accepted pitch shift in semitones
pub const PITCH_MIN: i32 = -6;
/// Highest accepted pitch shift in semitones
pub const PITCH_MAX: i32 = 6;
/// Slowest accepted tempo ratio
pub const TEMPO_MIN: f64 = 0.25;
/// Fastest accepted tempo ratio
pub const TEMPO_MAX: f64 = 2.0;
/// Untransformed tempo
pub const TEMPO_DEFAULT: f64 = 1.0;

/// Clamp a pitch request into [`PITCH_MIN`, `PITCH_MAX`]
#[inline]
pub fn clamp_pitch(semitones: i32) -> i32 {
    semitones.clamp(PITCH_MIN, PITCH_MAX)
}

/// Clamp a tempo request into [`TEMPO_MIN`, `TEMPO_MAX`].
///
/// Non-finite input has no meaningful nearest value and maps to
/// [`TEMPO_DEFAULT`].
#[inline]
pub fn clamp_tempo(ratio: f64) -> f64 {
    if ratio.is_finite() {
        ratio.clamp(TEMPO_MIN, TEMPO_MAX)
    } else {
        TEMPO_DEFAULT
    }
}

/// Cache index for transformed buffers.
///
/// Always holds clamped values. Equality is exact: tempo is compared by bit
/// pattern, which is well defined because clamping never yields NaN or -0.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(from = "KeyRepr", into = "KeyRepr")]
pub struct TransformKey {
    pitch_semitones: i32,
    tempo_ratio: f64,
}

impl TransformKey {
    /// The untransformed original: pitch 0, tempo 1.0
    pub const IDENTITY: TransformKey = TransformKey {
        pitch_semitones: 0,
        tempo_ratio: TEMPO_DEFAULT,
    };

    /// Build a key, clamping both components
    pub fn new(pitch_semitones: i32, tempo_ratio: f64) -> Self {
        Self {
            pitch_semitones: clamp_pitch(pitch_semitones),
            tempo_ratio: clamp_tempo(tempo_ratio),
        }
    }

    #[inline]
    pub fn pitch_semitones(&self) -> i32 {
        self.pitch_semitones
    }

    #[inline]
    pub fn tempo_ratio(&self) -> f64 {
        self.tempo_ratio
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Frequency scale factor: 2^(semitones / 12)
    pub fn pitch_scale(&self) -> f64 {
        2.0_f64.powf(self.pitch_semitones as f64 / 12.0)
    }

    /// Output duration divided by input duration.
    ///
    /// The stretch engine takes the tempo ratio as its time ratio, so tempo 0.5
    /// renders a buffer half as long as the source.
    pub fn time_ratio(&self) -> f64 {
        self.tempo_ratio
    }
}

/// Wire shape; deserializing goes through [`TransformKey::new`] so stored
/// keys are clamped like any other request.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyRepr {
    pitch_semitones: i32,
    tempo_ratio: f64,
}

impl From<KeyRepr> for TransformKey {
    fn from(repr: KeyRepr) -> Self {
        Self::new(repr.pitch_semitones, repr.tempo_ratio)
    }
}

impl From<TransformKey> for KeyRepr {
    fn from(key: TransformKey) -> Self {
        Self {
            pitch_semitones: key.pitch_semitones,
            tempo_ratio: key.tempo_ratio,
        }
    }
}

impl Default for TransformKey {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl PartialEq for TransformKey {
    fn eq(&self, other: &Self) -> bool {
        self.pitch_semitones == other.pitch_semitones
            && self.tempo_ratio.to_bits() == other.tempo_ratio.to_bits()
    }
}

impl Eq for TransformKey {}

impl Hash for TransformKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pitch_semitones.hash(state);
        self.tempo_ratio.to_bits().hash(state);
    }
}

impl fmt::Display for TransformKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}_t{}", self.pitch_semitones, self.tempo_ratio)
    }
}
