//! Message contract between the orchestrator and a transform unit
//!
//! Both directions are plain owned values. A request carries a private copy
//! of the input samples; a result hands back freshly allocated planes.

use serde::{Deserialize, Serialize};

use lf_core::{SampleBuffer, TransformKey};

/// Monotonically increasing job identifier
pub type JobId = u64;

// ═══════════════════════════════════════════════════════════════════════════════
// REQUEST
// ═══════════════════════════════════════════════════════════════════════════════

/// Orchestrator → unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// One sample array per channel
    pub channel_buffers: Vec<Vec<f32>>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Pitch shift (-6..=6)
    pub pitch_semitones: i32,
    /// Tempo ratio (0.25..=2.0)
    pub tempo_ratio: f64,
}

impl TransformRequest {
    /// Snapshot `input` for transfer to a unit
    pub fn new(input: &SampleBuffer, key: TransformKey) -> Self {
        Self {
            channel_buffers: input.channels().to_vec(),
            sample_rate: input.sample_rate(),
            pitch_semitones: key.pitch_semitones(),
            tempo_ratio: key.tempo_ratio(),
        }
    }

    /// Input frames per channel
    pub fn frames(&self) -> usize {
        self.channel_buffers.first().map_or(0, Vec::len)
    }

    pub fn key(&self) -> TransformKey {
        TransformKey::new(self.pitch_semitones, self.tempo_ratio)
    }

    /// Checks the unit performs before touching the engine
    pub fn validate(&self) -> Result<(), String> {
        if self.channel_buffers.is_empty() {
            return Err("No channel buffers provided".to_string());
        }
        if self.sample_rate == 0 {
            return Err("Invalid sample rate".to_string());
        }
        if !(self.tempo_ratio > 0.0) {
            return Err("Invalid tempo value".to_string());
        }
        let frames = self.frames();
        if frames == 0 {
            return Err("Channel buffers are empty".to_string());
        }
        if self.channel_buffers.iter().any(|c| c.len() != frames) {
            return Err("Channel buffers differ in length".to_string());
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSES
// ═══════════════════════════════════════════════════════════════════════════════

/// Unit → orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitMessage {
    /// Engine initialized; the unit accepts one request
    Ready,
    /// Human-readable phase label
    Status(String),
    /// Overall progress, 0..=100
    Progress(u8),
    /// Initialization or processing failure
    Error(String),
    /// Transformed sample arrays, one per channel
    #[serde(rename = "channelBuffers")]
    Output(Vec<Vec<f32>>),
}

/// A unit message tagged with the job the unit was spawned for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub job_id: JobId,
    pub message: UnitMessage,
}

impl Envelope {
    pub fn new(job_id: JobId, message: UnitMessage) -> Self {
        Self { job_id, message }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PHASES
// ═══════════════════════════════════════════════════════════════════════════════

/// The two passes of a batch transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobPhase {
    /// Analysis pass, overall 0–50%
    Study,
    /// Synthesis pass, overall 50–100%
    Process,
}

impl JobPhase {
    /// Status label posted when the phase starts
    pub fn status(&self) -> &'static str {
        match self {
            Self::Study => "Studying...",
            Self::Process => "Processing...",
        }
    }

    /// Recognise a phase from its status label
    pub fn from_status(status: &str) -> Option<Self> {
        match status {
            "Studying..." => Some(Self::Study),
            "Processing..." => Some(Self::Process),
            _ => None,
        }
    }

    /// Overall percent where this phase begins
    pub fn start_percent(&self) -> u8 {
        match self {
            Self::Study => 0,
            Self::Process => 50,
        }
    }

    /// Map progress within the phase (0.0–1.0) onto the overall 0–100 scale
    pub fn overall_percent(&self, fraction: f64) -> u8 {
        let fraction = fraction.clamp(0.0, 1.0);
        self.start_percent() + (fraction * 50.0).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_snapshot() {
        let input = SampleBuffer::new(vec![vec![0.1, 0.2], vec![0.3, 0.4]], 22050).unwrap();
        let request = TransformRequest::new(&input, TransformKey::new(3, 0.75));

        assert_eq!(request.channel_buffers, input.channels());
        assert_eq!(request.sample_rate, 22050);
        assert_eq!(request.frames(), 2);
        assert_eq!(request.key(), TransformKey::new(3, 0.75));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        let mut request = TransformRequest {
            channel_buffers: vec![],
            sample_rate: 44100,
            pitch_semitones: 0,
            tempo_ratio: 1.0,
        };
        assert_eq!(request.validate().unwrap_err(), "No channel buffers provided");

        request.channel_buffers = vec![vec![0.0; 8]];
        request.sample_rate = 0;
        assert_eq!(request.validate().unwrap_err(), "Invalid sample rate");

        request.sample_rate = 44100;
        request.tempo_ratio = 0.0;
        assert_eq!(request.validate().unwrap_err(), "Invalid tempo value");

        request.tempo_ratio = f64::NAN;
        assert!(request.validate().is_err());

        request.tempo_ratio = 1.0;
        request.channel_buffers = vec![vec![]];
        assert_eq!(request.validate().unwrap_err(), "Channel buffers are empty");

        request.channel_buffers = vec![vec![0.0; 8], vec![0.0; 7]];
        assert_eq!(request.validate().unwrap_err(), "Channel buffers differ in length");
    }

    #[test]
    fn test_phase_mapping() {
        assert_eq!(JobPhase::Study.overall_percent(0.0), 0);
        assert_eq!(JobPhase::Study.overall_percent(0.5), 25);
        assert_eq!(JobPhase::Study.overall_percent(1.0), 50);
        assert_eq!(JobPhase::Process.overall_percent(0.0), 50);
        assert_eq!(JobPhase::Process.overall_percent(1.0), 100);
        assert_eq!(JobPhase::Process.overall_percent(7.0), 100);
    }

    #[test]
    fn test_phase_labels_round_trip() {
        for phase in [JobPhase::Study, JobPhase::Process] {
            assert_eq!(JobPhase::from_status(phase.status()), Some(phase));
        }
        assert_eq!(JobPhase::from_status("Complete"), None);
    }

    #[test]
    fn test_message_wire_shape() {
        let json = serde_json::to_string(&UnitMessage::Progress(40)).unwrap();
        assert_eq!(json, r#"{"progress":40}"#);

        let json = serde_json::to_string(&UnitMessage::Status("Studying...".into())).unwrap();
        assert_eq!(json, r#"{"status":"Studying..."}"#);

        let json = serde_json::to_string(&UnitMessage::Output(vec![vec![0.5]])).unwrap();
        assert_eq!(json, r#"{"channelBuffers":[[0.5]]}"#);
    }
}
