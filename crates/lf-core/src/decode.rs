//! WAV decoding for the original track
//!
//! Produces the untransformed `SampleBuffer` the pipeline starts from.
//! Integer PCM is normalised to [-1, 1]; float PCM is taken as is.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::buffer::SampleBuffer;
use crate::error::{CoreError, CoreResult};

/// Decode a WAV file from disk
pub fn load_wav(path: &Path) -> CoreResult<SampleBuffer> {
    let file = File::open(path)?;
    let buffer = decode_wav(BufReader::new(file))?;

    log::info!(
        "[Decode] Loaded {} ({} ch, {} Hz, {:.2}s)",
        path.display(),
        buffer.channel_count(),
        buffer.sample_rate(),
        buffer.duration()
    );

    Ok(buffer)
}

/// Decode WAV data from any reader
pub fn decode_wav<R: Read>(reader: R) -> CoreResult<SampleBuffer> {
    let reader = hound::WavReader::new(reader).map_err(|e| CoreError::Decode(e.to_string()))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| CoreError::Decode(e.to_string()))?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| CoreError::Decode(e.to_string()))?,
    };

    if samples.is_empty() {
        return Err(CoreError::Decode("no audio frames".to_string()));
    }

    SampleBuffer::from_interleaved(&samples, channels, spec.sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn wav_bytes(spec: hound::WavSpec, write: impl FnOnce(&mut hound::WavWriter<&mut Cursor<Vec<u8>>>)) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            write(&mut writer);
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_16bit_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let bytes = wav_bytes(spec, |w| {
            for _ in 0..100 {
                w.write_sample(16384i16).unwrap();
                w.write_sample(-16384i16).unwrap();
            }
        });

        let buffer = decode_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 100);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_relative_eq!(buffer.channel(0).unwrap()[0], 0.5);
        assert_relative_eq!(buffer.channel(1).unwrap()[0], -0.5);
    }

    #[test]
    fn test_decode_float_mono() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let bytes = wav_bytes(spec, |w| {
            for i in 0..480 {
                w.write_sample(i as f32 / 480.0).unwrap();
            }
        });

        let buffer = decode_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(buffer.channel_count(), 1);
        assert_relative_eq!(buffer.duration(), 0.01);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result = decode_wav(Cursor::new(b"definitely not a wav".to_vec()));
        assert!(matches!(result, Err(CoreError::Decode(_))));
    }

    #[test]
    fn test_load_wav_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = load_wav(&path).unwrap();
        assert_relative_eq!(buffer.duration(), 1.0);
    }

    #[test]
    fn test_load_wav_missing_file() {
        let result = load_wav(Path::new("/nonexistent/loopforge.wav"));
        assert!(matches!(result, Err(CoreError::Io(_))));
    }
}
