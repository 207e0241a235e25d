//! Voice processing module
//!
//! Handles utterance segmentation, speech classification, and the
//! transcription/synthesis provider adapters.

pub mod classifier;
pub mod segmenter;
pub mod stt;
pub mod tts;

pub use classifier::{EnergyClassifier, SpeechClassifier};
pub use segmenter::{Segmenter, SegmenterState};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{AudioChunkStream, Synthesizer, TextToSpeech};

use crate::{Error, Result};

/// Decode little-endian PCM16 bytes into samples
///
/// # Errors
///
/// Returns error if the byte length is odd
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Result<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Audio(format!(
            "PCM16 frame has odd byte length {}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode samples as little-endian PCM16 bytes
#[must_use]
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Wrap mono PCM16 samples in a WAV container
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn pcm16_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_frames() {
        let samples = pcm16_from_le_bytes(&[0x01, 0x00, 0xff, 0xff]).unwrap();
        assert_eq!(samples, vec![1, -1]);
        assert_eq!(pcm16_to_le_bytes(&samples), vec![0x01, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn rejects_odd_byte_length() {
        assert!(pcm16_from_le_bytes(&[0x01, 0x00, 0x02]).is_err());
    }

    #[test]
    fn wav_roundtrips_through_hound() {
        let samples: Vec<i16> = (0..320i16).map(|i| i * 10).collect();
        let wav = pcm16_to_wav(&samples, 16_000).unwrap();

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }
}
