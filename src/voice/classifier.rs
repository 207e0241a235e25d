//! Per-frame speech classification

use async_trait::async_trait;

use crate::Result;

/// Scores a single PCM16 frame
#[async_trait]
pub trait SpeechClassifier: Send + Sync {
    /// Probability in `[0, 1]` that the frame contains speech
    ///
    /// # Errors
    ///
    /// Returns error if inference fails
    async fn classify(&self, frame: &[i16]) -> Result<f32>;
}

/// RMS level treated as certain speech
const FULL_SCALE_RMS: f32 = 0.1;

/// Classifies frames by RMS energy
///
/// Maps normalized RMS linearly onto `[0, 1]`, saturating at
/// `FULL_SCALE_RMS`, so a threshold of 0.5 corresponds to an RMS of 0.05.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnergyClassifier;

impl EnergyClassifier {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SpeechClassifier for EnergyClassifier {
    async fn classify(&self, frame: &[i16]) -> Result<f32> {
        Ok((rms(frame) / FULL_SCALE_RMS).clamp(0.0, 1.0))
    }
}

/// Calculate normalized RMS energy of PCM16 samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        assert!(rms(&[0i16; 100]) < 0.001);
        assert!(rms(&[16_384i16; 100]) > 0.4);
        assert!(rms(&[]).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn silence_scores_low_and_speech_saturates() {
        let classifier = EnergyClassifier::new();
        let quiet = classifier.classify(&[0i16; 512]).await.unwrap();
        let loud = classifier.classify(&[8_000i16; 512]).await.unwrap();

        assert!(quiet < 0.01);
        assert!((loud - 1.0).abs() < f32::EPSILON);
    }
}
