//! Utterance segmentation
//!
//! Turns a stream of fixed-size frames, each already classified as speech or
//! silence, into discrete utterances. While idle, the last few frames are kept
//! as pre-roll so the syllable that triggered detection is not clipped.

use std::collections::VecDeque;

use crate::config::AudioConfig;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// Waiting for speech, buffering pre-roll
    Idle,
    /// Accumulating an utterance
    Speaking,
}

/// Splits classified frames into utterances
#[derive(Debug)]
pub struct Segmenter {
    frame_samples: usize,
    sample_rate: u32,
    min_silence_ms: u32,
    pre_roll_capacity: usize,
    state: SegmenterState,
    pre_roll: VecDeque<Vec<i16>>,
    utterance: Vec<i16>,
    silence_frames: usize,
}

impl Segmenter {
    /// Create a segmenter for the given audio layout
    #[must_use]
    pub fn new(config: &AudioConfig) -> Self {
        let frame_samples = config.frame_samples.max(1);
        let pre_roll_capacity = pre_roll_frames(config.pre_roll_ms, config.sample_rate, frame_samples);

        tracing::debug!(
            frame_samples,
            pre_roll_frames = pre_roll_capacity,
            min_silence_ms = config.min_silence_ms,
            "segmenter initialized"
        );

        Self {
            frame_samples,
            sample_rate: config.sample_rate,
            min_silence_ms: config.min_silence_ms,
            pre_roll_capacity,
            state: SegmenterState::Idle,
            pre_roll: VecDeque::with_capacity(pre_roll_capacity),
            utterance: Vec::new(),
            silence_frames: 0,
        }
    }

    /// Samples expected in each frame
    #[must_use]
    pub const fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    /// Number of frames retained as pre-roll
    #[must_use]
    pub const fn pre_roll_capacity(&self) -> usize {
        self.pre_roll_capacity
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SegmenterState {
        self.state
    }

    /// Whether a frame has the expected length
    #[must_use]
    pub const fn accepts(&self, frame: &[i16]) -> bool {
        frame.len() == self.frame_samples
    }

    /// Feed one frame and its classification
    ///
    /// Returns the finished utterance when trailing silence reaches the
    /// configured threshold. Frames of the wrong length count as silence and
    /// are never buffered.
    pub fn push(&mut self, frame: &[i16], is_speech: bool) -> Option<Vec<i16>> {
        let valid = self.accepts(frame);
        if !valid {
            tracing::trace!(
                len = frame.len(),
                expected = self.frame_samples,
                "rejecting frame of unexpected length"
            );
        }
        let is_speech = is_speech && valid;

        match self.state {
            SegmenterState::Idle => {
                if is_speech {
                    self.state = SegmenterState::Speaking;
                    self.utterance.clear();
                    for buffered in self.pre_roll.drain(..) {
                        self.utterance.extend_from_slice(&buffered);
                    }
                    self.utterance.extend_from_slice(frame);
                    self.silence_frames = 0;
                    tracing::trace!(samples = self.utterance.len(), "speech onset");
                } else if valid && self.pre_roll_capacity > 0 {
                    if self.pre_roll.len() == self.pre_roll_capacity {
                        self.pre_roll.pop_front();
                    }
                    self.pre_roll.push_back(frame.to_vec());
                }
                None
            }
            SegmenterState::Speaking => {
                if valid {
                    self.utterance.extend_from_slice(frame);
                }

                if is_speech {
                    self.silence_frames = 0;
                    return None;
                }

                self.silence_frames += 1;
                if self.silence_reached() {
                    let utterance = std::mem::take(&mut self.utterance);
                    self.state = SegmenterState::Idle;
                    self.silence_frames = 0;
                    self.pre_roll.clear();
                    tracing::debug!(samples = utterance.len(), "utterance complete");
                    return Some(utterance);
                }
                None
            }
        }
    }

    /// Drop any buffered audio and return to idle
    pub fn reset(&mut self) {
        self.state = SegmenterState::Idle;
        self.pre_roll.clear();
        self.utterance.clear();
        self.silence_frames = 0;
    }

    // silence_frames * frame_duration >= min_silence, kept in integer math
    fn silence_reached(&self) -> bool {
        let silence = self.silence_frames as u64 * self.frame_samples as u64 * 1000;
        silence >= u64::from(self.min_silence_ms) * u64::from(self.sample_rate)
    }
}

/// Frames needed to cover `pre_roll_ms` of audio (rounded down)
#[must_use]
pub fn pre_roll_frames(pre_roll_ms: u32, sample_rate: u32, frame_samples: usize) -> usize {
    let samples = u64::from(pre_roll_ms) * u64::from(sample_rate) / 1000;
    usize::try_from(samples).unwrap_or(usize::MAX) / frame_samples.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AudioConfig {
        AudioConfig {
            sample_rate: 16_000,
            frame_samples: 4,
            pre_roll_ms: 1,
            min_silence_ms: 1,
            ..AudioConfig::default()
        }
    }

    fn frame(value: i16) -> Vec<i16> {
        vec![value; 4]
    }

    #[test]
    fn default_layout_keeps_nine_frames_and_waits_sixteen() {
        let mut segmenter = Segmenter::new(&AudioConfig::default());
        assert_eq!(segmenter.pre_roll_capacity(), 9);

        let speech = vec![1000i16; 512];
        let silence = vec![0i16; 512];
        assert!(segmenter.push(&speech, true).is_none());
        for _ in 0..15 {
            assert!(segmenter.push(&silence, false).is_none());
        }
        let utterance = segmenter.push(&silence, false).unwrap();
        assert_eq!(utterance.len(), 17 * 512);
    }

    #[test]
    fn utterance_starts_with_pre_roll_regardless_of_leading_silence() {
        // 1ms at 16kHz = 16 samples = 4 frames of pre-roll, 4 frames of silence to end
        for leading in [0usize, 1, 3, 4, 10] {
            let mut segmenter = Segmenter::new(&config());
            assert_eq!(segmenter.pre_roll_capacity(), 4);

            for i in 0..leading {
                let value = i16::try_from(i + 1).unwrap();
                assert!(segmenter.push(&frame(-value), false).is_none());
            }
            assert!(segmenter.push(&frame(100), true).is_none());
            assert!(segmenter.push(&frame(101), true).is_none());
            let mut emitted = None;
            for _ in 0..4 {
                emitted = segmenter.push(&frame(0), false);
            }
            let utterance = emitted.unwrap();

            let retained = leading.min(4);
            let mut expected = Vec::new();
            for i in (leading - retained)..leading {
                expected.extend(frame(-i16::try_from(i + 1).unwrap()));
            }
            expected.extend(frame(100));
            expected.extend(frame(101));
            for _ in 0..4 {
                expected.extend(frame(0));
            }
            assert_eq!(utterance, expected, "leading silence {leading}");
            assert_eq!(segmenter.state(), SegmenterState::Idle);
        }
    }

    #[test]
    fn speech_resets_silence_counter() {
        let mut segmenter = Segmenter::new(&config());
        segmenter.push(&frame(1), true);
        for _ in 0..3 {
            assert!(segmenter.push(&frame(0), false).is_none());
        }
        assert!(segmenter.push(&frame(1), true).is_none());
        for _ in 0..3 {
            assert!(segmenter.push(&frame(0), false).is_none());
        }
        assert!(segmenter.push(&frame(0), false).is_some());
    }

    #[test]
    fn wrong_length_frames_are_silence_and_never_buffered() {
        let mut segmenter = Segmenter::new(&config());
        assert!(segmenter.push(&[7, 7, 7], true).is_none());
        assert_eq!(segmenter.state(), SegmenterState::Idle);

        segmenter.push(&frame(1), true);
        let mut emitted = None;
        for _ in 0..4 {
            emitted = segmenter.push(&[9, 9], true);
        }
        assert_eq!(emitted.unwrap(), frame(1));
    }

    #[test]
    fn reset_discards_partial_utterance() {
        let mut segmenter = Segmenter::new(&config());
        segmenter.push(&frame(1), false);
        segmenter.push(&frame(2), true);
        segmenter.reset();
        assert_eq!(segmenter.state(), SegmenterState::Idle);

        segmenter.push(&frame(3), true);
        let mut emitted = None;
        for _ in 0..4 {
            emitted = segmenter.push(&frame(0), false);
        }
        let utterance = emitted.unwrap();
        assert_eq!(&utterance[..4], frame(3).as_slice());
    }
}
