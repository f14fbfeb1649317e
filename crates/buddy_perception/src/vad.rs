//! Voice activity detection.
//!
//! A model-based scorer (supplied by the audio collaborator) is tried first;
//! any failure falls through to a peak-amplitude gate that needs a few loud
//! frames in a row before it reports speech and a longer quiet run before it
//! lets go.

use std::sync::{Arc, Mutex, PoisonError};

/// One way of turning a PCM frame into a speech probability.
pub trait SpeechScorer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Probability in `[0, 1]` that the frame contains speech.
    fn score(&self, pcm: &[i16], sample_rate: u32) -> anyhow::Result<f32>;

    /// Clear any per-utterance state.
    fn reset(&self) {}
}

#[derive(Debug, Default)]
struct AmplitudeState {
    speech_frames: u32,
    silence_frames: u32,
    active: bool,
}

/// Peak-amplitude fallback scorer. Never fails.
#[derive(Debug)]
pub struct AmplitudeScorer {
    threshold: i32,
    speech_frames_needed: u32,
    silence_frames_to_stop: u32,
    state: Mutex<AmplitudeState>,
}

impl Default for AmplitudeScorer {
    fn default() -> Self {
        Self {
            threshold: 600,
            speech_frames_needed: 4,
            silence_frames_to_stop: 8,
            state: Mutex::new(AmplitudeState::default()),
        }
    }
}

impl AmplitudeScorer {
    fn process(&self, pcm: &[i16]) -> f32 {
        if pcm.is_empty() {
            return 0.0;
        }
        let peak = pcm.iter().map(|s| i32::from(*s).abs()).max().unwrap_or(0);

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if peak > self.threshold {
            state.speech_frames += 1;
            state.silence_frames = 0;
        } else {
            state.silence_frames += 1;
            if state.silence_frames >= self.silence_frames_to_stop {
                state.speech_frames = 0;
                state.active = false;
            }
        }

        if state.speech_frames >= self.speech_frames_needed {
            state.active = true;
            0.9
        } else if state.active {
            0.7
        } else {
            0.0
        }
    }
}

impl SpeechScorer for AmplitudeScorer {
    fn name(&self) -> &'static str {
        "amplitude"
    }

    fn score(&self, pcm: &[i16], _sample_rate: u32) -> anyhow::Result<f32> {
        Ok(self.process(pcm))
    }

    fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = AmplitudeState::default();
    }
}

/// Ordered scorer chain ending in the amplitude gate.
pub struct VoiceActivityDetector {
    scorers: Vec<Arc<dyn SpeechScorer>>,
    fallback: AmplitudeScorer,
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl VoiceActivityDetector {
    pub fn new(scorers: Vec<Arc<dyn SpeechScorer>>) -> Self {
        Self {
            scorers,
            fallback: AmplitudeScorer::default(),
        }
    }

    pub fn process_frame(&self, pcm: &[i16], sample_rate: u32) -> f32 {
        for scorer in &self.scorers {
            match scorer.score(pcm, sample_rate) {
                Ok(p) if p.is_finite() => return p.clamp(0.0, 1.0),
                Ok(p) => tracing::debug!(scorer = scorer.name(), "Scorer returned non-finite value {}", p),
                Err(e) => tracing::debug!(scorer = scorer.name(), "Scorer failed: {:#}", e),
            }
        }
        self.fallback.process(pcm)
    }

    pub fn is_speech(&self, pcm: &[i16], sample_rate: u32, threshold: f32) -> bool {
        self.process_frame(pcm, sample_rate) > threshold
    }

    /// Reset per-utterance state, e.g. after a recording ends.
    pub fn reset(&self) {
        for scorer in &self.scorers {
            scorer.reset();
        }
        self.fallback.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOUD: [i16; 4] = [0, 1200, -900, 40];
    const QUIET: [i16; 4] = [0, 10, -20, 5];

    struct Broken;

    impl SpeechScorer for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn score(&self, _pcm: &[i16], _sample_rate: u32) -> anyhow::Result<f32> {
            anyhow::bail!("model not loaded")
        }
    }

    struct Fixed(f32);

    impl SpeechScorer for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn score(&self, _pcm: &[i16], _sample_rate: u32) -> anyhow::Result<f32> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_amplitude_needs_four_loud_frames() {
        let vad = VoiceActivityDetector::default();
        for _ in 0..3 {
            assert_eq!(vad.process_frame(&LOUD, 16_000), 0.0);
        }
        assert_eq!(vad.process_frame(&LOUD, 16_000), 0.9);
    }

    #[test]
    fn test_amplitude_sustains_then_releases() {
        let vad = VoiceActivityDetector::default();
        for _ in 0..4 {
            vad.process_frame(&LOUD, 16_000);
        }
        for _ in 0..7 {
            assert_eq!(vad.process_frame(&QUIET, 16_000), 0.7);
        }
        assert_eq!(vad.process_frame(&QUIET, 16_000), 0.0);
    }

    #[test]
    fn test_empty_frame_is_silence() {
        let vad = VoiceActivityDetector::default();
        assert_eq!(vad.process_frame(&[], 16_000), 0.0);
    }

    #[test]
    fn test_chain_prefers_model_and_falls_back_on_error() {
        let vad = VoiceActivityDetector::new(vec![Arc::new(Fixed(0.42))]);
        assert_eq!(vad.process_frame(&QUIET, 16_000), 0.42);

        let vad = VoiceActivityDetector::new(vec![Arc::new(Broken)]);
        for _ in 0..4 {
            vad.process_frame(&LOUD, 16_000);
        }
        assert!(vad.is_speech(&LOUD, 16_000, 0.5));
        vad.reset();
        assert!(!vad.is_speech(&LOUD, 16_000, 0.5));
    }
}
