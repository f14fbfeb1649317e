//! # Buddy Perception
//!
//! Leaf components that sit between raw sensor polls and the decision core:
//!
//! - [`AttentionDetector`]: debounces per-frame face/facing flags into
//!   ABSENT / PRESENT / ATTENTIVE over a rolling window
//! - [`SalienceFilter`]: scores scene descriptions and decides which vision
//!   events are worth forwarding
//! - [`VoiceActivityDetector`]: turns audio frames into a speech probability,
//!   falling back from a model scorer to a plain amplitude gate

pub mod attention;
pub mod salience;
pub mod vad;

pub use attention::{AttentionConfig, AttentionDetector, AttentionListener, AttentionState, AttentionStatus};
pub use salience::{SalienceFilter, VisionEvent, VisionUpdate};
pub use vad::{AmplitudeScorer, SpeechScorer, VoiceActivityDetector};
