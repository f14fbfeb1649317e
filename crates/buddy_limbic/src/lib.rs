//! # Buddy Limbic Layer
//!
//! The body-level, non-verbal part of Buddy's inner life. Nothing here is
//! discrete emotion; these are slow variables that colour behavior:
//!
//! - [`SomaticState`]: tension / warmth / restlessness, nudged by every
//!   interaction outcome and decaying back toward rest
//! - [`EmotionalBaseline`]: trust, openness, resilience and per-person
//!   attachment, drifting over hundreds of interactions
//! - [`AnticipatoryModel`]: what Buddy expects from a given person, and the
//!   surprise when reality disagrees
//!
//! ## Time Scales
//!
//! - Seconds to minutes: somatic state
//! - Days: emotional baseline
//! - Per person, across sessions: anticipation

mod anticipation;
mod baseline;
mod somatic;

pub use anticipation::{AnticipatoryModel, PersonPattern, Prediction, Surprise, SurpriseKind};
pub use baseline::EmotionalBaseline;
pub use somatic::SomaticState;
