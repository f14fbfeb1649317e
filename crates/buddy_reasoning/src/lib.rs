//! # Buddy Reasoning
//!
//! Decides what Buddy is *trying* to do. An intent is a social goal with a
//! ladder of strategies from subtle to dramatic; the [`IntentManager`]
//! picks intents from the drive vector and narrative signals, climbs the
//! ladder when ignored, and runs the engagement cycle that makes Buddy
//! give up, sulk, and eventually try again.

pub mod catalog;
pub mod context;
pub mod engagement;
pub mod intent;
pub mod speech;

pub use catalog::{intent_spec, is_attention_seeking, IntentDef};
pub use context::strategy_guidance;
pub use engagement::{EngagementPhase, EngagementStatus};
pub use intent::{Intent, IntentBias, IntentManager, IntentSnapshot, NextAction};
pub use speech::{should_speak_or_physical, Modality};
