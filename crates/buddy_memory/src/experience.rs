//! One complete interaction: what Buddy tried, how it went, how it felt.

use buddy_core::{IntentType, Outcome, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An interaction handed to [`crate::ConsciousnessSubstrate::record_experience`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    /// Scene and state description; this is the text that gets embedded.
    pub situation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(default)]
    pub ignored_streak_before: u32,
    #[serde(default)]
    pub valence_before: f32,
    #[serde(default)]
    pub valence_after: f32,
    #[serde(default)]
    pub arousal: f32,
    /// What Buddy said, if anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utterance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_description: Option<String>,
    /// Seconds since the person arrived, for arrival-delay learning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_since_arrival: Option<f32>,
}

impl Experience {
    pub fn new(situation: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            situation: situation.into(),
            intent: None,
            strategy: None,
            outcome,
            person_id: None,
            ignored_streak_before: 0,
            valence_before: 0.0,
            valence_after: 0.0,
            arousal: 0.0,
            utterance: None,
            scene_description: None,
            time_since_arrival: None,
        }
    }

    pub fn with_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    pub fn with_strategy(mut self, intent: IntentType, strategy: Strategy) -> Self {
        self.intent = Some(intent);
        self.strategy = Some(strategy);
        self
    }
}

/// An embedded experience as it sits in short-term memory or on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceEntry {
    pub embedding: Vec<f32>,
    pub metadata: Experience,
    pub timestamp: DateTime<Utc>,
}
