//! Line-delimited JSON exchanged with the host process.

use buddy_core::{Outcome, StateVector, Strategy};
use buddy_expression::CommandStep;
use buddy_perception::{AttentionState, VisionUpdate};
use buddy_reasoning::{EngagementStatus, IntentSnapshot, Modality};
use serde::{Deserialize, Serialize};

/// One poll of the robot's senses, plus whatever resolved since the last one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SensorFrame {
    pub face_detected: bool,
    pub facing_camera: bool,
    pub person_id: Option<String>,
    pub vision: Option<VisionFrame>,
    /// Voice activity probability for the latest audio chunk.
    pub speech_probability: Option<f32>,
    pub transcript: Option<String>,
    /// What Buddy actually said since the previous frame.
    pub spoken: Option<String>,
    /// How the person reacted to Buddy's last attempt.
    pub outcome: Option<Outcome>,
    pub state: StateVector,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisionFrame {
    pub face_count: u32,
    pub expression: Option<String>,
    pub scene: String,
    pub novelty: f32,
}

/// What Buddy decided this cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub attention: AttentionState,
    /// The attentive person started talking, so a listen window opens.
    pub listen: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vision: Option<VisionUpdate>,
    pub intent: Option<IntentSnapshot>,
    pub engagement: EngagementStatus,
    pub decision: Modality,
    pub strategy: Option<Strategy>,
    pub expression: Option<&'static str>,
    pub steps: Vec<CommandStep>,
    pub speech_delay_secs: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptMaterial>,
}

/// Context for the language model when the decision is to speak.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptMaterial {
    pub intent: String,
    pub guidance: &'static str,
    pub narrative: String,
    pub felt_sense: String,
    pub scene: String,
    pub objects: String,
    pub person: String,
}
