//! Snapshot value types passed between components.
//!
//! The robot's drives (`StateVector`) are produced by whatever upstream
//! model owns affect; the decision core only reads them. Narrative
//! responsiveness is summarised into `NarrativeSignals` so the intent
//! manager never touches narrative internals.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Guard against NaN and Infinity in externally supplied values.
#[inline]
fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in state vector, resetting to fallback {}", fallback);
        fallback
    }
}

/// The drive/affect vector that intent selection runs over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateVector {
    /// Need for company, 0..1
    pub social: f32,
    /// Boredom pressure, 0..1 (high = under-stimulated)
    pub stimulation: f32,
    pub energy: f32,
    /// -1..1
    pub valence: f32,
    pub arousal: f32,
    /// Whether the robot is currently in a reflective, wandering mood.
    pub wondering: bool,
}

impl Default for StateVector {
    fn default() -> Self {
        Self {
            social: 0.3,
            stimulation: 0.3,
            energy: 0.7,
            valence: 0.0,
            arousal: 0.3,
            wondering: false,
        }
    }
}

impl StateVector {
    /// Clamp every field into its legal range, replacing NaN/Inf with neutral values.
    pub fn normalize(&mut self) {
        self.social = sanitize_f32(self.social, 0.3).clamp(0.0, 1.0);
        self.stimulation = sanitize_f32(self.stimulation, 0.3).clamp(0.0, 1.0);
        self.energy = sanitize_f32(self.energy, 0.7).clamp(0.0, 1.0);
        self.valence = sanitize_f32(self.valence, 0.0).clamp(-1.0, 1.0);
        self.arousal = sanitize_f32(self.arousal, 0.3).clamp(0.0, 1.0);
    }

    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }
}

/// Coarse engagement level derived from recent utterance outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionLevel {
    Absent,
    High,
    Medium,
    Low,
}

impl AttentionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionLevel::Absent => "absent",
            AttentionLevel::High => "high",
            AttentionLevel::Medium => "medium",
            AttentionLevel::Low => "low",
        }
    }
}

impl fmt::Display for AttentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the person has been behaving toward the robot lately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// No face observation yet this session.
    Unknown,
    Present,
    JustLeft,
    Absent,
    MostlyIgnoring,
    Distracted,
    Engaging,
}

impl Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Unknown => "unknown",
            Pattern::Present => "present",
            Pattern::JustLeft => "just_left",
            Pattern::Absent => "absent",
            Pattern::MostlyIgnoring => "mostly_ignoring",
            Pattern::Distracted => "distracted",
            Pattern::Engaging => "engaging",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the narrative engine's responsiveness model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSignals {
    pub person_present: bool,
    pub ignored_streak: u32,
    pub pattern: Pattern,
    pub attention_level: AttentionLevel,
}

impl Default for NarrativeSignals {
    fn default() -> Self {
        Self {
            person_present: false,
            ignored_streak: 0,
            pattern: Pattern::Unknown,
            attention_level: AttentionLevel::Absent,
        }
    }
}

/// Resolved result of one interaction attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ignored,
    Looked,
    Smiled,
    Laughed,
    Spoke,
    Left,
}

impl Outcome {
    /// Smiles, laughs and speech count as the person engaging back.
    pub fn is_positive(&self) -> bool {
        matches!(self, Outcome::Smiled | Outcome::Laughed | Outcome::Spoke)
    }

    /// Any acknowledgement at all, including a glance.
    pub fn is_response(&self) -> bool {
        self.is_positive() || *self == Outcome::Looked
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ignored => "ignored",
            Outcome::Looked => "looked",
            Outcome::Smiled => "smiled",
            Outcome::Laughed => "laughed",
            Outcome::Spoke => "spoke",
            Outcome::Left => "left",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of response a person gave to an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Looked,
    Smiled,
    Laughed,
    Spoke,
    Approached,
}

impl ResponseKind {
    /// Verbal responses get special mention in the narrative context.
    pub fn is_verbal(&self) -> bool {
        matches!(self, ResponseKind::Spoke | ResponseKind::Laughed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Looked => "looked",
            ResponseKind::Smiled => "smiled",
            ResponseKind::Laughed => "laughed",
            ResponseKind::Spoke => "spoke",
            ResponseKind::Approached => "approached",
        }
    }
}

impl From<ResponseKind> for Outcome {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Looked | ResponseKind::Approached => Outcome::Looked,
            ResponseKind::Smiled => Outcome::Smiled,
            ResponseKind::Laughed => Outcome::Laughed,
            ResponseKind::Spoke => Outcome::Spoke,
        }
    }
}
