//! Emotional Baseline - very slow personality drift
//!
//! These are who Buddy is *becoming*, not how Buddy feels right now:
//! trust (will people respond?), openness (is reaching out worth it?),
//! resilience (how fast does being ignored wash off?), plus attachment to
//! individual people. Each outcome moves them by a tiny fixed step, so a
//! shift takes hundreds of interactions.

use buddy_core::Outcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DRIFT_RATE: f32 = 0.005;
const FLOOR: f32 = 0.05;
const CEILING: f32 = 0.95;
const DEFAULT_ATTACHMENT: f32 = 0.5;
const MAX_PERSONS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmotionalBaseline {
    pub trust: f32,
    pub openness: f32,
    pub resilience: f32,
    attachment: HashMap<String, f32>,
}

impl Default for EmotionalBaseline {
    fn default() -> Self {
        Self {
            trust: 0.5,
            openness: 0.5,
            resilience: 0.5,
            attachment: HashMap::new(),
        }
    }
}

fn bounded(v: f32) -> f32 {
    v.clamp(FLOOR, CEILING)
}

impl EmotionalBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_from_outcome(&mut self, outcome: Outcome, person_id: Option<&str>) {
        let r = DRIFT_RATE;
        match outcome {
            Outcome::Ignored => {
                self.trust = bounded(self.trust - r);
                self.openness = bounded(self.openness - r * 0.5);
            }
            Outcome::Spoke | Outcome::Smiled | Outcome::Laughed => {
                self.trust = bounded(self.trust + r * 2.0);
                self.openness = bounded(self.openness + r);
                self.resilience = bounded(self.resilience + r * 0.5);
            }
            Outcome::Looked => {
                self.trust = bounded(self.trust + r * 0.5);
            }
            // People leave; that alone says nothing about trust.
            Outcome::Left => {}
        }

        if let Some(person_id) = person_id.filter(|p| !p.is_empty()) {
            self.update_attachment(person_id, outcome);
        }
    }

    fn update_attachment(&mut self, person_id: &str, outcome: Outcome) {
        let current = self.attachment(person_id);
        let next = match outcome {
            o if o.is_positive() => bounded(current + 0.015),
            Outcome::Ignored => bounded(current - 0.003),
            Outcome::Left => bounded(current - 0.001),
            _ => current,
        };
        self.attachment.insert(person_id.to_string(), next);

        if self.attachment.len() > MAX_PERSONS {
            // The person being updated is never the one evicted.
            let weakest = self
                .attachment
                .iter()
                .filter(|(id, _)| id.as_str() != person_id)
                .min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)))
                .map(|(id, _)| id.clone());
            if let Some(id) = weakest {
                tracing::debug!(evicted = %id, "Attachment map full, evicting weakest bond");
                self.attachment.remove(&id);
            }
        }
    }

    pub fn attachment(&self, person_id: &str) -> f32 {
        self.attachment
            .get(person_id)
            .copied()
            .unwrap_or(DEFAULT_ATTACHMENT)
    }

    pub fn knows(&self, person_id: &str) -> bool {
        self.attachment.contains_key(person_id)
    }

    pub fn known_persons(&self) -> usize {
        self.attachment.len()
    }

    /// Clamp loaded values back into range and trim an oversized map.
    pub fn sanitize(&mut self) {
        let fix = |v: f32, fallback: f32| if v.is_finite() { bounded(v) } else { fallback };
        self.trust = fix(self.trust, 0.5);
        self.openness = fix(self.openness, 0.5);
        self.resilience = fix(self.resilience, 0.5);
        for v in self.attachment.values_mut() {
            *v = fix(*v, DEFAULT_ATTACHMENT);
        }
        while self.attachment.len() > MAX_PERSONS {
            let weakest = self
                .attachment
                .iter()
                .min_by(|a, b| a.1.total_cmp(b.1).then_with(|| a.0.cmp(b.0)))
                .map(|(id, _)| id.clone());
            match weakest {
                Some(id) => {
                    self.attachment.remove(&id);
                }
                None => break,
            }
        }
    }
}
