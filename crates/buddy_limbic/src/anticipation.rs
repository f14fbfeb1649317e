//! Anticipatory Model - expectations and surprise
//!
//! Buddy learns, per person, how likely they are to respond at all. Each
//! bias query issues a prediction; when the next real outcome for that
//! person contradicts it, the mismatch is recorded as a surprise whose
//! intensity is the confidence of the broken prediction.

use buddy_core::Outcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

const MAX_PERSONS: usize = 50;
const MAX_OUTCOMES: usize = 30;
const MAX_ARRIVALS: usize = 10;
/// Only the first response of a visit counts toward arrival delay.
const ARRIVAL_DEDUPE_SECS: i64 = 300;
const MIN_HISTORY: usize = 3;
const RECENT_WINDOW: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub outcome: Outcome,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrivalRecord {
    /// Seconds from arrival to first response.
    pub delay_secs: f32,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonPattern {
    pub outcomes: VecDeque<OutcomeRecord>,
    pub arrival_to_first_response: VecDeque<ArrivalRecord>,
}

impl PersonPattern {
    fn last_seen(&self) -> DateTime<Utc> {
        self.outcomes
            .back()
            .map(|o| o.at)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Mean delay to first response across recorded visits.
    pub fn typical_arrival_delay(&self) -> Option<f32> {
        if self.arrival_to_first_response.is_empty() {
            return None;
        }
        let total: f32 = self.arrival_to_first_response.iter().map(|a| a.delay_secs).sum();
        Some(total / self.arrival_to_first_response.len() as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub expected_positive: bool,
    pub confidence: f32,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurpriseKind {
    /// Expected to be ignored, got a response.
    Pleasant,
    /// Expected a response, got ignored (or left).
    Disappointing,
}

#[derive(Debug, Clone, Serialize)]
pub struct Surprise {
    pub kind: SurpriseKind,
    pub person_id: String,
    /// "response" or "ignore"
    pub expected: &'static str,
    pub got: Outcome,
    pub intensity: f32,
    #[serde(skip)]
    pub at: Instant,
}

impl Surprise {
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        Instant::now().duration_since(self.at) <= max_age
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnticipatoryModel {
    patterns: HashMap<String, PersonPattern>,
    #[serde(skip)]
    last_prediction: HashMap<String, Prediction>,
    #[serde(skip)]
    last_surprise: Option<Surprise>,
}

impl AnticipatoryModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&mut self, person_id: &str, outcome: Outcome, time_since_arrival: Option<f32>) {
        self.record_outcome_at(person_id, outcome, time_since_arrival, Utc::now());
    }

    /// Record an outcome at an explicit wall-clock time.
    pub fn record_outcome_at(
        &mut self,
        person_id: &str,
        outcome: Outcome,
        time_since_arrival: Option<f32>,
        now: DateTime<Utc>,
    ) {
        if person_id.is_empty() {
            return;
        }

        let pattern = self.ensure_person(person_id);
        pattern.outcomes.push_back(OutcomeRecord { outcome, at: now });
        while pattern.outcomes.len() > MAX_OUTCOMES {
            pattern.outcomes.pop_front();
        }

        if let Some(delay) = time_since_arrival.filter(|_| outcome.is_response()) {
            let new_visit = pattern
                .arrival_to_first_response
                .back()
                .map_or(true, |last| (now - last.at).num_seconds() > ARRIVAL_DEDUPE_SECS);
            if new_visit {
                pattern
                    .arrival_to_first_response
                    .push_back(ArrivalRecord { delay_secs: delay, at: now });
                while pattern.arrival_to_first_response.len() > MAX_ARRIVALS {
                    pattern.arrival_to_first_response.pop_front();
                }
            }
        }

        if let Some(prediction) = self.last_prediction.get(person_id) {
            let actual_positive = outcome.is_response();
            if actual_positive != prediction.expected_positive {
                let surprise = Surprise {
                    kind: if actual_positive {
                        SurpriseKind::Pleasant
                    } else {
                        SurpriseKind::Disappointing
                    },
                    person_id: person_id.to_string(),
                    expected: if prediction.expected_positive { "response" } else { "ignore" },
                    got: outcome,
                    intensity: prediction.confidence,
                    at: Instant::now(),
                };
                tracing::debug!(
                    person = person_id,
                    kind = ?surprise.kind,
                    intensity = surprise.intensity,
                    "Prediction violated"
                );
                self.last_surprise = Some(surprise);
            }
        }
    }

    fn ensure_person(&mut self, person_id: &str) -> &mut PersonPattern {
        if !self.patterns.contains_key(person_id) && self.patterns.len() >= MAX_PERSONS {
            let idle = self
                .patterns
                .iter()
                .min_by(|a, b| a.1.last_seen().cmp(&b.1.last_seen()).then_with(|| a.0.cmp(b.0)))
                .map(|(id, _)| id.clone());
            if let Some(id) = idle {
                self.patterns.remove(&id);
                self.last_prediction.remove(&id);
            }
        }
        self.patterns.entry(person_id.to_string()).or_default()
    }

    /// Predict whether this person will respond, and remember the prediction
    /// so the next outcome can be checked against it.
    pub fn predict(&mut self, person_id: &str) -> Prediction {
        let outcomes = self.patterns.get(person_id).map(|p| &p.outcomes);

        let prediction = match outcomes {
            Some(outcomes) if outcomes.len() >= MIN_HISTORY => {
                let recent: Vec<&OutcomeRecord> = outcomes.iter().rev().take(RECENT_WINDOW).collect();
                let positive = recent.iter().filter(|o| o.outcome.is_response()).count();
                let rate = positive as f32 / recent.len() as f32;
                let reason = if rate > 0.7 {
                    "this person usually responds"
                } else if rate < 0.3 {
                    "this person usually ignores you"
                } else {
                    "unpredictable person"
                };
                Prediction {
                    expected_positive: rate > 0.4,
                    confidence: (rate - 0.5).abs() * 2.0,
                    reason,
                }
            }
            Some(_) => Prediction {
                expected_positive: true,
                confidence: 0.3,
                reason: "not enough history",
            },
            None => Prediction {
                expected_positive: true,
                confidence: 0.3,
                reason: "unknown person",
            },
        };

        self.last_prediction
            .insert(person_id.to_string(), prediction.clone());
        prediction
    }

    /// The most recent surprise, if it is no older than `max_age`.
    pub fn surprise(&self, max_age: Duration) -> Option<&Surprise> {
        self.last_surprise.as_ref().filter(|s| s.is_fresh(max_age))
    }

    pub fn pattern(&self, person_id: &str) -> Option<&PersonPattern> {
        self.patterns.get(person_id)
    }

    pub fn tracked_persons(&self) -> usize {
        self.patterns.len()
    }

    /// Enforce capacity limits on a freshly loaded model.
    pub fn sanitize(&mut self) {
        for pattern in self.patterns.values_mut() {
            while pattern.outcomes.len() > MAX_OUTCOMES {
                pattern.outcomes.pop_front();
            }
            while pattern.arrival_to_first_response.len() > MAX_ARRIVALS {
                pattern.arrival_to_first_response.pop_front();
            }
        }
        while self.patterns.len() > MAX_PERSONS {
            let idle = self
                .patterns
                .iter()
                .min_by(|a, b| a.1.last_seen().cmp(&b.1.last_seen()).then_with(|| a.0.cmp(b.0)))
                .map(|(id, _)| id.clone());
            match idle {
                Some(id) => {
                    self.patterns.remove(&id);
                }
                None => break,
            }
        }
    }
}
