//! Somatic State - accumulated body-level feeling
//!
//! Unlike a discrete emotion label, these three variables persist between
//! events and colour everything else:
//!
//! - tension: frustration building up from being ignored
//! - warmth: residue of recent connection
//! - restlessness: the need to *do* something
//!
//! Outcomes push the variables around; time pulls them back toward zero.
//! Warmth fades at half the rate of the others so good moments linger.

use buddy_core::Outcome;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Decay is skipped when less than this has passed since the last change.
const MIN_DECAY_ELAPSED: Duration = Duration::from_secs(10);
const DECAY_PER_SEC: f32 = 0.0003;
const MAX_DECAY_STEP: f32 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SomaticState {
    pub tension: f32,
    pub warmth: f32,
    pub restlessness: f32,

    #[serde(skip, default = "Instant::now")]
    last_update: Instant,
}

impl Default for SomaticState {
    fn default() -> Self {
        Self {
            tension: 0.0,
            warmth: 0.0,
            restlessness: 0.0,
            last_update: Instant::now(),
        }
    }
}

impl SomaticState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the fixed outcome → (tension, warmth, restlessness) delta.
    pub fn update_from_outcome(&mut self, outcome: Outcome) {
        let (dt, dw, dr) = match outcome {
            Outcome::Ignored => (0.08, -0.03, 0.05),
            Outcome::Smiled | Outcome::Laughed => (-0.18, 0.15, -0.10),
            Outcome::Spoke => (-0.12, 0.10, -0.06),
            Outcome::Looked => (-0.05, 0.04, 0.0),
            Outcome::Left => (0.04, -0.08, 0.06),
        };
        self.tension = (self.tension + dt).clamp(0.0, 1.0);
        self.warmth = (self.warmth + dw).clamp(0.0, 1.0);
        self.restlessness = (self.restlessness + dr).clamp(0.0, 1.0);
        self.last_update = Instant::now();
    }

    /// Relax toward rest in proportion to the time since the last change.
    /// Returns the decay step applied (0 when skipped).
    pub fn process_decay(&mut self) -> f32 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update);
        if elapsed < MIN_DECAY_ELAPSED {
            return 0.0;
        }

        let decay = (elapsed.as_secs_f32() * DECAY_PER_SEC).min(MAX_DECAY_STEP);
        self.tension = (self.tension - decay).max(0.0);
        self.restlessness = (self.restlessness - decay).max(0.0);
        self.warmth = (self.warmth - decay * 0.5).max(0.0);
        self.last_update = now;
        decay
    }

    /// Clamp loaded values and restart the decay clock.
    pub fn sanitize(&mut self) {
        for v in [&mut self.tension, &mut self.warmth, &mut self.restlessness] {
            *v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        }
        self.last_update = Instant::now();
    }
}
