//! The engagement cycle: try, give up, sulk, try again.
//!
//! ```text
//! idle ──attention-seeking intent──▶ engaging
//! engaging ──max level + one window, no success──▶ giving_up   (disengage)
//! giving_up ──60 s──▶ self_occupied                           (self_occupy)
//! self_occupied ──cooldown over──▶ idle                       (reluctant_reengage, or resignation)
//! self_occupied ──person responds──▶ idle                     (acknowledge_return)
//! ```

use crate::catalog::is_attention_seeking;
use crate::intent::Intent;
use buddy_core::IntentType;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// How long the disengage display runs before Buddy busies himself.
pub const DISENGAGE_DURATION: Duration = Duration::from_secs(60);
/// Give-ups after which Buddy stops re-engaging on his own.
pub const MAX_REENGAGEMENTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementPhase {
    Idle,
    Engaging,
    GivingUp,
    SelfOccupied,
}

impl fmt::Display for EngagementPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngagementPhase::Idle => "idle",
            EngagementPhase::Engaging => "engaging",
            EngagementPhase::GivingUp => "giving_up",
            EngagementPhase::SelfOccupied => "self_occupied",
        })
    }
}

/// min(300, 45 + 45 * gave_up_count) seconds.
pub fn self_occupied_cooldown(gave_up_count: u32) -> Duration {
    Duration::from_secs((45 + 45 * u64::from(gave_up_count)).min(300))
}

#[derive(Debug, Clone, Serialize)]
pub struct EngagementStatus {
    pub phase: EngagementPhase,
    pub gave_up_count: u32,
    pub cooldown_remaining_secs: Option<f32>,
    pub resigned: bool,
}

/// What the cycle wants from this selection round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// Not the cycle's call; use the normal selection.
    Pass,
    /// This intent, installed if it is not already active.
    Intent(IntentType),
    /// No intent at all.
    Rest,
}

#[derive(Debug)]
pub(crate) struct Engagement {
    pub(crate) phase: EngagementPhase,
    pub(crate) gave_up_count: u32,
    phase_since: Instant,
    cooldown_until: Option<Instant>,
    resigned: bool,
}

impl Engagement {
    pub(crate) fn new() -> Self {
        Self {
            phase: EngagementPhase::Idle,
            gave_up_count: 0,
            phase_since: Instant::now(),
            cooldown_until: None,
            resigned: false,
        }
    }

    fn enter(&mut self, phase: EngagementPhase, now: Instant) {
        if self.phase != phase {
            tracing::debug!(from = %self.phase, to = %phase, gave_up = self.gave_up_count, "Engagement phase change");
        }
        self.phase = phase;
        self.phase_since = now;
    }

    /// One step of the cycle. `give_up_wait` is how long to wait at the top
    /// of the ladder before conceding.
    pub(crate) fn step(
        &mut self,
        current: Option<&Intent>,
        give_up_wait: Duration,
        person_present: bool,
        now: Instant,
    ) -> Verdict {
        match self.phase {
            EngagementPhase::Idle if self.resigned => Verdict::Rest,
            EngagementPhase::Idle => Verdict::Pass,

            EngagementPhase::Engaging => match current {
                Some(intent) if is_attention_seeking(intent.intent_type) => {
                    if intent.success {
                        self.enter(EngagementPhase::Idle, now);
                        Verdict::Pass
                    } else if intent.escalation_level >= intent.max_level
                        && now.duration_since(intent.last_escalation) >= give_up_wait
                    {
                        self.gave_up_count += 1;
                        self.enter(EngagementPhase::GivingUp, now);
                        tracing::info!(gave_up = self.gave_up_count, "Giving up on getting attention");
                        Verdict::Intent(IntentType::Disengage)
                    } else {
                        Verdict::Pass
                    }
                }
                _ => {
                    self.enter(EngagementPhase::Idle, now);
                    Verdict::Pass
                }
            },

            EngagementPhase::GivingUp => {
                if now.duration_since(self.phase_since) >= DISENGAGE_DURATION {
                    let cooldown = self_occupied_cooldown(self.gave_up_count);
                    self.cooldown_until = Some(now + cooldown);
                    self.enter(EngagementPhase::SelfOccupied, now);
                    Verdict::Intent(IntentType::SelfOccupy)
                } else {
                    Verdict::Intent(IntentType::Disengage)
                }
            }

            EngagementPhase::SelfOccupied => {
                let expired = self.cooldown_until.map_or(true, |until| now >= until);
                if !expired {
                    return Verdict::Intent(IntentType::SelfOccupy);
                }
                self.cooldown_until = None;
                self.enter(EngagementPhase::Idle, now);
                if self.gave_up_count <= MAX_REENGAGEMENTS && person_present {
                    Verdict::Intent(IntentType::ReluctantReengage)
                } else {
                    tracing::info!(gave_up = self.gave_up_count, "Resigned; waiting for the person to make the first move");
                    self.resigned = true;
                    Verdict::Rest
                }
            }
        }
    }

    /// A freshly selected intent; attention-seeking ones start the cycle.
    pub(crate) fn on_selected(&mut self, intent: IntentType, now: Instant) {
        if self.phase == EngagementPhase::Idle && !self.resigned && is_attention_seeking(intent) {
            self.enter(EngagementPhase::Engaging, now);
        }
    }

    /// Returns true when this breaks a sulk and deserves an acknowledgement.
    pub(crate) fn on_response(&mut self, now: Instant) -> bool {
        let was_sulking = self.phase == EngagementPhase::SelfOccupied;
        self.gave_up_count = 0;
        self.resigned = false;
        self.cooldown_until = None;
        self.enter(EngagementPhase::Idle, now);
        was_sulking
    }

    pub(crate) fn on_departure(&mut self, now: Instant) {
        if matches!(self.phase, EngagementPhase::Engaging | EngagementPhase::GivingUp) {
            self.enter(EngagementPhase::Idle, now);
        }
    }

    pub(crate) fn status(&self, now: Instant) -> EngagementStatus {
        EngagementStatus {
            phase: self.phase,
            gave_up_count: self.gave_up_count,
            cooldown_remaining_secs: self
                .cooldown_until
                .map(|until| until.saturating_duration_since(now).as_secs_f32()),
            resigned: self.resigned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_formula() {
        assert_eq!(self_occupied_cooldown(1), Duration::from_secs(90));
        assert_eq!(self_occupied_cooldown(2), Duration::from_secs(135));
        assert_eq!(self_occupied_cooldown(5), Duration::from_secs(300));
        assert_eq!(self_occupied_cooldown(50), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_passes_until_resigned() {
        let mut e = Engagement::new();
        let now = Instant::now();
        assert_eq!(e.step(None, Duration::from_secs(45), true, now), Verdict::Pass);
        e.resigned = true;
        assert_eq!(e.step(None, Duration::from_secs(45), true, now), Verdict::Rest);
        assert!(!e.on_response(now));
        assert_eq!(e.step(None, Duration::from_secs(45), true, now), Verdict::Pass);
    }

    #[tokio::test(start_paused = true)]
    async fn test_engaging_without_intent_resets() {
        let mut e = Engagement::new();
        e.on_selected(IntentType::GetAttention, Instant::now());
        assert_eq!(e.phase, EngagementPhase::Engaging);
        assert_eq!(e.step(None, Duration::from_secs(45), true, Instant::now()), Verdict::Pass);
        assert_eq!(e.phase, EngagementPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_seeking_intent_does_not_engage() {
        let mut e = Engagement::new();
        e.on_selected(IntentType::ProcessAloud, Instant::now());
        assert_eq!(e.phase, EngagementPhase::Idle);
    }
}
