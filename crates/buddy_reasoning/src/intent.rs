//! Intent Manager - goal pursuit with escalation
//!
//! Buddy's speech and movement serve whatever intent is active. Each intent
//! climbs its strategy ladder when ignored, which makes the pursuit visible:
//! first a glance, then a remark, then a direct "Hey.", then theatrics.
//!
//! One mutex guards the active intent, the history, the engagement cycle
//! and the current bias. Callers get owned snapshots.

use crate::catalog::intent_spec;
use crate::context::render_intent_context;
use crate::engagement::{Engagement, EngagementPhase, EngagementStatus, Verdict};
use buddy_core::{IntentType, NarrativeSignals, Pattern, StateVector, Strategy};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const HISTORY_SIZE: usize = 10;
/// The same intent type is not restarted while younger than this.
const RESTART_GUARD: Duration = Duration::from_secs(300);
/// An unsuccessful intent gets this long before re-evaluation.
const HOLD_DURATION: Duration = Duration::from_secs(180);

/// Experience-driven adjustment of escalation timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentBias {
    /// >1 escalates faster (the window is divided by it).
    pub escalation_multiplier: f32,
    /// Each step stretches the give-up wait by a quarter window.
    pub give_up_modifier: i32,
}

impl Default for IntentBias {
    fn default() -> Self {
        Self {
            escalation_multiplier: 1.0,
            give_up_modifier: 0,
        }
    }
}

impl IntentBias {
    /// Effective escalation window.
    pub fn window(&self, base: Duration) -> Duration {
        let m = self.escalation_multiplier;
        let m = if m.is_finite() && m > 0.0 { m.clamp(0.25, 4.0) } else { 1.0 };
        base.div_f32(m)
    }

    /// Time to hold at the top of the ladder before giving up.
    pub fn give_up_wait(&self, window: Duration) -> Duration {
        let factor = (1.0 + 0.25 * self.give_up_modifier as f32).max(0.5);
        window.mul_f32(factor)
    }
}

/// An active social goal.
#[derive(Debug, Clone)]
pub struct Intent {
    pub intent_type: IntentType,
    pub description: &'static str,
    pub started: Instant,
    pub escalation_level: usize,
    pub max_level: usize,
    pub escalation_window: Duration,
    pub last_escalation: Instant,
    pub strategies: &'static [Strategy],
    pub current_strategy: Strategy,
    pub success: bool,
    pub reason: String,
    pub attempts: u32,
}

impl Intent {
    fn new(intent_type: IntentType, reason: &str, now: Instant) -> Self {
        let spec = intent_spec(intent_type);
        Self {
            intent_type,
            description: spec.description,
            started: now,
            escalation_level: 0,
            max_level: spec.max_level,
            escalation_window: spec.escalation_window(),
            last_escalation: now,
            strategies: spec.strategies,
            current_strategy: spec.strategies[0],
            success: false,
            reason: reason.to_string(),
            attempts: 0,
        }
    }

    pub fn snapshot(&self) -> IntentSnapshot {
        IntentSnapshot {
            intent_type: self.intent_type,
            description: self.description,
            age_secs: self.started.elapsed().as_secs_f32(),
            escalation_level: self.escalation_level,
            max_level: self.max_level,
            current_strategy: self.current_strategy,
            success: self.success,
            reason: self.reason.clone(),
            attempts: self.attempts,
        }
    }
}

/// Serializable view of an intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentSnapshot {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub description: &'static str,
    pub age_secs: f32,
    pub escalation_level: usize,
    pub max_level: usize,
    pub current_strategy: Strategy,
    pub success: bool,
    pub reason: String,
    pub attempts: u32,
}

/// What the active intent calls for right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "strategy", rename_all = "snake_case")]
pub enum NextAction {
    Speak(Strategy),
    Physical(Strategy),
    Wait,
}

struct Inner {
    current: Option<Intent>,
    history: VecDeque<Intent>,
    engagement: Engagement,
    bias: IntentBias,
}

impl Inner {
    fn archive_current(&mut self) {
        if let Some(old) = self.current.take() {
            self.history.push_back(old);
            while self.history.len() > HISTORY_SIZE {
                self.history.pop_front();
            }
        }
    }

    /// Replace the active intent unconditionally.
    fn install(&mut self, intent_type: IntentType, reason: &str, now: Instant) {
        self.archive_current();
        self.current = Some(Intent::new(intent_type, reason, now));
        tracing::debug!(intent = %intent_type, reason, "Intent set");
    }

    fn window_of(&self, intent: &Intent) -> Duration {
        self.bias.window(intent.escalation_window)
    }
}

pub struct IntentManager {
    inner: Mutex<Inner>,
}

impl Default for IntentManager {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: None,
                history: VecDeque::with_capacity(HISTORY_SIZE),
                engagement: Engagement::new(),
                bias: IntentBias::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start pursuing `intent_type`. The same type is not restarted while
    /// the active one is under five minutes old.
    pub fn set_intent(&self, intent_type: IntentType, reason: &str) {
        let now = Instant::now();
        let mut inner = self.lock();
        if let Some(current) = &inner.current {
            if current.intent_type == intent_type && now.duration_since(current.started) < RESTART_GUARD {
                return;
            }
        }
        inner.install(intent_type, reason, now);
    }

    /// Move one rung up the ladder. `None` when there is no intent or the
    /// top is already reached.
    pub fn escalate(&self) -> Option<Strategy> {
        let mut inner = self.lock();
        let intent = inner.current.as_mut()?;
        if intent.escalation_level >= intent.max_level {
            return None;
        }
        intent.escalation_level += 1;
        intent.last_escalation = Instant::now();
        intent.current_strategy = intent.strategies[intent.escalation_level];
        intent.attempts += 1;
        tracing::debug!(
            intent = %intent.intent_type,
            level = intent.escalation_level,
            strategy = %intent.current_strategy,
            "Intent escalated"
        );
        Some(intent.current_strategy)
    }

    pub fn should_escalate(&self) -> bool {
        let inner = self.lock();
        let Some(intent) = inner.current.as_ref() else {
            return false;
        };
        !intent.success
            && intent.escalation_level < intent.max_level
            && intent.last_escalation.elapsed() >= inner.window_of(intent)
    }

    pub fn should_act(&self) -> NextAction {
        let inner = self.lock();
        match inner.current.as_ref() {
            Some(intent) if !intent.success => {
                let strategy = intent.current_strategy;
                if strategy.is_physical_only() {
                    NextAction::Physical(strategy)
                } else {
                    NextAction::Speak(strategy)
                }
            }
            _ => NextAction::Wait,
        }
    }

    pub fn mark_success(&self) {
        if let Some(intent) = self.lock().current.as_mut() {
            intent.success = true;
        }
    }

    pub fn clear_intent(&self) {
        self.lock().archive_current();
    }

    /// Decide what Buddy should want. The engagement cycle overrides
    /// everything; then an active, unsuccessful intent is held for up to
    /// three minutes; then the priority ladder runs. Forced cycle intents
    /// are installed here; ordinary choices are left to `set_intent`.
    pub fn select_intent(&self, state: &StateVector, narrative: &NarrativeSignals) -> Option<IntentType> {
        let now = Instant::now();
        let state = state.normalized();
        let mut inner = self.lock();

        let give_up_wait = inner
            .current
            .as_ref()
            .map(|i| inner.bias.give_up_wait(inner.window_of(i)))
            .unwrap_or_default();
        let verdict = {
            let Inner { current, engagement, .. } = &mut *inner;
            engagement.step(current.as_ref(), give_up_wait, narrative.person_present, now)
        };

        match verdict {
            Verdict::Intent(forced) => {
                if inner.current.as_ref().map(|i| i.intent_type) != Some(forced) {
                    inner.install(forced, "engagement cycle", now);
                }
                return Some(forced);
            }
            Verdict::Rest => {
                inner.archive_current();
                return None;
            }
            Verdict::Pass => {}
        }

        if let Some(intent) = inner.current.as_ref() {
            if !intent.success && now.duration_since(intent.started) < HOLD_DURATION {
                let held = intent.intent_type;
                inner.engagement.on_selected(held, now);
                return Some(held);
            }
        }

        let chosen = choose_intent(&state, narrative, inner.engagement.phase);
        if let Some(intent) = chosen {
            inner.engagement.on_selected(intent, now);
        }
        chosen
    }

    /// The person reacted. Breaks a sulk (returning `acknowledge_return`)
    /// or marks the active intent as successful.
    pub fn person_responded(&self) -> Option<IntentType> {
        let now = Instant::now();
        let mut inner = self.lock();
        if let Some(intent) = inner.current.as_mut() {
            intent.success = true;
        }
        if inner.engagement.on_response(now) {
            inner.install(IntentType::AcknowledgeReturn, "person responded while Buddy was sulking", now);
            return Some(IntentType::AcknowledgeReturn);
        }
        None
    }

    pub fn person_departed(&self) {
        self.lock().engagement.on_departure(Instant::now());
    }

    pub fn apply_bias(&self, bias: IntentBias) {
        let mut inner = self.lock();
        if inner.bias != bias {
            tracing::debug!(
                escalation = bias.escalation_multiplier,
                give_up = bias.give_up_modifier,
                "Intent bias updated"
            );
        }
        inner.bias = bias;
    }

    pub fn current_intent(&self) -> Option<IntentSnapshot> {
        self.lock().current.as_ref().map(Intent::snapshot)
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<IntentSnapshot> {
        self.lock().history.iter().map(Intent::snapshot).collect()
    }

    pub fn engagement_status(&self) -> EngagementStatus {
        self.lock().engagement.status(Instant::now())
    }

    /// Goal description for the speech model; empty with no active intent.
    pub fn intent_context(&self) -> String {
        let inner = self.lock();
        match inner.current.as_ref() {
            Some(intent) => render_intent_context(intent, inner.engagement.phase, Instant::now()),
            None => String::new(),
        }
    }
}

/// The priority ladder used outside the engagement cycle.
pub fn choose_intent(state: &StateVector, narrative: &NarrativeSignals, phase: EngagementPhase) -> Option<IntentType> {
    let present = narrative.person_present;
    let streak = narrative.ignored_streak;
    let pattern = narrative.pattern;

    // Back after ignoring Buddy
    if present && streak >= 2 && matches!(pattern, Pattern::Present | Pattern::JustLeft) {
        return Some(IntentType::AcknowledgeReturn);
    }
    // Newly present
    if present && matches!(pattern, Pattern::Unknown | Pattern::Present) && state.social > 0.5 {
        return Some(IntentType::GetAttention);
    }
    // Sustained ignoring
    if streak >= 3 && present && phase == EngagementPhase::Idle {
        return Some(if state.valence < -0.1 {
            IntentType::ExpressDispleasure
        } else {
            IntentType::SeekComfort
        });
    }
    if state.social > 0.65 && present {
        return Some(IntentType::GetAttention);
    }
    if state.social > 0.7 && !present {
        return Some(IntentType::SeekComfort);
    }
    // Bored
    if state.stimulation > 0.65 {
        return Some(if state.wondering {
            IntentType::ProcessAloud
        } else {
            IntentType::ShareObservation
        });
    }
    if state.valence > 0.3 && state.arousal > 0.4 && present {
        return Some(IntentType::Entertain);
    }
    if present && state.social > 0.4 {
        return Some(IntentType::MaintainConnection);
    }
    if state.wondering {
        return Some(IntentType::ProcessAloud);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn signals(present: bool, streak: u32, pattern: Pattern) -> NarrativeSignals {
        NarrativeSignals {
            person_present: present,
            ignored_streak: streak,
            pattern,
            ..Default::default()
        }
    }

    fn state(social: f32) -> StateVector {
        StateVector {
            social,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_intent_restart_guard() {
        let m = IntentManager::new();
        m.set_intent(IntentType::GetAttention, "lonely");
        m.escalate();
        m.set_intent(IntentType::GetAttention, "again");
        assert_eq!(m.current_intent().unwrap().escalation_level, 1);

        advance(Duration::from_secs(301)).await;
        m.set_intent(IntentType::GetAttention, "again");
        let current = m.current_intent().unwrap();
        assert_eq!(current.escalation_level, 0);
        assert_eq!(current.reason, "again");
        assert_eq!(m.history().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_escalation_ladder() {
        let m = IntentManager::new();
        assert_eq!(m.escalate(), None);
        m.set_intent(IntentType::ShareObservation, "");
        assert!(!m.should_escalate());
        advance(Duration::from_secs(60)).await;
        assert!(m.should_escalate());
        assert_eq!(m.escalate(), Some(Strategy::CasualMention));
        assert!(!m.should_escalate());
        assert_eq!(m.escalate(), Some(Strategy::InsistentMention));
        assert_eq!(m.escalate(), None);
        advance(Duration::from_secs(600)).await;
        assert!(!m.should_escalate());
        assert_eq!(m.current_intent().unwrap().attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bias_scales_window() {
        let m = IntentManager::new();
        m.apply_bias(IntentBias {
            escalation_multiplier: 1.5,
            give_up_modifier: 0,
        });
        m.set_intent(IntentType::GetAttention, "");
        advance(Duration::from_secs(31)).await;
        assert!(m.should_escalate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_should_act() {
        let m = IntentManager::new();
        assert_eq!(m.should_act(), NextAction::Wait);
        m.set_intent(IntentType::GetAttention, "");
        assert_eq!(m.should_act(), NextAction::Physical(Strategy::SubtleMovement));
        m.escalate();
        assert_eq!(m.should_act(), NextAction::Speak(Strategy::IndirectObservation));
        m.mark_success();
        assert_eq!(m.should_act(), NextAction::Wait);
    }

    #[test]
    fn test_ladder_priorities() {
        let idle = EngagementPhase::Idle;
        assert_eq!(
            choose_intent(&state(0.9), &signals(true, 2, Pattern::Present), idle),
            Some(IntentType::AcknowledgeReturn)
        );
        assert_eq!(
            choose_intent(&state(0.6), &signals(true, 0, Pattern::Unknown), idle),
            Some(IntentType::GetAttention)
        );
        let sad = StateVector {
            valence: -0.5,
            ..state(0.3)
        };
        assert_eq!(
            choose_intent(&sad, &signals(true, 3, Pattern::MostlyIgnoring), idle),
            Some(IntentType::ExpressDispleasure)
        );
        assert_eq!(
            choose_intent(&state(0.3), &signals(true, 3, Pattern::MostlyIgnoring), idle),
            Some(IntentType::SeekComfort)
        );
        // Not while the engagement cycle is running.
        assert_eq!(
            choose_intent(&state(0.3), &signals(true, 3, Pattern::MostlyIgnoring), EngagementPhase::Engaging),
            None
        );
        assert_eq!(
            choose_intent(&state(0.75), &signals(false, 0, Pattern::Absent), idle),
            Some(IntentType::SeekComfort)
        );
        let bored = StateVector {
            stimulation: 0.8,
            wondering: true,
            ..state(0.1)
        };
        assert_eq!(choose_intent(&bored, &signals(false, 0, Pattern::Absent), idle), Some(IntentType::ProcessAloud));
        let happy = StateVector {
            valence: 0.5,
            arousal: 0.6,
            ..state(0.1)
        };
        assert_eq!(
            choose_intent(&happy, &signals(true, 0, Pattern::Engaging), idle),
            Some(IntentType::Entertain)
        );
        assert_eq!(
            choose_intent(&state(0.45), &signals(true, 0, Pattern::Engaging), idle),
            Some(IntentType::MaintainConnection)
        );
        assert_eq!(choose_intent(&state(0.1), &signals(false, 0, Pattern::Absent), idle), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_intent_is_held() {
        let m = IntentManager::new();
        m.set_intent(IntentType::ProcessAloud, "");
        let lonely = state(0.9);
        let s = signals(true, 0, Pattern::Present);
        assert_eq!(m.select_intent(&lonely, &s), Some(IntentType::ProcessAloud));
        advance(Duration::from_secs(181)).await;
        assert_eq!(m.select_intent(&lonely, &s), Some(IntentType::GetAttention));
    }

    #[tokio::test(start_paused = true)]
    async fn test_intent_context() {
        let m = IntentManager::new();
        assert_eq!(m.intent_context(), "");
        m.set_intent(IntentType::GetAttention, "they came back");
        m.escalate();
        m.escalate();
        advance(Duration::from_secs(12)).await;
        let ctx = m.intent_context();
        assert!(ctx.contains("working on this for 12 seconds"));
        assert!(ctx.contains("direct address (escalation level 2/4)"));
        assert!(ctx.contains("Why: they came back"));
        assert!(ctx.contains("tried 2 times"));
        assert!(ctx.contains("'Hey.'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_bounded() {
        let m = IntentManager::new();
        for _ in 0..6 {
            m.set_intent(IntentType::Entertain, "");
            m.set_intent(IntentType::ProcessAloud, "");
        }
        m.clear_intent();
        assert!(m.current_intent().is_none());
        assert_eq!(m.history().len(), 10);
    }
}
