//! Attention Detector - debounced facing detection
//!
//! Single vision frames are noisy: a face flickers in and out, the facing
//! classifier disagrees with itself, and the robot's own head movement makes
//! everything wobble. The detector keeps a short rolling window of samples
//! and only declares ATTENTIVE once the person has been facing the robot
//! for long enough *continuously*.
//!
//! Facing time is credited per adjacent sample pair, and only when both ends
//! of the pair are facing. Each pair is capped so a long gap between polls
//! cannot fabricate attention out of two isolated samples.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Tunables for the detector. Defaults are the production values.
#[derive(Debug, Clone)]
pub struct AttentionConfig {
    /// Rolling window samples are kept for.
    pub window: Duration,
    /// Cumulative facing time needed for ATTENTIVE.
    pub threshold: Duration,
    /// Cap on the credit a single sample interval can contribute.
    pub max_interval: Duration,
    /// ATTENTIVE is held this long after it was last confirmed.
    pub debounce_down: Duration,
    pub listen_cooldown: Duration,
    /// Freeze is dropped automatically after this long.
    pub freeze_timeout: Duration,
    pub max_samples: usize,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(3000),
            threshold: Duration::from_millis(1500),
            max_interval: Duration::from_millis(1200),
            debounce_down: Duration::from_millis(500),
            listen_cooldown: Duration::from_secs(5),
            freeze_timeout: Duration::from_secs(5),
            max_samples: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttentionState {
    Absent,
    Present,
    Attentive,
}

impl AttentionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionState::Absent => "ABSENT",
            AttentionState::Present => "PRESENT",
            AttentionState::Attentive => "ATTENTIVE",
        }
    }
}

/// Transition hooks, injected at construction.
///
/// Both methods run after the detector's lock has been released. An error
/// is logged and otherwise ignored.
pub trait AttentionListener: Send + Sync {
    fn on_attentive(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_lost(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Point-in-time view of the detector, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct AttentionStatus {
    pub state: AttentionState,
    pub facing_secs: f32,
    pub samples: usize,
    pub frozen: bool,
    pub listen_cooldown_secs: f32,
    pub attentive_events: u64,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    facing: bool,
}

struct Inner {
    samples: VecDeque<Sample>,
    state: AttentionState,
    last_attentive_confirmed: Option<Instant>,
    last_known_facing: bool,
    frozen_at: Option<Instant>,
    listen_cooldown_until: Option<Instant>,
    attentive_events: u64,
}

enum Transition {
    Attentive,
    Lost,
}

pub struct AttentionDetector {
    config: AttentionConfig,
    listener: Option<Arc<dyn AttentionListener>>,
    inner: Mutex<Inner>,
}

impl AttentionDetector {
    pub fn new(config: AttentionConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_listener(config: AttentionConfig, listener: Arc<dyn AttentionListener>) -> Self {
        Self::build(config, Some(listener))
    }

    fn build(config: AttentionConfig, listener: Option<Arc<dyn AttentionListener>>) -> Self {
        let capacity = config.max_samples;
        Self {
            config,
            listener,
            inner: Mutex::new(Inner {
                samples: VecDeque::with_capacity(capacity),
                state: AttentionState::Absent,
                last_attentive_confirmed: None,
                last_known_facing: false,
                frozen_at: None,
                listen_cooldown_until: None,
                attentive_events: 0,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one vision poll.
    pub fn update(&self, face_detected: bool, facing_camera: bool) -> AttentionState {
        let now = Instant::now();

        let (state, transition) = {
            let mut inner = self.lock();

            if let Some(frozen_at) = inner.frozen_at {
                if now.duration_since(frozen_at) > self.config.freeze_timeout {
                    tracing::warn!("Attention freeze expired without unfreeze, resuming live samples");
                    inner.frozen_at = None;
                }
            }
            let frozen = inner.frozen_at.is_some();

            let facing = if frozen {
                inner.last_known_facing
            } else {
                let live = face_detected && facing_camera;
                inner.last_known_facing = live;
                live
            };

            inner.samples.push_back(Sample { at: now, facing });
            while inner.samples.len() > self.config.max_samples {
                inner.samples.pop_front();
            }
            if let Some(cutoff) = now.checked_sub(self.config.window) {
                while inner.samples.front().is_some_and(|s| s.at < cutoff) {
                    inner.samples.pop_front();
                }
            }

            let facing_time = facing_time(&inner.samples, self.config.max_interval);
            let old_state = inner.state;

            let mut new_state = if !face_detected && !frozen {
                AttentionState::Absent
            } else if facing_time >= self.config.threshold {
                AttentionState::Attentive
            } else {
                AttentionState::Present
            };

            if new_state == AttentionState::Attentive {
                inner.last_attentive_confirmed = Some(now);
            }

            if old_state == AttentionState::Attentive && new_state != AttentionState::Attentive {
                let held = inner
                    .last_attentive_confirmed
                    .is_some_and(|t| now.duration_since(t) < self.config.debounce_down);
                if held {
                    new_state = AttentionState::Attentive;
                }
            }

            let transition = if new_state != old_state {
                inner.state = new_state;
                tracing::debug!(from = old_state.as_str(), to = new_state.as_str(), "Attention state changed");
                if new_state == AttentionState::Attentive {
                    inner.attentive_events += 1;
                    Some(Transition::Attentive)
                } else if old_state == AttentionState::Attentive {
                    Some(Transition::Lost)
                } else {
                    None
                }
            } else {
                None
            };

            (new_state, transition)
        };

        if let (Some(transition), Some(listener)) = (transition, &self.listener) {
            let result = match transition {
                Transition::Attentive => listener.on_attentive(),
                Transition::Lost => listener.on_lost(),
            };
            if let Err(e) = result {
                tracing::error!("Attention listener failed: {:#}", e);
            }
        }

        state
    }

    pub fn get_state(&self) -> AttentionState {
        self.lock().state
    }

    pub fn is_attentive(&self) -> bool {
        self.get_state() == AttentionState::Attentive
    }

    /// True when a voice-triggered listen may start: attentive and not cooling down.
    pub fn can_trigger_listen(&self) -> bool {
        let inner = self.lock();
        if inner.state != AttentionState::Attentive {
            return false;
        }
        inner
            .listen_cooldown_until
            .map_or(true, |until| Instant::now() >= until)
    }

    /// Start the listen cooldown after a successful voice-triggered listen.
    pub fn record_listen_triggered(&self) {
        let mut inner = self.lock();
        inner.listen_cooldown_until = Some(Instant::now() + self.config.listen_cooldown);
    }

    /// Replay the last known facing value until `unfreeze` (or the safety timeout).
    pub fn freeze(&self) {
        self.lock().frozen_at = Some(Instant::now());
    }

    pub fn unfreeze(&self) {
        self.lock().frozen_at = None;
    }

    pub fn is_frozen(&self) -> bool {
        let inner = self.lock();
        inner
            .frozen_at
            .is_some_and(|t| Instant::now().duration_since(t) <= self.config.freeze_timeout)
    }

    pub fn status(&self) -> AttentionStatus {
        let now = Instant::now();
        let inner = self.lock();
        AttentionStatus {
            state: inner.state,
            facing_secs: facing_time(&inner.samples, self.config.max_interval).as_secs_f32(),
            samples: inner.samples.len(),
            frozen: inner
                .frozen_at
                .is_some_and(|t| now.duration_since(t) <= self.config.freeze_timeout),
            listen_cooldown_secs: inner
                .listen_cooldown_until
                .map_or(0.0, |until| until.saturating_duration_since(now).as_secs_f32()),
            attentive_events: inner.attentive_events,
        }
    }
}

/// Sum the intervals whose endpoints are both facing, each capped at `max_interval`.
fn facing_time(samples: &VecDeque<Sample>, max_interval: Duration) -> Duration {
    samples
        .iter()
        .zip(samples.iter().skip(1))
        .filter(|(a, b)| a.facing && b.facing)
        .map(|(a, b)| b.at.duration_since(a.at).min(max_interval))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::advance;

    #[derive(Default)]
    struct Counter {
        attentive: AtomicUsize,
        lost: AtomicUsize,
    }

    impl AttentionListener for Counter {
        fn on_attentive(&self) -> anyhow::Result<()> {
            self.attentive.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_lost(&self) -> anyhow::Result<()> {
            self.lost.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("listener exploded")
        }
    }

    async fn feed(detector: &AttentionDetector, every: Duration, total: Duration, face: bool, facing: bool) {
        let mut elapsed = Duration::ZERO;
        while elapsed <= total {
            detector.update(face, facing);
            advance(every).await;
            elapsed += every;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_facing_reaches_attentive() {
        let d = AttentionDetector::new(AttentionConfig::default());
        feed(&d, Duration::from_millis(200), Duration::from_secs(2), true, true).await;
        assert!(d.is_attentive());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternating_facing_never_attentive() {
        let d = AttentionDetector::new(AttentionConfig::default());
        for i in 0..100 {
            d.update(true, i % 2 == 0);
            advance(Duration::from_millis(100)).await;
            assert_ne!(d.get_state(), AttentionState::Attentive);
        }
        assert_eq!(d.get_state(), AttentionState::Present);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sparse_samples_are_capped() {
        let d = AttentionDetector::new(AttentionConfig::default());
        // Two facing samples 2.9 s apart credit only 1.2 s.
        d.update(true, true);
        advance(Duration::from_millis(2900)).await;
        assert_eq!(d.update(true, true), AttentionState::Present);
    }

    #[tokio::test(start_paused = true)]
    async fn test_downgrade_debounced_from_last_confirmation() {
        let d = AttentionDetector::new(AttentionConfig::default());
        feed(&d, Duration::from_millis(100), Duration::from_secs(2), true, true).await;
        assert!(d.is_attentive());

        // Person looks away: the facing run stays in-window for a while, then
        // the state is held for 500 ms past the last confirmed sample.
        let mut last_attentive = None;
        let mut dropped_at = None;
        for step in 0..60u64 {
            let state = d.update(true, false);
            let t = Duration::from_millis(step * 100);
            match state {
                AttentionState::Attentive => last_attentive = Some(t),
                _ => {
                    dropped_at = Some(t);
                    break;
                }
            }
            advance(Duration::from_millis(100)).await;
        }
        let dropped_at = dropped_at.expect("attention never dropped");
        assert!(last_attentive.is_some());
        assert_eq!(d.get_state(), AttentionState::Present);
        // Facing credit falls below 1.5 s after ~1.5 s; the debounce adds 500 ms.
        assert!(dropped_at >= Duration::from_millis(1500), "dropped too early: {dropped_at:?}");
        assert!(dropped_at <= Duration::from_millis(2200), "dropped too late: {dropped_at:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_without_face() {
        let d = AttentionDetector::new(AttentionConfig::default());
        assert_eq!(d.update(true, false), AttentionState::Present);
        assert_eq!(d.update(false, false), AttentionState::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freeze_replays_last_known_facing() {
        let d = AttentionDetector::new(AttentionConfig::default());
        feed(&d, Duration::from_millis(100), Duration::from_secs(2), true, true).await;
        d.freeze();
        // Vision goes haywire during movement; the detector keeps the facing run.
        for _ in 0..20 {
            assert_eq!(d.update(false, false), AttentionState::Attentive);
            advance(Duration::from_millis(100)).await;
        }
        d.unfreeze();
        assert!(!d.is_frozen());
    }

    #[tokio::test(start_paused = true)]
    async fn test_freeze_auto_expires() {
        let d = AttentionDetector::new(AttentionConfig::default());
        d.update(true, true);
        d.freeze();
        assert!(d.is_frozen());
        advance(Duration::from_secs(6)).await;
        assert!(!d.is_frozen());
        // Live samples are used again: no face means ABSENT.
        assert_eq!(d.update(false, false), AttentionState::Absent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_cooldown() {
        let d = AttentionDetector::new(AttentionConfig::default());
        assert!(!d.can_trigger_listen());
        feed(&d, Duration::from_millis(100), Duration::from_secs(2), true, true).await;
        assert!(d.can_trigger_listen());

        d.record_listen_triggered();
        assert!(!d.can_trigger_listen());
        feed(&d, Duration::from_millis(100), Duration::from_secs(5), true, true).await;
        assert!(d.can_trigger_listen());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_fires_once_per_transition() {
        let counter = Arc::new(Counter::default());
        let d = AttentionDetector::with_listener(AttentionConfig::default(), counter.clone());

        feed(&d, Duration::from_millis(100), Duration::from_secs(3), true, true).await;
        assert_eq!(counter.attentive.load(Ordering::SeqCst), 1);

        feed(&d, Duration::from_millis(100), Duration::from_secs(4), false, false).await;
        // The failing on_lost hook is logged, not propagated.
        assert_eq!(counter.lost.load(Ordering::SeqCst), 1);
        assert_eq!(d.get_state(), AttentionState::Absent);
        assert_eq!(d.status().attentive_events, 1);
    }
}
