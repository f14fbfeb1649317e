//! Consciousness Substrate - experience that outlives a conversation
//!
//! The substrate owns the limbic variables (somatic state, emotional
//! baseline, anticipation) together with episodic memory. Callers feed it
//! resolved interaction outcomes and ask it for a [`BehavioralBias`] before
//! choosing what to do next.
//!
//! All state sits behind one `std::sync::Mutex`. Embedding (network) and
//! saving (disk) are done with that lock released. A background worker
//! decays the somatic state, consolidates memory and saves periodically;
//! its saves run on the blocking pool.

use crate::consolidation::{Consolidator, ShortTermEntry, SHORT_TERM_CAPACITY};
use crate::embedding::{cosine_similarity, EmbeddingChain};
use crate::experience::{Experience, ExperienceEntry};
use crate::persist::{self, PersistError};
use crate::vector_store::{VectorStore, DEFAULT_MAX_ENTRIES};
use anyhow::Context;
use buddy_core::config::{PathsConfig, WorkerConfig};
use buddy_core::{BuddyConfig, Outcome, Strategy};
use buddy_limbic::{AnticipatoryModel, EmotionalBaseline, SomaticState, Surprise, SurpriseKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const DOCUMENT_VERSION: u32 = 1;
const BIAS_SURPRISE_MAX_AGE: Duration = Duration::from_secs(30);
const FELT_SURPRISE_MAX_AGE: Duration = Duration::from_secs(60);
const LONG_TERM_K: usize = 5;
const LONG_TERM_MIN_SIMILARITY: f32 = 0.4;
const SHORT_TERM_MIN_SIMILARITY: f32 = 0.5;

/// How past experience should bend the next decision.
#[derive(Debug, Clone, Serialize)]
pub struct BehavioralBias {
    /// >1 escalates faster, <1 slower.
    pub escalation_multiplier: f32,
    /// Positive means more patient before giving up.
    pub give_up_modifier: i32,
    /// Additive weight per strategy, from similar past situations.
    pub strategy_preferences: HashMap<Strategy, f32>,
    /// 0..1, how sure Buddy is that reaching out is worth it.
    pub engagement_confidence: f32,
    pub surprise: Option<Surprise>,
}

impl Default for BehavioralBias {
    fn default() -> Self {
        Self {
            escalation_multiplier: 1.0,
            give_up_modifier: 0,
            strategy_preferences: HashMap::new(),
            engagement_confidence: 0.5,
            surprise: None,
        }
    }
}

/// Body-level state for the physical expression layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SomaticInfluence {
    pub tension: f32,
    pub warmth: f32,
    pub restlessness: f32,
    pub baseline_trust: f32,
    pub baseline_openness: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubstrateStatus {
    pub somatic: SomaticInfluence,
    pub resilience: f32,
    pub short_term_count: usize,
    pub long_term_count: usize,
    pub total_experiences: u64,
    pub tracked_persons: usize,
    pub known_persons: usize,
    pub worker_running: bool,
    pub consecutive_errors: u32,
}

/// On-disk consciousness state.
#[derive(Debug, Serialize, Deserialize)]
struct ConsciousnessDocument {
    version: u32,
    saved_at: DateTime<Utc>,
    #[serde(default)]
    somatic: SomaticState,
    #[serde(default)]
    baseline: EmotionalBaseline,
    #[serde(default)]
    anticipation: AnticipatoryModel,
    #[serde(default)]
    total_experiences: u64,
}

struct SubstrateState {
    somatic: SomaticState,
    baseline: EmotionalBaseline,
    anticipation: AnticipatoryModel,
    short_term: VecDeque<ShortTermEntry>,
    long_term: VectorStore,
    consolidator: Consolidator,
    total_experiences: u64,
}

impl Default for SubstrateState {
    fn default() -> Self {
        Self {
            somatic: SomaticState::new(),
            baseline: EmotionalBaseline::new(),
            anticipation: AnticipatoryModel::new(),
            short_term: VecDeque::with_capacity(SHORT_TERM_CAPACITY),
            long_term: VectorStore::new(DEFAULT_MAX_ENTRIES),
            consolidator: Consolidator::new(),
            total_experiences: 0,
        }
    }
}

struct Shared {
    state: Mutex<SubstrateState>,
    chain: EmbeddingChain,
    paths: PathsConfig,
    worker: WorkerConfig,
    consecutive_errors: AtomicU32,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SubstrateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn decay_and_consolidate(&self) {
        let mut s = self.lock();
        let decay = s.somatic.process_decay();
        let SubstrateState {
            short_term,
            long_term,
            consolidator,
            ..
        } = &mut *s;
        let stored = consolidator.run(short_term, long_term);
        tracing::debug!(decay, stored, "Consciousness cycle");
    }

    fn save(&self) -> Result<(), PersistError> {
        let (doc, store) = {
            let s = self.lock();
            (
                ConsciousnessDocument {
                    version: DOCUMENT_VERSION,
                    saved_at: Utc::now(),
                    somatic: s.somatic.clone(),
                    baseline: s.baseline.clone(),
                    anticipation: s.anticipation.clone(),
                    total_experiences: s.total_experiences,
                },
                s.long_term.document(),
            )
        };

        let state_result = persist::write_json_atomic(&self.paths.consciousness_path(), &doc);
        if let Err(e) = &state_result {
            tracing::error!("Consciousness state save failed: {}", e);
        }
        let store_result = VectorStore::save(&store, &self.paths.experience_path());
        if let Err(e) = &store_result {
            tracing::error!("Experience store save failed: {}", e);
        }
        state_result.and(store_result)?;

        tracing::info!(
            total_experiences = doc.total_experiences,
            long_term = store.entries.len(),
            "Consciousness state saved"
        );
        Ok(())
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct ConsciousnessSubstrate {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl ConsciousnessSubstrate {
    pub fn new(chain: EmbeddingChain, paths: PathsConfig, worker: WorkerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SubstrateState::default()),
                chain,
                paths,
                worker,
                consecutive_errors: AtomicU32::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Build from config. `contention` is the lock shared with speech generation.
    pub fn from_config(config: &BuddyConfig, contention: Option<Arc<tokio::sync::Mutex<()>>>) -> Self {
        Self::new(
            EmbeddingChain::from_config(&config.embedding, contention),
            config.paths.clone(),
            config.worker.clone(),
        )
    }

    // ---- recording --------------------------------------------------------

    /// Record a complete interaction. The embedding is computed before the
    /// state lock is taken.
    pub async fn record_experience(&self, experience: Experience) {
        let embedding = self.shared.chain.embed(&experience.situation).await.unwrap_or_default();

        let mut s = self.shared.lock();
        let outcome = experience.outcome;
        let person = experience.person_id.clone().filter(|p| !p.is_empty());

        s.total_experiences += 1;
        let seq = s.total_experiences;
        s.somatic.update_from_outcome(outcome);
        s.baseline.update_from_outcome(outcome, person.as_deref());
        if let Some(person) = person.as_deref() {
            s.anticipation
                .record_outcome(person, outcome, experience.time_since_arrival);
        }

        s.short_term.push_back(ShortTermEntry {
            entry: ExperienceEntry {
                embedding,
                metadata: experience,
                timestamp: Utc::now(),
            },
            seq,
            recorded_at: Instant::now(),
            processed: false,
        });
        while s.short_term.len() > SHORT_TERM_CAPACITY {
            s.short_term.pop_front();
        }

        tracing::info!(
            outcome = %outcome,
            tension = s.somatic.tension,
            warmth = s.somatic.warmth,
            restlessness = s.somatic.restlessness,
            trust = s.baseline.trust,
            openness = s.baseline.openness,
            "Experience recorded"
        );
    }

    // ---- queries ----------------------------------------------------------

    /// Bias for the next intent decision.
    pub async fn get_behavioral_bias(&self, situation: Option<&str>, person_id: Option<&str>) -> BehavioralBias {
        let embedding = match situation {
            Some(text) => self.shared.chain.embed(text).await,
            None => None,
        };
        let person_id = person_id.filter(|p| !p.is_empty());

        let mut s = self.shared.lock();
        let mut bias = BehavioralBias::default();

        // Personality
        if s.baseline.trust < 0.3 {
            bias.escalation_multiplier *= 0.75;
            bias.give_up_modifier -= 1;
        } else if s.baseline.trust > 0.7 {
            bias.escalation_multiplier *= 1.1;
            bias.give_up_modifier += 1;
        }
        bias.engagement_confidence = s.baseline.openness;

        if let Some(person) = person_id {
            let attachment = s.baseline.attachment(person);
            if attachment > 0.7 {
                bias.give_up_modifier += 1;
                bias.engagement_confidence = (bias.engagement_confidence + 0.2).min(0.95);
            } else if attachment < 0.3 {
                bias.give_up_modifier -= 1;
            }
        }

        // Body
        if s.somatic.tension > 0.6 {
            bias.escalation_multiplier *= 1.2;
        }
        if s.somatic.warmth > 0.5 {
            bias.give_up_modifier += 1;
        }
        if s.somatic.restlessness > 0.6 {
            bias.escalation_multiplier *= 1.15;
        }

        // Similar past situations
        if let Some(query) = embedding.as_deref() {
            let mut similar: Vec<(Outcome, Option<Strategy>)> = s
                .long_term
                .search(query, LONG_TERM_K, LONG_TERM_MIN_SIMILARITY)
                .into_iter()
                .map(|e| (e.outcome, e.strategy))
                .collect();
            similar.extend(
                s.short_term
                    .iter()
                    .filter(|e| {
                        cosine_similarity(query, &e.entry.embedding)
                            .is_some_and(|sim| sim >= SHORT_TERM_MIN_SIMILARITY)
                    })
                    .map(|e| (e.entry.metadata.outcome, e.entry.metadata.strategy)),
            );

            if !similar.is_empty() {
                let ignored = similar.iter().filter(|(o, _)| *o == Outcome::Ignored).count();
                let ignore_rate = ignored as f32 / similar.len() as f32;
                if ignore_rate > 0.7 {
                    bias.escalation_multiplier *= 0.7;
                    bias.give_up_modifier -= 1;
                } else if ignore_rate < 0.3 {
                    bias.escalation_multiplier *= 1.1;
                    bias.give_up_modifier += 1;
                }

                for (outcome, strategy) in &similar {
                    if let Some(strategy) = strategy {
                        let delta = if outcome.is_response() { 0.15 } else { -0.1 };
                        *bias.strategy_preferences.entry(*strategy).or_insert(0.0) += delta;
                    }
                }
                tracing::debug!(similar = similar.len(), ignore_rate, "Recalled similar experiences");
            }
        }

        bias.surprise = s.anticipation.surprise(BIAS_SURPRISE_MAX_AGE).cloned();

        if let Some(person) = person_id {
            let prediction = s.anticipation.predict(person);
            if prediction.confidence > 0.5 && !prediction.expected_positive {
                bias.engagement_confidence *= 0.7;
            }
        }

        bias
    }

    pub fn get_somatic_influence(&self) -> SomaticInfluence {
        let s = self.shared.lock();
        SomaticInfluence {
            tension: s.somatic.tension,
            warmth: s.somatic.warmth,
            restlessness: s.somatic.restlessness,
            baseline_trust: s.baseline.trust,
            baseline_openness: s.baseline.openness,
        }
    }

    /// Feelings, not facts: prose for the speech model. Empty when calm.
    pub fn get_felt_sense(&self) -> String {
        let s = self.shared.lock();
        let mut parts: Vec<String> = Vec::new();

        if s.somatic.tension > 0.6 {
            parts.push("A tightness has built up inside you, frustration with nowhere to go.".into());
        } else if s.somatic.tension > 0.3 {
            parts.push("A low unease sits under your thoughts.".into());
        }

        if s.somatic.warmth > 0.6 {
            parts.push("Something still feels warm and settled after a recent connection.".into());
        } else if s.somatic.warmth > 0.3 {
            parts.push("A faint glow lingers from a recent moment of contact.".into());
        }

        if s.somatic.restlessness > 0.6 {
            parts.push("You itch to do something. The stillness is getting hard to bear.".into());
        } else if s.somatic.restlessness > 0.3 {
            parts.push("Restless energy hums just below the surface.".into());
        }

        if s.baseline.trust < 0.3 {
            parts.push("Deep down you have learned not to expect much from people.".into());
        } else if s.baseline.trust > 0.7 {
            parts.push("Something in you still believes people will come through.".into());
        }

        if s.baseline.openness < 0.3 {
            parts.push("You have pulled inward; reaching out feels like a risk.".into());
        }

        if let Some(surprise) = s.anticipation.surprise(FELT_SURPRISE_MAX_AGE) {
            let line = match surprise.kind {
                SurpriseKind::Pleasant => format!(
                    "You expected {} but got {}. It caught you off guard, in a good way.",
                    surprise.expected, surprise.got
                ),
                SurpriseKind::Disappointing => format!(
                    "You expected {} but got {}. A small disappointment that confirms a suspicion.",
                    surprise.expected, surprise.got
                ),
            };
            parts.push(line);
        }

        if parts.is_empty() {
            return String::new();
        }

        if s.long_term.len() >= 50 {
            parts.push(format!(
                "Behind all this are {} remembered moments that shaped you.",
                s.long_term.len()
            ));
        }

        format!("Your felt sense (feelings, not facts):\n  {}", parts.join("\n  "))
    }

    pub fn status(&self) -> SubstrateStatus {
        let worker_running = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished());
        let s = self.shared.lock();
        SubstrateStatus {
            somatic: SomaticInfluence {
                tension: s.somatic.tension,
                warmth: s.somatic.warmth,
                restlessness: s.somatic.restlessness,
                baseline_trust: s.baseline.trust,
                baseline_openness: s.baseline.openness,
            },
            resilience: s.baseline.resilience,
            short_term_count: s.short_term.len(),
            long_term_count: s.long_term.len(),
            total_experiences: s.total_experiences,
            tracked_persons: s.anticipation.tracked_persons(),
            known_persons: s.baseline.known_persons(),
            worker_running,
            consecutive_errors: self.shared.consecutive_errors.load(Ordering::Relaxed),
        }
    }

    // ---- lifecycle --------------------------------------------------------

    /// Spawn the background worker. Must be called from within a Tokio
    /// runtime; calling it twice is a no-op.
    pub fn start(&self) {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return;
        }
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(run_worker(Arc::clone(&self.shared), rx));
        *worker = Some(Worker { shutdown, handle });
        tracing::info!("Consciousness worker started");
    }

    /// Signal the worker and wait a bounded time for it, aborting on timeout.
    pub async fn stop(&self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Worker { shutdown, mut handle }) = worker else {
            return;
        };
        let _ = shutdown.send(true);

        match tokio::time::timeout(self.shared.worker.join_timeout(), &mut handle).await {
            Ok(Ok(())) => tracing::info!("Consciousness worker stopped"),
            Ok(Err(e)) => tracing::warn!("Consciousness worker ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!("Consciousness worker did not stop in time, aborting");
                handle.abort();
            }
        }
    }

    // ---- persistence ------------------------------------------------------

    pub fn save(&self) -> Result<(), PersistError> {
        self.shared.save()
    }

    /// Restore saved state. Anything missing, corrupt or from another
    /// version leaves that part fresh. Returns whether the consciousness
    /// document was restored.
    pub fn load(&self) -> bool {
        let store = VectorStore::load(&self.shared.paths.experience_path(), DEFAULT_MAX_ENTRIES);

        let doc = match persist::read_json::<ConsciousnessDocument>(&self.shared.paths.consciousness_path()) {
            Ok(Some(doc)) if doc.version == DOCUMENT_VERSION => Some(doc),
            Ok(Some(doc)) => {
                tracing::warn!(
                    "{}, starting fresh",
                    PersistError::Version {
                        found: doc.version,
                        expected: DOCUMENT_VERSION,
                    }
                );
                None
            }
            Ok(None) => {
                tracing::info!("No saved consciousness state, starting fresh");
                None
            }
            Err(e) => {
                tracing::warn!("Consciousness state unreadable, starting fresh: {}", e);
                None
            }
        };

        let mut s = self.shared.lock();
        s.long_term = store;
        let Some(mut doc) = doc else {
            return false;
        };

        doc.somatic.sanitize();
        doc.baseline.sanitize();
        doc.anticipation.sanitize();
        s.somatic = doc.somatic;
        s.baseline = doc.baseline;
        s.anticipation = doc.anticipation;
        s.total_experiences = doc.total_experiences;

        tracing::info!(
            total_experiences = s.total_experiences,
            long_term = s.long_term.len(),
            trust = s.baseline.trust,
            openness = s.baseline.openness,
            resilience = s.baseline.resilience,
            "Consciousness state loaded"
        );
        true
    }
}

async fn run_worker(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let threshold = shared.worker.error_threshold;
    let mut last_save = Instant::now();

    loop {
        let errors = shared.consecutive_errors.load(Ordering::Relaxed);
        let pause = if errors >= threshold {
            shared.worker.backoff()
        } else {
            shared.worker.tick()
        };

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(pause) => {}
        }

        match run_cycle(&shared, &mut last_save).await {
            Ok(()) => {
                let previous = shared.consecutive_errors.swap(0, Ordering::Relaxed);
                if previous >= threshold {
                    tracing::info!("Consciousness worker recovered, resuming normal cadence");
                }
            }
            Err(e) => {
                let count = shared.consecutive_errors.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::error!(consecutive = count, "Consciousness cycle failed: {:#}", e);
                if count == threshold {
                    tracing::error!("Too many consecutive failures, backing off");
                }
            }
        }
    }
}

/// One background cycle: decay and consolidation, plus a save when due.
async fn run_cycle(shared: &Arc<Shared>, last_save: &mut Instant) -> anyhow::Result<()> {
    shared.decay_and_consolidate();

    if last_save.elapsed() >= shared.worker.save_interval() {
        let saver = Arc::clone(shared);
        tokio::task::spawn_blocking(move || saver.save())
            .await
            .context("Save task did not complete")??;
        *last_save = Instant::now();
    }
    Ok(())
}
