//! Short-term → long-term consolidation
//!
//! Experiences sit in short-term memory for a couple of minutes before they
//! are judged. Significant ones are copied into the long-term store; every
//! judged entry is marked processed so nothing is stored twice.

use crate::experience::{Experience, ExperienceEntry};
use crate::vector_store::VectorStore;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub const SHORT_TERM_CAPACITY: usize = 50;

/// An experience waiting in short-term memory.
#[derive(Debug, Clone)]
pub struct ShortTermEntry {
    pub entry: ExperienceEntry,
    /// 1-based position in Buddy's lifetime of experiences.
    pub seq: u64,
    pub recorded_at: Instant,
    pub processed: bool,
}

/// Is this experience worth keeping for good?
pub fn is_significant(exp: &Experience, seq: u64) -> bool {
    let outcome = exp.outcome;

    // Emotional swings are memorable
    if (exp.valence_after - exp.valence_before).abs() > 0.25 {
        return true;
    }
    // Ignored while feeling good
    if outcome == buddy_core::Outcome::Ignored && exp.valence_before > 0.2 {
        return true;
    }
    // Broke an ignore streak
    if outcome.is_positive() && exp.ignored_streak_before >= 2 {
        return true;
    }
    if outcome == buddy_core::Outcome::Left {
        return true;
    }
    if exp.arousal > 0.7 {
        return true;
    }
    // Background sample of ordinary moments
    seq % 5 == 0
}

#[derive(Debug)]
pub struct Consolidator {
    interval: Duration,
    min_age: Duration,
    last_run: Option<Instant>,
}

impl Default for Consolidator {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            min_age: Duration::from_secs(120),
            last_run: None,
        }
    }
}

impl Consolidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one pass if the interval has elapsed. Returns how many entries
    /// were copied to `store`.
    pub fn run(&mut self, short_term: &mut VecDeque<ShortTermEntry>, store: &mut VectorStore) -> usize {
        let now = Instant::now();
        if self
            .last_run
            .is_some_and(|last| now.duration_since(last) < self.interval)
        {
            return 0;
        }

        let mut stored = 0;
        for item in short_term.iter_mut().filter(|e| !e.processed) {
            if now.duration_since(item.recorded_at) < self.min_age {
                continue;
            }
            if is_significant(&item.entry.metadata, item.seq) && !item.entry.embedding.is_empty() {
                store.add(
                    item.entry.embedding.clone(),
                    item.entry.metadata.clone(),
                    item.entry.timestamp,
                );
                stored += 1;
            }
            item.processed = true;
        }

        if stored > 0 {
            tracing::info!(stored, long_term = store.len(), "Consolidated experiences to long-term memory");
        }
        self.last_run = Some(now);
        stored
    }
}
