//! Long-term episodic store: a few hundred embedded experiences kept as a
//! JSON document and searched by brute-force cosine similarity.

use crate::embedding::cosine_similarity;
use crate::experience::{Experience, ExperienceEntry};
use crate::persist::{self, PersistError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// On-disk shape of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub entries: Vec<ExperienceEntry>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    entries: VecDeque<ExperienceEntry>,
    max_entries: usize,
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl VectorStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Add an experience, evicting the oldest when over capacity.
    pub fn add(&mut self, embedding: Vec<f32>, metadata: Experience, timestamp: DateTime<Utc>) {
        self.entries.push_back(ExperienceEntry {
            embedding,
            metadata,
            timestamp,
        });
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    /// Up to `k` most similar experiences with their cosine similarity,
    /// best first. Entries whose dimension differs from the query are skipped.
    pub fn search_scored(&self, query: &[f32], k: usize, min_similarity: f32) -> Vec<(f32, &Experience)> {
        let mut scored: Vec<(f32, &Experience)> = self
            .entries
            .iter()
            .filter_map(|e| cosine_similarity(query, &e.embedding).map(|sim| (sim, &e.metadata)))
            .filter(|(sim, _)| *sim >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);
        scored
    }

    pub fn search(&self, query: &[f32], k: usize, min_similarity: f32) -> Vec<&Experience> {
        self.search_scored(query, k, min_similarity)
            .into_iter()
            .map(|(_, m)| m)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy for writing to disk without holding the owner's lock.
    pub fn document(&self) -> StoreDocument {
        StoreDocument {
            entries: self.entries.iter().cloned().collect(),
        }
    }

    pub fn save(document: &StoreDocument, path: &Path) -> Result<(), PersistError> {
        persist::write_json_atomic(path, document)
    }

    /// Load from disk. Missing or unreadable documents give an empty store.
    pub fn load(path: &Path, max_entries: usize) -> Self {
        let mut store = Self::new(max_entries);
        match persist::read_json::<StoreDocument>(path) {
            Ok(Some(doc)) => {
                let skip = doc.entries.len().saturating_sub(store.max_entries);
                store.entries.extend(doc.entries.into_iter().skip(skip));
                tracing::info!(count = store.len(), path = %path.display(), "Loaded long-term experiences");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Experience store unreadable, starting empty: {}", e),
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buddy_core::Outcome;

    fn exp(situation: &str) -> Experience {
        Experience::new(situation, Outcome::Ignored)
    }

    #[test]
    fn test_fifo_eviction() {
        let mut store = VectorStore::new(3);
        for i in 0..5 {
            store.add(vec![1.0, i as f32], exp(&format!("e{i}")), Utc::now());
        }
        assert_eq!(store.len(), 3);
        let doc = store.document();
        let names: Vec<&str> = doc.entries.iter().map(|e| e.metadata.situation.as_str()).collect();
        assert_eq!(names, vec!["e2", "e3", "e4"]);
    }

    #[test]
    fn test_search_orders_and_filters() {
        let mut store = VectorStore::default();
        store.add(vec![1.0, 0.0], exp("same"), Utc::now());
        store.add(vec![0.7, 0.7], exp("near"), Utc::now());
        store.add(vec![0.0, 1.0], exp("orthogonal"), Utc::now());
        store.add(vec![1.0, 0.0, 0.0], exp("other dimension"), Utc::now());

        let hits = store.search(&[1.0, 0.0], 5, 0.4);
        let names: Vec<&str> = hits.iter().map(|e| e.situation.as_str()).collect();
        assert_eq!(names, vec!["same", "near"]);

        assert_eq!(store.search(&[1.0, 0.0], 1, 0.0).len(), 1);
    }

    #[test]
    fn test_identical_vector_ranks_first_with_full_similarity() {
        let mut store = VectorStore::default();
        store.add(vec![0.2, 0.9, 0.4], exp("near"), Utc::now());
        store.add(vec![0.3, 0.5, 0.8], exp("exact"), Utc::now());
        store.add(vec![0.9, 0.1, 0.0], exp("far"), Utc::now());

        let hits = store.search_scored(&[0.3, 0.5, 0.8], 3, 0.0);
        let (sim, top) = hits[0];
        assert_eq!(top.situation, "exact");
        assert!((sim - 1.0).abs() < 1e-5, "similarity was {sim}");
        assert!(hits.windows(2).all(|w| w[0].0 >= w[1].0));
    }

    #[test]
    fn test_dimension_mismatch_has_no_hits() {
        let mut store = VectorStore::default();
        store.add(vec![1.0, 0.0, 0.0], exp("three"), Utc::now());
        store.add(vec![0.0, 1.0, 0.0], exp("also three"), Utc::now());
        assert!(store.search_scored(&[1.0, 0.0], 5, -1.0).is_empty());
        assert!(store.search(&[1.0, 0.0], 5, -1.0).is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiences.json");
        let mut store = VectorStore::default();
        store.add(vec![0.5, 0.5], exp("desk"), Utc::now());
        VectorStore::save(&store.document(), &path).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(raw["entries"].is_array());

        let loaded = VectorStore::load(&path, 500);
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiences.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(VectorStore::load(&path, 500).is_empty());
    }
}
