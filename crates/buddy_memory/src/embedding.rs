//! Text embeddings for episodic recall.
//!
//! Providers are tried in order and the first usable vector wins. The last
//! resort is a character n-gram hash embedding that cannot fail, so recall
//! degrades to "rough lexical similarity" instead of disappearing.
//!
//! Providers that run on the same model host as speech generation declare
//! it via [`EmbeddingProvider::uses_shared_resource`]; the chain then takes
//! the externally shared contention lock with a short timeout and moves on
//! to the next provider rather than stall a live conversation.

use anyhow::Result;
use async_trait::async_trait;
use buddy_core::config::EmbeddingConfig;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub type Embedding = Vec<f32>;

/// Ollama truncates long prompts anyway; keep requests small.
const MAX_PROMPT_CHARS: usize = 500;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// True when calls compete with speech generation for the same backend.
    fn uses_shared_resource(&self) -> bool {
        false
    }

    async fn embed(&self, text: &str) -> Result<Embedding>;
}

// ============================================================================
// Hash fallback
// ============================================================================

/// Deterministic bag-of-n-grams embedding, stable across restarts.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 64 }
    }
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn embed_text(&self, text: &str) -> Embedding {
        let mut vec = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();

        for word in lower.split_whitespace() {
            let chars: Vec<char> = word.chars().collect();
            let len = chars.len();
            // Trigrams for long words; short words fall back to their whole text.
            let min_n = len.min(3);
            for n in min_n..=3 {
                let starts = (len + 1).saturating_sub(n).max(1);
                for i in 0..starts {
                    let end = (i + n).min(len);
                    let gram: String = chars[i..end].iter().collect();
                    let bucket = fnv1a(gram.as_bytes()) as usize % self.dim;
                    vec[bucket] += 1.0;
                }
            }
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vec.iter_mut().for_each(|x| *x /= norm);
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.embed_text(text))
    }
}

fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in bytes {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

// ============================================================================
// Ollama
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding model {model} returned an empty vector")]
    EmptyVector { model: String },
}

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    fn uses_shared_resource(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        let prompt: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        let body: EmbeddingResponse = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&serde_json::json!({ "model": self.model, "prompt": prompt }))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(EmbeddingError::from)?
            .json()
            .await
            .map_err(EmbeddingError::from)?;
        if body.embedding.is_empty() {
            return Err(EmbeddingError::EmptyVector {
                model: self.model.clone(),
            }
            .into());
        }
        Ok(body.embedding)
    }
}

// ============================================================================
// Chain
// ============================================================================

struct Slot {
    provider: Arc<dyn EmbeddingProvider>,
    unavailable_until: Mutex<Option<Instant>>,
}

impl Slot {
    fn cooling_down(&self) -> bool {
        let until = self.unavailable_until.lock().unwrap_or_else(PoisonError::into_inner);
        until.is_some_and(|t| Instant::now() < t)
    }

    fn mark_unavailable(&self, retry_after: Duration) {
        *self.unavailable_until.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Instant::now() + retry_after);
    }
}

pub struct EmbeddingChain {
    slots: Vec<Slot>,
    fallback: HashEmbedder,
    contention: Option<Arc<tokio::sync::Mutex<()>>>,
    contention_timeout: Duration,
    retry_after: Duration,
}

impl EmbeddingChain {
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>, fallback: HashEmbedder) -> Self {
        Self {
            slots: providers
                .into_iter()
                .map(|provider| Slot {
                    provider,
                    unavailable_until: Mutex::new(None),
                })
                .collect(),
            fallback,
            contention: None,
            contention_timeout: Duration::from_secs(2),
            retry_after: Duration::from_secs(300),
        }
    }

    pub fn hash_only(dim: usize) -> Self {
        Self::new(Vec::new(), HashEmbedder::new(dim))
    }

    /// Build the chain described by config; an unbuildable HTTP client degrades to hash-only.
    pub fn from_config(config: &EmbeddingConfig, contention: Option<Arc<tokio::sync::Mutex<()>>>) -> Self {
        let mut providers: Vec<Arc<dyn EmbeddingProvider>> = Vec::new();
        if config.provider == "ollama" {
            match OllamaEmbedder::new(&config.base_url, &config.model, config.request_timeout()) {
                Ok(ollama) => providers.push(Arc::new(ollama)),
                Err(e) => tracing::warn!("Ollama embedder unavailable, using hash fallback: {:#}", e),
            }
        }
        let mut chain = Self::new(providers, HashEmbedder::new(config.hash_dimension))
            .with_retry_after(config.retry_after());
        if let Some(lock) = contention {
            chain = chain.with_contention_lock(lock, config.contention_timeout());
        }
        chain
    }

    pub fn with_contention_lock(mut self, lock: Arc<tokio::sync::Mutex<()>>, timeout: Duration) -> Self {
        self.contention = Some(lock);
        self.contention_timeout = timeout;
        self
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Embed `text`. `None` only for empty input; otherwise some provider
    /// (at worst the hash fallback) always answers.
    pub async fn embed(&self, text: &str) -> Option<Embedding> {
        if text.trim().is_empty() {
            return None;
        }

        for slot in &self.slots {
            let name = slot.provider.name();
            if slot.cooling_down() {
                continue;
            }

            let _guard = match (&self.contention, slot.provider.uses_shared_resource()) {
                (Some(lock), true) => match tokio::time::timeout(self.contention_timeout, lock.lock()).await {
                    Ok(guard) => Some(guard),
                    Err(_) => {
                        tracing::debug!(provider = name, "Shared model host busy, skipping provider");
                        continue;
                    }
                },
                _ => None,
            };

            match slot.provider.embed(text).await {
                Ok(v) if v.iter().all(|x| x.is_finite()) => return Some(v),
                Ok(_) => {
                    tracing::warn!(provider = name, "Provider returned non-finite embedding");
                    slot.mark_unavailable(self.retry_after);
                }
                Err(e) => {
                    tracing::info!(provider = name, "Embedding provider unavailable ({:#}), falling back", e);
                    slot.mark_unavailable(self.retry_after);
                }
            }
        }

        Some(self.fallback.embed_text(text))
    }
}

/// Cosine similarity, or `None` when the vectors are not comparable
/// (different dimensions, or empty).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Fixed {
        calls: AtomicUsize,
        shared: bool,
        fail: bool,
    }

    impl Fixed {
        fn new(shared: bool, fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                shared,
                fail,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn uses_shared_resource(&self) -> bool {
            self.shared
        }

        async fn embed(&self, _text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("offline");
            }
            Ok(vec![1.0; 8])
        }
    }

    #[test]
    fn test_hash_embedding_is_deterministic_and_normalized() {
        let h = HashEmbedder::default();
        let a = h.embed_text("The mug is on the desk");
        let b = h.embed_text("the MUG is on the desk");
        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedding_similarity_tracks_overlap() {
        let h = HashEmbedder::default();
        let base = h.embed_text("person ignored me at the desk again");
        let close = h.embed_text("person ignored me at the desk");
        let far = h.embed_text("sunny weather outside window");
        let sim_close = cosine_similarity(&base, &close).unwrap();
        let sim_far = cosine_similarity(&base, &far).unwrap();
        assert!(sim_close > sim_far);
    }

    #[test]
    fn test_short_words_still_hash() {
        let h = HashEmbedder::default();
        let v = h.embed_text("a ok");
        assert!(v.iter().any(|x| *x > 0.0));
    }

    #[test]
    fn test_cosine_rejects_mismatched_dimensions() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Some(0.0));
        let s = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]).unwrap();
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_chain_uses_first_working_provider() {
        let primary = Arc::new(Fixed::new(false, false));
        let chain = EmbeddingChain::new(vec![primary.clone()], HashEmbedder::default());
        assert_eq!(chain.embed("hello").await.unwrap().len(), 8);
        assert!(chain.embed("   ").await.is_none());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_provider_cools_down() {
        let broken = Arc::new(Fixed::new(false, true));
        let chain = EmbeddingChain::new(vec![broken.clone()], HashEmbedder::default())
            .with_retry_after(Duration::from_secs(60));
        assert_eq!(chain.embed("hello").await.unwrap().len(), 64);
        assert_eq!(chain.embed("hello").await.unwrap().len(), 64);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        chain.embed("hello").await;
        assert_eq!(broken.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_contended_resource_falls_back_to_hash() {
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        let shared = Arc::new(Fixed::new(true, false));
        let chain = EmbeddingChain::new(vec![shared.clone()], HashEmbedder::default())
            .with_contention_lock(lock.clone(), Duration::from_secs(2));

        // Speech generation holds the model host.
        let held = lock.lock().await;
        let v = chain.embed("are you there").await.unwrap();
        assert_eq!(v.len(), 64);
        assert_eq!(shared.calls.load(Ordering::SeqCst), 0);
        drop(held);

        assert_eq!(chain.embed("are you there").await.unwrap().len(), 8);
        assert_eq!(shared.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ollama_embedder_parses_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "embedding": [0.1, 0.2, 0.3] })),
            )
            .mount(&server)
            .await;

        let ollama = OllamaEmbedder::new(&server.uri(), "nomic-embed-text", Duration::from_secs(5)).unwrap();
        let v = ollama.embed("hello").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn test_ollama_error_degrades_to_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ollama = OllamaEmbedder::new(&server.uri(), "missing-model", Duration::from_secs(5)).unwrap();
        let chain = EmbeddingChain::new(vec![Arc::new(ollama)], HashEmbedder::new(32));
        assert_eq!(chain.embed("hello there").await.unwrap().len(), 32);
    }
}
