//! # Buddy Memory
//!
//! Two kinds of memory live here:
//!
//! - [`NarrativeEngine`]: the running social story of this session: what
//!   Buddy said, whether anyone answered, open conversational threads,
//!   objects on the desk, and how the person tends to respond
//! - [`ConsciousnessSubstrate`]: experience that outlives a conversation:
//!   somatic state, baseline personality drift, per-person expectations and
//!   an episodic store with vector recall
//!
//! ## Lock discipline
//!
//! Each component guards its state with one mutex. Embeddings and disk I/O
//! happen with that mutex released; callers receive owned snapshots.

pub mod consolidation;
pub mod embedding;
pub mod experience;
pub mod narrative;
pub mod persist;
pub mod substrate;
pub mod vector_store;

pub use embedding::{cosine_similarity, EmbeddingChain, EmbeddingError, EmbeddingProvider, HashEmbedder, OllamaEmbedder};
pub use experience::{Experience, ExperienceEntry};
pub use narrative::{NarrativeEngine, PersonProfile, ResponseStatus, UtteranceRecord};
pub use persist::PersistError;
pub use substrate::{BehavioralBias, ConsciousnessSubstrate, SomaticInfluence, SubstrateStatus};
pub use vector_store::VectorStore;
