//! # Buddy Core
//!
//! Value types shared by every component of the decision core. Components
//! never hand each other references to their internal state; they exchange
//! the snapshot types defined here.

pub mod behavior;
pub mod config;
pub mod state;

pub use behavior::{IntentType, Strategy, StrategyKind};
pub use config::BuddyConfig;
pub use state::{
    AttentionLevel, NarrativeSignals, Outcome, Pattern, ResponseKind, StateVector,
};
