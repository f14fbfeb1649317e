//! Integration tests for ConsciousnessSubstrate
//!
//! Uses tempfile::TempDir for isolated state files and paused Tokio time
//! for the background worker.

use buddy_core::config::{PathsConfig, WorkerConfig};
use buddy_core::{IntentType, Outcome, Strategy};
use buddy_memory::{ConsciousnessSubstrate, EmbeddingChain, Experience};
use std::path::Path;
use std::time::Duration;

fn paths(dir: &Path) -> PathsConfig {
    PathsConfig {
        data_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn substrate_with(paths: PathsConfig, worker: WorkerConfig) -> ConsciousnessSubstrate {
    ConsciousnessSubstrate::new(EmbeddingChain::hash_only(64), paths, worker)
}

/// Test 1: the worker consolidates, and a save/load cycle restores everything
#[tokio::test(start_paused = true)]
async fn test_consolidate_save_and_reload() {
    let dir = tempfile::TempDir::new().unwrap();
    let sub = substrate_with(paths(dir.path()), WorkerConfig::default());

    sub.record_experience(
        Experience::new("person left the room", Outcome::Left).with_person("alice"),
    )
    .await;
    for _ in 0..3 {
        sub.record_experience(
            Experience::new("person at desk", Outcome::Smiled)
                .with_person("alice")
                .with_strategy(IntentType::GetAttention, Strategy::SubtleMovement),
        )
        .await;
    }

    sub.start();
    // First pass at 30 s finds everything too young; the next allowed pass
    // is 120 s later.
    tokio::time::sleep(Duration::from_secs(160)).await;
    sub.stop().await;

    let before = sub.status();
    assert_eq!(before.long_term_count, 1, "only the departure is significant");
    sub.save().unwrap();

    assert!(dir.path().join("consciousness_state.json").exists());
    assert!(dir.path().join("experience_memory.json").exists());

    let restored = substrate_with(paths(dir.path()), WorkerConfig::default());
    assert!(restored.load());
    let after = restored.status();
    assert_eq!(after.total_experiences, 4);
    assert_eq!(after.long_term_count, 1);
    assert_eq!(after.short_term_count, 0);
    assert_eq!(after.tracked_persons, 1);
    assert_eq!(after.known_persons, 1);
    assert!((after.somatic.baseline_trust - before.somatic.baseline_trust).abs() < 1e-6);
    assert!((after.resilience - before.resilience).abs() < 1e-6);
}

/// Test 2: corrupt documents are survivable
#[tokio::test(start_paused = true)]
async fn test_corrupt_state_starts_fresh() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("consciousness_state.json"), "{{ not json").unwrap();
    std::fs::write(dir.path().join("experience_memory.json"), "[1, 2").unwrap();

    let sub = substrate_with(paths(dir.path()), WorkerConfig::default());
    assert!(!sub.load());
    let status = sub.status();
    assert_eq!(status.total_experiences, 0);
    assert_eq!(status.long_term_count, 0);
    assert_eq!(status.somatic.baseline_trust, 0.5);
}

/// Test 3: out-of-range saved values are clamped on load
#[tokio::test(start_paused = true)]
async fn test_loaded_values_are_sanitized() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("consciousness_state.json"),
        r#"{
            "version": 1,
            "saved_at": "2024-05-01T12:00:00Z",
            "somatic": {"tension": 4.0, "warmth": -1.0, "restlessness": 0.5},
            "baseline": {"trust": 2.0, "openness": 0.01, "resilience": 0.5},
            "total_experiences": 12
        }"#,
    )
    .unwrap();

    let sub = substrate_with(paths(dir.path()), WorkerConfig::default());
    assert!(sub.load());
    let influence = sub.get_somatic_influence();
    assert_eq!(influence.tension, 1.0);
    assert_eq!(influence.warmth, 0.0);
    assert_eq!(influence.baseline_trust, 0.95);
    assert_eq!(influence.baseline_openness, 0.05);
    assert_eq!(sub.status().total_experiences, 12);
}

/// Test 4: a persistently failing worker backs off and recovers
#[tokio::test(start_paused = true)]
async fn test_worker_backoff_and_recovery() {
    let dir = tempfile::TempDir::new().unwrap();
    // A plain file where the data directory should be makes every save fail.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "").unwrap();

    let worker = WorkerConfig {
        save_interval_secs: 0,
        ..Default::default()
    };
    let sub = substrate_with(paths(&blocker), worker);
    sub.start();

    // Ten failed 30 s cycles.
    tokio::time::sleep(Duration::from_secs(305)).await;
    assert_eq!(sub.status().consecutive_errors, 10);

    // Now on the 300 s backoff cadence: nothing runs for a while.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(sub.status().consecutive_errors, 10);

    tokio::time::sleep(Duration::from_secs(240)).await;
    assert_eq!(sub.status().consecutive_errors, 11);

    std::fs::remove_file(&blocker).unwrap();
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(sub.status().consecutive_errors, 0);
    assert!(blocker.join("consciousness_state.json").exists());

    sub.stop().await;
}

/// Test 5: trust built up with a person makes Buddy more patient with them
#[tokio::test(start_paused = true)]
async fn test_attachment_shapes_bias() {
    let dir = tempfile::TempDir::new().unwrap();
    let sub = substrate_with(paths(dir.path()), WorkerConfig::default());

    // 0.5 + 14 * 0.015 = 0.71
    for _ in 0..14 {
        sub.record_experience(Experience::new("chatting", Outcome::Spoke).with_person("carol"))
            .await;
    }

    let bias = sub.get_behavioral_bias(None, Some("carol")).await;
    // Attachment plus lingering warmth.
    assert_eq!(bias.give_up_modifier, 2);
    assert!(bias.engagement_confidence > 0.7);
    let stranger = sub.get_behavioral_bias(None, Some("dave")).await;
    assert_eq!(stranger.give_up_modifier, 1);
}

/// Test 6: the worker writes both documents on its own save cadence
#[tokio::test(start_paused = true)]
async fn test_worker_saves_periodically() {
    let dir = tempfile::TempDir::new().unwrap();
    let worker = WorkerConfig {
        save_interval_secs: 60,
        ..Default::default()
    };
    let sub = substrate_with(paths(dir.path()), worker);
    sub.record_experience(Experience::new("quiet afternoon", Outcome::Looked)).await;
    sub.start();

    // The 30 s cycle is too early to save.
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert!(!dir.path().join("consciousness_state.json").exists());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(dir.path().join("consciousness_state.json").exists());
    assert!(dir.path().join("experience_memory.json").exists());
    assert_eq!(sub.status().consecutive_errors, 0);

    sub.stop().await;
}
