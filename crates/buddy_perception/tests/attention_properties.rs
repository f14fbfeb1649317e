//! Property tests for the attention detector's windowed facing time.

use buddy_perception::{AttentionConfig, AttentionDetector, AttentionState};
use proptest::prelude::*;
use std::time::Duration;

/// Reference model: facing credit over the trailing 3 s, both endpoints facing, capped at 1.2 s.
fn expected_facing_ms(samples: &[(u64, bool)], now_ms: u64) -> u64 {
    let window: Vec<&(u64, bool)> = samples
        .iter()
        .filter(|(t, _)| *t + 3000 >= now_ms)
        .collect();
    window
        .windows(2)
        .filter(|pair| pair[0].1 && pair[1].1)
        .map(|pair| (pair[1].0 - pair[0].0).min(1200))
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// ATTENTIVE iff the reference facing time reaches 1.5 s, except for the
    /// 500 ms hold after the last confirmation.
    #[test]
    fn attentive_matches_reference_model(
        steps in prop::collection::vec((10u64..700, prop::bool::weighted(0.8)), 1..80)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        rt.block_on(async {
            let detector = AttentionDetector::new(AttentionConfig::default());
            let mut samples: Vec<(u64, bool)> = Vec::new();
            let mut now_ms = 0u64;
            let mut last_confirmed: Option<u64> = None;

            for (gap, facing) in steps {
                tokio::time::advance(Duration::from_millis(gap)).await;
                now_ms += gap;
                samples.push((now_ms, facing));

                let state = detector.update(true, facing);
                let credit = expected_facing_ms(&samples, now_ms);

                if credit >= 1500 {
                    last_confirmed = Some(now_ms);
                    prop_assert_eq!(state, AttentionState::Attentive);
                } else if state == AttentionState::Attentive {
                    let held = last_confirmed.is_some_and(|t| now_ms - t < 500);
                    prop_assert!(held, "attentive at {}ms with only {}ms credit", now_ms, credit);
                } else {
                    prop_assert_eq!(state, AttentionState::Present);
                }
            }
            Ok(())
        })?;
    }
}
