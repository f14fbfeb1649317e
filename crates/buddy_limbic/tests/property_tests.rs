//! Property-based tests for the limbic layer's bounded state.

use buddy_core::Outcome;
use buddy_limbic::{EmotionalBaseline, SomaticState};
use proptest::prelude::*;

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Ignored),
        Just(Outcome::Looked),
        Just(Outcome::Smiled),
        Just(Outcome::Laughed),
        Just(Outcome::Spoke),
        Just(Outcome::Left),
    ]
}

proptest! {
    /// The attachment map never grows past 100 people, whatever the update order.
    #[test]
    fn attachment_map_is_capped(
        updates in prop::collection::vec((0u32..400, arb_outcome()), 1..1500)
    ) {
        let mut baseline = EmotionalBaseline::new();
        for (person, outcome) in updates {
            let id = format!("person-{person}");
            baseline.update_from_outcome(outcome, Some(&id));
            prop_assert!(baseline.known_persons() <= 100);
            // The person just updated is always still known.
            prop_assert!(baseline.knows(&id));
        }
    }

    /// Baseline parameters stay inside [0.05, 0.95].
    #[test]
    fn baseline_stays_bounded(outcomes in prop::collection::vec(arb_outcome(), 0..2000)) {
        let mut baseline = EmotionalBaseline::new();
        for outcome in outcomes {
            baseline.update_from_outcome(outcome, Some("someone"));
        }
        for v in [baseline.trust, baseline.openness, baseline.resilience, baseline.attachment("someone")] {
            prop_assert!((0.05..=0.95).contains(&v), "out of range: {}", v);
        }
    }

    /// Somatic variables stay inside [0, 1].
    #[test]
    fn somatic_stays_in_unit_range(outcomes in prop::collection::vec(arb_outcome(), 0..300)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        rt.block_on(async {
            let mut s = SomaticState::new();
            for outcome in outcomes {
                s.update_from_outcome(outcome);
                for v in [s.tension, s.warmth, s.restlessness] {
                    prop_assert!((0.0..=1.0).contains(&v));
                }
            }
            Ok(())
        })?;
    }
}
