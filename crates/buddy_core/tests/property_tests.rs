//! Property-based tests for buddy_core value types.

use buddy_core::StateVector;
use proptest::prelude::*;

fn arb_f32() -> impl Strategy<Value = f32> {
    prop_oneof![
        -10.0f32..10.0,
        Just(f32::NAN),
        Just(f32::INFINITY),
        Just(f32::NEG_INFINITY),
    ]
}

proptest! {
    /// Normalizing any state vector yields finite values inside their legal ranges.
    #[test]
    fn normalized_state_is_in_range(
        social in arb_f32(),
        stimulation in arb_f32(),
        energy in arb_f32(),
        valence in arb_f32(),
        arousal in arb_f32(),
        wondering in any::<bool>(),
    ) {
        let s = StateVector { social, stimulation, energy, valence, arousal, wondering }.normalized();
        for v in [s.social, s.stimulation, s.energy, s.arousal] {
            prop_assert!(v.is_finite());
            prop_assert!((0.0..=1.0).contains(&v));
        }
        prop_assert!((-1.0..=1.0).contains(&s.valence));
        prop_assert_eq!(s.wondering, wondering);
    }

    /// Normalization is idempotent.
    #[test]
    fn normalize_is_idempotent(social in arb_f32(), valence in arb_f32()) {
        let once = StateVector { social, valence, ..Default::default() }.normalized();
        let twice = once.normalized();
        prop_assert_eq!(once, twice);
    }
}
