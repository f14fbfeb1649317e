//! Property-based tests for buddy_reasoning.
//!
//! Verifies that speech probability and bias scaling stay in range for any
//! input, and that the selection ladder never produces intents reserved for
//! the engagement cycle.

use buddy_core::{IntentType, NarrativeSignals, Pattern, StateVector, Strategy as BuddyStrategy};
use buddy_reasoning::intent::choose_intent;
use buddy_reasoning::speech::speech_probability;
use buddy_reasoning::{should_speak_or_physical, EngagementPhase, IntentBias, Modality};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn pattern_strategy() -> impl Strategy<Value = Pattern> {
    prop_oneof![
        Just(Pattern::Unknown),
        Just(Pattern::Present),
        Just(Pattern::JustLeft),
        Just(Pattern::Absent),
        Just(Pattern::MostlyIgnoring),
        Just(Pattern::Distracted),
        Just(Pattern::Engaging),
    ]
}

fn phase_strategy() -> impl Strategy<Value = EngagementPhase> {
    prop_oneof![
        Just(EngagementPhase::Idle),
        Just(EngagementPhase::Engaging),
        Just(EngagementPhase::GivingUp),
        Just(EngagementPhase::SelfOccupied),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Speech probability is always a usable probability.
    #[test]
    fn speech_probability_bounded(
        energy in -10.0f32..10.0,
        arousal in -10.0f32..10.0,
        streak in 0u32..1000,
    ) {
        let p = speech_probability(energy, arousal, streak);
        prop_assert!((0.15..=0.85).contains(&p), "p = {}", p);
    }

    /// Physical-only strategies never become speech, whatever the rng says.
    #[test]
    fn physical_strategies_stay_physical(
        idx in 0usize..BuddyStrategy::ALL.len(),
        seed in any::<u64>(),
        energy in 0.0f32..1.0,
        arousal in 0.0f32..1.0,
    ) {
        let strategy = BuddyStrategy::ALL[idx];
        let mut rng = StdRng::seed_from_u64(seed);
        let m = should_speak_or_physical(Some(strategy), energy, arousal, 0, &mut rng);
        prop_assert_ne!(m, Modality::Silence);
        if strategy.is_physical_only() {
            prop_assert_eq!(m, Modality::Physical);
        }
    }

    /// The biased window stays within [base/4, base*4] and the give-up wait
    /// never drops below half a window.
    #[test]
    fn bias_scaling_bounded(
        multiplier in prop_oneof![Just(f32::NAN), Just(f32::INFINITY), Just(0.0f32), -5.0f32..10.0],
        modifier in -20i32..20,
        base_secs in 1u64..600,
    ) {
        let bias = IntentBias { escalation_multiplier: multiplier, give_up_modifier: modifier };
        let base = Duration::from_secs(base_secs);
        let window = bias.window(base);
        prop_assert!(window >= base.div_f32(4.0).saturating_sub(Duration::from_millis(1)));
        prop_assert!(window <= base.mul_f32(4.0) + Duration::from_millis(1));
        let wait = bias.give_up_wait(window);
        prop_assert!(wait + Duration::from_millis(1) >= window / 2);
    }

    /// The priority ladder only ever offers intents a caller may start.
    #[test]
    fn ladder_never_offers_cycle_intents(
        social in 0.0f32..1.0,
        stimulation in 0.0f32..1.0,
        energy in 0.0f32..1.0,
        valence in -1.0f32..1.0,
        arousal in 0.0f32..1.0,
        wondering in any::<bool>(),
        present in any::<bool>(),
        streak in 0u32..10,
        pattern in pattern_strategy(),
        phase in phase_strategy(),
    ) {
        let state = StateVector { social, stimulation, energy, valence, arousal, wondering };
        let signals = NarrativeSignals {
            person_present: present,
            ignored_streak: streak,
            pattern,
            ..Default::default()
        };
        if let Some(intent) = choose_intent(&state, &signals, phase) {
            prop_assert!(!matches!(
                intent,
                IntentType::Disengage | IntentType::SelfOccupy | IntentType::ReluctantReengage
            ));
            if !present {
                prop_assert!(matches!(
                    intent,
                    IntentType::SeekComfort | IntentType::ProcessAloud | IntentType::ShareObservation
                ));
            }
        }
    }
}
