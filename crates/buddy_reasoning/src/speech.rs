//! Speak, move, or stay quiet.
//!
//! Not every urge should become speech. Speech strategies are voiced with a
//! probability that rises with energy and arousal and drops with every
//! ignored utterance, so an ignored Buddy sulks into movement instead.

use buddy_core::{Strategy, StrategyKind};
use rand::Rng;
use serde::Serialize;
use std::fmt;

const MUMBLE_SPEECH_PROBABILITY: f64 = 0.35;
const SULK_PENALTY: f32 = 0.12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Speak,
    Physical,
    Silence,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Modality::Speak => "speak",
            Modality::Physical => "physical",
            Modality::Silence => "silence",
        })
    }
}

/// Probability that a speech strategy is actually voiced.
pub fn speech_probability(energy: f32, arousal: f32, ignored_streak: u32) -> f32 {
    let p = 0.65 + energy * 0.15 + arousal * 0.10 - ignored_streak as f32 * SULK_PENALTY;
    if p.is_finite() {
        p.clamp(0.15, 0.85)
    } else {
        0.65
    }
}

/// Turn a chosen strategy into a modality. `None` (an unrecognised
/// strategy) is always silence.
pub fn should_speak_or_physical<R: Rng + ?Sized>(
    strategy: Option<Strategy>,
    energy: f32,
    arousal: f32,
    ignored_streak: u32,
    rng: &mut R,
) -> Modality {
    let Some(strategy) = strategy else {
        return Modality::Silence;
    };

    let speak = match strategy.kind() {
        StrategyKind::Physical => return Modality::Physical,
        StrategyKind::Mumble => rng.gen_bool(MUMBLE_SPEECH_PROBABILITY),
        StrategyKind::Speech => {
            let p = speech_probability(energy, arousal, ignored_streak);
            rng.gen::<f32>() < p
        }
    };

    if speak {
        Modality::Speak
    } else {
        Modality::Physical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_physical_only_never_speaks() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(
                should_speak_or_physical(Some(Strategy::Fidgeting), 1.0, 1.0, 0, &mut rng),
                Modality::Physical
            );
        }
    }

    #[test]
    fn test_unknown_is_silence() {
        let mut rng = StdRng::seed_from_u64(7);
        let unknown = "juggle".parse::<Strategy>().ok();
        assert_eq!(should_speak_or_physical(unknown, 0.5, 0.5, 0, &mut rng), Modality::Silence);
    }

    #[test]
    fn test_mumble_is_mostly_physical() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 10_000;
        let spoken = (0..n)
            .filter(|_| {
                should_speak_or_physical(Some(Strategy::MusingToSelf), 1.0, 1.0, 0, &mut rng)
                    == Modality::Speak
            })
            .count();
        let rate = spoken as f32 / n as f32;
        assert!((0.32..0.38).contains(&rate), "rate {rate}");
    }

    #[test]
    fn test_probability_formula() {
        assert!((speech_probability(0.0, 0.0, 0) - 0.65).abs() < 1e-6);
        assert!((speech_probability(1.0, 1.0, 0) - 0.85).abs() < 1e-6);
        assert!((speech_probability(0.5, 0.5, 2) - (0.65 + 0.075 + 0.05 - 0.24)).abs() < 1e-6);
        assert_eq!(speech_probability(0.0, 0.0, 10), 0.15);
    }

    #[test]
    fn test_sulking_shifts_toward_physical() {
        let count = |streak: u32| {
            let mut rng = StdRng::seed_from_u64(3);
            (0..2_000)
                .filter(|_| {
                    should_speak_or_physical(Some(Strategy::DirectAddress), 0.5, 0.5, streak, &mut rng)
                        == Modality::Speak
                })
                .count()
        };
        assert!(count(4) < count(0));
    }
}
