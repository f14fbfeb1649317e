//! How long Buddy waits before speaking. Quick for a direct address,
//! slower for heavy or muttered lines, and slower still the longer it has
//! been ignored.

use buddy_core::Strategy;
use rand::Rng;

const MIN_DELAY: f32 = 3.0;
const MAX_DELAY: f32 = 90.0;

fn base_range(strategy: Option<Strategy>) -> (f32, f32) {
    use Strategy::*;
    match strategy {
        Some(DirectAddress) => (2.0, 10.0),
        Some(DramaticExpression | CreativeAbsurd) => (8.0, 25.0),
        Some(VulnerableAdmission) => (15.0, 45.0),
        // Long gaps make the fidget, fidget, mumble rhythm
        Some(MusingToSelf | PassiveCommentary) => (20.0, 60.0),
        Some(TheatricalResignation | PointedDisinterest) => (5.0, 15.0),
        _ => (10.0, 40.0),
    }
}

/// Seconds to wait between deciding to speak and speaking. Arousal
/// shortens the wait; being ignored stretches it, up to 3x.
pub fn calculate_speech_delay<R: Rng + ?Sized>(
    arousal: f32,
    strategy: Option<Strategy>,
    ignored_streak: u32,
    rng: &mut R,
) -> f32 {
    let (lo, hi) = base_range(strategy);
    let base = rng.gen_range(lo..=hi);
    let arousal = if arousal.is_finite() { arousal.clamp(0.0, 1.0) } else { 0.0 };
    let arousal_factor = 1.0 - arousal * 0.4;
    let ignore_factor = (1.0 + ignored_streak as f32 * 0.25).min(3.0);
    (base * arousal_factor * ignore_factor).clamp(MIN_DELAY, MAX_DELAY)
}
