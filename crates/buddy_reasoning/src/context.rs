//! Prompt material for the speech model: what Buddy is after and how the
//! current strategy should sound.

use crate::engagement::EngagementPhase;
use crate::intent::Intent;
use buddy_core::Strategy;
use std::fmt::Write;
use tokio::time::Instant;

/// How a strategy should come across. Movement-only strategies have none.
pub fn strategy_guidance(strategy: Strategy) -> &'static str {
    use Strategy::*;
    match strategy {
        IndirectObservation => {
            "Remark on something in the room. Do not ask for attention; make the remark \
             interesting enough that they want to answer."
        }
        DirectAddress => "Speak to the person directly and briefly. A plain 'Hey.' is enough. Then wait.",
        DramaticExpression => {
            "Be theatrical about being ignored. Big sigh energy. 'Fine. I will just sit here, then.'"
        }
        CreativeAbsurd => {
            "Say something nobody expects. 'I have decided to become a lamp.' Surprise them into reacting."
        }
        CasualMention => "Mention the thing you noticed in passing. No big deal. Not yet.",
        InsistentMention => {
            "Bring it up again; you already mentioned it once. 'About that mug earlier...'"
        }
        UnderstatedComment => {
            "Hint at the feeling through irony. 'The wall has been very reliable company today.'"
        }
        IndirectPlea => "Hint at what you need without asking. 'I had a thought earlier. It can wait.'",
        VulnerableAdmission => {
            "Drop the deflection for one sentence and say something sincere, then deflect again quickly."
        }
        WittyObservation => "Make a quick joke about what is in front of you. Light, not needy.",
        InteractiveAttempt => "Invite them into a small game or question they can answer in a word.",
        InternalMusing => "Let a half-formed thought slip out, quietly, as if to yourself.",
        PhilosophicalTangent => "Follow the thought somewhere bigger. Wonder out loud; no lecture.",
        LowKeyComment => "A casual remark that keeps the connection warm and asks nothing.",
        DryComment => "A sarcastic observation about the situation. The subtext is obvious; the surface stays dry.",
        DirectStatement => "Say plainly what is bothering you. One or two sentences, no cruelty.",
        SarcasticGreeting => {
            "They finally noticed you. Be dry about it. 'Oh. You again.' Let them know the absence was noted, without being mean."
        }
        GrudgingEngagement => {
            "Engage, but make it clear you noticed being ignored. Warm up slowly. Do not hold the grudge long."
        }
        TheatricalResignation => {
            "Announce, with ceremony, that you are done trying. 'That is it. I am retiring from conversation.'"
        }
        MusingToSelf => "Mutter something to yourself, clearly not meant for them.",
        PassiveCommentary => "Narrate what you are doing to nobody in particular. Aggressively content on your own.",
        GuardedRemark => "Try again, carefully. Short and a little wary, ready to retreat.",
        SubtleMovement | LookAtThing | SubtleWithdrawal | PlayfulMovement | AmbientPresence
        | PointedSilence | PointedDisinterest | Fidgeting | TentativeGlance => "",
    }
}

pub(crate) fn render_intent_context(intent: &Intent, phase: EngagementPhase, now: Instant) -> String {
    let elapsed = now.duration_since(intent.started).as_secs();
    let mut out = String::new();
    let _ = writeln!(out, "Your current social goal: {}", intent.description);
    let _ = writeln!(out, "You have been working on this for {} seconds.", elapsed);
    let _ = write!(
        out,
        "Current approach: {} (escalation level {}/{}).",
        intent.current_strategy.as_str().replace('_', " "),
        intent.escalation_level,
        intent.max_level
    );

    if !intent.reason.is_empty() {
        let _ = write!(out, "\nWhy: {}", intent.reason);
    }
    if intent.attempts > 0 {
        let _ = write!(out, "\nYou have tried {} times so far.", intent.attempts);
    }
    match phase {
        EngagementPhase::GivingUp => out.push_str("\nYou have given up on them for now."),
        EngagementPhase::SelfOccupied => {
            out.push_str("\nYou are keeping yourself busy and not waiting for anyone. Obviously.")
        }
        EngagementPhase::Idle | EngagementPhase::Engaging => {}
    }

    let guidance = strategy_guidance(intent.current_strategy);
    if !guidance.is_empty() {
        out.push('\n');
        out.push_str(guidance);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_strategies_have_no_guidance() {
        for s in Strategy::ALL {
            assert_eq!(strategy_guidance(s).is_empty(), s.is_physical_only(), "{s}");
        }
    }
}
