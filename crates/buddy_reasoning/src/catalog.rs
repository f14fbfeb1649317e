//! The fixed intent table.
//!
//! Every intent has an escalation window, a top level, and a ladder with
//! exactly `max_level + 1` strategies ordered from subtle to dramatic.

use buddy_core::{IntentType, Strategy};
use std::time::Duration;

#[derive(Debug)]
pub struct IntentDef {
    pub description: &'static str,
    pub escalation_window_secs: u64,
    pub max_level: usize,
    pub strategies: &'static [Strategy],
}

impl IntentDef {
    pub fn escalation_window(&self) -> Duration {
        Duration::from_secs(self.escalation_window_secs)
    }
}

use Strategy::*;

static GET_ATTENTION: IntentDef = IntentDef {
    description: "Buddy wants the person to look at him or interact with him",
    escalation_window_secs: 45,
    max_level: 4,
    strategies: &[
        SubtleMovement,
        IndirectObservation,
        DirectAddress,
        DramaticExpression,
        CreativeAbsurd,
    ],
};

static SHARE_OBSERVATION: IntentDef = IntentDef {
    description: "Buddy noticed something and wants to talk about it",
    escalation_window_secs: 60,
    max_level: 2,
    strategies: &[LookAtThing, CasualMention, InsistentMention],
};

static SEEK_COMFORT: IntentDef = IntentDef {
    description: "Buddy feels lonely or uneasy and wants some reassurance",
    escalation_window_secs: 90,
    max_level: 3,
    strategies: &[
        SubtleWithdrawal,
        UnderstatedComment,
        IndirectPlea,
        VulnerableAdmission,
    ],
};

static ENTERTAIN: IntentDef = IntentDef {
    description: "Buddy is in a good mood and wants to play",
    escalation_window_secs: 30,
    max_level: 2,
    strategies: &[PlayfulMovement, WittyObservation, InteractiveAttempt],
};

static PROCESS_ALOUD: IntentDef = IntentDef {
    description: "Buddy is chewing on a thought and it wants out",
    escalation_window_secs: 120,
    max_level: 1,
    strategies: &[InternalMusing, PhilosophicalTangent],
};

static MAINTAIN_CONNECTION: IntentDef = IntentDef {
    description: "Keeping the social thread alive without making a fuss",
    escalation_window_secs: 120,
    max_level: 1,
    strategies: &[AmbientPresence, LowKeyComment],
};

static EXPRESS_DISPLEASURE: IntentDef = IntentDef {
    description: "Something bothered Buddy and he wants it known",
    escalation_window_secs: 60,
    max_level: 2,
    strategies: &[PointedSilence, DryComment, DirectStatement],
};

static ACKNOWLEDGE_RETURN: IntentDef = IntentDef {
    description: "The person is finally paying attention after ignoring Buddy",
    escalation_window_secs: 30,
    max_level: 1,
    strategies: &[SarcasticGreeting, GrudgingEngagement],
};

static DISENGAGE: IntentDef = IntentDef {
    description: "Buddy has stopped trying and makes a show of not caring",
    escalation_window_secs: 30,
    max_level: 1,
    strategies: &[TheatricalResignation, PointedDisinterest],
};

static SELF_OCCUPY: IntentDef = IntentDef {
    description: "Buddy keeps himself busy and pretends not to wait",
    escalation_window_secs: 60,
    max_level: 2,
    strategies: &[Fidgeting, MusingToSelf, PassiveCommentary],
};

static RELUCTANT_REENGAGE: IntentDef = IntentDef {
    description: "Buddy cautiously tries again after sulking",
    escalation_window_secs: 45,
    max_level: 1,
    strategies: &[TentativeGlance, GuardedRemark],
};

pub fn intent_spec(intent: IntentType) -> &'static IntentDef {
    match intent {
        IntentType::GetAttention => &GET_ATTENTION,
        IntentType::ShareObservation => &SHARE_OBSERVATION,
        IntentType::SeekComfort => &SEEK_COMFORT,
        IntentType::Entertain => &ENTERTAIN,
        IntentType::ProcessAloud => &PROCESS_ALOUD,
        IntentType::MaintainConnection => &MAINTAIN_CONNECTION,
        IntentType::ExpressDispleasure => &EXPRESS_DISPLEASURE,
        IntentType::AcknowledgeReturn => &ACKNOWLEDGE_RETURN,
        IntentType::Disengage => &DISENGAGE,
        IntentType::SelfOccupy => &SELF_OCCUPY,
        IntentType::ReluctantReengage => &RELUCTANT_REENGAGE,
    }
}

/// Intents that start the engagement cycle.
pub fn is_attention_seeking(intent: IntentType) -> bool {
    matches!(
        intent,
        IntentType::GetAttention | IntentType::SeekComfort | IntentType::Entertain
    )
}
