//! Intent types and the strategies that realise them.
//!
//! Both sets are closed: the behavior repertoire is a fixed, hand-authored
//! table. Strategies are classified once here as physical-only, speech, or
//! "mumble" (self-directed speech that is usually kept to a movement).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    GetAttention,
    ShareObservation,
    SeekComfort,
    Entertain,
    ProcessAloud,
    MaintainConnection,
    ExpressDispleasure,
    AcknowledgeReturn,
    Disengage,
    SelfOccupy,
    ReluctantReengage,
}

impl IntentType {
    pub const ALL: [IntentType; 11] = [
        IntentType::GetAttention,
        IntentType::ShareObservation,
        IntentType::SeekComfort,
        IntentType::Entertain,
        IntentType::ProcessAloud,
        IntentType::MaintainConnection,
        IntentType::ExpressDispleasure,
        IntentType::AcknowledgeReturn,
        IntentType::Disengage,
        IntentType::SelfOccupy,
        IntentType::ReluctantReengage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::GetAttention => "get_attention",
            IntentType::ShareObservation => "share_observation",
            IntentType::SeekComfort => "seek_comfort",
            IntentType::Entertain => "entertain",
            IntentType::ProcessAloud => "process_aloud",
            IntentType::MaintainConnection => "maintain_connection",
            IntentType::ExpressDispleasure => "express_displeasure",
            IntentType::AcknowledgeReturn => "acknowledge_return",
            IntentType::Disengage => "disengage",
            IntentType::SelfOccupy => "self_occupy",
            IntentType::ReluctantReengage => "reluctant_reengage",
        }
    }
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

/// How a strategy can be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Never spoken; always a movement.
    Physical,
    /// Spoken line, subject to the speak-probability model.
    Speech,
    /// Self-directed speech, voiced only occasionally.
    Mumble,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    // get_attention
    SubtleMovement,
    IndirectObservation,
    DirectAddress,
    DramaticExpression,
    CreativeAbsurd,
    // share_observation
    LookAtThing,
    CasualMention,
    InsistentMention,
    // seek_comfort
    SubtleWithdrawal,
    UnderstatedComment,
    IndirectPlea,
    VulnerableAdmission,
    // entertain
    PlayfulMovement,
    WittyObservation,
    InteractiveAttempt,
    // process_aloud
    InternalMusing,
    PhilosophicalTangent,
    // maintain_connection
    AmbientPresence,
    LowKeyComment,
    // express_displeasure
    PointedSilence,
    DryComment,
    DirectStatement,
    // acknowledge_return
    SarcasticGreeting,
    GrudgingEngagement,
    // disengage
    TheatricalResignation,
    PointedDisinterest,
    // self_occupy
    Fidgeting,
    MusingToSelf,
    PassiveCommentary,
    // reluctant_reengage
    TentativeGlance,
    GuardedRemark,
}

impl Strategy {
    pub const ALL: [Strategy; 31] = [
        Strategy::SubtleMovement,
        Strategy::IndirectObservation,
        Strategy::DirectAddress,
        Strategy::DramaticExpression,
        Strategy::CreativeAbsurd,
        Strategy::LookAtThing,
        Strategy::CasualMention,
        Strategy::InsistentMention,
        Strategy::SubtleWithdrawal,
        Strategy::UnderstatedComment,
        Strategy::IndirectPlea,
        Strategy::VulnerableAdmission,
        Strategy::PlayfulMovement,
        Strategy::WittyObservation,
        Strategy::InteractiveAttempt,
        Strategy::InternalMusing,
        Strategy::PhilosophicalTangent,
        Strategy::AmbientPresence,
        Strategy::LowKeyComment,
        Strategy::PointedSilence,
        Strategy::DryComment,
        Strategy::DirectStatement,
        Strategy::SarcasticGreeting,
        Strategy::GrudgingEngagement,
        Strategy::TheatricalResignation,
        Strategy::PointedDisinterest,
        Strategy::Fidgeting,
        Strategy::MusingToSelf,
        Strategy::PassiveCommentary,
        Strategy::TentativeGlance,
        Strategy::GuardedRemark,
    ];

    pub fn kind(&self) -> StrategyKind {
        use Strategy::*;
        match self {
            SubtleMovement | LookAtThing | SubtleWithdrawal | PlayfulMovement | AmbientPresence
            | PointedSilence | PointedDisinterest | Fidgeting | TentativeGlance => {
                StrategyKind::Physical
            }
            MusingToSelf | PassiveCommentary => StrategyKind::Mumble,
            _ => StrategyKind::Speech,
        }
    }

    pub fn is_physical_only(&self) -> bool {
        self.kind() == StrategyKind::Physical
    }

    pub fn as_str(&self) -> &'static str {
        use Strategy::*;
        match self {
            SubtleMovement => "subtle_movement",
            IndirectObservation => "indirect_observation",
            DirectAddress => "direct_address",
            DramaticExpression => "dramatic_expression",
            CreativeAbsurd => "creative_absurd",
            LookAtThing => "look_at_thing",
            CasualMention => "casual_mention",
            InsistentMention => "insistent_mention",
            SubtleWithdrawal => "subtle_withdrawal",
            UnderstatedComment => "understated_comment",
            IndirectPlea => "indirect_plea",
            VulnerableAdmission => "vulnerable_admission",
            PlayfulMovement => "playful_movement",
            WittyObservation => "witty_observation",
            InteractiveAttempt => "interactive_attempt",
            InternalMusing => "internal_musing",
            PhilosophicalTangent => "philosophical_tangent",
            AmbientPresence => "ambient_presence",
            LowKeyComment => "low_key_comment",
            PointedSilence => "pointed_silence",
            DryComment => "dry_comment",
            DirectStatement => "direct_statement",
            SarcasticGreeting => "sarcastic_greeting",
            GrudgingEngagement => "grudging_engagement",
            TheatricalResignation => "theatrical_resignation",
            PointedDisinterest => "pointed_disinterest",
            Fidgeting => "fidgeting",
            MusingToSelf => "musing_to_self",
            PassiveCommentary => "passive_commentary",
            TentativeGlance => "tentative_glance",
            GuardedRemark => "guarded_remark",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| UnknownName(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown behavior name: {0}")]
pub struct UnknownName(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_from_str() {
        for s in Strategy::ALL {
            assert_eq!(s.as_str().parse::<Strategy>().unwrap(), s);
        }
        for t in IntentType::ALL {
            assert_eq!(t.as_str().parse::<IntentType>().unwrap(), t);
        }
        assert!("shout_loudly".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&Strategy::MusingToSelf).unwrap();
        assert_eq!(json, "\"musing_to_self\"");
        let json = serde_json::to_string(&IntentType::ReluctantReengage).unwrap();
        assert_eq!(json, "\"reluctant_reengage\"");
    }

    #[test]
    fn test_classification() {
        assert_eq!(Strategy::SubtleMovement.kind(), StrategyKind::Physical);
        assert_eq!(Strategy::PassiveCommentary.kind(), StrategyKind::Mumble);
        assert_eq!(Strategy::DirectAddress.kind(), StrategyKind::Speech);
        let physical = Strategy::ALL.iter().filter(|s| s.is_physical_only()).count();
        assert_eq!(physical, 9);
    }
}
