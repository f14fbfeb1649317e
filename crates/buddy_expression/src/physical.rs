//! Physical expressions: movement instead of words.
//!
//! Each expression is a short scripted sequence over a few pose
//! placeholders. Placeholders resolve against the current pose:
//!
//! - nod_down = min(150, nod + nod_offset)
//! - nod_up = max(80, nod - nod_offset)
//! - base_away swings away from whichever side the head is on, within [10, 170]

use crate::command::{ActuatorCommand, CommandStep, Pose};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_NOD_OFFSET: i32 = 8;
const DEFAULT_BASE_AWAY_OFFSET: i32 = 30;
const MIN_EXPRESSION_GAP: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
enum BaseAt {
    Current,
    Away,
    Target,
    Fixed(i32),
}

#[derive(Debug, Clone, Copy)]
enum NodAt {
    Current,
    Down,
    Up,
    Target,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Look(BaseAt, NodAt, f32),
    Express(&'static str, f32),
    Wait(f32),
}

#[derive(Debug)]
pub struct ExpressionDef {
    pub name: &'static str,
    pub description: &'static str,
    pub mood: &'static str,
    nod_offset: i32,
    base_away_offset: i32,
    steps: &'static [Step],
}

use BaseAt as B;
use NodAt as N;
use Step::*;

pub static EXPRESSIONS: &[ExpressionDef] = &[
    ExpressionDef {
        name: "sigh",
        description: "A slight drop and settle, like deflating",
        mood: "deflated",
        nod_offset: 8,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Look(B::Current, N::Down, 0.8), Wait(1.0), Look(B::Current, N::Current, 0.6)],
    },
    ExpressionDef {
        name: "double_take",
        description: "Quick look away and straight back",
        mood: "surprised",
        nod_offset: DEFAULT_NOD_OFFSET,
        base_away_offset: 30,
        steps: &[
            Look(B::Away, N::Current, 0.2),
            Wait(0.3),
            Look(B::Current, N::Current, 0.15),
            Wait(0.5),
        ],
    },
    ExpressionDef {
        name: "pointed_look",
        description: "Turn toward something specific and hold",
        mood: "observant",
        nod_offset: DEFAULT_NOD_OFFSET,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Look(B::Target, N::Target, 0.5), Wait(2.0), Look(B::Current, N::Current, 0.4)],
    },
    ExpressionDef {
        name: "settle",
        description: "Sink deeper into rest",
        mood: "resigned",
        nod_offset: 12,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Look(B::Current, N::Down, 1.2), Wait(0.5)],
    },
    ExpressionDef {
        name: "expectant_look",
        description: "Face the person, lean in slightly, wait",
        mood: "expectant",
        nod_offset: 10,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Look(B::Fixed(90), N::Up, 0.4), Wait(2.5), Look(B::Fixed(90), N::Current, 0.3)],
    },
    ExpressionDef {
        name: "startled_glance",
        description: "Quick reactive jolt",
        mood: "startled",
        nod_offset: DEFAULT_NOD_OFFSET,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Express("startled", 0.0), Wait(0.8)],
    },
    ExpressionDef {
        name: "dismissive_turn",
        description: "Slow turn away: fine, whatever",
        mood: "dismissive",
        nod_offset: DEFAULT_NOD_OFFSET,
        base_away_offset: 40,
        steps: &[Look(B::Away, N::Current, 1.5), Wait(2.0)],
    },
    ExpressionDef {
        name: "curious_tilt",
        description: "Head tilt: hm, interesting",
        mood: "curious",
        nod_offset: DEFAULT_NOD_OFFSET,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Express("curious", 0.0), Wait(1.5)],
    },
    ExpressionDef {
        name: "restless_scan",
        description: "Slowly look around the room at anything else",
        mood: "disengaged",
        nod_offset: 10,
        base_away_offset: 35,
        steps: &[
            Look(B::Away, N::Current, 1.0),
            Wait(1.5),
            Look(B::Current, N::Up, 0.8),
            Wait(1.0),
            Look(B::Current, N::Current, 0.5),
        ],
    },
    ExpressionDef {
        name: "conspicuous_settle",
        description: "Settle in with obvious contentment",
        mood: "resigned",
        nod_offset: 15,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[
            Look(B::Current, N::Down, 0.6),
            Wait(0.5),
            Look(B::Current, N::Down, 0.3),
            Wait(2.0),
        ],
    },
    ExpressionDef {
        name: "fidgety_shift",
        description: "Small restless adjustments",
        mood: "restless",
        nod_offset: 5,
        base_away_offset: 15,
        steps: &[
            Look(B::Away, N::Current, 0.3),
            Wait(0.4),
            Look(B::Current, N::Down, 0.3),
            Wait(0.3),
            Look(B::Current, N::Current, 0.2),
            Wait(0.5),
        ],
    },
    ExpressionDef {
        name: "attention_ready",
        description: "A subtle perk-up: I see you looking",
        mood: "attentive",
        nod_offset: 5,
        base_away_offset: DEFAULT_BASE_AWAY_OFFSET,
        steps: &[Look(B::Fixed(90), N::Up, 0.3), Wait(0.4)],
    },
];

/// Candidates for an emotional context nobody mapped.
pub const FALLBACK_EXPRESSIONS: &[&str] = &["sigh", "settle", "curious_tilt"];

static BY_NAME: Lazy<HashMap<&'static str, &'static ExpressionDef>> =
    Lazy::new(|| EXPRESSIONS.iter().map(|e| (e.name, e)).collect());

static EMOTION_TO_EXPRESSION: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let table: [(&'static str, &'static [&'static str]); 14] = [
        ("lonely", &["sigh", "settle", "expectant_look"]),
        ("bored", &["sigh", "settle", "dismissive_turn"]),
        ("curious", &["double_take", "pointed_look", "curious_tilt"]),
        ("content", &["settle"]),
        ("anxious", &["startled_glance", "double_take"]),
        ("ignored", &["dismissive_turn", "sigh", "pointed_look"]),
        ("wanting_attention", &["expectant_look", "double_take", "curious_tilt"]),
        ("startled", &["startled_glance"]),
        ("playful", &["double_take", "curious_tilt"]),
        ("disengaged", &["dismissive_turn", "restless_scan", "conspicuous_settle"]),
        ("self_occupied", &["restless_scan", "curious_tilt", "fidgety_shift"]),
        ("resigned", &["conspicuous_settle", "sigh", "settle"]),
        ("reluctant", &["expectant_look", "curious_tilt"]),
        ("attentive", &["attention_ready"]),
    ];
    table.into_iter().collect()
});

impl ExpressionDef {
    pub fn lookup(name: &str) -> Option<&'static ExpressionDef> {
        BY_NAME.get(name).copied()
    }

    fn render(&self, pose: Pose, target: Option<Pose>) -> Vec<CommandStep> {
        let nod_down = (pose.nod + self.nod_offset).min(150);
        let nod_up = (pose.nod - self.nod_offset).max(80);
        let base_away = if pose.base > 90 {
            (pose.base - self.base_away_offset).max(10)
        } else {
            (pose.base + self.base_away_offset).min(170)
        };
        let target = target.unwrap_or(pose);

        self.steps
            .iter()
            .map(|step| match *step {
                Look(base, nod, delay) => {
                    let base = match base {
                        B::Current => pose.base,
                        B::Away => base_away,
                        B::Target => target.base,
                        B::Fixed(v) => v,
                    };
                    let nod = match nod {
                        N::Current => pose.nod,
                        N::Down => nod_down,
                        N::Up => nod_up,
                        N::Target => target.nod,
                    };
                    CommandStep::new(ActuatorCommand::look(base, nod), delay)
                }
                Express(name, delay) => CommandStep::new(ActuatorCommand::Express(name), delay),
                Wait(delay) => CommandStep::wait(delay),
            })
            .collect()
    }
}

/// Picks expressions, at most one per 15 s.
pub struct PhysicalExpressionManager {
    last_expression: Mutex<Option<Instant>>,
    min_gap: Duration,
}

impl Default for PhysicalExpressionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicalExpressionManager {
    pub fn new() -> Self {
        Self {
            last_expression: Mutex::new(None),
            min_gap: MIN_EXPRESSION_GAP,
        }
    }

    /// Random expression for `emotional_context`, or `None` while the gap
    /// since the previous one has not elapsed.
    pub fn select_expression<R: Rng + ?Sized>(&self, emotional_context: &str, rng: &mut R) -> Option<&'static str> {
        let now = Instant::now();
        let mut last = self.last_expression.lock().unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|t| now.duration_since(t) < self.min_gap) {
            return None;
        }

        let candidates = EMOTION_TO_EXPRESSION
            .get(emotional_context)
            .copied()
            .unwrap_or(FALLBACK_EXPRESSIONS);
        let choice = candidates.choose(rng).copied()?;
        *last = Some(now);
        tracing::debug!(context = emotional_context, expression = choice, "Physical expression selected");
        Some(choice)
    }

    /// Commands for a named expression; empty for an unknown name.
    /// `target` is only used by expressions that look at something.
    pub fn get_expression_commands(&self, name: &str, pose: Pose, target: Option<Pose>) -> Vec<CommandStep> {
        ExpressionDef::lookup(name)
            .map(|def| def.render(pose, target))
            .unwrap_or_default()
    }

    /// The "I see you" perk-up. Feedback, not narrative, so it ignores the gap.
    pub fn attention_ready_commands(&self, pose: Pose) -> Vec<CommandStep> {
        self.get_expression_commands("attention_ready", pose, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn strings(steps: &[CommandStep]) -> Vec<String> {
        steps.iter().map(|s| s.command.to_string()).collect()
    }

    #[test]
    fn test_sigh_commands() {
        let m = PhysicalExpressionManager::new();
        let steps = m.get_expression_commands("sigh", Pose::default(), None);
        assert_eq!(strings(&steps), vec!["LOOK:90,123", "wait", "LOOK:90,115"]);
        assert_eq!(steps[0].delay, 0.8);
    }

    #[test]
    fn test_pose_math() {
        let m = PhysicalExpressionManager::new();
        let first = |name: &str, pose: Pose| m.get_expression_commands(name, pose, None)[0].command.clone();

        // nod_down capped at 150, nod_up floored at 80
        assert_eq!(first("settle", Pose { base: 90, nod: 145 }), ActuatorCommand::look(90, 150));
        assert_eq!(first("expectant_look", Pose { base: 90, nod: 85 }), ActuatorCommand::look(90, 80));

        // base_away swings toward the far side
        assert_eq!(first("dismissive_turn", Pose { base: 40, nod: 115 }), ActuatorCommand::look(80, 115));
        assert_eq!(first("dismissive_turn", Pose { base: 140, nod: 115 }), ActuatorCommand::look(100, 115));
        assert_eq!(first("double_take", Pose { base: 90, nod: 115 }), ActuatorCommand::look(120, 115));
        assert_eq!(first("restless_scan", Pose { base: 160, nod: 115 }), ActuatorCommand::look(125, 115));
    }

    #[test]
    fn test_target_and_unknown() {
        let m = PhysicalExpressionManager::new();
        let steps = m.get_expression_commands("pointed_look", Pose::default(), Some(Pose { base: 30, nod: 100 }));
        assert_eq!(strings(&steps), vec!["LOOK:30,100", "wait", "LOOK:90,115"]);
        assert!(m.get_expression_commands("moonwalk", Pose::default(), None).is_empty());
    }

    #[test]
    fn test_emotion_table_names_exist() {
        for candidates in EMOTION_TO_EXPRESSION.values() {
            for name in candidates.iter() {
                assert!(ExpressionDef::lookup(name).is_some(), "{name}");
            }
        }
        for name in FALLBACK_EXPRESSIONS {
            assert!(ExpressionDef::lookup(name).is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gap_between_expressions() {
        let m = PhysicalExpressionManager::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(m.select_expression("attentive", &mut rng), Some("attention_ready"));
        assert_eq!(m.select_expression("attentive", &mut rng), None);
        tokio::time::advance(Duration::from_secs(14)).await;
        assert_eq!(m.select_expression("attentive", &mut rng), None);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(m.select_expression("attentive", &mut rng), Some("attention_ready"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmapped_context_uses_fallback() {
        let m = PhysicalExpressionManager::new();
        let mut rng = StdRng::seed_from_u64(9);
        let choice = m.select_expression("existential", &mut rng).unwrap();
        assert!(FALLBACK_EXPRESSIONS.contains(&choice));
    }

    #[test]
    fn test_attention_ready_bypasses_gap() {
        let m = PhysicalExpressionManager::new();
        let steps = m.attention_ready_commands(Pose::default());
        assert_eq!(strings(&steps), vec!["LOOK:90,110", "wait"]);
    }
}
