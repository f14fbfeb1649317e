//! The speech performance arc: the movement around an utterance that makes
//! it look like a creature deciding to talk rather than audio coming out of
//! a box.
//!
//! 1. intention: orient, lean in, pause for the weight of what is coming
//! 2. delivery: owned by the actuator while the line plays
//! 3. watching: hold attention, or settle back when no answer is expected
//! 4. resolution: react to how the person responded

use crate::command::{ActuatorCommand, CommandStep, Direction};
use buddy_core::{Outcome, Strategy};
use rand::Rng;

/// Slightly forward of the 115 rest nod.
const LEAN_NOD: i32 = 108;

fn pause_range(arousal: f32, valence: f32, strategy: Option<Strategy>) -> (f32, f32) {
    match strategy {
        Some(Strategy::DramaticExpression | Strategy::VulnerableAdmission | Strategy::DirectStatement) => (1.5, 3.0),
        Some(Strategy::CreativeAbsurd | Strategy::WittyObservation) => (0.3, 0.8),
        _ if arousal > 0.7 => (0.1, 0.3),
        _ if valence < -0.3 => (0.8, 2.0),
        _ => (0.2, 0.8),
    }
}

pub fn get_pre_speech_arc<R: Rng + ?Sized>(
    arousal: f32,
    valence: f32,
    strategy: Option<Strategy>,
    rng: &mut R,
) -> Vec<CommandStep> {
    let (lo, hi) = pause_range(arousal, valence, strategy);
    vec![
        CommandStep::new(ActuatorCommand::Attention(Direction::Center), 0.3),
        CommandStep::new(ActuatorCommand::look(90, LEAN_NOD), 0.2),
        CommandStep::wait(rng.gen_range(lo..=hi)),
    ]
}

pub fn get_post_speech_arc(response_expected: bool) -> Vec<CommandStep> {
    if response_expected {
        vec![
            CommandStep::new(ActuatorCommand::look(90, LEAN_NOD), 0.3),
            CommandStep::wait(2.0),
        ]
    } else {
        vec![CommandStep::new(ActuatorCommand::look(90, 115), 0.5), CommandStep::wait(0.5)]
    }
}

pub fn get_resolution_arc(outcome: Outcome) -> Vec<CommandStep> {
    match outcome {
        Outcome::Smiled | Outcome::Laughed => {
            vec![CommandStep::new(ActuatorCommand::Acknowledge, 0.0), CommandStep::wait(0.5)]
        }
        Outcome::Spoke | Outcome::Looked => {
            vec![CommandStep::new(ActuatorCommand::look(90, 115), 0.3), CommandStep::wait(0.3)]
        }
        // Visible deflation
        Outcome::Ignored => vec![
            CommandStep::new(ActuatorCommand::look(90, 125), 0.8),
            CommandStep::wait(0.5),
            CommandStep::new(ActuatorCommand::look(90, 118), 0.4),
        ],
        // Follow them out, then drift back
        Outcome::Left => vec![
            CommandStep::new(ActuatorCommand::Attention(Direction::Left), 0.5),
            CommandStep::wait(1.5),
            CommandStep::new(ActuatorCommand::Attention(Direction::Center), 0.8),
        ],
    }
}
