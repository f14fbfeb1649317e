//! # Buddy Expression
//!
//! Turns decisions into movement. Nothing here talks to hardware: every
//! function returns an ordered list of [`CommandStep`]s for the actuator
//! collaborator to play back.

mod arc;
mod command;
mod physical;
mod timing;

pub use arc::{get_post_speech_arc, get_pre_speech_arc, get_resolution_arc};
pub use command::{ActuatorCommand, CommandStep, Direction, Pose};
pub use physical::{ExpressionDef, PhysicalExpressionManager, EXPRESSIONS, FALLBACK_EXPRESSIONS};
pub use timing::calculate_speech_delay;
