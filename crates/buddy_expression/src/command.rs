use serde::{Serialize, Serializer};
use std::fmt;

/// Head pose in servo degrees. `nod` grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pose {
    pub base: i32,
    pub nod: i32,
}

impl Default for Pose {
    fn default() -> Self {
        Self { base: 90, nod: 115 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Center,
    Left,
    Right,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Center => "center",
            Direction::Left => "left",
            Direction::Right => "right",
        })
    }
}

/// One actuator instruction. `Display` gives the string form the actuator
/// collaborator consumes, e.g. `LOOK:90,115`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCommand {
    Look { base: i32, nod: i32 },
    Express(&'static str),
    Attention(Direction),
    Acknowledge,
    Wait,
}

impl ActuatorCommand {
    pub fn look(base: i32, nod: i32) -> Self {
        ActuatorCommand::Look { base, nod }
    }
}

impl fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorCommand::Look { base, nod } => write!(f, "LOOK:{},{}", base, nod),
            ActuatorCommand::Express(name) => write!(f, "EXPRESS:{}", name),
            ActuatorCommand::Attention(dir) => write!(f, "ATTENTION:{}", dir),
            ActuatorCommand::Acknowledge => f.write_str("ACKNOWLEDGE"),
            ActuatorCommand::Wait => f.write_str("wait"),
        }
    }
}

fn as_display<S: Serializer>(cmd: &ActuatorCommand, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(cmd)
}

/// A command and the seconds it takes (for `wait`, the pause itself).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandStep {
    #[serde(serialize_with = "as_display")]
    pub command: ActuatorCommand,
    pub delay: f32,
}

impl CommandStep {
    pub fn new(command: ActuatorCommand, delay: f32) -> Self {
        Self { command, delay }
    }

    pub fn wait(delay: f32) -> Self {
        Self::new(ActuatorCommand::Wait, delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_forms() {
        assert_eq!(ActuatorCommand::look(90, 108).to_string(), "LOOK:90,108");
        assert_eq!(ActuatorCommand::Express("curious").to_string(), "EXPRESS:curious");
        assert_eq!(ActuatorCommand::Attention(Direction::Left).to_string(), "ATTENTION:left");
        assert_eq!(ActuatorCommand::Acknowledge.to_string(), "ACKNOWLEDGE");
        assert_eq!(ActuatorCommand::Wait.to_string(), "wait");
    }

    #[test]
    fn test_step_serializes_command_as_string() {
        let json = serde_json::to_value(CommandStep::new(ActuatorCommand::look(90, 125), 0.8)).unwrap();
        assert_eq!(json["command"], "LOOK:90,125");
        assert!((json["delay"].as_f64().unwrap() - 0.8).abs() < 1e-6);
    }
}
