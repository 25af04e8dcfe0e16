//! Closed classifier from call names to instruction kinds.

use std::fmt;

/// Kind of an extracted instruction.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstructionKind {
    /// Pivot until the gyro reads a heading.
    HeadingTurn,
    /// Drive while holding a heading until a distance or condition.
    HeadingFollow,
    /// Track a line edge on the colour sensor.
    LineFollow,
    /// Single motor, relative move in degrees.
    MotorRunForDegrees,
    /// Single motor, move to a position relative to the current one.
    MotorRunToPosition,
    /// Motor pair, steered move in degrees.
    PairMoveForDegrees,
    /// Anything not in the table.
    RawCall,
}

impl InstructionKind {
    /// Positional parameter names in call order.
    pub fn parameters(self) -> &'static [&'static str] {
        match self {
            InstructionKind::HeadingTurn => &["steering", "heading", "speed"],
            InstructionKind::HeadingFollow => &["heading", "gain", "speed", "distance", "condition"],
            InstructionKind::LineFollow => &["speed", "gain", "target", "lineside", "port", "distance", "condition"],
            InstructionKind::MotorRunForDegrees => &["port", "degrees", "velocity"],
            InstructionKind::MotorRunToPosition => &["port", "position", "velocity"],
            InstructionKind::PairMoveForDegrees => &["pair", "degrees", "steering"],
            InstructionKind::RawCall => &[],
        }
    }

    /// Name for positional argument `index`.
    pub fn parameter_name(self, index: usize) -> String {
        match self.parameters().get(index) {
            Some(name) => (*name).to_string(),
            None => format!("arg{index}"),
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstructionKind::HeadingTurn => "heading_turn",
            InstructionKind::HeadingFollow => "heading_follow",
            InstructionKind::LineFollow => "line_follow",
            InstructionKind::MotorRunForDegrees => "motor_run_for_degrees",
            InstructionKind::MotorRunToPosition => "motor_run_to_position",
            InstructionKind::PairMoveForDegrees => "pair_move_for_degrees",
            InstructionKind::RawCall => "raw_call",
        };
        f.write_str(s)
    }
}

/// Recognised call names. Short block names and the long helper names both map.
pub const KNOWN_CALLS: &[(&str, InstructionKind)] = &[
    ("gyro_follow", InstructionKind::HeadingFollow),
    ("gyro_follow_heading_gain_speed_distance_condition", InstructionKind::HeadingFollow),
    ("gyro_turn", InstructionKind::HeadingTurn),
    ("gyro_turn_steering_heading_speed", InstructionKind::HeadingTurn),
    ("line_follow", InstructionKind::LineFollow),
    ("line_follow_speed_gain_target_lineside_port", InstructionKind::LineFollow),
    ("motor.run_for_degrees", InstructionKind::MotorRunForDegrees),
    ("motor.run_to_relative_position", InstructionKind::MotorRunToPosition),
    ("motor_pair.move_for_degrees", InstructionKind::PairMoveForDegrees),
];

/// Classify a (possibly qualified) call name.
///
/// A table entry matches the whole name or a suffix starting at a `.`, so
/// `robot.gyro_turn` is a turn but `my_gyro_turn` is not.
pub fn classify(name: &str) -> InstructionKind {
    KNOWN_CALLS
        .iter()
        .find(|(known, _)| {
            name.strip_suffix(known)
                .is_some_and(|rest| rest.is_empty() || rest.ends_with('.'))
        })
        .map_or(InstructionKind::RawCall, |&(_, kind)| kind)
}
