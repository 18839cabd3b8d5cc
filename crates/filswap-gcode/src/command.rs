//! Machine command vocabulary
//!
//! The small, fixed set of commands the filament change sequence emits.
//! Each command renders with its arguments in the fixed order
//! `G M T S P F X Y Z E`, single spaces between tokens, and numbers in their
//! shortest form.

use std::fmt;

/// Decimal places kept when rendering numbers
const PRECISION: i32 = 5;

/// Render a number the way firmware expects it: no exponent, no trailing zeros
pub fn format_number(value: f64) -> String {
    let multiplier = 10_f64.powi(PRECISION);
    let rounded = (value * multiplier).round() / multiplier;
    if rounded == 0.0 {
        // Covers -0.0 as well
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}

/// Linear move (`G1`). Only the axes that are set are written.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Move {
    pub f: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub e: Option<f64>,
}

impl Move {
    /// Extruder-only move
    pub fn extrude(e: f64, feed: f64) -> Self {
        Self {
            f: Some(feed),
            e: Some(e),
            ..Self::default()
        }
    }

    /// XY travel
    pub fn xy(x: f64, y: f64, feed: f64) -> Self {
        Self {
            f: Some(feed),
            x: Some(x),
            y: Some(y),
            ..Self::default()
        }
    }

    /// Z-only move
    pub fn z(z: f64, feed: f64) -> Self {
        Self {
            f: Some(feed),
            z: Some(z),
            ..Self::default()
        }
    }

    /// Feed rate change without motion
    pub fn feed(f: f64) -> Self {
        Self {
            f: Some(f),
            ..Self::default()
        }
    }
}

/// A single machine instruction
#[derive(Debug, Clone, PartialEq)]
pub enum MachineCommand {
    /// `;text` comment line
    Comment(String),
    /// `G1` linear move
    Move(Move),
    /// `G4 P<ms>` dwell
    Dwell { millis: u32 },
    /// `G92 E<e>` reset the extruder position
    SetExtruderPosition(f64),
    /// `M0` unconditional stop until the operator resumes
    Pause,
    /// `M17 E` / `M18 E` extruder motor on/off
    ExtruderMotor { enabled: bool },
    /// `M18 S<s>` stepper disarm timeout
    DisarmTimeout { seconds: u32 },
    /// `M82` absolute extrusion
    AbsoluteExtrusion,
    /// `M83` relative extrusion
    RelativeExtrusion,
    /// `M104 S<t>` set hotend temperature
    SetTemperature(f64),
    /// `M109 S<t>` set hotend temperature and wait
    WaitTemperature(f64),
    /// `M117 <text>` display message
    DisplayMessage(String),
    /// `M211 S1` / `M211 S0` software endstops on/off
    SoftEndstops { enabled: bool },
    /// `M300` beep
    Beep,
    /// `M400` finish buffered moves
    FinishMoves,
}

impl fmt::Display for MachineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comment(text) => write!(f, ";{}", text),
            Self::Move(mv) => {
                write!(f, "G1")?;
                let axes = [('F', mv.f), ('X', mv.x), ('Y', mv.y), ('Z', mv.z), ('E', mv.e)];
                for (letter, value) in axes {
                    if let Some(value) = value {
                        write!(f, " {}{}", letter, format_number(value))?;
                    }
                }
                Ok(())
            }
            Self::Dwell { millis } => write!(f, "G4 P{}", millis),
            Self::SetExtruderPosition(e) => write!(f, "G92 E{}", format_number(*e)),
            Self::Pause => write!(f, "M0"),
            Self::ExtruderMotor { enabled: true } => write!(f, "M17 E"),
            Self::ExtruderMotor { enabled: false } => write!(f, "M18 E"),
            Self::DisarmTimeout { seconds } => write!(f, "M18 S{}", seconds),
            Self::AbsoluteExtrusion => write!(f, "M82"),
            Self::RelativeExtrusion => write!(f, "M83"),
            Self::SetTemperature(t) => write!(f, "M104 S{}", format_number(*t)),
            Self::WaitTemperature(t) => write!(f, "M109 S{}", format_number(*t)),
            Self::DisplayMessage(text) => write!(f, "M117 {}", text),
            Self::SoftEndstops { enabled } => write!(f, "M211 S{}", u8::from(*enabled)),
            Self::Beep => write!(f, "M300"),
            Self::FinishMoves => write!(f, "M400"),
        }
    }
}

/// A command plus an optional human-readable trailing comment
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub command: MachineCommand,
    pub comment: Option<&'static str>,
}

impl Instruction {
    pub fn new(command: MachineCommand) -> Self {
        Self {
            command,
            comment: None,
        }
    }

    pub fn with_comment(command: MachineCommand, comment: &'static str) -> Self {
        Self {
            command,
            comment: Some(comment),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(comment) = self.comment {
            write!(f, " ; {}", comment)?;
        }
        Ok(())
    }
}
