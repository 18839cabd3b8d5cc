//! Scan state data model
//!
//! The values tracked while walking a sliced document. Every field is sticky:
//! once observed it keeps its value until a later line overwrites it.

use serde::{Deserialize, Serialize};

/// Toolhead position as last commanded by the document
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
    /// Z height held before the most recent Z change
    pub previous_z: f64,
}

impl Position {
    /// Create a new position with X, Y, Z coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            previous_z: 0.0,
        }
    }

    /// Move to a new Z height.
    ///
    /// The old height is kept in `previous_z` only when the height actually
    /// changes, so repeated moves at one height keep the last real step.
    pub fn set_z(&mut self, z: f64) {
        if z != self.z {
            self.previous_z = self.z;
            self.z = z;
        }
    }
}

/// Running machine state accumulated over a document
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MachineState {
    /// Last commanded position
    pub position: Position,
    /// Feed rate (mm/min) of the last printing move (a move carrying F and E)
    pub feed_rate: f64,
    /// Last hotend target temperature set with M104/M109
    pub target_temperature: f64,
    /// Index of the last non-negative layer marker
    pub layer_index: i64,
    /// Number of negative (raft) layer markers seen
    pub negative_layer_count: i64,
    /// Whether the first non-negative layer marker has been seen
    pub started: bool,
}

impl MachineState {
    /// Create a fresh state with every value unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a layer boundary marker
    pub fn observe_layer(&mut self, layer: i64) {
        if layer < 0 {
            self.negative_layer_count += 1;
        } else {
            self.started = true;
            self.layer_index = layer;
        }
    }

    /// The user-visible trigger layer shifted by the raft layers seen so far
    pub fn effective_trigger(&self, trigger_layer: i64) -> i64 {
        trigger_layer - self.negative_layer_count
    }
}
