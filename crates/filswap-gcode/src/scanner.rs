//! Layer scanner
//!
//! Walks a document once, folding every line into a [`MachineState`], and
//! stops at the first layer boundary that reaches the requested layer.

use std::ops::ControlFlow;

use filswap_core::MachineState;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::parser::{layer_marker, ParsedLine};

/// Where the scan stopped and what the machine looked like there
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Index of the block whose boundary triggered
    pub trigger_index: usize,
    /// State as of the triggering boundary line
    pub state: MachineState,
    /// Last absolute E value of the preceding block, 0 if it has none
    pub extrusion_reference: f64,
}

/// Finds the block where a filament change belongs
#[derive(Debug, Clone, Copy)]
pub struct LayerScanner {
    trigger_layer: i64,
}

impl LayerScanner {
    /// `trigger_layer` counts model layers; raft layers are added on top of it.
    pub fn new(trigger_layer: i64) -> Self {
        Self { trigger_layer }
    }

    pub fn trigger_layer(&self) -> i64 {
        self.trigger_layer
    }

    /// Scan the document, returning `None` when no boundary qualifies
    pub fn scan(&self, document: &Document) -> Option<ScanOutcome> {
        let flow = document
            .layers()
            .iter()
            .enumerate()
            .try_fold(MachineState::new(), |state, (index, block)| {
                block
                    .lines()
                    .try_fold(state, |state, line| self.step(state, line))
                    .map_break(|state| (index, state))
            });

        match flow {
            ControlFlow::Break((trigger_index, state)) => {
                let extrusion_reference = extrusion_reference(document, trigger_index);
                tracing::debug!(
                    "Trigger for layer {} found in block {} (layer {}, {} raft layers)",
                    self.trigger_layer,
                    trigger_index,
                    state.layer_index,
                    state.negative_layer_count
                );
                Some(ScanOutcome {
                    trigger_index,
                    state,
                    extrusion_reference,
                })
            }
            ControlFlow::Continue(state) => {
                tracing::debug!(
                    "No boundary reached layer {} (started: {}, last layer {})",
                    self.trigger_layer,
                    state.started,
                    state.layer_index
                );
                None
            }
        }
    }

    /// Fold one line into the state
    ///
    /// Breaks with the state when the line is a boundary that triggers.
    pub fn step(&self, mut state: MachineState, line: &str) -> ControlFlow<MachineState, MachineState> {
        let parsed = ParsedLine::parse(line);

        if parsed.is_motion() {
            if let Some(x) = parsed.value('X') {
                state.position.x = x;
            }
            if let Some(y) = parsed.value('Y') {
                state.position.y = y;
            }
            if let Some(z) = parsed.value('Z') {
                state.position.set_z(z);
            }
            // Travel moves carry no E; only printing moves set the resume rate
            if let (Some(feed), Some(_)) = (parsed.value('F'), parsed.value('E')) {
                state.feed_rate = feed;
            }
        }

        if parsed.is_temperature_set() {
            if let Some(temperature) = parsed.value('S') {
                state.target_temperature = temperature;
            }
        }

        if let Some(layer) = layer_marker(line) {
            state.observe_layer(layer);
            if state.started && layer >= state.effective_trigger(self.trigger_layer) {
                return ControlFlow::Break(state);
            }
        }

        ControlFlow::Continue(state)
    }
}

/// Last explicit E value of the block before `index`, read from the end
pub fn extrusion_reference(document: &Document, index: usize) -> f64 {
    index
        .checked_sub(1)
        .and_then(|previous| document.layers().get(previous))
        .and_then(|block| {
            block
                .lines()
                .rev()
                .find_map(|line| ParsedLine::parse(line).value('E'))
        })
        .unwrap_or(0.0)
}
