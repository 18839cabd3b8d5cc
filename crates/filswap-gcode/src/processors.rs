//! Post-processor implementations

use filswap_core::Result;
use filswap_settings::{Config, FilamentChangeSettings, MachineSettings};

use crate::document::Document;
use crate::emitter::FilamentChangeEmitter;
use crate::pipeline::{PostProcessor, ProcessReport};
use crate::scanner::LayerScanner;

/// Inserts a filament change in front of one layer
///
/// Scans for the configured layer, builds the pause/park/swap/resume block
/// and prepends it to that layer. Only the first qualifying layer is touched;
/// a document that never reaches the layer is left unchanged.
#[derive(Debug, Clone)]
pub struct FilamentChangeProcessor {
    settings: FilamentChangeSettings,
    machine: MachineSettings,
}

impl FilamentChangeProcessor {
    /// Create a processor from a full configuration
    pub fn new(config: &Config) -> Self {
        Self {
            settings: config.filament_change.clone(),
            machine: config.machine.clone(),
        }
    }

    /// Same configuration, different trigger layer
    pub fn with_layer(config: &Config, layer_number: i64) -> Self {
        let mut processor = Self::new(config);
        processor.settings.layer_number = layer_number;
        processor
    }

    pub fn settings(&self) -> &FilamentChangeSettings {
        &self.settings
    }

    pub fn machine(&self) -> &MachineSettings {
        &self.machine
    }
}

impl PostProcessor for FilamentChangeProcessor {
    fn name(&self) -> &str {
        "filament_change"
    }

    fn description(&self) -> &str {
        "Pauses at a layer, parks the head and resumes after a filament swap"
    }

    fn process(&self, document: &mut Document) -> Result<ProcessReport> {
        let scanner = LayerScanner::new(self.settings.layer_number);
        let outcome = match scanner.scan(document) {
            Some(outcome) => outcome,
            None => {
                tracing::info!(
                    "Layer {} not reached, document left unchanged",
                    self.settings.layer_number
                );
                return Ok(ProcessReport::unchanged(self.name()));
            }
        };

        let block = FilamentChangeEmitter::new(&self.settings, &self.machine)
            .build(&outcome.state, outcome.extrusion_reference);
        document.prepend(outcome.trigger_index, &block.render());

        tracing::info!(
            "Inserted filament change for layer {} before block {} ({} instructions)",
            self.settings.layer_number,
            outcome.trigger_index,
            block.instructions.len()
        );

        Ok(ProcessReport {
            processor: self.name().to_string(),
            modified_block: Some(outcome.trigger_index),
            state: Some(outcome.state),
            extrusion_reference: Some(outcome.extrusion_reference),
            diagnostics: block.diagnostics,
        })
    }
}
