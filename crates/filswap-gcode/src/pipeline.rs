//! Document post-processor pipeline

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use filswap_core::{MachineState, Result};

use crate::document::Document;
use crate::emitter::Diagnostic;

/// What a processor did to a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessReport {
    /// Name of the processor that produced the report
    pub processor: String,
    /// Index of the block that was modified, if any
    pub modified_block: Option<usize>,
    /// Machine state captured at the modification point
    pub state: Option<MachineState>,
    /// Extruder position restored after the inserted block
    pub extrusion_reference: Option<f64>,
    /// Non-fatal findings
    pub diagnostics: Vec<Diagnostic>,
}

impl ProcessReport {
    /// Report for a processor that left the document alone
    pub fn unchanged(processor: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            modified_block: None,
            state: None,
            extrusion_reference: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.modified_block.is_some()
    }
}

/// Trait for whole-document post-processors
///
/// A post-processor receives the sliced document once and may rewrite its
/// blocks in place. Processors are applied in a pipeline, in registration
/// order, each seeing the output of the previous one.
pub trait PostProcessor: Send + Sync {
    /// Get the name/identifier of this processor
    fn name(&self) -> &str;

    /// Get a description of what this processor does
    fn description(&self) -> &str;

    /// Process the document in place
    fn process(&self, document: &mut Document) -> Result<ProcessReport>;

    /// Check if this processor is enabled
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Arc-wrapped processor for thread-safe sharing
pub type ProcessorHandle = Arc<dyn PostProcessor>;

/// Ordered set of post-processors
///
/// # Example
/// ```ignore
/// let mut pipeline = PostProcessingPipeline::new();
/// pipeline.register(Arc::new(FilamentChangeProcessor::new(&config)));
///
/// let reports = pipeline.process(&mut document)?;
/// ```
pub struct PostProcessingPipeline {
    processors: Vec<ProcessorHandle>,
}

impl PostProcessingPipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            processors: Vec::new(),
        }
    }

    /// Register a processor in the pipeline
    ///
    /// Processors are applied in the order they are registered.
    pub fn register(&mut self, processor: ProcessorHandle) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Get the number of registered processors
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Run every enabled processor over the document
    ///
    /// Stops at the first processor error; blocks already rewritten by earlier
    /// processors stay rewritten.
    pub fn process(&self, document: &mut Document) -> Result<Vec<ProcessReport>> {
        let mut reports = Vec::with_capacity(self.processors.len());

        for processor in &self.processors {
            if !processor.is_enabled() {
                tracing::debug!("Skipping disabled processor '{}'", processor.name());
                continue;
            }

            match processor.process(document) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::warn!("Processor '{}' failed: {}", processor.name(), e);
                    return Err(e);
                }
            }
        }

        Ok(reports)
    }
}

impl Default for PostProcessingPipeline {
    fn default() -> Self {
        Self::new()
    }
}
