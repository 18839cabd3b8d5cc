//! # filswap G-Code
//!
//! Layer scanning and filament change generation for sliced G-code.
//!
//! This crate provides:
//! - The emitted command vocabulary and its exact line syntax
//! - Line parsing for layer markers, moves and temperatures
//! - Splitting a file into layer blocks and joining it back
//! - The layer scanner and the filament change emitter
//! - A post-processor pipeline that hosts plug into

pub mod command;
pub mod document;
pub mod emitter;
pub mod parser;
pub mod pipeline;
pub mod processors;
pub mod scanner;

pub use command::{format_number, Instruction, MachineCommand, Move};
pub use document::Document;
pub use emitter::{CommandBlock, Diagnostic, FilamentChangeEmitter};
pub use parser::{layer_marker, Code, ParsedLine, Word, LAYER_MARKER};
pub use pipeline::{PostProcessingPipeline, PostProcessor, ProcessReport, ProcessorHandle};
pub use processors::FilamentChangeProcessor;
pub use scanner::{extrusion_reference, LayerScanner, ScanOutcome};
