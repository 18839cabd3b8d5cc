//! # filswap
//!
//! Inserts a filament change into sliced 3D printer G-code.
//!
//! ## Architecture
//!
//! filswap is organized as a workspace with multiple crates:
//!
//! 1. **filswap-core** - Error types and the scan state model
//! 2. **filswap-gcode** - Layer scanner, filament change emitter, post-processor pipeline
//! 3. **filswap-settings** - Configuration bundle, defaults, JSON/TOML persistence
//! 4. **filswap** - Command-line host that wires the crates together
//!
//! The change itself pauses the print at the requested layer, parks the head,
//! lets the operator swap filament, and resumes with the extruder position
//! restored so the rest of the print is unaffected.

use std::sync::Arc;

pub use filswap_core::{Error, GcodeError, MachineState, Position, Result};
pub use filswap_gcode::{
    CommandBlock, Diagnostic, Document, FilamentChangeEmitter, FilamentChangeProcessor,
    LayerScanner, PostProcessingPipeline, PostProcessor, ProcessReport, ScanOutcome,
};
pub use filswap_settings::{Config, FilamentChangeSettings, MachineSettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Output on stderr, so G-code written to stdout stays clean
/// - RUST_LOG environment variable support, INFO when unset or invalid
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Build the pipeline for a run
///
/// One filament change processor per requested layer, in order. With no
/// layers given, a single processor uses the configured layer.
pub fn build_pipeline(config: &Config, layers: &[i64]) -> PostProcessingPipeline {
    let mut pipeline = PostProcessingPipeline::new();

    if layers.is_empty() {
        pipeline.register(Arc::new(FilamentChangeProcessor::new(config)));
    } else {
        for &layer in layers {
            pipeline.register(Arc::new(FilamentChangeProcessor::with_layer(config, layer)));
        }
    }

    pipeline
}

/// Read a sliced G-code file
pub fn read_gcode(path: impl AsRef<std::path::Path>) -> Result<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Run the pipeline over a flat G-code file
pub fn process_gcode(
    gcode: &str,
    config: &Config,
    layers: &[i64],
) -> Result<(String, Vec<ProcessReport>)> {
    let mut document = Document::from_gcode(gcode);
    if document.is_empty() {
        return Err(GcodeError::FileError {
            reason: "input contains no G-code".to_string(),
        }
        .into());
    }

    let reports = build_pipeline(config, layers).process(&mut document)?;
    Ok((document.to_gcode(), reports))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GCODE: &str = "M104 S200\n;LAYER:0\nG1 Z0.2 X1 Y1 F1500 E1\n;LAYER:1\nG1 Z0.4 X2 Y2 F1500 E2\n;LAYER:2\nG1 Z0.6 X3 Y3 F1500 E3\n;LAYER:3\nG1 X4 E4\n";

    #[test]
    fn test_default_layer_from_config() {
        let (output, reports) = process_gcode(GCODE, &Config::new(), &[]).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].modified_block, Some(2));
        assert_eq!(output.matches(";TYPE:CUSTOM").count(), 1);
    }

    #[test]
    fn test_layer_overrides() {
        let (output, reports) = process_gcode(GCODE, &Config::new(), &[1, 3]).unwrap();
        let modified: Vec<_> = reports.iter().map(|r| r.modified_block).collect();
        assert_eq!(modified, vec![Some(2), Some(4)]);
        assert_eq!(output.matches(";TYPE:CUSTOM").count(), 2);
    }

    #[test]
    fn test_unreached_layer_passthrough() {
        let (output, reports) = process_gcode(GCODE, &Config::new(), &[40]).unwrap();
        assert!(!reports[0].is_modified());
        assert_eq!(output, GCODE);
    }

    #[test]
    fn test_empty_input_rejected() {
        let err = process_gcode("", &Config::new(), &[]).unwrap_err();
        assert!(err.is_gcode_error());
    }

    #[test]
    fn test_read_gcode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("print.gcode");
        std::fs::write(&path, GCODE).unwrap();
        assert_eq!(read_gcode(&path).unwrap(), GCODE);

        let err = read_gcode(dir.path().join("missing.gcode")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_config_file_drives_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filswap.toml");
        std::fs::write(
            &path,
            "[filament_change]\nlayer_number = 2\ndisable_endstops = true\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        let (output, reports) = process_gcode(GCODE, &config, &[]).unwrap();
        assert_eq!(reports[0].modified_block, Some(3));
        assert!(output.contains("M211 S0"));
        assert!(output.contains("M211 S1 ; enable endstops"));
    }
}
