use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use filswap::{init_logging, process_gcode, read_gcode, Config, ProcessReport};

/// Insert a pause, park, filament swap and resume sequence into sliced G-code
#[derive(Parser, Debug)]
#[command(
    name = "filswap",
    version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")"),
    about
)]
struct Cli {
    /// Sliced G-code file, `-` reads stdin
    #[arg(required_unless_present = "write_default_config")]
    input: Option<String>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (.json or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Layer to change filament at; repeat for several changes
    #[arg(short = 'l', long = "layer", allow_negative_numbers = true)]
    layers: Vec<i64>,

    /// Scan and report only, write no output
    #[arg(long)]
    dry_run: bool,

    /// Print the processing reports as JSON on stderr
    #[arg(long)]
    json: bool,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    if let Some(path) = &cli.write_default_config {
        Config::default()
            .save_to_file(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => Config::default(),
    };

    let input = cli.input.as_deref().context("No input file given")?;
    let gcode = read_input(input)?;

    let (output, reports) = process_gcode(&gcode, &config, &cli.layers)?;
    log_reports(&reports);

    if cli.json {
        eprintln!("{}", serde_json::to_string_pretty(&reports)?);
    }

    if cli.dry_run {
        return Ok(());
    }

    write_output(cli.output.as_deref(), &output)
}

fn read_input(input: &str) -> anyhow::Result<String> {
    if input == "-" {
        let mut gcode = String::new();
        std::io::stdin()
            .read_to_string(&mut gcode)
            .context("Failed to read G-code from stdin")?;
        Ok(gcode)
    } else {
        read_gcode(input).with_context(|| format!("Failed to read {}", input))
    }
}

fn write_output(path: Option<&Path>, gcode: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => std::fs::write(path, gcode)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(gcode.as_bytes())
                .and_then(|_| stdout.flush())
                .context("Failed to write G-code to stdout")
        }
    }
}

fn log_reports(reports: &[ProcessReport]) {
    for report in reports {
        match (report.modified_block, report.state) {
            (Some(block), Some(state)) => tracing::info!(
                "{}: block {} (layer {}) modified, z {} e {}",
                report.processor,
                block,
                state.layer_index,
                state.position.z,
                report.extrusion_reference.unwrap_or_default()
            ),
            _ => tracing::warn!("{}: no layer reached, nothing inserted", report.processor),
        }
    }
}
