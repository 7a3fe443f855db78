//! # afmcurve CLI
//!
//! Inspect and convert AFM force-curve data files.
//!
//! ## Usage
//!
//! ```bash
//! # Show the metadata summary of a file
//! afmcurve info scan.jpk-force-map
//!
//! # Convert to the tab format
//! afmcurve convert curve.jpk-force curve.tab
//!
//! # Recursively list loadable data files
//! afmcurve find ./measurements
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use afmcurve::curve::ExportFormat;
use afmcurve::formats::{FormatRegistry, LoadOptions};
use afmcurve::metadata::{schema, MetaValue};

/// afmcurve - AFM force-curve data reader and converter
#[derive(Parser)]
#[command(name = "afmcurve")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the metadata summary of a data file
    Info {
        /// Input data file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Convert a data file to the tab format
    Convert {
        /// Input data file
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output file (defaults to the input name with a .tab suffix);
        /// multi-curve inputs get the curve enumeration appended
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Skip the metadata block in the output
        #[arg(long)]
        no_metadata: bool,
    },

    /// Recursively list loadable data files below a directory
    Find {
        /// Directory (or single file) to scan
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// Restrict to one imaging modality
        #[arg(long)]
        modality: Option<String>,
    },
}

fn heading(text: &str) -> String {
    #[cfg(feature = "colorized_output")]
    {
        console::style(text).cyan().bold().to_string()
    }
    #[cfg(not(feature = "colorized_output"))]
    {
        text.to_string()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let registry = FormatRegistry::with_defaults();
    match cli.command {
        Commands::Info { file } => info_command(&registry, &file),
        Commands::Convert {
            input,
            output,
            no_metadata,
        } => convert_command(&registry, &input, output, !no_metadata),
        Commands::Find { path, modality } => {
            for found in registry.find_data(&path, modality.as_deref()) {
                println!("{}", found.display());
            }
            Ok(())
        }
    }
}

fn format_value(value: &MetaValue) -> String {
    match value {
        MetaValue::Float(v) if v.is_nan() => "-".to_string(),
        other => other.to_string(),
    }
}

fn info_command(registry: &FormatRegistry, file: &PathBuf) -> Result<()> {
    let curves = registry
        .load_data(file, &LoadOptions::default())
        .with_context(|| format!("cannot load '{}'", file.display()))?;
    println!(
        "{} ({} curve(s))",
        heading(&file.display().to_string()),
        curves.len()
    );
    for curve in &curves {
        let metadata = curve.metadata();
        println!(
            "\n{}",
            heading(&format!(
                "curve {} [{}]",
                curve.enumeration().unwrap_or_default(),
                curve.modality()
            ))
        );
        for (section, entries) in metadata.get_summary() {
            println!("  {}", heading(&section));
            for (key, value) in entries {
                let unit = schema::lookup(&key).map(|f| f.unit).unwrap_or("");
                if unit.is_empty() {
                    println!("    {key:<26} {}", format_value(&value));
                } else {
                    println!("    {key:<26} {} {unit}", format_value(&value));
                }
            }
        }
    }
    Ok(())
}

fn convert_command(
    registry: &FormatRegistry,
    input: &PathBuf,
    output: Option<PathBuf>,
    metadata: bool,
) -> Result<()> {
    let curves = registry
        .load_data(input, &LoadOptions::default())
        .with_context(|| format!("cannot load '{}'", input.display()))?;
    let base = output.unwrap_or_else(|| input.with_extension("tab"));

    for curve in &curves {
        let dest = if curves.len() == 1 {
            base.clone()
        } else {
            let stem = base
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("curve")
                .to_string();
            base.with_file_name(format!(
                "{stem}_{}.tab",
                curve.enumeration().unwrap_or_default()
            ))
        };
        curve
            .export_data(&dest, metadata, ExportFormat::Tab)
            .with_context(|| format!("cannot write '{}'", dest.display()))?;
        info!("wrote {}", dest.display());
        println!("{}", dest.display());
    }
    Ok(())
}
