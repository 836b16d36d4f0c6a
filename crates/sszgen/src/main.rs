use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;

use sszgen::generate;

#[derive(Parser)]
#[command(name = "sszgen")]
#[command(about = "SSZ methodset generator (Rust -> Rust).", long_about = None)]
struct Cli {
    /// Directory (or file) of the primary package containing the targeted
    /// records.
    #[arg(long)]
    path: PathBuf,

    /// Comma-separated record names to generate for; empty means every
    /// eligible record in the primary package.
    #[arg(long, default_value = "")]
    objs: String,

    /// Write one combined file at this path instead of per-file outputs.
    #[arg(long, default_value = "")]
    output: String,

    /// Comma-separated directories whose records may be referenced but are
    /// not themselves targeted.
    #[arg(long, default_value = "")]
    include: String,

    /// Print a single-line JSON tool report instead of plain output.
    #[arg(long)]
    report_json: bool,
}

#[derive(Debug, Serialize)]
struct SszgenToolReport {
    schema_version: &'static str,
    command: &'static str,
    ok: bool,
    r#in: String,
    outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    exit_code: u8,
}

const REPORT_SCHEMA_VERSION: &str = "sszgen.report@0.1.0";

fn main() -> std::process::ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            std::process::ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<std::process::ExitCode> {
    let cli = Cli::parse();

    let targets = decode_list(&cli.objs);
    let includes: Vec<PathBuf> = decode_list(&cli.include)
        .into_iter()
        .map(PathBuf::from)
        .collect();
    let output = if cli.output.is_empty() {
        None
    } else {
        Some(PathBuf::from(&cli.output))
    };

    match generate::generate(&cli.path, &includes, &targets, output.as_deref()) {
        Ok(written) => {
            if cli.report_json {
                let report = SszgenToolReport {
                    schema_version: REPORT_SCHEMA_VERSION,
                    command: "generate",
                    ok: true,
                    r#in: cli.path.display().to_string(),
                    outputs: written.iter().map(|p| p.display().to_string()).collect(),
                    error: None,
                    exit_code: 0,
                };
                print_json(&report)?;
            }
            Ok(std::process::ExitCode::SUCCESS)
        }
        Err(err) => {
            if cli.report_json {
                let report = SszgenToolReport {
                    schema_version: REPORT_SCHEMA_VERSION,
                    command: "generate",
                    ok: false,
                    r#in: cli.path.display().to_string(),
                    outputs: Vec::new(),
                    error: Some(err.message.clone()),
                    exit_code: 1,
                };
                print_json(&report)?;
                return Ok(std::process::ExitCode::from(1));
            }
            anyhow::bail!("generate failed: {:?}: {}", err.kind, err.message)
        }
    }
}

fn decode_list(input: &str) -> Vec<String> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input
        .trim()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
