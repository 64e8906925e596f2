use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use grace::config::{Config, Options, init_logging};
use grace::core::LineIndex;
use grace::speeds::{CuttingData, MaterialRegistry, MaterialSource, Modeline, SpeedVisitor};
use grace::validation::{Severity, validate_document};
use grace::{lsp, parser};

/// Command-line front end for the G-code parser and spindle speed check
#[derive(Debug, Parser)]
#[command(name = "grace")]
#[command(about = "G-code parser, spindle speed checker and language server")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: Options,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report parse errors and off-range spindle speeds
    Check { file: PathBuf },
    /// Print every token as KIND(offset,length)
    Tokens { file: PathBuf },
    /// Recommended spindle speed for every S word
    Speeds {
        file: PathBuf,
        /// Print the records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the program in canonical form, without comments
    Fmt { file: PathBuf },
    /// List the material table
    Materials,
    /// Run the language server on stdio
    Lsp,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_options(cli.options)?;
    init_logging(&config.log_level);

    match cli.command {
        Command::Check { file } => check(&config, &file),
        Command::Tokens { file } => tokens(&file),
        Command::Speeds { file, json } => speeds(&config, &file, json),
        Command::Fmt { file } => fmt(&file),
        Command::Materials => materials(&config),
        Command::Lsp => {
            lsp::serve_with(config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Configured cutting data with the file's modeline applied
fn cutting_data(config: &Config, text: &str) -> Result<(MaterialRegistry, CuttingData)> {
    let registry = config.load_materials()?;
    let base = config.cutting_data(&registry)?;
    let data = match Modeline::detect(text) {
        Some(modeline) => modeline.apply(&registry, base),
        None => base,
    };
    Ok((registry, data))
}

fn report(path: &Path, text: &str, offset: usize, message: &str) {
    let location = LineIndex::new(text).location(text, offset);
    eprintln!(
        "{}:{}:{}: error: {}",
        path.display(),
        location.line,
        location.column,
        message
    );
}

fn check(config: &Config, path: &Path) -> Result<ExitCode> {
    let text = read(path)?;
    let (_, data) = cutting_data(config, &text)?;
    let result = validate_document(&text, Some(&data));

    for d in &result.diagnostics {
        let severity = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        println!(
            "{}:{}:{}: {}: {}",
            path.display(),
            d.line,
            d.column,
            severity,
            d.message
        );
    }

    if result.is_valid() {
        log::info!(
            "{}: {} spindle speeds checked",
            path.display(),
            result.speeds.len()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn tokens(path: &Path) -> Result<ExitCode> {
    let text = read(path)?;
    for token in parser::Lexer::new(&text) {
        match token {
            Ok(token) => println!("{}", token),
            Err(e) => {
                report(path, &text, e.offset, &e.to_string());
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn speeds(config: &Config, path: &Path, json: bool) -> Result<ExitCode> {
    let text = read(path)?;
    let program = match parser::parse(&text) {
        Ok(program) => program,
        Err(e) => {
            report(path, &text, e.offset(), &e.to_string());
            return Ok(ExitCode::FAILURE);
        }
    };

    let (_, data) = cutting_data(config, &text)?;
    let records = SpeedVisitor::new(data).records(&program);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "tool {} mm, cutting speed {}–{} m/min",
        data.tool_diameter, data.cutting_speed_low, data.cutting_speed_high
    );
    println!("{:>6}  {:>10}  {:>12}  status", "line", "requested", "recommended");
    for record in &records {
        println!(
            "{:>6}  {:>10}  {:>12}  {}",
            record.line,
            record.requested_value,
            record.range_label(),
            record.status()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn fmt(path: &Path) -> Result<ExitCode> {
    let text = read(path)?;
    match parser::parse(&text) {
        Ok(program) => {
            print!("{}", program);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report(path, &text, e.offset(), &e.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn materials(config: &Config) -> Result<ExitCode> {
    let registry = config.load_materials()?;
    for material in registry.materials() {
        let source = match registry.source(&material.name) {
            Some(MaterialSource::File(path)) => path.display().to_string(),
            _ => "built-in".to_string(),
        };
        println!(
            "{:<20} {:>6}–{:<6} m/min  {}  ({})",
            material.name,
            material.cutting_speed.low,
            material.cutting_speed.high,
            material.label(),
            source
        );
    }
    Ok(ExitCode::SUCCESS)
}
