//! Configuration management for grace.
//!
//! Handles:
//! - Command-line argument parsing
//! - Material table locations
//! - Resolving the active material and tool into cutting data

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use crate::speeds::{CuttingData, MaterialRegistry};

/// Command-line arguments for the language server
#[derive(Debug, Clone, Parser)]
#[command(name = "grace-ls")]
#[command(about = "Language server for G-code programs")]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub options: Options,
}

/// Options shared by the command-line tool and the language server
#[derive(Debug, Clone, clap::Args)]
pub struct Options {
    /// Material whose cutting speeds drive the spindle speed check
    #[arg(long, global = true, default_value = "steel-tough")]
    pub material: String,

    /// Tool diameter in millimeters
    #[arg(long, global = true, value_name = "MM", default_value_t = 1.5)]
    pub tool_diameter: f32,

    /// Extra material tables, applied in order after the built-in and user tables
    #[arg(long = "materials-file", global = true, value_name = "PATH")]
    pub materials_files: Vec<PathBuf>,

    /// Delay before re-analyzing an edited document
    #[arg(long, global = true, value_name = "MS", default_value_t = 250)]
    pub debounce_ms: u64,

    #[arg(
        long,
        global = true,
        default_value = "info",
        help = "Log level (trace, debug, info, warn, error)"
    )]
    pub log_level: String,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub material: String,
    pub tool_diameter: f32,
    /// `<config dir>/grace/materials.toml`, whether or not it exists
    pub user_materials: Option<PathBuf>,
    /// Files given on the command line
    pub materials_files: Vec<PathBuf>,
    pub debounce: Duration,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments (useful for testing)
    pub fn from_args(args: Args) -> Result<Self> {
        Self::from_options(args.options)
    }

    pub fn from_options(args: Options) -> Result<Self> {
        if !(args.tool_diameter.is_finite() && args.tool_diameter > 0.0) {
            bail!(
                "tool diameter must be a positive number of millimeters, got {}",
                args.tool_diameter
            );
        }

        let user_materials = dirs::config_dir().map(|dir| dir.join("grace").join("materials.toml"));

        Ok(Config {
            material: args.material,
            tool_diameter: args.tool_diameter,
            user_materials,
            materials_files: args.materials_files,
            debounce: Duration::from_millis(args.debounce_ms),
            log_level: args.log_level,
        })
    }

    /// Material files to load, lowest priority first
    pub fn material_sources(&self) -> Vec<PathBuf> {
        self.user_materials
            .iter()
            .filter(|path| path.exists())
            .chain(self.materials_files.iter())
            .cloned()
            .collect()
    }

    /// Every file whose changes should reload the registry
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.user_materials
            .iter()
            .chain(self.materials_files.iter())
            .cloned()
            .collect()
    }

    pub fn load_materials(&self) -> Result<MaterialRegistry> {
        MaterialRegistry::load(&self.material_sources())
    }

    /// Cutting data for the configured material and tool
    pub fn cutting_data(&self, registry: &MaterialRegistry) -> Result<CuttingData> {
        if !(self.tool_diameter.is_finite() && self.tool_diameter > 0.0) {
            bail!(
                "tool diameter must be a positive number of millimeters, got {}",
                self.tool_diameter
            );
        }
        match registry.get(&self.material) {
            Some(material) => Ok(material.cutting_data(self.tool_diameter)),
            None => {
                let known: Vec<&str> = registry.materials().map(|m| m.name.as_str()).collect();
                bail!(
                    "unknown material '{}' (known: {})",
                    self.material,
                    known.join(", ")
                )
            }
        }
    }
}

/// Log to stderr at `level` unless `RUST_LOG` says otherwise
pub fn init_logging(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .try_init();
}
