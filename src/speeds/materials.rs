//! Material Table
//!
//! Cutting speed ranges per material, loaded from TOML. The built-in table is
//! embedded in the binary; user and command-line files override entries by
//! name, later files winning.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::speeds::visitor::CuttingData;

const BUILTIN_MATERIALS: &str = include_str!("../../resources/materials.toml");

/// Root of a materials file (matches TOML)
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MaterialFile {
    #[serde(default, rename = "material")]
    pub materials: Vec<Material>,
}

/// One material and its empirical cutting speed range
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Material {
    pub name: String,
    pub description: Option<String>,
    pub cutting_speed: CuttingSpeed,
}

/// Cutting speed bounds in m/min
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct CuttingSpeed {
    pub low: f32,
    pub high: f32,
}

impl Material {
    /// Reject ranges the speed pass cannot use
    pub fn validate(&self) -> Result<(), String> {
        let CuttingSpeed { low, high } = self.cutting_speed;
        if !(low.is_finite() && high.is_finite()) || low <= 0.0 {
            return Err(format!(
                "material '{}' needs positive cutting speeds, got {}..{}",
                self.name, low, high
            ));
        }
        if low > high {
            return Err(format!(
                "material '{}' has low cutting speed {} above high {}",
                self.name, low, high
            ));
        }
        Ok(())
    }

    /// Description if present, name otherwise
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }

    pub fn cutting_data(&self, tool_diameter: f32) -> CuttingData {
        CuttingData {
            cutting_speed_low: self.cutting_speed.low,
            cutting_speed_high: self.cutting_speed.high,
            tool_diameter,
        }
    }
}

/// Where a material definition came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialSource {
    BuiltIn,
    File(PathBuf),
}

#[derive(Debug, Clone)]
struct LoadedMaterial {
    material: Material,
    source: MaterialSource,
}

/// In-memory material table keyed by lower-cased name
#[derive(Debug, Clone, Default)]
pub struct MaterialRegistry {
    materials: BTreeMap<String, LoadedMaterial>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the embedded table
    pub fn with_builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry
            .load_str(BUILTIN_MATERIALS, MaterialSource::BuiltIn)
            .context("Failed to parse built-in materials")?;
        Ok(registry)
    }

    /// Built-in table overlaid with `files`, in order
    pub fn load(files: &[PathBuf]) -> Result<Self> {
        let mut registry = Self::with_builtin()?;
        for path in files {
            let count = registry.load_file(path)?;
            log::debug!("Loaded {} materials from {}", count, path.display());
        }
        Ok(registry)
    }

    /// Add or replace a material
    pub fn add(&mut self, material: Material, source: MaterialSource) {
        self.materials.insert(
            material.name.to_lowercase(),
            LoadedMaterial { material, source },
        );
    }

    /// Parse TOML content and add every material in it
    pub fn load_str(&mut self, content: &str, source: MaterialSource) -> Result<usize> {
        let file: MaterialFile = toml::from_str(content)?;
        for material in &file.materials {
            material.validate().map_err(|e| anyhow!(e))?;
        }
        let count = file.materials.len();
        for material in file.materials {
            self.add(material, source.clone());
        }
        Ok(count)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<usize> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read materials file: {}", path.display()))?;
        self.load_str(&content, MaterialSource::File(path.to_path_buf()))
            .with_context(|| format!("Failed to parse materials file: {}", path.display()))
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&Material> {
        self.materials
            .get(&name.to_lowercase())
            .map(|loaded| &loaded.material)
    }

    pub fn source(&self, name: &str) -> Option<&MaterialSource> {
        self.materials
            .get(&name.to_lowercase())
            .map(|loaded| &loaded.source)
    }

    /// Materials sorted by name
    pub fn materials(&self) -> impl Iterator<Item = &Material> + '_ {
        self.materials.values().map(|loaded| &loaded.material)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Events from the file watcher
#[derive(Debug)]
pub enum WatchEvent {
    Changed(PathBuf),
    Error(notify::Error),
}

/// Watches the directories holding material files
pub struct MaterialWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<WatchEvent>,
}

impl MaterialWatcher {
    pub fn new(files: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if let EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) =
                        event.kind
                    {
                        for path in event.paths {
                            if path.extension().and_then(|s| s.to_str()) == Some("toml") {
                                let _ = tx.send(WatchEvent::Changed(path));
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e));
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(1)),
        )?;

        let mut dirs: Vec<&Path> = files
            .iter()
            .map(|f| match f.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            })
            .filter(|d| d.exists())
            .collect();
        dirs.sort();
        dirs.dedup();

        for dir in dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            log::debug!("Watching {} for material changes", dir.display());
        }

        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }

    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        self.events.recv().await
    }
}
