//! Spindle speed analysis

pub mod materials;
pub mod modeline;
pub mod visitor;

pub use materials::{CuttingSpeed, Material, MaterialRegistry, MaterialSource, MaterialWatcher, WatchEvent};
pub use modeline::Modeline;
pub use visitor::{CuttingData, SpeedMode, SpeedRecord, SpeedStatus, SpeedVisitor, SpindleState, Units};
