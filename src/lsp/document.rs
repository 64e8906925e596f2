use std::sync::Arc;

use crate::core::Snapshot;
use crate::speeds::CuttingData;
use crate::validation::{ValidationResult, validate_document};

/// Everything derived from one snapshot
#[derive(Debug)]
pub struct Analysis {
    pub snapshot: Snapshot,
    pub cutting: Option<CuttingData>,
    pub result: ValidationResult,
}

impl Analysis {
    pub fn run(snapshot: Snapshot, cutting: Option<CuttingData>) -> Self {
        let result = validate_document(snapshot.text(), cutting.as_ref());
        Self {
            snapshot,
            cutting,
            result,
        }
    }
}

/// State for each open document
#[derive(Debug)]
pub struct DocumentState {
    pub snapshot: Snapshot,
    /// Bumped on every edit; analyses started for an older value are stale
    pub generation: u64,
    analysis: Option<(u64, Arc<Analysis>)>,
}

impl DocumentState {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            generation: 0,
            analysis: None,
        }
    }

    /// Replace the text, invalidating the current analysis
    pub fn update(&mut self, snapshot: Snapshot) -> u64 {
        self.snapshot = snapshot;
        self.generation += 1;
        self.generation
    }

    /// Store an analysis if it belongs to the current generation
    pub fn store(&mut self, generation: u64, analysis: Arc<Analysis>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.analysis = Some((generation, analysis));
        true
    }

    /// The analysis of the current text, if one has finished
    pub fn analysis(&self) -> Option<Arc<Analysis>> {
        match &self.analysis {
            Some((generation, analysis)) if *generation == self.generation => {
                Some(Arc::clone(analysis))
            }
            _ => None,
        }
    }
}
