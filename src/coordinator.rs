//! Import-state coordination: one active import per source.
//!
//! `start_import` hands out a guard or reports busy; completion and
//! failure release the slot and record the last outcome. The guard also
//! releases on drop so a panicking task can never wedge its source.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ImportError;

#[derive(Debug, Clone)]
pub struct LastImportOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub item_count: Option<usize>,
}

#[derive(Default)]
struct CoordinatorState {
    active: HashMap<String, String>,
    last_outcome: HashMap<String, LastImportOutcome>,
}

#[derive(Clone, Default)]
pub struct ImportCoordinator {
    state: Arc<Mutex<CoordinatorState>>,
}

impl ImportCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the source for one run. Returns busy when an import is
    /// already active for this source id.
    pub fn start_import(&self, source_id: &str, run_label: &str) -> Result<ImportGuard, ImportError> {
        let mut state = self.state.lock();
        if state.active.contains_key(source_id) {
            return Err(ImportError::Busy(source_id.to_string()));
        }
        state
            .active
            .insert(source_id.to_string(), run_label.to_string());
        Ok(ImportGuard {
            coordinator: self.clone(),
            source_id: source_id.to_string(),
            released: false,
        })
    }

    pub fn is_active(&self, source_id: &str) -> bool {
        self.state.lock().active.contains_key(source_id)
    }

    pub fn last_outcome(&self, source_id: &str) -> Option<LastImportOutcome> {
        self.state.lock().last_outcome.get(source_id).cloned()
    }

    fn release(&self, source_id: &str, outcome: Option<LastImportOutcome>) {
        let mut state = self.state.lock();
        state.active.remove(source_id);
        if let Some(outcome) = outcome {
            state.last_outcome.insert(source_id.to_string(), outcome);
        }
    }
}

/// Exclusive claim on a source for the duration of one import.
pub struct ImportGuard {
    coordinator: ImportCoordinator,
    source_id: String,
    released: bool,
}

impl ImportGuard {
    pub fn complete_import(mut self, item_count: usize) {
        info!(source = %self.source_id, item_count, "import slot released (complete)");
        self.coordinator.release(
            &self.source_id,
            Some(LastImportOutcome {
                success: true,
                message: None,
                item_count: Some(item_count),
            }),
        );
        self.released = true;
    }

    pub fn fail_import(mut self, message: &str) {
        warn!(source = %self.source_id, message, "import slot released (failed)");
        self.coordinator.release(
            &self.source_id,
            Some(LastImportOutcome {
                success: false,
                message: Some(message.to_string()),
                item_count: None,
            }),
        );
        self.released = true;
    }
}

impl Drop for ImportGuard {
    fn drop(&mut self) {
        if !self.released {
            self.coordinator.release(&self.source_id, None);
        }
    }
}
