//! Import error taxonomy.
//!
//! Transform-level problems inside the pipeline (advisor timeout, price
//! lookup miss) are warnings counted in the run stats, not errors; only the
//! conditions below abort a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Source config missing or malformed. Surfaced to the user, no retry.
    #[error("source configuration error: {0}")]
    Config(String),

    /// Connection/download failure. The email retry queue may reschedule.
    #[error("acquisition failed: {0}")]
    Acquisition(String),

    /// File unreadable or produced no rows.
    #[error("could not parse feed: {0}")]
    Parse(String),

    /// A pre-import structural or row-count guard tripped. No write.
    #[error("pre-import validation failed: {0}")]
    PreImportValidation(String),

    /// The step-17 safety net tripped. No write, no last-sync advance.
    #[error("safety block: {message} ({existing_count} existing, {new_count} new)")]
    SafetyBlock {
        message: String,
        existing_count: usize,
        new_count: usize,
        drop_percent: Option<f64>,
    },

    /// The store write failed. full_sync rolls back atomically; upsert
    /// reports how far it got.
    #[error("store write failed: {0}")]
    Write(String),

    /// Another import is already running for this source.
    #[error("import already in progress for source {0}")]
    Busy(String),
}

impl ImportError {
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Config(_) => "config",
            ImportError::Acquisition(_) => "acquisition",
            ImportError::Parse(_) => "parse",
            ImportError::PreImportValidation(_) => "pre_import_validation",
            ImportError::SafetyBlock { .. } => "safety_block",
            ImportError::Write(_) => "write",
            ImportError::Busy(_) => "busy",
        }
    }
}
