//! Acquisition adapters.
//!
//! Four ways feed bytes arrive — manual upload, scheduled URL fetch, IMAP
//! email, and multi-file staged combines — all funneling into the one
//! pipeline. Adapters produce buffers or pre-parsed staged items and
//! nothing else; rules, safety and persistence live below them.

pub mod combine;
pub mod email;
pub mod links;
pub mod manual;
pub mod url_fetch;

use crate::error::ImportError;
use crate::sources::DataSource;

/// Refuse to start an import on a structurally broken source config.
pub(crate) fn require_valid(source: &DataSource) -> Result<(), ImportError> {
    let problems = source.validate();
    if problems.is_empty() {
        Ok(())
    } else {
        Err(ImportError::Config(format!(
            "source {}: {}",
            source.id,
            problems.join("; ")
        )))
    }
}

/// FNV-1a over file bytes; cheap and stable content hash for message
/// dedupe.
pub fn content_hash(data: &[u8]) -> String {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for b in data {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    format!("{:016x}", hash)
}
