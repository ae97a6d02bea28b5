//! Pre-write safety nets.
//!
//! A malformed feed must never silently wipe a source's inventory. The
//! guards only apply to full-sync writes: an upsert cannot shrink the
//! store. A returned block means no row changed and last-sync stays put.

use crate::models::SafetyBlock;
use crate::sources::UpdateStrategy;

/// Hard floor: with a populated store, a tiny feed is always suspect.
const ABSOLUTE_GUARD_MIN_EXISTING: usize = 100;
const ABSOLUTE_GUARD_FRACTION: f64 = 0.10;

/// Evaluate the step-17 guards. `threshold` is the source's configured
/// drop-percent limit; 0 disables that check but not the absolute guard.
pub fn pre_write_guard(
    strategy: UpdateStrategy,
    existing: usize,
    incoming: usize,
    threshold: f64,
) -> Option<SafetyBlock> {
    if strategy != UpdateStrategy::FullSync {
        return None;
    }

    if incoming == 0 && existing >= 1 {
        return Some(SafetyBlock {
            message: format!(
                "import produced 0 items while {} exist; blocking full sync",
                existing
            ),
            existing_count: existing,
            new_count: 0,
            drop_percent: Some(100.0),
        });
    }

    if existing == 0 {
        return None;
    }

    let drop_percent = if incoming >= existing {
        0.0
    } else {
        (existing - incoming) as f64 / existing as f64 * 100.0
    };

    if threshold > 0.0 && drop_percent > threshold {
        return Some(SafetyBlock {
            message: format!(
                "item count would drop {:.1}% ({} -> {}), over the {:.0}% threshold",
                drop_percent, existing, incoming, threshold
            ),
            existing_count: existing,
            new_count: incoming,
            drop_percent: Some(drop_percent),
        });
    }

    if existing > ABSOLUTE_GUARD_MIN_EXISTING
        && (incoming as f64) < (existing as f64) * ABSOLUTE_GUARD_FRACTION
    {
        return Some(SafetyBlock {
            message: format!(
                "item count would collapse from {} to {}; blocking unconditionally",
                existing, incoming
            ),
            existing_count: existing,
            new_count: incoming,
            drop_percent: Some(drop_percent),
        });
    }

    None
}
