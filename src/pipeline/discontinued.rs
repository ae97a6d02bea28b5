//! Discontinued-styles cross-reference.
//!
//! Sale sources own the styles they import. A regular source linked to a
//! sale source excludes variants whose normalized style has an active
//! registration, and its already-persisted rows for those styles are
//! removed. Registration upkeep for sale sources happens post-import.

use anyhow::Result;
use std::collections::HashSet;
use tracing::info;

use crate::models::{ImportRunStats, Variant};
use crate::storage::InventoryDb;

pub fn normalize_style(style: &str) -> String {
    style.trim().to_uppercase()
}

/// Filter a regular source's stream against the linked sale source's
/// active registrations and purge overlapping persisted rows.
pub fn exclude_sale_owned_styles(
    variants: Vec<Variant>,
    db: &InventoryDb,
    source_id: &str,
    linked_sale_source_id: &str,
    stats: &mut ImportRunStats,
) -> Result<Vec<Variant>> {
    let active = db.active_sale_styles(linked_sale_source_id)?;
    if active.is_empty() {
        return Ok(variants);
    }

    let mut excluded_styles: HashSet<String> = HashSet::new();
    let before = variants.len();
    let kept: Vec<Variant> = variants
        .into_iter()
        .filter(|v| {
            let style = normalize_style(&v.style);
            if active.contains(&style) {
                excluded_styles.insert(style);
                false
            } else {
                true
            }
        })
        .collect();
    stats.sale_styles_excluded += before - kept.len();

    if !excluded_styles.is_empty() {
        let styles: Vec<String> = excluded_styles.iter().cloned().collect();
        let removed = db.remove_items_by_styles(source_id, &styles)?;
        info!(
            source = source_id,
            excluded = styles.len(),
            removed,
            "sale-owned styles excluded from regular source"
        );
    }

    Ok(kept)
}

/// Post-import registration for a sale source: the run's styles go active,
/// everything else for this sale source is deactivated.
pub fn register_sale_styles(
    db: &InventoryDb,
    sale_source_id: &str,
    variants: &[Variant],
) -> Result<()> {
    let styles: HashSet<String> = variants.iter().map(|v| normalize_style(&v.style)).collect();
    db.sync_sale_styles(sale_source_id, &styles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImportedItem;

    #[test]
    fn sale_supersedes_regular_per_style() {
        let db = InventoryDb::in_memory().unwrap();

        // Sale file imported styles 1012 and 1013.
        let sale_items = vec![
            Variant::new("Jovani 1012", "Red", "4", 1),
            Variant::new("Jovani 1013", "Red", "4", 1),
        ];
        register_sale_styles(&db, "sale1", &sale_items).unwrap();

        // Regular source already persisted a 1012 row.
        db.replace_source_inventory(
            "reg1",
            &[ImportedItem::from_variant(
                "reg1",
                None,
                Variant::new("Jovani 1012", "Navy", "6", 2),
            )],
        )
        .unwrap();

        let incoming = vec![
            Variant::new("Jovani 1012", "Red", "8", 1),
            Variant::new("Jovani 1014", "Red", "8", 1),
        ];
        let mut stats = ImportRunStats::default();
        let kept =
            exclude_sale_owned_styles(incoming, &db, "reg1", "sale1", &mut stats).unwrap();

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].style, "Jovani 1014");
        assert_eq!(stats.sale_styles_excluded, 1);
        // The persisted 1012 row is gone too.
        assert_eq!(db.count_items("reg1").unwrap(), 0);
    }

    #[test]
    fn registration_deactivates_styles_missing_from_latest_run() {
        let db = InventoryDb::in_memory().unwrap();
        register_sale_styles(
            &db,
            "sale1",
            &[
                Variant::new("1012", "Red", "4", 1),
                Variant::new("1013", "Red", "4", 1),
            ],
        )
        .unwrap();
        register_sale_styles(&db, "sale1", &[Variant::new("1013", "Red", "4", 1)]).unwrap();

        let active = db.active_sale_styles("sale1").unwrap();
        assert!(active.contains("1013"));
        assert!(!active.contains("1012"));
    }
}
