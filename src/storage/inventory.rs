//! Inventory item reads and the two write strategies.
//!
//! `full_sync` replaces a source's rows atomically: delete plus insert in
//! one transaction, so a failure changes nothing. `upsert` keys on SKU,
//! preserves unseen rows, and reports how many rows it applied.

use anyhow::Result;
use rusqlite::params;
use tracing::{debug, info};

use super::InventoryDb;
use crate::models::{ImportedItem, Variant};

fn bind_item(
    stmt: &mut rusqlite::CachedStatement<'_>,
    item: &ImportedItem,
) -> rusqlite::Result<usize> {
    let v = &item.variant;
    stmt.execute(params![
        item.source_id,
        v.sku,
        v.style,
        v.color,
        v.size,
        v.stock as i64,
        v.price,
        v.cost,
        v.ship_date,
        v.discontinued as i64,
        v.has_future_stock as i64,
        v.preserve_zero_stock as i64,
        v.is_expanded_size as i64,
        v.expanded_from,
        v.special_order as i64,
        v.brand,
        v.stock_info,
        item.sale_owns_style as i64,
        item.file_id,
    ])
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<ImportedItem> {
    let mut variant = Variant::new(
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, i64>(5)?.max(0) as u32,
    );
    variant.sku = row.get(1)?;
    variant.price = row.get(6)?;
    variant.cost = row.get(7)?;
    variant.ship_date = row.get(8)?;
    variant.discontinued = row.get::<_, i64>(9)? != 0;
    variant.has_future_stock = row.get::<_, i64>(10)? != 0;
    variant.preserve_zero_stock = row.get::<_, i64>(11)? != 0;
    variant.is_expanded_size = row.get::<_, i64>(12)? != 0;
    variant.expanded_from = row.get(13)?;
    variant.special_order = row.get::<_, i64>(14)? != 0;
    variant.brand = row.get(15)?;
    variant.stock_info = row.get(16)?;

    Ok(ImportedItem {
        source_id: row.get(0)?,
        file_id: row.get(18)?,
        sale_owns_style: row.get::<_, i64>(17)? != 0,
        variant,
    })
}

const ITEM_COLUMNS: &str = "source_id, sku, style, color, size, stock, price, cost, ship_date, \
     discontinued, has_future_stock, preserve_zero_stock, is_expanded_size, expanded_from, \
     special_order, brand, stock_info, sale_owns_style, file_id";

const INSERT_SQL: &str = "INSERT INTO inventory_items
        (source_id, sku, style, color, size, stock, price, cost, ship_date,
         discontinued, has_future_stock, preserve_zero_stock, is_expanded_size, expanded_from,
         special_order, brand, stock_info, sale_owns_style, file_id, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
             strftime('%s','now'))
     ON CONFLICT(source_id, sku) DO UPDATE SET
        style=excluded.style,
        color=excluded.color,
        size=excluded.size,
        stock=excluded.stock,
        price=excluded.price,
        cost=excluded.cost,
        ship_date=excluded.ship_date,
        discontinued=excluded.discontinued,
        has_future_stock=excluded.has_future_stock,
        preserve_zero_stock=excluded.preserve_zero_stock,
        is_expanded_size=excluded.is_expanded_size,
        expanded_from=excluded.expanded_from,
        special_order=excluded.special_order,
        brand=excluded.brand,
        stock_info=excluded.stock_info,
        sale_owns_style=excluded.sale_owns_style,
        file_id=excluded.file_id,
        updated_at=excluded.updated_at";

impl InventoryDb {
    pub fn count_items(&self, source_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM inventory_items WHERE source_id = ?1",
            [source_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn get_items(&self, source_id: &str) -> Result<Vec<ImportedItem>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM inventory_items WHERE source_id = ?1 ORDER BY sku",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map([source_id], row_to_item)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(items)
    }

    pub fn get_item(&self, source_id: &str, sku: &str) -> Result<Option<ImportedItem>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM inventory_items WHERE source_id = ?1 AND sku = ?2 LIMIT 1",
            ITEM_COLUMNS
        ))?;
        let mut rows = stmt.query(params![source_id, sku])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_item(row)?)),
            None => Ok(None),
        }
    }

    /// Atomic replace for `full_sync`: all previous rows removed and all
    /// new rows inserted, or nothing changes.
    pub fn replace_source_inventory(
        &self,
        source_id: &str,
        items: &[ImportedItem],
    ) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = (|| -> Result<usize> {
            conn.execute(
                "DELETE FROM inventory_items WHERE source_id = ?1",
                [source_id],
            )?;
            let mut stmt = conn.prepare_cached(INSERT_SQL)?;
            let mut written = 0usize;
            for item in items {
                written += bind_item(&mut stmt, item)?;
            }
            Ok(written)
        })();

        match result {
            Ok(written) => {
                conn.execute("COMMIT", [])?;
                info!(source = source_id, written, "inventory replaced");
                Ok(written)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Upsert by SKU. Unseen rows stay; for regular sources the
    /// `sale_owns_style` flag on untouched rows may be cleared by the
    /// caller via [`InventoryDb::clear_sale_owns_flags`]. Returns how many
    /// rows were applied before any error.
    pub fn upsert_inventory(&self, source_id: &str, items: &[ImportedItem]) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute("BEGIN IMMEDIATE", [])?;

        let mut applied = 0usize;
        let result = (|| -> Result<()> {
            let mut stmt = conn.prepare_cached(INSERT_SQL)?;
            for item in items {
                debug_assert_eq!(item.source_id, source_id);
                bind_item(&mut stmt, item)?;
                applied += 1;
            }
            Ok(())
        })();

        match result {
            Ok(()) => {
                conn.execute("COMMIT", [])?;
                debug!(source = source_id, applied, "inventory upserted");
                Ok(applied)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    pub fn clear_sale_owns_flags(&self, source_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE inventory_items SET sale_owns_style = 0 WHERE source_id = ?1",
            [source_id],
        )?;
        Ok(changed)
    }

    /// Remove a regular source's rows whose style is owned by a linked sale
    /// source. Styles are matched case-insensitively.
    pub fn remove_items_by_styles(&self, source_id: &str, styles: &[String]) -> Result<usize> {
        if styles.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock();

        // SQLite caps bound variables; chunk conservatively.
        const MAX_VARS: usize = 500;
        let mut removed = 0usize;
        for chunk in styles.chunks(MAX_VARS) {
            let placeholders: String = (0..chunk.len())
                .map(|i| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(",");
            let sql = format!(
                "DELETE FROM inventory_items
                 WHERE source_id = ?1 AND UPPER(style) IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut params_vec: Vec<&dyn rusqlite::ToSql> = vec![&source_id];
            let upper: Vec<String> = chunk.iter().map(|s| s.to_uppercase()).collect();
            for s in &upper {
                params_vec.push(s);
            }
            removed += stmt.execute(params_vec.as_slice())?;
        }
        Ok(removed)
    }

    pub fn styles_for_source(&self, source_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT DISTINCT style FROM inventory_items WHERE source_id = ?1",
        )?;
        let styles = stmt
            .query_map([source_id], |row| row.get(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(styles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Variant;

    fn item(source: &str, style: &str, color: &str, size: &str, stock: u32) -> ImportedItem {
        ImportedItem::from_variant(source, None, Variant::new(style, color, size, stock))
    }

    #[test]
    fn replace_is_atomic_and_complete() {
        let db = InventoryDb::in_memory().unwrap();
        db.replace_source_inventory("s1", &[item("s1", "A", "Red", "4", 1)])
            .unwrap();
        assert_eq!(db.count_items("s1").unwrap(), 1);

        db.replace_source_inventory(
            "s1",
            &[
                item("s1", "B", "Navy", "6", 2),
                item("s1", "C", "Black", "8", 3),
            ],
        )
        .unwrap();

        let items = db.get_items("s1").unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.variant.style != "A"));
    }

    #[test]
    fn upsert_preserves_unseen_rows() {
        let db = InventoryDb::in_memory().unwrap();
        db.replace_source_inventory(
            "s1",
            &[
                item("s1", "A", "Red", "4", 1),
                item("s1", "B", "Navy", "6", 2),
            ],
        )
        .unwrap();

        let mut updated = item("s1", "A", "Red", "4", 9);
        updated.variant.rebuild_sku();
        db.upsert_inventory("s1", &[updated]).unwrap();

        let items = db.get_items("s1").unwrap();
        assert_eq!(items.len(), 2);
        let a = items.iter().find(|i| i.variant.style == "A").unwrap();
        assert_eq!(a.variant.stock, 9);
    }

    #[test]
    fn style_removal_is_case_insensitive() {
        let db = InventoryDb::in_memory().unwrap();
        db.replace_source_inventory(
            "s1",
            &[
                item("s1", "Jovani 1012", "Red", "4", 1),
                item("s1", "Jovani 1014", "Red", "4", 1),
            ],
        )
        .unwrap();

        let removed = db
            .remove_items_by_styles("s1", &["JOVANI 1012".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.count_items("s1").unwrap(), 1);
    }

    #[test]
    fn sources_are_isolated() {
        let db = InventoryDb::in_memory().unwrap();
        db.replace_source_inventory("s1", &[item("s1", "A", "Red", "4", 1)])
            .unwrap();
        db.replace_source_inventory("s2", &[item("s2", "A", "Red", "4", 1)])
            .unwrap();

        db.replace_source_inventory("s1", &[]).unwrap();
        assert_eq!(db.count_items("s1").unwrap(), 0);
        assert_eq!(db.count_items("s2").unwrap(), 1);
    }
}
