//! ImportStats snapshot builder (pipeline step 19).

use chrono::Utc;
use std::collections::{BTreeSet, HashMap};

use crate::models::{ImportStats, ProductSummary, Variant};
use crate::sources::DataSource;

const MAX_STYLES: usize = 2000;
const MAX_COLORS: usize = 500;
const MAX_SKUS_PER_STYLE: usize = 50;

pub fn build_import_stats(variants: &[Variant], source: &DataSource, prefix: &str) -> ImportStats {
    let mut styles: BTreeSet<String> = BTreeSet::new();
    let mut colors: BTreeSet<String> = BTreeSet::new();
    let mut products: HashMap<String, ProductSummary> = HashMap::new();

    let mut total_stock: u64 = 0;
    let mut items_with_price = 0;
    let mut items_with_ship_date = 0;
    let mut discontinued_count = 0;
    let mut expanded_size_count = 0;

    for v in variants {
        styles.insert(v.style.clone());
        colors.insert(v.color.clone());
        total_stock += v.stock as u64;
        if v.price.is_some() {
            items_with_price += 1;
        }
        if v.ship_date.is_some() {
            items_with_ship_date += 1;
        }
        if v.discontinued {
            discontinued_count += 1;
        }
        if v.is_expanded_size {
            expanded_size_count += 1;
        }

        let product = products.entry(v.style.clone()).or_default();
        product.variant_count += 1;
        product.total_stock += v.stock as u64;
        if !product.colors.contains(&v.color) {
            product.colors.push(v.color.clone());
        }
        if !product.sizes.contains(&v.size) {
            product.sizes.push(v.size.clone());
        }
        product.has_discontinued |= v.discontinued;
        product.has_future_stock |= v.has_future_stock;
        if product.skus.len() < MAX_SKUS_PER_STYLE {
            product.skus.push(v.sku.clone());
        }
    }

    ImportStats {
        timestamp: Utc::now().to_rfc3339(),
        source_kind: source.kind.as_str().to_string(),
        item_count: variants.len(),
        total_stock,
        unique_style_count: styles.len(),
        unique_color_count: colors.len(),
        items_with_price,
        items_with_ship_date,
        discontinued_count,
        expanded_size_count,
        styles: styles.into_iter().take(MAX_STYLES).collect(),
        colors: colors.into_iter().take(MAX_COLORS).collect(),
        products,
        prefix: prefix.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;

    #[test]
    fn rollups_and_caps() {
        let source = DataSource::new("s1", "Vendor", SourceKind::Manual);
        let mut variants = vec![
            Variant::new("A", "Red", "4", 2),
            Variant::new("A", "Navy", "6", 3),
            Variant::new("B", "Red", "4", 0),
        ];
        variants[2].is_expanded_size = true;
        variants[0].price = Some(100.0);

        let stats = build_import_stats(&variants, &source, "Vendor");
        assert_eq!(stats.item_count, 3);
        assert_eq!(stats.total_stock, 5);
        assert_eq!(stats.unique_style_count, 2);
        assert_eq!(stats.unique_color_count, 2);
        assert_eq!(stats.items_with_price, 1);
        assert_eq!(stats.expanded_size_count, 1);

        let a = stats.products.get("A").unwrap();
        assert_eq!(a.variant_count, 2);
        assert_eq!(a.total_stock, 5);
        assert_eq!(a.colors.len(), 2);
    }
}
