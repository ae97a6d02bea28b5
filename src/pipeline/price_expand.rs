//! Price-tiered size expansion.
//!
//! Marketplace prices (cached by SKU) roll up to a per-style price, the
//! highest across colors winning. Each variant picks the first matching
//! tier by that price and expands along its own numeric ladder; styles
//! with no cached price use the default expansion counts.

use std::collections::{HashMap, HashSet};

use crate::formats::sizes;
use crate::models::{ImportRunStats, Variant};
use crate::pipeline::variant_rules::effective_bounds;
use crate::sources::{PriceExpansionConfig, SizeLimitConfig};

/// Roll cached SKU prices up to style level; highest price wins.
pub fn style_price_map(variants: &[Variant], sku_prices: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut by_style: HashMap<String, f64> = HashMap::new();
    for v in variants {
        if let Some(price) = sku_prices.get(&v.sku) {
            let entry = by_style.entry(v.style.clone()).or_insert(*price);
            if *price > *entry {
                *entry = *price;
            }
        }
    }
    by_style
}

fn expansion_counts(cfg: &PriceExpansionConfig, style_price: Option<f64>) -> (u32, u32) {
    if let Some(price) = style_price {
        for tier in &cfg.tiers {
            let upper_ok = tier.max_price.map(|m| price <= m).unwrap_or(true);
            if price >= tier.min_price && upper_ok {
                return (tier.expand_down, tier.expand_up);
            }
        }
    }
    (cfg.default_expand_down, cfg.default_expand_up)
}

pub fn expand_by_price(
    mut variants: Vec<Variant>,
    cfg: &PriceExpansionConfig,
    size_limit: Option<&SizeLimitConfig>,
    sku_prices: &HashMap<String, f64>,
    stats: &mut ImportRunStats,
) -> Vec<Variant> {
    if !cfg.enabled {
        return variants;
    }

    let prices = style_price_map(&variants, sku_prices);
    let mut seen: HashSet<(String, String, String)> =
        variants.iter().map(|v| v.identity_key()).collect();
    let mut expanded = Vec::new();

    for v in &variants {
        let (down, up) = expansion_counts(cfg, prices.get(&v.style).copied());
        if down == 0 && up == 0 {
            continue;
        }

        for size in sizes::neighbors(&v.size, down, up) {
            if let Some(limit) = size_limit {
                if !sizes::within_bounds(&size, effective_bounds(limit, &v.style)) {
                    continue;
                }
            }
            let mut clone = v.clone();
            clone.size = size;
            clone.is_expanded_size = true;
            clone.expanded_from = Some(v.size.clone());
            clone.rebuild_sku();
            if seen.insert(clone.identity_key()) {
                stats.price_expanded_added += 1;
                expanded.push(clone);
            }
        }
    }

    variants.extend(expanded);
    variants
}
