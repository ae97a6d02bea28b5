//! Per-source variant rules: size-limit filtering, zero-stock filtering,
//! and user-defined size expansion.
//!
//! Bounds resolution: the first prefix override whose pattern matches the
//! already-prefixed style wins; otherwise the source-wide bounds apply.
//! Expanded variants inherit stock, ship date and flags, carry
//! `is_expanded_size` + `expanded_from`, and must themselves pass the
//! size-limit bounds.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashSet;

use crate::formats::sizes;
use crate::models::{ImportRunStats, Variant};
use crate::sources::{SizeLimitBounds, SizeLimitConfig, VariantRulesConfig};

/// Resolve the effective bounds for one (already prefixed) style.
pub fn effective_bounds<'a>(cfg: &'a SizeLimitConfig, style: &str) -> &'a SizeLimitBounds {
    for override_rule in &cfg.prefix_overrides {
        if let Ok(re) = Regex::new(&override_rule.pattern) {
            if re.is_match(style) {
                return &override_rule.bounds;
            }
        }
    }
    &cfg.bounds
}

pub fn size_limit_filter(
    variants: Vec<Variant>,
    cfg: &SizeLimitConfig,
    stats: &mut ImportRunStats,
) -> Vec<Variant> {
    let before = variants.len();
    let out: Vec<Variant> = variants
        .into_iter()
        .filter(|v| sizes::within_bounds(&v.size, effective_bounds(cfg, &v.style)))
        .collect();
    stats.size_limit_dropped += before - out.len();
    out
}

pub fn zero_stock_filter(
    variants: Vec<Variant>,
    today: NaiveDate,
    stats: &mut ImportRunStats,
) -> Vec<Variant> {
    let before = variants.len();
    let out: Vec<Variant> = variants
        .into_iter()
        .filter(|v| v.stock > 0 || v.zero_stock_protected(today))
        .collect();
    stats.zero_stock_dropped += before - out.len();
    out
}

/// Apply user-defined size expansions. Collisions with real variants (or
/// earlier expansions) are skipped; identity stays unique.
pub fn expand_sizes(
    mut variants: Vec<Variant>,
    rules: &VariantRulesConfig,
    size_limit: Option<&SizeLimitConfig>,
    stats: &mut ImportRunStats,
) -> Vec<Variant> {
    if rules.expansions.is_empty() {
        return variants;
    }

    let mut seen: HashSet<(String, String, String)> =
        variants.iter().map(|v| v.identity_key()).collect();
    let mut expanded = Vec::new();

    for v in &variants {
        let from = sizes::normalize_size_token(&v.size);
        for rule in &rules.expansions {
            if sizes::normalize_size_token(&rule.from_size) != from {
                continue;
            }
            for add in &rule.add_sizes {
                let size = sizes::normalize_size_token(add);
                if size == from {
                    continue;
                }
                if let Some(cfg) = size_limit {
                    if !sizes::within_bounds(&size, effective_bounds(cfg, &v.style)) {
                        continue;
                    }
                }
                let mut clone = v.clone();
                clone.size = size;
                clone.is_expanded_size = true;
                clone.expanded_from = Some(v.size.clone());
                clone.rebuild_sku();
                if seen.insert(clone.identity_key()) {
                    stats.expanded_added += 1;
                    expanded.push(clone);
                }
            }
        }
    }

    variants.extend(expanded);
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{PrefixSizeOverride, SizeExpansionRule};

    fn bounds(min_n: Option<&str>, max_n: Option<&str>) -> SizeLimitBounds {
        SizeLimitBounds {
            min_numeric: min_n.map(String::from),
            max_numeric: max_n.map(String::from),
            min_letter: None,
            max_letter: None,
        }
    }

    #[test]
    fn prefix_override_wins_over_source_bounds() {
        let cfg = SizeLimitConfig {
            bounds: bounds(Some("2"), Some("20")),
            prefix_overrides: vec![PrefixSizeOverride {
                pattern: "^Jovani".into(),
                bounds: bounds(Some("2"), Some("30")),
            }],
        };

        assert_eq!(
            effective_bounds(&cfg, "Jovani 37001").max_numeric.as_deref(),
            Some("30")
        );
        assert_eq!(
            effective_bounds(&cfg, "Feriani 100").max_numeric.as_deref(),
            Some("20")
        );
    }

    #[test]
    fn size_limit_filtering() {
        let cfg = SizeLimitConfig {
            bounds: bounds(Some("2"), Some("20")),
            prefix_overrides: vec![],
        };
        let mut stats = ImportRunStats::default();
        let out = size_limit_filter(
            vec![
                Variant::new("A", "Red", "2", 1),
                Variant::new("A", "Red", "22", 1),
                Variant::new("A", "Red", "M", 1),
            ],
            &cfg,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(stats.size_limit_dropped, 1);
    }

    #[test]
    fn zero_stock_filter_respects_future_signals() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut stats = ImportRunStats::default();

        let zero = Variant::new("A", "Red", "4", 0);
        let mut dated = Variant::new("B", "Red", "4", 0);
        dated.ship_date = Some("2026-06-01".into());
        let mut preserved = Variant::new("C", "Red", "4", 0);
        preserved.preserve_zero_stock = true;

        let out = zero_stock_filter(vec![zero, dated, preserved], today, &mut stats);
        assert_eq!(out.len(), 2);
        assert_eq!(stats.zero_stock_dropped, 1);
    }

    #[test]
    fn expansion_inherits_and_tags() {
        let rules = VariantRulesConfig {
            expansions: vec![SizeExpansionRule {
                from_size: "8".into(),
                add_sizes: vec!["2".into(), "4".into(), "6".into(), "8".into(), "10".into()],
            }],
            filter_zero_stock: false,
        };
        let mut stats = ImportRunStats::default();
        let mut v = Variant::new("A", "Red", "8", 3);
        v.ship_date = Some("2026-06-01".into());

        let out = expand_sizes(vec![v], &rules, None, &mut stats);
        assert_eq!(out.len(), 5);
        let expanded: Vec<_> = out.iter().filter(|v| v.is_expanded_size).collect();
        assert_eq!(expanded.len(), 4);
        assert!(expanded
            .iter()
            .all(|v| v.stock == 3 && v.ship_date.is_some() && v.expanded_from.as_deref() == Some("8")));
    }

    #[test]
    fn expansion_respects_override_bounds() {
        let cfg = SizeLimitConfig {
            bounds: bounds(None, Some("20")),
            prefix_overrides: vec![PrefixSizeOverride {
                pattern: "^Jovani".into(),
                bounds: bounds(None, Some("30")),
            }],
        };
        let rules = VariantRulesConfig {
            expansions: vec![SizeExpansionRule {
                from_size: "24".into(),
                add_sizes: vec!["26".into(), "28".into(), "32".into()],
            }],
            filter_zero_stock: false,
        };
        let mut stats = ImportRunStats::default();

        let jovani = Variant::new("Jovani 37001", "Red", "24", 1);
        let out = expand_sizes(vec![jovani], &rules, Some(&cfg), &mut stats);
        let added: Vec<_> = out
            .iter()
            .filter(|v| v.is_expanded_size)
            .map(|v| v.size.clone())
            .collect();
        assert_eq!(added, vec!["26", "28"]);
    }

    #[test]
    fn expansion_never_duplicates_existing_identity() {
        let rules = VariantRulesConfig {
            expansions: vec![SizeExpansionRule {
                from_size: "8".into(),
                add_sizes: vec!["10".into()],
            }],
            filter_zero_stock: false,
        };
        let mut stats = ImportRunStats::default();
        let out = expand_sizes(
            vec![
                Variant::new("A", "Red", "8", 1),
                Variant::new("A", "Red", "10", 7),
            ],
            &rules,
            None,
            &mut stats,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(stats.expanded_added, 0);
    }
}
