//! `apply_import_rules`: the ordered, configurable business-rule chain.
//!
//! Rule order is fixed; each rule reads its block from the source config
//! and is skipped when the block is absent. The engine mutates the stream
//! and counts every outcome in the run stats.

use chrono::NaiveDate;
use regex::RegexBuilder;
use tracing::debug;

use crate::formats::{dates, stock, RAW_STOCK_KEY};
use crate::models::{ImportRunStats, Variant};
use crate::sources::{DataSource, PriceRangeAction};

/// Apply rules 1–11 in order. Returns the surviving stream.
pub fn apply_import_rules(
    mut variants: Vec<Variant>,
    source: &DataSource,
    today: NaiveDate,
    stats: &mut ImportRunStats,
) -> Vec<Variant> {
    let cfg = &source.config;

    // 1. Per-field literal value replacements.
    if !cfg.value_replacement_rules.is_empty() {
        for v in variants.iter_mut() {
            for rule in &cfg.value_replacement_rules {
                let target = match rule.field.as_str() {
                    "style" => Some(&mut v.style),
                    "color" => Some(&mut v.color),
                    "size" => Some(&mut v.size),
                    _ => None,
                };
                if let Some(field) = target {
                    if field.contains(&rule.find) {
                        *field = field.replace(&rule.find, &rule.replace_with);
                        stats.value_replacements += 1;
                    }
                } else if rule.field == "shipDate" {
                    if let Some(date) = v.ship_date.as_mut() {
                        if date.contains(&rule.find) {
                            *date = date.replace(&rule.find, &rule.replace_with);
                            stats.value_replacements += 1;
                        }
                    }
                } else if rule.field == "stock" {
                    if let Some(raw) = v.raw_cell(RAW_STOCK_KEY).map(|s| s.to_string()) {
                        if raw.contains(&rule.find) {
                            let replaced = raw.replace(&rule.find, &rule.replace_with);
                            if let Some(n) = stock::parse_stock(&replaced, &cfg.stock_text_mappings)
                            {
                                v.stock = n;
                            }
                            v.set_raw_cell(RAW_STOCK_KEY, &replaced);
                            stats.value_replacements += 1;
                        }
                    }
                }
            }
            v.rebuild_sku();
        }
    }

    // 2. Ship-date format normalization toward ISO, honoring the source's
    //    US/European preference.
    let european = cfg.european_dates();
    for v in variants.iter_mut() {
        if let Some(raw) = v.ship_date.clone() {
            if let Some(parsed) = dates::parse_date_flexible(&raw, european) {
                let iso = dates::to_iso(parsed);
                if iso != raw {
                    stats.dates_normalized += 1;
                }
                v.ship_date = Some(iso);
            }
        }
    }

    // 3. Stock-text mappings over stock cells that survived parsing as text.
    if !cfg.stock_text_mappings.is_empty() {
        for v in variants.iter_mut() {
            let Some(raw) = v.raw_cell(RAW_STOCK_KEY) else {
                continue;
            };
            if raw.trim().parse::<i64>().is_ok() {
                continue;
            }
            if let Some(n) = stock::parse_stock(raw, &cfg.stock_text_mappings) {
                if n != v.stock {
                    v.stock = n;
                    stats.stock_text_mapped += 1;
                }
            }
        }
    }

    // 4. Complex-stock patterns against the raw stock cell.
    if let Some(complex) = &cfg.complex_stock_config {
        let compiled: Vec<_> = complex
            .patterns
            .iter()
            .filter_map(|p| {
                RegexBuilder::new(&p.pattern)
                    .case_insensitive(true)
                    .build()
                    .ok()
                    .map(|re| (p, re))
            })
            .collect();

        for v in variants.iter_mut() {
            let Some(raw) = v.raw_cell(RAW_STOCK_KEY).map(|s| s.to_string()) else {
                continue;
            };
            for (pattern, re) in &compiled {
                let Some(caps) = re.captures(&raw) else {
                    continue;
                };
                stats.complex_patterns_matched += 1;

                if let Some(template) = &pattern.extract_stock {
                    let mut expanded = String::new();
                    caps.expand(template, &mut expanded);
                    if let Some(n) = stock::parse_stock(&expanded, &cfg.stock_text_mappings) {
                        v.stock = n;
                    }
                }
                if let Some(template) = &pattern.extract_date {
                    let mut expanded = String::new();
                    caps.expand(template, &mut expanded);
                    if let Some(d) = dates::parse_date_flexible(&expanded, european) {
                        v.ship_date = Some(dates::to_iso(d));
                    }
                }
                if pattern.mark_discontinued {
                    v.discontinued = true;
                }
                if pattern.mark_special_order {
                    v.special_order = true;
                }
                break;
            }
        }
    }

    // 5. Discontinued detection by keyword, optionally dropping matches.
    if let Some(disc) = &cfg.discontinued_config {
        let keywords: Vec<String> = disc.keywords.iter().map(|k| k.to_lowercase()).collect();
        if !keywords.is_empty() {
            for v in variants.iter_mut() {
                let haystack = match &disc.column {
                    Some(col) => v.raw_cell_ci(col).unwrap_or("").to_lowercase(),
                    None => v
                        .raw_cell(RAW_STOCK_KEY)
                        .unwrap_or(if v.discontinued { "discontinued" } else { "" })
                        .to_lowercase(),
                };
                if keywords.iter().any(|k| !k.is_empty() && haystack.contains(k)) {
                    v.discontinued = true;
                }
            }
        }
        if disc.skip_discontinued {
            let before = variants.len();
            variants.retain(|v| !v.discontinued);
            stats.discontinued_filtered += before - variants.len();
        }
    }

    // 6. Required fields.
    if !cfg.required_fields.is_empty() {
        let before = variants.len();
        variants.retain(|v| {
            cfg.required_fields.iter().all(|f| match f.as_str() {
                "style" => !v.style.trim().is_empty(),
                "color" => !v.color.trim().is_empty(),
                "size" => !v.size.trim().is_empty(),
                "price" => v.price.is_some(),
                "shipDate" => v.ship_date.is_some(),
                _ => true,
            })
        });
        stats.required_field_dropped += before - variants.len();
    }

    // 7. Future-stock config. "Future" honors the stock-info date offset.
    let offset_days = cfg
        .stock_info_config
        .as_ref()
        .map(|c| c.date_offset_days)
        .unwrap_or(0);
    let future_with_offset = |v: &Variant| {
        v.parsed_ship_date()
            .map(|d| d + chrono::Duration::days(offset_days) > today)
            .unwrap_or(false)
    };
    if let Some(future) = &cfg.future_stock_config {
        for v in variants.iter_mut() {
            if future.use_future_date_as_ship_date {
                if let Some(col) = &future.future_date_column {
                    if let Some(raw) = v.raw_cell_ci(col).map(|s| s.to_string()) {
                        if let Some(d) = dates::parse_date_flexible(&raw, european) {
                            v.ship_date = Some(dates::to_iso(d));
                        }
                    }
                }
            }
            if future.date_only_mode && future_with_offset(v) {
                v.has_future_stock = true;
            }
            // Invariant: zero stock with a valid future date is future stock.
            if v.stock == 0 && future_with_offset(v) {
                v.has_future_stock = true;
            }
        }
    } else {
        for v in variants.iter_mut() {
            if v.stock == 0 && future_with_offset(v) {
                v.has_future_stock = true;
            }
        }
    }

    // 8. Regular price config.
    if let Some(regular) = &cfg.regular_price_config {
        if regular.skip_zero_price {
            let before = variants.len();
            variants.retain(|v| v.price.map(|p| p != 0.0).unwrap_or(true));
            stats.zero_price_dropped += before - variants.len();
        }
        if let Some(multiplier) = regular.multiplier {
            for v in variants.iter_mut() {
                if let Some(p) = v.price {
                    v.price = Some(p * multiplier);
                }
            }
        }
    }

    // 9. Price floor / ceiling.
    if let Some(range) = &cfg.price_floor_ceiling {
        let floor = range.floor;
        let ceiling = range.ceiling;
        match range.action {
            PriceRangeAction::Clamp => {
                for v in variants.iter_mut() {
                    if let Some(p) = v.price {
                        let mut clamped = p;
                        if let Some(f) = floor {
                            clamped = clamped.max(f);
                        }
                        if let Some(c) = ceiling {
                            clamped = clamped.min(c);
                        }
                        if clamped != p {
                            stats.price_out_of_range += 1;
                            v.price = Some(clamped);
                        }
                    }
                }
            }
            PriceRangeAction::Drop => {
                let before = variants.len();
                variants.retain(|v| match v.price {
                    None => true,
                    Some(p) => {
                        floor.map(|f| p >= f).unwrap_or(true)
                            && ceiling.map(|c| p <= c).unwrap_or(true)
                    }
                });
                stats.price_out_of_range += before - variants.len();
            }
        }
    }

    // 10. Column-based sale pricing. Compare-at stamping happens in the
    //     sale-pricing pipeline step.
    if let Some(sale) = cfg.effective_sale_price() {
        for v in variants.iter_mut() {
            let Some(raw) = v.raw_cell_ci(&sale.column) else {
                continue;
            };
            let cleaned: String = raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(sale_price) = cleaned.parse::<f64>() {
                if sale_price > 0.0 {
                    v.price = Some(sale_price * sale.multiplier);
                    stats.sale_prices_applied += 1;
                }
            }
        }
    }

    // 11. Minimum-stock threshold.
    if let Some(min_stock) = &cfg.min_stock_config {
        let before = variants.len();
        variants.retain(|v| v.stock >= min_stock.threshold || v.preserve_zero_stock);
        stats.below_min_stock_dropped += before - variants.len();
    }

    debug!(
        source = %source.id,
        survived = variants.len(),
        "import rules applied"
    );
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::RAW_STOCK_KEY;
    use crate::sources::{
        ComplexStockConfig, ComplexStockPattern, DataSource, DiscontinuedConfig,
        FutureStockConfig, MinStockConfig, PriceFloorCeilingConfig, RegularPriceConfig,
        SalePriceConfig, SourceKind, ValueReplacementRule,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    fn source() -> DataSource {
        DataSource::new("s1", "Vendor", SourceKind::Manual)
    }

    #[test]
    fn value_replacement_rebuilds_sku() {
        let mut src = source();
        src.config.value_replacement_rules = vec![ValueReplacementRule {
            field: "color".into(),
            find: "Blk".into(),
            replace_with: "Black".into(),
        }];
        let mut stats = ImportRunStats::default();
        let out = apply_import_rules(
            vec![Variant::new("A", "Blk", "4", 1)],
            &src,
            today(),
            &mut stats,
        );
        assert_eq!(out[0].color, "Black");
        assert_eq!(out[0].sku, "A-Black-4");
        assert_eq!(stats.value_replacements, 1);
    }

    #[test]
    fn date_normalization_to_iso() {
        let src = source();
        let mut stats = ImportRunStats::default();
        let mut v = Variant::new("A", "Red", "4", 1);
        v.ship_date = Some("3/24/2026".into());
        let out = apply_import_rules(vec![v], &src, today(), &mut stats);
        assert_eq!(out[0].ship_date.as_deref(), Some("2026-03-24"));
        assert_eq!(stats.dates_normalized, 1);
    }

    #[test]
    fn complex_pattern_backreference_and_flags() {
        let mut src = source();
        src.config.complex_stock_config = Some(ComplexStockConfig {
            patterns: vec![ComplexStockPattern {
                name: "eta".into(),
                pattern: r"ETA (\d+/\d+/\d+)".into(),
                extract_stock: Some("0".into()),
                extract_date: Some("$1".into()),
                mark_discontinued: false,
                mark_special_order: true,
            }],
        });
        let mut stats = ImportRunStats::default();
        let mut v = Variant::new("A", "Red", "4", 3);
        v.set_raw_cell(RAW_STOCK_KEY, "ETA 5/1/2026");
        let out = apply_import_rules(vec![v], &src, today(), &mut stats);
        assert_eq!(out[0].stock, 0);
        assert_eq!(out[0].ship_date.as_deref(), Some("2026-05-01"));
        assert!(out[0].special_order);
        assert_eq!(stats.complex_patterns_matched, 1);
    }

    #[test]
    fn discontinued_keywords_and_skip() {
        let mut src = source();
        src.config.discontinued_config = Some(DiscontinuedConfig {
            keywords: vec!["disc".into()],
            column: Some("Status".into()),
            skip_discontinued: true,
            continue_selling: false,
        });
        let mut stats = ImportRunStats::default();
        let mut dropped = Variant::new("A", "Red", "4", 1);
        dropped.set_raw_cell("Status", "DISCONTINUED");
        let kept = Variant::new("B", "Red", "4", 1);
        let out = apply_import_rules(vec![dropped, kept], &src, today(), &mut stats);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].style, "B");
        assert_eq!(stats.discontinued_filtered, 1);
    }

    #[test]
    fn required_fields_drop() {
        let mut src = source();
        src.config.required_fields = vec!["price".into()];
        let mut stats = ImportRunStats::default();
        let mut priced = Variant::new("A", "Red", "4", 1);
        priced.price = Some(10.0);
        let out = apply_import_rules(
            vec![priced, Variant::new("B", "Red", "4", 1)],
            &src,
            today(),
            &mut stats,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(stats.required_field_dropped, 1);
    }

    #[test]
    fn future_stock_invariant_sets_flag() {
        let src = source();
        let mut stats = ImportRunStats::default();
        let mut v = Variant::new("A", "Red", "4", 0);
        v.ship_date = Some("2026-06-01".into());
        let out = apply_import_rules(vec![v], &src, today(), &mut stats);
        assert!(out[0].has_future_stock);
    }

    #[test]
    fn date_only_mode_counts_positive_stock_too() {
        let mut src = source();
        src.config.future_stock_config = Some(FutureStockConfig {
            date_only_mode: true,
            use_future_date_as_ship_date: false,
            future_date_column: None,
        });
        let mut stats = ImportRunStats::default();
        let mut v = Variant::new("A", "Red", "4", 5);
        v.ship_date = Some("2026-06-01".into());
        let out = apply_import_rules(vec![v], &src, today(), &mut stats);
        assert!(out[0].has_future_stock);
    }

    #[test]
    fn zero_price_skip_and_floor_ceiling() {
        let mut src = source();
        src.config.regular_price_config = Some(RegularPriceConfig {
            skip_zero_price: true,
            multiplier: None,
        });
        src.config.price_floor_ceiling = Some(PriceFloorCeilingConfig {
            floor: Some(50.0),
            ceiling: Some(1000.0),
            action: PriceRangeAction::Clamp,
        });
        let mut stats = ImportRunStats::default();

        let mut zero = Variant::new("A", "Red", "4", 1);
        zero.price = Some(0.0);
        let mut low = Variant::new("B", "Red", "4", 1);
        low.price = Some(10.0);

        let out = apply_import_rules(vec![zero, low], &src, today(), &mut stats);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].price, Some(50.0));
        assert_eq!(stats.zero_price_dropped, 1);
        assert_eq!(stats.price_out_of_range, 1);
    }

    #[test]
    fn column_sale_pricing_with_multiplier() {
        let mut src = source();
        src.config.sale_price_config = Some(SalePriceConfig {
            column: "SALE".into(),
            multiplier: 0.5,
        });
        let mut stats = ImportRunStats::default();
        let mut v = Variant::new("A", "Red", "4", 1);
        v.price = Some(200.0);
        v.set_raw_cell("SALE", "$100.00");
        let out = apply_import_rules(vec![v], &src, today(), &mut stats);
        assert_eq!(out[0].price, Some(50.0));
        assert_eq!(stats.sale_prices_applied, 1);
    }

    #[test]
    fn min_stock_threshold_respects_preserved_zero() {
        let mut src = source();
        src.config.min_stock_config = Some(MinStockConfig { threshold: 2 });
        let mut stats = ImportRunStats::default();
        let mut preserved = Variant::new("A", "Red", "4", 0);
        preserved.preserve_zero_stock = true;
        let out = apply_import_rules(
            vec![preserved, Variant::new("B", "Red", "4", 1)],
            &src,
            today(),
            &mut stats,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].style, "A");
        assert_eq!(stats.below_min_stock_dropped, 1);
    }
}
