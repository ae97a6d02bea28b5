//! Cleaning pass: style text, size presence, color case, dedupe.
//!
//! The advisor round-trip is split out so the orchestrator can batch it:
//! `colors_needing_suggestion` collects codes, the orchestrator awaits the
//! advisor, and `apply_color_suggestions` folds the answers back in.
//! Global color mappings are deliberately NOT consulted here; the second
//! mapping pass after the rule engine is the authoritative one.

use regex::{escape, RegexBuilder};
use std::collections::HashMap;

use crate::colors;
use crate::colors::advisor::ColorSuggestion;
use crate::models::{ImportRunStats, Variant};
use crate::sources::CleaningConfig;

/// Style-field cleaning: trim, collapse whitespace runs, then the
/// configured rules in order — positional removal, find/replace,
/// remove-patterns.
pub fn clean_style(raw: &str, cfg: &CleaningConfig) -> String {
    let mut style = if cfg.trims_whitespace() {
        raw.trim().split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        raw.to_string()
    };

    if cfg.remove_first_n > 0 {
        style = style.chars().skip(cfg.remove_first_n).collect();
    }
    if cfg.remove_last_n > 0 {
        let keep = style.chars().count().saturating_sub(cfg.remove_last_n);
        style = style.chars().take(keep).collect();
    }

    for rule in &cfg.find_replace_rules {
        if rule.find.is_empty() {
            continue;
        }
        if let Ok(re) = RegexBuilder::new(&rule.find).case_insensitive(true).build() {
            style = re.replace_all(&style, rule.replace_with.as_str()).into_owned();
        }
    }

    for pattern in &cfg.remove_patterns {
        if pattern.is_empty() {
            continue;
        }
        if let Ok(re) = RegexBuilder::new(&escape(pattern))
            .case_insensitive(true)
            .build()
        {
            style = re.replace_all(&style, "").into_owned();
        }
    }

    style.trim().to_string()
}

/// Synchronous part of the cleaning pass: style/color normalization,
/// no-size cull, dedupe, SKU rebuild.
pub fn clean_variants(variants: Vec<Variant>, stats: &mut ImportRunStats) -> Vec<Variant> {
    let mut cleaned: Vec<Variant> = Vec::with_capacity(variants.len());
    for mut v in variants {
        v.style = v.style.trim().split_whitespace().collect::<Vec<_>>().join(" ");

        // "0" is a real size; only truly empty sizes are culled.
        if v.size.trim().is_empty() {
            stats.no_size_dropped += 1;
            continue;
        }
        v.size = v.size.trim().to_string();

        v.color = colors::title_case_color(&colors::normalize_color(&v.color));
        v.rebuild_sku();
        cleaned.push(v);
    }

    dedupe_variants(cleaned, stats)
}

/// Group by (style, color, size) and keep the highest-stock record,
/// merging the ship date from a losing sibling when the winner has none.
pub fn dedupe_variants(variants: Vec<Variant>, stats: &mut ImportRunStats) -> Vec<Variant> {
    let mut order: Vec<(String, String, String)> = Vec::new();
    let mut by_key: HashMap<(String, String, String), Variant> = HashMap::new();

    for v in variants {
        let key = v.identity_key();
        match by_key.get_mut(&key) {
            None => {
                order.push(key.clone());
                by_key.insert(key, v);
            }
            Some(existing) => {
                stats.duplicates_merged += 1;
                if v.stock > existing.stock {
                    let fallback_date = existing.ship_date.clone();
                    let mut winner = v;
                    if winner.ship_date.is_none() {
                        winner.ship_date = fallback_date;
                    }
                    *existing = winner;
                } else if existing.ship_date.is_none() {
                    existing.ship_date = v.ship_date;
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}

/// Distinct colors that should be batched to the advisor: not recognized
/// English color words and not already resolvable.
pub fn colors_needing_suggestion(variants: &[Variant]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for v in variants {
        let color = v.color.trim();
        if color.is_empty() || !colors::needs_suggestion(color) {
            continue;
        }
        let key = color.to_uppercase();
        if seen.insert(key) {
            out.push(color.to_string());
        }
    }
    out
}

/// Fold advisor answers back in. Suggestions at or above `threshold` are
/// applied; the rest are returned for the review queue.
pub fn apply_color_suggestions(
    variants: &mut [Variant],
    suggestions: &[ColorSuggestion],
    threshold: f64,
    stats: &mut ImportRunStats,
) -> Vec<ColorSuggestion> {
    let mut deferred = Vec::new();
    let mut applied: HashMap<String, String> = HashMap::new();

    for s in suggestions {
        if s.confidence >= threshold {
            applied.insert(s.bad.trim().to_uppercase(), s.good.clone());
        } else {
            deferred.push(s.clone());
        }
    }

    if !applied.is_empty() {
        for v in variants.iter_mut() {
            if let Some(good) = applied.get(&v.color.trim().to_uppercase()) {
                v.color = colors::title_case_color(good);
                v.rebuild_sku();
                stats.color_suggestions_applied += 1;
            }
        }
    }
    stats.color_suggestions_deferred += deferred.len();
    deferred
}

/// The authoritative global-mapping pass (pipeline step after the rule
/// engine). Idempotent: mapped values that map to themselves are skipped.
pub fn apply_global_color_mappings(
    variants: &mut [Variant],
    mappings: &HashMap<String, String>,
    stats: &mut ImportRunStats,
) {
    if mappings.is_empty() {
        return;
    }
    for v in variants.iter_mut() {
        if let Some(good) = colors::apply_mapping(&v.color, mappings) {
            let titled = colors::title_case_color(&good);
            if titled != v.color {
                v.color = titled;
                v.rebuild_sku();
                stats.colors_remapped += 1;
            }
        }
    }
}
