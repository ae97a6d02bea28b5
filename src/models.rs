//! Canonical pipeline records.
//!
//! Every acquisition channel and every layout parser funnels into `Variant`,
//! the only record type that flows through the import pipeline. Identity is
//! the (style, color, size) tuple; the SKU is a derived, sanitized string
//! that is rebuilt whenever style or color changes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::formats::dates;

/// Build the derived SKU: `{style}-{color}-{size}` with `/` and whitespace
/// folded to `-` and runs of `-` collapsed.
pub fn build_sku(style: &str, color: &str, size: &str) -> String {
    let joined = format!("{}-{}-{}", style, color, size);
    let mut out = String::with_capacity(joined.len());
    let mut prev_dash = false;
    for ch in joined.chars() {
        let mapped = if ch == '/' || ch.is_whitespace() { '-' } else { ch };
        if mapped == '-' {
            if !prev_dash {
                out.push('-');
            }
            prev_dash = true;
        } else {
            out.push(mapped);
            prev_dash = false;
        }
    }
    out
}

/// A single inventory variant: one (style, color, size) row.
///
/// `size` is a string and the literal `"0"` is a valid size — never apply
/// truthy-string shortcuts to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub style: String,
    pub color: String,
    pub size: String,
    /// Derived from (style, color, size); rebuilt via [`Variant::rebuild_sku`].
    pub sku: String,
    pub stock: u32,
    pub price: Option<f64>,
    pub cost: Option<f64>,
    /// Ship date string, normalized toward ISO `YYYY-MM-DD` as it moves
    /// through the pipeline.
    pub ship_date: Option<String>,
    #[serde(default)]
    pub discontinued: bool,
    #[serde(default)]
    pub has_future_stock: bool,
    #[serde(default)]
    pub preserve_zero_stock: bool,
    #[serde(default)]
    pub is_expanded_size: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_from: Option<String>,
    #[serde(default)]
    pub should_skip: bool,
    #[serde(default)]
    pub skip_unless_continue_selling: bool,
    #[serde(default)]
    pub special_order: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock_info: Option<String>,
    /// Raw source cells keyed by header, kept for complex-stock patterns and
    /// conditional rules that need to look back at the original text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<HashMap<String, String>>,
}

impl Variant {
    pub fn new(
        style: impl Into<String>,
        color: impl Into<String>,
        size: impl Into<String>,
        stock: u32,
    ) -> Self {
        let style = style.into();
        let color = color.into();
        let size = size.into();
        let sku = build_sku(&style, &color, &size);
        Self {
            style,
            color,
            size,
            sku,
            stock,
            price: None,
            cost: None,
            ship_date: None,
            discontinued: false,
            has_future_stock: false,
            preserve_zero_stock: false,
            is_expanded_size: false,
            expanded_from: None,
            should_skip: false,
            skip_unless_continue_selling: false,
            special_order: false,
            brand: None,
            stock_info: None,
            raw: None,
        }
    }

    /// Recompute the SKU after any change to style or color.
    pub fn rebuild_sku(&mut self) {
        self.sku = build_sku(&self.style, &self.color, &self.size);
    }

    /// Dedupe key: case-insensitive on style and color, exact on size.
    pub fn identity_key(&self) -> (String, String, String) {
        (
            self.style.trim().to_uppercase(),
            self.color.trim().to_uppercase(),
            self.size.trim().to_string(),
        )
    }

    pub fn raw_cell(&self, header: &str) -> Option<&str> {
        self.raw.as_ref()?.get(header).map(|s| s.as_str())
    }

    /// Raw-cell lookup tolerant of header-case differences between the
    /// feed and the config that names the column.
    pub fn raw_cell_ci(&self, header: &str) -> Option<&str> {
        let raw = self.raw.as_ref()?;
        if let Some(v) = raw.get(header) {
            return Some(v.as_str());
        }
        let wanted = header.trim().to_uppercase();
        raw.iter()
            .find(|(k, _)| k.trim().to_uppercase() == wanted)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_raw_cell(&mut self, header: &str, value: &str) {
        self.raw
            .get_or_insert_with(HashMap::new)
            .insert(header.to_string(), value.to_string());
    }

    pub fn parsed_ship_date(&self) -> Option<NaiveDate> {
        dates::parse_date_flexible(self.ship_date.as_deref()?, false)
    }

    /// True when the ship date parses and lands strictly after `today`.
    pub fn has_future_ship_date(&self, today: NaiveDate) -> bool {
        match self.parsed_ship_date() {
            Some(d) => d > today,
            None => false,
        }
    }

    /// A zero-stock variant survives zero-stock filtering when any of the
    /// future-stock signals is present.
    pub fn zero_stock_protected(&self, today: NaiveDate) -> bool {
        self.has_future_stock || self.preserve_zero_stock || self.has_future_ship_date(today)
    }
}

/// A persisted variant, tagged with its owning source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedItem {
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default)]
    pub sale_owns_style: bool,
    #[serde(flatten)]
    pub variant: Variant,
}

impl ImportedItem {
    pub fn from_variant(source_id: &str, file_id: Option<&str>, variant: Variant) -> Self {
        Self {
            source_id: source_id.to_string(),
            file_id: file_id.map(|s| s.to_string()),
            sale_owns_style: false,
            variant,
        }
    }
}

/// One (sale source, style) ownership row in the discontinued-styles
/// registry. Regular sources linked to the sale source exclude active styles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscontinuedStyleRegistration {
    pub sale_source_id: String,
    pub style: String,
    pub active: bool,
}

/// Global (bad color, good color) mapping row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorMapping {
    pub bad: String,
    pub good: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagedFileStatus {
    Staged,
    Imported,
    Error,
}

impl StagedFileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagedFileStatus::Staged => "staged",
            StagedFileStatus::Imported => "imported",
            StagedFileStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "staged" => Some(Self::Staged),
            "imported" => Some(Self::Imported),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A parsed file parked between acquisition and a multi-file combine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedFile {
    pub id: String,
    pub source_id: String,
    pub file_name: String,
    pub status: StagedFileStatus,
    pub header: Vec<String>,
    /// Variants extracted at staging time, already prefixed so the combine
    /// path matches the per-file import path.
    pub items: Vec<Variant>,
    pub staged_at: String,
}

/// Per-style rollup inside [`ImportStats`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductSummary {
    pub variant_count: usize,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub total_stock: u64,
    pub has_discontinued: bool,
    pub has_future_stock: bool,
    /// Capped at 50 per style.
    pub skus: Vec<String>,
}

/// Snapshot written at the end of each successful run; the next run's
/// historical delta checks read it back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportStats {
    pub timestamp: String,
    pub source_kind: String,
    pub item_count: usize,
    pub total_stock: u64,
    pub unique_style_count: usize,
    pub unique_color_count: usize,
    pub items_with_price: usize,
    pub items_with_ship_date: usize,
    pub discontinued_count: usize,
    pub expanded_size_count: usize,
    /// Capped at 2000.
    pub styles: Vec<String>,
    /// Capped at 500.
    pub colors: Vec<String>,
    pub products: HashMap<String, ProductSummary>,
    pub prefix: String,
}

/// Per-run rule-outcome counters, accumulated by the orchestrator and
/// returned in the pipeline result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportRunStats {
    pub rows_parsed: usize,
    pub skip_filtered: usize,
    pub discontinued_zero_stock_removed: usize,
    pub duplicates_merged: usize,
    pub stale_dates_zeroed: usize,
    pub no_size_dropped: usize,
    pub value_replacements: usize,
    pub dates_normalized: usize,
    pub stock_text_mapped: usize,
    pub complex_patterns_matched: usize,
    pub discontinued_filtered: usize,
    pub required_field_dropped: usize,
    pub zero_price_dropped: usize,
    pub price_out_of_range: usize,
    pub sale_prices_applied: usize,
    pub below_min_stock_dropped: usize,
    pub size_limit_dropped: usize,
    pub zero_stock_dropped: usize,
    pub expanded_added: usize,
    pub price_expanded_added: usize,
    pub sale_styles_excluded: usize,
    pub colors_remapped: usize,
    pub color_suggestions_applied: usize,
    pub color_suggestions_deferred: usize,
    pub warnings: Vec<String>,
}

impl ImportRunStats {
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Structured result of a tripped pre-write safety net. The store is never
/// mutated when one of these is returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyBlock {
    pub message: String,
    pub existing_count: usize,
    pub new_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_percent: Option<f64>,
}

/// What every acquisition adapter gets back from the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub item_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    pub stats: ImportRunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<crate::validation::ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_block: Option<SafetyBlock>,
}

impl PipelineResult {
    pub fn blocked(block: SafetyBlock, stats: ImportRunStats) -> Self {
        Self {
            success: false,
            item_count: 0,
            file_id: None,
            stats,
            validation: None,
            error: Some(block.message.clone()),
            safety_block: Some(block),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_folds_slashes_and_whitespace() {
        assert_eq!(build_sku("JVN 123", "Red/White", "8"), "JVN-123-Red-White-8");
    }

    #[test]
    fn sku_collapses_dash_runs() {
        assert_eq!(build_sku("A - B", "Navy", "10"), "A-B-Navy-10");
    }

    #[test]
    fn zero_is_a_valid_size() {
        let v = Variant::new("1000", "Black", "0", 3);
        assert_eq!(v.size, "0");
        assert_eq!(v.sku, "1000-Black-0");
    }

    #[test]
    fn identity_key_is_case_insensitive_on_style_and_color() {
        let a = Variant::new("ab12", "red", "4", 1);
        let b = Variant::new("AB12", "RED", "4", 9);
        assert_eq!(a.identity_key(), b.identity_key());
    }

    #[test]
    fn future_ship_date_detection() {
        let mut v = Variant::new("1", "Red", "4", 0);
        v.ship_date = Some("2030-01-15".to_string());
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert!(v.has_future_ship_date(today));
        assert!(v.zero_stock_protected(today));

        v.ship_date = Some("2020-01-15".to_string());
        assert!(!v.has_future_ship_date(today));
        assert!(!v.zero_stock_protected(today));
    }
}
