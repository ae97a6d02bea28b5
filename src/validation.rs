//! Import validation harness.
//!
//! Five togglable check families plus spot checks. Pre-import structural
//! failures block the run; post-import failures are reported alongside the
//! committed write (safety nets, not validation, decide blocking there).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::models::{ImportStats, Variant};
use crate::sources::{SpotExpectation, ValidationConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub family: String,
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn new(family: &str, name: &str, passed: bool, detail: String) -> Self {
        Self {
            family: family.to_string(),
            name: name.to_string(),
            passed,
            detail,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub checks: Vec<CheckResult>,
    pub passed_checks: usize,
    pub total_checks: usize,
    pub accuracy: f64,
}

impl ValidationReport {
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let total_checks = checks.len();
        let passed_checks = checks.iter().filter(|c| c.passed).count();
        let accuracy = if total_checks == 0 {
            1.0
        } else {
            passed_checks as f64 / total_checks as f64
        };
        Self {
            checks,
            passed_checks,
            total_checks,
            accuracy,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passed_checks == self.total_checks
    }

    pub fn failures(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

/// Counts captured straight off the parsed file, before any transform.
/// The checksum family compares these against what was written.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceFileCounts {
    pub item_count: usize,
    pub total_stock: u64,
    pub unique_styles: usize,
    pub unique_colors: usize,
}

impl SourceFileCounts {
    pub fn from_variants(variants: &[Variant]) -> Self {
        let mut styles = HashSet::new();
        let mut colors = HashSet::new();
        let mut total_stock = 0u64;
        for v in variants {
            styles.insert(v.style.trim().to_uppercase());
            colors.insert(v.color.trim().to_uppercase());
            total_stock += v.stock as u64;
        }
        Self {
            item_count: variants.len(),
            total_stock,
            unique_styles: styles.len(),
            unique_colors: colors.len(),
        }
    }
}

/// Pre-import structural checks. Any failure here blocks the import.
pub fn run_pre_import(
    cfg: &ValidationConfig,
    headers: &[String],
    data_row_count: usize,
    previous_row_count: Option<usize>,
    multi_file: bool,
) -> Vec<CheckResult> {
    let mut checks = Vec::new();
    let Some(pre) = &cfg.pre_import else {
        return checks;
    };

    if !pre.expected_columns.is_empty() {
        let upper: Vec<String> = headers.iter().map(|h| h.trim().to_uppercase()).collect();
        let missing: Vec<&String> = pre
            .expected_columns
            .iter()
            .filter(|c| !upper.iter().any(|h| h.contains(&c.trim().to_uppercase())))
            .collect();
        checks.push(CheckResult::new(
            "pre_import",
            "expected_columns",
            missing.is_empty(),
            if missing.is_empty() {
                "all expected columns present".to_string()
            } else {
                format!("missing columns: {:?}", missing)
            },
        ));
    }

    if let Some(min) = pre.min_row_count {
        checks.push(CheckResult::new(
            "pre_import",
            "min_row_count",
            data_row_count >= min,
            format!("{} rows, minimum {}", data_row_count, min),
        ));
    }
    if let Some(max) = pre.max_row_count {
        checks.push(CheckResult::new(
            "pre_import",
            "max_row_count",
            data_row_count <= max,
            format!("{} rows, maximum {}", data_row_count, max),
        ));
    }

    // Any single file of a multi-file batch is smaller than the combined
    // total, so the drop check would always trip there.
    if !multi_file {
        if let (Some(tolerance), Some(previous)) =
            (pre.row_drop_tolerance_percent, previous_row_count)
        {
            if previous > 0 {
                let drop = if data_row_count >= previous {
                    0.0
                } else {
                    (previous - data_row_count) as f64 / previous as f64 * 100.0
                };
                checks.push(CheckResult::new(
                    "pre_import",
                    "row_count_drop",
                    drop <= tolerance,
                    format!("row count drop {:.1}%, tolerance {:.1}%", drop, tolerance),
                ));
            }
        }
    }

    checks
}

fn within_tolerance(file_value: f64, written_value: f64, tolerance_percent: f64) -> bool {
    if file_value == written_value {
        return true;
    }
    if file_value == 0.0 {
        return tolerance_percent > 0.0;
    }
    let diff = (file_value - written_value).abs() / file_value * 100.0;
    diff <= tolerance_percent
}

/// Post-import checks: checksum, distribution, historical delta, absolute
/// counts, spot checks.
pub fn run_post_import(
    cfg: &ValidationConfig,
    file_counts: &SourceFileCounts,
    written: &[Variant],
    previous: Option<&ImportStats>,
    today: NaiveDate,
) -> ValidationReport {
    let mut checks = Vec::new();
    let written_counts = SourceFileCounts::from_variants(written);

    if let Some(checksum) = &cfg.checksum {
        let t = checksum.tolerance_percent;
        for (name, file_value, written_value) in [
            (
                "item_count",
                file_counts.item_count as f64,
                written_counts.item_count as f64,
            ),
            (
                "total_stock",
                file_counts.total_stock as f64,
                written_counts.total_stock as f64,
            ),
            (
                "unique_styles",
                file_counts.unique_styles as f64,
                written_counts.unique_styles as f64,
            ),
            (
                "unique_colors",
                file_counts.unique_colors as f64,
                written_counts.unique_colors as f64,
            ),
        ] {
            checks.push(CheckResult::new(
                "checksum",
                name,
                within_tolerance(file_value, written_value, t),
                format!("file {} vs written {}", file_value, written_value),
            ));
        }
    }

    if let Some(dist) = &cfg.distribution {
        let total = written.len().max(1) as f64;
        let stocked = written.iter().filter(|v| v.stock > 0).count() as f64 / total * 100.0;
        let priced = written.iter().filter(|v| v.price.is_some()).count() as f64 / total * 100.0;
        let dated =
            written.iter().filter(|v| v.ship_date.is_some()).count() as f64 / total * 100.0;

        let mut push = |name: &str, value: f64, min: Option<f64>, max: Option<f64>| {
            let ok = min.map(|m| value >= m).unwrap_or(true)
                && max.map(|m| value <= m).unwrap_or(true);
            checks.push(CheckResult::new(
                "distribution",
                name,
                ok,
                format!("{:.1}% (bounds {:?}..{:?})", value, min, max),
            ));
        };
        if dist.min_stocked_percent.is_some() || dist.max_stocked_percent.is_some() {
            push(
                "stocked_percent",
                stocked,
                dist.min_stocked_percent,
                dist.max_stocked_percent,
            );
        }
        if dist.min_priced_percent.is_some() || dist.max_priced_percent.is_some() {
            push(
                "priced_percent",
                priced,
                dist.min_priced_percent,
                dist.max_priced_percent,
            );
        }
        if dist.min_dated_percent.is_some() || dist.max_dated_percent.is_some() {
            push(
                "dated_percent",
                dated,
                dist.min_dated_percent,
                dist.max_dated_percent,
            );
        }
    }

    if let Some(delta) = &cfg.delta {
        if let Some(prev) = previous {
            let drop_pct = |prev_value: f64, new_value: f64| {
                if prev_value <= 0.0 || new_value >= prev_value {
                    0.0
                } else {
                    (prev_value - new_value) / prev_value * 100.0
                }
            };
            if let Some(max) = delta.max_item_drop_percent {
                let drop = drop_pct(prev.item_count as f64, written_counts.item_count as f64);
                checks.push(CheckResult::new(
                    "delta",
                    "item_count_drop",
                    drop <= max,
                    format!("{:.1}% vs max {:.1}%", drop, max),
                ));
            }
            if let Some(max) = delta.max_stock_drop_percent {
                let drop = drop_pct(prev.total_stock as f64, written_counts.total_stock as f64);
                checks.push(CheckResult::new(
                    "delta",
                    "total_stock_drop",
                    drop <= max,
                    format!("{:.1}% vs max {:.1}%", drop, max),
                ));
            }
            if let Some(max) = delta.max_style_drop_percent {
                let drop = drop_pct(
                    prev.unique_style_count as f64,
                    written_counts.unique_styles as f64,
                );
                checks.push(CheckResult::new(
                    "delta",
                    "unique_style_drop",
                    drop <= max,
                    format!("{:.1}% vs max {:.1}%", drop, max),
                ));
            }
        }
    }

    if let Some(count) = &cfg.count {
        let future_stock = written.iter().filter(|v| v.has_future_stock).count();
        let discontinued = written.iter().filter(|v| v.discontinued).count();
        let mut push = |name: &str, value: usize, min: Option<usize>, max: Option<usize>| {
            let ok = min.map(|m| value >= m).unwrap_or(true)
                && max.map(|m| value <= m).unwrap_or(true);
            checks.push(CheckResult::new(
                "count",
                name,
                ok,
                format!("{} (bounds {:?}..{:?})", value, min, max),
            ));
        };
        if count.min_items.is_some() || count.max_items.is_some() {
            push("items", written_counts.item_count, count.min_items, count.max_items);
        }
        if count.min_styles.is_some() || count.max_styles.is_some() {
            push(
                "styles",
                written_counts.unique_styles,
                count.min_styles,
                count.max_styles,
            );
        }
        if let Some(max) = count.max_future_stock_items {
            push("future_stock_items", future_stock, None, Some(max));
        }
        if let Some(max) = count.max_discontinued_items {
            push("discontinued_items", discontinued, None, Some(max));
        }
    }

    for (i, spot) in cfg.spot_checks.iter().enumerate() {
        let matches: Vec<&Variant> = written
            .iter()
            .filter(|v| {
                v.style.trim().to_uppercase().contains(&spot.style.trim().to_uppercase())
                    && spot
                        .color
                        .as_ref()
                        .map(|c| v.color.eq_ignore_ascii_case(c.trim()))
                        .unwrap_or(true)
                    && spot
                        .size
                        .as_ref()
                        .map(|s| v.size.eq_ignore_ascii_case(s.trim()))
                        .unwrap_or(true)
            })
            .collect();

        let passed = match spot.expect {
            SpotExpectation::Exists => !matches.is_empty(),
            SpotExpectation::StockPositive => matches.iter().any(|v| v.stock > 0),
            SpotExpectation::HasFutureDate => matches.iter().any(|v| v.has_future_ship_date(today)),
            SpotExpectation::IsDiscontinued => matches.iter().any(|v| v.discontinued),
            SpotExpectation::HasPrice => matches.iter().any(|v| v.price.is_some()),
        };
        checks.push(CheckResult::new(
            "spot",
            &format!("spot_{}", i),
            passed,
            format!("style {} ({} matches)", spot.style, matches.len()),
        ));
    }

    ValidationReport::from_checks(checks)
}
