//! Tarik Ediz pivoted layout.
//!
//! Two-state row machine. A style header row carries the style in column 0,
//! the product name in column 7, and numeric size tokens from column 13 on.
//! Data rows under it carry either the literal `D` (discontinued) or a
//! delivery date in column 0, the color in column 11, and per-size stock
//! from column 13. A purely numeric value showing up in the color column is
//! a misaligned style and becomes the current style.

use anyhow::Result;

use super::grid::SheetGrid;
use super::{dates, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

const COLOR_COL: usize = 11;
const SIZE_START_COL: usize = 13;
const NAME_COL: usize = 7;
/// A style row's size run ends after this many consecutive empty columns.
const SIZE_RUN_GAP: usize = 3;

#[derive(Debug, PartialEq)]
enum State {
    SeekingStyle,
    InStyle,
}

fn detect_sizes(grid: &SheetGrid, row: usize, configured: &[String]) -> Vec<(usize, String)> {
    if !configured.is_empty() {
        return configured
            .iter()
            .enumerate()
            .map(|(i, s)| (SIZE_START_COL + i, sizes::normalize_size_token(s)))
            .collect();
    }

    let mut out = Vec::new();
    let mut gap = 0;
    let mut col = SIZE_START_COL;
    let width = grid.row(row).len();
    while col < width {
        let cell = grid.cell(row, col).trim().to_string();
        if cell.is_empty() {
            gap += 1;
            if gap >= SIZE_RUN_GAP {
                break;
            }
        } else {
            gap = 0;
            out.push((col, sizes::normalize_size_token(&cell)));
        }
        col += 1;
    }
    out
}

fn is_style_row(grid: &SheetGrid, row: usize) -> bool {
    let first = grid.cell(row, 0).trim();
    if first.is_empty() || first.eq_ignore_ascii_case("D") || dates::looks_like_date(first) {
        return false;
    }
    // Product name in column 7 or a size run starting at column 13.
    !grid.cell(row, NAME_COL).trim().is_empty()
        || !grid.cell(row, SIZE_START_COL).trim().is_empty()
}

fn is_data_row(grid: &SheetGrid, row: usize) -> bool {
    let first = grid.cell(row, 0).trim();
    let color = grid.cell(row, COLOR_COL).trim();
    (first.eq_ignore_ascii_case("D") || dates::looks_like_date(first)) && !color.is_empty()
}

fn is_misaligned_style(grid: &SheetGrid, row: usize) -> bool {
    let first = grid.cell(row, 0).trim();
    let color = grid.cell(row, COLOR_COL).trim();
    first.is_empty() && !color.is_empty() && color.chars().all(|c| c.is_ascii_digit())
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let mut variants = Vec::new();
    let mut state = State::SeekingStyle;
    let mut current_style: Option<String> = None;
    let mut current_sizes: Vec<(usize, String)> = Vec::new();

    for r in 0..grid.num_rows() {
        if is_style_row(grid, r) {
            current_style = Some(grid.cell(r, 0).trim().to_string());
            let detected = detect_sizes(grid, r, ctx.configured_sizes());
            if !detected.is_empty() {
                current_sizes = detected;
            }
            state = State::InStyle;
            continue;
        }

        if is_misaligned_style(grid, r) {
            current_style = Some(grid.cell(r, COLOR_COL).trim().to_string());
            state = State::InStyle;
            continue;
        }

        if state != State::InStyle || !is_data_row(grid, r) {
            continue;
        }

        let Some(style) = current_style.clone() else {
            continue;
        };
        let color = grid.cell(r, COLOR_COL).trim().to_string();
        let first = grid.cell(r, 0).trim();

        let discontinued = first.eq_ignore_ascii_case("D");
        let ship_date = if discontinued {
            None
        } else if dates::is_excel_serial(first) {
            first
                .parse::<i64>()
                .ok()
                .and_then(dates::excel_serial_to_date)
                .map(dates::to_iso)
        } else {
            // Delivery dates arrive day-first; only serials skip conversion.
            dates::parse_date_flexible(first, true).map(dates::to_iso)
        };

        for (col, size) in &current_sizes {
            let raw_cell = grid.cell(r, *col);
            if raw_cell.trim().is_empty() {
                continue;
            }
            let Some(qty) = stock::parse_stock(raw_cell, ctx.stock_mappings()) else {
                continue;
            };
            let mut v = Variant::new(style.clone(), color.clone(), size.clone(), qty);
            v.discontinued = discontinued;
            v.ship_date = ship_date.clone();
            v.set_raw_cell(RAW_STOCK_KEY, raw_cell);
            variants.push(v);
        }
    }

    Ok(variants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DataSource, SourceKind};

    fn grid_of(rows: Vec<Vec<&str>>) -> SheetGrid {
        SheetGrid::new(
            rows.into_iter()
                .map(|r| r.into_iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn style_row(style: &str, sizes: &[&str]) -> Vec<String> {
        let mut row = vec![String::new(); 13];
        row[0] = style.to_string();
        row[7] = "Gown Name".to_string();
        row.extend(sizes.iter().map(|s| s.to_string()));
        row
    }

    fn data_row(first: &str, color: &str, stocks: &[&str]) -> Vec<String> {
        let mut row = vec![String::new(); 13];
        row[0] = first.to_string();
        row[11] = color.to_string();
        row.extend(stocks.iter().map(|s| s.to_string()));
        row
    }

    fn parse_rows(rows: Vec<Vec<String>>) -> Vec<Variant> {
        let source = DataSource::new("s1", "Tarik Ediz", SourceKind::Manual);
        let ctx = ParseContext::new(&source, None);
        parse(&SheetGrid::new(rows), &ctx).unwrap()
    }

    #[test]
    fn style_then_discontinued_and_dated_rows() {
        let rows = vec![
            vec!["Up-to-Date Product Inventory Report".to_string()],
            style_row("10001", &["2", "4", "6", "8"]),
            data_row("D", "Purple", &["0", "2", "1", "0"]),
            data_row("24/03/2026", "Navy", &["0", "0", "1", "0"]),
        ];
        let variants = parse_rows(rows);

        let purple: Vec<_> = variants.iter().filter(|v| v.color == "Purple").collect();
        assert_eq!(purple.len(), 4);
        assert!(purple.iter().all(|v| v.discontinued));
        assert_eq!(
            purple.iter().find(|v| v.size == "4").unwrap().stock,
            2
        );

        let navy: Vec<_> = variants.iter().filter(|v| v.color == "Navy").collect();
        assert_eq!(navy.len(), 4);
        assert!(navy.iter().all(|v| !v.discontinued));
        assert_eq!(
            navy[0].ship_date.as_deref(),
            Some("2026-03-24"),
            "European delivery date converts day-first"
        );
    }

    #[test]
    fn excel_serial_delivery_date() {
        let rows = vec![
            style_row("10002", &["2", "4"]),
            data_row("45292", "Red", &["1", "0"]),
        ];
        let variants = parse_rows(rows);
        assert_eq!(variants[0].ship_date.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn misaligned_style_in_color_column() {
        let mut shifted = vec![String::new(); 13];
        shifted[11] = "10003".to_string();

        let rows = vec![
            style_row("10001", &["2", "4"]),
            shifted,
            data_row("D", "Black", &["1", "1"]),
        ];
        let variants = parse_rows(rows);
        assert!(variants.iter().all(|v| v.style == "10003"));
    }

    #[test]
    fn configured_sizes_override_auto_detection() {
        let mut source = DataSource::new("s1", "Tarik Ediz", SourceKind::Manual);
        source.config.configured_sizes =
            vec!["36".into(), "38".into(), "40".into(), "42".into()];
        let ctx = ParseContext::new(&source, None);

        let rows = vec![
            style_row("10005", &[]),
            data_row("D", "Gold", &["1", "", "2", ""]),
        ];
        let variants = parse(&SheetGrid::new(rows), &ctx).unwrap();
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().any(|v| v.size == "36" && v.stock == 1));
        assert!(variants.iter().any(|v| v.size == "40" && v.stock == 2));
    }

    #[test]
    fn size_run_truncates_after_gap() {
        let mut row = style_row("10004", &["2", "4"]);
        // Three empty columns then a stray token that must be ignored.
        row.extend(["", "", "", "99"].iter().map(|s| s.to_string()));
        let rows = vec![row, data_row("D", "Ivory", &["1", "2"])];
        let variants = parse_rows(rows);
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().any(|v| v.size == "2" && v.stock == 1));
        assert!(variants.iter().any(|v| v.size == "4" && v.stock == 2));
    }
}
