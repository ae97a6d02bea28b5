//! OTS layout: `ots1..otsN` columns map positionally to a size list.
//!
//! The size list comes from a `size_whole_comp` column (split on
//! whitespace) when present, otherwise the default 2–18 run.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

use super::grid::SheetGrid;
use super::{detect, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

lazy_static! {
    static ref OTS_HEADER: Regex = Regex::new(r"(?i)^ots(\d+)$").unwrap();
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let header_row = detect::probable_header_row(grid);
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    // ots columns in positional order.
    let mut ots_cols: Vec<(usize, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            OTS_HEADER
                .captures(h)
                .and_then(|c| c[1].parse::<usize>().ok())
                .map(|n| (n, i))
        })
        .collect();
    ots_cols.sort();

    if ots_cols.is_empty() {
        anyhow::bail!("no ots columns found");
    }

    let upper: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    let style_col = upper
        .iter()
        .position(|h| h.contains("STYLE") || h.contains("CODE") || h.contains("ITEM"))
        .unwrap_or(0);
    let color_col = upper.iter().position(|h| h.contains("COLOR"));
    let size_list_col = upper.iter().position(|h| h.contains("SIZE_WHOLE_COMP"));

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        let style = grid.cell(r, style_col).trim().to_string();
        if style.is_empty() {
            continue;
        }
        let color = color_col
            .map(|c| grid.cell(r, c).trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "DEFAULT".to_string());

        let row_sizes: Vec<String> = match size_list_col {
            Some(c) if !grid.cell(r, c).trim().is_empty() => grid
                .cell(r, c)
                .split_whitespace()
                .map(sizes::normalize_size_token)
                .collect(),
            _ => sizes::DEFAULT_OTS_SIZES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        for (n, col) in ots_cols.iter() {
            // otsN maps to the Nth size in the list.
            let Some(size) = n.checked_sub(1).and_then(|i| row_sizes.get(i)) else {
                continue;
            };
            let raw_cell = grid.cell(r, *col);
            if raw_cell.trim().is_empty() {
                continue;
            }
            let Some(qty) = stock::parse_stock(raw_cell, ctx.stock_mappings()) else {
                continue;
            };
            let mut v = Variant::new(style.clone(), color.clone(), size.clone(), qty);
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

    fn parse_rows(rows: Vec<Vec<&str>>) -> Vec<Variant> {
        let source = DataSource::new("s1", "Vendor", SourceKind::Manual);
        let ctx = ParseContext::new(&source, None);
        let grid = SheetGrid::new(
            rows.into_iter()
                .map(|r| r.into_iter().map(|c| c.to_string()).collect())
                .collect(),
        );
        parse(&grid, &ctx).unwrap()
    }

    #[test]
    fn default_size_run() {
        let variants = parse_rows(vec![
            vec!["STYLE", "COLOR", "ots1", "ots2", "ots3"],
            vec!["S1", "Red", "1", "", "2"],
        ]);
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].size, "2");
        assert_eq!(variants[1].size, "6");
        assert_eq!(variants[1].stock, 2);
    }

    #[test]
    fn ots_columns_beyond_the_size_list_are_ignored() {
        let variants = parse_rows(vec![
            vec!["STYLE", "size_whole_comp", "ots1", "ots2", "ots3"],
            vec!["S3", "4 6", "1", "2", "9"],
        ]);
        // Two sizes, three ots columns: the trailing column has no size.
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().all(|v| v.size == "4" || v.size == "6"));
    }

    #[test]
    fn ots_columns_sort_numerically_not_lexically() {
        let variants = parse_rows(vec![
            vec!["STYLE", "ots10", "ots2", "ots1"],
            vec!["S4", "3", "2", "1"],
        ]);
        // ots1 -> first size (2), ots2 -> second (4), ots10 -> tenth (20... out of range).
        assert_eq!(variants.len(), 2);
        assert!(variants.iter().any(|v| v.size == "2" && v.stock == 1));
        assert!(variants.iter().any(|v| v.size == "4" && v.stock == 2));
    }

    #[test]
    fn explicit_size_list_column() {
        let variants = parse_rows(vec![
            vec!["STYLE", "size_whole_comp", "ots1", "ots2"],
            vec!["S2", "XS S", "3", "1"],
        ]);
        assert_eq!(variants[0].size, "XS");
        assert_eq!(variants[1].size, "S");
    }
}
