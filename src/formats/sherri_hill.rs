//! Sherri Hill paired-column layout.
//!
//! Size headers sit at even indexes from column 4 (`4, 6, 8, …`) with a
//! "Special Date" column immediately to the right of each. Stock cells are
//! text ("Yes", "Last Piece", "No") resolved through the stock-text config.

use anyhow::Result;

use super::grid::SheetGrid;
use super::{dates, detect, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

const FIRST_SIZE_COL: usize = 4;

fn find_column(headers: &[String], needle: &str, default: usize) -> usize {
    headers
        .iter()
        .position(|h| h.to_uppercase().contains(needle))
        .unwrap_or(default)
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let header_row = detect::probable_header_row(grid);
    let headers: Vec<String> = grid.row(header_row).to_vec();

    let style_col = find_column(&headers, "STYLE", 0);
    let color_col = find_column(&headers, "COLOR", 1);

    // (size column, date column) pairs.
    let mut pairs: Vec<(usize, String, usize)> = Vec::new();
    let mut col = FIRST_SIZE_COL;
    while col < headers.len() {
        let head = headers[col].trim();
        if sizes::is_size_token(head) {
            pairs.push((col, sizes::normalize_size_token(head), col + 1));
        }
        col += 2;
    }

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        let style = grid.cell(r, style_col).trim().to_string();
        let color = grid.cell(r, color_col).trim().to_string();
        if style.is_empty() {
            continue;
        }

        for (size_col, size, date_col) in &pairs {
            let raw_cell = grid.cell(r, *size_col);
            if raw_cell.trim().is_empty() {
                continue;
            }
            let Some(qty) = stock::parse_stock(raw_cell, ctx.stock_mappings()) else {
                continue;
            };

            let mut v = Variant::new(style.clone(), color.clone(), size.clone(), qty);
            let date_cell = grid.cell(r, *date_col).trim();
            if !date_cell.is_empty() {
                v.ship_date =
                    dates::parse_date_flexible(date_cell, ctx.european_dates()).map(dates::to_iso);
            }
            v.set_raw_cell(RAW_STOCK_KEY, raw_cell);
            variants.push(v);
        }
    }

    Ok(variants)
}
