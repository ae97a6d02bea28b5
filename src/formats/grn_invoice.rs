//! GRN invoice layout.
//!
//! The header row carries both `code` and `color`; size headers come from
//! the closed `000, 00, 0, 02 … 24` set, with leading zeros normalized
//! (`02` reads as size `2`).

use anyhow::Result;

use super::grid::SheetGrid;
use super::{sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

const GRN_SIZE_HEADERS: [&str; 16] = [
    "000", "00", "0", "02", "04", "06", "08", "10", "12", "14", "16", "18", "20", "22", "24", "2",
];

fn find_header_row(grid: &SheetGrid) -> Option<usize> {
    (0..grid.num_rows().min(10)).find(|&r| {
        let row: Vec<String> = grid.row(r).iter().map(|h| h.trim().to_lowercase()).collect();
        row.iter().any(|h| h.contains("code")) && row.iter().any(|h| h.contains("color"))
    })
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let Some(header_row) = find_header_row(grid) else {
        anyhow::bail!("grn layout needs a header row with code and color");
    };
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let code_col = lower
        .iter()
        .position(|h| h.contains("code"))
        .unwrap_or(0);
    let color_col = lower
        .iter()
        .position(|h| h.contains("color"))
        .unwrap_or(1);

    let size_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| GRN_SIZE_HEADERS.contains(&h.trim()))
        .map(|(i, h)| (i, sizes::normalize_size_token(h)))
        .collect();

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        let style = grid.cell(r, code_col).trim().to_string();
        let color = grid.cell(r, color_col).trim().to_string();
        if style.is_empty() || color.is_empty() {
            continue;
        }

        for (col, size) in &size_cols {
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
