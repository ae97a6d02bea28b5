//! Generic pivoted layout.
//!
//! Any sheet whose header row carries five or more size tokens. The style
//! column is the header containing STYLE/CODE/ITEM, the color column
//! contains COLOR but not CODE, with optional date and discontinued
//! columns. Rows without a color fall back to the literal `DEFAULT`.

use anyhow::Result;

use super::grid::SheetGrid;
use super::{dates, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

pub const DEFAULT_COLOR: &str = "DEFAULT";

/// The pivot header row is the first row with at least five size tokens.
pub fn find_pivot_header(grid: &SheetGrid) -> Option<usize> {
    (0..grid.num_rows().min(10)).find(|&r| {
        grid.row(r)
            .iter()
            .filter(|h| sizes::is_size_token(h))
            .count()
            >= 5
    })
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let Some(header_row) = find_pivot_header(grid) else {
        anyhow::bail!("no pivot header row with size tokens found");
    };
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();

    let style_col = headers
        .iter()
        .position(|h| h.contains("STYLE") || h.contains("CODE") || h.contains("ITEM"))
        .unwrap_or(0);
    let color_col = headers
        .iter()
        .position(|h| h.contains("COLOR") && !h.contains("CODE"));
    let date_col = headers
        .iter()
        .position(|h| h.contains("DATE") || h.contains("DELIVERY") || h.contains("SHIP"));
    let disc_col = headers.iter().position(|h| h.contains("DISC"));

    let size_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| sizes::is_size_token(h))
        .map(|(i, h)| (i, sizes::normalize_size_token(h)))
        .collect();

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        let style = grid.cell(r, style_col).trim().to_string();
        if style.is_empty() {
            continue;
        }

        let color = color_col
            .map(|c| grid.cell(r, c).trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COLOR.to_string());

        let ship_date = date_col.and_then(|c| {
            dates::parse_date_flexible(grid.cell(r, c), ctx.european_dates()).map(dates::to_iso)
        });

        let discontinued = disc_col
            .map(|c| {
                let cell = grid.cell(r, c).trim().to_lowercase();
                !cell.is_empty() && cell != "no" && cell != "false" && cell != "0"
            })
            .unwrap_or(false);

        for (col, size) in &size_cols {
            let raw_cell = grid.cell(r, *col);
            if raw_cell.trim().is_empty() {
                continue;
            }
            let Some(qty) = stock::parse_stock(raw_cell, ctx.stock_mappings()) else {
                continue;
            };
            let mut v = Variant::new(style.clone(), color.clone(), size.clone(), qty);
            v.ship_date = ship_date.clone();
            v.discontinued = discontinued;
            v.set_raw_cell(RAW_STOCK_KEY, raw_cell);
            variants.push(v);
        }
    }

    Ok(variants)
}
