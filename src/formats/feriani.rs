//! Feriani / Gia layout.
//!
//! DELIVERY and STYLE carry forward down the sheet; COLOR is per-row; the
//! remaining size-token headers hold per-size stock. A DELIVERY value of
//! `NOW` means no ship date.

use anyhow::Result;

use super::grid::SheetGrid;
use super::{dates, detect, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let header_row = detect::probable_header_row(grid);
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();

    let col_of = |needle: &str| headers.iter().position(|h| h.contains(needle));
    let delivery_col = col_of("DELIVERY");
    let style_col = col_of("STYLE");
    let color_col = col_of("COLOR");

    let (Some(style_col), Some(color_col)) = (style_col, color_col) else {
        anyhow::bail!("feriani layout is missing STYLE or COLOR headers");
    };

    let size_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| sizes::is_size_token(h))
        .map(|(i, h)| (i, sizes::normalize_size_token(h)))
        .collect();

    let mut variants = Vec::new();
    let mut current_style: Option<String> = None;
    let mut current_ship_date: Option<String> = None;

    for r in (header_row + 1)..grid.num_rows() {
        if let Some(dc) = delivery_col {
            let delivery = grid.cell(r, dc).trim();
            if !delivery.is_empty() {
                if delivery.eq_ignore_ascii_case("NOW") {
                    current_ship_date = None;
                } else {
                    current_ship_date = dates::parse_date_flexible(delivery, ctx.european_dates())
                        .map(dates::to_iso);
                }
            }
        }

        let style = grid.cell(r, style_col).trim();
        if !style.is_empty() {
            current_style = Some(style.to_string());
        }

        let color = grid.cell(r, color_col).trim().to_string();
        if color.is_empty() {
            continue;
        }
        let Some(style) = current_style.clone() else {
            continue;
        };

        for (col, size) in &size_cols {
            let raw_cell = grid.cell(r, *col);
            if raw_cell.trim().is_empty() {
                continue;
            }
            let Some(qty) = stock::parse_stock(raw_cell, ctx.stock_mappings()) else {
                continue;
            };
            let mut v = Variant::new(style.clone(), color.clone(), size.clone(), qty);
            v.ship_date = current_ship_date.clone();
            v.set_raw_cell(RAW_STOCK_KEY, raw_cell);
            variants.push(v);
        }
    }

    Ok(variants)
}
