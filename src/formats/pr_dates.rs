//! PR layout with Excel-serial date headers.
//!
//! Headers matching `^4\d{4}$` are serial dates; an `available` column
//! holds current stock. The size is a trailing `-N` suffix on the style,
//! otherwise `ONE SIZE`. When current stock is zero, the earliest dated
//! column with incoming quantity supplies the ship date and marks the
//! variant future-stock with zero-stock preservation.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

use super::grid::SheetGrid;
use super::{dates, detect, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

lazy_static! {
    static ref SERIAL_HEADER: Regex = Regex::new(r"^4\d{4}$").unwrap();
    static ref SIZE_SUFFIX: Regex = Regex::new(r"^(.*?)-(\d+)$").unwrap();
}

pub const ONE_SIZE: &str = "ONE SIZE";

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let header_row = detect::probable_header_row(grid);
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut date_cols: Vec<(usize, String)> = Vec::new();
    for (i, h) in headers.iter().enumerate() {
        if SERIAL_HEADER.is_match(h) {
            if let Some(d) = h.parse::<i64>().ok().and_then(dates::excel_serial_to_date) {
                date_cols.push((i, dates::to_iso(d)));
            }
        }
    }
    if date_cols.len() < 3 {
        anyhow::bail!("expected at least three serial-date headers");
    }
    date_cols.sort_by(|a, b| a.1.cmp(&b.1));

    let upper: Vec<String> = headers.iter().map(|h| h.to_uppercase()).collect();
    let style_col = upper
        .iter()
        .position(|h| h.contains("STYLE") || h.contains("ITEM") || h.contains("CODE"))
        .unwrap_or(0);
    let available_col = upper.iter().position(|h| h.contains("AVAILABLE"));
    let color_col = upper.iter().position(|h| h.contains("COLOR"));

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        let raw_style = grid.cell(r, style_col).trim().to_string();
        if raw_style.is_empty() {
            continue;
        }

        let (style, size) = match SIZE_SUFFIX.captures(&raw_style) {
            Some(caps) => (caps[1].to_string(), caps[2].to_string()),
            None => (raw_style.clone(), ONE_SIZE.to_string()),
        };

        let color = color_col
            .map(|c| grid.cell(r, c).trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "DEFAULT".to_string());

        let available = available_col
            .and_then(|c| stock::parse_stock(grid.cell(r, c), ctx.stock_mappings()))
            .unwrap_or(0);

        let incoming = date_cols.iter().find_map(|(col, iso)| {
            let qty = stock::parse_stock(grid.cell(r, *col), ctx.stock_mappings())?;
            (qty > 0).then(|| (qty, iso.clone()))
        });

        let mut v = Variant::new(style, color, size, available);
        if let Some(c) = available_col {
            v.set_raw_cell(RAW_STOCK_KEY, grid.cell(r, c));
        }
        if let Some((_, ship_date)) = incoming {
            v.ship_date = Some(ship_date);
            v.has_future_stock = true;
            v.preserve_zero_stock = true;
        }
        variants.push(v);
    }

    Ok(variants)
}
