//! Jovani sale layout: interleaved style and color rows.
//!
//! Row 0 holds size tokens from column 1 onward (non-size cells like
//! `LOCATION` are skipped). A style row matches the style pattern in column
//! 0 and carries either a price in column 1 or no stock in the size
//! columns; the style carries forward until the next style row. A color row
//! has alphabetic text in column 0 plus at least one numeric stock value in
//! a size column.

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

use super::grid::SheetGrid;
use super::{sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

lazy_static! {
    static ref STYLE_TOKEN: Regex =
        Regex::new(r"^(#?\d{4,6}|(JVN|JB|AL)\d{3,6}|D\d{3,5})$").unwrap();
    static ref COLOR_TEXT: Regex = Regex::new(r"^[A-Za-z][A-Za-z /&-]+$").unwrap();
}

fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

fn size_columns(grid: &SheetGrid) -> Vec<(usize, String)> {
    grid.row(0)
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, h)| sizes::is_size_token(h))
        .map(|(i, h)| (i, sizes::normalize_size_token(h)))
        .collect()
}

fn has_stock_in(grid: &SheetGrid, row: usize, cols: &[(usize, String)]) -> bool {
    cols.iter()
        .any(|(c, _)| stock::parse_stock(grid.cell(row, *c), &[]).is_some())
}

fn is_color_text(cell: &str) -> bool {
    let t = cell.trim();
    t.chars().filter(|c| c.is_alphabetic()).count() >= 2
        && !t.chars().any(|c| c.is_ascii_digit())
        && COLOR_TEXT.is_match(t)
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let cols = size_columns(grid);
    let mut variants = Vec::new();
    let mut current_style: Option<String> = None;
    let mut current_price: Option<f64> = None;

    for r in 1..grid.num_rows() {
        let first = grid.cell(r, 0).trim().to_string();
        if first.is_empty() {
            continue;
        }

        if STYLE_TOKEN.is_match(&first) {
            // A style row either prices the style or carries no stock; a
            // style token that fails both reads is a misaligned style and
            // still becomes current.
            current_style = Some(first.trim_start_matches('#').to_string());
            current_price = parse_price(grid.cell(r, 1));
            continue;
        }

        if !is_color_text(&first) || !has_stock_in(grid, r, &cols) {
            continue;
        }
        let Some(style) = current_style.clone() else {
            continue;
        };

        for (col, size) in &cols {
            let raw_cell = grid.cell(r, *col);
            if raw_cell.trim().is_empty() {
                continue;
            }
            let Some(qty) = stock::parse_stock(raw_cell, ctx.stock_mappings()) else {
                continue;
            };
            let mut v = Variant::new(style.clone(), first.clone(), size.clone(), qty);
            v.price = current_price;
            v.set_raw_cell(RAW_STOCK_KEY, raw_cell);
            variants.push(v);
        }
    }

    Ok(variants)
}
