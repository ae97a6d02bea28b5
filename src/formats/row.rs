//! Generic row layout: one row per variant, driven by the column map.
//!
//! The header row is whichever of the first ten rows matches the most
//! field keywords. Explicit column mappings win over keyword inference. A
//! combined `STYLE{delim}COLOR{delim}SIZE` column can replace the three
//! individual mappings, and ship dates can be mapped directly or
//! conditionally ("if column X = value V, use column Y").

use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

use super::grid::SheetGrid;
use super::{dates, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;
use crate::sources::{CombinedVariantOrder, StockTextMapping};

lazy_static! {
    static ref HEADER_KEYWORDS: Regex =
        Regex::new(r"(?i)sku|code|id|name|title|desc|style|color|colour|size|stock|qty|price|cost|msrp").unwrap();
}

/// Scan rows 0–9 and pick the one with the most keyword matches.
pub fn find_header_row(grid: &SheetGrid) -> usize {
    let mut best = 0;
    let mut best_count = 0;
    for r in 0..grid.num_rows().min(10) {
        let count = grid
            .row(r)
            .iter()
            .filter(|c| HEADER_KEYWORDS.is_match(c))
            .count();
        if count > best_count {
            best_count = count;
            best = r;
        }
    }
    best
}

struct Columns {
    style: Option<usize>,
    color: Option<usize>,
    size: Option<usize>,
    stock: Option<usize>,
    price: Option<usize>,
    cost: Option<usize>,
    ship_date: Option<usize>,
    sale_price: Option<usize>,
    discontinued: Option<usize>,
    combined: Option<usize>,
}

fn locate(headers: &[String], name: &str) -> Option<usize> {
    let wanted = name.trim().to_uppercase();
    headers
        .iter()
        .position(|h| h.trim().to_uppercase() == wanted)
        .or_else(|| {
            headers
                .iter()
                .position(|h| h.trim().to_uppercase().contains(&wanted))
        })
}

fn infer(headers: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    headers.iter().position(|h| pred(&h.trim().to_uppercase()))
}

fn resolve_columns(headers: &[String], ctx: &ParseContext) -> Columns {
    let mapping = ctx.source.config.column_mapping.clone().unwrap_or_default();
    let cleaning = ctx.source.config.cleaning_config.clone().unwrap_or_default();

    let explicit = |name: &Option<String>| name.as_deref().and_then(|n| locate(headers, n));

    Columns {
        style: explicit(&mapping.style).or_else(|| {
            infer(headers, |h| {
                h.contains("STYLE") || h.contains("SKU") || h.contains("CODE") || h.contains("ITEM")
            })
        }),
        color: explicit(&mapping.color)
            .or_else(|| infer(headers, |h| h.contains("COLOR") || h.contains("COLOUR"))),
        size: explicit(&mapping.size).or_else(|| infer(headers, |h| h.contains("SIZE"))),
        stock: explicit(&mapping.stock).or_else(|| {
            infer(headers, |h| {
                h.contains("STOCK") || h.contains("QTY") || h.contains("QUANTITY") || h.contains("AVAILABLE")
            })
        }),
        price: explicit(&mapping.price)
            .or_else(|| infer(headers, |h| h.contains("PRICE") || h.contains("MSRP"))),
        cost: explicit(&mapping.cost).or_else(|| infer(headers, |h| h.contains("COST"))),
        ship_date: explicit(&mapping.ship_date)
            .or_else(|| infer(headers, |h| h.contains("SHIP") || h.contains("DATE"))),
        sale_price: explicit(&mapping.sale_price),
        discontinued: explicit(&mapping.discontinued),
        combined: cleaning
            .combined_variant_column
            .as_deref()
            .and_then(|n| locate(headers, n)),
    }
}

fn split_combined(
    raw: &str,
    delimiter: &str,
    order: CombinedVariantOrder,
) -> Option<(String, String, String)> {
    let parts: Vec<&str> = raw.splitn(3, delimiter).map(|p| p.trim()).collect();
    if parts.len() < 3 {
        return None;
    }
    let (style, color, size) = match order {
        CombinedVariantOrder::StyleColorSize => (parts[0], parts[1], parts[2]),
        CombinedVariantOrder::StyleSizeColor => (parts[0], parts[2], parts[1]),
        CombinedVariantOrder::ColorStyleSize => (parts[1], parts[0], parts[2]),
    };
    Some((style.to_string(), color.to_string(), size.to_string()))
}

fn parse_money(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let header_row = find_header_row(grid);
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let cols = resolve_columns(&headers, ctx);

    let cleaning = ctx.source.config.cleaning_config.clone().unwrap_or_default();
    let mapping = ctx.source.config.column_mapping.clone().unwrap_or_default();
    let conditional = mapping
        .conditional_ship_date
        .as_ref()
        .and_then(|c| {
            Some((
                locate(&headers, &c.when_column)?,
                c.equals_value.clone(),
                locate(&headers, &c.date_column)?,
            ))
        });

    // convert_yes_no adds configured Yes/No values ahead of the mappings.
    let mut mappings: Vec<StockTextMapping> = Vec::new();
    if cleaning.convert_yes_no {
        mappings.push(StockTextMapping {
            text: "Yes".into(),
            stock: cleaning.yes_value.unwrap_or(1),
        });
        mappings.push(StockTextMapping {
            text: "No".into(),
            stock: cleaning.no_value.unwrap_or(0),
        });
    }
    mappings.extend(ctx.stock_mappings().iter().cloned());

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        if grid.row(r).iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let (style, color, size) = if let Some(combined_col) = cols.combined {
            let delimiter = cleaning
                .combined_variant_delimiter
                .clone()
                .unwrap_or_else(|| "-".to_string());
            let order = cleaning
                .combined_variant_order
                .unwrap_or(CombinedVariantOrder::StyleColorSize);
            match split_combined(grid.cell(r, combined_col), &delimiter, order) {
                Some(parts) => parts,
                None => continue,
            }
        } else {
            let style = cols
                .style
                .map(|c| grid.cell(r, c).trim().to_string())
                .unwrap_or_default();
            let color = cols
                .color
                .map(|c| grid.cell(r, c).trim().to_string())
                .unwrap_or_default();
            let size = cols
                .size
                .map(|c| grid.cell(r, c).trim().to_string())
                .unwrap_or_default();
            (style, color, size)
        };

        if style.is_empty() {
            continue;
        }

        let raw_stock = cols.stock.map(|c| grid.cell(r, c)).unwrap_or("");
        let qty = stock::parse_stock(raw_stock, &mappings).unwrap_or(0);

        let mut v = Variant::new(style, color, sizes::normalize_size_token(&size), qty);
        v.price = cols.price.and_then(|c| parse_money(grid.cell(r, c)));
        v.cost = cols.cost.and_then(|c| parse_money(grid.cell(r, c)));

        if let Some((when_col, value, date_col)) = conditional.as_ref() {
            if grid
                .cell(r, *when_col)
                .trim()
                .eq_ignore_ascii_case(value.trim())
            {
                v.ship_date =
                    dates::parse_date_flexible(grid.cell(r, *date_col), ctx.european_dates())
                        .map(dates::to_iso);
            }
        } else if let Some(c) = cols.ship_date {
            v.ship_date =
                dates::parse_date_flexible(grid.cell(r, c), ctx.european_dates()).map(dates::to_iso);
        }

        if let Some(c) = cols.discontinued {
            let cell = grid.cell(r, c).trim().to_lowercase();
            v.discontinued = !cell.is_empty() && cell != "no" && cell != "false" && cell != "0";
        }

        if let Some(c) = cols.sale_price {
            let cell = grid.cell(r, c);
            if !cell.trim().is_empty() {
                v.set_raw_cell(&headers[c], cell);
            }
        }

        // Keep the whole row for complex-stock patterns and discontinued
        // column matching.
        for (c, header) in headers.iter().enumerate() {
            let cell = grid.cell(r, c);
            if !header.is_empty() && !cell.trim().is_empty() {
                v.set_raw_cell(header, cell);
            }
        }
        if !raw_stock.trim().is_empty() {
            v.set_raw_cell(RAW_STOCK_KEY, raw_stock);
        }

        variants.push(v);
    }

    Ok(variants)
}
