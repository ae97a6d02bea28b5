//! Store multi-brand row layout.
//!
//! One row per variant with a product-name column. A closed list of known
//! brand strings is scanned inside the product name; a hit tags the
//! variant's brand, which later overrides the source name as the style
//! prefix.

use anyhow::Result;

use super::grid::SheetGrid;
use super::{detect, sizes, stock, ParseContext, RAW_STOCK_KEY};
use crate::models::Variant;

/// Brands the store mixes into one export.
pub const KNOWN_BRANDS: [&str; 12] = [
    "JOVANI",
    "SHERRI HILL",
    "TARIK EDIZ",
    "FERIANI",
    "MORI LEE",
    "LA FEMME",
    "FAVIANA",
    "TERANI",
    "ELLIE WILDE",
    "MAC DUGGAL",
    "PORTIA & SCARLETT",
    "JESSICA ANGEL",
];

fn title_case_brand(brand: &str) -> String {
    brand
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first, chars.as_str().to_lowercase()),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn brand_in_name(product_name: &str) -> Option<String> {
    let upper = product_name.to_uppercase();
    KNOWN_BRANDS
        .iter()
        .find(|b| upper.contains(*b))
        .map(|b| title_case_brand(b))
}

pub fn parse(grid: &SheetGrid, ctx: &ParseContext) -> Result<Vec<Variant>> {
    let header_row = detect::probable_header_row(grid);
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();

    let col_of = |pred: &dyn Fn(&str) -> bool| headers.iter().position(|h| pred(h));
    let name_col = col_of(&|h| h.contains("PRODUCT") || h.contains("NAME") || h.contains("BRAND") || h.contains("VENDOR"));
    let style_col = col_of(&|h| h.contains("STYLE"));
    let color_col = col_of(&|h| h.contains("COLOR"));
    let size_col = col_of(&|h| h.contains("SIZE"));
    let stock_col = col_of(&|h| h.contains("QTY") || h.contains("STOCK") || h.contains("QUANTITY"));
    let price_col = col_of(&|h| h.contains("PRICE") || h.contains("MSRP"));

    let (Some(style_col), Some(color_col), Some(size_col)) = (style_col, color_col, size_col)
    else {
        anyhow::bail!("multi-brand layout is missing style, color or size headers");
    };

    let mut variants = Vec::new();
    for r in (header_row + 1)..grid.num_rows() {
        let style = grid.cell(r, style_col).trim().to_string();
        let color = grid.cell(r, color_col).trim().to_string();
        let size = sizes::normalize_size_token(grid.cell(r, size_col));
        if style.is_empty() || size.is_empty() {
            continue;
        }

        let raw_stock = stock_col.map(|c| grid.cell(r, c)).unwrap_or("");
        let qty = stock::parse_stock(raw_stock, ctx.stock_mappings()).unwrap_or(0);

        let mut v = Variant::new(style, color, size, qty);
        if let Some(c) = name_col {
            v.brand = brand_in_name(grid.cell(r, c));
        }
        if let Some(c) = price_col {
            let cleaned: String = grid
                .cell(r, c)
                .chars()
                .filter(|ch| ch.is_ascii_digit() || *ch == '.')
                .collect();
            v.price = cleaned.parse().ok();
        }
        if !raw_stock.trim().is_empty() {
            v.set_raw_cell(RAW_STOCK_KEY, raw_stock);
        }
        variants.push(v);
    }

    Ok(variants)
}
