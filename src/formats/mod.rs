//! Feed formats: detection, reading, and the per-layout parsers.
//!
//! Ten vendor layouts plus a generic row layout. Every parser consumes the
//! same string grid and produces canonical variants; nothing downstream of
//! this module knows what the vendor file looked like.

pub mod dates;
pub mod detect;
pub mod grid;
pub mod sizes;
pub mod stock;

pub mod feriani;
pub mod generic_pivot;
pub mod grn_invoice;
pub mod jovani_sale;
pub mod multibrand;
pub mod ots;
pub mod pr_dates;
pub mod row;
pub mod sherri_hill;
pub mod tarik_ediz;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::models::Variant;
use crate::sources::{DataSource, StockTextMapping};
use grid::SheetGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatType {
    JovaniSale,
    Feriani,
    TarikEdiz,
    SherriHill,
    GenericPivot,
    PrDateHeaders,
    GrnInvoice,
    StoreMultibrand,
    OtsFormat,
    Row,
}

impl FormatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatType::JovaniSale => "jovani_sale",
            FormatType::Feriani => "feriani",
            FormatType::TarikEdiz => "tarik_ediz",
            FormatType::SherriHill => "sherri_hill",
            FormatType::GenericPivot => "generic_pivot",
            FormatType::PrDateHeaders => "pr_date_headers",
            FormatType::GrnInvoice => "grn_invoice",
            FormatType::StoreMultibrand => "store_multibrand",
            FormatType::OtsFormat => "ots_format",
            FormatType::Row => "row",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "jovani_sale" => Some(Self::JovaniSale),
            "feriani" => Some(Self::Feriani),
            "tarik_ediz" => Some(Self::TarikEdiz),
            "sherri_hill" => Some(Self::SherriHill),
            "generic_pivot" => Some(Self::GenericPivot),
            "pr_date_headers" => Some(Self::PrDateHeaders),
            "grn_invoice" => Some(Self::GrnInvoice),
            "store_multibrand" => Some(Self::StoreMultibrand),
            "ots_format" => Some(Self::OtsFormat),
            "row" => Some(Self::Row),
            _ => None,
        }
    }
}

/// What a parser is allowed to see besides the grid.
pub struct ParseContext<'a> {
    pub source: &'a DataSource,
    pub file_name: Option<&'a str>,
}

impl<'a> ParseContext<'a> {
    pub fn new(source: &'a DataSource, file_name: Option<&'a str>) -> Self {
        Self { source, file_name }
    }

    pub fn stock_mappings(&self) -> &[StockTextMapping] {
        &self.source.config.stock_text_mappings
    }

    pub fn european_dates(&self) -> bool {
        self.source.config.european_dates()
    }

    pub fn configured_sizes(&self) -> &[String] {
        &self.source.config.configured_sizes
    }
}

/// Dispatch one grid through the parser for `format`.
pub fn parse_with_format(
    format: FormatType,
    grid: &SheetGrid,
    ctx: &ParseContext,
) -> Result<Vec<Variant>> {
    match format {
        FormatType::JovaniSale => jovani_sale::parse(grid, ctx),
        FormatType::Feriani => feriani::parse(grid, ctx),
        FormatType::TarikEdiz => tarik_ediz::parse(grid, ctx),
        FormatType::SherriHill => sherri_hill::parse(grid, ctx),
        FormatType::GenericPivot => generic_pivot::parse(grid, ctx),
        FormatType::PrDateHeaders => pr_dates::parse(grid, ctx),
        FormatType::GrnInvoice => grn_invoice::parse(grid, ctx),
        FormatType::StoreMultibrand => multibrand::parse(grid, ctx),
        FormatType::OtsFormat => ots::parse(grid, ctx),
        FormatType::Row => row::parse(grid, ctx),
    }
}

/// Raw stock cell text rides along for complex-stock patterns.
pub const RAW_STOCK_KEY: &str = "__stock_raw";
