//! Format auto-detection.
//!
//! Detection runs name/filename heuristics, then content heuristics on row
//! zero, then header-shape heuristics, returning the first match. A miss
//! returns `None` and the caller falls back to the generic row parser. The
//! first successful detection is learned back onto the source config so
//! later runs skip probing.

use lazy_static::lazy_static;
use regex::Regex;

use super::grid::SheetGrid;
use super::sizes;
use super::FormatType;

lazy_static! {
    static ref OTS_HEADER: Regex = Regex::new(r"(?i)^ots\d+$").unwrap();
    static ref PR_SERIAL_HEADER: Regex = Regex::new(r"^4\d{4}$").unwrap();
}

fn name_heuristics(haystack: &str) -> Option<FormatType> {
    let up = haystack.to_uppercase();

    if up.contains("JOVANI") && up.contains("SALE") {
        return Some(FormatType::JovaniSale);
    }
    if up.contains("GIA") && (up.contains("FRANCO") || up.contains("INV")) {
        return Some(FormatType::Feriani);
    }
    if up.contains("TARIK") || up.contains("EDIZ") {
        return Some(FormatType::TarikEdiz);
    }
    if up.contains("SHERRI") || up.contains("HILL") {
        return Some(FormatType::SherriHill);
    }
    if up.contains("GRN") {
        return Some(FormatType::GrnInvoice);
    }
    None
}

fn content_heuristics(grid: &SheetGrid) -> Option<FormatType> {
    let first = grid.cell(0, 0).to_lowercase();
    if first.contains("up-to-date") || first.contains("inventory report") {
        return Some(FormatType::TarikEdiz);
    }
    None
}

/// Pick the most header-looking row among the first ten: the one with the
/// most non-empty cells.
pub fn probable_header_row(grid: &SheetGrid) -> usize {
    let mut best = 0;
    let mut best_count = 0;
    for r in 0..grid.num_rows().min(10) {
        let count = grid.row(r).iter().filter(|c| !c.trim().is_empty()).count();
        if count > best_count {
            best_count = count;
            best = r;
        }
    }
    best
}

fn header_shape_heuristics(grid: &SheetGrid) -> Option<FormatType> {
    let header_row = probable_header_row(grid);
    let headers: Vec<String> = grid
        .row(header_row)
        .iter()
        .map(|h| h.trim().to_uppercase())
        .collect();
    if headers.is_empty() {
        return None;
    }

    if headers.iter().any(|h| OTS_HEADER.is_match(h)) {
        return Some(FormatType::OtsFormat);
    }

    if headers.iter().any(|h| h.contains("SPECIAL DATE")) {
        return Some(FormatType::SherriHill);
    }

    let has = |needle: &str| headers.iter().any(|h| h.contains(needle));

    if has("DELIVERY") && has("STYLE") && has("COLOR") {
        return Some(FormatType::Feriani);
    }

    let serial_headers = headers.iter().filter(|h| PR_SERIAL_HEADER.is_match(h)).count();
    if serial_headers >= 3 {
        return Some(FormatType::PrDateHeaders);
    }

    // GRN invoices pair a CODE column with leading-zero size headers; check
    // before the generic size-count rule claims them.
    let grn_sizes = headers
        .iter()
        .filter(|h| sizes::is_size_token(h) && (h.starts_with('0') || h.parse::<u32>().is_ok()))
        .count();
    if has("CODE")
        && has("COLOR")
        && grn_sizes >= 3
        && headers
            .iter()
            .any(|h| h.len() == 2 && h.starts_with('0') && h.as_str() != "00")
    {
        return Some(FormatType::GrnInvoice);
    }

    let size_cols: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| sizes::is_size_token(h))
        .map(|(i, _)| i)
        .collect();
    if size_cols.len() >= 5 {
        // Size headers beginning right next to the style column read as the
        // Jovani sale layout; anything later is a generic pivot.
        return if size_cols[0] <= 1 {
            Some(FormatType::JovaniSale)
        } else {
            Some(FormatType::GenericPivot)
        };
    }

    if (has("BRAND") || has("VENDOR") || has("PRODUCT NAME")) && has("STYLE") && has("COLOR") && has("SIZE") {
        return Some(FormatType::StoreMultibrand);
    }

    None
}

/// Run the full detection chain. `None` means "use the row parser".
pub fn detect_format(
    source_name: &str,
    file_name: Option<&str>,
    grid: &SheetGrid,
) -> Option<FormatType> {
    let haystack = format!("{} {}", source_name, file_name.unwrap_or(""));
    if let Some(f) = name_heuristics(&haystack) {
        return Some(f);
    }
    if let Some(f) = content_heuristics(grid) {
        return Some(f);
    }
    header_shape_heuristics(grid)
}
