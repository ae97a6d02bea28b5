//! Raw buffer to cell grid.
//!
//! Every feed file — xlsx, xls, csv, tsv — becomes a `SheetGrid` of plain
//! strings before any parser sees it. Spreadsheet cells are coerced to
//! strings at this boundary so values like `1921E0136` can never be
//! corrupted by numeric inference.

use anyhow::{bail, Context, Result};
use calamine::{Data, Reader};
use std::io::Cursor;

/// One acquired feed file: name plus raw bytes.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub data: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Accepted feed extensions.
pub fn is_feed_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    ["xlsx", "xls", "csv", "tsv"]
        .iter()
        .any(|ext| lower.ends_with(&format!(".{}", ext)))
}

/// A dense two-dimensional grid of string cells. Missing cells read as "".
#[derive(Debug, Clone, Default)]
pub struct SheetGrid {
    pub rows: Vec<Vec<String>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.iter().all(|c| c.trim().is_empty()))
    }

    /// Count of rows with at least one non-empty cell.
    pub fn data_row_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .count()
    }
}

fn excel_cell_to_string(data: &Data) -> String {
    match data {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            // Whole floats print as integers so serials and style numbers
            // survive ("45292", not "45292.0").
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if serial.fract() == 0.0 {
                format!("{}", serial as i64)
            } else {
                format!("{}", serial)
            }
        }
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

fn read_spreadsheet(file: &RawFile) -> Result<SheetGrid> {
    let cursor = Cursor::new(file.data.clone());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .with_context(|| format!("failed to open spreadsheet {}", file.name))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .with_context(|| format!("{} contains no sheets", file.name))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet {} of {}", sheet_name, file.name))?;

    let (row_off, col_off) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    // Pad back to absolute coordinates so column indices line up with what
    // the vendor layouts describe.
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); row_off];
    for row in range.rows() {
        let mut out = vec![String::new(); col_off];
        out.extend(row.iter().map(excel_cell_to_string));
        rows.push(out);
    }

    Ok(SheetGrid::new(rows))
}

/// Strip a UTF-8 BOM or decode UTF-16LE/BE into a `String`.
fn decode_text(data: &[u8]) -> Result<String> {
    if data.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Ok(String::from_utf8_lossy(&data[3..]).into_owned());
    }
    if data.starts_with(&[0xFF, 0xFE]) {
        let units: Vec<u16> = data[2..]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units).context("invalid UTF-16LE text");
    }
    if data.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = data[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units).context("invalid UTF-16BE text");
    }
    Ok(String::from_utf8_lossy(data).into_owned())
}

/// CSV detection: no spreadsheet magic, a delimiter present, and the first
/// 1000 bytes look like printable text.
pub fn looks_like_delimited_text(data: &[u8]) -> bool {
    if data.starts_with(b"PK\x03\x04") || data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        return false;
    }
    let window = &data[..data.len().min(1000)];
    if window.is_empty() {
        return false;
    }
    let printable = window
        .iter()
        .filter(|&&b| b == b'\t' || b == b'\r' || b == b'\n' || b >= 0x20)
        .count();
    if (printable as f64) / (window.len() as f64) < 0.9 {
        return false;
    }
    window.contains(&b',') || window.contains(&b'\t')
}

/// Majority vote between comma and tab on the first line.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let commas = first_line.matches(',').count();
    let tabs = first_line.matches('\t').count();
    if tabs > commas {
        b'\t'
    } else {
        b','
    }
}

fn read_delimited(file: &RawFile) -> Result<SheetGrid> {
    let text = decode_text(&file.data)?;
    let delimiter = sniff_delimiter(&text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("malformed delimited row in {}", file.name))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(SheetGrid::new(rows))
}

/// Read one raw feed file into a grid, picking the reader by magic bytes.
pub fn read_grid(file: &RawFile) -> Result<SheetGrid> {
    if file.data.is_empty() {
        bail!("{} is empty", file.name);
    }

    if file.data.starts_with(b"PK\x03\x04") || file.data.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
        return read_spreadsheet(file);
    }

    if looks_like_delimited_text(&file.data) {
        return read_delimited(file);
    }

    // Some vendors serve xlsx without the expected extension or ship odd
    // containers; let calamine make the final call.
    read_spreadsheet(file)
}

/// Consolidate multiple files into one grid: the first file in full, then
/// the data rows of each subsequent file (their header row is skipped when
/// it repeats the first file's header).
pub fn consolidate(grids: Vec<SheetGrid>) -> SheetGrid {
    let mut iter = grids.into_iter();
    let Some(first) = iter.next() else {
        return SheetGrid::default();
    };
    let header = first.row(0).to_vec();
    let mut rows = first.rows;

    for grid in iter {
        for (i, row) in grid.rows.into_iter().enumerate() {
            if i == 0 && !header.is_empty() && row == header {
                continue;
            }
            rows.push(row);
        }
    }

    SheetGrid::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_file(text: &str) -> RawFile {
        RawFile::new("feed.csv", text.as_bytes().to_vec())
    }

    #[test]
    fn csv_with_quotes_and_doubled_escapes() {
        let grid = read_grid(&csv_file("style,color\n\"A \"\"1\"\"\",\"Red, Dark\"\n")).unwrap();
        assert_eq!(grid.cell(1, 0), "A \"1\"");
        assert_eq!(grid.cell(1, 1), "Red, Dark");
    }

    #[test]
    fn tab_delimiter_majority() {
        let grid = read_grid(&csv_file("style\tcolor\tsize\n100\tRed\t8\n")).unwrap();
        assert_eq!(grid.cell(1, 2), "8");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"style,color\n1,Red\n");
        let grid = read_grid(&RawFile::new("bom.csv", data)).unwrap();
        assert_eq!(grid.cell(0, 0), "style");
    }

    #[test]
    fn utf16le_is_decoded() {
        let text = "style,color\n1,Red\n";
        let mut data = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            data.extend_from_slice(&unit.to_le_bytes());
        }
        let grid = read_grid(&RawFile::new("utf16.csv", data)).unwrap();
        assert_eq!(grid.cell(1, 1), "Red");
    }

    #[test]
    fn scientific_looking_style_stays_literal() {
        let grid = read_grid(&csv_file("style,stock\n1921E0136,4\n")).unwrap();
        assert_eq!(grid.cell(1, 0), "1921E0136");
    }

    #[test]
    fn consolidation_keeps_first_header_once() {
        let a = SheetGrid::new(vec![
            vec!["style".into(), "stock".into()],
            vec!["1".into(), "2".into()],
        ]);
        let b = SheetGrid::new(vec![
            vec!["style".into(), "stock".into()],
            vec!["3".into(), "4".into()],
        ]);
        let merged = consolidate(vec![a, b]);
        assert_eq!(merged.num_rows(), 3);
        assert_eq!(merged.cell(2, 0), "3");
    }

    #[test]
    fn delimited_detection_rejects_spreadsheet_magic() {
        assert!(!looks_like_delimited_text(b"PK\x03\x04rest"));
        assert!(looks_like_delimited_text(b"a,b,c\n1,2,3\n"));
    }
}
