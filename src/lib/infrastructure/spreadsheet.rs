//! Recipient lists from CSV files and spreadsheet workbooks

use std::{io::Cursor, path::Path};

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::{ReaderBuilder, Trim};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::recipients::RecipientTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Errors reading a recipient list
#[derive(Debug, Error)]
pub enum SpreadsheetError {
    /// Only CSV files and Excel/OpenDocument workbooks can be read
    #[error("unsupported file format '{0}'; use .csv, .xlsx, .xls or .ods")]
    UnsupportedFormat(String),

    /// The file has no header row
    #[error("the file has no header row")]
    MissingHeader,

    /// The workbook has no worksheets
    #[error("the workbook has no worksheets")]
    NoWorksheet,

    /// The file could not be read
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    /// The contents are not valid CSV
    #[error("invalid CSV: {0}")]
    Parse(#[from] csv::Error),

    /// The workbook could not be opened or read
    #[error("invalid workbook: {0}")]
    Workbook(#[from] calamine::Error),
}

/// Layouts a recipient list can be read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpreadsheetFormat {
    /// Comma-separated text
    Csv,

    /// An `.xlsx`, `.xlsm`, `.xls`, `.xlsb` or `.ods` workbook; the first sheet is read
    Workbook,
}

impl SpreadsheetFormat {
    /// The format implied by a file's extension
    pub fn from_path(path: &Path) -> Result<Self, SpreadsheetError> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_lowercase();

        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::Workbook),
            "" => Err(SpreadsheetError::UnsupportedFormat(
                path.display().to_string(),
            )),
            other => Err(SpreadsheetError::UnsupportedFormat(format!(".{other}"))),
        }
    }
}

/// Reads a recipient list from disk, choosing the reader by file extension
pub async fn read_recipients(path: impl AsRef<Path>) -> Result<RecipientTable, SpreadsheetError> {
    let path = path.as_ref();
    let format = SpreadsheetFormat::from_path(path)?;

    let bytes = tokio::fs::read(path).await?;
    let table = match format {
        SpreadsheetFormat::Csv => parse_recipients(&bytes)?,
        SpreadsheetFormat::Workbook => parse_workbook(bytes)?,
    };

    info!(path = %path.display(), ?format, rows = table.len(), columns = table.headers().len(), "loaded recipient list");

    Ok(table)
}

/// Parses CSV bytes: UTF-8 (with or without a byte-order mark), falling back to Latin-1
pub fn parse_recipients(bytes: &[u8]) -> Result<RecipientTable, SpreadsheetError> {
    let text = decode(bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();

    if headers.iter().all(str::is_empty) {
        return Err(SpreadsheetError::MissingHeader);
    }

    let mut table = RecipientTable::new(headers.iter());

    for record in reader.records() {
        let record = record?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        table.push_row(
            record
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
    }

    Ok(table)
}

/// Parses the first worksheet of a workbook. Row one holds the headers; every
/// cell is read as its displayed text, trimmed.
pub fn parse_workbook(bytes: Vec<u8>) -> Result<RecipientTable, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoWorksheet)??;

    let mut rows = range.rows();

    let headers = match rows.next() {
        Some(headers) if !headers.iter().all(|cell| cell_text(cell).is_none()) => headers,
        _ => return Err(SpreadsheetError::MissingHeader),
    };

    let mut table = RecipientTable::new(
        headers
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default()),
    );

    for row in rows {
        let cells: Vec<Option<String>> = row.iter().map(cell_text).collect();

        if cells.iter().all(Option::is_none) {
            continue;
        }

        table.push_row(cells);
    }

    Ok(table)
}

fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(text) => text.trim().to_string(),
        other => other.to_string().trim().to_string(),
    };

    (!text.is_empty()).then_some(text)
}

fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("recipient list is not UTF-8, decoding as Latin-1");

            bytes.iter().map(|&byte| char::from(byte)).collect()
        }
    }
}
