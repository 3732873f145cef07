//! Recipient validation and de-duplication

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::{
    email_address::EmailAddress,
    recipient::{
        Recipient, EMAIL_COLUMN, EMAIL_COLUMN_ALIASES, NAME_COLUMN, NAME_COLUMN_ALIASES,
    },
    table::RecipientTable,
};

/// Errors that reject a whole recipient table
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No header matches any of the address column aliases
    #[error("missing 'Email' column (found: {})", .columns.join(", "))]
    MissingColumn {
        /// The headers that were present
        columns: Vec<String>,
    },
}

/// Why a row was not accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The address cell is empty or absent
    Missing,

    /// The address does not satisfy the address grammar
    Invalid,

    /// The normalized address already appeared earlier in the batch
    Duplicate,
}

/// A rejected row
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// 1-based data row number
    pub row: usize,

    /// The raw address, if any
    pub address: Option<String>,

    /// Why the row was rejected
    pub reason: RejectionReason,
}

/// Summary of a validation pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Number of data rows examined
    pub total_rows: usize,

    /// Rows with a syntactically valid address, duplicates included
    pub valid: usize,

    /// Rows whose address failed the grammar
    pub invalid: usize,

    /// Rows without an address
    pub missing: usize,

    /// Valid rows dropped because their address was already seen
    pub duplicates: usize,

    /// Valid rows on a disposable-inbox domain (advisory)
    pub disposable: usize,

    /// Rows accepted for sending
    pub accepted: usize,

    /// The header resolved as the address column
    pub email_column: String,

    /// The header resolved as the name column, if any
    pub name_column: Option<String>,

    /// All headers in source order
    pub columns: Vec<String>,

    /// Headers named `Email` or `Name` that lost to an earlier alias column and
    /// are left out of accepted recipients
    pub shadowed_columns: Vec<String>,

    /// Per-row rejection details
    pub rejections: Vec<Rejection>,
}

impl ValidationReport {
    /// Whether at least one recipient was accepted
    pub fn is_sendable(&self) -> bool {
        self.accepted > 0
    }
}

/// Filters a table down to valid, de-duplicated recipients.
///
/// The first occurrence of each normalized address wins. Accepted recipients
/// expose the resolved address column as `Email` and the name column as
/// `Name`; every other column keeps its header name, absent values becoming
/// empty strings.
pub fn validate(
    table: &RecipientTable,
) -> Result<(Vec<Recipient>, ValidationReport), ValidationError> {
    let headers = table.headers();

    let email_index =
        find_column(headers, EMAIL_COLUMN_ALIASES).ok_or_else(|| ValidationError::MissingColumn {
            columns: headers.to_vec(),
        })?;
    let name_index = find_column(headers, NAME_COLUMN_ALIASES);

    let mut report = ValidationReport {
        total_rows: table.len(),
        email_column: headers[email_index].clone(),
        name_column: name_index.map(|index| headers[index].clone()),
        columns: headers.to_vec(),
        shadowed_columns: headers
            .iter()
            .enumerate()
            .filter(|(index, header)| is_shadowed(header, *index, email_index, name_index))
            .map(|(_, header)| header.clone())
            .collect(),
        ..Default::default()
    };

    if !report.shadowed_columns.is_empty() {
        debug!(columns = ?report.shadowed_columns, "columns shadowed by resolved address/name columns");
    }

    let mut seen = HashSet::new();
    let mut accepted = Vec::new();

    for (index, row) in table.rows().iter().enumerate() {
        let row_number = index + 1;

        let raw = row[email_index]
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        let Some(raw) = raw else {
            report.missing += 1;
            report.rejections.push(Rejection {
                row: row_number,
                address: None,
                reason: RejectionReason::Missing,
            });
            continue;
        };

        let address = match EmailAddress::new(raw) {
            Ok(address) => address,
            Err(_) => {
                report.invalid += 1;
                report.rejections.push(Rejection {
                    row: row_number,
                    address: Some(raw.to_string()),
                    reason: RejectionReason::Invalid,
                });
                continue;
            }
        };

        report.valid += 1;

        if address.is_disposable() {
            report.disposable += 1;
        }

        if !seen.insert(address.normalized()) {
            report.duplicates += 1;
            report.rejections.push(Rejection {
                row: row_number,
                address: Some(raw.to_string()),
                reason: RejectionReason::Duplicate,
            });
            continue;
        }

        accepted.push(to_recipient(headers, row, email_index, name_index, &address));
    }

    report.accepted = accepted.len();

    debug!(
        total = report.total_rows,
        accepted = report.accepted,
        invalid = report.invalid,
        missing = report.missing,
        duplicates = report.duplicates,
        "validated recipient table"
    );

    Ok((accepted, report))
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| aliases.contains(&header.trim().to_lowercase().as_str()))
}

fn is_shadowed(header: &str, index: usize, email_index: usize, name_index: Option<usize>) -> bool {
    index != email_index
        && Some(index) != name_index
        && (header.eq_ignore_ascii_case(EMAIL_COLUMN) || header.eq_ignore_ascii_case(NAME_COLUMN))
}

fn to_recipient(
    headers: &[String],
    row: &[Option<String>],
    email_index: usize,
    name_index: Option<usize>,
    address: &EmailAddress,
) -> Recipient {
    let mut recipient = Recipient::new();

    for (index, header) in headers.iter().enumerate() {
        if index == email_index {
            recipient.insert(EMAIL_COLUMN, address.as_str());
        } else if Some(index) == name_index {
            recipient.insert(NAME_COLUMN, row[index].clone().unwrap_or_default());
        } else if is_shadowed(header, index, email_index, name_index) {
            continue;
        } else {
            recipient.insert(header.as_str(), row[index].clone().unwrap_or_default());
        }
    }

    recipient
}
