//! Raw tabular recipient input

/// Header row plus raw cell values, as read from a spreadsheet.
///
/// Every row holds exactly one cell per header; `None` marks an absent value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecipientTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RecipientTable {
    /// Create an empty table, trimming the header names
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|header| header.as_ref().trim().to_string())
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }

    /// Builder-style row from string cells, empty strings becoming absent values
    pub fn with_row(mut self, cells: &[&str]) -> Self {
        self.push_row(
            cells
                .iter()
                .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                .collect(),
        );
        self
    }

    /// Header names
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_trimmed() {
        let table = RecipientTable::new([" Email ", "Name"]);

        assert_eq!(table.headers(), ["Email", "Name"]);
    }

    #[test]
    fn test_rows_are_padded_and_truncated() {
        let table = RecipientTable::new(["Email", "Name"])
            .with_row(&["a@example.com"])
            .with_row(&["b@example.com", "Bea", "extra"]);

        assert_eq!(table.rows()[0], vec![Some("a@example.com".to_string()), None]);
        assert_eq!(table.rows()[1].len(), 2);
        assert_eq!(table.len(), 2);
    }
}
