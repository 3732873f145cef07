//! Recipient row

/// Canonical name of the address column on accepted recipients
pub const EMAIL_COLUMN: &str = "Email";

/// Canonical name of the name column on accepted recipients
pub const NAME_COLUMN: &str = "Name";

/// Header names (lower-cased) recognised as the address column
pub const EMAIL_COLUMN_ALIASES: &[&str] = &["email", "e-mail", "email address", "mail"];

/// Header names (lower-cased) recognised as the name column
pub const NAME_COLUMN_ALIASES: &[&str] = &["name", "full name", "fullname", "recipient name"];

/// One recipient: column name to value, in source column order.
///
/// Column lookups ignore case, so `{name}` in a template and a `NAME`
/// header refer to the same value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Recipient {
    columns: Vec<(String, String)>,
}

impl Recipient {
    /// Create an empty recipient
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Recipient::insert`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column, replacing any existing column with the same name ignoring case
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();

        match self
            .columns
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&column))
        {
            Some(entry) => entry.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Look up a column value ignoring case
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.as_str())
    }

    /// Column names and values in order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// The recipient's address, or an empty string if there is none
    pub fn email(&self) -> &str {
        first_present(self, EMAIL_COLUMN_ALIASES)
    }

    /// The recipient's display name, or an empty string if there is none
    pub fn name(&self) -> &str {
        first_present(self, NAME_COLUMN_ALIASES)
    }
}

fn first_present<'a>(recipient: &'a Recipient, aliases: &[&str]) -> &'a str {
    aliases
        .iter()
        .filter_map(|alias| recipient.get(alias))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}
