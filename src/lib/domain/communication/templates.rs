//! Placeholder rendering for subjects and bodies

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::domain::recipients::Recipient;

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\{([A-Za-z0-9_]+)\}").unwrap();
    static ref SCRIPT_REGEX: Regex = Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap();
    static ref BLOCK_END_REGEX: Regex =
        Regex::new(r"(?i)<br\s*/?>|</(p|div|tr|li|h[1-6]|table)>").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"<[^>]+>").unwrap();
}

/// Substitutes every `{identifier}` token whose identifier names a recipient
/// column (ignoring case) with that column's value.
///
/// Tokens without a matching column are left as written. Values are inserted
/// verbatim and never rescanned, so rendering the same template against the
/// same recipient always yields the same text.
pub fn render(template: &str, recipient: &Recipient) -> String {
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures<'_>| match recipient.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// The distinct placeholder identifiers used in a template, as written
pub fn extract_placeholders(template: &str) -> BTreeSet<String> {
    PLACEHOLDER_REGEX
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Placeholders in `template` with no matching column in `columns`.
///
/// Advisory only: [`render`] leaves these tokens untouched.
pub fn missing_for<I, S>(template: &str, columns: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let available: BTreeSet<String> = columns
        .into_iter()
        .map(|column| column.as_ref().to_lowercase())
        .collect();

    extract_placeholders(template)
        .into_iter()
        .filter(|placeholder| !available.contains(&placeholder.to_lowercase()))
        .collect()
}

/// A plain-text rendition of an HTML body for the text/plain alternative
pub fn html_to_plain(html: &str) -> String {
    let text = SCRIPT_REGEX.replace_all(html, "");
    let text = BLOCK_END_REGEX.replace_all(&text, "\n");
    let text = TAG_REGEX.replace_all(&text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann() -> Recipient {
        Recipient::new().with("Name", "Ann").with("Company", "Acme")
    }

    #[test]
    fn test_render_substitutes_columns_ignoring_case() {
        let rendered = render("Hello {name}, you are at {company}", &ann());

        assert_eq!(rendered, "Hello Ann, you are at Acme");
        assert_eq!(render("{NAME} / {Company}", &ann()), "Ann / Acme");
    }

    #[test]
    fn test_render_leaves_unknown_tokens() {
        let rendered = render("Call {phone} or {name}", &ann());

        assert_eq!(rendered, "Call {phone} or Ann");
    }

    #[test]
    fn test_render_is_idempotent() {
        let recipient = ann().with("Note", "{company}");
        let template = "{note} from {name}";

        let first = render(template, &recipient);
        let second = render(template, &recipient);

        assert_eq!(first, "{company} from Ann");
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_ignores_non_identifier_braces() {
        let template = "<style>p { color: red }</style>{ name } {name}";

        assert_eq!(
            render(template, &ann()),
            "<style>p { color: red }</style>{ name } Ann"
        );
    }

    #[test]
    fn test_empty_value_renders_empty() {
        let recipient = ann().with("Phone", "");

        assert_eq!(render("[{phone}]", &recipient), "[]");
    }

    #[test]
    fn test_extract_placeholders() {
        let placeholders = extract_placeholders("Hi {name}, {company} {name} {first_name}");

        assert_eq!(
            placeholders.into_iter().collect::<Vec<_>>(),
            ["company", "first_name", "name"]
        );
    }

    #[test]
    fn test_missing_for() {
        let missing = missing_for("Hi {Name} at {company}, call {phone}", ["name", "Company"]);

        assert_eq!(missing.into_iter().collect::<Vec<_>>(), ["phone"]);
    }

    #[test]
    fn test_html_to_plain() {
        let html = "<html><head><style>p { margin: 0 }</style></head>\
            <body><h2>Hello Ann,</h2><p>Fish &amp; chips<br/>today</p></body></html>";

        assert_eq!(html_to_plain(html), "Hello Ann,\nFish & chips\ntoday");
    }
}
