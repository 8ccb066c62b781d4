//! isbnsearch.org source.
//!
//! Fetches `<base_url><isbn>` and reads the book details block of the page:
//! the `<h2>` title and the `<strong>Label:</strong> value` pairs that
//! follow it, plus the first used-book offer from the price tables.
//! ISBN lookups only.
//!
//! Every field the page layout carries is reported, as unknown when the
//! page lacks it. A title starting with `ISBN` is the site's placeholder
//! for an unknown book and is reported unknown too.

use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use quick_xml::escape::unescape_with;
use regex::Regex;
use tracing::debug;

use crate::models::{Field, FieldValue, Mode, PartialRecord};
use crate::traits::Source;

/// Provenance name of this source.
pub const NAME: &str = "www.isbnsearch.org";

pub struct IsbnSearchSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl IsbnSearchSource {
    pub fn new(base_url: String, client: reqwest::blocking::Client) -> Self {
        Self { base_url, client }
    }
}

impl Source for IsbnSearchSource {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "isbnsearch.org book pages (HTML)"
    }

    fn supports(&self, mode: Mode) -> bool {
        mode == Mode::Isbn
    }

    fn fetch(&self, key: &str, mode: Mode) -> Result<PartialRecord> {
        if mode != Mode::Isbn {
            bail!("{} only supports ISBN lookups", NAME);
        }

        let url = format!("{}{}", self.base_url, key);
        debug!(%url, "querying isbnsearch");

        let page = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()?
            .text()?;

        Ok(parse_page(&page))
    }
}

/// Extract record fields from a book page.
pub fn parse_page(html: &str) -> PartialRecord {
    let mut data = PartialRecord::new()
        .with(Field::Title, FieldValue::Unknown)
        .with(Field::Isbn13, FieldValue::Unknown)
        .with(Field::Isbn10, FieldValue::Unknown)
        .with(Field::Author, FieldValue::Unknown)
        .with(Field::Binding, FieldValue::Unknown)
        .with(Field::Publisher, FieldValue::Unknown)
        .with(Field::Published, FieldValue::Unknown)
        .with(Field::UsedPrice, FieldValue::Unknown);

    if let Some(title) = title_re().captures(html).and_then(|c| text_of(&c[1])) {
        if !title.starts_with("ISBN") {
            data.set(Field::Title, title);
        }
    }

    for caps in label_re().captures_iter(html) {
        let field = match caps[1].trim() {
            "ISBN-13" => Field::Isbn13,
            "ISBN-10" => Field::Isbn10,
            "Author" | "Authors" => Field::Author,
            "Binding" => Field::Binding,
            "Publisher" => Field::Publisher,
            "Published" => Field::Published,
            _ => continue,
        };
        if let Some(value) = text_of(&caps[2]) {
            data.set(field, value);
        }
    }

    // The second price table lists used offers.
    if let Some(table) = prices_re().captures_iter(html).nth(1) {
        if let Some(price) = price_cell_re()
            .captures(&table[1])
            .and_then(|c| text_of(&c[1]))
        {
            data.set(Field::UsedPrice, price);
        }
    }

    data
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<h2[^>]*>(.*?)</h2>").expect("valid regex"))
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<strong>\s*([A-Za-z0-9 \-]+?)\s*:\s*</strong>(.*?)(?:</p>|<br\s*/?>|<strong>)")
            .expect("valid regex")
    })
}

fn prices_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<table[^>]*class="[^"]*\bprices\b[^"]*"[^>]*>(.*?)</table>"#)
            .expect("valid regex")
    })
}

fn price_cell_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<td[^>]*class="[^"]*\bprice\b[^"]*"[^>]*>(.*?)</td>"#)
            .expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

/// Visible text of an HTML fragment, or `None` if it is blank.
fn text_of(fragment: &str) -> Option<String> {
    let stripped = tag_re().replace_all(fragment, "");
    let text = decode_entities(&stripped);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Decode character references. Text with a reference that cannot be
/// resolved is kept as it was scraped.
fn decode_entities(text: &str) -> String {
    let decoded = unescape_with(text, |entity| match entity {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        "nbsp" => Some(" "),
        _ => None,
    });
    match decoded {
        Ok(text) => text.into_owned(),
        Err(e) => {
            debug!(error = %e, "leaving undecodable text as is");
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
<html><body>
<div class="bookinfo">
  <h2>Collins Gem Birds &amp; Nests</h2>
  <p><strong>ISBN-13:</strong> <a href="/isbn/9780004704814">9780004704814</a></p>
  <p><strong>ISBN-10:</strong> <a href="/isbn/0004704819">0004704819</a></p>
  <p><strong>Author:</strong> Peter Holden</p>
  <p><strong>Binding:</strong> Paperback</p>
  <p><strong>Publisher:</strong> Collins</p>
  <p><strong>Published:</strong> 1996</p>
</div>
<table class="prices"><tbody><tr><td class="contents">new</td><td class="price"><p><a href="#">$12.00</a></p></td></tr></tbody></table>
<table class="prices"><tbody><tr><td class="contents">used</td><td class="price"><p><a href="#">$3.49</a></p></td></tr></tbody></table>
</body></html>
"##;

    #[test]
    fn test_full_page() {
        let data = parse_page(PAGE);
        assert_eq!(
            data.get(Field::Title),
            Some(&FieldValue::known("Collins Gem Birds & Nests"))
        );
        assert_eq!(data.get(Field::Isbn13), Some(&FieldValue::known("9780004704814")));
        assert_eq!(data.get(Field::Isbn10), Some(&FieldValue::known("0004704819")));
        assert_eq!(data.get(Field::Author), Some(&FieldValue::known("Peter Holden")));
        assert_eq!(data.get(Field::Binding), Some(&FieldValue::known("Paperback")));
        assert_eq!(data.get(Field::Publisher), Some(&FieldValue::known("Collins")));
        assert_eq!(data.get(Field::Published), Some(&FieldValue::known("1996")));
        assert_eq!(data.get(Field::UsedPrice), Some(&FieldValue::known("$3.49")));
        assert!(data.get(Field::Lccn).is_none());
    }

    #[test]
    fn test_placeholder_title_is_unknown() {
        let data = parse_page("<h2>ISBN 9780004704814</h2>");
        assert_eq!(data.get(Field::Title), Some(&FieldValue::Unknown));
    }

    #[test]
    fn test_empty_page_reports_every_field_unknown() {
        let data = parse_page("<html></html>");
        assert_eq!(data.len(), 8);
        assert!(data.iter().all(|(_, v)| v.is_unknown()));
    }

    #[test]
    fn test_single_price_table_has_no_used_price() {
        let page = r#"<table class="prices"><tr><td class="price">$1</td></tr></table>"#;
        assert_eq!(parse_page(page).get(Field::UsedPrice), Some(&FieldValue::Unknown));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &#39;c&#x27;&nbsp;d"), "a & b 'c' d");
        assert_eq!(decode_entities("Birds &lt;Gem&gt;"), "Birds <Gem>");
    }

    #[test]
    fn test_undecodable_text_is_kept() {
        assert_eq!(decode_entities("Q&A &bogus;"), "Q&A &bogus;");
    }

    #[test]
    fn test_rejects_lccn_mode() {
        let client = reqwest::blocking::Client::new();
        let src = IsbnSearchSource::new("http://127.0.0.1:9/isbn/".to_string(), client);
        assert!(!src.supports(Mode::Lccn));
        assert!(src.fetch("85000002", Mode::Lccn).is_err());
    }
}
