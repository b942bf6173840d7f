//! Hidden form field extraction
//!
//! The identity provider answers the credential POST with an HTML page that
//! auto-submits a hidden form to `/login/callback`. The login flow only needs
//! the `name`/`value` pairs of that form, so scraping sits behind a small
//! trait and the flow never touches HTML itself.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// Pulls `<input type="hidden">` name/value pairs out of an HTML document
pub trait HiddenFieldExtractor: Send + Sync {
    /// Map of hidden input names to their (entity-decoded) values
    fn extract_hidden_fields(&self, html: &str) -> HashMap<String, String>;
}

/// Regex-based extractor good enough for generated login callback pages
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexFieldExtractor;

impl HiddenFieldExtractor for RegexFieldExtractor {
    fn extract_hidden_fields(&self, html: &str) -> HashMap<String, String> {
        static INPUT_RE: OnceLock<Regex> = OnceLock::new();
        static ATTR_RE: OnceLock<Regex> = OnceLock::new();

        // A quoted attribute value may contain '>'
        #[allow(clippy::unwrap_used)]
        let input_re = INPUT_RE.get_or_init(|| {
            Regex::new(r#"(?is)<input\b((?:[^>"']|"[^"]*"|'[^']*')*)>"#).unwrap()
        });
        #[allow(clippy::unwrap_used)]
        let attr_re = ATTR_RE.get_or_init(|| {
            Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
                .unwrap()
        });

        let mut fields = HashMap::new();
        for input in input_re.captures_iter(html) {
            let mut name = None;
            let mut value = None;
            let mut hidden = false;

            for attr in attr_re.captures_iter(&input[1]) {
                let raw = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map_or("", |m| m.as_str());
                match attr[1].to_ascii_lowercase().as_str() {
                    "type" => hidden = raw.eq_ignore_ascii_case("hidden"),
                    "name" => name = Some(decode_entities(raw)),
                    "value" => value = Some(decode_entities(raw)),
                    _ => {}
                }
            }

            if let (true, Some(name), Some(value)) = (hidden, name, value) {
                fields.insert(name, value);
            }
        }
        fields
    }
}

/// Decode the character references that show up in attribute values
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let decoded = after.find(';').and_then(|end| {
            let entity = &after[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            ch.map(|c| (c, end + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
