//! RFC 8288 `Link` header parsing, as Canvas uses it for pagination.
//!
//! Canvas answers list endpoints with headers such as:
//!
//! ```text
//! <https://c.example/api/v1/courses/1/modules?page=1&per_page=1>; rel="current",
//! <https://c.example/api/v1/courses/1/modules?page=2&per_page=1>; rel="next"
//! ```

use std::collections::HashMap;

/// Relations parsed out of a `Link` header, keyed by `rel`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Links {
    rels: HashMap<String, String>,
}

impl Links {
    /// Parse a raw header value. Malformed entries are skipped.
    pub fn parse(header: &str) -> Self {
        let mut rels = HashMap::new();

        for entry in split_entries(header) {
            let mut parts = entry.split(';');
            let target = match parts.next().map(str::trim) {
                Some(t) if t.starts_with('<') && t.ends_with('>') => &t[1..t.len() - 1],
                _ => continue,
            };

            for param in parts {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                if !key.trim().eq_ignore_ascii_case("rel") {
                    continue;
                }
                // A single rel attribute may carry several space-separated relation types.
                for rel in value.trim().trim_matches('"').split_whitespace() {
                    rels.entry(rel.to_ascii_lowercase())
                        .or_insert_with(|| target.to_string());
                }
            }
        }

        Self { rels }
    }

    pub fn get(&self, rel: &str) -> Option<&str> {
        self.rels.get(rel).map(String::as_str)
    }

    pub fn next(&self) -> Option<&str> {
        self.get("next")
    }

    pub fn has_next(&self) -> bool {
        self.next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }
}

/// Split on commas that separate link values, not those inside `<...>` or quotes.
fn split_entries(header: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_target = false;
    let mut in_quotes = false;

    for (i, c) in header.char_indices() {
        match c {
            '<' if !in_quotes => in_target = true,
            '>' if !in_quotes => in_target = false,
            '"' if !in_target => in_quotes = !in_quotes,
            ',' if !in_target && !in_quotes => {
                out.push(header[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = header[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
