//! HTML to plain text for post bodies.
//!
//! [`HtmlCleaner`] holds its compiled patterns and is built once at startup,
//! then shared (usually behind an `Arc`) with the feed reader.
//!
//! Cleaning runs in a fixed order:
//!
//! 1. Decode the raw bytes as UTF-8, dropping invalid sequences.
//! 2. Remove boilerplate blocks together with their text: `code`, `nav`,
//!    `header`, `footer`, `pre`.
//! 3. Strict sanitization: comments, `script` and `style` go with their
//!    content, every other tag is removed and its text kept.
//! 4. Decode HTML entities and drop anything that is not valid text.
//!
//! Step 2 must run before step 3. Tag stripping keeps enclosed text, so
//! running it first would leave navigation and footer text in the body.

use quick_xml::escape::resolve_html5_entity;
use regex::Regex;

/// Elements that are almost never post content.
const BOILERPLATE_ELEMENTS: &[&str] = &["code", "nav", "header", "footer", "pre"];

/// Elements whose content is never text, even under the strictest policy.
const NON_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Inside of a start tag: anything but `>`, where quoted attribute values
/// may contain `>`.
const TAG_BODY: &str = r#"(?:[^>"']|"[^"]*"|'[^']*')*"#;

/// Longest entity name we try to resolve, `&` and `;` excluded.
const MAX_ENTITY_LEN: usize = 32;

/// Opening and closing tag patterns for one element name.
struct ElementTags {
    open: Regex,
    close: Regex,
}

impl ElementTags {
    fn new(name: &str) -> Self {
        Self {
            open: compile(&format!(r"(?i)<{name}\b{TAG_BODY}>")),
            close: compile(&format!(r"(?i)</{name}\s*>")),
        }
    }

    /// Remove every balanced occurrence of the element, content included.
    /// Nested occurrences go with their outermost ancestor. An opening tag
    /// that is never closed is left alone.
    fn remove(&self, html: &str) -> String {
        let mut marks: Vec<(usize, usize, bool)> = self
            .open
            .find_iter(html)
            .map(|m| (m.start(), m.end(), true))
            .chain(self.close.find_iter(html).map(|m| (m.start(), m.end(), false)))
            .collect();
        marks.sort_unstable_by_key(|&(start, _, _)| start);

        let mut out = String::with_capacity(html.len());
        let mut copied = 0;
        let mut depth = 0usize;
        let mut outer_start = 0;
        for (start, end, is_open) in marks {
            if is_open {
                if depth == 0 {
                    outer_start = start;
                }
                depth += 1;
            } else if depth > 0 {
                depth -= 1;
                if depth == 0 {
                    out.push_str(&html[copied..outer_start]);
                    copied = end;
                }
            }
        }
        out.push_str(&html[copied..]);
        out
    }
}

pub struct HtmlCleaner {
    boilerplate: Vec<ElementTags>,
    non_text: Vec<Regex>,
    comment: Regex,
    tag: Regex,
    whitespace: Regex,
}

impl Default for HtmlCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlCleaner {
    pub fn new() -> Self {
        Self {
            boilerplate: BOILERPLATE_ELEMENTS
                .iter()
                .map(|e| ElementTags::new(e))
                .collect(),
            non_text: NON_TEXT_ELEMENTS.iter().map(|e| element(e)).collect(),
            comment: compile(r"(?s)<!--.*?-->"),
            tag: compile(&format!(r"</?[A-Za-z!?]{TAG_BODY}>")),
            whitespace: compile(r"\s+"),
        }
    }

    /// Reduce a fetched HTML document to plain text. Never fails; input
    /// that is not HTML at all simply comes back as its text.
    pub fn clean(&self, raw: &[u8]) -> String {
        let mut text = to_valid_utf8(raw);

        for element in &self.boilerplate {
            text = element.remove(&text);
        }

        text = self.strip_markup(&text);
        decode_entities(&text)
            .chars()
            .filter(|c| *c != '\u{FFFD}' && (!c.is_control() || c.is_whitespace()))
            .collect()
    }

    /// Strict policy: nothing survives but text.
    fn strip_markup(&self, html: &str) -> String {
        let mut text = self.comment.replace_all(html, "").into_owned();
        for pattern in &self.non_text {
            text = pattern.replace_all(&text, "").into_owned();
        }
        // Tags become spaces so adjacent blocks do not run together
        let text = self.tag.replace_all(&text, " ");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

/// Matches a whole element, content included, up to its first closing tag.
fn element(name: &str) -> Regex {
    compile(&format!(r"(?is)<{name}\b{TAG_BODY}>.*?</{name}\s*>"))
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in cleaning pattern is valid")
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
pub fn to_valid_utf8(raw: &[u8]) -> String {
    let mut out = String::with_capacity(raw.len());
    for chunk in raw.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Decode named (HTML5) and numeric character references.
///
/// Unknown names are left as written. Numeric references to code points
/// that are not valid `char`s are dropped.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp + 1..];

        let end = candidate
            .char_indices()
            .take(MAX_ENTITY_LEN + 1)
            .find(|(_, c)| *c == ';')
            .map(|(i, _)| i);

        match end {
            Some(end) => {
                let name = &candidate[..end];
                match resolve_reference(name) {
                    Reference::Text(resolved) => out.push_str(resolved),
                    Reference::Char(c) => out.push(c),
                    Reference::Invalid => {}
                    Reference::Unknown => {
                        out.push('&');
                        out.push_str(name);
                        out.push(';');
                    }
                }
                rest = &candidate[end + 1..];
            }
            None => {
                out.push('&');
                rest = candidate;
            }
        }
    }

    out.push_str(rest);
    out
}

enum Reference {
    Text(&'static str),
    Char(char),
    Invalid,
    Unknown,
}

fn resolve_reference(name: &str) -> Reference {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => num.parse::<u32>(),
        };
        return match code {
            Ok(code) => char::from_u32(code).map_or(Reference::Invalid, Reference::Char),
            Err(_) => Reference::Unknown,
        };
    }

    match resolve_html5_entity(name) {
        Some(resolved) => Reference::Text(resolved),
        None => Reference::Unknown,
    }
}
