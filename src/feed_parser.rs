//! RSS 2.0, RSS 1.0 (RDF) and Atom parsing on top of `quick-xml`.
//!
//! The parser is deliberately forgiving about which elements appear and
//! strict only about XML well-formedness and the document root. Namespace
//! prefixes are ignored (`dc:date` is read as `date`, `rdf:RDF` as `RDF`).

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::FeedError;
use crate::models::{BlogMetadata, FeedEntry};
use crate::sanitize::{decode_entities, to_valid_utf8};

/// A parsed feed document.
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub metadata: BlogMetadata,
    pub entries: Vec<FeedEntry>,
}

/// Fields collected while inside one `<item>` / `<entry>`.
#[derive(Default)]
struct EntryFields {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    guid_is_permalink: bool,
    updated: Option<String>,
    published: Option<String>,
}

impl EntryFields {
    /// Resolve into an entry. `fetched_at` stands in for a missing or
    /// unparseable timestamp.
    fn finish(self, fetched_at: DateTime<Utc>) -> Option<FeedEntry> {
        let url = self
            .link
            .filter(|l| !l.is_empty())
            .or_else(|| self.guid.filter(|g| self.guid_is_permalink && is_http_url(g)))?;

        let updated_at = self
            .updated
            .as_deref()
            .and_then(parse_date)
            .or_else(|| self.published.as_deref().and_then(parse_date))
            .unwrap_or(fetched_at);

        Some(FeedEntry {
            url,
            title: self.title.unwrap_or_default(),
            updated_at,
        })
    }
}

/// Parse a feed document.
///
/// `url` is only used for error context. Entries without a timestamp get
/// `fetched_at`; entries without any usable link are skipped.
pub fn parse_feed(
    url: &str,
    xml: &[u8],
    fetched_at: DateTime<Utc>,
) -> Result<ParsedFeed, FeedError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut seen_root = false;
    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();

    let mut title: Option<String> = None;
    let mut site_url: Option<String> = None;
    let mut current: Option<EntryFields> = None;
    let mut entries = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| FeedError::parse(url, e.to_string()))?;

        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                if !seen_root {
                    check_root(url, &name)?;
                    seen_root = true;
                }
                text.clear();

                if is_entry_element(&name) {
                    current = Some(EntryFields::default());
                } else if name == "link" {
                    let parent = stack.last().map(String::as_str);
                    apply_link_attrs(&e, parent, &mut current, &mut site_url);
                } else if name == "guid" {
                    if let Some(fields) = current.as_mut() {
                        fields.guid_is_permalink = attr(&e, "isPermaLink")
                            .map_or(true, |v| !v.eq_ignore_ascii_case("false"));
                    }
                }
                stack.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                if !seen_root {
                    check_root(url, &name)?;
                    seen_root = true;
                }
                if name == "link" {
                    let parent = stack.last().map(String::as_str);
                    apply_link_attrs(&e, parent, &mut current, &mut site_url);
                }
            }
            Event::Text(e) => {
                text.push_str(&decode_entities(&to_valid_utf8(&e)));
            }
            Event::CData(e) => {
                text.push_str(&to_valid_utf8(&e));
            }
            Event::End(e) => {
                let core = is_core_element(&e.name());
                let Some(name) = stack.pop() else {
                    return Err(FeedError::parse(url, "unbalanced closing tag"));
                };
                let value = std::mem::take(&mut text).trim().to_string();
                let parent = stack.last().map(String::as_str);

                if is_entry_element(&name) {
                    if let Some(fields) = current.take() {
                        match fields.finish(fetched_at) {
                            Some(entry) => entries.push(entry),
                            None => tracing::debug!(feed = %url, "skipping feed entry without a link"),
                        }
                    }
                } else if let Some(fields) = current.as_mut() {
                    if parent.is_some_and(is_entry_element) {
                        assign_entry_field(fields, &name, core, value);
                    }
                } else if parent.is_some_and(is_channel_element) {
                    match name.as_str() {
                        "title" if core && title.is_none() => title = Some(value),
                        "link" if site_url.is_none() && !value.is_empty() => {
                            site_url = Some(value)
                        }
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(FeedError::parse(url, "document has no root element"));
    }
    if !stack.is_empty() {
        return Err(FeedError::parse(url, "document ended inside an element"));
    }

    Ok(ParsedFeed {
        metadata: BlogMetadata {
            site_url,
            title: title.unwrap_or_default(),
        },
        entries,
    })
}

fn check_root(url: &str, name: &str) -> Result<(), FeedError> {
    match name {
        "rss" | "RDF" | "feed" => Ok(()),
        other => Err(FeedError::parse(
            url,
            format!("unsupported root element <{}>", other),
        )),
    }
}

fn is_entry_element(name: &str) -> bool {
    name == "item" || name == "entry"
}

fn is_channel_element(name: &str) -> bool {
    name == "channel" || name == "feed"
}

/// Unprefixed, or in the Atom namespace under its usual prefix. Extension
/// vocabularies (`itunes:`, `media:`) reuse names like `title`.
fn is_core_element(name: &QName<'_>) -> bool {
    name.prefix().map_or(true, |p| p.as_ref() == b"atom")
}

fn assign_entry_field(fields: &mut EntryFields, name: &str, core: bool, value: String) {
    match name {
        "title" if core && fields.title.is_none() => fields.title = Some(value),
        // RSS carries the URL as text; Atom links were taken from attributes
        "link" if fields.link.is_none() && !value.is_empty() => fields.link = Some(value),
        "guid" | "id" => fields.guid = Some(value),
        "updated" | "date" | "modified" => fields.updated = Some(value),
        "pubDate" | "published" | "issued" => fields.published = Some(value),
        _ => {}
    }
}

/// Atom-style `<link href rel>`. Only alternate links (explicit or implied)
/// point at the human-readable page.
fn apply_link_attrs(
    e: &BytesStart<'_>,
    parent: Option<&str>,
    current: &mut Option<EntryFields>,
    site_url: &mut Option<String>,
) {
    let Some(href) = attr(e, "href").filter(|h| !h.is_empty()) else {
        return;
    };
    let rel = attr(e, "rel");
    if rel.is_some_and(|r| r != "alternate") {
        return;
    }

    match current.as_mut() {
        Some(fields) if parent.is_some_and(is_entry_element) => {
            if fields.link.is_none() {
                fields.link = Some(href);
            }
        }
        None if parent.is_some_and(is_channel_element) => {
            if site_url.is_none() {
                *site_url = Some(href);
            }
        }
        _ => {}
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .map(|a| decode_entities(&to_valid_utf8(&a.value)).trim().to_string())
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Zone-less layouts seen in the wild, read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// RFC 3339 (Atom) or RFC 2822 (RSS) timestamp, with a few lenient
/// fallbacks: a wrong or unknown weekday is ignored, and a date-time
/// without an offset is taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw).or_else(|_| DateTime::parse_from_rfc2822(raw)) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some((_, rest)) = raw.split_once(',') {
        if let Ok(dt) = DateTime::parse_from_rfc2822(rest.trim()) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
