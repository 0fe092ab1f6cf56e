use std::collections::BTreeSet;

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::entry::{Author, Entry, EntryLink, ParseOutcome, ParseWarning, Summary, ATOM_NS};
use super::text::{collapse_whitespace, non_empty, resolve_entity};

/// SEC-003: Maximum element nesting depth accepted in a delivery.
/// Atom entries are shallow; anything deeper is hostile or broken.
const MAX_XML_DEPTH: usize = 64;

/// Minimal element tree for one `<entry>` subtree.
///
/// Only entries are materialised; everything outside them (feed metadata,
/// hub status blocks) is streamed past.
#[derive(Debug, Default)]
struct Element {
    name: String,
    /// Element is in the Atom namespace (or unqualified).
    atom: bool,
    attrs: Vec<(String, String)>,
    /// Character data of the element and its descendants, in document order.
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |c| c.atom && c.name == name)
    }

    fn child<'a>(&'a self, name: &'a str) -> Option<&'a Element> {
        self.children_named(name).next()
    }
}

/// Parses a WebSub delivery into Atom entries.
///
/// Accepts either a bare `<entry>` document or a `<feed>` holding any number
/// of entries. Elements are matched by namespace, not prefix: both the Atom
/// namespace and unqualified names are accepted, anything in a foreign
/// namespace (for example a hub's status block) is skipped.
///
/// Never fails. Unparsable XML yields no entries and a
/// [`ParseWarning::Malformed`]; an entry missing `id` or `title` is dropped on
/// its own with a [`ParseWarning::MissingField`].
///
/// # Security
///
/// - SEC-002: DOCTYPE entity declarations are never expanded. Unknown entity
///   references are left as raw text and reported.
/// - SEC-003: Nesting deeper than 64 levels rejects the payload.
pub fn parse(bytes: &[u8]) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    let elements = match read_entry_elements(bytes, &mut outcome.warnings) {
        Ok(Some(elements)) => elements,
        Ok(None) => return outcome,
        Err(reason) => {
            tracing::warn!(error = %reason, "Discarding unparsable delivery");
            outcome.warnings.push(ParseWarning::Malformed(reason));
            return outcome;
        }
    };

    for (index, element) in elements.iter().enumerate() {
        if let Some(entry) = extract_entry(element, index, &mut outcome.warnings) {
            outcome.entries.push(entry);
        }
    }

    outcome
}

/// Streams the document and collects every `<entry>` subtree.
///
/// Returns `Ok(None)` when the document is well-formed so far but not Atom.
fn read_entry_elements(
    bytes: &[u8],
    warnings: &mut Vec<ParseWarning>,
) -> Result<Option<Vec<Element>>, String> {
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut entries = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut saw_root = false;

    loop {
        let (ns, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok(resolved) => resolved,
            Err(e) => return Err(e.to_string()),
        };
        let atom = match ns {
            ResolveResult::Bound(ns) => ns.as_ref() == ATOM_NS.as_bytes(),
            ResolveResult::Unbound => true,
            ResolveResult::Unknown(_) => false,
        };

        match event {
            Event::Start(e) => {
                if depth == 0 && !check_root(&e, atom, &mut saw_root, warnings) {
                    return Ok(None);
                }
                depth += 1;
                if depth > MAX_XML_DEPTH {
                    return Err(format!(
                        "nesting depth exceeds maximum of {} levels",
                        MAX_XML_DEPTH
                    ));
                }

                let starts_entry = stack.is_empty() && atom && e.local_name().as_ref() == b"entry";
                if !stack.is_empty() || starts_entry {
                    stack.push(open_element(&e, atom, reader.decoder()));
                }
            }
            Event::Empty(e) => {
                if depth == 0 && !check_root(&e, atom, &mut saw_root, warnings) {
                    return Ok(None);
                }

                let element = open_element(&e, atom, reader.decoder());
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                } else if atom && element.name == "entry" {
                    entries.push(element);
                }
            }
            Event::Text(t) => {
                if let Some(current) = stack.last_mut() {
                    let text = decode_text(&t, &current.name, entries.len(), warnings);
                    current.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if let Some(finished) = stack.pop() {
                    match stack.last_mut() {
                        Some(parent) => {
                            parent.text.push_str(&finished.text);
                            parent.children.push(finished);
                        }
                        None => entries.push(finished),
                    }
                }
            }
            Event::Eof => {
                if depth > 0 {
                    return Err("unexpected end of document: unclosed elements".to_string());
                }
                if !saw_root {
                    return Err("document contains no elements".to_string());
                }
                break;
            }
            // Declarations, comments, processing instructions, DOCTYPE
            _ => {}
        }
        buf.clear();
    }

    Ok(Some(entries))
}

/// Accepts `<feed>` or `<entry>` as the document element.
fn check_root(
    e: &BytesStart<'_>,
    atom: bool,
    saw_root: &mut bool,
    warnings: &mut Vec<ParseWarning>,
) -> bool {
    *saw_root = true;
    let local = e.local_name();
    let name = String::from_utf8_lossy(local.as_ref()).into_owned();
    if atom && (name == "feed" || name == "entry") {
        return true;
    }
    tracing::warn!(root = %name, "Delivery is not an Atom document");
    warnings.push(ParseWarning::UnexpectedRoot(name));
    false
}

fn open_element(e: &BytesStart<'_>, atom: bool, decoder: Decoder) -> Element {
    let local = e.local_name();
    let mut element = Element {
        name: String::from_utf8_lossy(local.as_ref()).into_owned(),
        atom,
        ..Element::default()
    };

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(err) => {
                tracing::warn!(element = %element.name, error = %err, "Skipping malformed attribute");
                continue;
            }
        };
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        // SEC-002: decode_and_unescape_value only resolves XML builtins and
        // character references; an unknown entity keeps the raw value.
        let value = match attr.decode_and_unescape_value(decoder) {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        element.attrs.push((name, value));
    }

    element
}

/// Unescapes one text node exactly once. On failure the raw text is kept so
/// no content is silently lost.
fn decode_text(
    t: &BytesText<'_>,
    element: &str,
    index: usize,
    warnings: &mut Vec<ParseWarning>,
) -> String {
    match t.unescape_with(resolve_entity) {
        Ok(text) => text.into_owned(),
        Err(e) => {
            warnings.push(ParseWarning::UndecodableText {
                index,
                element: element.to_string(),
                detail: e.to_string(),
            });
            String::from_utf8_lossy(t).into_owned()
        }
    }
}

/// Field-by-field extraction of one entry. Returns `None` (with a warning)
/// when `id` or `title` is missing.
fn extract_entry(
    element: &Element,
    index: usize,
    warnings: &mut Vec<ParseWarning>,
) -> Option<Entry> {
    let Some(id) = element.child("id").and_then(|e| non_empty(&e.text)) else {
        tracing::warn!(index, "Dropping entry without id");
        warnings.push(ParseWarning::MissingField {
            index,
            field: "id",
            id: None,
        });
        return None;
    };

    let title = element
        .child("title")
        .map(|e| collapse_whitespace(&e.text))
        .filter(|t| !t.is_empty());
    let Some(title) = title else {
        tracing::warn!(index, entry_id = %id, "Dropping entry without title");
        warnings.push(ParseWarning::MissingField {
            index,
            field: "title",
            id: Some(id),
        });
        return None;
    };

    let published_at = timestamp(element, "published", &id, warnings);
    let updated_at = timestamp(element, "updated", &id, warnings);

    let author = element.child("author").and_then(|a| {
        let name = a
            .child("name")
            .map(|n| collapse_whitespace(&n.text))
            .filter(|n| !n.is_empty())?;
        Some(Author {
            name,
            uri: a.child("uri").and_then(|u| non_empty(&u.text)),
            email: a.child("email").and_then(|e| non_empty(&e.text)),
        })
    });

    let categories: BTreeSet<String> = element
        .children_named("category")
        .filter_map(|c| c.attr("term").and_then(non_empty))
        .collect();

    // Atom treats a link without `rel` as `alternate`.
    let link = element
        .children_named("link")
        .filter(|l| matches!(l.attr("rel").map(str::trim), None | Some("alternate")))
        .find_map(|l| {
            let href = collapse_whitespace(l.attr("href")?);
            if href.is_empty() {
                return None;
            }
            Some(EntryLink {
                href,
                media_type: l.attr("type").and_then(non_empty),
            })
        });

    let summary = element
        .child("summary")
        .or_else(|| element.child("content").filter(|c| c.attr("src").is_none()))
        .and_then(|s| {
            let content_type = match s.attr("type").map(str::trim) {
                None => None,
                Some("html") | Some("text/html") => Some("html".to_string()),
                // XHTML children are flattened to their text
                Some("text") | Some("xhtml") | Some("text/plain") => Some("text".to_string()),
                Some(other) => {
                    tracing::debug!(entry_id = %id, content_type = %other, "Ignoring non-text summary");
                    return None;
                }
            };
            let content = s.text.trim();
            if content.is_empty() {
                return None;
            }
            Some(Summary {
                content: content.to_string(),
                content_type,
            })
        });

    Some(Entry {
        id,
        published_at,
        updated_at,
        title,
        author,
        categories,
        link,
        summary,
    })
}

fn timestamp(
    element: &Element,
    field: &'static str,
    id: &str,
    warnings: &mut Vec<ParseWarning>,
) -> Option<String> {
    let value = element.child(field).and_then(|e| non_empty(&e.text))?;
    if chrono::DateTime::parse_from_rfc3339(&value).is_err() {
        warnings.push(ParseWarning::InvalidTimestamp {
            id: id.to_string(),
            field,
            value: value.clone(),
        });
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Trimmed superfeedr delivery for a Medium tag feed.
    const SUPERFEEDR_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <status
            feed="https://medium.com/feed/tag/technology" xmlns="http://superfeedr.com/xmpp-pubsub-ext">
        <http
                code="200">Fetched (ping) 200 172800 and parsed 10/10 entries
        </http>
        <title>Technology on Medium
        </title>
    </status>
    <link
            title="Technology on Medium" rel="self" href="https://medium.com/feed/tag/technology"
            type="application/rss+xml"/>
    <title>Technology on Medium
    </title>
    <updated>2025-05-02T06:19:31.000Z</updated>
    <id>technology-on-medium-2025-5-2-6</id>

  <entry
            xmlns="http://www.w3.org/2005/Atom" xmlns:geo="http://www.georss.org/georss"
            xmlns:as="http://activitystrea.ms/spec/1.0/" xmlns:sf="http://superfeedr.com/xmpp-pubsub-ext">
        <id>
            https://medium.com/p/26bdcca8c014
        </id>
        <published>2025-05-02T05:53:16.000Z</published>
        <updated>2025-05-02T05:54:32.530Z</updated>
        <title>Why Developer Experience Portals Are the New Nerve Centers of the GenAI Age</title>
        <summary
                type="html">&lt;div class="medium-feed-item"&gt;&lt;p class="medium-feed-snippet"&gt;It now encompasses integrating tools, knowledge, and the&amp;#x2026;&lt;/p&gt;&lt;/div&gt;
        </summary>
        <link
                title="Why Developer Experience Portals Are the New Nerve Centers of the GenAI Age" rel="alternate"
                href="https://medium.com/@OpenTurf/why-developer-experience-portals-26bdcca8c014?source=rss------technology-5"
                type="text/html"/>
        <author>
            <name>OpenTurf Technologies</name>
            <uri></uri>
            <email></email>
            <id>OpenTurf Technologies</id>
        </author>
        <category term="coding"/>
        <category term="gen-ai-services"/>
        <category term="technology"/>
        <category
                term="developer-portal"/>
    </entry>
</feed>"#;

    #[test]
    fn test_parse_superfeedr_feed() {
        let outcome = parse(SUPERFEEDR_FEED.as_bytes());
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert_eq!(outcome.entries.len(), 1);

        let entry = &outcome.entries[0];
        assert_eq!(entry.id, "https://medium.com/p/26bdcca8c014");
        assert_eq!(
            entry.title,
            "Why Developer Experience Portals Are the New Nerve Centers of the GenAI Age"
        );
        assert_eq!(entry.published_at.as_deref(), Some("2025-05-02T05:53:16.000Z"));
        assert_eq!(entry.updated_at.as_deref(), Some("2025-05-02T05:54:32.530Z"));

        let author = entry.author.as_ref().unwrap();
        assert_eq!(author.name, "OpenTurf Technologies");
        assert_eq!(author.uri, None);
        assert_eq!(author.email, None);

        let categories: Vec<&str> = entry.categories.iter().map(String::as_str).collect();
        assert_eq!(
            categories,
            vec!["coding", "developer-portal", "gen-ai-services", "technology"]
        );

        let link = entry.link.as_ref().unwrap();
        assert_eq!(
            link.href,
            "https://medium.com/@OpenTurf/why-developer-experience-portals-26bdcca8c014?source=rss------technology-5"
        );
        assert_eq!(link.media_type.as_deref(), Some("text/html"));

        let summary = entry.summary.as_ref().unwrap();
        assert_eq!(summary.content_type.as_deref(), Some("html"));
        assert!(summary.content.starts_with(r#"<div class="medium-feed-item">"#));
        assert!(summary.content.ends_with("</div>"));
        // Unescaped exactly once: the nested character reference survives
        assert!(summary.content.contains("the&#x2026;</p>"));
    }

    #[test]
    fn test_feed_metadata_is_not_an_entry() {
        let outcome = parse(SUPERFEEDR_FEED.as_bytes());
        assert!(outcome
            .entries
            .iter()
            .all(|e| e.id != "technology-on-medium-2025-5-2-6"));
    }

    #[test]
    fn test_parse_bare_entry() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:uuid:1</id>
            <title>Solo</title>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id, "urn:uuid:1");
        assert_eq!(outcome.entries[0].title, "Solo");
        assert!(outcome.entries[0].link.is_none());
        assert!(outcome.entries[0].summary.is_none());
    }

    #[test]
    fn test_prefixed_namespace() {
        let xml = r#"<a:feed xmlns:a="http://www.w3.org/2005/Atom">
            <a:entry>
                <a:id>urn:prefixed</a:id>
                <a:title>Prefixed</a:title>
                <a:link href="https://example.com/p"/>
            </a:entry>
        </a:feed>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id, "urn:prefixed");
        assert_eq!(outcome.entries[0].link_href(), Some("https://example.com/p"));
    }

    #[test]
    fn test_unqualified_elements_accepted() {
        let xml = "<feed><entry><id>urn:plain</id><title>Plain</title></entry></feed>";
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries.len(), 1);
    }

    #[test]
    fn test_foreign_namespace_elements_ignored() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:x="urn:other">
            <x:id>urn:wrong</x:id>
            <id>urn:right</id>
            <x:title>Wrong</x:title>
            <title>Right</title>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries[0].id, "urn:right");
        assert_eq!(outcome.entries[0].title, "Right");
    }

    #[test]
    fn test_missing_id_drops_only_that_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry><title>No id</title></entry>
            <entry><id>urn:ok</id><title>Fine</title></entry>
        </feed>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].id, "urn:ok");
        assert_eq!(
            outcome.warnings,
            vec![ParseWarning::MissingField {
                index: 0,
                field: "id",
                id: None
            }]
        );
    }

    #[test]
    fn test_blank_title_drops_entry() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <entry><id>urn:a</id><title>   </title></entry>
        </feed>"#;
        let outcome = parse(xml.as_bytes());
        assert!(outcome.entries.is_empty());
        assert_eq!(
            outcome.warnings,
            vec![ParseWarning::MissingField {
                index: 0,
                field: "title",
                id: Some("urn:a".to_string())
            }]
        );
    }

    #[test]
    fn test_malformed_xml_yields_warning() {
        for payload in [
            "<not valid xml",
            "<feed><entry><id>x</id></feed>",
            "<feed><entry><id>x</id><title>t</title></entry>",
            "",
            "just some text",
        ] {
            let outcome = parse(payload.as_bytes());
            assert!(outcome.entries.is_empty(), "payload: {payload}");
            assert_eq!(outcome.warnings.len(), 1, "payload: {payload}");
            assert!(
                matches!(outcome.warnings[0], ParseWarning::Malformed(_)),
                "payload: {payload}: {:?}",
                outcome.warnings
            );
        }
    }

    #[test]
    fn test_non_atom_root() {
        let outcome = parse(b"<rss version=\"2.0\"><channel/></rss>");
        assert!(outcome.entries.is_empty());
        assert_eq!(
            outcome.warnings,
            vec![ParseWarning::UnexpectedRoot("rss".to_string())]
        );
    }

    #[test]
    fn test_whitespace_normalization() {
        let xml = "<entry xmlns=\"http://www.w3.org/2005/Atom\">
            <id>\n   urn:ws  \n</id>
            <title>  A title
                folded   across lines </title>
            <link rel=\"alternate\" href=\"https://example.com/a\n      ?b=1\"/>
            <summary>
                Line one
                  line two
            </summary>
        </entry>";
        let outcome = parse(xml.as_bytes());
        let entry = &outcome.entries[0];
        assert_eq!(entry.id, "urn:ws");
        assert_eq!(entry.title, "A title folded across lines");
        assert_eq!(entry.link_href(), Some("https://example.com/a ?b=1"));
        assert_eq!(
            entry.summary.as_ref().unwrap().content,
            "Line one\n                  line two"
        );
    }

    #[test]
    fn test_title_entities_decoded() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:e</id>
            <title>Rust &amp; Go &mdash; a &#8220;comparison&#8221;</title>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(
            outcome.entries[0].title,
            "Rust & Go \u{2014} a \u{201c}comparison\u{201d}"
        );
    }

    #[test]
    fn test_link_selection() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:l</id>
            <title>Links</title>
            <link rel="self" href="https://example.com/self"/>
            <link rel="alternate" href="https://example.com/first" type="text/html"/>
            <link rel="alternate" href="https://example.com/second"/>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(
            outcome.entries[0].link_href(),
            Some("https://example.com/first")
        );
    }

    #[test]
    fn test_sole_link_without_rel() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:l</id><title>T</title>
            <link href="https://example.com/only"/>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries[0].link_href(), Some("https://example.com/only"));
    }

    #[test]
    fn test_no_alternate_link() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:l</id><title>T</title>
            <link rel="enclosure" href="https://example.com/a.mp3"/>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert!(outcome.entries[0].link.is_none());
    }

    #[test]
    fn test_content_used_when_summary_absent() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:c</id><title>T</title>
            <content type="html">&lt;p&gt;Body&lt;/p&gt;</content>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        let summary = outcome.entries[0].summary.as_ref().unwrap();
        assert_eq!(summary.content, "<p>Body</p>");
        assert_eq!(summary.content_type.as_deref(), Some("html"));
    }

    #[test]
    fn test_cdata_summary() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:c</id><title>T</title>
            <summary type="html"><![CDATA[<b>bold</b> &amp; raw]]></summary>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(
            outcome.entries[0].summary.as_ref().unwrap().content,
            "<b>bold</b> &amp; raw"
        );
    }

    #[test]
    fn test_mixed_content_keeps_document_order() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:x</id>
            <title type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">Rust <em>really</em> rocks</div></title>
            <summary type="xhtml">a <b>b</b> c</summary>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        let entry = &outcome.entries[0];
        assert_eq!(entry.title, "Rust really rocks");
        let summary = entry.summary.as_ref().unwrap();
        assert_eq!(summary.content, "a b c");
        assert_eq!(summary.content_type.as_deref(), Some("text"));
    }

    #[test]
    fn test_invalid_timestamp_kept_with_warning() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:t</id><title>T</title>
            <updated>Fri, 02 May 2025 05:54:32 GMT</updated>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(
            outcome.entries[0].updated_at.as_deref(),
            Some("Fri, 02 May 2025 05:54:32 GMT")
        );
        assert!(matches!(
            outcome.warnings[0],
            ParseWarning::InvalidTimestamp { field: "updated", .. }
        ));
    }

    #[test]
    fn test_xxe_entity_not_expanded() {
        // SEC-002: the declared entity must not be substituted
        let xml = r#"<?xml version="1.0"?>
<!DOCTYPE entry [<!ENTITY xxe SYSTEM "file:///etc/passwd">]>
<entry xmlns="http://www.w3.org/2005/Atom">
    <id>urn:xxe</id>
    <title>Hello &xxe;</title>
</entry>"#;
        let outcome = parse(xml.as_bytes());
        for entry in &outcome.entries {
            assert!(!entry.title.contains("root:"));
        }
        assert!(outcome
            .warnings
            .iter()
            .any(|w| matches!(w, ParseWarning::UndecodableText { .. })));
    }

    #[test]
    fn test_deeply_nested_payload_rejected() {
        // SEC-003
        let mut xml = String::from(r#"<feed xmlns="http://www.w3.org/2005/Atom"><entry>"#);
        for _ in 0..100 {
            xml.push_str("<x>");
        }
        for _ in 0..100 {
            xml.push_str("</x>");
        }
        xml.push_str("</entry></feed>");

        let outcome = parse(xml.as_bytes());
        assert!(outcome.entries.is_empty());
        assert!(matches!(&outcome.warnings[0], ParseWarning::Malformed(m) if m.contains("64")));
    }

    #[test]
    fn test_empty_author_name_omits_author() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <id>urn:a</id><title>T</title>
            <author><name>  </name><uri>https://example.com</uri></author>
        </entry>"#;
        let outcome = parse(xml.as_bytes());
        assert!(outcome.entries[0].author.is_none());
    }
}
