use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use super::entry::{Entry, ATOM_NS};

/// Errors that can occur while writing an entry document.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The XML writer failed on an element.
    #[error("Failed to write <{element}>: {reason}")]
    Write {
        element: &'static str,
        reason: String,
    },

    /// Writer output was not UTF-8 (cannot happen for `&str` input).
    #[error("Serialized entry contains invalid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

type EntryWriter = Writer<Cursor<Vec<u8>>>;

/// Serializes an entry into the canonical standalone Atom document that is
/// published downstream.
///
/// The output is stable: the same [`Entry`] always produces byte-identical
/// XML. Fields are written in a fixed order, categories in sorted order, and
/// absent optional fields produce no element at all.
///
/// # Format
///
/// ```text
/// <?xml version="1.0" encoding="UTF-8"?>
/// <entry xmlns="http://www.w3.org/2005/Atom">
///   <id>…</id>
///   <published>…</published>
///   <updated>…</updated>
///   <title>…</title>
///   <author><name>…</name><uri>…</uri><email>…</email></author>
///   <category term="…"/>
///   <link rel="alternate" href="…" type="…" title="…"/>
///   <summary type="html">…</summary>
/// </entry>
/// ```
///
/// Text and attribute values are escaped once. A summary holding HTML
/// markup is written as escaped text, so readers get the markup back after a
/// single unescape.
pub fn serialize(entry: &Entry) -> Result<String, SerializeError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
        "?xml",
    )?;

    let mut root = BytesStart::new("entry");
    root.push_attribute(("xmlns", ATOM_NS));
    write(&mut writer, Event::Start(root), "entry")?;

    write_text_element(&mut writer, "id", &entry.id)?;
    if let Some(published) = &entry.published_at {
        write_text_element(&mut writer, "published", published)?;
    }
    if let Some(updated) = &entry.updated_at {
        write_text_element(&mut writer, "updated", updated)?;
    }
    write_text_element(&mut writer, "title", &entry.title)?;

    if let Some(author) = &entry.author {
        write(&mut writer, Event::Start(BytesStart::new("author")), "author")?;
        write_text_element(&mut writer, "name", &author.name)?;
        if let Some(uri) = author.uri.as_deref().filter(|u| !u.is_empty()) {
            write_text_element(&mut writer, "uri", uri)?;
        }
        if let Some(email) = author.email.as_deref().filter(|e| !e.is_empty()) {
            write_text_element(&mut writer, "email", email)?;
        }
        write(&mut writer, Event::End(BytesEnd::new("author")), "author")?;
    }

    for term in &entry.categories {
        let mut category = BytesStart::new("category");
        category.push_attribute(("term", term.as_str()));
        write(&mut writer, Event::Empty(category), "category")?;
    }

    if let Some(link) = &entry.link {
        let mut element = BytesStart::new("link");
        element.push_attribute(("rel", "alternate"));
        element.push_attribute(("href", link.href.as_str()));
        if let Some(media_type) = &link.media_type {
            element.push_attribute(("type", media_type.as_str()));
        }
        element.push_attribute(("title", entry.title.as_str()));
        write(&mut writer, Event::Empty(element), "link")?;
    }

    if let Some(summary) = &entry.summary {
        let mut element = BytesStart::new("summary");
        element.push_attribute(("type", summary.content_type.as_deref().unwrap_or("html")));
        write(&mut writer, Event::Start(element), "summary")?;
        write(
            &mut writer,
            Event::Text(BytesText::new(&summary.content)),
            "summary",
        )?;
        write(&mut writer, Event::End(BytesEnd::new("summary")), "summary")?;
    }

    write(&mut writer, Event::End(BytesEnd::new("entry")), "entry")?;

    let bytes = writer.into_inner().into_inner();
    Ok(String::from_utf8(bytes)?)
}

fn write_text_element(
    writer: &mut EntryWriter,
    name: &'static str,
    text: &str,
) -> Result<(), SerializeError> {
    write(writer, Event::Start(BytesStart::new(name)), name)?;
    write(writer, Event::Text(BytesText::new(text)), name)?;
    write(writer, Event::End(BytesEnd::new(name)), name)
}

fn write(
    writer: &mut EntryWriter,
    event: Event<'_>,
    element: &'static str,
) -> Result<(), SerializeError> {
    writer
        .write_event(event)
        .map_err(|e| SerializeError::Write {
            element,
            reason: e.to_string(),
        })
}
