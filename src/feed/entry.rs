use std::collections::BTreeSet;
use thiserror::Error;

/// Atom namespace URI. Elements outside it are ignored by the parser and
/// the serializer always declares it as the default namespace.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// One article discovered in a WebSub delivery.
///
/// Built by [`parse`](super::parse) with normalized fields and never mutated
/// afterwards. Two entries with the same `id` describe the same article, even
/// when a feed update re-delivers it with a fresher `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Globally unique entry identifier (usually a URI). Primary dedup key.
    pub id: String,
    /// `<published>` value, preserved verbatim.
    pub published_at: Option<String>,
    /// `<updated>` value, preserved verbatim.
    pub updated_at: Option<String>,
    /// Entity-decoded title with internal whitespace collapsed.
    pub title: String,
    pub author: Option<Author>,
    /// Category terms. Stored as a set so source order never affects output.
    pub categories: BTreeSet<String>,
    /// The canonical `rel="alternate"` link.
    pub link: Option<EntryLink>,
    pub summary: Option<Summary>,
}

impl Entry {
    /// Name of the first author, if the entry has one.
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.name.as_str())
    }

    /// URL of the canonical article link.
    pub fn link_href(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.href.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub uri: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLink {
    pub href: String,
    /// Media type from the `type` attribute, e.g. `text/html`.
    pub media_type: Option<String>,
}

/// Entry summary, kept as an opaque string.
///
/// For `type="html"` summaries `content` holds the HTML markup itself (one
/// level of XML escaping removed). It is never unescaped a second time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub content: String,
    /// Atom text construct type: `html` or `text`. `None` means the source
    /// did not say, which the serializer publishes as `html`.
    pub content_type: Option<String>,
}

impl Summary {
    pub fn html(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: Some("html".to_string()),
        }
    }
}

/// Non-fatal problems found while parsing a delivery.
///
/// `index` is the zero-based position of the `<entry>` element in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    /// The payload could not be parsed at all; no entries were extracted.
    #[error("Malformed XML payload: {0}")]
    Malformed(String),

    /// The document element is neither an Atom `<feed>` nor an `<entry>`.
    #[error("Unexpected root element <{0}>, expected Atom feed or entry")]
    UnexpectedRoot(String),

    /// A required field is absent or empty; the entry was dropped.
    #[error("Entry #{index} dropped: missing {field}")]
    MissingField {
        index: usize,
        field: &'static str,
        id: Option<String>,
    },

    /// Text contained an entity reference that could not be resolved.
    /// The raw text was kept.
    #[error("Entry #{index}: could not decode <{element}> text: {detail}")]
    UndecodableText {
        index: usize,
        element: String,
        detail: String,
    },

    /// A timestamp is not RFC 3339. It is still preserved verbatim.
    #[error("Entry {id}: <{field}> is not an RFC 3339 timestamp: {value}")]
    InvalidTimestamp {
        id: String,
        field: &'static str,
        value: String,
    },
}

impl ParseWarning {
    /// Whether the warning caused an entry (or the whole payload) to be dropped.
    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            ParseWarning::Malformed(_)
                | ParseWarning::UnexpectedRoot(_)
                | ParseWarning::MissingField { .. }
        )
    }
}

/// Result of parsing one delivery: the publishable entries plus everything
/// that went wrong along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    pub entries: Vec<Entry>,
    pub warnings: Vec<ParseWarning>,
}
