//! Atom entry handling for WebSub deliveries.
//!
//! This module turns the raw body of a content notification into typed
//! entries and back into the canonical document that gets published:
//!
//! - **Parsing**: Namespace-aware extraction of `<entry>` elements from a
//!   `<feed>` or bare `<entry>` payload, tolerant of malformed input
//! - **Serialization**: Byte-stable Atom entry documents for downstream
//!   consumers
//!
//! # Architecture
//!
//! - [`entry`] - The [`Entry`] model and [`ParseWarning`] diagnostics
//! - [`parser`] - `quick-xml` streaming pass that builds small per-entry
//!   trees, then extracts fields one by one
//! - [`serializer`] - `quick-xml` writer producing the published form
//! - [`text`] - Whitespace and entity helpers shared by both directions
//!
//! # Example
//!
//! ```ignore
//! use websub_bridge::feed::{parse, serialize};
//!
//! let outcome = parse(body);
//! for entry in &outcome.entries {
//!     let xml = serialize(entry)?;
//! }
//! ```

mod entry;
mod parser;
mod serializer;
mod text;

pub use entry::{Author, Entry, EntryLink, ParseOutcome, ParseWarning, Summary, ATOM_NS};
pub use parser::parse;
pub use serializer::{serialize, SerializeError};
pub use text::collapse_whitespace;
