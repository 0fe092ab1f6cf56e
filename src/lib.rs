//! WebSub callback that republishes Atom entries onto an MQTT topic tree.
//!
//! A hub pushes Atom payloads to the callback; each new entry is parsed,
//! deduplicated by id, re-serialized into a canonical Atom entry document
//! and published to `{organization}/{project}[/{tag}]`.

pub mod config;
pub mod dedup;
pub mod feed;
pub mod publish;
pub mod server;
pub mod storage;
pub mod websub;
