//! Message bus side of the bridge.
//!
//! The callback handler only sees the [`Publisher`] trait, so the MQTT
//! client can be swapped for a logging publisher (`--dry-run`) or an
//! in-memory recorder in tests.
//!
//! # Topics
//!
//! Every entry goes to `{organization}/{project}`, or to
//! `{organization}/{project}/{tag}` when the delivery's feed has a tag.
//! See [`TopicPath`].

mod mqtt;

pub use mqtt::MqttPublisher;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors a publish can fail with. Any of them leaves the entry unrecorded.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The client rejected the request (closed channel, invalid topic).
    #[error("Publish rejected by client: {0}")]
    Client(String),

    /// The publish did not complete within the configured bound.
    #[error("Publish timed out after {0:?}")]
    Timeout(Duration),

    /// No connection to the broker.
    #[error("Message bus unavailable: {0}")]
    Unavailable(String),
}

/// Destination for serialized entries.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` to `topic`. `Ok` means the bus accepted it.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Base of the topic tree, `{organization}/{project}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPath {
    organization: String,
    project: String,
}

impl TopicPath {
    pub fn new(organization: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            organization: organization.into(),
            project: project.into(),
        }
    }

    pub fn base(&self) -> String {
        format!("{}/{}", self.organization, self.project)
    }

    /// Topic for an entry from a feed with the given tag.
    ///
    /// An empty or whitespace-only tag counts as no tag.
    pub fn topic_for(&self, tag: Option<&str>) -> String {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => format!("{}/{}/{}", self.organization, self.project, tag),
            None => self.base(),
        }
    }
}

/// Publisher that only logs what it would have sent. Used by `--dry-run`.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        tracing::info!(topic = %topic, bytes = payload.len(), "Dry run: would publish entry");
        tracing::debug!(payload = %String::from_utf8_lossy(&payload), "Dry run payload");
        Ok(())
    }
}
