use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::link::self_link;
use super::signature::{verify_signature, SignatureError};
use super::verification::{HubMode, VerificationError, VerificationOutcome, VerificationRequest};
use crate::config::Config;
use crate::dedup::DedupTracker;
use crate::feed::{self, Entry, ParseWarning};
use crate::publish::{PublishError, Publisher, TopicPath};
use crate::storage::Database;

/// A content notification as received on the callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct Notification<'a> {
    pub body: &'a [u8],
    /// Raw `Link` header values.
    pub link_headers: &'a [&'a str],
    /// `X-Hub-Topic` header, used when no `rel="self"` link is present.
    pub hub_topic: Option<&'a str>,
    /// `X-Hub-Signature` header.
    pub signature: Option<&'a str>,
}

/// Entries accepted from one notification, ready to publish.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Feed topic URL the notification came from, when known.
    pub source: Option<String>,
    /// Bus topic every entry of this delivery is published to.
    pub topic: String,
    pub entries: Vec<Entry>,
    pub warnings: Vec<ParseWarning>,
}

/// Per-entry results of [`CallbackHandler::deliver`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub published: Vec<String>,
    /// Already claimed or published before.
    pub duplicates: Vec<String>,
    /// Serialization or publish failed; left unrecorded.
    pub failed: Vec<String>,
}

/// The WebSub callback state machine.
///
/// Owns nothing global: the dedup tracker, publisher and optional journal
/// are injected at construction and shared by reference. Cheap to share
/// behind an `Arc` across request handlers and delivery tasks.
pub struct CallbackHandler {
    config: Arc<Config>,
    topics: TopicPath,
    tracker: Arc<DedupTracker>,
    publisher: Arc<dyn Publisher>,
    database: Option<Database>,
    publish_timeout: Duration,
}

impl CallbackHandler {
    pub fn new(
        config: Arc<Config>,
        tracker: Arc<DedupTracker>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let topics = TopicPath::new(&config.organization, &config.project);
        let publish_timeout = Duration::from_millis(config.mqtt.publish_timeout_ms.max(1));
        Self {
            config,
            topics,
            tracker,
            publisher,
            database: None,
            publish_timeout,
        }
    }

    /// Journals publishes and subscription leases in `database`.
    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Answers a hub verification request from its query parameters.
    ///
    /// Confirmed subscribes record the lease and confirmed unsubscribes
    /// remove it (best-effort, only with a database).
    pub async fn verify(&self, params: &HashMap<String, String>) -> VerificationOutcome {
        let request = match VerificationRequest::from_query(params) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected verification request");
                return VerificationOutcome::Rejected(e);
            }
        };

        if request.mode == HubMode::Denied {
            tracing::warn!(
                topic = %request.topic,
                reason = request.reason.as_deref().unwrap_or("none given"),
                "Hub denied subscription"
            );
            return VerificationOutcome::Denied {
                topic: request.topic,
                reason: request.reason,
            };
        }

        if !self.expects_topic(&request.topic) {
            tracing::warn!(
                topic = %request.topic,
                mode = request.mode.as_str(),
                "Verification for unexpected topic"
            );
            return VerificationOutcome::UnknownTopic {
                topic: request.topic,
            };
        }

        let Some(challenge) = request.challenge.clone() else {
            // from_query guarantees a challenge outside denied mode
            return VerificationOutcome::Rejected(VerificationError::MissingParameter(
                "hub.challenge",
            ));
        };

        self.record_lease(&request).await;
        tracing::info!(
            topic = %request.topic,
            mode = request.mode.as_str(),
            lease_seconds = ?request.lease_seconds,
            "Verified subscription intent"
        );
        VerificationOutcome::Confirmed { challenge }
    }

    /// With no feeds configured every topic is accepted.
    fn expects_topic(&self, topic: &str) -> bool {
        self.config.feeds.is_empty() || self.config.feed_for_topic(topic).is_some()
    }

    async fn record_lease(&self, request: &VerificationRequest) {
        let Some(db) = &self.database else {
            return;
        };
        let result = match request.mode {
            HubMode::Subscribe => db
                .upsert_subscription(&request.topic, request.lease_seconds, Utc::now())
                .await
                .map(|_| ()),
            HubMode::Unsubscribe => db.remove_subscription(&request.topic).await.map(|_| ()),
            HubMode::Denied => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(topic = %request.topic, error = %e, "Failed to record subscription lease");
        }
    }

    // ========================================================================
    // Content notifications
    // ========================================================================

    /// Authenticates and parses a notification.
    ///
    /// Never fails on payload problems: malformed XML yields a delivery with
    /// no entries and a warning. Only a signature failure refuses the
    /// content, and the caller still acknowledges the request.
    pub fn accept(&self, notification: &Notification<'_>) -> Result<Delivery, SignatureError> {
        let source = self_link(notification.link_headers.iter().copied()).or_else(|| {
            notification
                .hub_topic
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        });
        let feed = source
            .as_deref()
            .and_then(|topic| self.config.feed_for_topic(topic));

        if let Some(secret) = self.config.secret_for(feed) {
            if let Err(e) =
                verify_signature(secret.as_bytes(), notification.body, notification.signature)
            {
                tracing::warn!(
                    source = source.as_deref().unwrap_or("unknown"),
                    error = %e,
                    "Ignoring notification with invalid signature"
                );
                return Err(e);
            }
        }

        if source.is_some() && feed.is_none() && !self.config.feeds.is_empty() {
            tracing::debug!(
                source = source.as_deref().unwrap_or_default(),
                "Notification for unconfigured topic, using base topic"
            );
        }

        let tag = feed.and_then(|f| f.tag.as_deref());
        let topic = self.topics.topic_for(tag);
        let outcome = feed::parse(notification.body);

        for warning in &outcome.warnings {
            if warning.is_drop() {
                tracing::warn!(topic = %topic, warning = %warning, "Dropped notification content");
            } else {
                tracing::debug!(topic = %topic, warning = %warning, "Notification parse warning");
            }
        }
        tracing::info!(
            topic = %topic,
            entries = outcome.entries.len(),
            warnings = outcome.warnings.len(),
            bytes = notification.body.len(),
            "Accepted notification"
        );

        Ok(Delivery {
            source,
            topic,
            entries: outcome.entries,
            warnings: outcome.warnings,
        })
    }

    /// Publishes every entry of `delivery` that has not been published yet.
    ///
    /// Each entry is claimed in the tracker before publishing and released
    /// again if serialization or the publish fails, so only successful
    /// publishes stay recorded. Failures never stop sibling entries.
    pub async fn deliver(&self, delivery: Delivery) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for entry in delivery.entries {
            if !self.tracker.claim(&entry.id, Utc::now()) {
                tracing::debug!(entry_id = %entry.id, "Skipping already published entry");
                report.duplicates.push(entry.id);
                continue;
            }

            match self.publish_entry(&delivery.topic, &entry).await {
                Ok(()) => {
                    let published_at = Utc::now();
                    self.tracker.record(&entry.id, published_at);
                    self.journal(&entry.id, &delivery.topic, published_at).await;
                    tracing::info!(entry_id = %entry.id, topic = %delivery.topic, "Published entry");
                    report.published.push(entry.id);
                }
                Err(e) => {
                    self.tracker.release(&entry.id);
                    tracing::error!(
                        entry_id = %entry.id,
                        topic = %delivery.topic,
                        error = %e,
                        "Failed to publish entry"
                    );
                    report.failed.push(entry.id);
                }
            }
        }

        report
    }

    /// [`accept`](Self::accept) then [`deliver`](Self::deliver). Signature
    /// failures deliver nothing.
    pub async fn handle_notification(&self, notification: &Notification<'_>) -> DeliveryReport {
        match self.accept(notification) {
            Ok(delivery) => self.deliver(delivery).await,
            Err(_) => DeliveryReport::default(),
        }
    }

    async fn publish_entry(&self, topic: &str, entry: &Entry) -> Result<(), DeliverError> {
        let payload = feed::serialize(entry)?.into_bytes();
        tokio::time::timeout(self.publish_timeout, self.publisher.publish(topic, payload))
            .await
            .map_err(|_| PublishError::Timeout(self.publish_timeout))??;
        Ok(())
    }

    async fn journal(&self, entry_id: &str, topic: &str, at: chrono::DateTime<Utc>) {
        if let Some(db) = &self.database {
            if let Err(e) = db.record_post(entry_id, topic, at).await {
                tracing::warn!(entry_id = %entry_id, error = %e, "Failed to journal published entry");
            }
        }
    }

    /// Loads the most recent journaled ids into the tracker. Returns how
    /// many were replayed.
    pub async fn replay_journal(&self) -> Result<usize, crate::storage::StorageError> {
        let Some(db) = &self.database else {
            return Ok(0);
        };
        let posts = db.recent_posts(self.tracker.capacity()).await?;
        for post in &posts {
            self.tracker.record(&post.entry_id, post.published_at);
        }
        Ok(posts.len())
    }
}

impl std::fmt::Debug for CallbackHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackHandler")
            .field("topics", &self.topics)
            .field("tracker", &self.tracker)
            .field("journal", &self.database.is_some())
            .field("publish_timeout", &self.publish_timeout)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
enum DeliverError {
    #[error(transparent)]
    Serialize(#[from] feed::SerializeError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedConfig;
    use crate::websub::signature::{sign, SignatureAlgorithm};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const TECH_TOPIC: &str = "https://medium.com/feed/tag/technology";

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
            let payload = String::from_utf8(payload).unwrap();
            self.sent.lock().unwrap().push((topic.to_string(), payload));
            Ok(())
        }
    }

    struct Stalled;

    #[async_trait]
    impl Publisher for Stalled {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.organization = "medium".to_string();
        config.project = "medium-firehose".to_string();
        config.feeds.push(FeedConfig {
            topic: TECH_TOPIC.to_string(),
            tag: Some("technology".to_string()),
            secret: None,
        });
        config
    }

    fn handler_with(config: Config, publisher: Arc<dyn Publisher>) -> CallbackHandler {
        CallbackHandler::new(
            Arc::new(config),
            Arc::new(DedupTracker::with_default_capacity()),
            publisher,
        )
    }

    fn entry_xml(id: &str) -> String {
        format!(
            r#"<entry xmlns="http://www.w3.org/2005/Atom"><id>{id}</id><title>Post {id}</title></entry>"#
        )
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_verify_known_topic_echoes_challenge() {
        let handler = handler_with(config(), Arc::new(Recorder::default()));
        let outcome = handler
            .verify(&params(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TECH_TOPIC),
                ("hub.challenge", "abc123"),
            ]))
            .await;
        assert_eq!(
            outcome,
            VerificationOutcome::Confirmed {
                challenge: "abc123".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_verify_unknown_topic() {
        let handler = handler_with(config(), Arc::new(Recorder::default()));
        let outcome = handler
            .verify(&params(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", "https://medium.com/feed/tag/cooking"),
                ("hub.challenge", "abc123"),
            ]))
            .await;
        assert!(matches!(outcome, VerificationOutcome::UnknownTopic { .. }));
    }

    #[tokio::test]
    async fn test_verify_any_topic_without_feed_list() {
        let handler = handler_with(Config::default(), Arc::new(Recorder::default()));
        let outcome = handler
            .verify(&params(&[
                ("hub.mode", "unsubscribe"),
                ("hub.topic", "https://example.com/feed"),
                ("hub.challenge", "c"),
            ]))
            .await;
        assert!(outcome.is_confirmed());
    }

    #[tokio::test]
    async fn test_verify_records_and_removes_lease() {
        let db = Database::open(":memory:").await.unwrap();
        let handler =
            handler_with(config(), Arc::new(Recorder::default())).with_database(db.clone());

        handler
            .verify(&params(&[
                ("hub.mode", "subscribe"),
                ("hub.topic", TECH_TOPIC),
                ("hub.challenge", "c"),
                ("hub.lease_seconds", "600"),
            ]))
            .await;
        let sub = db.get_subscription(TECH_TOPIC).await.unwrap().unwrap();
        assert!(sub.lease_expires.is_some());

        handler
            .verify(&params(&[
                ("hub.mode", "unsubscribe"),
                ("hub.topic", TECH_TOPIC),
                ("hub.challenge", "c"),
            ]))
            .await;
        assert!(db.get_subscription(TECH_TOPIC).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_denied_is_rejected() {
        let handler = handler_with(config(), Arc::new(Recorder::default()));
        let outcome = handler
            .verify(&params(&[
                ("hub.mode", "denied"),
                ("hub.topic", TECH_TOPIC),
                ("hub.reason", "blocked"),
            ]))
            .await;
        assert_eq!(
            outcome,
            VerificationOutcome::Denied {
                topic: TECH_TOPIC.to_string(),
                reason: Some("blocked".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_tag_from_self_link() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler_with(config(), recorder.clone());
        let body = entry_xml("urn:1");
        let link = format!(r#"<https://hub.example/>; rel="hub", <{TECH_TOPIC}>; rel="self""#);
        let links = [link.as_str()];

        let report = handler
            .handle_notification(&Notification {
                body: body.as_bytes(),
                link_headers: &links,
                ..Notification::default()
            })
            .await;

        assert_eq!(report.published, vec!["urn:1"]);
        let sent = recorder.sent.lock().unwrap();
        assert_eq!(sent[0].0, "medium/medium-firehose/technology");
        assert!(sent[0].1.contains("<id>urn:1</id>"));
    }

    #[tokio::test]
    async fn test_tag_from_hub_topic_header() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler_with(config(), recorder.clone());
        let body = entry_xml("urn:1");

        handler
            .handle_notification(&Notification {
                body: body.as_bytes(),
                hub_topic: Some(TECH_TOPIC),
                ..Notification::default()
            })
            .await;

        assert_eq!(
            recorder.sent.lock().unwrap()[0].0,
            "medium/medium-firehose/technology"
        );
    }

    #[tokio::test]
    async fn test_unknown_source_uses_base_topic() {
        let recorder = Arc::new(Recorder::default());
        let handler = handler_with(config(), recorder.clone());
        let body = entry_xml("urn:1");

        handler
            .handle_notification(&Notification {
                body: body.as_bytes(),
                hub_topic: Some("https://elsewhere.example/feed"),
                ..Notification::default()
            })
            .await;

        assert_eq!(recorder.sent.lock().unwrap()[0].0, "medium/medium-firehose");
    }

    #[tokio::test]
    async fn test_signature_required_when_secret_configured() {
        let mut config = config();
        config.feeds[0].secret = Some("s3cret".to_string());
        let recorder = Arc::new(Recorder::default());
        let handler = handler_with(config, recorder.clone());
        let body = entry_xml("urn:signed");

        let unsigned = Notification {
            body: body.as_bytes(),
            hub_topic: Some(TECH_TOPIC),
            ..Notification::default()
        };
        assert_eq!(handler.accept(&unsigned).unwrap_err(), SignatureError::Missing);
        assert!(handler.handle_notification(&unsigned).await.published.is_empty());

        let header = sign(SignatureAlgorithm::Sha1, b"s3cret", body.as_bytes());
        let signed = Notification {
            signature: Some(header.as_str()),
            ..unsigned
        };
        assert_eq!(
            handler.handle_notification(&signed).await.published,
            vec!["urn:signed"]
        );
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_publish_times_out_and_releases() {
        let mut config = config();
        config.mqtt.publish_timeout_ms = 50;
        let handler = handler_with(config, Arc::new(Stalled));
        let body = entry_xml("urn:stuck");

        let report = handler
            .handle_notification(&Notification {
                body: body.as_bytes(),
                ..Notification::default()
            })
            .await;

        assert_eq!(report.failed, vec!["urn:stuck"]);
        assert!(!handler.tracker().seen("urn:stuck"));
    }

    #[tokio::test]
    async fn test_publish_journaled_and_replayed() {
        let db = Database::open(":memory:").await.unwrap();
        let handler =
            handler_with(config(), Arc::new(Recorder::default())).with_database(db.clone());
        let body = entry_xml("urn:journaled");
        handler
            .handle_notification(&Notification {
                body: body.as_bytes(),
                ..Notification::default()
            })
            .await;
        assert!(db.post_exists("urn:journaled").await.unwrap());

        // A fresh process starts with an empty tracker
        let restarted =
            handler_with(config(), Arc::new(Recorder::default())).with_database(db.clone());
        assert!(!restarted.tracker().seen("urn:journaled"));
        assert_eq!(restarted.replay_journal().await.unwrap(), 1);
        assert!(restarted.tracker().seen("urn:journaled"));
    }
}
