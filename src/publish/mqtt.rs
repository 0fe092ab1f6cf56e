use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;

use super::{PublishError, Publisher};
use crate::config::MqttConfig;

/// Capacity of the request channel between publishers and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 1024;

/// Reconnect backoff bounds for the event loop.
const MIN_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// MQTT publisher backed by a `rumqttc` async client.
///
/// A background task owns the [`EventLoop`] and keeps the connection alive,
/// reconnecting with exponential backoff. Publishes use QoS 1 without the
/// retain flag. While the broker connection is down every publish fails
/// immediately with [`PublishError::Unavailable`]. A publish resolves once
/// the request is queued for the event loop; callers bound that wait.
///
/// The event loop task is aborted when the publisher is dropped.
pub struct MqttPublisher {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    /// Creates the client and spawns its event loop. Must be called from
    /// within a Tokio runtime.
    ///
    /// The connection is established in the background; this never blocks
    /// on the broker.
    pub fn connect(config: &MqttConfig) -> Self {
        let options = Self::options(config);
        let (client, event_loop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        tracing::info!(
            host = %config.host,
            port = config.port,
            client_id = %config.client_id,
            tls = config.tls,
            "Connecting to MQTT broker"
        );

        let handle = tokio::spawn(drive_event_loop(event_loop, Arc::clone(&connected)));

        Self {
            client,
            connected,
            event_loop: handle,
        }
    }

    /// Client options derived from the configuration.
    pub fn options(config: &MqttConfig) -> MqttOptions {
        let mut options =
            MqttOptions::new(config.client_id.trim(), config.host.trim(), config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));

        if let Some(credentials) = Credentials::from_config(config) {
            options.set_credentials(
                credentials.username,
                credentials.password.expose_secret().to_string(),
            );
        }

        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        options
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Sends a DISCONNECT to the broker. Pending QoS 1 publishes may be lost.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::debug!(error = %e, "MQTT disconnect request failed");
        }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

impl std::fmt::Debug for MqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPublisher")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::Unavailable(
                "not connected to MQTT broker".to_string(),
            ));
        }

        let bytes = payload.len();
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(map_client_error)?;
        tracing::debug!(topic = %topic, bytes, "Queued MQTT publish");
        Ok(())
    }
}

fn map_client_error(err: ClientError) -> PublishError {
    PublishError::Client(err.to_string())
}

/// Polls the event loop forever, tracking connection state.
async fn drive_event_loop(mut event_loop: EventLoop, connected: Arc<AtomicBool>) {
    let mut backoff = MIN_BACKOFF;
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                connected.store(true, Ordering::Release);
                backoff = MIN_BACKOFF;
                tracing::info!(code = ?ack.code, "Connected to MQTT broker");
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Release);
                tracing::warn!("Broker closed the MQTT connection");
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::AcqRel) {
                    tracing::warn!(error = %e, "Disconnected from MQTT broker");
                } else {
                    tracing::warn!(error = %e, retry_in = ?backoff, "MQTT connection failed");
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

/// Username and password, with the password kept out of logs.
struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Both halves must be present; a username alone is ignored with a warning.
    fn from_config(config: &MqttConfig) -> Option<Self> {
        match (&config.username, &config.password) {
            (Some(username), Some(password)) => Some(Self {
                username: username.clone(),
                password: SecretString::from(password.clone()),
            }),
            (Some(_), None) => {
                tracing::warn!("MQTT username set without a password, connecting anonymously");
                None
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttConfig {
        MqttConfig {
            host: "broker.test".to_string(),
            port: 1884,
            client_id: "bridge-test".to_string(),
            keep_alive_secs: 42,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn test_options_from_config() {
        let options = MqttPublisher::options(&config());
        assert_eq!(
            options.broker_address(),
            ("broker.test".to_string(), 1884)
        );
        assert_eq!(options.client_id(), "bridge-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(42));
        assert!(options.credentials().is_none());
    }

    #[test]
    fn test_credentials_require_both_halves() {
        let mut with_both = config();
        with_both.username = Some("user".to_string());
        with_both.password = Some("pass".to_string());
        assert_eq!(
            MqttPublisher::options(&with_both).credentials(),
            Some(("user".to_string(), "pass".to_string()))
        );

        let mut user_only = config();
        user_only.username = Some("user".to_string());
        assert!(MqttPublisher::options(&user_only).credentials().is_none());
    }

    #[tokio::test]
    async fn test_publish_fails_fast_when_disconnected() {
        let mut config = config();
        // Nothing listens here; the event loop keeps failing in the background
        config.host = "127.0.0.1".to_string();
        config.port = 1;
        let publisher = MqttPublisher::connect(&config);

        let err = publisher
            .publish("org/proj", b"<entry/>".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Unavailable(_)));
        assert!(!publisher.is_connected());
    }
}
