//! Hub-initiated intent verification (`GET` on the callback).
use std::collections::HashMap;
use thiserror::Error;

/// `hub.mode` of a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubMode {
    Subscribe,
    Unsubscribe,
    /// The hub refused the subscription; carries no challenge.
    Denied,
}

impl HubMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "subscribe" => Some(Self::Subscribe),
            "unsubscribe" => Some(Self::Unsubscribe),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Denied => "denied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("Unsupported hub.mode: {0}")]
    UnknownMode(String),
}

/// A parsed verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub mode: HubMode,
    pub topic: String,
    /// Always present for subscribe and unsubscribe.
    pub challenge: Option<String>,
    pub lease_seconds: Option<u64>,
    /// Only sent with `denied`.
    pub reason: Option<String>,
}

impl VerificationRequest {
    /// Builds a request from decoded query parameters (`hub.mode`,
    /// `hub.topic`, `hub.challenge`, `hub.lease_seconds`, `hub.reason`).
    ///
    /// An unparsable `hub.lease_seconds` is treated as absent.
    pub fn from_query(params: &HashMap<String, String>) -> Result<Self, VerificationError> {
        let get = |key: &str| params.get(key).map(String::as_str);

        let mode_value = get("hub.mode").ok_or(VerificationError::MissingParameter("hub.mode"))?;
        let mode = HubMode::parse(mode_value)
            .ok_or_else(|| VerificationError::UnknownMode(mode_value.to_string()))?;

        let topic = get("hub.topic")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(VerificationError::MissingParameter("hub.topic"))?
            .to_string();

        // The challenge is echoed verbatim, so it is not trimmed
        let challenge = get("hub.challenge")
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if mode != HubMode::Denied && challenge.is_none() {
            return Err(VerificationError::MissingParameter("hub.challenge"));
        }

        let lease_seconds = get("hub.lease_seconds").and_then(|raw| {
            let parsed = raw.trim().parse::<u64>().ok();
            if parsed.is_none() {
                tracing::warn!(value = %raw, "Ignoring unparsable hub.lease_seconds");
            }
            parsed
        });

        Ok(Self {
            mode,
            topic,
            challenge,
            lease_seconds,
            reason: get("hub.reason").map(str::to_string),
        })
    }
}

/// What the callback answers to a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Echo `challenge` with 200.
    Confirmed { challenge: String },
    /// The topic is not one we subscribe to (404).
    UnknownTopic { topic: String },
    /// The hub denied the subscription (403).
    Denied {
        topic: String,
        reason: Option<String>,
    },
    /// The request itself is unusable (403).
    Rejected(VerificationError),
}

impl VerificationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}
