//! WebSub subscriber side: the callback protocol.
//!
//! One callback URL serves two request kinds:
//!
//! - **Verification** (`GET`): the hub confirms a subscribe/unsubscribe
//!   intent; we echo `hub.challenge` for topics we expect
//! - **Content notification** (`POST`): the hub pushes an Atom payload,
//!   which is authenticated, parsed, deduplicated and published
//!
//! Notifications are acknowledged as soon as parsing completes, whatever
//! happens to individual entries afterwards. Refusing a payload would only
//! make the hub redeliver it.
//!
//! # Architecture
//!
//! - [`verification`] - `hub.*` query parameters and outcomes
//! - [`link`] - `Link` header parsing for the originating topic
//! - [`signature`] - `X-Hub-Signature` HMAC checks
//! - [`handler`] - [`CallbackHandler`], tying parser, tracker and publisher together

pub mod handler;
pub mod link;
pub mod signature;
pub mod verification;

pub use handler::{CallbackHandler, Delivery, DeliveryReport, Notification};
pub use signature::{SignatureAlgorithm, SignatureError};
pub use verification::{HubMode, VerificationError, VerificationOutcome, VerificationRequest};
