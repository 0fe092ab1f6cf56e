//! `X-Hub-Signature` verification for authenticated content distribution.
//!
//! Hubs sign each notification body with the subscription secret and send
//! `X-Hub-Signature: <algorithm>=<hex digest>`. Digests are compared in
//! constant time via [`Mac::verify_slice`].
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl SignatureAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

/// Why a notification's signature was not accepted.
///
/// The secret never appears in these messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("Missing X-Hub-Signature header")]
    Missing,

    #[error("Malformed X-Hub-Signature header: expected <algorithm>=<hex>")]
    Malformed,

    #[error("Unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Signature does not match body")]
    Mismatch,
}

/// Checks `header` against the HMAC of `body` under `secret`.
///
/// Returns the algorithm the hub used when the signature is valid.
pub fn verify_signature(
    secret: &[u8],
    body: &[u8],
    header: Option<&str>,
) -> Result<SignatureAlgorithm, SignatureError> {
    let header = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(SignatureError::Missing)?;
    let (name, digest) = header.split_once('=').ok_or(SignatureError::Malformed)?;
    let algorithm = SignatureAlgorithm::from_name(name)
        .ok_or_else(|| SignatureError::UnsupportedAlgorithm(name.trim().to_string()))?;
    let expected = hex::decode(digest.trim()).map_err(|_| SignatureError::Malformed)?;

    let verified = match algorithm {
        SignatureAlgorithm::Sha1 => verify_with::<Hmac<Sha1>>(secret, body, &expected),
        SignatureAlgorithm::Sha256 => verify_with::<Hmac<Sha256>>(secret, body, &expected),
        SignatureAlgorithm::Sha384 => verify_with::<Hmac<Sha384>>(secret, body, &expected),
        SignatureAlgorithm::Sha512 => verify_with::<Hmac<Sha512>>(secret, body, &expected),
    };

    if verified {
        Ok(algorithm)
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Header value a hub would send for `body`, e.g. `sha256=9f86…`.
pub fn sign(algorithm: SignatureAlgorithm, secret: &[u8], body: &[u8]) -> String {
    let digest = match algorithm {
        SignatureAlgorithm::Sha1 => digest_with::<Hmac<Sha1>>(secret, body),
        SignatureAlgorithm::Sha256 => digest_with::<Hmac<Sha256>>(secret, body),
        SignatureAlgorithm::Sha384 => digest_with::<Hmac<Sha384>>(secret, body),
        SignatureAlgorithm::Sha512 => digest_with::<Hmac<Sha512>>(secret, body),
    };
    format!("{}={}", algorithm.as_str(), hex::encode(digest))
}

fn verify_with<M: Mac + KeyInit>(secret: &[u8], body: &[u8], expected: &[u8]) -> bool {
    // HMAC accepts keys of any length
    let Ok(mut mac) = <M as KeyInit>::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(expected).is_ok()
}

fn digest_with<M: Mac + KeyInit>(secret: &[u8], body: &[u8]) -> Vec<u8> {
    match <M as KeyInit>::new_from_slice(secret) {
        Ok(mut mac) => {
            mac.update(body);
            mac.finalize().into_bytes().to_vec()
        }
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = b"Hello, World!";

    #[test]
    fn test_known_sha256_vector() {
        // Published example for X-Hub-Signature-256 webhooks
        assert_eq!(
            sign(SignatureAlgorithm::Sha256, SECRET, BODY),
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_every_algorithm_round_trips() {
        for algorithm in [
            SignatureAlgorithm::Sha1,
            SignatureAlgorithm::Sha256,
            SignatureAlgorithm::Sha384,
            SignatureAlgorithm::Sha512,
        ] {
            let header = sign(algorithm, SECRET, BODY);
            assert_eq!(verify_signature(SECRET, BODY, Some(&header)), Ok(algorithm));
        }
    }

    #[test]
    fn test_algorithm_name_case_insensitive() {
        let header = sign(SignatureAlgorithm::Sha1, SECRET, BODY).replacen("sha1", "SHA1", 1);
        assert_eq!(
            verify_signature(SECRET, BODY, Some(&header)),
            Ok(SignatureAlgorithm::Sha1)
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let header = sign(SignatureAlgorithm::Sha256, SECRET, BODY);
        assert_eq!(
            verify_signature(SECRET, b"Hello, World?", Some(&header)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign(SignatureAlgorithm::Sha1, b"other", BODY);
        assert_eq!(
            verify_signature(SECRET, BODY, Some(&header)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_header_problems() {
        assert_eq!(verify_signature(SECRET, BODY, None), Err(SignatureError::Missing));
        assert_eq!(
            verify_signature(SECRET, BODY, Some("  ")),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_signature(SECRET, BODY, Some("deadbeef")),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, BODY, Some("sha256=not-hex")),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(SECRET, BODY, Some("md5=abcd")),
            Err(SignatureError::UnsupportedAlgorithm("md5".to_string()))
        );
    }

    #[test]
    fn test_truncated_digest_rejected() {
        let header = sign(SignatureAlgorithm::Sha256, SECRET, BODY);
        let truncated = &header[..header.len() - 2];
        assert_eq!(
            verify_signature(SECRET, BODY, Some(truncated)),
            Err(SignatureError::Mismatch)
        );
    }
}
