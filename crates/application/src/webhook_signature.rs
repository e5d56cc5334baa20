//! Timestamped HMAC-SHA256 signatures shared by outbound deliveries and
//! inbound provider callbacks.
//!
//! Header format: `t=<unix_seconds>,v1=<hex>[,v1=<hex>...]`. The MAC covers
//! `"{t}.{payload}"`, so the timestamp cannot be swapped without the key.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Default replay window for inbound callbacks.
pub const DEFAULT_SIGNATURE_TOLERANCE_SECONDS: u64 = 300;

/// Signature verification failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Header has no `t=` element.
    #[error("signature header is missing a timestamp")]
    MissingTimestamp,
    /// `t=` is not a unix timestamp.
    #[error("signature timestamp is not numeric")]
    InvalidTimestamp,
    /// Timestamp lies outside the replay window.
    #[error("signature timestamp is {age_seconds}s away from now, tolerance is {tolerance_seconds}s")]
    OutsideTolerance {
        /// Absolute distance from now.
        age_seconds: u64,
        /// Configured window.
        tolerance_seconds: u64,
    },
    /// Header has no `v1=` element.
    #[error("signature header has no v1 signature")]
    MissingSignature,
    /// No supplied signature matched.
    #[error("signature does not match payload")]
    Mismatch,
    /// Key material rejected by the MAC.
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// Computes the hex MAC over `"{timestamp}.{payload}"`.
pub fn compute_signature(
    secret: &str,
    timestamp: i64,
    payload: &str,
) -> Result<String, SignatureError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|error| SignatureError::InvalidKey(error.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Builds a signature header for `payload` at `timestamp`.
pub fn sign(payload: &str, secret: &str, timestamp: i64) -> Result<String, SignatureError> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={timestamp},v1={signature}"))
}

/// Verifies a signature header against `now`.
pub fn verify_at(
    payload: &str,
    header: &str,
    secret: &str,
    tolerance_seconds: u64,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let parsed = ParsedHeader::parse(header)?;

    let age_seconds = now.timestamp().abs_diff(parsed.timestamp);
    if age_seconds > tolerance_seconds {
        return Err(SignatureError::OutsideTolerance {
            age_seconds,
            tolerance_seconds,
        });
    }

    let expected = compute_signature(secret, parsed.timestamp, payload)?;
    let mut matched = false;
    for candidate in &parsed.signatures {
        // No early exit, every candidate is compared.
        matched |= constant_time_eq(expected.as_bytes(), candidate.as_bytes());
    }

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Returns whether the header is a fresh, valid signature of `payload`.
#[must_use]
pub fn verify(payload: &str, header: &str, secret: &str, tolerance_seconds: u64) -> bool {
    verify_at(payload, header, secret, tolerance_seconds, Utc::now()).is_ok()
}

/// Byte comparison whose duration depends only on the input lengths.
#[must_use]
pub fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right.iter())
        .fold(0u8, |acc, (left, right)| acc | (left ^ right))
        == 0
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<String>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for element in header.split(',') {
            let Some((key, value)) = element.trim().split_once('=') else {
                continue;
            };

            match key.trim() {
                "t" => {
                    let value = value.trim();
                    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
                        return Err(SignatureError::InvalidTimestamp);
                    }

                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| SignatureError::InvalidTimestamp)?,
                    );
                }
                "v1" => signatures.push(value.trim().to_ascii_lowercase()),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
        if signatures.is_empty() {
            return Err(SignatureError::MissingSignature);
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

/// Verifier for provider callbacks signed with any of several active secrets.
#[derive(Clone)]
pub struct InboundSignatureVerifier {
    secrets: Vec<String>,
    tolerance_seconds: u64,
}

impl std::fmt::Debug for InboundSignatureVerifier {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("InboundSignatureVerifier")
            .field("secrets", &self.secrets.len())
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish()
    }
}

impl InboundSignatureVerifier {
    /// Creates a verifier. Blank secrets are ignored.
    #[must_use]
    pub fn new(secrets: Vec<String>, tolerance_seconds: u64) -> Self {
        Self {
            secrets: secrets
                .into_iter()
                .map(|secret| secret.trim().to_owned())
                .filter(|secret| !secret.is_empty())
                .collect(),
            tolerance_seconds,
        }
    }

    /// Returns whether at least one secret is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.secrets.is_empty()
    }

    /// Accepts the payload when any configured secret verifies it.
    ///
    /// Every secret is checked, so timing does not reveal which one matched.
    pub fn verify(&self, payload: &str, header: &str) -> Result<(), SignatureError> {
        let outcomes = self.outcomes_at(payload, header, Utc::now());
        let matched = outcomes
            .iter()
            .fold(false, |matched, outcome| matched | outcome.is_ok());
        if matched {
            return Ok(());
        }

        Err(outcomes
            .into_iter()
            .filter_map(Result::err)
            .rev()
            .find(|error| *error != SignatureError::Mismatch)
            .unwrap_or(SignatureError::Mismatch))
    }

    fn outcomes_at(
        &self,
        payload: &str,
        header: &str,
        now: DateTime<Utc>,
    ) -> Vec<Result<(), SignatureError>> {
        self.secrets
            .iter()
            .map(|secret| verify_at(payload, header, secret, self.tolerance_seconds, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    use super::{
        InboundSignatureVerifier, SignatureError, compute_signature, constant_time_eq, sign,
        verify, verify_at,
    };

    const SECRET: &str = "whsec_0123456789abcdef";

    #[test]
    fn signature_is_hex_and_bound_to_timestamp() {
        let signature = compute_signature("key", 1_700_000_000, "{}");
        assert!(signature.is_ok());
        let signature = signature.unwrap_or_default();

        assert_eq!(signature.len(), 64);
        assert!(signature.bytes().all(|byte| byte.is_ascii_hexdigit()));
        assert_eq!(
            compute_signature("key", 1_700_000_000, "{}").unwrap_or_default(),
            signature
        );
        assert_ne!(
            compute_signature("key", 1_700_000_001, "{}").unwrap_or_default(),
            signature
        );
    }

    #[test]
    fn stale_signature_is_rejected() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        let signed_at = now - Duration::seconds(301);
        let header = sign("{\"amount\":100}", SECRET, signed_at.timestamp()).unwrap_or_default();

        let result = verify_at("{\"amount\":100}", &header, SECRET, 300, now);

        assert_eq!(
            result,
            Err(SignatureError::OutsideTolerance {
                age_seconds: 301,
                tolerance_seconds: 300,
            })
        );
    }

    #[test]
    fn signature_at_tolerance_edge_is_accepted() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default();
        let header = sign("{}", SECRET, now.timestamp() - 300).unwrap_or_default();

        assert_eq!(verify_at("{}", &header, SECRET, 300, now), Ok(()));
    }

    #[test]
    fn any_matching_v1_signature_is_accepted() {
        let now = Utc::now();
        let valid = compute_signature(SECRET, now.timestamp(), "payload").unwrap_or_default();
        let header = format!("t={},v1={},v1={valid}", now.timestamp(), "00".repeat(32));

        assert_eq!(verify_at("payload", &header, SECRET, 300, now), Ok(()));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let now = Utc::now();

        assert_eq!(
            verify_at("{}", "v1=abcd", SECRET, 300, now),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_at("{}", "t=soon,v1=abcd", SECRET, 300, now),
            Err(SignatureError::InvalidTimestamp)
        );
        assert_eq!(
            verify_at("{}", &format!("t={}", now.timestamp()), SECRET, 300, now),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verify_at("{}", &format!("t={},v1=short", now.timestamp()), SECRET, 300, now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn constant_time_eq_requires_equal_length() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn inbound_verifier_accepts_any_configured_secret() {
        let verifier = InboundSignatureVerifier::new(
            vec!["old_secret_value_1234".to_owned(), SECRET.to_owned(), " ".to_owned()],
            300,
        );
        let header = sign("{\"id\":1}", SECRET, Utc::now().timestamp()).unwrap_or_default();

        assert!(verifier.is_configured());
        assert_eq!(verifier.verify("{\"id\":1}", &header), Ok(()));
        assert_eq!(
            verifier.verify("{\"id\":2}", &header),
            Err(SignatureError::Mismatch)
        );
        assert!(!InboundSignatureVerifier::new(Vec::new(), 300).is_configured());
    }

    #[test]
    fn inbound_verifier_checks_every_secret_after_a_match() {
        let verifier = InboundSignatureVerifier::new(
            vec![
                SECRET.to_owned(),
                "old_secret_value_1234".to_owned(),
                "older_secret_value_5678".to_owned(),
            ],
            300,
        );
        let now = Utc::now();
        let header = sign("{\"id\":3}", SECRET, now.timestamp()).unwrap_or_default();

        let outcomes = verifier.outcomes_at("{\"id\":3}", &header, now);
        assert_eq!(
            outcomes,
            vec![
                Ok(()),
                Err(SignatureError::Mismatch),
                Err(SignatureError::Mismatch)
            ]
        );
        assert_eq!(verifier.verify("{\"id\":3}", &header), Ok(()));

        let stale = sign("{\"id\":3}", SECRET, now.timestamp() - 3_600).unwrap_or_default();
        assert!(matches!(
            verifier.verify("{\"id\":3}", &stale),
            Err(SignatureError::OutsideTolerance { .. })
        ));
    }

    proptest! {
        #[test]
        fn signed_payloads_round_trip(payload in ".{0,256}", secret in "[ -~]{1,64}") {
            let header = sign(&payload, &secret, Utc::now().timestamp());
            prop_assert!(header.is_ok());
            let header = header.unwrap_or_default();
            prop_assert!(verify(&payload, &header, &secret, 300));
        }

        #[test]
        fn tampered_payload_or_signature_is_rejected(
            payload in "[ -~]{1,128}",
            index in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let now = Utc::now();
            let header = sign(&payload, SECRET, now.timestamp()).unwrap_or_default();

            let mut payload_bytes = payload.clone().into_bytes();
            let position = index.index(payload_bytes.len());
            payload_bytes[position] ^= flip & 0x3f;
            if payload_bytes[position] == payload.as_bytes()[position] {
                payload_bytes[position] ^= 0x01;
            }
            let tampered_payload = String::from_utf8_lossy(&payload_bytes).into_owned();
            prop_assert!(!verify(&tampered_payload, &header, SECRET, 300));

            let signature_start = header.find("v1=").unwrap_or_default() + 3;
            let mut header_bytes = header.clone().into_bytes();
            let position = signature_start + index.index(64);
            header_bytes[position] = if header_bytes[position] == b'0' { b'1' } else { b'0' };
            let tampered_header = String::from_utf8_lossy(&header_bytes).into_owned();
            prop_assert!(!verify(&payload, &tampered_header, SECRET, 300));
        }
    }
}
