//! CMS webhook signatures.
//!
//! The header has the form `t=<unix ms>,v1=<digest>` where the digest is the
//! unpadded URL-safe base64 of `HMAC-SHA256(secret, "<t>.<body>")`. A header
//! may carry several `v1` entries during secret rotation; any match accepts.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

pub const SIGNATURE_HEADER: &str = "sanity-webhook-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header is missing")]
    Missing,
    #[error("signature header is malformed")]
    Malformed,
    #[error("signature does not match the payload")]
    Mismatch,
    #[error("signature timestamp is outside the accepted window")]
    Expired,
}

/// Milliseconds since the Unix epoch.
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

/// Header value signing `body` at `timestamp_ms`.
pub fn sign(secret: &str, timestamp_ms: i64, body: &[u8]) -> String {
    let digest = URL_SAFE_NO_PAD.encode(digest(secret, timestamp_ms, body));
    format!("t={timestamp_ms},v1={digest}")
}

/// Check `header` against `body`, returning the signed timestamp.
///
/// `max_skew` bounds the distance between the signed timestamp and `now` in
/// either direction; `None` disables the check.
pub fn verify(
    header: Option<&str>,
    body: &[u8],
    secret: &str,
    max_skew: Option<Duration>,
    now: OffsetDateTime,
) -> Result<i64, SignatureError> {
    let header = header.map(str::trim).filter(|h| !h.is_empty()).ok_or(SignatureError::Missing)?;
    let parsed = ParsedHeader::parse(header)?;

    if let Some(max_skew) = max_skew {
        let skew = u128::from(unix_millis(now).abs_diff(parsed.timestamp));
        if skew > max_skew.whole_milliseconds().unsigned_abs() {
            return Err(SignatureError::Expired);
        }
    }

    let expected = digest(secret, parsed.timestamp, body);
    let matched = parsed
        .digests
        .iter()
        .any(|candidate| bool::from(candidate.as_slice().ct_eq(expected.as_slice())));
    if matched {
        Ok(parsed.timestamp)
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn digest(secret: &str, timestamp_ms: i64, body: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(timestamp_ms.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

struct ParsedHeader {
    timestamp: i64,
    digests: Vec<Vec<u8>>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self, SignatureError> {
        let mut timestamp = None;
        let mut digests = Vec::new();

        for part in header.split(',') {
            let (name, value) = part.trim().split_once('=').ok_or(SignatureError::Malformed)?;
            match name.trim() {
                "t" => {
                    let parsed = value.trim().parse::<i64>().map_err(|_| SignatureError::Malformed)?;
                    timestamp = Some(parsed);
                }
                "v1" => {
                    let decoded = URL_SAFE_NO_PAD
                        .decode(value.trim().trim_end_matches('='))
                        .map_err(|_| SignatureError::Malformed)?;
                    digests.push(decoded);
                }
                _ => {}
            }
        }

        match (timestamp, digests.is_empty()) {
            (Some(timestamp), false) => Ok(Self { timestamp, digests }),
            _ => Err(SignatureError::Malformed),
        }
    }
}
