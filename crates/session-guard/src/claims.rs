//! Access token claim decoding.
//!
//! Only the payload segment is read; signatures are the server's business.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Claims this client relies on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Subject identifier.
    #[serde(default, alias = "id", alias = "userId")]
    pub sub: Option<String>,
}

impl TokenClaims {
    /// Expiry as a timestamp, if representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// Why a token could not be decoded.
#[derive(Error, Debug)]
pub enum ClaimsError {
    #[error("token must have three dot-separated segments, found {0}")]
    Segments(usize),

    #[error("payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a claims object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode the payload segment of a JWT.
pub fn decode_claims(token: &str) -> Result<TokenClaims, ClaimsError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(ClaimsError::Segments(segments.len()));
    }

    let payload = URL_SAFE_NO_PAD.decode(segments[1].trim_end_matches('='))?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Whether `token` should be treated as expired at `now`.
///
/// Undecodable tokens count as expired. A token expiring within `buffer` of
/// `now` counts as expired.
pub fn is_expired_at(token: &str, now: DateTime<Utc>, buffer: Duration) -> bool {
    match decode_claims(token) {
        Ok(claims) => match claims.expires_at() {
            Some(expires_at) => expires_at
                .checked_sub_signed(buffer)
                .map(|deadline| deadline <= now)
                .unwrap_or(true),
            None => true,
        },
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable access token as expired");
            true
        }
    }
}

#[cfg(test)]
pub(crate) fn mint_token(exp: i64, sub: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload =
        URL_SAFE_NO_PAD.encode(serde_json::json!({ "exp": exp, "sub": sub }).to_string());
    format!("{}.{}.signature", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer() -> Duration {
        Duration::seconds(60)
    }

    #[test]
    fn test_decode_claims() {
        let token = mint_token(1_700_000_000, "user-1");
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, 1_700_000_000);
        assert_eq!(claims.sub.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_decode_accepts_padded_payload() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":12}"#);
        let token = format!("{}.{}.sig", header, payload);
        assert_eq!(decode_claims(&token).unwrap().exp, 12);
    }

    #[test]
    fn test_identifier_aliases() {
        let header = URL_SAFE_NO_PAD.encode(b"{}");
        let payload = URL_SAFE_NO_PAD.encode(br#"{"exp":1,"userId":"u-9"}"#);
        let claims = decode_claims(&format!("{}.{}.sig", header, payload)).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u-9"));
    }

    #[test]
    fn test_wrong_segment_count() {
        assert!(matches!(
            decode_claims("only.two"),
            Err(ClaimsError::Segments(2))
        ));
    }

    #[test]
    fn test_expiring_within_buffer_is_expired() {
        let now = Utc::now();
        let token = mint_token((now + Duration::seconds(30)).timestamp(), "u");
        assert!(is_expired_at(&token, now, buffer()));
    }

    #[test]
    fn test_expiring_beyond_buffer_is_valid() {
        let now = Utc::now();
        let token = mint_token((now + Duration::seconds(120)).timestamp(), "u");
        assert!(!is_expired_at(&token, now, buffer()));
    }

    #[test]
    fn test_already_expired() {
        let now = Utc::now();
        let token = mint_token((now - Duration::seconds(5)).timestamp(), "u");
        assert!(is_expired_at(&token, now, buffer()));
    }

    #[test]
    fn test_malformed_tokens_are_expired() {
        let now = Utc::now();
        assert!(is_expired_at("garbage", now, buffer()));
        assert!(is_expired_at("a.!!!.c", now, buffer()));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode(b"not json"));
        assert!(is_expired_at(&not_json, now, buffer()));
        let no_exp = format!("a.{}.c", URL_SAFE_NO_PAD.encode(br#"{"sub":"x"}"#));
        assert!(is_expired_at(&no_exp, now, buffer()));
    }
}
