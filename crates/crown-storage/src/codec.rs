//! JWT shape and claim inspection.
//!
//! Only structure and expiry are checked here. Signature verification is the
//! backend's job; the client just needs to know whether a token is worth
//! sending at all.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

/// Why a token was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Not three non-empty segments, or the payload is not a base64 JSON object
    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    /// Decodes fine but `exp` is missing or not in the future
    #[error("Token expired")]
    Expired,
}

/// Decoded token payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Claims {
    /// Expiry, epoch seconds
    pub exp: Option<i64>,
    /// Subject
    pub sub: Option<String>,
    /// Issued-at, epoch seconds
    pub iat: Option<i64>,
}

/// Stateless JWT decoder.
pub struct TokenCodec;

impl TokenCodec {
    /// Decode the payload of a three-segment token.
    ///
    /// Never panics; every structural, encoding, or parse failure maps to
    /// [`TokenError::Malformed`].
    pub fn decode(token: &str) -> Result<Claims, TokenError> {
        let segments: Vec<&str> = token.split('.').collect();
        if segments.len() != 3 {
            return Err(TokenError::Malformed("expected three segments"));
        }
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(TokenError::Malformed("empty segment"));
        }

        let payload = segments[1].trim_end_matches('=');
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| STANDARD_NO_PAD.decode(payload))
            .map_err(|_| TokenError::Malformed("payload is not base64"))?;

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|_| TokenError::Malformed("payload is not JSON"))?;
        let object = value
            .as_object()
            .ok_or(TokenError::Malformed("payload is not a JSON object"))?;

        Ok(Claims {
            exp: object.get("exp").and_then(epoch_seconds),
            sub: object.get("sub").and_then(Value::as_str).map(String::from),
            iat: object.get("iat").and_then(epoch_seconds),
        })
    }

    /// Whether the claims are expired right now. Missing `exp` counts as expired.
    pub fn is_expired(claims: &Claims) -> bool {
        Self::is_expired_at(claims, chrono::Utc::now().timestamp())
    }

    /// Whether the claims are expired at `now` (epoch seconds).
    pub fn is_expired_at(claims: &Claims, now: i64) -> bool {
        match claims.exp {
            Some(exp) => exp <= now,
            None => true,
        }
    }

    /// Decode and check expiry in one step.
    pub fn validate(token: &str) -> Result<Claims, TokenError> {
        let claims = Self::decode(token)?;
        if Self::is_expired(&claims) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.floor() as i64))
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    /// Build an unsigned token around an arbitrary JSON payload.
    pub fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload);
        format!("{}.{}.signature", header, body)
    }

    /// Token whose `exp` is `offset_secs` from now.
    pub fn token_expiring_in(offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + offset_secs;
        token_with_payload(&format!(r#"{{"sub":"user-1","exp":{}}}"#, exp))
    }
}
