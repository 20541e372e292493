//! Identity claims carried in the bearer token payload.
//!
//! The token is a JWT: `header.payload.signature`, each segment base64url
//! encoded. Only the payload is read and the signature is never checked, so
//! nothing here may be used to make an authorization decision.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Number of dot-separated segments in a well-formed token
const TOKEN_SEGMENTS: usize = 3;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("Token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Token payload is not a JSON object")]
    NotAnObject,
}

/// Who the token says the user is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub subject: Option<String>,
    pub issued_at: Option<i64>,
    pub expires: Option<i64>,
}

impl Identity {
    /// Best label for the header line: name, then email, then subject
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.subject.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
    }

    /// Tokens without an `exp` claim never count as expired
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|exp| exp <= now).unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Minutes left before `exp`, clamped at zero (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at()
            .map(|exp| (exp - Utc::now()).num_minutes().max(0))
    }

    fn from_claims(claims: &Map<String, Value>) -> Self {
        Self {
            email: claim_string(claims, "email"),
            name: claim_string(claims, "name").or_else(|| claim_string(claims, "username")),
            role: claim_string(claims, "role"),
            subject: claim_string(claims, "sub"),
            issued_at: claim_seconds(claims, "iat"),
            expires: claim_seconds(claims, "exp"),
        }
    }
}

/// Decode the identity claims from a token without verifying it.
pub fn decode_identity(token: &str) -> Result<Identity, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != TOKEN_SEGMENTS {
        return Err(DecodeError::SegmentCount(segments.len()));
    }

    // Some issuers pad the payload even though JWTs should not be
    let payload = segments[1].trim_end_matches('=');
    let bytes = base64::decode_config(payload, base64::URL_SAFE_NO_PAD)?;

    match serde_json::from_slice::<Value>(&bytes)? {
        Value::Object(claims) => Ok(Identity::from_claims(&claims)),
        _ => Err(DecodeError::NotAnObject),
    }
}

// Backends disagree on whether ids are strings or numbers
fn claim_string(claims: &Map<String, Value>, key: &str) -> Option<String> {
    match claims.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn claim_seconds(claims: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = claims.get(key)?;
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
pub(crate) fn make_token(payload: &str) -> String {
    format!(
        "eyJhbGciOiJIUzI1NiJ9.{}.sig",
        base64::encode_config(payload, base64::URL_SAFE_NO_PAD)
    )
}
