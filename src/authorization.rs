//! Authorization payloads delivered by the provider.
//!
//! After the crypto layer has decrypted (v1) or verified (v2) an inbound
//! payload, the bytes decode here into the domain value shown to the
//! user. Decoding is strict about presence: a payload missing any
//! required field yields `None`, which callers treat as "malformed, drop
//! and do not display". That outcome is validation, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One authorization awaiting user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationData {
    pub id: String,
    pub connection_id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// One-time code echoed back (v1 plain, v2 envelope-wrapped) when the
    /// user confirms.
    pub authorization_code: String,
}

/// Time-driven lifecycle as this core sees it.
///
/// `Confirmed` and `Denied` are transitions the calling workflow owns
/// after a successful request; only expiry is decidable from the payload
/// alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Pending,
    Expired,
}

/// Loose mirror of the wire payload; presence is checked in one place
/// instead of through serde errors.
#[derive(Deserialize)]
struct RawAuthorization {
    id: Option<String>,
    connection_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    created_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    authorization_code: Option<String>,
}

impl AuthorizationData {
    /// Decode a payload, requiring every field.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        Self::parse_raw(payload, None)
    }

    /// Decode a payload whose connection id is supplied by the caller.
    ///
    /// Some provider feeds omit `connection_id` when the route already
    /// names the connection; the supplied id then takes precedence.
    pub fn parse_for_connection(payload: &[u8], connection_id: &str) -> Option<Self> {
        Self::parse_raw(payload, Some(connection_id))
    }

    fn parse_raw(payload: &[u8], connection_id: Option<&str>) -> Option<Self> {
        let raw: RawAuthorization = serde_json::from_slice(payload).ok()?;
        Some(Self {
            id: raw.id?,
            connection_id: connection_id.map(str::to_string).or(raw.connection_id)?,
            title: raw.title?,
            description: raw.description?,
            created_at: raw.created_at?,
            expires_at: raw.expires_at?,
            authorization_code: raw.authorization_code?,
        })
    }

    /// Whether the authorization is still actionable at `now`.
    pub fn status(&self, now: DateTime<Utc>) -> AuthorizationStatus {
        if now < self.expires_at {
            AuthorizationStatus::Pending
        } else {
            AuthorizationStatus::Expired
        }
    }
}
