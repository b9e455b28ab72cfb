//! Request descriptors handed to the transport layer.
//!
//! This core never performs HTTP itself. Outbound operations produce a
//! [`RequestDescriptor`] that the host app's transport sends verbatim;
//! the header constants here are the names the provider expects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header carrying the v1 request signature, or the full signed token for
/// body-less v2 requests.
pub const SIGNATURE_HEADER: &str = "Signature";
/// Header carrying the unix-seconds expiry of a v1 signed request.
pub const EXPIRES_AT_HEADER: &str = "Expires-at";
/// Header carrying the connection's access token.
pub const ACCESS_TOKEN_HEADER: &str = "Access-Token";
/// Header carrying the app language for localized provider responses.
pub const ACCEPT_LANGUAGE_HEADER: &str = "Accept-Language";
/// Content-Type header name.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// v1 bodies are plain JSON.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// v2 bodies are compact signed tokens.
pub const CONTENT_TYPE_JOSE: &str = "application/jose";

/// HTTP methods the authenticator issues.
///
/// A closed set keeps the canonical signing form fixed: the wire and the
/// signing string always carry the uppercase verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Uppercase verb as it appears on the wire and in the signing string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully formed request for the transport to send.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub url: String,
    /// Header pairs in insertion order.
    pub headers: Vec<(String, String)>,
    /// Raw body bytes; empty for body-less requests.
    pub body: Vec<u8>,
}

impl RequestDescriptor {
    /// Look up a header value by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
