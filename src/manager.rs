//! High-level authenticator flows over the keystore and codecs.
//!
//! This module stitches the pieces together the way the host app uses
//! them: enroll a connection, confirm or deny an authorization, fetch the
//! authorization index, revoke a connection, and decode inbound payloads.
//!
//! ## Outbound flow
//!
//! 1. Resolve the connection's keystore tag and private-key handle.
//! 2. Build the body for the connection's protocol generation (v1 signed
//!    JSON, v2 detached-signed token with envelope-wrapped sensitive
//!    fields).
//! 3. Return a [`RequestDescriptor`] for the host transport to send.
//!
//! ## Inbound flow
//!
//! Transport delivers raw bytes; [`decrypt_authorization`] (v1 envelope)
//! or [`verify_authorization_token`] (v2 provider-signed token) applies
//! the crypto and hands the result to [`AuthorizationData`] for strict
//! decoding. Crypto failures are errors; a payload that decrypts or
//! verifies but is missing fields comes back as `Ok(None)`.
//!
//! [`decrypt_authorization`]: AuthenticatorManager::decrypt_authorization
//! [`verify_authorization_token`]: AuthenticatorManager::verify_authorization_token

use crate::authorization::AuthorizationData;
use crate::clock::{Clock, SystemClock};
use crate::connection::{Connection, ProtocolVersion};
use crate::detached_jws;
use crate::envelope::{self, Envelope};
use crate::errors::AuthError;
use crate::keystore::{public_key_pem, KeyStore};
use crate::request::{
    HttpMethod, RequestDescriptor, ACCEPT_LANGUAGE_HEADER, ACCESS_TOKEN_HEADER,
    CONTENT_TYPE_HEADER, CONTENT_TYPE_JOSE, CONTENT_TYPE_JSON, EXPIRES_AT_HEADER,
    SIGNATURE_HEADER,
};
use crate::secret_store::SecretStore;
use crate::signed_request::{request_expiry, sign_request};
use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use serde::Serialize;
use std::sync::Arc;

/// v1 confirm/deny body: `{"data":{"authorization_code":..,"confirm":..}}`.
#[derive(Serialize)]
struct ActionBodyV1<'a> {
    data: ActionDataV1<'a>,
}

#[derive(Serialize)]
struct ActionDataV1<'a> {
    authorization_code: &'a str,
    confirm: bool,
}

/// v2 confirm/deny payload; the code travels envelope-wrapped so the
/// signature covers only opaque bytes.
#[derive(Serialize)]
struct ActionPayloadV2 {
    data: ActionDataV2,
    exp: u64,
}

#[derive(Serialize)]
struct ActionDataV2 {
    authorization_code: Envelope,
    confirm: bool,
}

/// Payload for body-less v2 requests; freshness only.
#[derive(Serialize)]
struct ExpiryClaim {
    exp: u64,
}

/// High-level flows for one device, shared across its connections.
///
/// All operations are synchronous and CPU-bound; callers offload to a
/// background executor rather than a UI thread. The manager is `Send +
/// Sync` and safe to share behind an `Arc`.
pub struct AuthenticatorManager<S: SecretStore> {
    keystore: Arc<KeyStore<S>>,
    clock: Box<dyn Clock>,
    app_language: String,
}

impl<S: SecretStore> AuthenticatorManager<S> {
    /// Manager over the system clock, reporting `en` to the provider.
    pub fn new(keystore: Arc<KeyStore<S>>) -> Self {
        Self::with_clock(keystore, Box::new(SystemClock))
    }

    /// Manager over an injected clock, for deterministic expiry in tests.
    pub fn with_clock(keystore: Arc<KeyStore<S>>, clock: Box<dyn Clock>) -> Self {
        Self {
            keystore,
            clock,
            app_language: "en".to_string(),
        }
    }

    /// Language sent in the accept-language header.
    pub fn set_app_language(&mut self, language: impl Into<String>) {
        self.app_language = language.into();
    }

    /// Generate the connection's own keypair and return the public half
    /// as SPKI PEM for the enrollment request body.
    ///
    /// Replaces any existing pair for the connection; old handles stop
    /// verifying against the new key.
    pub fn prepare_connection(&self, connection_id: &str) -> Result<String, AuthError> {
        let connection = Connection::new(connection_id, ProtocolVersion::V1);
        let public_key = self
            .keystore
            .generate_keypair(&connection.own_tag(), &mut OsRng)?;

        #[cfg(feature = "trace")]
        tracing::info!("prepared keypair for connection {}", connection_id);

        public_key_pem(&public_key)
    }

    /// Cache the provider's public key for a connection.
    pub fn store_provider_key(
        &self,
        connection_id: &str,
        material: &[u8],
    ) -> Result<(), AuthError> {
        let connection = Connection::new(connection_id, ProtocolVersion::V2);
        self.keystore
            .import_public_key(&connection.provider_tag(), material)
    }

    /// Delete both keystore entries for a connection. Idempotent; called
    /// when the host app deletes the connection record.
    pub fn remove_connection(&self, connection_id: &str) -> Result<(), AuthError> {
        let connection = Connection::new(connection_id, ProtocolVersion::V1);
        self.keystore.delete(&connection.own_tag())?;
        self.keystore.delete(&connection.provider_tag())
    }

    /// Build the request confirming an authorization.
    pub fn confirm_authorization(
        &self,
        connection: &Connection,
        base_url: &str,
        authorization: &AuthorizationData,
    ) -> Result<RequestDescriptor, AuthError> {
        self.authorization_action(connection, base_url, authorization, true)
    }

    /// Build the request denying an authorization.
    pub fn deny_authorization(
        &self,
        connection: &Connection,
        base_url: &str,
        authorization: &AuthorizationData,
    ) -> Result<RequestDescriptor, AuthError> {
        self.authorization_action(connection, base_url, authorization, false)
    }

    fn authorization_action(
        &self,
        connection: &Connection,
        base_url: &str,
        authorization: &AuthorizationData,
        confirm: bool,
    ) -> Result<RequestDescriptor, AuthError> {
        ensure_active(connection)?;

        #[cfg(feature = "trace")]
        tracing::debug!(
            "building {} for authorization {} on connection {}",
            if confirm { "confirm" } else { "deny" },
            authorization.id,
            connection.id
        );

        match connection.protocol_version {
            ProtocolVersion::V1 => {
                let url = endpoint_url(
                    base_url,
                    ProtocolVersion::V1,
                    &format!("authorizations/{}", authorization.id),
                );
                let body = serde_json::to_string(&ActionBodyV1 {
                    data: ActionDataV1 {
                        authorization_code: &authorization.authorization_code,
                        confirm,
                    },
                })?;
                self.signed_v1_request(connection, HttpMethod::Put, url, Some(body))
            }
            ProtocolVersion::V2 => {
                let provider_pk = self.provider_public_key(connection)?;
                let url = endpoint_url(
                    base_url,
                    ProtocolVersion::V2,
                    &format!("authorizations/{}", authorization.id),
                );
                let sealed_code = detached_jws::encrypted_field(
                    &authorization.authorization_code,
                    &provider_pk,
                    &mut OsRng,
                )?;
                let payload = ActionPayloadV2 {
                    data: ActionDataV2 {
                        authorization_code: sealed_code,
                        confirm,
                    },
                    exp: request_expiry(self.clock.as_ref()),
                };
                let payload_bytes = serde_json::to_vec(&payload)?;
                self.signed_v2_body_request(connection, HttpMethod::Put, url, payload_bytes)
            }
        }
    }

    /// Build the request fetching the pending-authorization index.
    pub fn authorizations_request(
        &self,
        connection: &Connection,
        base_url: &str,
    ) -> Result<RequestDescriptor, AuthError> {
        ensure_active(connection)?;
        match connection.protocol_version {
            ProtocolVersion::V1 => {
                let url = endpoint_url(base_url, ProtocolVersion::V1, "authorizations");
                self.signed_v1_request(connection, HttpMethod::Get, url, None)
            }
            ProtocolVersion::V2 => {
                let url = endpoint_url(base_url, ProtocolVersion::V2, "authorizations");
                self.signed_v2_header_request(connection, HttpMethod::Get, url)
            }
        }
    }

    /// Build the request revoking this connection on the provider side.
    ///
    /// The access-token header names the connection being revoked. The
    /// host app deletes its record (and calls
    /// [`remove_connection`](Self::remove_connection)) after the provider
    /// acknowledges.
    pub fn revoke_connection_request(
        &self,
        connection: &Connection,
        base_url: &str,
    ) -> Result<RequestDescriptor, AuthError> {
        ensure_active(connection)?;
        match connection.protocol_version {
            ProtocolVersion::V1 => {
                let url = endpoint_url(base_url, ProtocolVersion::V1, "connections");
                self.signed_v1_request(connection, HttpMethod::Delete, url, None)
            }
            ProtocolVersion::V2 => {
                let url = endpoint_url(base_url, ProtocolVersion::V2, "connections");
                self.signed_v2_header_request(connection, HttpMethod::Delete, url)
            }
        }
    }

    /// Open a v1 envelope payload and decode the authorization inside.
    ///
    /// Crypto failures surface as errors; a payload that decrypts but is
    /// missing required fields is `Ok(None)` and must be dropped.
    pub fn decrypt_authorization(
        &self,
        connection: &Connection,
        payload: &[u8],
    ) -> Result<Option<AuthorizationData>, AuthError> {
        let handle = self.keystore.private_key_handle(&connection.own_tag())?;
        let envelope = Envelope::from_json(payload)?;
        let plaintext = envelope::open(&envelope, &handle)?;
        Ok(AuthorizationData::parse_for_connection(
            &plaintext,
            &connection.id,
        ))
    }

    /// Verify a provider-signed v2 token and decode the authorization in
    /// its payload.
    ///
    /// Fails with `KeyNotFound` when no provider key is cached for the
    /// connection, before looking at the token at all.
    pub fn verify_authorization_token(
        &self,
        connection: &Connection,
        token: &str,
    ) -> Result<Option<AuthorizationData>, AuthError> {
        let provider_pk = self.provider_public_key(connection)?;
        let payload = detached_jws::token_payload(token)?;
        detached_jws::verify_bytes(token, &payload, &provider_pk)?;
        Ok(AuthorizationData::parse_for_connection(
            &payload,
            &connection.id,
        ))
    }

    /// Provider public key for a connection, importing the record's
    /// material into the keystore on first use.
    ///
    /// A connection with no cached key and no material on the record is a
    /// precondition failure: `KeyNotFound` before any request is built.
    fn provider_public_key(&self, connection: &Connection) -> Result<RsaPublicKey, AuthError> {
        let tag = connection.provider_tag();
        match self.keystore.public_key(&tag) {
            Ok(pk) => Ok(pk),
            Err(AuthError::KeyNotFound(_)) => {
                let material = connection.provider_public_key.as_deref().ok_or_else(|| {
                    AuthError::KeyNotFound(format!(
                        "connection {} has no provider public key",
                        connection.id
                    ))
                })?;
                self.keystore.import_public_key(&tag, material)?;
                self.keystore.public_key(&tag)
            }
            Err(e) => Err(e),
        }
    }

    fn base_headers(
        &self,
        connection: &Connection,
        content_type: Option<&str>,
    ) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(5);
        if let Some(token) = &connection.access_token {
            headers.push((ACCESS_TOKEN_HEADER.to_string(), token.clone()));
        }
        headers.push((ACCEPT_LANGUAGE_HEADER.to_string(), self.app_language.clone()));
        if let Some(ct) = content_type {
            headers.push((CONTENT_TYPE_HEADER.to_string(), ct.to_string()));
        }
        headers
    }

    /// v1: signature and expiry travel as headers next to a JSON body.
    fn signed_v1_request(
        &self,
        connection: &Connection,
        method: HttpMethod,
        url: String,
        body: Option<String>,
    ) -> Result<RequestDescriptor, AuthError> {
        let handle = self.keystore.private_key_handle(&connection.own_tag())?;
        let expires_at = request_expiry(self.clock.as_ref());
        let signature = sign_request(&handle, method, &url, expires_at, body.as_deref())?;

        let content_type = body.as_ref().map(|_| CONTENT_TYPE_JSON);
        let mut headers = self.base_headers(connection, content_type);
        headers.push((EXPIRES_AT_HEADER.to_string(), expires_at.to_string()));
        headers.push((SIGNATURE_HEADER.to_string(), signature));

        Ok(RequestDescriptor {
            method,
            url,
            headers,
            body: body.map(String::into_bytes).unwrap_or_default(),
        })
    }

    /// v2 with parameters: the full signed token is the body.
    fn signed_v2_body_request(
        &self,
        connection: &Connection,
        method: HttpMethod,
        url: String,
        payload_bytes: Vec<u8>,
    ) -> Result<RequestDescriptor, AuthError> {
        let handle = self.keystore.private_key_handle(&connection.own_tag())?;
        let detached = detached_jws::sign_detached_bytes(&handle, &payload_bytes)?;
        let token = detached_jws::attach_payload(&detached, &payload_bytes)?;

        Ok(RequestDescriptor {
            method,
            url,
            headers: self.base_headers(connection, Some(CONTENT_TYPE_JOSE)),
            body: token.into_bytes(),
        })
    }

    /// v2 without a body: a token over an expiry claim rides in the
    /// signature header.
    fn signed_v2_header_request(
        &self,
        connection: &Connection,
        method: HttpMethod,
        url: String,
    ) -> Result<RequestDescriptor, AuthError> {
        // Presence of the provider key is still a precondition, even
        // though nothing is encrypted here.
        self.provider_public_key(connection)?;

        let handle = self.keystore.private_key_handle(&connection.own_tag())?;
        let payload = serde_json::to_vec(&ExpiryClaim {
            exp: request_expiry(self.clock.as_ref()),
        })?;
        let detached = detached_jws::sign_detached_bytes(&handle, &payload)?;
        let token = detached_jws::attach_payload(&detached, &payload)?;

        let mut headers = self.base_headers(connection, None);
        headers.push((SIGNATURE_HEADER.to_string(), token));

        Ok(RequestDescriptor {
            method,
            url,
            headers,
            body: Vec::new(),
        })
    }
}

fn ensure_active(connection: &Connection) -> Result<(), AuthError> {
    if connection.is_active() {
        Ok(())
    } else {
        Err(AuthError::Policy(format!(
            "connection {} is inactive",
            connection.id
        )))
    }
}

fn endpoint_url(base_url: &str, version: ProtocolVersion, path: &str) -> String {
    let api = match version {
        ProtocolVersion::V1 => "api/authenticator/v1",
        ProtocolVersion::V2 => "api/authenticator/v2",
    };
    format!("{}/{api}/{path}", base_url.trim_end_matches('/'))
}
