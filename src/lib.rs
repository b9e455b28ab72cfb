//! Cryptographic identity and secure-messaging core for a mobile
//! authenticator.
//!
//! Each connection to a service provider gets its own RSA keypair, kept
//! behind a pluggable [`SecretStore`] (hardware keystore on device, an
//! in-memory double in tests). On top of that identity the crate builds
//! the two protocol generations the providers speak:
//!
//! - **v1**: hybrid envelopes (AES-256-GCM bulk, RSA-wrapped key) for
//!   inbound payloads, and per-request signatures over a canonical
//!   `METHOD|url|expires_at|body` string carried in headers.
//! - **v2**: RS256 detached-JWS tokens with sensitive fields wrapped in
//!   v1 envelopes, and provider-signed tokens on the inbound side.
//!
//! Decoded authorization payloads pass through [`AuthorizationData`],
//! which refuses anything missing a required field.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use authenticator_core::{
//!     AuthenticatorManager, Connection, KeyStore, MemorySecretStore, ProtocolVersion,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), authenticator_core::AuthError> {
//! let keystore = Arc::new(KeyStore::new(MemorySecretStore::new()));
//! let manager = AuthenticatorManager::new(keystore);
//!
//! // Enrollment: generate the connection's keypair, send the PEM off
//! // in the registration request.
//! let public_pem = manager.prepare_connection("12345")?;
//!
//! // Later, with the provider's key cached, build signed requests.
//! let connection = Connection::new("12345", ProtocolVersion::V1)
//!     .with_access_token("token-from-provider");
//! let request = manager.authorizations_request(&connection, "https://bank.example")?;
//! println!("{} {}", request.method, request.url);
//! # Ok(())
//! # }
//! ```

pub mod authorization;
pub mod clock;
pub mod connection;
pub mod detached_jws;
pub mod envelope;
pub mod errors;
pub mod keystore;
pub mod manager;
pub mod random;
pub mod request;
pub mod secret_store;
pub mod signed_request;
pub mod tags;

pub use authorization::{AuthorizationData, AuthorizationStatus};
pub use clock::{Clock, FixedClock, SystemClock, EXPIRES_IN_SECS};
pub use connection::{Connection, ConnectionStatus, ProtocolVersion};
pub use envelope::Envelope;
pub use errors::AuthError;
pub use keystore::{KeyStore, PrivateKeyHandle, RSA_KEY_BITS};
pub use manager::AuthenticatorManager;
pub use request::{HttpMethod, RequestDescriptor};
pub use secret_store::{MemorySecretStore, SecretStore};
pub use tags::{derive_tag, KeyRole};
