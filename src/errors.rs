use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("key generation error: {0}")]
    KeyGeneration(String),
    #[error("key not found: {0}")]
    KeyNotFound(String),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("decryption error: {0}")]
    Decryption(String),
    #[error("verification error: {0}")]
    Verification(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("secret store error: {0}")]
    Store(String),
    #[error("policy violation: {0}")]
    Policy(String),
    #[error("other: {0}")]
    Other(String),
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self { Self::Serde(e.to_string()) }
}
