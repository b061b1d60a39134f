//! Telegate core authentication — STB credential model, token hashing, and
//! the DES/3DES credential envelope.

pub mod authenticator;
pub mod credential;
pub mod crypto;
pub mod recover;

pub use authenticator::{
    compute_token, derive_cipher_key, pad_key, AuthMethod, Authenticator,
};
pub use credential::{Credential, DEFAULT_CTC};
pub use recover::{recover_salt, reverse};

/// Result type for telegate-auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors produced while deriving tokens or handling credentials.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid credential: {0}")]
    Credential(String),

    #[error("invalid ciphertext: {0}")]
    Ciphertext(String),

    #[error("cipher failure: {0}")]
    Cipher(#[from] openssl::error::ErrorStack),
}
