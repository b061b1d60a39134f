//! Token hashing and cipher-key derivation for the STB login handshake.
//!
//! Two related derivations live here. [`compute_token`] produces the
//! authentication token substituted into the login start URL. The cipher
//! key derivation produces the 8- or 24-byte DES/3DES key that seals the
//! serialized credential into the `auth_info` blob the login page requests
//! through the bridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::credential::Credential;
use crate::{crypto, AuthError, Result};

/// How the subscriber password is transformed before use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    #[default]
    Plain,
    Md5,
    SaltedMd5,
}

impl FromStr for AuthMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PLAIN" => Ok(Self::Plain),
            "MD5" => Ok(Self::Md5),
            "SALTED_MD5" => Ok(Self::SaltedMd5),
            other => Err(AuthError::Config(format!("unknown auth method: {other}"))),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "PLAIN",
            Self::Md5 => "MD5",
            Self::SaltedMd5 => "SALTED_MD5",
        };
        f.write_str(name)
    }
}

/// Lowercase hex MD5 digest.
fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Derive the authentication token for the start URL.
///
/// - `Plain`: the password unchanged.
/// - `Md5`: hex MD5 of the password.
/// - `SaltedMd5`: hex MD5 of password‖salt; the salt is required.
pub fn compute_token(
    credential: &Credential,
    method: AuthMethod,
    salt: Option<&str>,
) -> Result<String> {
    let password = credential.password();
    match method {
        AuthMethod::Plain => Ok(password.to_string()),
        AuthMethod::Md5 => Ok(md5_hex(password)),
        AuthMethod::SaltedMd5 => {
            let salt = require_salt(salt)?;
            Ok(md5_hex(&format!("{password}{salt}")))
        }
    }
}

/// Pad a cipher key to a DES-compatible length: shorter than 8 is padded
/// with `'0'` to 8, 9..=23 is padded to 24, longer is truncated to 24.
pub fn pad_key(key: &str) -> String {
    let length = key.len();
    if length == 8 || length == 24 {
        return key.to_string();
    }
    if length < 8 {
        return format!("{key}{}", "0".repeat(8 - length));
    }
    if length < 24 {
        return format!("{key}{}", "0".repeat(24 - length));
    }
    key[..24].to_string()
}

/// Derive the DES/3DES key that seals the credential envelope.
///
/// `Plain` pads the raw password, `Md5` pads the full digest (24-byte 3DES
/// key), `SaltedMd5` pads the first 8 digest chars (8-byte DES key).
pub fn derive_cipher_key(
    password: &str,
    method: AuthMethod,
    salt: Option<&str>,
) -> Result<String> {
    match method {
        AuthMethod::Plain => Ok(pad_key(password)),
        AuthMethod::Md5 => Ok(pad_key(&md5_hex(password))),
        AuthMethod::SaltedMd5 => {
            let salt = require_salt(salt)?;
            Ok(pad_key(&md5_hex(&format!("{password}{salt}"))[..8]))
        }
    }
}

fn require_salt(salt: Option<&str>) -> Result<&str> {
    salt.ok_or_else(|| AuthError::Config("salt is required for SALTED_MD5".into()))
}

/// Binds a credential to an auth method and produces the encrypted
/// `auth_info` blob the login page exchanges with the carrier.
#[derive(Debug, Clone)]
pub struct Authenticator {
    credential: Credential,
    method: AuthMethod,
    salt: Option<String>,
}

impl Authenticator {
    /// Fails early if the method requires a salt and none is given.
    pub fn new(credential: Credential, method: AuthMethod, salt: Option<String>) -> Result<Self> {
        if method == AuthMethod::SaltedMd5 && salt.is_none() {
            return Err(AuthError::Config("salt is required for SALTED_MD5".into()));
        }
        Ok(Self {
            credential,
            method,
            salt,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    /// The start-URL authentication token (see [`compute_token`]).
    pub fn token(&self) -> Result<String> {
        compute_token(&self.credential, self.method, self.salt.as_deref())
    }

    /// Serialized credential encrypted under the derived cipher key,
    /// hex-armored. The credential must carry a bound session token.
    pub fn auth_info(&self) -> Result<String> {
        let key = derive_cipher_key(
            self.credential.password(),
            self.method,
            self.salt.as_deref(),
        )?;
        crypto::encrypt(&self.credential.dumps()?, &key)
    }
}
