//! STB credential model with validation and delimiter-framed serialization.
//!
//! A credential bundles everything the carrier's login flow needs to
//! identify a subscriber box. The six subscriber fields come from
//! configuration; the session token is only known once the login page
//! hands one over, and is bound afterwards with [`Credential::with_token`].
//! Instances are validated on construction and immutable afterwards.
//!
//! The serialized form is a `$`-delimited record prefixed with a digest of
//! the session token, which is why `$` is an illegal character in every
//! field.

use std::fmt;

use crate::{AuthError, Result};

/// Default value for the opaque `ctc` field. Its effect on the carrier
/// side is undocumented; it is carried through verbatim.
pub const DEFAULT_CTC: &str = "CTC";

const MAX_TOKEN: usize = 100;
const MAX_USER_ID: usize = 40;
const MAX_PASSWORD: usize = 24;
const MAX_IP: usize = 39;
const MAX_MAC: usize = 17;
const MAX_PRODUCT_ID: usize = 50;

/// Number of `$` delimiters in a serialized credential.
const DELIMITER_COUNT: usize = 7;

/// Subscriber credential, optionally bound to a login-session token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    user_id: String,
    password: String,
    ip: String,
    mac: String,
    product_id: String,
    ctc: String,
    token: Option<String>,
    hash: Option<String>,
}

impl Credential {
    /// Build and validate a credential from configuration-supplied fields.
    /// `ctc` falls back to [`DEFAULT_CTC`].
    pub fn new(
        user_id: &str,
        password: &str,
        ip: &str,
        mac: &str,
        product_id: &str,
        ctc: Option<&str>,
    ) -> Result<Self> {
        let ctc = ctc.unwrap_or(DEFAULT_CTC);

        check_field("user_id", user_id, MAX_USER_ID)?;
        check_field("password", password, MAX_PASSWORD)?;
        check_field("ip", ip, MAX_IP)?;
        check_field("mac", mac, MAX_MAC)?;
        check_field("product_id", product_id, MAX_PRODUCT_ID)?;
        if ctc.contains('$') {
            return Err(AuthError::Credential(
                "illegal character '$' in ctc".into(),
            ));
        }

        Ok(Self {
            user_id: user_id.into(),
            password: password.into(),
            ip: ip.into(),
            mac: mac.into(),
            product_id: product_id.into(),
            ctc: ctc.into(),
            token: None,
            hash: None,
        })
    }

    /// Bind the session token handed over by the login page. The token is
    /// validated like any other field and its digest is derived once here.
    pub fn with_token(mut self, token: &str) -> Result<Self> {
        check_field("token", token, MAX_TOKEN)?;
        self.hash = Some(token_hash(token));
        self.token = Some(token.into());
        Ok(self)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn ctc(&self) -> &str {
        &self.ctc
    }

    /// The bound session token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Digits-only digest of the session token, embedded in the serialized
    /// form so a receiver can detect a forged token.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }

    /// Serialize into the carrier's `$`-delimited record. Requires a bound
    /// token. The password is never part of the serialized form.
    pub fn dumps(&self) -> Result<String> {
        let (token, hash) = match (&self.token, &self.hash) {
            (Some(token), Some(hash)) => (token, hash),
            _ => {
                return Err(AuthError::Credential(
                    "cannot serialize a credential without a session token".into(),
                ))
            }
        };
        Ok(format!(
            "{}${}${}${}${}${}$${}",
            hash, token, self.user_id, self.product_id, self.ip, self.mac, self.ctc
        ))
    }

    /// Parse a `$`-delimited record back into a bound credential. The
    /// password is supplied out of band. Fails if the framing is wrong or
    /// the embedded token digest does not match.
    pub fn loads(password: &str, data: &str) -> Result<Self> {
        if data.matches('$').count() != DELIMITER_COUNT {
            return Err(AuthError::Credential(format!(
                "expected {DELIMITER_COUNT} '$' delimiters in serialized credential"
            )));
        }
        let items: Vec<&str> = data.split('$').collect();
        let credential = Self::new(
            items[2],
            password,
            items[4],
            items[5],
            items[3],
            Some(items[7]),
        )?
        .with_token(items[1])?;
        if credential.hash.as_deref() != Some(items[0]) {
            return Err(AuthError::Credential(
                "token digest mismatch: token may be forged or hashed differently".into(),
            ));
        }
        Ok(credential)
    }
}

impl fmt::Debug for Credential {
    // Keep the password out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .field("ip", &self.ip)
            .field("mac", &self.mac)
            .field("product_id", &self.product_id)
            .field("ctc", &self.ctc)
            .field("token", &self.token)
            .finish()
    }
}

fn check_field(name: &str, value: &str, max_len: usize) -> Result<()> {
    if value.is_empty() {
        return Err(AuthError::Credential(format!("{name} must not be empty")));
    }
    if value.len() > max_len {
        return Err(AuthError::Credential(format!(
            "{name} exceeds maximum length {max_len}"
        )));
    }
    if value.contains('$') {
        return Err(AuthError::Credential(format!(
            "illegal character '$' in {name}"
        )));
    }
    Ok(())
}

/// First 8 hex chars of MD5(token), with each letter replaced by its
/// 1-based alphabet index (`a` -> 1 … `f` -> 6). Digits pass through.
fn token_hash(token: &str) -> String {
    let digest = format!("{:x}", md5::compute(token.as_bytes()));
    digest[..8]
        .chars()
        .map(|c| {
            if c.is_ascii_digit() {
                c.to_string()
            } else {
                (c as u8 - b'a' + 1).to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential::new(
            "user01",
            "secret",
            "192.168.1.10",
            "00:1A:2B:3C:4D:5E",
            "product9",
            None,
        )
        .unwrap()
    }

    fn bound() -> Credential {
        sample().with_token("token123").unwrap()
    }

    #[test]
    fn hash_is_digits_only() {
        let credential = bound();
        let hash = credential.hash().unwrap();
        assert!(hash.chars().all(|c| c.is_ascii_digit()));
        assert!(hash.len() >= 8);
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(bound().hash().unwrap(), bound().hash().unwrap());
    }

    #[test]
    fn empty_field_rejected() {
        let result = Credential::new("", "p", "1.2.3.4", "aa:bb", "prod", None);
        assert!(matches!(result, Err(AuthError::Credential(_))));
    }

    #[test]
    fn oversized_field_rejected() {
        let long = "x".repeat(41);
        let result = Credential::new(&long, "p", "1.2.3.4", "aa:bb", "prod", None);
        assert!(matches!(result, Err(AuthError::Credential(_))));
    }

    #[test]
    fn delimiter_in_field_rejected() {
        let result = Credential::new("us$er", "p", "1.2.3.4", "aa:bb", "prod", None);
        assert!(matches!(result, Err(AuthError::Credential(_))));
    }

    #[test]
    fn delimiter_in_token_rejected() {
        let result = sample().with_token("to$ken");
        assert!(matches!(result, Err(AuthError::Credential(_))));
    }

    #[test]
    fn ctc_defaults_to_sentinel() {
        assert_eq!(sample().ctc(), DEFAULT_CTC);
    }

    #[test]
    fn dumps_requires_bound_token() {
        assert!(matches!(
            sample().dumps(),
            Err(AuthError::Credential(_))
        ));
    }

    #[test]
    fn dumps_loads_round_trip() {
        let credential = bound();
        let serialized = credential.dumps().unwrap();
        let restored = Credential::loads("secret", &serialized).unwrap();
        assert_eq!(restored, credential);
    }

    #[test]
    fn loads_rejects_tampered_token() {
        let serialized = bound().dumps().unwrap().replace("token123", "token124");
        let result = Credential::loads("secret", &serialized);
        assert!(matches!(result, Err(AuthError::Credential(_))));
    }

    #[test]
    fn loads_rejects_bad_framing() {
        let result = Credential::loads("secret", "only$three$fields");
        assert!(matches!(result, Err(AuthError::Credential(_))));
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", bound());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
