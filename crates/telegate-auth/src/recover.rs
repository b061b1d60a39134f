//! Reverse tooling: decrypt a captured `auth_info` blob back into a
//! credential, and brute-force an unknown numeric salt.

use rayon::prelude::*;
use tracing::debug;

use crate::authenticator::{derive_cipher_key, AuthMethod};
use crate::credential::Credential;
use crate::{crypto, AuthError, Result};

/// Decrypt a captured `auth_info` blob and reconstruct the credential.
///
/// The password is needed to re-derive the cipher key and is folded back
/// into the parsed credential (it is not part of the serialized form).
pub fn reverse(
    password: &str,
    ciphertext: &str,
    method: AuthMethod,
    salt: Option<&str>,
) -> Result<Credential> {
    if method == AuthMethod::SaltedMd5 && salt.is_none() {
        return Err(AuthError::Config("salt is required for SALTED_MD5".into()));
    }
    let key = derive_cipher_key(password, method, salt)?;
    let plaintext = crypto::decrypt(ciphertext, &key)?;
    Credential::loads(password, &plaintext)
}

/// Brute-force a numeric salt against a captured `auth_info` blob.
///
/// Tries every salt in `0..10^max_digits`, zero-padded to `max_digits`
/// when `zero_pad` is set, and returns all matches. The credential must
/// carry the session token the blob was produced for. The search space is
/// embarrassingly parallel and runs across the rayon thread pool.
pub fn recover_salt(
    credential: &Credential,
    ciphertext: &str,
    max_digits: u32,
    zero_pad: bool,
) -> Result<Vec<u64>> {
    let total = 10u64.pow(max_digits);
    let payload = credential.dumps()?;
    let password = credential.password();
    debug!(total, zero_pad, "starting salt search");

    let mut matches: Vec<u64> = (0..total)
        .into_par_iter()
        .filter(|candidate| {
            let salt = if zero_pad {
                format!("{candidate:0width$}", width = max_digits as usize)
            } else {
                candidate.to_string()
            };
            derive_cipher_key(password, AuthMethod::SaltedMd5, Some(&salt))
                .and_then(|key| crypto::encrypt(&payload, &key))
                .map(|info| info == ciphertext)
                .unwrap_or(false)
        })
        .collect();
    matches.sort_unstable();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authenticator::Authenticator;

    fn credential() -> Credential {
        Credential::new(
            "user",
            "hunter2",
            "10.0.0.2",
            "00:11:22:33:44:55",
            "prod",
            None,
        )
        .unwrap()
        .with_token("tok")
        .unwrap()
    }

    #[test]
    fn reverse_reconstructs_credential() {
        let original = credential();
        let info = Authenticator::new(original.clone(), AuthMethod::SaltedMd5, Some("99".into()))
            .unwrap()
            .auth_info()
            .unwrap();
        let restored =
            reverse("hunter2", &info, AuthMethod::SaltedMd5, Some("99")).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn reverse_without_required_salt_fails() {
        let result = reverse("hunter2", "00", AuthMethod::SaltedMd5, None);
        assert!(matches!(result, Err(AuthError::Config(_))));
    }

    #[test]
    fn salt_search_finds_planted_salt() {
        let original = credential();
        let info = Authenticator::new(original.clone(), AuthMethod::SaltedMd5, Some("42".into()))
            .unwrap()
            .auth_info()
            .unwrap();
        let found = recover_salt(&original, &info, 2, true).unwrap();
        assert_eq!(found, vec![42]);
    }

    #[test]
    fn salt_search_without_match_is_empty() {
        let original = credential();
        assert!(recover_salt(&original, "deadbeef", 1, false)
            .unwrap()
            .is_empty());
    }
}
