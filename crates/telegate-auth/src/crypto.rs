//! DES and 3DES credential envelope: ECB mode, PKCS#7 padding, hex armor.
//!
//! Key length selects the algorithm — 8 bytes is single DES, 24 bytes is
//! 3DES (EDE3). Anything else is rejected before touching the cipher.

use openssl::symm::{decrypt as symm_decrypt, encrypt as symm_encrypt, Cipher};

use crate::{AuthError, Result};

fn cipher_for_key(key: &str) -> Result<Cipher> {
    match key.len() {
        8 => Ok(Cipher::des_ecb()),
        24 => Ok(Cipher::des_ede3()),
        other => Err(AuthError::Config(format!(
            "cipher key must be 8 or 24 bytes for DES or 3DES, got {other}"
        ))),
    }
}

/// Encrypt `data` under `key`, returning lowercase hex.
pub fn encrypt(data: &str, key: &str) -> Result<String> {
    let cipher = cipher_for_key(key)?;
    let encrypted = symm_encrypt(cipher, key.as_bytes(), None, data.as_bytes())?;
    Ok(hex_encode(&encrypted))
}

/// Decrypt hex-armored ciphertext produced by [`encrypt`].
pub fn decrypt(data: &str, key: &str) -> Result<String> {
    let cipher = cipher_for_key(key)?;
    let raw = hex_decode(data)?;
    let decrypted = symm_decrypt(cipher, key.as_bytes(), None, &raw)?;
    String::from_utf8(decrypted)
        .map_err(|_| AuthError::Ciphertext("decrypted payload is not valid UTF-8".into()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(data: &str) -> Result<Vec<u8>> {
    if data.len() % 2 != 0 {
        return Err(AuthError::Ciphertext("odd-length hex string".into()));
    }
    (0..data.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&data[i..i + 2], 16)
                .map_err(|_| AuthError::Ciphertext(format!("invalid hex at offset {i}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_8: &str = "thisis8k";
    const KEY_24: &str = "thisisthe24byteslongkey!";

    #[test]
    fn rejects_invalid_key_lengths() {
        for key in ["", "short", "sevenchr", "123456789", &KEY_24[..23]] {
            if key.len() == 8 {
                continue;
            }
            assert!(matches!(
                encrypt("data", key),
                Err(AuthError::Config(_))
            ));
        }
        assert!(encrypt("data", &format!("{KEY_24}x")).is_err());
    }

    #[test]
    fn des_round_trip() {
        let plaintext = "Hello, World!";
        let ciphertext = encrypt(plaintext, KEY_8).unwrap();
        assert_ne!(ciphertext, plaintext);
        assert!(ciphertext.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(decrypt(&ciphertext, KEY_8).unwrap(), plaintext);
    }

    #[test]
    fn triple_des_round_trip() {
        let plaintext = "Привет, мир!";
        let ciphertext = encrypt(plaintext, KEY_24).unwrap();
        assert_eq!(decrypt(&ciphertext, KEY_24).unwrap(), plaintext);
    }

    #[test]
    fn ciphertext_is_block_aligned_hex() {
        // PKCS#7 always pads, so output is a whole number of 8-byte blocks.
        let ciphertext = encrypt("12345678", KEY_8).unwrap();
        assert_eq!(ciphertext.len() % 16, 0);
        assert_eq!(ciphertext.len(), 32);
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(matches!(
            decrypt("zz", KEY_8),
            Err(AuthError::Ciphertext(_))
        ));
        assert!(matches!(
            decrypt("abc", KEY_8),
            Err(AuthError::Ciphertext(_))
        ));
    }
}
