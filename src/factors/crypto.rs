//! Password-based payload encryption.
//!
//! The key is derived with PBKDF2-HMAC-SHA256 (100,000 rounds, 256-bit output)
//! from the password and a fresh random salt, then used for AES-256-GCM with a
//! fresh random 96-bit IV. The sealed blob is self-contained:
//!
//! ```text
//! [16 bytes] salt
//! [12 bytes] iv
//! [N bytes ] ciphertext || 16-byte GCM tag
//! ```
//!
//! There is no stored password hash. A failing GCM tag is the only signal that
//! the password is wrong (or the blob was corrupted).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::common::error::StegoError;

/// PBKDF2 salt length in bytes.
pub const SALT_LEN: usize = 16;
/// AES-GCM IV length in bytes.
pub const IV_LEN: usize = 12;
/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;
/// PBKDF2-HMAC-SHA256 rounds.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Size of a sealed blob for `plaintext_len` bytes of input.
pub const fn sealed_len(plaintext_len: usize) -> usize {
    SALT_LEN + IV_LEN + plaintext_len + TAG_LEN
}

/// Derive the AES-256 key from password + salt.
pub fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut *key);
    key
}

/// Encrypt `plaintext` under `password`, returning `salt || iv || ciphertext`.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>, StegoError> {
    let mut rng = rand::thread_rng();

    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let mut iv = [0u8; IV_LEN];
    rng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| StegoError::Crypto(format!("invalid key length: {}", e)))?;

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| StegoError::Crypto("AES-GCM encryption failed".to_string()))?;

    let mut out = Vec::with_capacity(SALT_LEN + IV_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Returns [`StegoError::AuthenticationFailed`] when the tag does not verify and
/// [`StegoError::CorruptContainer`] when the blob is too short to hold one.
pub fn decrypt(blob: &[u8], password: &str) -> Result<Vec<u8>, StegoError> {
    if blob.len() < sealed_len(0) {
        return Err(StegoError::CorruptContainer(format!(
            "encrypted blob is {} bytes, need at least {}",
            blob.len(),
            sealed_len(0)
        )));
    }

    let (salt, rest) = blob.split_at(SALT_LEN);
    let (iv, ciphertext) = rest.split_at(IV_LEN);

    let key = derive_key(password, salt);
    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| StegoError::Crypto(format!("invalid key length: {}", e)))?;

    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| StegoError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let msg = b"Hello, steganography!";
        let blob = encrypt(msg, "secret123").unwrap();
        assert_eq!(blob.len(), sealed_len(msg.len()));
        assert_eq!(decrypt(&blob, "secret123").unwrap(), msg);
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let blob = encrypt(b"secret message", "correct").unwrap();
        let result = decrypt(&blob, "wrong");
        assert!(matches!(result, Err(StegoError::AuthenticationFailed)));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let mut blob = encrypt(b"secret message", "pw").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert!(matches!(
            decrypt(&blob, "pw"),
            Err(StegoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn salt_and_iv_are_fresh() {
        let a = encrypt(b"same", "pw").unwrap();
        let b = encrypt(b"same", "pw").unwrap();
        assert_ne!(a[..SALT_LEN + IV_LEN], b[..SALT_LEN + IV_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn truncated_blob_is_corrupt() {
        let result = decrypt(&[0u8; SALT_LEN + IV_LEN + TAG_LEN - 1], "pw");
        assert!(matches!(result, Err(StegoError::CorruptContainer(_))));
    }

    #[test]
    fn empty_plaintext_works() {
        let blob = encrypt(b"", "pass").unwrap();
        assert_eq!(blob.len(), SALT_LEN + IV_LEN + TAG_LEN);
        assert!(decrypt(&blob, "pass").unwrap().is_empty());
    }

    #[test]
    fn derive_key_deterministic() {
        let salt = [7u8; SALT_LEN];
        assert_eq!(*derive_key("mypass", &salt), *derive_key("mypass", &salt));
        assert_ne!(*derive_key("mypass", &salt), *derive_key("other", &salt));
    }
}
