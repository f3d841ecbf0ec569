//! Symmetric cipher for caller-held upstream tokens.
//!
//! Callers never send the provider access token in the clear: they send the
//! token encrypted with the gateway's key, and handlers decrypt it just
//! before calling upstream.
//!
//! Wire format: `{iv}:{hex(ciphertext)}` where `iv` is 16 ASCII hex
//! characters whose bytes are the AES-256-CBC initialization vector and the
//! ciphertext is PKCS#7 padded.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Required key length in bytes.
pub const KEY_LEN: usize = 32;

const IV_LEN: usize = 16;

/// Errors from [`TokenCipher`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// The configured key is not 32 bytes long.
    #[error("encryption key must be {KEY_LEN} bytes, got {actual}")]
    InvalidKeyLength {
        /// Length of the rejected key.
        actual: usize,
    },

    /// The token is not in `iv:hex` form.
    #[error("malformed encrypted token: {0}")]
    Malformed(String),

    /// Decryption failed (wrong key or tampered ciphertext).
    #[error("failed to decrypt token")]
    Decrypt,
}

/// AES-256-CBC token cipher.
///
/// # Example
///
/// ```
/// use hermes_core::TokenCipher;
///
/// let cipher = TokenCipher::new(b"0123456789abcdef0123456789abcdef").unwrap();
/// let encrypted = cipher.encrypt("EAAG-provider-token").unwrap();
/// assert_eq!(cipher.decrypt(&encrypted).unwrap(), "EAAG-provider-token");
/// ```
#[derive(Clone)]
pub struct TokenCipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for TokenCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCipher").finish_non_exhaustive()
    }
}

impl TokenCipher {
    /// Creates a cipher from a 32-byte key.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| CipherError::InvalidKeyLength { actual: key.len() })?;
        Ok(Self { key })
    }

    /// Encrypts a token with a fresh random IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let iv = hex::encode(rand::random::<[u8; IV_LEN / 2]>());
        let encryptor = Aes256CbcEnc::new_from_slices(&self.key, iv.as_bytes())
            .map_err(|_| CipherError::InvalidKeyLength { actual: KEY_LEN })?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        Ok(format!("{iv}:{}", hex::encode(ciphertext)))
    }

    /// Decrypts a token produced by [`TokenCipher::encrypt`].
    pub fn decrypt(&self, token: &str) -> Result<String, CipherError> {
        let (iv, ciphertext) = token
            .split_once(':')
            .ok_or_else(|| CipherError::Malformed("missing iv separator".to_string()))?;
        if iv.len() != IV_LEN {
            return Err(CipherError::Malformed(format!(
                "iv must be {IV_LEN} characters, got {}",
                iv.len()
            )));
        }
        let ciphertext =
            hex::decode(ciphertext).map_err(|e| CipherError::Malformed(e.to_string()))?;

        let decryptor = Aes256CbcDec::new_from_slices(&self.key, iv.as_bytes())
            .map_err(|_| CipherError::Decrypt)?;
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| CipherError::Decrypt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const KEY: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
    const OTHER_KEY: &[u8; 32] = b"fedcba9876543210fedcba9876543210";

    #[test]
    fn test_rejects_short_key() {
        let err = TokenCipher::new(b"too-short").unwrap_err();
        assert_eq!(err, CipherError::InvalidKeyLength { actual: 9 });
    }

    #[test]
    fn test_wire_format() {
        let cipher = TokenCipher::new(KEY).unwrap();
        let token = cipher.encrypt("hello").unwrap();
        let (iv, ct) = token.split_once(':').unwrap();
        assert_eq!(iv.len(), 16);
        assert!(iv.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(ct.len(), 32, "one padded AES block, hex encoded");
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let cipher = TokenCipher::new(KEY).unwrap();
        assert_ne!(cipher.encrypt("same").unwrap(), cipher.encrypt("same").unwrap());
    }

    #[test]
    fn test_malformed_tokens() {
        let cipher = TokenCipher::new(KEY).unwrap();
        assert!(matches!(cipher.decrypt("no-separator"), Err(CipherError::Malformed(_))));
        assert!(matches!(cipher.decrypt("short:abcd"), Err(CipherError::Malformed(_))));
        assert!(matches!(
            cipher.decrypt("0123456789abcdef:zz"),
            Err(CipherError::Malformed(_))
        ));
        assert_eq!(
            cipher.decrypt("0123456789abcdef:00ff"),
            Err(CipherError::Decrypt)
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let cipher = TokenCipher::new(KEY).unwrap();
        assert!(!format!("{cipher:?}").contains("0123456789"));
    }

    proptest! {
        #[test]
        fn round_trip(plaintext in "\\PC{0,200}") {
            let cipher = TokenCipher::new(KEY).unwrap();
            let token = cipher.encrypt(&plaintext).unwrap();
            prop_assert_eq!(cipher.decrypt(&token).unwrap(), plaintext);
        }

        #[test]
        fn wrong_key_never_yields_plaintext(plaintext in "[A-Za-z0-9]{8,64}") {
            let token = TokenCipher::new(KEY).unwrap().encrypt(&plaintext).unwrap();
            let other = TokenCipher::new(OTHER_KEY).unwrap();
            prop_assert_ne!(other.decrypt(&token).ok(), Some(plaintext));
        }
    }
}
