use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::Engine as _;
use rand::RngCore;

use crate::error::TokenError;

/// Marks a column value as sealed by [`TokenCipher`].
const SEALED_PREFIX: &str = "enc:v1:";

/// At-rest encryption for token columns (AES-256-GCM).
///
/// Sealed values look like `enc:v1:base64(nonce || ciphertext)`. Values without
/// the prefix are read back as plaintext, so rows written before a key was
/// configured stay readable.
pub struct TokenCipher {
    cipher: Option<Aes256Gcm>,
}

impl TokenCipher {
    /// Create a cipher from a base64-encoded 32-byte key.
    pub fn new(key_b64: &str) -> Result<Self, TokenError> {
        let key = base64::engine::general_purpose::STANDARD
            .decode(key_b64)
            .map_err(|e| TokenError::Cipher(format!("Invalid TOKEN_ENCRYPTION_KEY base64: {e}")))?;

        if key.len() != 32 {
            return Err(TokenError::Cipher(format!(
                "TOKEN_ENCRYPTION_KEY must be 32 bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| TokenError::Cipher(format!("Failed to init AES cipher: {e}")))?;

        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// A cipher that stores values as-is.
    pub fn plaintext() -> Self {
        Self { cipher: None }
    }

    /// Build from an optional key, falling back to plaintext storage.
    pub fn from_optional_key(key_b64: Option<&str>) -> Result<Self, TokenError> {
        match key_b64 {
            Some(key) => Self::new(key),
            None => Ok(Self::plaintext()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, TokenError> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| TokenError::Cipher(format!("Encryption failed: {e}")))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(format!(
            "{SEALED_PREFIX}{}",
            base64::engine::general_purpose::STANDARD.encode(&combined)
        ))
    }

    pub fn open(&self, stored: &str) -> Result<String, TokenError> {
        let Some(encoded) = stored.strip_prefix(SEALED_PREFIX) else {
            return Ok(stored.to_string());
        };

        let cipher = self.cipher.as_ref().ok_or_else(|| {
            TokenError::Cipher("stored token is encrypted but no key is configured".into())
        })?;

        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| TokenError::Cipher(format!("Invalid base64: {e}")))?;

        if combined.len() < 12 {
            return Err(TokenError::Cipher("Ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| TokenError::Cipher(format!("Decryption failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| TokenError::Cipher(format!("Invalid UTF-8 after decrypt: {e}")))
    }
}
