use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{KeyVaultError, Result};

/// At-rest encryption for stored provider credentials, using the same
/// AEAD primitive family the provider layer already depends on for its
/// OAuth/JWT handling.
pub struct KeyCipher {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl KeyCipher {
    pub fn new(master_key_32_bytes: &[u8]) -> Result<Self> {
        let unbound = UnboundKey::new(&AES_256_GCM, master_key_32_bytes)
            .map_err(|_| KeyVaultError::Crypto("invalid master key length".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    pub fn from_base64(master_key_b64: &str) -> Result<Self> {
        use base64::Engine;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(master_key_b64)
            .map_err(|e| KeyVaultError::Crypto(e.to_string()))?;
        Self::new(&bytes)
    }

    /// Encrypts `plaintext`, returning `(ciphertext, nonce)`.
    pub fn seal(&self, plaintext: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| KeyVaultError::Crypto("rng failure".to_string()))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| KeyVaultError::Crypto("seal failed".to_string()))?;

        Ok((in_out, nonce_bytes.to_vec()))
    }

    pub fn open(&self, ciphertext: &[u8], nonce: &[u8]) -> Result<String> {
        if nonce.len() != NONCE_LEN {
            return Err(KeyVaultError::Crypto("invalid nonce length".to_string()));
        }
        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(nonce);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| KeyVaultError::Crypto("open failed".to_string()))?;

        String::from_utf8(plaintext.to_vec())
            .map_err(|e| KeyVaultError::Crypto(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cipher() -> KeyCipher {
        KeyCipher::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn seal_then_open_round_trips() {
        let cipher = test_cipher();
        let (ct, nonce) = cipher.seal("sk-ant-abc123").unwrap();
        let pt = cipher.open(&ct, &nonce).unwrap();
        assert_eq!(pt, "sk-ant-abc123");
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let cipher = test_cipher();
        let (mut ct, nonce) = cipher.seal("sk-ant-abc123").unwrap();
        ct[0] ^= 0xFF;
        assert!(cipher.open(&ct, &nonce).is_err());
    }
}
