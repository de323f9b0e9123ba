//! In-process AES-256-GCM provider.
//!
//! ## Sealed Payload Format
//!
//! ```text
//! [12-byte nonce][ciphertext + 16-byte GCM tag]
//! ```
//!
//! The seal marker is prepended by the tag protocol, not by this provider.
//!
//! ## Key Derivation
//!
//! The 256-bit key is HKDF-SHA256 over the raw secret file bytes with a fixed
//! salt and info string, so any passphrase or key file works as a secret.

use super::{write_output, CipherProvider, Secret};
use crate::error::{Result, ShieldError};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const KEY_SIZE: usize = 32; // 256 bits
pub const NONCE_SIZE: usize = 12; // 96 bits for GCM

const HKDF_SALT: &[u8] = b"shield/aes-256-gcm/v1";
const HKDF_INFO: &[u8] = b"shield file sealing key";

#[derive(Clone)]
struct SealingKey {
    key: [u8; KEY_SIZE],
}

impl SealingKey {
    fn derive(material: &[u8]) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), material);
        let mut key = [0u8; KEY_SIZE];
        hk.expand(HKDF_INFO, &mut key)
            .map_err(|e| ShieldError::Cipher(format!("key derivation failed: {e}")))?;
        Ok(Self { key })
    }

    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| ShieldError::Cipher(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| ShieldError::Cipher(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() < NONCE_SIZE {
            return Err(ShieldError::Cipher("ciphertext too short".into()));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| ShieldError::Cipher(e.to_string()))?;

        let (nonce_bytes, encrypted) = payload.split_at(NONCE_SIZE);
        cipher
            .decrypt(Nonce::from_slice(nonce_bytes), encrypted)
            .map_err(|_| {
                ShieldError::Cipher("decryption failed (wrong secret or corrupted data)".into())
            })
    }
}

/// AES-256-GCM provider keyed from the secret file.
#[derive(Debug, Default, Clone)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    pub fn new() -> Self {
        Self
    }
}

impl CipherProvider for AesGcmCipher {
    fn name(&self) -> &str {
        "aes-gcm"
    }

    fn seal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()> {
        let key = SealingKey::derive(&secret.read()?)?;
        let plaintext = fs::read(input).map_err(|e| ShieldError::io_at(input, e))?;
        let sealed = key.encrypt(&plaintext)?;
        write_output(output, &sealed)?;
        debug!(input = %input.display(), bytes = sealed.len(), "aes-gcm sealed");
        Ok(())
    }

    fn unseal(&self, secret: &Secret, input: &Path, output: &Path) -> Result<()> {
        let key = SealingKey::derive(&secret.read()?)?;
        let payload = fs::read(input).map_err(|e| ShieldError::io_at(input, e))?;
        let plaintext = key.decrypt(&payload)?;
        write_output(output, &plaintext)?;
        debug!(input = %input.display(), bytes = plaintext.len(), "aes-gcm unsealed");
        Ok(())
    }
}
