//! Encrypted at-rest persistence for the credential pair
//!
//! Credentials are encrypted to the operating-system user: the AEAD key is
//! derived from the local account name, so the file is useless when copied
//! to another machine or account. A corrupt store on reload is cleared
//! rather than retried.

use super::CredentialPair;
use anyhow::{Context, Result};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const NONCE_LEN: usize = 12;
const KEY_CONTEXT: &str = "riftsync-credential-store-v1";

/// Persists one credential pair, encrypted to the OS user.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the platform data directory.
    pub fn default_location() -> Result<Self> {
        let dir = dirs_next::data_dir()
            .context("no platform data directory")?
            .join("riftsync");
        Ok(Self::new(dir.join("credentials.enc")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, pair: &CredentialPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let plaintext = serde_json::to_vec(pair).context("serializing credentials")?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&derive_key()));

        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| anyhow::anyhow!("encrypting credentials"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        std::fs::write(&self.path, blob)
            .with_context(|| format!("writing {}", self.path.display()))?;
        debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }

    /// Reloads the stored pair. Any decode or decrypt failure clears the
    /// store and yields `None`.
    pub fn load(&self) -> Option<CredentialPair> {
        let blob = match std::fs::read(&self.path) {
            Ok(blob) => blob,
            Err(_) => return None,
        };

        match self.decrypt(&blob) {
            Some(pair) => Some(pair),
            None => {
                warn!(path = %self.path.display(), "corrupt credential store, clearing");
                self.clear();
                None
            }
        }
    }

    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }

    fn decrypt(&self, blob: &[u8]) -> Option<CredentialPair> {
        if blob.len() <= NONCE_LEN {
            return None;
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&derive_key()));
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()?;
        serde_json::from_slice(&plaintext).ok()
    }
}

/// Key bound to the local OS account name.
fn derive_key() -> [u8; 32] {
    let user = std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string());

    let mut hasher = Sha256::new();
    hasher.update(KEY_CONTEXT.as_bytes());
    hasher.update(b":");
    hasher.update(user.as_bytes());
    hasher.finalize().into()
}
