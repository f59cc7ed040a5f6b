//! Salted one-way account credentials.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;

/// A salted SHA-256 digest of an account secret.
///
/// Only the salt and the digest are ever stored; the plaintext secret
/// exists solely in the arguments of the operation that presented it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    salt: Vec<u8>,
    digest: Vec<u8>,
}

impl Credential {
    /// Derives a credential from a plaintext secret with a fresh random salt.
    pub fn derive(secret: &str) -> Self {
        let mut salt = vec![0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let digest = Self::digest_with(&salt, secret);
        Self { salt, digest }
    }

    /// Checks a presented secret against the stored salt and digest.
    pub fn verify(&self, secret: &str) -> bool {
        Self::digest_with(&self.salt, secret) == self.digest
    }

    /// Reconstructs a credential from its persisted parts.
    pub fn from_parts(salt: Vec<u8>, digest: Vec<u8>) -> Self {
        Self { salt, digest }
    }

    /// Returns the stored salt.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Returns the stored digest.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    fn digest_with(salt: &[u8], secret: &str) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(secret.as_bytes());
        hasher.finalize().to_vec()
    }
}

// Credential material stays out of logs and span fields.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}
