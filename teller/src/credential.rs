//! Credential service seam.
//!
//! One-way hashing and verification for PIN material. The ledger core
//! never compares secrets in plaintext; the bundled salted SHA-256
//! implementation stands in for the external service behind the trait.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use corebank_common::PinHash;

/// External collaborator providing one-way hashing of secret material.
pub trait CredentialService: Send + Sync {
    /// Hash a secret into an opaque credential.
    fn hash(&self, secret: &str) -> PinHash;

    /// Check a secret against a stored credential.
    fn verify(&self, secret: &str, credential: &PinHash) -> bool;
}

/// Salted SHA-256 credentials, stored as `salt$digest` hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaltedSha256Credentials;

impl SaltedSha256Credentials {
    fn digest_hex(salt_hex: &str, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt_hex.as_bytes());
        hasher.update(secret.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl CredentialService for SaltedSha256Credentials {
    fn hash(&self, secret: &str) -> PinHash {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let salt_hex: String = salt.iter().map(|b| format!("{:02x}", b)).collect();
        let digest = Self::digest_hex(&salt_hex, secret);
        PinHash::new(format!("{salt_hex}${digest}"))
    }

    fn verify(&self, secret: &str, credential: &PinHash) -> bool {
        let Some((salt_hex, digest)) = credential.as_str().split_once('$') else {
            return false;
        };
        Self::digest_hex(salt_hex, secret) == digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verifies_original_secret() {
        let service = SaltedSha256Credentials;
        let credential = service.hash("482913");
        assert!(service.verify("482913", &credential));
        assert!(!service.verify("482914", &credential));
    }

    #[test]
    fn test_hash_is_salted() {
        let service = SaltedSha256Credentials;
        let first = service.hash("482913");
        let second = service.hash("482913");
        assert_ne!(first, second);
    }

    #[test]
    fn test_hash_never_contains_plaintext() {
        let service = SaltedSha256Credentials;
        let credential = service.hash("482913");
        assert!(!credential.as_str().contains("482913"));
    }

    #[test]
    fn test_malformed_credential_never_verifies() {
        let service = SaltedSha256Credentials;
        assert!(!service.verify("482913", &PinHash::new("no-separator")));
    }
}
