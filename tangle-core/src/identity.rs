//! Replica identity and signing keys
//!
//! Each writing replica holds an Ed25519 keypair:
//! - Private key: stored locally in a key file (never replicated)
//! - Public key: identifies the writer in entry credentials (32 bytes)

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tangle_model::{PubKey, Signature};
use thiserror::Error;

/// Errors that can occur during identity operations
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("Bytes are not a valid Ed25519 public key")]
    MalformedKey,

    #[error("Invalid signature")]
    InvalidSignature,
}

/// A replica's signing identity.
///
/// Signs entry content on append; the matching public key travels with
/// each signed entry so any peer can verify it.
#[derive(Clone)]
pub struct ReplicaIdentity {
    signing_key: SigningKey,
}

// Show only the public half; the private key never reaches logs
impl std::fmt::Debug for ReplicaIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaIdentity")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl ReplicaIdentity {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Wrap an existing signing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Load an identity from a key file, generating and saving one if the
    /// file does not exist yet.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let identity = Self::generate();
            identity.save(path)?;
            Ok(identity)
        }
    }

    /// Load an identity from a key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        use zeroize::Zeroizing;

        // Keep the raw key material zeroized once dropped
        let bytes = Zeroizing::new(fs::read(path)?);
        if bytes.len() != 32 {
            return Err(IdentityError::InvalidKeyLength(bytes.len()));
        }

        let mut key_bytes = Zeroizing::new([0u8; 32]);
        key_bytes.copy_from_slice(&bytes);

        let signing_key = SigningKey::from_bytes(&key_bytes);
        Ok(Self { signing_key })
    }

    /// Save the private key to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IdentityError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(self.signing_key.as_bytes())?;
        Ok(())
    }

    /// The public half of the keypair.
    pub fn public_key(&self) -> PubKey {
        PubKey::from(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature::from(self.signing_key.sign(message).to_bytes())
    }

    /// Verify a signature against an arbitrary public key.
    pub fn verify_with_key(
        key: &PubKey,
        message: &[u8],
        signature: &Signature,
    ) -> Result<(), IdentityError> {
        let verifying_key =
            VerifyingKey::from_bytes(key.as_bytes()).map_err(|_| IdentityError::MalformedKey)?;
        let signature = DalekSignature::from_bytes(signature.as_bytes());
        verifying_key
            .verify(message, &signature)
            .map_err(|_| IdentityError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let identity = ReplicaIdentity::generate();
        let sig = identity.sign(b"hello");
        ReplicaIdentity::verify_with_key(&identity.public_key(), b"hello", &sig)
            .expect("signature should verify");
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let identity = ReplicaIdentity::generate();
        let sig = identity.sign(b"hello");
        let err = ReplicaIdentity::verify_with_key(&identity.public_key(), b"goodbye", &sig)
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidSignature));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let identity = ReplicaIdentity::generate();
        let other = ReplicaIdentity::generate();
        let sig = identity.sign(b"hello");
        assert!(ReplicaIdentity::verify_with_key(&other.public_key(), b"hello", &sig).is_err());
    }

    #[test]
    fn load_or_generate_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.key");

        let first = ReplicaIdentity::load_or_generate(&path).unwrap();
        let second = ReplicaIdentity::load_or_generate(&path).unwrap();
        assert_eq!(first.public_key(), second.public_key());
    }

    #[test]
    fn load_rejects_short_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.key");
        fs::write(&path, [0u8; 16]).unwrap();

        let err = ReplicaIdentity::load(&path).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidKeyLength(16)));
    }
}
