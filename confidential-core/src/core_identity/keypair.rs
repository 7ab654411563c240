//! Keypair module
//!
//! Ed25519 key material for legal identities and confidential keys.
//!
//! Security: secret seeds are zeroized on drop and never appear in `Debug` output.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Ed25519 public key length in bytes
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 signature length in bytes
pub const SIGNATURE_LEN: usize = 64;

/// Errors raised when parsing key material
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Public key must be 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Not a valid Ed25519 point: {0}")]
    InvalidPoint(String),
}

/// Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    /// Parse and validate a public key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; PUBLIC_KEY_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::InvalidLength(bytes.len()))?;
        VerifyingKey::from_bytes(&array).map_err(|e| KeyError::InvalidPoint(e.to_string()))?;
        Ok(PublicKey(array))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Short hex prefix used in log lines
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Verify `signature` over `msg`
    ///
    /// Uses strict verification, so small-order keys and malleable signatures
    /// are rejected rather than accepted.
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> bool {
        let verifying_key = match VerifyingKey::from_bytes(&self.0) {
            Ok(vk) => vk,
            Err(_) => return false,
        };

        let sig = match ed25519_dalek::Signature::from_slice(&signature.0) {
            Ok(sig) => sig,
            Err(_) => return false,
        };

        verifying_key.verify_strict(msg, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Detached Ed25519 signature
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Signature(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.0[..self.0.len().min(8)]))
    }
}

/// Keypair holding a public key and its secret seed
/// Secret seed is zeroized on drop
#[derive(Clone)]
pub struct Keypair {
    public: PublicKey,
    secret: [u8; 32],
}

impl Keypair {
    /// Generate a new keypair from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut seed: [u8; 32] = rand::random();
        let keypair = Self::from_seed(&seed);
        seed.zeroize();
        keypair
    }

    /// Deterministic keypair from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Keypair {
            public: PublicKey(signing_key.verifying_key().to_bytes()),
            secret: signing_key.to_bytes(),
        }
    }

    /// Sign a message, returns a 64-byte signature
    pub fn sign(&self, msg: &[u8]) -> Signature {
        let signing_key = SigningKey::from_bytes(&self.secret);
        Signature(signing_key.sign(msg).to_bytes().to_vec())
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Drop for Keypair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}
