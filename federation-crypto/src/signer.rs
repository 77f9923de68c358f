//! Signing and verification.
//!
//! [`SignatureScheme`] is the contract protocol adapters sign through.
//! [`Ed25519Scheme`] is the bundled implementation; public keys travel as
//! standard base64 of the 32-byte verifying key.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{
    Signature as DalekSignature, Signer as _, SigningKey as DalekSigningKey, Verifier as _,
    VerifyingKey as DalekVerifyingKey,
};
use federation_types::{PrivateKey, PublicKey};
use rand::rngs::OsRng;

use crate::error::{CryptoError, CryptoResult};

/// Wire name of the bundled algorithm.
pub const ED25519_ALGORITHM: &str = "Ed25519";

const SECRET_KEY_SIZE: usize = 32;

/// Abstract signing capability consumed by protocol adapters.
pub trait SignatureScheme: Send + Sync {
    /// Algorithm name as written into envelopes and signature blocks.
    fn algorithm(&self) -> &'static str;

    /// Signs `data` with `key`.
    fn sign(&self, data: &[u8], key: &PrivateKey) -> CryptoResult<Vec<u8>>;

    /// Checks `signature` over `data` against `key`.
    ///
    /// Undecodable keys or signatures verify as `false`.
    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool;
}

/// Ed25519 signatures via `ed25519-dalek`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Scheme;

impl Ed25519Scheme {
    /// Decodes a signing key from raw secret bytes.
    pub fn signing_key(key: &PrivateKey) -> CryptoResult<DalekSigningKey> {
        let bytes: [u8; SECRET_KEY_SIZE] =
            key.as_bytes()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SECRET_KEY_SIZE,
                    actual: key.as_bytes().len(),
                })?;
        Ok(DalekSigningKey::from_bytes(&bytes))
    }

    /// Decodes a verifying key from its base64 wire form.
    pub fn verifying_key(key: &PublicKey) -> CryptoResult<DalekVerifyingKey> {
        let bytes = STANDARD
            .decode(key.as_str().trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid base64: {e}")))?;
        let bytes: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        DalekVerifyingKey::from_bytes(&bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))
    }

    /// Encodes a verifying key into its base64 wire form.
    pub fn encode_public(key: &DalekVerifyingKey) -> PublicKey {
        PublicKey::new(STANDARD.encode(key.to_bytes()))
    }

    /// Derives the public key that pairs with `key`.
    pub fn public_key(key: &PrivateKey) -> CryptoResult<PublicKey> {
        Ok(Self::encode_public(&Self::signing_key(key)?.verifying_key()))
    }
}

impl SignatureScheme for Ed25519Scheme {
    fn algorithm(&self) -> &'static str {
        ED25519_ALGORITHM
    }

    fn sign(&self, data: &[u8], key: &PrivateKey) -> CryptoResult<Vec<u8>> {
        let signing = Self::signing_key(key)?;
        Ok(signing.sign(data).to_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8], key: &PublicKey) -> bool {
        let Ok(verifying) = Self::verifying_key(key) else {
            return false;
        };
        let Ok(signature) = DalekSignature::from_slice(signature) else {
            return false;
        };
        verifying.verify(data, &signature).is_ok()
    }
}

/// Generates a new random Ed25519 keypair in wire form.
pub fn generate_keypair() -> (PrivateKey, PublicKey) {
    let signing = DalekSigningKey::generate(&mut OsRng);
    let public = Ed25519Scheme::encode_public(&signing.verifying_key());
    (PrivateKey::from_bytes(signing.to_bytes().to_vec()), public)
}
