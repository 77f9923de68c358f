//! Per-recipient payload encryption.
//!
//! Private deliveries are encrypted for one recipient's public key. The
//! bundled [`SealedBoxCipher`] converts ed25519 keys to X25519 and seals with
//! XChaCha20-Poly1305 (`crypto_box`), using a fresh ephemeral sender key per
//! payload so the recipient only needs its own private key to open it.

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{SigningKey, VerifyingKey};
use federation_types::{PrivateKey, PublicKey};
use rand::rngs::OsRng;

use crate::error::{CryptoError, CryptoResult};
use crate::signer::Ed25519Scheme;

/// Nonce length for XChaCha20-Poly1305.
const NONCE_LEN: usize = 24;

/// An encrypted payload as carried inside a private delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    /// Base64 key material the recipient needs to open the payload.
    pub key: String,
    /// Base64 ciphertext.
    pub ciphertext: String,
}

/// Trait for encrypting payloads to a single recipient.
///
/// Implementations own the algorithm; callers only see encoded strings.
pub trait PayloadCipher: Send + Sync {
    /// Encrypts `plaintext` so that only the holder of `recipient`'s private key can read it.
    fn encrypt_for(&self, plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<EncryptedPayload>;

    /// Opens a payload previously produced by `encrypt_for`.
    fn decrypt(&self, payload: &EncryptedPayload, key: &PrivateKey) -> CryptoResult<Vec<u8>>;
}

/// X25519 sealed-box cipher over ed25519 keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedBoxCipher;

impl PayloadCipher for SealedBoxCipher {
    fn encrypt_for(&self, plaintext: &[u8], recipient: &PublicKey) -> CryptoResult<EncryptedPayload> {
        let recipient = Ed25519Scheme::verifying_key(recipient)?;
        let ephemeral = SigningKey::generate(&mut OsRng);

        let shared = shared_box(&ephemeral, &recipient);
        let mut buffer = plaintext.to_vec();
        seal_with_shared(&shared, &mut buffer)?;

        Ok(EncryptedPayload {
            key: STANDARD.encode(ephemeral.verifying_key().to_bytes()),
            ciphertext: STANDARD.encode(&buffer),
        })
    }

    fn decrypt(&self, payload: &EncryptedPayload, key: &PrivateKey) -> CryptoResult<Vec<u8>> {
        let own = Ed25519Scheme::signing_key(key)?;
        let ephemeral = Ed25519Scheme::verifying_key(&PublicKey::new(payload.key.clone()))?;

        let mut buffer = STANDARD
            .decode(&payload.ciphertext)
            .map_err(|e| CryptoError::Decryption(format!("invalid base64: {e}")))?;

        let shared = shared_box(&own, &ephemeral);
        open_with_shared(&shared, &mut buffer)?;
        Ok(buffer)
    }
}

/// Derive a shared box from an ed25519 secret key and an ed25519 public key.
fn shared_box(secret: &SigningKey, public: &VerifyingKey) -> crypto_box::ChaChaBox {
    let x25519_secret = crypto_box::SecretKey::from(secret.to_scalar());
    let x25519_public = crypto_box::PublicKey::from(public.to_montgomery());
    crypto_box::ChaChaBox::new(&x25519_public, &x25519_secret)
}

/// Encrypt in-place, appending nonce to buffer.
fn seal_with_shared(shared: &crypto_box::ChaChaBox, buffer: &mut Vec<u8>) -> CryptoResult<()> {
    use crypto_box::aead::{AeadCore, AeadInPlace, OsRng};

    let nonce = crypto_box::ChaChaBox::generate_nonce(&mut OsRng);
    shared
        .encrypt_in_place(&nonce, &[], buffer)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    buffer.extend_from_slice(&nonce);
    Ok(())
}

/// Decrypt in-place, reading nonce from end of buffer.
fn open_with_shared(shared: &crypto_box::ChaChaBox, buffer: &mut Vec<u8>) -> CryptoResult<()> {
    use crypto_box::aead::AeadInPlace;

    if buffer.len() < NONCE_LEN {
        return Err(CryptoError::Decryption("data too short".to_string()));
    }

    let offset = buffer.len() - NONCE_LEN;
    let nonce: [u8; NONCE_LEN] = buffer[offset..]
        .try_into()
        .map_err(|_| CryptoError::Decryption("invalid nonce".to_string()))?;

    buffer.truncate(offset);
    shared
        .decrypt_in_place(&nonce.into(), &[], buffer)
        .map_err(|_| CryptoError::Decryption("wrong key or tampered data".to_string()))
}

/// No-op cipher for tests and trusted channels.
/// The payload is only base64 encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCipher;

impl PayloadCipher for PassthroughCipher {
    fn encrypt_for(&self, plaintext: &[u8], _recipient: &PublicKey) -> CryptoResult<EncryptedPayload> {
        Ok(EncryptedPayload {
            key: String::new(),
            ciphertext: STANDARD.encode(plaintext),
        })
    }

    fn decrypt(&self, payload: &EncryptedPayload, _key: &PrivateKey) -> CryptoResult<Vec<u8>> {
        STANDARD
            .decode(&payload.ciphertext)
            .map_err(|e| CryptoError::Decryption(format!("invalid base64: {e}")))
    }
}
