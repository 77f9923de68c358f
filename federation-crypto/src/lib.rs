//! Signature and encryption contracts for the federation layer.
//!
//! Protocol adapters never touch raw cryptography. They depend on:
//! - [`SignatureScheme`]: `sign(bytes, key)` / `verify(bytes, sig, key)`
//! - [`PayloadCipher`]: per-recipient encryption of private payloads
//! - [`AuthToken`]: a transport-layer HTTP signature built at send time
//!
//! Default implementations ship for end-to-end use: [`Ed25519Scheme`] and
//! [`SealedBoxCipher`] (X25519 + XChaCha20-Poly1305 derived from ed25519 keys).
//! Hosts with other key types (e.g. RSA) plug in their own implementations.

mod cipher;
mod error;
mod http_auth;
mod signer;

pub use cipher::{EncryptedPayload, PassthroughCipher, PayloadCipher, SealedBoxCipher};
pub use error::{CryptoError, CryptoResult};
pub use http_auth::{build_http_auth, AuthToken, SignableRequest, SIGNED_HEADERS};
pub use signer::{generate_keypair, Ed25519Scheme, SignatureScheme, ED25519_ALGORITHM};
