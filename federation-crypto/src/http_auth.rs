//! Transport-layer HTTP signatures.
//!
//! The dispatcher attaches an [`AuthToken`] to activity-protocol delivery jobs.
//! The token holds the signing key and key id; the transport asks it for a
//! `Signature` header once the request line, host, date and body digest are
//! known.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use federation_types::PrivateKey;
use sha2::{Digest, Sha256};

use crate::error::CryptoResult;
use crate::signer::SignatureScheme;

/// Headers covered by the signature, in signing order.
pub const SIGNED_HEADERS: &str = "(request-target) host date digest";

/// The parts of an HTTP request that get signed.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    /// Lowercase HTTP method.
    pub method: &'a str,
    /// Path plus query string.
    pub path: &'a str,
    pub host: &'a str,
    /// RFC 7231 date, as sent in the `Date` header.
    pub date: &'a str,
    /// Value of the `Digest` header.
    pub digest: &'a str,
}

impl SignableRequest<'_> {
    /// The newline-joined signing string.
    #[must_use]
    pub fn signing_string(&self) -> String {
        format!(
            "(request-target): {} {}\nhost: {}\ndate: {}\ndigest: {}",
            self.method.to_ascii_lowercase(),
            self.path,
            self.host,
            self.date,
            self.digest
        )
    }
}

/// A deferred HTTP signature for one sending identity.
#[derive(Clone)]
pub struct AuthToken {
    key_id: String,
    private_key: PrivateKey,
    scheme: Arc<dyn SignatureScheme>,
}

impl AuthToken {
    /// The key id remote servers resolve to verify the signature.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Algorithm of the underlying scheme.
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        self.scheme.algorithm()
    }

    /// `Digest` header value for a request body.
    #[must_use]
    pub fn digest(body: &[u8]) -> String {
        format!("SHA-256={}", STANDARD.encode(Sha256::digest(body)))
    }

    /// Builds the `Signature` header value for `request`.
    pub fn signature_header(&self, request: &SignableRequest<'_>) -> CryptoResult<String> {
        let signature = self
            .scheme
            .sign(request.signing_string().as_bytes(), &self.private_key)?;
        Ok(format!(
            "keyId=\"{}\",algorithm=\"hs2019\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            SIGNED_HEADERS,
            STANDARD.encode(signature)
        ))
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("key_id", &self.key_id)
            .field("algorithm", &self.scheme.algorithm())
            .finish()
    }
}

/// Builds an authentication token for `key_id`, signed with `private_key`.
pub fn build_http_auth(
    scheme: Arc<dyn SignatureScheme>,
    private_key: &PrivateKey,
    key_id: impl Into<String>,
) -> AuthToken {
    AuthToken {
        key_id: key_id.into(),
        private_key: private_key.clone(),
        scheme,
    }
}
