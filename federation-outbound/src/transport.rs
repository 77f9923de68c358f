//! Delivery transport abstraction.
//!
//! The dispatcher and fetcher never open connections themselves. They hand
//! finished bytes to a [`DeliveryTransport`], which owns timeouts, connection
//! pooling and request signing.

use async_trait::async_trait;
use federation_crypto::AuthToken;
use federation_protocols::FederationResult;

/// Sends and fetches documents over the network.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// POSTs `body` to `url`.
    ///
    /// With `auth`, the request carries an HTTP signature made by that token.
    /// Any failure, including a non-success status, is a `Delivery` error
    /// naming `url`.
    async fn send_document(
        &self,
        url: &str,
        body: &[u8],
        content_type: &str,
        auth: Option<&AuthToken>,
    ) -> FederationResult<()>;

    /// GETs `url`, returning `None` when the document does not exist.
    async fn fetch_document(&self, url: &str, accept: &str) -> FederationResult<Option<Vec<u8>>>;
}

/// A recording transport for testing.
pub mod mock {
    use super::*;
    use federation_protocols::FederationError;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    /// One recorded `send_document` call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentDocument {
        pub url: String,
        pub body: Vec<u8>,
        pub content_type: String,
        /// Key id of the auth token, if one was attached.
        pub key_id: Option<String>,
    }

    /// Records every send and serves canned fetch responses.
    ///
    /// Clones share state, so a test can keep one handle while the
    /// dispatcher owns another.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingTransport {
        sent: Arc<Mutex<Vec<SentDocument>>>,
        failing: Arc<Mutex<HashSet<String>>>,
        documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        fetched: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingTransport {
        /// Creates an empty transport.
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes every send to and fetch of `url` fail.
        pub fn fail_url(&self, url: impl Into<String>) {
            self.failing.lock().unwrap().insert(url.into());
        }

        /// Serves `body` for fetches of `url`.
        pub fn serve(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
            self.documents
                .lock()
                .unwrap()
                .insert(url.into(), body.into());
        }

        /// Every successful send, in completion order.
        pub fn sent(&self) -> Vec<SentDocument> {
            self.sent.lock().unwrap().clone()
        }

        /// Successful sends to `url`.
        pub fn sent_to(&self, url: &str) -> Vec<SentDocument> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.url == url)
                .cloned()
                .collect()
        }

        /// Every fetched URL, in call order.
        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeliveryTransport for RecordingTransport {
        async fn send_document(
            &self,
            url: &str,
            body: &[u8],
            content_type: &str,
            auth: Option<&AuthToken>,
        ) -> FederationResult<()> {
            if self.failing.lock().unwrap().contains(url) {
                return Err(FederationError::delivery(url, "connection refused"));
            }
            self.sent.lock().unwrap().push(SentDocument {
                url: url.to_string(),
                body: body.to_vec(),
                content_type: content_type.to_string(),
                key_id: auth.map(|a| a.key_id().to_string()),
            });
            Ok(())
        }

        async fn fetch_document(
            &self,
            url: &str,
            _accept: &str,
        ) -> FederationResult<Option<Vec<u8>>> {
            self.fetched.lock().unwrap().push(url.to_string());
            if self.failing.lock().unwrap().contains(url) {
                return Err(FederationError::delivery(url, "connection refused"));
            }
            Ok(self.documents.lock().unwrap().get(url).cloned())
        }
    }
}
