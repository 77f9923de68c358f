//! reqwest-backed delivery transport.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use federation_crypto::{AuthToken, SignableRequest};
use federation_protocols::{FederationError, FederationResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE, DATE, HOST};
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::config::HttpTransportConfig;
use crate::transport::DeliveryTransport;

/// `Date` header format (RFC 7231 IMF-fixdate).
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Delivers documents over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with its own connection pool.
    pub fn new(config: HttpTransportConfig) -> FederationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                FederationError::delivery("<client>", format!("failed to create HTTP client: {e}"))
            })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

/// `host[:port]` and `path[?query]` of a request URL.
fn request_target(url: &Url) -> FederationResult<(String, String)> {
    let host = url
        .host_str()
        .ok_or_else(|| FederationError::delivery(url.as_str(), "URL has no host"))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let path = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    };
    Ok((host, path))
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn send_document(
        &self,
        url: &str,
        body: &[u8],
        content_type: &str,
        auth: Option<&AuthToken>,
    ) -> FederationResult<()> {
        let parsed = Url::parse(url).map_err(|e| FederationError::delivery(url, e))?;
        let mut request = self
            .client
            .post(parsed.clone())
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec());

        if let Some(auth) = auth {
            let (host, path) = request_target(&parsed)?;
            let date = Utc::now().format(HTTP_DATE_FORMAT).to_string();
            let digest = AuthToken::digest(body);
            let signature = auth
                .signature_header(&SignableRequest {
                    method: "post",
                    path: &path,
                    host: &host,
                    date: &date,
                    digest: &digest,
                })
                .map_err(|e| FederationError::delivery(url, e))?;
            request = request
                .header(HOST, host)
                .header(DATE, date)
                .header("Digest", digest)
                .header("Signature", signature);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FederationError::delivery(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(FederationError::delivery(
                url,
                format!("{status}: {}", error.trim()),
            ));
        }
        debug!(url, %status, bytes = body.len(), "document delivered");
        Ok(())
    }

    async fn fetch_document(&self, url: &str, accept: &str) -> FederationResult<Option<Vec<u8>>> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| FederationError::delivery(url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            debug!(url, %status, "remote document not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FederationError::delivery(url, format!("fetch returned {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FederationError::delivery(url, format!("failed to read body: {e}")))?;
        Ok(Some(body.to_vec()))
    }
}
