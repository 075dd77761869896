//! HTTPS transport for the calls that do not go through the Gmail hub
//! (token revocation and the ranking endpoint)

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request, StatusCode};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use crate::error::{PriorityError, Result};

/// Install the process-wide rustls crypto provider
///
/// Several dependencies pull in different providers, so the default must be
/// chosen explicitly. Installing twice is harmless.
pub fn install_crypto_provider() {
    #[cfg(not(windows))]
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    #[cfg(windows)]
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Build the TLS connector shared by every outbound client
pub fn https_connector() -> Result<HttpsConnector<HttpConnector>> {
    install_crypto_provider();
    Ok(hyper_rustls::HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(|e| PriorityError::TransportError(format!("Failed to load TLS roots: {}", e)))?
        .https_or_http()
        .enable_http1()
        .build())
}

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal POST-only client with a per-request timeout
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder(TokioExecutor::new()).build(https_connector()?);
        Ok(Self { client, timeout })
    }

    /// POST an `application/x-www-form-urlencoded` body
    pub async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.post(url, "application/x-www-form-urlencoded", None, body.into_bytes())
            .await
    }

    /// POST a JSON body, optionally with a bearer credential
    pub async fn post_json<T: serde::Serialize>(
        &self,
        url: &str,
        bearer: Option<&str>,
        payload: &T,
    ) -> Result<HttpResponse> {
        let body = serde_json::to_vec(payload)?;
        self.post(url, "application/json", bearer, body).await
    }

    async fn post(
        &self,
        url: &str,
        content_type: &str,
        bearer: Option<&str>,
        body: Vec<u8>,
    ) -> Result<HttpResponse> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(url)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = builder
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| PriorityError::TransportError(format!("Invalid request to {}: {}", url, e)))?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| PriorityError::TransportError(format!("Failed to read body: {}", e)))?
                .to_bytes();
            Ok::<_, PriorityError>(HttpResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => {
                let response = result?;
                tracing::debug!("POST {} -> {}", url, response.status);
                Ok(response)
            }
            Err(_) => {
                tracing::warn!("POST {} timed out after {:?}", url, self.timeout);
                Err(PriorityError::Timeout {
                    operation: format!("POST {}", url),
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
