//! HTTP transport for the report endpoint.
//!
//! A non-2xx status is returned as a response; only request-level failures
//! become [`TransportError`]. Certificate validation failures get one retry
//! through a client with verification disabled, when the fallback is enabled.
//!
//! [`FallbackTransport`] holds the strict/insecure decision over any
//! [`HttpSend`] pair; [`ReqwestTransport`] is that transport over two
//! `reqwest` clients.

use async_trait::async_trait;
use reqwest::Client;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TransportError;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifying header value; the endpoint rejects some bare clients.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Message fragments for certificate failures whose source is not a typed
/// `rustls::Error`.
const CERTIFICATE_MARKERS: &[&str] = &["certificate", "received fatal alert"];

/// One GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Request transport seam; tests substitute a scripted implementation.
#[async_trait]
pub trait RequestTransport: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError>;
}

/// Client construction options.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub user_agent: String,
    /// Retry once without certificate verification after a certificate failure.
    pub allow_insecure_fallback: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_insecure_fallback: true,
        }
    }
}

/// One HTTP round trip on a concrete client.
#[async_trait]
pub trait HttpSend: Send + Sync {
    type Error: StdError + Send + Sync + 'static + Into<TransportError>;

    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, Self::Error>;
}

#[async_trait]
impl HttpSend for Client {
    type Error = reqwest::Error;

    async fn send(&self, request: &FetchRequest) -> Result<FetchResponse, reqwest::Error> {
        let mut builder = self
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(FetchResponse { status, body })
    }
}

/// Strict sender first, then at most one insecure retry per request after a
/// certificate failure.
#[derive(Debug)]
pub struct FallbackTransport<S> {
    strict: S,
    insecure: Option<S>,
    insecure_fallback_used: AtomicBool,
    insecure_requests: AtomicU64,
}

/// reqwest/rustls transport with the certificate fallback.
pub type ReqwestTransport = FallbackTransport<Client>;

impl FallbackTransport<Client> {
    pub fn new(options: TransportOptions) -> Result<Self, TransportError> {
        let strict = Client::builder().user_agent(&options.user_agent).build()?;

        let insecure = if options.allow_insecure_fallback {
            Some(
                Client::builder()
                    .user_agent(&options.user_agent)
                    .danger_accept_invalid_certs(true)
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self::with_senders(strict, insecure))
    }
}

impl<S: HttpSend> FallbackTransport<S> {
    /// `insecure` is `None` when the fallback is disabled.
    pub fn with_senders(strict: S, insecure: Option<S>) -> Self {
        Self {
            strict,
            insecure,
            insecure_fallback_used: AtomicBool::new(false),
            insecure_requests: AtomicU64::new(0),
        }
    }

    pub fn has_insecure_fallback(&self) -> bool {
        self.insecure.is_some()
    }

    /// Whether any request on this transport has gone through the
    /// verification-disabled sender.
    pub fn insecure_fallback_used(&self) -> bool {
        self.insecure_fallback_used.load(Ordering::Relaxed)
    }

    /// Requests sent through the verification-disabled sender.
    pub fn insecure_request_count(&self) -> u64 {
        self.insecure_requests.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<S: HttpSend> RequestTransport for FallbackTransport<S> {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, TransportError> {
        let err = match self.strict.send(request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        let insecure = match &self.insecure {
            Some(sender) if is_certificate_error(&err) => sender,
            _ => return Err(err.into()),
        };

        // Warn on first use only.
        if !self.insecure_fallback_used.swap(true, Ordering::Relaxed) {
            warn!(
                url = %request.url,
                error = %err,
                "Certificate validation failed, retrying without verification"
            );
        } else {
            debug!(url = %request.url, "Insecure fallback request");
        }
        self.insecure_requests.fetch_add(1, Ordering::Relaxed);

        insecure.send(request).await.map_err(Into::into)
    }
}

/// Walk an error chain looking for a TLS/certificate validation failure.
pub(crate) fn is_certificate_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if is_rustls_certificate_error(e) {
            return true;
        }
        let message = e.to_string().to_ascii_lowercase();
        if CERTIFICATE_MARKERS.iter().any(|m| message.contains(m)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// Typed check. `io::Error::source` skips its payload, so wrapped errors are
/// inspected through `get_ref`.
fn is_rustls_certificate_error(err: &(dyn StdError + 'static)) -> bool {
    if let Some(tls) = err.downcast_ref::<rustls::Error>() {
        return matches!(
            tls,
            rustls::Error::InvalidCertificate(_) | rustls::Error::AlertReceived(_)
        );
    }
    match err.downcast_ref::<std::io::Error>().and_then(|io| io.get_ref()) {
        Some(inner) => is_rustls_certificate_error(inner),
        None => false,
    }
}
