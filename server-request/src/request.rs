//! Request and response types shared by the dispatcher and HTTPS clients.

use std::{borrow::Cow, fmt, net::SocketAddr};

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tokio_util::sync::CancellationToken;

/// Caller supplied parts of a dispatched request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub(crate) use_local_proxy: bool,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_local_proxy: true,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    /// Set whether requests over a connected transport go through its local proxy.
    ///
    /// Enabled by default. Has no effect when no transport is connected.
    pub fn use_local_proxy(mut self, enabled: bool) -> Self {
        self.use_local_proxy = enabled;
        self
    }

    /// Set additional request headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set request body. A request with a body is sent as `POST`.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// One HTTPS request over one path.
///
/// Targets `host:port`, optionally tunneled through an HTTP proxy.
#[derive(Clone)]
pub struct HttpsRequest {
    host: String,
    port: u16,
    path: String,
    proxy: Option<SocketAddr>,
    headers: HeaderMap,
    body: Option<Bytes>,
    certificate: Option<Vec<u8>>,
    cancel: CancellationToken,
}

impl HttpsRequest {
    /// Constructs a `GET` request for `path` on `host:port`.
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
            proxy: None,
            headers: HeaderMap::new(),
            body: None,
            certificate: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set HTTP proxy to tunnel through.
    pub fn set_proxy(mut self, proxy: impl Into<Option<SocketAddr>>) -> Self {
        self.proxy = proxy.into();
        self
    }

    /// Set additional headers.
    pub fn set_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set request body.
    pub fn set_body(mut self, body: impl Into<Option<Bytes>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set DER encoded certificate the server must present.
    pub fn set_certificate(mut self, der: impl Into<Option<Vec<u8>>>) -> Self {
        self.certificate = der.into();
        self
    }

    /// Set cancellation token observed while the request is in flight.
    pub fn set_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns target hostname.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns proxy address, if tunneled.
    pub fn proxy(&self) -> Option<SocketAddr> {
        self.proxy
    }

    /// Returns additional headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns request body.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns pinned server certificate.
    pub fn certificate(&self) -> Option<&[u8]> {
        self.certificate.as_deref()
    }

    /// Returns cancellation token.
    pub fn cancel(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.bracketed_host(), self.port)
    }

    /// Returns value of the `Host` header; the port is omitted when it is 443.
    pub(crate) fn host_header(&self) -> String {
        if self.port == 443 {
            self.bracketed_host().into_owned()
        } else {
            self.authority()
        }
    }

    fn bracketed_host(&self) -> Cow<'_, str> {
        if self.host.contains(':') && !self.host.starts_with('[') {
            Cow::Owned(format!("[{}]", self.host))
        } else {
            Cow::Borrowed(&self.host)
        }
    }

    /// Returns request method; `POST` when a body is present.
    pub fn method(&self) -> Method {
        if self.body.is_some() {
            Method::POST
        } else {
            Method::GET
        }
    }
}

impl fmt::Debug for HttpsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpsRequest")
            .field("method", &self.method())
            .field("host", &self.host)
            .field("port", &self.port)
            .field("path", &self.path)
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for HttpsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "https://{}{}", self.authority(), self.path)?;

        if let Some(proxy) = self.proxy {
            write!(f, " via {}", proxy)?;
        }

        Ok(())
    }
}

/// Successful HTTPS response.
#[derive(Debug, Clone)]
pub struct HttpsResponse {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl HttpsResponse {
    /// Constructs a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Returns response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Takes response body.
    pub fn into_body(self) -> Bytes {
        self.body
    }
}
