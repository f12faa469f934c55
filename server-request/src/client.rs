//! HTTPS client service.

use std::{io, pin::pin, time::Duration};

use actix_rt::{net::TcpStream, time::timeout};
use actix_service::Service;
use actix_tls::connect::{
    rustls_0_23::{reexports::AsyncTlsStream, TlsConnector},
    ConnectError, ConnectInfo, Connection, ConnectorService,
};
use bytes::Bytes;
use futures_core::future::LocalBoxFuture;
use http::{
    header::{CONNECTION, HOST},
    Request,
};
use http_body_util::{BodyExt as _, Full, LengthLimitError, Limited};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tracing::trace;

use crate::{
    error::hyper_into_io, tls, tunnel::tunnel, AttemptError, HttpsRequest, HttpsResponse,
};

/// HTTPS client performing one request per call.
///
/// Connects to the request's target directly, or through its HTTP proxy using `CONNECT`, then
/// performs the TLS handshake and a single HTTP/1.1 exchange over a `hyper` client connection.
/// Setting the request's cancellation token aborts the call at any point.
///
/// # Examples
/// ```no_run
/// use actix_service::Service as _;
/// use server_request::{HttpsClient, HttpsRequest};
///
/// # async fn run() -> Result<(), server_request::AttemptError> {
/// let client = HttpsClient::default();
/// let res = client.call(HttpsRequest::new("example.com", 443, "/")).await?;
/// println!("{}", res.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpsClient {
    connector: ConnectorService,
    connect_timeout: Duration,
    response_timeout: Duration,
    max_response_size: usize,
}

impl Default for HttpsClient {
    fn default() -> Self {
        Self {
            connector: ConnectorService::default(),
            connect_timeout: Duration::from_secs(20),
            response_timeout: Duration::from_secs(30),
            max_response_size: 4 * 1024 * 1024,
        }
    }
}

impl HttpsClient {
    /// Set time allowed to establish TCP, proxy tunnel, and TLS.
    ///
    /// By default 20 seconds.
    pub fn connect_timeout(mut self, dur: Duration) -> Self {
        self.connect_timeout = dur;
        self
    }

    /// Set time allowed for the request/response exchange once connected.
    ///
    /// By default 30 seconds.
    pub fn response_timeout(mut self, dur: Duration) -> Self {
        self.response_timeout = dur;
        self
    }

    /// Set maximum accepted response body size, in bytes.
    ///
    /// By default 4 MiB.
    pub fn max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    async fn send(self, req: HttpsRequest) -> Result<HttpsResponse, AttemptError> {
        let cancel = req.cancel().clone();

        if cancel.is_cancelled() {
            return Err(AttemptError::Canceled);
        }

        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AttemptError::Canceled),
            res = timeout(self.connect_timeout, self.establish(&req)) => {
                res.map_err(|_| AttemptError::ConnectTimeout)??
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptError::Canceled),
            res = timeout(self.response_timeout, self.exchange(stream, &req)) => {
                res.map_err(|_| AttemptError::ResponseTimeout)?
            }
        }
    }

    async fn establish(
        &self,
        req: &HttpsRequest,
    ) -> Result<AsyncTlsStream<TcpStream>, AttemptError> {
        let info = match req.proxy() {
            Some(proxy) => ConnectInfo::with_addr(req.host().to_owned(), proxy),
            None => ConnectInfo::new(req.host().to_owned()).set_port(req.port()),
        };

        trace!("TCP connect start for: {}", info);
        let (io, host) = self
            .connector
            .call(info)
            .await
            .map_err(|err| AttemptError::Connect(connect_error_into_io(err)))?
            .into_parts();

        let io = match req.proxy() {
            Some(_) => tunnel(io, &req.authority())
                .await
                .map_err(AttemptError::Proxy)?,
            None => io,
        };

        let config = tls::client_config(req.certificate()).map_err(AttemptError::Tls)?;
        let (stream, _) = TlsConnector::service(config)
            .call(Connection::new(host, io))
            .await
            .map_err(AttemptError::Tls)?
            .into_parts();

        Ok(stream)
    }

    async fn exchange(
        &self,
        stream: AsyncTlsStream<TcpStream>,
        req: &HttpsRequest,
    ) -> Result<HttpsResponse, AttemptError> {
        let request = http_request(req)?;

        let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(stream))
            .await
            .map_err(response_error)?;

        let exchange = async {
            let res = sender.send_request(request).await.map_err(response_error)?;
            let (head, body) = res.into_parts();

            trace!("response status {} for: {}", head.status, req);

            if !head.status.is_success() {
                return Err(AttemptError::Status(head.status));
            }

            let body = Limited::new(body, self.max_response_size)
                .collect()
                .await
                .map_err(body_error)?
                .to_bytes();

            Ok(HttpsResponse::new(head.status, head.headers, body))
        };

        let mut exchange = pin!(exchange);
        let mut conn = pin!(conn);

        tokio::select! {
            res = &mut exchange => res,

            // connection may wind down before the last body frame is taken
            done = &mut conn => {
                if let Err(err) = done {
                    trace!("connection closed with error: {}", err);
                }
                exchange.await
            }
        }
    }
}

impl Service<HttpsRequest> for HttpsClient {
    type Response = HttpsResponse;
    type Error = AttemptError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::always_ready!();

    fn call(&self, req: HttpsRequest) -> Self::Future {
        Box::pin(self.clone().send(req))
    }
}

fn http_request(req: &HttpsRequest) -> Result<Request<Full<Bytes>>, AttemptError> {
    let path = if req.path().is_empty() { "/" } else { req.path() };

    let mut builder = Request::builder()
        .method(req.method())
        .uri(path)
        .header(HOST, req.host_header())
        .header(CONNECTION, "close");

    if let Some(headers) = builder.headers_mut() {
        headers.extend(req.headers().clone());
    }

    builder
        .body(Full::new(req.body().cloned().unwrap_or_default()))
        .map_err(|err| AttemptError::Io(io::Error::new(io::ErrorKind::InvalidInput, err)))
}

fn response_error(err: hyper::Error) -> AttemptError {
    let err = hyper_into_io(err);

    if err.kind() == io::ErrorKind::InvalidData {
        AttemptError::InvalidResponse(err)
    } else {
        AttemptError::Io(err)
    }
}

fn body_error(err: Box<dyn std::error::Error + Send + Sync>) -> AttemptError {
    if err.is::<LengthLimitError>() {
        return AttemptError::InvalidResponse(io::Error::new(io::ErrorKind::InvalidData, err));
    }

    match err.downcast::<hyper::Error>() {
        Ok(err) => response_error(*err),
        Err(err) => AttemptError::Io(io::Error::other(err)),
    }
}

fn connect_error_into_io(err: ConnectError) -> io::Error {
    match err {
        ConnectError::Io(err) => err,
        err => io::Error::new(io::ErrorKind::NotConnected, err.to_string()),
    }
}
