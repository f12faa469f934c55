use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use actix_rt::net::TcpStream;
use actix_server::TestServer;
use actix_service::{fn_service, Service as _, ServiceFactory};
use http::StatusCode;
use rcgen::CertifiedKey;
use server_request::{
    AttemptError, AttemptKind, CancellationToken, DispatchConfig, HttpsClient, HttpsRequest,
    RequestOptions, ServerRequest, SessionInfo, TransportRegistry,
};
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWriteExt as _};
use tokio_rustls::{
    rustls::{
        crypto::ring,
        pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer},
        ServerConfig,
    },
    TlsAcceptor,
};

fn tls_acceptor() -> (TlsAcceptor, Vec<u8>) {
    let CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_owned(), "localhost".to_owned()])
            .unwrap();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.der().clone()], key)
        .unwrap();

    (TlsAcceptor::from(Arc::new(config)), cert.der().to_vec())
}

fn other_certificate() -> Vec<u8> {
    rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_owned()])
        .unwrap()
        .cert
        .der()
        .to_vec()
}

/// Reads a request head byte by byte so nothing past it is consumed.
async fn read_head<IO: AsyncRead + Unpin>(io: &mut IO) -> io::Result<String> {
    let mut buf = Vec::new();
    let mut byte = [0; 1];

    while !buf.ends_with(b"\r\n\r\n") {
        if io.read(&mut byte).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        buf.push(byte[0]);
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Connection handler factory for [`TestServer::start`].
trait ConnFactory:
    ServiceFactory<TcpStream, Config = (), Response = (), Error = io::Error, InitError = ()>
    + Clone
    + Send
    + 'static
{
}

impl<T> ConnFactory for T where
    T: ServiceFactory<TcpStream, Config = (), Response = (), Error = io::Error, InitError = ()>
        + Clone
        + Send
        + 'static
{
}

/// HTTPS server answering every request with `status` and the request line as body.
fn https_server(status: &'static str) -> (impl ConnFactory, Vec<u8>) {
    let (acceptor, cert) = tls_acceptor();

    let factory = fn_service(move |io: TcpStream| {
        let acceptor = acceptor.clone();

        async move {
            let mut tls = acceptor.accept(io).await?;
            let head = read_head(&mut tls).await?;
            let line = head.lines().next().unwrap_or_default().to_owned();

            let res = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\n\r\n{}",
                status,
                line.len(),
                line
            );
            tls.write_all(res.as_bytes()).await?;
            tls.shutdown().await?;

            Ok::<_, io::Error>(())
        }
    });

    (factory, cert)
}

/// HTTPS server streaming `body` back in `chunk` sized pieces of a chunked response.
fn chunked_server(body: &'static [u8], chunk: usize) -> (impl ConnFactory, Vec<u8>) {
    let (acceptor, cert) = tls_acceptor();

    let factory = fn_service(move |io: TcpStream| {
        let acceptor = acceptor.clone();

        async move {
            let mut tls = acceptor.accept(io).await?;
            read_head(&mut tls).await?;

            tls.write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n")
                .await?;
            for piece in body.chunks(chunk) {
                tls.write_all(format!("{:x}\r\n", piece.len()).as_bytes())
                    .await?;
                tls.write_all(piece).await?;
                tls.write_all(b"\r\n").await?;
            }
            tls.write_all(b"0\r\n\r\n").await?;
            tls.shutdown().await?;

            Ok::<_, io::Error>(())
        }
    });

    (factory, cert)
}

/// HTTP CONNECT proxy; refuses every tunnel when `allow` is false.
fn connect_proxy(allow: bool) -> impl ConnFactory {
    fn_service(move |mut io: TcpStream| async move {
        let head = read_head(&mut io).await?;
        let target = head
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .unwrap_or_default()
            .to_owned();

        if !allow {
            io.write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
                .await?;
            return Ok(());
        }

        let mut upstream = tokio::net::TcpStream::connect(target).await?;
        io.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await?;
        tokio::io::copy_bidirectional(&mut io, &mut upstream).await?;

        Ok::<_, io::Error>(())
    })
}

/// Accepts TCP connections and never answers.
fn stalled_server() -> impl ConnFactory {
    fn_service(|io: TcpStream| async move {
        actix_rt::time::sleep(Duration::from_secs(10)).await;
        drop(io);
        Ok::<_, io::Error>(())
    })
}

#[actix_rt::test]
async fn direct_request_with_pinned_certificate() {
    let (factory, cert) = https_server("200 OK");
    let srv = TestServer::start(move || factory.clone());

    let res = HttpsClient::default()
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/status?id=1").set_certificate(cert))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&res.body()[..], b"GET /status?id=1 HTTP/1.1");
}

#[actix_rt::test]
async fn rejects_unpinned_certificate() {
    let (factory, _) = https_server("200 OK");
    let srv = TestServer::start(move || factory.clone());

    let err = HttpsClient::default()
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/").set_certificate(other_certificate()))
        .await
        .unwrap_err();

    assert!(matches!(err, AttemptError::Tls(_)), "{:?}", err);
    assert_eq!(err.kind(), AttemptKind::Connect);
}

#[actix_rt::test]
async fn non_success_status_is_request_failure() {
    let (factory, cert) = https_server("403 Forbidden");
    let srv = TestServer::start(move || factory.clone());

    let err = HttpsClient::default()
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/").set_certificate(cert))
        .await
        .unwrap_err();

    assert!(matches!(err, AttemptError::Status(StatusCode::FORBIDDEN)));
    assert_eq!(err.kind(), AttemptKind::Request);
}

#[actix_rt::test]
async fn chunked_body_in_small_pieces() {
    static BODY: [u8; 64 * 1024] = [b'x'; 64 * 1024];

    let (factory, cert) = chunked_server(&BODY, 16);
    let srv = TestServer::start(move || factory.clone());

    let res = HttpsClient::default()
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/").set_certificate(cert))
        .await
        .unwrap();

    assert_eq!(res.body().len(), BODY.len());
    assert!(res.body().iter().all(|&b| b == b'x'));
}

#[actix_rt::test]
async fn oversized_body_is_invalid_response() {
    let (factory, cert) = chunked_server(b"0123456789", 4);
    let srv = TestServer::start(move || factory.clone());

    let err = HttpsClient::default()
        .max_response_size(8)
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/").set_certificate(cert))
        .await
        .unwrap_err();

    assert!(matches!(err, AttemptError::InvalidResponse(_)), "{:?}", err);
    assert_eq!(err.kind(), AttemptKind::Request);
}

#[actix_rt::test]
async fn tunnels_through_connect_proxy() {
    let (factory, cert) = https_server("200 OK");
    let srv = TestServer::start(move || factory.clone());
    let proxy = TestServer::start(move || connect_proxy(true));

    let res = HttpsClient::default()
        .call(
            HttpsRequest::new("127.0.0.1", srv.port(), "/via-proxy")
                .set_proxy(proxy.addr())
                .set_certificate(cert),
        )
        .await
        .unwrap();

    assert_eq!(&res.body()[..], b"GET /via-proxy HTTP/1.1");
}

#[actix_rt::test]
async fn proxy_refusal_is_connect_failure() {
    let (factory, cert) = https_server("200 OK");
    let srv = TestServer::start(move || factory.clone());
    let proxy = TestServer::start(move || connect_proxy(false));

    let err = HttpsClient::default()
        .call(
            HttpsRequest::new("127.0.0.1", srv.port(), "/")
                .set_proxy(proxy.addr())
                .set_certificate(cert),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AttemptError::Proxy(_)), "{:?}", err);
    assert_eq!(err.kind(), AttemptKind::Connect);
}

#[actix_rt::test]
async fn refused_port_is_connect_failure() {
    let addr = TestServer::unused_addr();

    let err = HttpsClient::default()
        .call(HttpsRequest::new("127.0.0.1", addr.port(), "/"))
        .await
        .unwrap_err();

    assert!(matches!(err, AttemptError::Connect(_)), "{:?}", err);
}

#[actix_rt::test]
async fn cancel_aborts_stalled_exchange() {
    let srv = TestServer::start(stalled_server);
    let cancel = CancellationToken::new();

    actix_rt::spawn({
        let cancel = cancel.clone();
        async move {
            actix_rt::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        }
    });

    let start = Instant::now();
    let err = HttpsClient::default()
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/").set_cancel(cancel))
        .await
        .unwrap_err();

    assert!(err.is_canceled());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[actix_rt::test]
async fn stalled_handshake_times_out() {
    let srv = TestServer::start(stalled_server);

    let err = HttpsClient::default()
        .connect_timeout(Duration::from_millis(100))
        .call(HttpsRequest::new("127.0.0.1", srv.port(), "/"))
        .await
        .unwrap_err();

    assert!(matches!(err, AttemptError::ConnectTimeout));
}

#[actix_rt::test]
async fn dispatcher_falls_over_to_reachable_port() {
    let (factory, cert) = https_server("200 OK");
    let srv = TestServer::start(move || factory.clone());
    let closed = TestServer::unused_addr();

    let dispatcher = ServerRequest::new(
        HttpsClient::default().connect_timeout(Duration::from_secs(5)),
        Arc::new(TransportRegistry::new()),
    )
    .config(DispatchConfig::default().direct_ports([closed.port(), srv.port()]));

    let session = SessionInfo::new("127.0.0.1").set_web_server_certificate(cert);

    let res = dispatcher
        .make_request(
            &CancellationToken::new(),
            None,
            &session,
            "/handshake",
            RequestOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(&res.body()[..], b"GET /handshake HTTP/1.1");
}
