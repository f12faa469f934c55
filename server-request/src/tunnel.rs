//! HTTP CONNECT tunneling through a local proxy.

use std::{io, pin::pin};

use bytes::Bytes;
use http::{header::HOST, Method, Request, StatusCode};
use http_body_util::Empty;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::hyper_into_io;

/// Asks the proxy on the other end of `io` to open a tunnel to `authority`.
///
/// Hands `io` back once the proxy accepted; from then on it carries raw bytes to and from the
/// target.
pub(crate) async fn tunnel<IO>(io: IO, authority: &str) -> io::Result<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let req = Request::builder()
        .method(Method::CONNECT)
        .uri(authority)
        .header(HOST, authority)
        .body(Empty::<Bytes>::new())
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let (mut sender, conn) = http1::handshake::<_, Empty<Bytes>>(TokioIo::new(io))
        .await
        .map_err(hyper_into_io)?;

    let mut response = pin!(sender.send_request(req));
    let mut conn = pin!(conn.without_shutdown());
    let mut parts = None;

    let res = tokio::select! {
        res = &mut response => res,

        // an accepted tunnel finishes the connection; so does a proxy hanging up
        done = &mut conn => {
            parts = Some(done.map_err(hyper_into_io)?);
            response.await
        }
    }
    .map_err(hyper_into_io)?;

    if res.status() != StatusCode::OK {
        return Err(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            format!("proxy responded with status {}", res.status()),
        ));
    }

    let parts = match parts {
        Some(parts) => parts,
        None => conn.await.map_err(hyper_into_io)?,
    };

    // target speaks only after the client hello
    if !parts.read_buf.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unexpected data after proxy response",
        ));
    }

    tracing::trace!("tunnel established to {}", authority);
    Ok(parts.io.into_inner())
}
