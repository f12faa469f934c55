//! Fetches one path from a server, falling back to an already running local HTTP proxy.
//!
//! ```sh
//! RUST_LOG=server_request=trace cargo run --example fetch -- <server-address> [path] [proxy-addr]
//! ```
//!
//! The proxy (defaults to `127.0.0.1:8118`) stands in for a temporary transport: it is only used
//! once direct connections on ports 8080 and 443 have failed. Press Ctrl-C to cancel.

use std::{env, io, net::SocketAddr, sync::Arc};

use futures_core::future::LocalBoxFuture;
use server_request::{
    CancellationToken, HttpsClient, RequestOptions, ServerRequest, SessionInfo, Transport,
    TransportRegistry,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Transport whose local proxy is managed outside this process.
struct ExternalProxy {
    addr: SocketAddr,
}

impl Transport for ExternalProxy {
    fn protocol_name(&self) -> &str {
        "EXTERNAL-PROXY"
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn is_handshake_required(&self, _session: &SessionInfo) -> bool {
        false
    }

    fn connect<'a>(
        &'a mut self,
        _session: &'a SessionInfo,
        _cancel: &'a CancellationToken,
    ) -> LocalBoxFuture<'a, io::Result<SocketAddr>> {
        Box::pin(async move { Ok(self.addr) })
    }
}

#[actix_rt::main]
async fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let mut args = env::args().skip(1);

    let Some(server) = args.next() else {
        eprintln!("usage: fetch <server-address> [path] [proxy-addr]");
        return Ok(());
    };
    let path = args.next().unwrap_or_else(|| "/".to_owned());
    let proxy: SocketAddr = args
        .next()
        .as_deref()
        .unwrap_or("127.0.0.1:8118")
        .parse()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;

    let registry = TransportRegistry::new().register("EXTERNAL-PROXY", move || ExternalProxy {
        addr: proxy,
    });

    let dispatcher = ServerRequest::new(HttpsClient::default(), Arc::new(registry));
    let session = SessionInfo::new(server);

    let cancel = CancellationToken::new();

    actix_rt::spawn({
        let cancel = cancel.clone();
        async move {
            if actix_rt::signal::ctrl_c().await.is_ok() {
                tracing::info!("canceling request");
                cancel.cancel();
            }
        }
    });

    match dispatcher
        .make_request(&cancel, None, &session, &path, RequestOptions::default())
        .await
    {
        Ok(res) => {
            tracing::info!("{} ({} bytes)", res.status(), res.body().len());
            println!("{}", String::from_utf8_lossy(res.body()));
        }
        Err(err) => tracing::error!("request failed: {}", err),
    }

    Ok(())
}
