//! Connection path selection and fallback.
//!
//! # Paths, in order of preference
//! 1. A transport is connected: tunnel through its local proxy. Nothing else is tried; a
//!    connected transport is assumed reachable.
//! 1. No transport is connected: connect directly to the server, trying each configured port in
//!    turn.
//! 1. Direct connections failed: bring up temporary transports that need no handshake, one at a
//!    time, and tunnel through each one's local proxy.

use std::{collections::HashSet, fmt, sync::Arc};

use actix_rt::time::timeout;
use actix_service::Service;
use actix_utils::future::poll_fn;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    select::select_temp_transport_excluding, AttemptError, DispatchConfig, HttpsRequest,
    HttpsResponse, RequestError, RequestOptions, SessionInfo, Transport, TransportCatalog,
    TransportHandle,
};

/// Issues requests to the server over whichever path is currently usable.
///
/// Generic over the HTTPS client service so alternate clients can be plugged in; see
/// [`HttpsClient`](crate::HttpsClient) for the default one.
pub struct ServerRequest<S> {
    client: S,
    catalog: Arc<dyn TransportCatalog>,
    config: DispatchConfig,
}

impl<S> ServerRequest<S>
where
    S: Service<HttpsRequest, Response = HttpsResponse, Error = AttemptError>,
{
    /// Constructs dispatcher using `client` for requests and `catalog` for temporary transports.
    pub fn new(client: S, catalog: Arc<dyn TransportCatalog>) -> Self {
        Self {
            client,
            catalog,
            config: DispatchConfig::default(),
        }
    }

    /// Replaces path selection settings.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Sends one request for `path` to the server described by `session`.
    ///
    /// `current` is the caller's persistent transport, if any. When it is connected the request
    /// goes through its local proxy and no other path is attempted. Otherwise direct connections
    /// and then temporary transports are tried until one succeeds.
    ///
    /// Returns [`RequestError::Canceled`] as soon as `cancel` is observed, and
    /// [`RequestError::Exhausted`] once every path failed.
    pub async fn make_request(
        &self,
        cancel: &CancellationToken,
        current: Option<&dyn Transport>,
        session: &SessionInfo,
        path: &str,
        opts: RequestOptions,
    ) -> Result<HttpsResponse, RequestError> {
        let transport_connected = current.map_or(false, |transport| transport.is_connected());

        if transport_connected {
            return self.via_connected(cancel, session, path, &opts).await;
        }

        let mut attempts = 0;
        let mut last = None;

        for &port in &self.config.direct_ports {
            if cancel.is_cancelled() {
                return Err(RequestError::Canceled);
            }

            attempts += 1;

            let req = self.request(cancel, session, port, path, &opts);
            match self.attempt(cancel, req).await {
                Ok(res) => return Ok(res),
                Err(err) if err.is_canceled() || cancel.is_cancelled() => {
                    return Err(RequestError::Canceled)
                }
                Err(err) => {
                    debug!("direct request on port {} failed: {}", port, err);
                    last = Some(err);
                }
            }
        }

        let mut tried = HashSet::new();

        loop {
            if cancel.is_cancelled() {
                return Err(RequestError::Canceled);
            }

            let transport =
                select_temp_transport_excluding(&*self.catalog, current, session, &tried);

            let Some(mut transport) = transport else {
                break;
            };

            let protocol = transport.protocol_name().to_owned();
            attempts += 1;

            let res = self
                .via_temp_transport(&mut transport, cancel, session, path, &opts)
                .await;

            // used for exactly one attempt
            drop(transport);

            match res {
                Ok(res) => return Ok(res),
                Err(err) if err.is_canceled() || cancel.is_cancelled() => {
                    return Err(RequestError::Canceled)
                }
                Err(err) => {
                    debug!("request via temporary transport {} failed: {}", protocol, err);
                    last = Some(err);
                }
            }

            tried.insert(protocol);
        }

        warn!(
            "no reachable path to {} after {} attempt(s)",
            session.server_address(),
            attempts
        );

        Err(RequestError::Exhausted { attempts, last })
    }

    async fn via_connected(
        &self,
        cancel: &CancellationToken,
        session: &SessionInfo,
        path: &str,
        opts: &RequestOptions,
    ) -> Result<HttpsResponse, RequestError> {
        if cancel.is_cancelled() {
            return Err(RequestError::Canceled);
        }

        let proxy = opts
            .use_local_proxy
            .then(|| self.config.local_proxy_addr());

        let req = self
            .request(cancel, session, session.web_port(), path, opts)
            .set_proxy(proxy);

        match self.attempt(cancel, req).await {
            Ok(res) => Ok(res),
            Err(err) if err.is_canceled() || cancel.is_cancelled() => Err(RequestError::Canceled),
            Err(err) => {
                debug!("request via connected transport failed: {}", err);
                Err(RequestError::Attempt(err))
            }
        }
    }

    async fn via_temp_transport(
        &self,
        transport: &mut TransportHandle,
        cancel: &CancellationToken,
        session: &SessionInfo,
        path: &str,
        opts: &RequestOptions,
    ) -> Result<HttpsResponse, AttemptError> {
        trace!("connecting temporary transport: {}", transport.protocol_name());

        let connect = timeout(
            self.config.transport_connect_timeout,
            transport.connect(session, cancel),
        );

        let proxy = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AttemptError::Canceled),
            res = connect => match res {
                Ok(Ok(proxy)) => proxy,
                Ok(Err(err)) => return Err(AttemptError::Transport(err)),
                Err(_) => return Err(AttemptError::ConnectTimeout),
            },
        };

        let req = self
            .request(cancel, session, session.web_port(), path, opts)
            .set_proxy(proxy);

        self.attempt(cancel, req).await
    }

    async fn attempt(
        &self,
        cancel: &CancellationToken,
        req: HttpsRequest,
    ) -> Result<HttpsResponse, AttemptError> {
        trace!("request attempt: {}", req);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AttemptError::Canceled),
            res = async {
                poll_fn(|cx| self.client.poll_ready(cx)).await?;
                self.client.call(req).await
            } => res,
        }
    }

    fn request(
        &self,
        cancel: &CancellationToken,
        session: &SessionInfo,
        port: u16,
        path: &str,
        opts: &RequestOptions,
    ) -> HttpsRequest {
        HttpsRequest::new(session.server_address(), port, path)
            .set_headers(opts.headers.clone())
            .set_body(opts.body.clone())
            .set_certificate(session.web_server_certificate().map(<[u8]>::to_vec))
            .set_cancel(cancel.clone())
    }
}

impl<S> fmt::Debug for ServerRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerRequest")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
