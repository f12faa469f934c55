//! Fallback-ordered HTTPS requests to a circumvention server.
//!
//! [`ServerRequest`] decides how to reach the server given the state of the caller's transport:
//! through a connected transport's local proxy, directly on a list of ports, or through temporary
//! transports picked by [`select_temp_transport`]. Each path is attempted once, in order, until
//! one succeeds or the cancellation token is set.
//!
//! Transports are plugged in through the [`Transport`] trait and enumerated by a
//! [`TransportCatalog`]; requests are carried by any [`Service`](actix_service::Service) accepting
//! [`HttpsRequest`], with [`HttpsClient`] as the default implementation.

#![deny(rust_2018_idioms, nonstandard_style)]
#![warn(missing_docs)]

mod catalog;
mod client;
mod config;
mod dispatch;
mod error;
mod request;
mod select;
mod session;
mod tls;
mod transport;
mod tunnel;

pub use tokio_util::sync::CancellationToken;

pub use self::catalog::{TransportCatalog, TransportRegistry};
pub use self::client::HttpsClient;
pub use self::config::DispatchConfig;
pub use self::dispatch::ServerRequest;
pub use self::error::{AttemptError, AttemptKind, RequestError};
pub use self::request::{HttpsRequest, HttpsResponse, RequestOptions};
pub use self::select::{select_temp_transport, select_temp_transport_excluding};
pub use self::session::SessionInfo;
pub use self::transport::{Transport, TransportHandle};
