//! Transport capability trait and its owning handle.

use std::{
    fmt, io,
    net::SocketAddr,
    ops::{Deref, DerefMut},
};

use futures_core::future::LocalBoxFuture;
use tokio_util::sync::CancellationToken;

use crate::SessionInfo;

/// A circumvention protocol able to carry proxied traffic to the server.
///
/// Every transport runs a local proxy once connected; requests reach the server by tunneling
/// through that proxy. The dispatcher only ever reads this capability surface and never inspects
/// protocol specific state.
pub trait Transport: 'static {
    /// Stable protocol identifier, unique per transport implementation.
    fn protocol_name(&self) -> &str;

    /// Returns true while the transport is up and its local proxy accepts connections.
    fn is_connected(&self) -> bool;

    /// Returns true if the transport needs an out-of-band handshake before it can connect using
    /// only the given session metadata.
    fn is_handshake_required(&self, session: &SessionInfo) -> bool;

    /// Brings the transport up and returns the address of its local proxy.
    ///
    /// Implementations should abort promptly once `cancel` is set.
    fn connect<'a>(
        &'a mut self,
        session: &'a SessionInfo,
        cancel: &'a CancellationToken,
    ) -> LocalBoxFuture<'a, io::Result<SocketAddr>>;

    /// Tears the transport down and frees any resources it holds.
    ///
    /// Called exactly once by [`TransportHandle`] when the handle is dropped.
    fn release(&mut self) {}
}

/// Exclusively owned transport instance.
///
/// Dropping the handle releases the transport, so a handle can never be forgotten without its
/// transport being torn down.
pub struct TransportHandle {
    inner: Box<dyn Transport>,
}

impl TransportHandle {
    /// Takes ownership of a transport instance.
    pub fn new(transport: impl Transport) -> Self {
        Self::from_boxed(Box::new(transport))
    }

    /// Takes ownership of a boxed transport instance.
    pub fn from_boxed(inner: Box<dyn Transport>) -> Self {
        Self { inner }
    }
}

impl Deref for TransportHandle {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DerefMut for TransportHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.inner
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        tracing::trace!("releasing transport: {}", self.inner.protocol_name());
        self.inner.release();
    }
}

impl fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("protocol", &self.inner.protocol_name())
            .field("connected", &self.inner.is_connected())
            .finish()
    }
}
