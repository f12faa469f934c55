//! Enumeration of known transport implementations.

use std::fmt;

use crate::{Transport, TransportHandle};

/// Source of fresh transport instances.
///
/// Every call returns newly constructed, independently owned handles in a stable order. Callers
/// own the returned handles; dropping one releases it. Implementations must be safe to call from
/// concurrent requests.
pub trait TransportCatalog: Send + Sync {
    /// Creates one instance of every known transport.
    fn new_all(&self) -> Vec<TransportHandle>;
}

type Constructor = Box<dyn Fn() -> Box<dyn Transport> + Send + Sync>;

/// Ordered registry of transport constructors.
///
/// # Examples
/// ```
/// # use std::{io, net::SocketAddr};
/// # use futures_core::future::LocalBoxFuture;
/// # use tokio_util::sync::CancellationToken;
/// # use server_request::{SessionInfo, Transport, TransportCatalog, TransportRegistry};
/// struct Ssh;
///
/// impl Transport for Ssh {
///     fn protocol_name(&self) -> &str { "SSH" }
///     fn is_connected(&self) -> bool { false }
///     fn is_handshake_required(&self, session: &SessionInfo) -> bool {
///         !session.has_ssh_credentials()
///     }
///     fn connect<'a>(
///         &'a mut self,
///         _: &'a SessionInfo,
///         _: &'a CancellationToken,
///     ) -> LocalBoxFuture<'a, io::Result<SocketAddr>> {
///         Box::pin(async { Err(io::ErrorKind::Unsupported.into()) })
///     }
/// }
///
/// let registry = TransportRegistry::new().register("SSH", || Ssh);
/// assert_eq!(registry.protocols().collect::<Vec<_>>(), ["SSH"]);
/// assert_eq!(registry.new_all().len(), 1);
/// ```
#[derive(Default)]
pub struct TransportRegistry {
    entries: Vec<(String, Constructor)>,
}

impl TransportRegistry {
    /// Constructs an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transport constructor under a protocol name.
    ///
    /// Enumeration order follows registration order.
    pub fn register<F, T>(mut self, name: impl Into<String>, ctor: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transport,
    {
        self.entries.push((
            name.into(),
            Box::new(move || Box::new(ctor()) as Box<dyn Transport>),
        ));
        self
    }

    /// Returns registered protocol names in enumeration order.
    pub fn protocols(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Returns number of registered transports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no transports are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TransportCatalog for TransportRegistry {
    fn new_all(&self) -> Vec<TransportHandle> {
        self.entries
            .iter()
            .map(|(_, ctor)| TransportHandle::from_boxed(ctor()))
            .collect()
    }
}

impl fmt::Debug for TransportRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.protocols()).finish()
    }
}
