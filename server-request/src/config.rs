use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

/// Path selection settings for [`ServerRequest`](crate::ServerRequest).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub(crate) direct_ports: Vec<u16>,
    pub(crate) local_proxy_host: IpAddr,
    pub(crate) local_proxy_port: u16,
    pub(crate) transport_connect_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            direct_ports: vec![8080, 443],
            local_proxy_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            local_proxy_port: 8080,
            transport_connect_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchConfig {
    /// Set server ports tried, in order, for direct connections.
    ///
    /// By default `8080` then `443`.
    pub fn direct_ports(mut self, ports: impl IntoIterator<Item = u16>) -> Self {
        self.direct_ports = ports.into_iter().collect();
        self
    }

    /// Set host of the connected transport's local proxy.
    ///
    /// By default `127.0.0.1`.
    pub fn local_proxy_host(mut self, host: impl Into<IpAddr>) -> Self {
        self.local_proxy_host = host.into();
        self
    }

    /// Set port of the connected transport's local proxy.
    ///
    /// By default `8080`.
    pub fn local_proxy_port(mut self, port: u16) -> Self {
        self.local_proxy_port = port;
        self
    }

    /// Set time allowed for a temporary transport to come up.
    ///
    /// By default 30 seconds.
    pub fn transport_connect_timeout(mut self, dur: Duration) -> Self {
        self.transport_connect_timeout = dur;
        self
    }

    /// Returns address of the connected transport's local proxy.
    pub fn local_proxy_addr(&self) -> SocketAddr {
        SocketAddr::new(self.local_proxy_host, self.local_proxy_port)
    }

    /// Returns ports tried for direct connections.
    pub fn ports(&self) -> &[u16] {
        &self.direct_ports
    }
}
