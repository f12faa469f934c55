//! Session metadata snapshot.

use std::fmt;

/// Server connection metadata for the current session.
///
/// Holds everything needed to evaluate connectivity options without a live connection: where the
/// server's web endpoint lives, how to authenticate it, and the credentials that transports
/// inspect when deciding whether they need an extra handshake.
///
/// # Examples
/// ```
/// # use server_request::SessionInfo;
/// let session = SessionInfo::new("203.0.113.7")
///     .set_web_port(8080)
///     .set_ssh_port(22)
///     .set_ssh_host_key("AAAAB3NzaC1yc2E");
///
/// assert_eq!(session.server_address(), "203.0.113.7");
/// assert_eq!(session.web_port(), 8080);
/// assert!(!session.has_ssh_credentials());
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    server_address: String,
    web_port: u16,
    web_server_secret: String,
    web_server_certificate: Option<Vec<u8>>,
    ssh_port: Option<u16>,
    ssh_username: String,
    ssh_password: String,
    ssh_host_key: String,
    ssh_obfuscated_port: Option<u16>,
    ssh_obfuscated_key: String,
}

impl SessionInfo {
    /// Default port of the server's web endpoint.
    pub const DEFAULT_WEB_PORT: u16 = 8080;

    /// Constructs session info for the given server address.
    pub fn new(server_address: impl Into<String>) -> Self {
        Self {
            server_address: server_address.into(),
            web_port: Self::DEFAULT_WEB_PORT,
            ..Self::default()
        }
    }

    /// Set port of the server's web endpoint.
    pub fn set_web_port(mut self, port: u16) -> Self {
        self.web_port = port;
        self
    }

    /// Set secret the web endpoint expects on requests.
    pub fn set_web_server_secret(mut self, secret: impl Into<String>) -> Self {
        self.web_server_secret = secret.into();
        self
    }

    /// Set DER encoded certificate the web endpoint must present.
    ///
    /// When set, the HTTPS client pins this exact certificate instead of consulting public roots.
    pub fn set_web_server_certificate(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.web_server_certificate = Some(der.into());
        self
    }

    /// Set SSH port.
    pub fn set_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = Some(port);
        self
    }

    /// Set SSH username and password.
    pub fn set_ssh_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.ssh_username = username.into();
        self.ssh_password = password.into();
        self
    }

    /// Set SSH host public key.
    pub fn set_ssh_host_key(mut self, key: impl Into<String>) -> Self {
        self.ssh_host_key = key.into();
        self
    }

    /// Set port and key for obfuscated SSH.
    pub fn set_ssh_obfuscated(mut self, port: u16, key: impl Into<String>) -> Self {
        self.ssh_obfuscated_port = Some(port);
        self.ssh_obfuscated_key = key.into();
        self
    }

    /// Returns server address (hostname or IP literal).
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    /// Returns port of the server's web endpoint.
    pub fn web_port(&self) -> u16 {
        self.web_port
    }

    /// Returns web endpoint secret.
    pub fn web_server_secret(&self) -> &str {
        &self.web_server_secret
    }

    /// Returns pinned web server certificate, if any.
    pub fn web_server_certificate(&self) -> Option<&[u8]> {
        self.web_server_certificate.as_deref()
    }

    /// Returns SSH port.
    pub fn ssh_port(&self) -> Option<u16> {
        self.ssh_port
    }

    /// Returns SSH username.
    pub fn ssh_username(&self) -> &str {
        &self.ssh_username
    }

    /// Returns SSH password.
    pub fn ssh_password(&self) -> &str {
        &self.ssh_password
    }

    /// Returns SSH host public key.
    pub fn ssh_host_key(&self) -> &str {
        &self.ssh_host_key
    }

    /// Returns obfuscated SSH port.
    pub fn ssh_obfuscated_port(&self) -> Option<u16> {
        self.ssh_obfuscated_port
    }

    /// Returns obfuscated SSH key.
    pub fn ssh_obfuscated_key(&self) -> &str {
        &self.ssh_obfuscated_key
    }

    /// Returns true if plain SSH can be established from this metadata alone.
    pub fn has_ssh_credentials(&self) -> bool {
        self.ssh_port.is_some()
            && !self.ssh_username.is_empty()
            && !self.ssh_password.is_empty()
            && !self.ssh_host_key.is_empty()
    }

    /// Returns true if obfuscated SSH can be established from this metadata alone.
    pub fn has_obfuscated_ssh_credentials(&self) -> bool {
        self.has_ssh_credentials()
            && self.ssh_obfuscated_port.is_some()
            && !self.ssh_obfuscated_key.is_empty()
    }
}

// secrets stay out of logs
impl fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInfo")
            .field("server_address", &self.server_address)
            .field("web_port", &self.web_port)
            .field("pinned_certificate", &self.web_server_certificate.is_some())
            .field("ssh_port", &self.ssh_port)
            .field("ssh_obfuscated_port", &self.ssh_obfuscated_port)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let session = SessionInfo::new("example.com");
        assert_eq!(session.server_address(), "example.com");
        assert_eq!(session.web_port(), SessionInfo::DEFAULT_WEB_PORT);
        assert!(session.web_server_certificate().is_none());
        assert!(!session.has_ssh_credentials());
        assert!(!session.has_obfuscated_ssh_credentials());
    }

    #[test]
    fn ssh_credentials() {
        let session = SessionInfo::new("10.0.0.1")
            .set_ssh_port(22)
            .set_ssh_credentials("user", "pass")
            .set_ssh_host_key("key");
        assert!(session.has_ssh_credentials());
        assert!(!session.has_obfuscated_ssh_credentials());

        let session = session.set_ssh_obfuscated(995, "obfs");
        assert!(session.has_obfuscated_ssh_credentials());
        assert_eq!(session.ssh_obfuscated_port(), Some(995));
    }

    #[test]
    fn debug_hides_secrets() {
        let session = SessionInfo::new("10.0.0.1")
            .set_web_server_secret("hunter2")
            .set_ssh_credentials("user", "swordfish");
        let out = format!("{:?}", session);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("swordfish"));
        assert!(out.contains("10.0.0.1"));
    }
}
