use std::io;

use derive_more::Display;
use http::StatusCode;

/// Coarse classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    /// Path to the server could not be established.
    Connect,

    /// Path was established but the HTTPS exchange failed.
    Request,

    /// Attempt was aborted by the cancellation token.
    Canceled,
}

/// Failure of a single request attempt over one path.
#[derive(Debug, Display)]
pub enum AttemptError {
    /// TCP connection (including DNS resolution) failed.
    #[display("TCP connect failed: {_0}")]
    Connect(io::Error),

    /// Local proxy refused or failed the tunnel request.
    #[display("proxy tunnel failed: {_0}")]
    Proxy(io::Error),

    /// Transport could not be brought up to carry the request.
    #[display("transport connect failed: {_0}")]
    Transport(io::Error),

    /// TLS handshake failed or server certificate was rejected.
    #[display("TLS handshake failed: {_0}")]
    Tls(io::Error),

    /// Path could not be established within the connect timeout.
    #[display("connect timed out")]
    ConnectTimeout,

    /// I/O error while exchanging the request and response.
    #[display("request I/O failed: {_0}")]
    Io(io::Error),

    /// Response was malformed or exceeded the size limit.
    #[display("invalid response: {_0}")]
    InvalidResponse(io::Error),

    /// Server answered with a non-success status.
    #[display("server responded with status {_0}")]
    Status(StatusCode),

    /// Response did not complete within the response timeout.
    #[display("response timed out")]
    ResponseTimeout,

    /// Attempt was aborted by the cancellation token.
    #[display("request canceled")]
    Canceled,
}

impl AttemptError {
    /// Classifies this failure.
    pub fn kind(&self) -> AttemptKind {
        match self {
            AttemptError::Connect(_)
            | AttemptError::Proxy(_)
            | AttemptError::Transport(_)
            | AttemptError::Tls(_)
            | AttemptError::ConnectTimeout => AttemptKind::Connect,

            AttemptError::Io(_)
            | AttemptError::InvalidResponse(_)
            | AttemptError::Status(_)
            | AttemptError::ResponseTimeout => AttemptKind::Request,

            AttemptError::Canceled => AttemptKind::Canceled,
        }
    }

    /// Returns true if this attempt was canceled.
    pub fn is_canceled(&self) -> bool {
        self.kind() == AttemptKind::Canceled
    }
}

impl std::error::Error for AttemptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttemptError::Connect(err)
            | AttemptError::Proxy(err)
            | AttemptError::Transport(err)
            | AttemptError::Tls(err)
            | AttemptError::Io(err)
            | AttemptError::InvalidResponse(err) => Some(err),
            _ => None,
        }
    }
}

/// Maps HTTP protocol errors onto I/O error kinds the attempt classification relies on.
pub(crate) fn hyper_into_io(err: hyper::Error) -> io::Error {
    let kind = if err.is_incomplete_message() {
        io::ErrorKind::UnexpectedEof
    } else if err.is_parse() || err.is_parse_status() {
        io::ErrorKind::InvalidData
    } else if err.is_timeout() {
        io::ErrorKind::TimedOut
    } else {
        io::ErrorKind::Other
    };

    io::Error::new(kind, err)
}

/// Terminal failure of a dispatched request.
#[derive(Debug, Display)]
pub enum RequestError {
    /// Cancellation token was set; no further path was attempted.
    #[display("request canceled")]
    Canceled,

    /// The single attempt through the connected transport failed.
    #[display("request through connected transport failed: {_0}")]
    Attempt(AttemptError),

    /// Every available path was tried without success.
    #[display("no reachable path to server after {attempts} attempt(s)")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,

        /// Failure of the final attempt, if any attempt was made.
        last: Option<AttemptError>,
    },
}

impl RequestError {
    /// Returns true if the request was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, RequestError::Canceled)
    }

    /// Returns true if every path was exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RequestError::Exhausted { .. })
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Attempt(err) => Some(err),
            RequestError::Exhausted {
                last: Some(err), ..
            } => Some(err),
            _ => None,
        }
    }
}
