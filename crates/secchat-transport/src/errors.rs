//! Transport-level errors.
//!
//! A [`TransportError`] never reaches session callers directly; the session
//! wraps it into `SessionError::ConnectError` with the target URL.

use thiserror::Error;

/// Failure to open a channel.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The address could not be used.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The peer refused or the handshake failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Socket-level I/O failure.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Handshake(_) => "HANDSHAKE_FAILED",
            Self::Io(_) => "IO_ERROR",
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Url(e) => Self::InvalidUrl(e.to_string()),
            WsError::Io(e) => Self::Io(e),
            other => Self::Handshake(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(TransportError::InvalidUrl("x".into()).code(), "INVALID_URL");
        assert_eq!(TransportError::Handshake("x".into()).code(), "HANDSHAKE_FAILED");
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(TransportError::from(io).code(), "IO_ERROR");
    }

    #[test]
    fn tungstenite_url_error_maps_to_invalid_url() {
        use tokio_tungstenite::tungstenite::error::UrlError;
        let err = TransportError::from(tokio_tungstenite::tungstenite::Error::Url(
            UrlError::UnsupportedUrlScheme,
        ));
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[test]
    fn display() {
        let err = TransportError::Handshake("HTTP 403".into());
        assert_eq!(err.to_string(), "handshake failed: HTTP 403");
    }
}
