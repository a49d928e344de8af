use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("DNS resolution failed: {0}")]
    DnsResolutionFailed(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshakeFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("connection timeout")]
    Timeout,

    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::AuthenticationFailed(_))
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("account {0} is already registered")]
    DuplicateAccount(jid::FullJid),
}
