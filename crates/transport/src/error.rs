//! Transport error types

use std::net::Ipv4Addr;

use contracts::ContractError;
use thiserror::Error;

/// Transport-specific errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket could not be created or bound
    #[error("failed to bind udp port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Multicast membership was refused
    #[error("failed to join multicast group {group} on {interface}: {source}")]
    JoinMulticast {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: std::io::Error,
    },

    /// Async socket needs a tokio runtime
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Create a bind error
    pub fn bind(port: u16, source: std::io::Error) -> Self {
        Self::Bind { port, source }
    }
}

impl From<TransportError> for ContractError {
    fn from(err: TransportError) -> Self {
        let transport = match &err {
            TransportError::Bind { port, .. } => format!("udp:{}", port),
            TransportError::JoinMulticast { group, .. } => format!("udp:{}", group),
            TransportError::NoRuntime(_) | TransportError::Io(_) => "udp".to_string(),
        };
        ContractError::transport(transport, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_message() {
        let err = TransportError::bind(
            6699,
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        );
        assert!(err.to_string().contains("6699"));

        let contract: ContractError = err.into();
        assert!(contract.to_string().contains("udp:6699"));
    }
}
