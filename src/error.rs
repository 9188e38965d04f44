//! Error taxonomy for the AgentX engine.

use std::{io, time::Duration};

use crate::pdu::ResponseError;

/// Errors that can occur during AgentX protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentXError {
    /// Malformed bytes: truncated buffer, bad tag, misaligned payload length.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The PDU carries a protocol version other than 1. Not fatal to the session.
    #[error("Unsupported AgentX version {0}")]
    Version(u8),
    /// There is no open session, or the transport was lost.
    #[error("Not connected to the master agent")]
    Disconnected,
    /// The awaited Response never arrived.
    #[error("No response from master agent within {0:?}")]
    Timeout(Duration),
    /// The master rejected something we sent as malformed.
    #[error("Master agent rejected a PDU as malformed (internal error)")]
    Internal,
    /// The master was unable to process the request (processingError).
    #[error("Master agent is unable to process the request")]
    MasterUnable,
    /// The master refused the request by policy (requestDenied).
    #[error("Master agent is unwilling to process the request")]
    MasterUnwilling,
    #[error("Duplicate registration")]
    DuplicateRegistration,
    #[error("Unknown registration")]
    UnknownRegistration,
    #[error("Unsupported context")]
    UnsupportedContext,
    /// The master refused an index allocation or release.
    #[error("Index operation refused: {0:?}")]
    Index(ResponseError),
    /// A value cannot be represented on the wire.
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AgentXError {
    /// Returns true if this error leaves the session disconnected.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentXError::Disconnected | AgentXError::Timeout(_) | AgentXError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AgentXError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AgentXError::Disconnected.is_fatal());
        assert!(AgentXError::Timeout(Duration::from_millis(100)).is_fatal());
        assert!(AgentXError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).is_fatal());
        assert!(!AgentXError::Version(2).is_fatal());
        assert!(!AgentXError::DuplicateRegistration.is_fatal());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            AgentXError::Parse("payload length 5".to_string()).to_string(),
            "Parse error: payload length 5"
        );
        assert_eq!(
            AgentXError::Version(3).to_string(),
            "Unsupported AgentX version 3"
        );
    }
}
