pub use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::{oid::Oid, transport::DEFAULT_SOCKET_PATH};

/// Largest description the Open PDU can usefully carry.
const MAX_DESCRIPTION_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
#[error("{details}")]
pub struct ConfigurationError {
    details: String,
}

impl ConfigurationError {
    fn new(msg: &str) -> ConfigurationError {
        ConfigurationError {
            details: msg.to_string(),
        }
    }
}

/// Parameters of one sub-agent session.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Sent in the Open PDU; shows up in the master's session table.
    pub description: String,
    /// Session default timeout in seconds sent to the master (0 = master default).
    pub default_timeout: u8,
    /// Object identifier of the sub-agent, null if it has none.
    pub id: Oid,
    /// How long to wait for the master's Response to each request.
    pub response_timeout: Duration,
    /// Re-register remembered subtrees after a reconnect.
    pub replay_registrations: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            description: "agentx-subagent".to_string(),
            default_timeout: 0,
            id: Oid::null(),
            response_timeout: Duration::from_secs(5),
            replay_registrations: true,
        }
    }
}

/// Command line of the demo sub-agent.
#[derive(Parser, Debug)]
#[command(author = "Piotr Olszewski", version, about, long_about = None)]
pub struct Configuration {
    /// Path of the master agent's AgentX Unix socket
    #[arg(short, long, default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,
    /// Connect over TCP to this address instead of the Unix socket
    #[arg(long)]
    pub tcp: Option<SocketAddr>,
    /// Session description sent to the master agent
    #[arg(short, long, default_value = "agentx-demo sub-agent")]
    pub description: String,
    /// Session default timeout in seconds (0 = master default)
    #[arg(short, long, default_value_t = 0)]
    pub timeout: u8,
    /// Milliseconds to wait for each response from the master
    #[arg(short, long, default_value_t = 5000)]
    pub response_timeout: u64,
    /// Subtree to register and serve the demo objects under
    #[arg(short = 'o', long, default_value = "1.3.6.1.4.1.8072.9999.9999")]
    pub subtree: Oid,
    /// Do not re-register subtrees after reconnecting
    #[arg(long)]
    pub no_replay: bool,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.description.is_empty() {
            return Err(ConfigurationError::new("Description must not be empty"));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(ConfigurationError::new("Description is too long"));
        }
        if self.response_timeout == 0 {
            return Err(ConfigurationError::new("Response timeout must be positive"));
        }
        if self.subtree.is_null() {
            return Err(ConfigurationError::new("Subtree must not be empty"));
        }
        // Room for the demo objects' `.N.0` suffix.
        if self.subtree.len() + 2 > Oid::MAX_LEN {
            return Err(ConfigurationError::new("Subtree is too long"));
        }
        Ok(())
    }

    /// Session parameters derived from the command line.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            description: self.description.clone(),
            default_timeout: self.timeout,
            id: Oid::null(),
            response_timeout: Duration::from_millis(self.response_timeout),
            replay_registrations: !self.no_replay,
        }
    }
}
