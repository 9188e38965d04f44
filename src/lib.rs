//! AgentX sub-agent - the sub-agent side of the AgentX protocol (RFC 2741).
//!
//! This crate lets a program export SNMP managed objects through an
//! existing master agent (net-snmp's `snmpd` and others). It connects to
//! the master, registers MIB subtrees and answers the Get, GetNext,
//! GetBulk and four-phase Set requests the master forwards.
//!
//! # Usage
//!
//! Run the demo sub-agent against the local master agent:
//! ```bash
//! agentx-demo --socket /var/agentx/master --subtree 1.3.6.1.4.1.8072.9999.9999
//! ```
//!
//! Or over TCP:
//! ```bash
//! agentx-demo --tcp 127.0.0.1:705
//! ```

/// Command-line configuration and session parameters.
pub mod configuration;
/// Packet-id allocation and Response matching.
pub mod correlator;
/// Get / GetNext / GetBulk and Set transaction processing.
pub mod dispatcher;
/// Error type shared by the whole crate.
pub mod error;
/// Object identifiers.
pub mod oid;
/// PDU structures and wire encoding.
pub mod pdu;
/// Subtree registrations and the variable registry.
pub mod registry;
/// Session state machine and request loop.
pub mod session;
/// Stream transports to the master agent.
pub mod transport;
/// SNMP values and variable bindings.
pub mod value;
/// The managed-object capability and stock implementations.
pub mod variable;

pub use configuration::SessionConfig;
pub use error::{AgentXError, Result};
pub use oid::Oid;
pub use pdu::{CloseReason, ResponseError};
pub use registry::Registration;
pub use session::{IndexAllocation, Session, SessionEvent, SessionState};
pub use transport::{StreamTransport, Transport};
pub use value::{Value, ValueKind, VarBind, VarBindPayload};
pub use variable::{Computed, GetError, Scalar, TestSetResult, Variable};
