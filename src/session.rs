//! The sub-agent side of one AgentX session (RFC 2741 §7.1).
//!
//! A [`Session`] owns its transport and is driven from a single task. Every
//! request it sends waits for the matching Response; PDUs the master sends
//! in the meantime (Get, TestSet, ...) are dispatched while waiting, so the
//! master never stalls on us.
//!
//! ```rust,no_run
//! use agentx_subagent::{transport, Registration, Session, SessionConfig, Scalar, Value};
//!
//! # async fn example() -> agentx_subagent::Result<()> {
//! let transport = transport::connect_unix("/var/agentx/master").await?;
//! let mut session = Session::open(transport, SessionConfig::default()).await?;
//!
//! let subtree: agentx_subagent::Oid = "1.3.6.1.4.1.99999".parse()?;
//! session.register_subtree(Registration::new(subtree.clone())).await?;
//! session.add_variable(subtree.child(1).child(0), Scalar::new(Value::Integer(42)))?;
//! session.run().await
//! # }
//! ```

use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    configuration::SessionConfig,
    correlator::{Correlator, Reply},
    dispatcher::{Dispatch, Dispatcher},
    error::{AgentXError, Result},
    oid::{snmp_trap_oid_0, sys_uptime_0, Oid},
    pdu::{CloseReason, OpenPdu, Pdu, PduBody, PduType, ResponseError, ResponsePdu},
    registry::{Registration, VariableRegistry},
    transport::Transport,
    value::{Value, VarBind},
    variable::Variable,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Opening,
    Open,
    Closing,
}

/// Notifications about things that happen to the session outside of the
/// caller's own requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// The master closed the session.
    MasterClosed(CloseReason),
    /// A PDU a sub-agent does not handle was received and dropped.
    PduIgnored(PduType),
    /// An incoming PDU could not be decoded and was dropped.
    ParseFailure(String),
}

/// How the master should pick the index values in an IndexAllocate request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IndexAllocation {
    /// Allocate exactly the values given.
    #[default]
    Exact,
    /// Any value never allocated before (new_index flag).
    New,
    /// Any value not currently allocated (any_index flag).
    Any,
}

/// Maps an error the master returned for one of our requests.
fn master_error(error: ResponseError) -> AgentXError {
    match error {
        ResponseError::ParseError
        | ResponseError::UnsupportedContext
        | ResponseError::UnknownAgentCaps => AgentXError::Internal,
        ResponseError::NotOpen => AgentXError::Disconnected,
        ResponseError::ProcessingError => AgentXError::MasterUnable,
        ResponseError::RequestDenied => AgentXError::MasterUnwilling,
        ResponseError::DuplicateRegistration => AgentXError::DuplicateRegistration,
        ResponseError::UnknownRegistration => AgentXError::UnknownRegistration,
        ResponseError::IndexWrongType
        | ResponseError::IndexAlreadyAllocated
        | ResponseError::IndexNoneAvailable
        | ResponseError::IndexNotAllocated => AgentXError::Index(error),
        other => AgentXError::Parse(format!("unexpected response error {:?}", other)),
    }
}

/// An AgentX sub-agent session with a master agent.
pub struct Session<T> {
    transport: Option<T>,
    config: SessionConfig,
    state: SessionState,
    session_id: u32,
    correlator: Correlator,
    dispatcher: Dispatcher,
    registrations: Vec<Registration>,
    variables: VariableRegistry,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl<T: Transport> Session<T> {
    /// Creates a disconnected session; see [`Session::connect`].
    pub fn new(config: SessionConfig) -> Self {
        Session {
            transport: None,
            config,
            state: SessionState::Disconnected,
            session_id: 0,
            correlator: Correlator::new(),
            dispatcher: Dispatcher::new(),
            registrations: Vec::new(),
            variables: VariableRegistry::new(),
            events: None,
        }
    }

    /// Opens a session with the master reachable over `transport`.
    ///
    /// Any failure to open leaves nothing behind and yields `Disconnected`.
    pub async fn open(transport: T, config: SessionConfig) -> Result<Self> {
        let mut session = Session::new(config);
        session.connect(transport).await?;
        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Session id assigned by the master; 0 before the first Open.
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Registrations the master has accepted.
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    pub fn variables(&self) -> &VariableRegistry {
        &self.variables
    }

    /// Subscribes to session events. A new subscription replaces the previous one.
    pub fn events(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        rx
    }

    fn emit(&mut self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).is_err() {
                self.events = None;
            }
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::debug!("Session state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Open {
            Ok(())
        } else {
            Err(AgentXError::Disconnected)
        }
    }

    /// Drops the transport and everything that only made sense on it.
    fn lose_connection(&mut self) {
        self.transport = None;
        self.correlator.clear();
        self.dispatcher.abort(&mut self.variables);
        self.set_state(SessionState::Disconnected);
    }

    /// Opens the session over `transport`, replacing any previous connection.
    ///
    /// Remembered registrations are replayed when the configuration asks
    /// for it; otherwise they are forgotten along with all variables.
    pub async fn connect(&mut self, transport: T) -> Result<()> {
        if self.transport.is_some() {
            log::warn!("Dropping the current connection of session {}", self.session_id);
            self.lose_connection();
        }
        self.transport = Some(transport);
        self.session_id = 0;
        self.set_state(SessionState::Opening);

        let pdu = Pdu::new(PduBody::Open(OpenPdu {
            timeout: self.config.default_timeout,
            id: self.config.id.clone().with_include(false),
            description: Bytes::from(self.config.description.clone()),
        }));
        let reply = match self.request(pdu).await {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("AgentX Open failed: {}", e);
                self.lose_connection();
                return Err(AgentXError::Disconnected);
            }
        };
        if !reply.response.is_ok() {
            log::warn!("Master agent refused Open: {:?}", reply.response.error);
            self.lose_connection();
            return Err(AgentXError::Disconnected);
        }
        self.session_id = reply.session_id;
        self.set_state(SessionState::Open);
        log::info!("AgentX session opened (session_id={})", self.session_id);

        if self.config.replay_registrations {
            self.replay_registrations().await
        } else {
            self.registrations.clear();
            self.variables.clear();
            Ok(())
        }
    }

    /// Reopens the session over a fresh transport after the old one was lost.
    pub async fn reconnect(&mut self, transport: T) -> Result<()> {
        log::info!(
            "Reconnecting AgentX session ({} registrations remembered)",
            self.registrations.len()
        );
        self.connect(transport).await
    }

    async fn replay_registrations(&mut self) -> Result<()> {
        let mut previous = std::mem::take(&mut self.registrations).into_iter();
        while let Some(registration) = previous.next() {
            if let Err(e) = self.register_subtree(registration.clone()).await {
                if e.is_fatal() {
                    self.registrations.push(registration);
                    self.registrations.extend(previous);
                    return Err(e);
                }
                log::warn!(
                    "Dropping registration of {} refused after reconnect: {}",
                    registration.subtree,
                    e
                );
            }
        }
        self.variables.retain_covered(&self.registrations);
        Ok(())
    }

    /// Unregisters everything, closes the session and the transport.
    ///
    /// Best effort: failures along the way are logged and swallowed.
    /// Registrations stay remembered for a later [`Session::reconnect`].
    pub async fn close(&mut self, reason: CloseReason) {
        if self.transport.is_none() {
            self.set_state(SessionState::Disconnected);
            return;
        }
        self.set_state(SessionState::Closing);

        let registrations = self.registrations.clone();
        for registration in &registrations {
            if self.transport.is_none() {
                break;
            }
            let pdu = Pdu::new(PduBody::Unregister(registration.to_unregister_pdu()));
            match self.request(pdu).await {
                Ok(reply) if reply.response.is_ok() => {
                    log::info!("Unregistered OID subtree {}", registration.subtree)
                }
                Ok(reply) => log::warn!(
                    "Master agent refused to unregister {}: {:?}",
                    registration.subtree,
                    reply.response.error
                ),
                Err(e) => log::warn!("Unregistering {} failed: {}", registration.subtree, e),
            }
        }

        if self.transport.is_some() {
            if let Err(e) = self.request(Pdu::new(PduBody::Close(reason))).await {
                log::warn!("Close of session {} not acknowledged: {}", self.session_id, e);
            }
        }
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.shutdown().await {
                log::debug!("Transport shutdown failed: {}", e);
            }
        }
        self.lose_connection();
        log::info!("AgentX session {} closed ({:?})", self.session_id, reason);
    }

    /// Registers a MIB region with the master (RFC 2741 §6.2.3).
    pub async fn register_subtree(&mut self, registration: Registration) -> Result<()> {
        self.ensure_open()?;
        let mut pdu = Pdu::new(PduBody::Register(registration.to_register_pdu()));
        pdu.flags.instance_registration = registration.instance;
        let reply = self.request(pdu).await?;
        self.check(&reply.response)?;

        log::info!(
            "Registered OID subtree {} (priority {})",
            registration.subtree,
            registration.priority
        );
        self.registrations.push(registration);
        Ok(())
    }

    /// Unregisters every simple registration of `subtree` at `priority`.
    ///
    /// Variables no longer covered by any registration are removed.
    pub async fn unregister_subtree(&mut self, subtree: &Oid, priority: u8) -> Result<()> {
        self.ensure_open()?;
        let is_target =
            |r: &Registration| r.is_simple() && r.subtree == *subtree && r.priority == priority;
        let Some(registration) = self.registrations.iter().find(|r| is_target(*r)).cloned() else {
            return Err(AgentXError::UnknownRegistration);
        };

        let pdu = Pdu::new(PduBody::Unregister(registration.to_unregister_pdu()));
        let reply = self.request(pdu).await?;
        self.check(&reply.response)?;

        self.registrations.retain(|r| !is_target(r));
        self.variables.retain_covered(&self.registrations);
        log::info!("Unregistered OID subtree {}", subtree);
        Ok(())
    }

    /// Serves `var` at `oid`, which must lie in a registered subtree.
    pub fn add_variable(&mut self, oid: Oid, var: impl Variable + 'static) -> Result<()> {
        self.variables.add(&self.registrations, oid, Box::new(var))
    }

    /// Stops serving `oid`. Returns false if nothing was there.
    pub fn remove_variable(&mut self, oid: &Oid) -> bool {
        self.variables.remove(oid).is_some()
    }

    /// Sends a notification (RFC 2741 §6.2.10).
    ///
    /// The varbind list starts with `sysUpTime.0` (when given) and
    /// `snmpTrapOID.0`, followed by `varbinds`.
    pub async fn send_notification(
        &mut self,
        sys_uptime: Option<u32>,
        trap_oid: Oid,
        varbinds: Vec<VarBind>,
    ) -> Result<()> {
        self.ensure_open()?;
        let mut list = Vec::with_capacity(varbinds.len() + 2);
        if let Some(ticks) = sys_uptime {
            list.push(VarBind::new(sys_uptime_0(), Value::TimeTicks(ticks)));
        }
        list.push(VarBind::new(
            snmp_trap_oid_0(),
            Value::ObjectIdentifier(trap_oid.with_include(false)),
        ));
        list.extend(varbinds);

        let reply = self.request(Pdu::new(PduBody::Notify(list))).await?;
        match reply.response.error {
            ResponseError::NoAgentXError => Ok(()),
            ResponseError::ProcessingError => Err(AgentXError::MasterUnable),
            ResponseError::UnsupportedContext => Err(AgentXError::UnsupportedContext),
            other => {
                log::warn!("Master agent rejected notification with {:?}", other);
                self.close(CloseReason::ProtocolError).await;
                Err(AgentXError::Disconnected)
            }
        }
    }

    /// Checks that the master is still there (RFC 2741 §6.2.11).
    pub async fn ping(&mut self) -> Result<()> {
        self.ensure_open()?;
        let reply = self.request(Pdu::new(PduBody::Ping)).await?;
        self.check(&reply.response)
    }

    /// Advertises an agent capabilities statement (RFC 2741 §6.2.14).
    pub async fn add_agent_caps(&mut self, id: Oid, description: &str) -> Result<()> {
        self.ensure_open()?;
        let pdu = Pdu::new(PduBody::AddAgentCaps {
            id: id.with_include(false),
            description: Bytes::copy_from_slice(description.as_bytes()),
        });
        let reply = self.request(pdu).await?;
        self.check(&reply.response)
    }

    pub async fn remove_agent_caps(&mut self, id: &Oid) -> Result<()> {
        self.ensure_open()?;
        let pdu = Pdu::new(PduBody::RemoveAgentCaps {
            id: id.clone().with_include(false),
        });
        let reply = self.request(pdu).await?;
        self.check(&reply.response)
    }

    /// Allocates index values (RFC 2741 §6.2.12) and returns the ones the
    /// master picked.
    pub async fn allocate_index(
        &mut self,
        varbinds: Vec<VarBind>,
        allocation: IndexAllocation,
    ) -> Result<Vec<VarBind>> {
        self.ensure_open()?;
        let mut pdu = Pdu::new(PduBody::IndexAllocate(varbinds));
        pdu.flags.new_index = allocation == IndexAllocation::New;
        pdu.flags.any_index = allocation == IndexAllocation::Any;
        let reply = self.request(pdu).await?;
        self.check(&reply.response)?;
        Ok(reply.response.varbinds)
    }

    /// Releases index values (RFC 2741 §6.2.13).
    pub async fn deallocate_index(&mut self, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        self.ensure_open()?;
        let reply = self.request(Pdu::new(PduBody::IndexDeallocate(varbinds))).await?;
        self.check(&reply.response)?;
        Ok(reply.response.varbinds)
    }

    /// Serves master requests until the session is closed.
    ///
    /// Returns `Ok` when the master closes the session and an error when
    /// the transport fails.
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like [`Session::run`], but also returns `Ok` once `shutdown` completes.
    ///
    /// `shutdown` only interrupts the wait for the next frame, never the
    /// handling of one, so a following [`Session::close`] finds the stream
    /// intact.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        while self.state == SessionState::Open {
            let frame = tokio::select! {
                frame = self.receive_frame() => frame?,
                () = &mut shutdown => break,
            };
            self.process_frame(&frame).await?;
        }
        log::debug!("Request loop of session {} finished", self.session_id);
        Ok(())
    }

    /// Reads and handles one incoming PDU.
    pub async fn process_next(&mut self) -> Result<()> {
        self.ensure_open()?;
        let frame = self.receive_frame().await?;
        self.process_frame(&frame).await
    }

    async fn process_frame(&mut self, frame: &[u8]) -> Result<()> {
        if let Some(pdu) = self.decode_frame(frame) {
            if pdu.pdu_type() == PduType::Response {
                // Nothing is outstanding here, so the correlator drops it.
                let _ = self.correlator.accept(pdu);
            } else {
                self.handle_incoming(pdu).await?;
            }
        }
        Ok(())
    }

    /// Fails with the local equivalent of a non-success `response`.
    fn check(&mut self, response: &ResponsePdu) -> Result<()> {
        if response.is_ok() {
            return Ok(());
        }
        let err = master_error(response.error);
        if matches!(err, AgentXError::Disconnected) {
            log::warn!("Master agent reports session {} is not open", self.session_id);
            self.lose_connection();
        }
        Err(err)
    }

    /// Sends `pdu` and waits for its Response, dispatching anything else
    /// that arrives meanwhile.
    async fn request(&mut self, mut pdu: Pdu) -> Result<Reply> {
        if self.transport.is_none() {
            return Err(AgentXError::Disconnected);
        }
        let packet_id = self.correlator.next_packet_id();
        pdu.session_id = self.session_id;
        pdu.packet_id = packet_id;
        if let Err(e) = self.send_pdu(&pdu).await {
            self.correlator.cancel(packet_id);
            return Err(e);
        }

        let limit = self.config.response_timeout;
        match tokio::time::timeout(limit, self.await_reply(packet_id)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                self.correlator.cancel(packet_id);
                Err(e)
            }
            Err(_) => {
                log::warn!("No response to {} within {:?}", pdu, limit);
                self.correlator.cancel(packet_id);
                self.lose_connection();
                Err(AgentXError::Timeout(limit))
            }
        }
    }

    async fn await_reply(&mut self, packet_id: u32) -> Result<Reply> {
        loop {
            let frame = self.receive_frame().await?;
            let Some(pdu) = self.decode_frame(&frame) else {
                continue;
            };
            if pdu.pdu_type() == PduType::Response {
                if let Some(reply) = self.correlator.accept(pdu) {
                    if reply.packet_id == packet_id {
                        return Ok(reply);
                    }
                    log::debug!(
                        "Response to packet {} arrived while waiting for {}",
                        reply.packet_id,
                        packet_id
                    );
                }
                continue;
            }
            self.handle_incoming(pdu).await?;
            if self.transport.is_none() {
                return Err(AgentXError::Disconnected);
            }
        }
    }

    /// Handles a PDU initiated by the master.
    async fn handle_incoming(&mut self, pdu: Pdu) -> Result<()> {
        if let PduBody::Close(reason) = pdu.body {
            log::info!(
                "Master agent closed session {} ({:?})",
                self.session_id,
                reason
            );
            self.emit(SessionEvent::MasterClosed(reason));
            self.lose_connection();
            return Ok(());
        }

        match self
            .dispatcher
            .dispatch(self.session_id, &mut self.variables, &pdu)
        {
            Dispatch::Reply(response) => self.send_pdu(&response).await,
            Dispatch::NoReply => Ok(()),
            Dispatch::Ignored => {
                log::warn!("Ignoring unexpected {}", pdu);
                self.emit(SessionEvent::PduIgnored(pdu.pdu_type()));
                Ok(())
            }
        }
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Option<Pdu> {
        match Pdu::decode(frame) {
            Ok(pdu) => {
                log::trace!("Received {} ({} bytes)", pdu, frame.len());
                Some(pdu)
            }
            Err(AgentXError::Version(version)) => {
                log::warn!("Ignoring PDU with unsupported version {}", version);
                None
            }
            Err(e) => {
                log::warn!("Dropping malformed PDU: {}", e);
                self.emit(SessionEvent::ParseFailure(e.to_string()));
                None
            }
        }
    }

    async fn send_pdu(&mut self, pdu: &Pdu) -> Result<()> {
        let frame = pdu.encode()?;
        let transport = self.transport.as_mut().ok_or(AgentXError::Disconnected)?;
        log::trace!("Sending {} ({} bytes)", pdu, frame.len());
        if let Err(e) = transport.send(&frame).await {
            log::warn!("Failed to send {}: {}", pdu, e);
            self.lose_connection();
            return Err(e);
        }
        Ok(())
    }

    /// Reads the next frame. The stream cannot be resynchronised after a
    /// framing error, so any failure drops the connection.
    async fn receive_frame(&mut self) -> Result<Bytes> {
        let transport = self.transport.as_mut().ok_or(AgentXError::Disconnected)?;
        match transport.receive().await {
            Ok(frame) => Ok(frame),
            Err(e) => {
                log::warn!("Lost connection to master agent: {}", e);
                self.lose_connection();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_master_error_mapping() {
        assert!(matches!(master_error(ResponseError::ParseError), AgentXError::Internal));
        assert!(matches!(master_error(ResponseError::NotOpen), AgentXError::Disconnected));
        assert!(matches!(
            master_error(ResponseError::UnsupportedContext),
            AgentXError::Internal
        ));
        assert!(matches!(
            master_error(ResponseError::ProcessingError),
            AgentXError::MasterUnable
        ));
        assert!(matches!(
            master_error(ResponseError::RequestDenied),
            AgentXError::MasterUnwilling
        ));
        assert!(matches!(
            master_error(ResponseError::DuplicateRegistration),
            AgentXError::DuplicateRegistration
        ));
        assert!(matches!(
            master_error(ResponseError::UnknownRegistration),
            AgentXError::UnknownRegistration
        ));
        assert!(matches!(
            master_error(ResponseError::UnknownAgentCaps),
            AgentXError::Internal
        ));
        assert!(matches!(
            master_error(ResponseError::IndexNoneAvailable),
            AgentXError::Index(ResponseError::IndexNoneAvailable)
        ));
        assert!(matches!(master_error(ResponseError::GenErr), AgentXError::Parse(_)));
    }

    #[test]
    fn test_new_session_is_disconnected() {
        let session: Session<crate::transport::StreamTransport<tokio::io::DuplexStream>> =
            Session::new(SessionConfig::default());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.session_id(), 0);
        assert!(session.registrations().is_empty());
    }

    #[tokio::test]
    async fn test_requests_need_open_session() {
        let mut session: Session<crate::transport::StreamTransport<tokio::io::DuplexStream>> =
            Session::new(SessionConfig::default());
        assert!(matches!(session.ping().await, Err(AgentXError::Disconnected)));
        assert!(matches!(
            session
                .register_subtree(Registration::new("1.3.6.1.4.1.1".parse().unwrap()))
                .await,
            Err(AgentXError::Disconnected)
        ));
        assert!(matches!(session.process_next().await, Err(AgentXError::Disconnected)));
        session.close(CloseReason::Shutdown).await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }
}
