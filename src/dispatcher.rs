//! Sub-agent processing of master requests (RFC 2741 §7.2).
//!
//! The dispatcher turns an incoming request PDU into its Response, reading
//! and driving the variables in a [`VariableRegistry`]. It owns the state of
//! the single Set transaction a session may have in flight.

use crate::{
    oid::Oid,
    pdu::{GetBulkPdu, Pdu, PduBody, ResponseError, ResponsePdu, SearchRange},
    registry::VariableRegistry,
    value::{VarBind, VarBindPayload},
    variable::{GetError, TestSetResult},
};

/// What the session should do after dispatching a PDU.
#[derive(Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Send this Response to the master.
    Reply(Pdu),
    /// Processed; the protocol calls for no Response (CleanupSet).
    NoReply,
    /// Not a request a sub-agent handles.
    Ignored,
}

/// Request processor for one session.
#[derive(Default)]
pub struct Dispatcher {
    /// Variables that took part in the current TestSet, in varbind order.
    setlist: Vec<Oid>,
}

/// Converts a 0-based position into a 1-based varbind index.
fn index_of(pos: usize) -> u16 {
    u16::try_from(pos + 1).unwrap_or(u16::MAX)
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// OIDs of the variables in the in-flight Set transaction.
    pub fn setlist(&self) -> &[Oid] {
        &self.setlist
    }

    /// Drops an unfinished Set transaction, releasing what TestSet reserved.
    pub fn abort(&mut self, registry: &mut VariableRegistry) {
        if !self.setlist.is_empty() {
            log::warn!("Aborting Set transaction on {} variables", self.setlist.len());
            self.handle_cleanup_set(registry);
        }
    }

    /// Processes `pdu` on behalf of session `session_id`.
    pub fn dispatch(
        &mut self,
        session_id: u32,
        registry: &mut VariableRegistry,
        pdu: &Pdu,
    ) -> Dispatch {
        let is_request = matches!(
            pdu.body,
            PduBody::Get(_)
                | PduBody::GetNext(_)
                | PduBody::GetBulk(_)
                | PduBody::TestSet(_)
                | PduBody::CommitSet
                | PduBody::UndoSet
                | PduBody::CleanupSet
        );
        if !is_request {
            return Dispatch::Ignored;
        }

        if pdu.session_id != session_id {
            log::warn!(
                "{} for unknown session (ours is {}), answering notOpen",
                pdu,
                session_id
            );
            let mut resp = ResponsePdu::new();
            resp.error = ResponseError::NotOpen;
            return Dispatch::Reply(Pdu::reply_to(pdu, resp));
        }

        log::debug!("Dispatching {}", pdu);
        let resp = match &pdu.body {
            PduBody::Get(ranges) => self.handle_get(registry, ranges),
            PduBody::GetNext(ranges) => self.handle_get_next(registry, ranges),
            PduBody::GetBulk(bulk) => self.handle_get_bulk(registry, bulk),
            PduBody::TestSet(varbinds) => self.handle_test_set(registry, varbinds),
            PduBody::CommitSet => self.handle_commit_set(registry),
            PduBody::UndoSet => self.handle_undo_set(registry),
            PduBody::CleanupSet => {
                self.handle_cleanup_set(registry);
                return Dispatch::NoReply;
            }
            _ => return Dispatch::Ignored,
        };
        if !resp.is_ok() {
            log::debug!("{} failed: {:?} at index {}", pdu, resp.error, resp.index);
        }
        Dispatch::Reply(Pdu::reply_to(pdu, resp))
    }

    /// RFC 2741 §7.2.3.1.
    fn handle_get(&mut self, registry: &mut VariableRegistry, ranges: &[SearchRange]) -> ResponsePdu {
        let mut resp = ResponsePdu::new();
        for (pos, range) in ranges.iter().enumerate() {
            let name = range.start.clone().with_include(false);
            let vb = if let Some(var) = registry.get_mut(&name) {
                match var.get() {
                    Ok(value) => VarBind::new(name, value),
                    Err(e) => {
                        log::warn!("Get of {} failed: {}", name, e);
                        resp.fail(ResponseError::GenErr, index_of(pos));
                        return resp;
                    }
                }
            } else if registry.contains(&name.child(0)) {
                VarBind::with_payload(name, VarBindPayload::NoSuchInstance)
            } else {
                VarBind::with_payload(name, VarBindPayload::NoSuchObject)
            };
            resp.varbinds.push(vb);
        }
        resp
    }

    /// RFC 2741 §7.2.3.2.
    fn handle_get_next(
        &mut self,
        registry: &mut VariableRegistry,
        ranges: &[SearchRange],
    ) -> ResponsePdu {
        let mut resp = ResponsePdu::new();
        for (pos, range) in ranges.iter().enumerate() {
            match next_in_range(registry, &range.start, &range.end) {
                Ok(vb) => resp.varbinds.push(vb),
                Err(e) => {
                    log::warn!("GetNext from {} failed: {}", range.start, e);
                    resp.fail(ResponseError::GenErr, index_of(pos));
                    return resp;
                }
            }
        }
        resp
    }

    /// RFC 2741 §7.2.3.3. Repetitions are emitted row by row, as in SNMP GetBulk.
    fn handle_get_bulk(&mut self, registry: &mut VariableRegistry, bulk: &GetBulkPdu) -> ResponsePdu {
        let mut resp = ResponsePdu::new();
        let non_repeaters = (bulk.non_repeaters as usize).min(bulk.ranges.len());
        let (singles, repeaters) = bulk.ranges.split_at(non_repeaters);

        for range in singles {
            match next_in_range(registry, &range.start, &range.end) {
                Ok(vb) => resp.varbinds.push(vb),
                Err(e) => {
                    log::warn!("GetBulk from {} failed: {}", range.start, e);
                    let pos = resp.varbinds.len();
                    resp.fail(ResponseError::GenErr, index_of(pos));
                    return resp;
                }
            }
        }

        // Each repeater continues from where its previous repetition ended.
        let mut cursors: Vec<(Oid, bool)> = repeaters.iter().map(|r| (r.start.clone(), false)).collect();
        for _ in 0..bulk.max_repetitions {
            if cursors.is_empty() || cursors.iter().all(|(_, ended)| *ended) {
                break;
            }
            for (range, (cursor, ended)) in repeaters.iter().zip(cursors.iter_mut()) {
                if *ended {
                    resp.varbinds.push(VarBind::with_payload(
                        cursor.clone().with_include(false),
                        VarBindPayload::EndOfMibView,
                    ));
                    continue;
                }
                match next_in_range(registry, cursor, &range.end) {
                    Ok(vb) => {
                        match vb.payload {
                            VarBindPayload::EndOfMibView => *ended = true,
                            _ => *cursor = vb.name.clone(),
                        }
                        resp.varbinds.push(vb);
                    }
                    Err(e) => {
                        log::warn!("GetBulk from {} failed: {}", cursor, e);
                        let pos = resp.varbinds.len();
                        resp.fail(ResponseError::GenErr, index_of(pos));
                        return resp;
                    }
                }
            }
        }
        resp
    }

    /// RFC 2741 §7.2.4.1. The first failing varbind aborts the transaction.
    fn handle_test_set(&mut self, registry: &mut VariableRegistry, varbinds: &[VarBind]) -> ResponsePdu {
        if !self.setlist.is_empty() {
            log::warn!(
                "TestSet while a previous Set transaction ({} variables) is pending, cleaning it up",
                self.setlist.len()
            );
            self.handle_cleanup_set(registry);
        }

        let mut resp = ResponsePdu::new();
        for (pos, vb) in varbinds.iter().enumerate() {
            let Some(var) = registry.get_mut(&vb.name) else {
                resp.fail(ResponseError::NotWritable, index_of(pos));
                self.handle_cleanup_set(registry);
                return resp;
            };
            self.setlist.push(vb.name.clone());

            let result = match vb.value() {
                Some(value) if value.kind() == var.kind() => var.test_set(value),
                _ => TestSetResult::WrongType,
            };
            if result != TestSetResult::NoError {
                resp.fail(result.into(), index_of(pos));
                self.handle_cleanup_set(registry);
                return resp;
            }
        }
        resp
    }

    /// RFC 2741 §7.2.4.2. Stops at the first failure; variables committed
    /// before it stay committed until the master sends UndoSet.
    fn handle_commit_set(&mut self, registry: &mut VariableRegistry) -> ResponsePdu {
        let mut resp = ResponsePdu::new();
        for (pos, oid) in self.setlist.iter().enumerate() {
            let committed = registry.get_mut(oid).map(|v| v.commit_set()).unwrap_or(false);
            if !committed {
                resp.fail(ResponseError::CommitFailed, index_of(pos));
                return resp;
            }
        }
        resp
    }

    /// RFC 2741 §7.2.4.3. Every variable is undone; the first failure is reported.
    fn handle_undo_set(&mut self, registry: &mut VariableRegistry) -> ResponsePdu {
        let mut resp = ResponsePdu::new();
        for (pos, oid) in self.setlist.iter().enumerate() {
            let undone = registry.get_mut(oid).map(|v| v.undo_set()).unwrap_or(false);
            if !undone && resp.is_ok() {
                resp.fail(ResponseError::UndoFailed, index_of(pos));
            }
        }
        self.setlist.clear();
        resp
    }

    /// RFC 2741 §7.2.4.4. Releases resources in reverse order of allocation.
    fn handle_cleanup_set(&mut self, registry: &mut VariableRegistry) {
        for oid in self.setlist.iter().rev() {
            if let Some(var) = registry.get_mut(oid) {
                var.cleanup_set();
            }
        }
        self.setlist.clear();
    }
}

/// Finds the first variable after `start` (or at it, when `start.include()`)
/// that precedes a non-null `end`, and reads it.
fn next_in_range(
    registry: &mut VariableRegistry,
    start: &Oid,
    end: &Oid,
) -> Result<VarBind, GetError> {
    let candidate = registry
        .successor(start, start.include())
        .filter(|oid| end.is_null() || *oid < end)
        .cloned();

    if let Some(oid) = candidate {
        if let Some(var) = registry.get_mut(&oid) {
            let value = var.get()?;
            return Ok(VarBind::new(oid, value));
        }
    }
    Ok(VarBind::with_payload(
        start.clone().with_include(false),
        VarBindPayload::EndOfMibView,
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{
        registry::Registration,
        value::{Value, ValueKind},
        variable::{Scalar, Variable},
    };

    const SESSION: u32 = 7;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn regs() -> Vec<Registration> {
        vec![Registration::new(oid("1.3.6.1.4.1"))]
    }

    fn request(body: PduBody) -> Pdu {
        let mut pdu = Pdu::new(body);
        pdu.session_id = SESSION;
        pdu.transaction_id = 3;
        pdu.packet_id = 11;
        pdu
    }

    fn reply(d: Dispatch) -> ResponsePdu {
        match d {
            Dispatch::Reply(Pdu {
                body: PduBody::Response(resp),
                ..
            }) => resp,
            other => panic!("Expected Response, got {:?}", other),
        }
    }

    fn get(names: &[&str]) -> PduBody {
        PduBody::Get(
            names
                .iter()
                .map(|n| SearchRange::new(oid(n), Oid::null()))
                .collect(),
        )
    }

    /// Records every set-phase call it receives into a shared journal.
    struct Probe {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        test_result: TestSetResult,
        commit_ok: bool,
        undo_ok: bool,
        fail_get: bool,
    }

    impl Probe {
        fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Self {
            Probe {
                name,
                journal: journal.clone(),
                test_result: TestSetResult::NoError,
                commit_ok: true,
                undo_ok: true,
                fail_get: false,
            }
        }

        fn log(&self, what: &str) {
            self.journal.lock().unwrap().push(format!("{}:{}", what, self.name));
        }
    }

    impl Variable for Probe {
        fn kind(&self) -> ValueKind {
            ValueKind::Integer
        }

        fn get(&mut self) -> Result<Value, GetError> {
            self.log("get");
            if self.fail_get {
                Err(GetError("probe".to_string()))
            } else {
                Ok(Value::Integer(1))
            }
        }

        fn test_set(&mut self, _value: &Value) -> TestSetResult {
            self.log("test");
            self.test_result
        }

        fn cleanup_set(&mut self) {
            self.log("cleanup");
        }

        fn commit_set(&mut self) -> bool {
            self.log("commit");
            self.commit_ok
        }

        fn undo_set(&mut self) -> bool {
            self.log("undo");
            self.undo_ok
        }
    }

    fn sample_registry() -> VariableRegistry {
        let mut reg = VariableRegistry::new();
        reg.add(&regs(), oid("1.3.6.1.4.1.1.0"), Box::new(Scalar::new(Value::Integer(42))))
            .unwrap();
        reg.add(&regs(), oid("1.3.6.1.4.1.2.0"), Box::new(Scalar::new(Value::string("two"))))
            .unwrap();
        reg
    }

    #[test]
    fn test_get_exact_instance_object() {
        let mut reg = sample_registry();
        let mut d = Dispatcher::new();
        let pdu = request(get(&["1.3.6.1.4.1.1.0", "1.3.6.1.4.1.1", "1.3.6.1.4.1.99"]));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert!(resp.is_ok());
        assert_eq!(resp.varbinds.len(), 3);
        assert_eq!(resp.varbinds[0], VarBind::new(oid("1.3.6.1.4.1.1.0"), Value::Integer(42)));
        assert_eq!(resp.varbinds[1].payload, VarBindPayload::NoSuchInstance);
        assert_eq!(resp.varbinds[1].name, oid("1.3.6.1.4.1.1"));
        assert_eq!(resp.varbinds[2].payload, VarBindPayload::NoSuchObject);
    }

    #[test]
    fn test_response_echoes_request_ids() {
        let mut reg = sample_registry();
        let mut d = Dispatcher::new();
        let pdu = request(get(&["1.3.6.1.4.1.1.0"]));
        match d.dispatch(SESSION, &mut reg, &pdu) {
            Dispatch::Reply(r) => {
                assert_eq!(r.session_id, SESSION);
                assert_eq!(r.transaction_id, 3);
                assert_eq!(r.packet_id, 11);
            }
            other => panic!("Expected Reply, got {:?}", other),
        }
    }

    #[test]
    fn test_get_failure_discards_varbinds() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = sample_registry();
        let mut probe = Probe::new("p", &journal);
        probe.fail_get = true;
        reg.add(&regs(), oid("1.3.6.1.4.1.3.0"), Box::new(probe)).unwrap();

        let mut d = Dispatcher::new();
        let pdu = request(get(&["1.3.6.1.4.1.1.0", "1.3.6.1.4.1.3.0", "1.3.6.1.4.1.2.0"]));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert_eq!(resp.error, ResponseError::GenErr);
        assert_eq!(resp.index, 2);
        assert!(resp.varbinds.is_empty());
    }

    #[test]
    fn test_get_next_exclusive_and_inclusive() {
        let mut reg = sample_registry();
        let mut d = Dispatcher::new();

        let pdu = request(PduBody::GetNext(vec![
            SearchRange::new(oid("1.3.6.1.4.1.1.0"), Oid::null()),
            SearchRange::new(oid("1.3.6.1.4.1.1.0").with_include(true), Oid::null()),
        ]));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert_eq!(resp.varbinds[0].name, oid("1.3.6.1.4.1.2.0"));
        assert_eq!(resp.varbinds[0].value(), Some(&Value::string("two")));
        assert_eq!(resp.varbinds[1].name, oid("1.3.6.1.4.1.1.0"));
    }

    #[test]
    fn test_get_next_respects_end_bound() {
        let mut reg = sample_registry();
        let mut d = Dispatcher::new();
        let pdu = request(PduBody::GetNext(vec![SearchRange::new(
            oid("1.3.6.1.4.1.1.0"),
            oid("1.3.6.1.4.1.2.0"),
        )]));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert!(resp.is_ok());
        assert_eq!(resp.varbinds[0].payload, VarBindPayload::EndOfMibView);
        assert_eq!(resp.varbinds[0].name, oid("1.3.6.1.4.1.1.0"));
    }

    #[test]
    fn test_get_next_past_last() {
        let mut reg = sample_registry();
        let mut d = Dispatcher::new();
        let pdu = request(PduBody::GetNext(vec![SearchRange::new(
            oid("1.3.6.1.4.1.2.0").with_include(true),
            Oid::null(),
        ), SearchRange::new(oid("1.3.6.1.4.1.2.0"), Oid::null())]));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert_eq!(resp.varbinds[0].name, oid("1.3.6.1.4.1.2.0"));
        assert_eq!(resp.varbinds[1].payload, VarBindPayload::EndOfMibView);
        assert!(!resp.varbinds[1].name.include());
    }

    #[test]
    fn test_get_bulk_non_repeaters_and_repetitions() {
        let mut reg = sample_registry();
        reg.add(&regs(), oid("1.3.6.1.4.1.3.0"), Box::new(Scalar::new(Value::Counter32(3))))
            .unwrap();
        let mut d = Dispatcher::new();
        let pdu = request(PduBody::GetBulk(GetBulkPdu {
            non_repeaters: 1,
            max_repetitions: 3,
            ranges: vec![
                SearchRange::new(oid("1.3.6.1.4.1"), Oid::null()),
                SearchRange::new(oid("1.3.6.1.4.1.1.0"), Oid::null()),
            ],
        }));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        let names: Vec<String> = resp.varbinds.iter().map(|vb| vb.name.to_string()).collect();
        assert_eq!(
            names,
            vec![
                ".1.3.6.1.4.1.1.0",
                ".1.3.6.1.4.1.2.0",
                ".1.3.6.1.4.1.3.0",
                ".1.3.6.1.4.1.3.0",
            ]
        );
        assert_eq!(resp.varbinds[3].payload, VarBindPayload::EndOfMibView);
    }

    #[test]
    fn test_get_bulk_interleaves_repeaters() {
        let mut reg = sample_registry();
        let mut d = Dispatcher::new();
        let pdu = request(PduBody::GetBulk(GetBulkPdu {
            non_repeaters: 0,
            max_repetitions: 2,
            ranges: vec![
                SearchRange::new(oid("1.3.6.1.4.1"), Oid::null()),
                SearchRange::new(oid("1.3.6.1.4.1.1.0"), Oid::null()),
            ],
        }));
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert_eq!(resp.varbinds.len(), 4);
        assert_eq!(resp.varbinds[0].name, oid("1.3.6.1.4.1.1.0"));
        assert_eq!(resp.varbinds[1].name, oid("1.3.6.1.4.1.2.0"));
        assert_eq!(resp.varbinds[2].name, oid("1.3.6.1.4.1.2.0"));
        assert_eq!(resp.varbinds[3].payload, VarBindPayload::EndOfMibView);
    }

    #[test]
    fn test_wrong_session_answers_not_open() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = VariableRegistry::new();
        reg.add(&regs(), oid("1.3.6.1.4.1.1.0"), Box::new(Probe::new("a", &journal)))
            .unwrap();
        let mut d = Dispatcher::new();
        let mut pdu = request(get(&["1.3.6.1.4.1.1.0"]));
        pdu.session_id = SESSION + 1;
        let resp = reply(d.dispatch(SESSION, &mut reg, &pdu));
        assert_eq!(resp.error, ResponseError::NotOpen);
        assert!(resp.varbinds.is_empty());
        assert!(journal.lock().unwrap().is_empty());
    }

    #[test]
    fn test_non_request_pdus_are_ignored() {
        let mut reg = VariableRegistry::new();
        let mut d = Dispatcher::new();
        assert_eq!(d.dispatch(SESSION, &mut reg, &request(PduBody::Ping)), Dispatch::Ignored);
        assert_eq!(
            d.dispatch(SESSION, &mut reg, &request(PduBody::Notify(vec![]))),
            Dispatch::Ignored
        );
    }

    fn set_registry(journal: &Arc<Mutex<Vec<String>>>, second: TestSetResult) -> VariableRegistry {
        let mut reg = VariableRegistry::new();
        reg.add(&regs(), oid("1.3.6.1.4.1.1.0"), Box::new(Probe::new("a", journal)))
            .unwrap();
        let mut b = Probe::new("b", journal);
        b.test_result = second;
        reg.add(&regs(), oid("1.3.6.1.4.1.2.0"), Box::new(b)).unwrap();
        reg
    }

    fn test_set_body() -> PduBody {
        PduBody::TestSet(vec![
            VarBind::new(oid("1.3.6.1.4.1.1.0"), Value::Integer(5)),
            VarBind::new(oid("1.3.6.1.4.1.2.0"), Value::Integer(6)),
        ])
    }

    #[test]
    fn test_test_set_failure_cleans_up_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = set_registry(&journal, TestSetResult::WrongType);
        let mut d = Dispatcher::new();

        let resp = reply(d.dispatch(SESSION, &mut reg, &request(test_set_body())));
        assert_eq!(resp.error, ResponseError::WrongType);
        assert_eq!(resp.index, 2);
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["test:a", "test:b", "cleanup:b", "cleanup:a"]
        );
        assert!(d.setlist().is_empty());
    }

    #[test]
    fn test_test_set_kind_mismatch_is_wrong_type() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = set_registry(&journal, TestSetResult::NoError);
        let mut d = Dispatcher::new();
        let body = PduBody::TestSet(vec![VarBind::new(oid("1.3.6.1.4.1.1.0"), Value::Gauge32(5))]);
        let resp = reply(d.dispatch(SESSION, &mut reg, &request(body)));
        assert_eq!(resp.error, ResponseError::WrongType);
        assert_eq!(resp.index, 1);
        assert_eq!(*journal.lock().unwrap(), vec!["cleanup:a"]);
    }

    #[test]
    fn test_test_set_unknown_variable_not_writable() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = set_registry(&journal, TestSetResult::NoError);
        let mut d = Dispatcher::new();
        let body = PduBody::TestSet(vec![
            VarBind::new(oid("1.3.6.1.4.1.1.0"), Value::Integer(5)),
            VarBind::new(oid("1.3.6.1.4.1.9.0"), Value::Integer(5)),
        ]);
        let resp = reply(d.dispatch(SESSION, &mut reg, &request(body)));
        assert_eq!(resp.error, ResponseError::NotWritable);
        assert_eq!(resp.index, 2);
        assert_eq!(*journal.lock().unwrap(), vec!["test:a", "cleanup:a"]);
    }

    #[test]
    fn test_successful_set_transaction() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = set_registry(&journal, TestSetResult::NoError);
        let mut d = Dispatcher::new();

        assert!(reply(d.dispatch(SESSION, &mut reg, &request(test_set_body()))).is_ok());
        assert_eq!(d.setlist().len(), 2);
        assert!(reply(d.dispatch(SESSION, &mut reg, &request(PduBody::CommitSet))).is_ok());
        assert_eq!(
            d.dispatch(SESSION, &mut reg, &request(PduBody::CleanupSet)),
            Dispatch::NoReply
        );
        assert_eq!(
            *journal.lock().unwrap(),
            vec!["test:a", "test:b", "commit:a", "commit:b", "cleanup:b", "cleanup:a"]
        );
        assert!(d.setlist().is_empty());
    }

    #[test]
    fn test_commit_stops_at_first_failure() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = VariableRegistry::new();
        let mut a = Probe::new("a", &journal);
        a.commit_ok = false;
        reg.add(&regs(), oid("1.3.6.1.4.1.1.0"), Box::new(a)).unwrap();
        reg.add(&regs(), oid("1.3.6.1.4.1.2.0"), Box::new(Probe::new("b", &journal)))
            .unwrap();
        let mut d = Dispatcher::new();

        reply(d.dispatch(SESSION, &mut reg, &request(test_set_body())));
        let resp = reply(d.dispatch(SESSION, &mut reg, &request(PduBody::CommitSet)));
        assert_eq!(resp.error, ResponseError::CommitFailed);
        assert_eq!(resp.index, 1);
        assert!(!journal.lock().unwrap().contains(&"commit:b".to_string()));
    }

    #[test]
    fn test_undo_visits_all_and_reports_first_failure() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut reg = VariableRegistry::new();
        let mut a = Probe::new("a", &journal);
        a.undo_ok = false;
        let mut b = Probe::new("b", &journal);
        b.undo_ok = false;
        reg.add(&regs(), oid("1.3.6.1.4.1.1.0"), Box::new(a)).unwrap();
        reg.add(&regs(), oid("1.3.6.1.4.1.2.0"), Box::new(b)).unwrap();
        let mut d = Dispatcher::new();

        reply(d.dispatch(SESSION, &mut reg, &request(test_set_body())));
        reply(d.dispatch(SESSION, &mut reg, &request(PduBody::CommitSet)));
        let resp = reply(d.dispatch(SESSION, &mut reg, &request(PduBody::UndoSet)));
        assert_eq!(resp.error, ResponseError::UndoFailed);
        assert_eq!(resp.index, 1);
        let log = journal.lock().unwrap();
        assert!(log.contains(&"undo:a".to_string()));
        assert!(log.contains(&"undo:b".to_string()));
        assert!(d.setlist().is_empty());
    }

    #[test]
    fn test_scalar_values_change_through_set() {
        let mut reg = VariableRegistry::new();
        reg.add(&regs(), oid("1.3.6.1.4.1.5.0"), Box::new(Scalar::writable(Value::string("old"))))
            .unwrap();
        let mut d = Dispatcher::new();
        let body = PduBody::TestSet(vec![VarBind::new(oid("1.3.6.1.4.1.5.0"), Value::string("new"))]);
        assert!(reply(d.dispatch(SESSION, &mut reg, &request(body))).is_ok());
        assert!(reply(d.dispatch(SESSION, &mut reg, &request(PduBody::CommitSet))).is_ok());
        d.dispatch(SESSION, &mut reg, &request(PduBody::CleanupSet));

        let resp = reply(d.dispatch(SESSION, &mut reg, &request(get(&["1.3.6.1.4.1.5.0"]))));
        assert_eq!(resp.varbinds[0].value(), Some(&Value::string("new")));
    }
}
