//! Packet-id allocation and matching of Responses to outstanding requests.

use std::collections::HashSet;

use crate::pdu::{Pdu, PduBody, ResponsePdu};

/// A Response matched to the request it answers.
#[derive(Debug, PartialEq, Eq)]
pub struct Reply {
    pub packet_id: u32,
    /// Session id chosen by the master; meaningful for the Open Response.
    pub session_id: u32,
    pub response: ResponsePdu,
}

/// Tracks the requests a session is waiting on.
#[derive(Debug)]
pub struct Correlator {
    next_id: u32,
    pending: HashSet<u32>,
}

impl Default for Correlator {
    fn default() -> Self {
        Correlator {
            next_id: 1,
            pending: HashSet::new(),
        }
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a packet id and marks it as awaiting a Response.
    ///
    /// Ids wrap on overflow and skip 0.
    pub fn next_packet_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = match self.next_id.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        self.pending.insert(id);
        id
    }

    pub fn is_pending(&self, packet_id: u32) -> bool {
        self.pending.contains(&packet_id)
    }

    /// Takes the Response out of `pdu` if it answers an outstanding request.
    ///
    /// Responses nobody is waiting for are discarded.
    pub fn accept(&mut self, pdu: Pdu) -> Option<Reply> {
        let PduBody::Response(response) = pdu.body else {
            return None;
        };
        if self.pending.remove(&pdu.packet_id) {
            Some(Reply {
                packet_id: pdu.packet_id,
                session_id: pdu.session_id,
                response,
            })
        } else {
            log::debug!("Dropping unsolicited response for packet {}", pdu.packet_id);
            None
        }
    }

    /// Stops waiting for `packet_id`; a late Response will be discarded.
    pub fn cancel(&mut self, packet_id: u32) {
        self.pending.remove(&packet_id);
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(packet_id: u32) -> Pdu {
        let mut pdu = Pdu::new(PduBody::Response(ResponsePdu::new()));
        pdu.packet_id = packet_id;
        pdu
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut c = Correlator::new();
        assert_eq!(c.next_packet_id(), 1);
        assert_eq!(c.next_packet_id(), 2);
        assert_eq!(c.pending_count(), 2);
    }

    #[test]
    fn test_ids_wrap_skipping_zero() {
        let mut c = Correlator::new();
        c.next_id = u32::MAX;
        assert_eq!(c.next_packet_id(), u32::MAX);
        assert_eq!(c.next_packet_id(), 1);
    }

    #[test]
    fn test_accept_matches_only_pending() {
        let mut c = Correlator::new();
        let id = c.next_packet_id();
        assert!(c.accept(response(id + 10)).is_none());
        assert!(c.is_pending(id));
        let reply = c.accept(response(id)).unwrap();
        assert_eq!(reply.packet_id, id);
        assert!(reply.response.is_ok());
        assert!(!c.is_pending(id));
        assert!(c.accept(response(id)).is_none());
    }

    #[test]
    fn test_cancelled_response_is_dropped() {
        let mut c = Correlator::new();
        let id = c.next_packet_id();
        c.cancel(id);
        assert!(c.accept(response(id)).is_none());
    }

    #[test]
    fn test_non_response_is_not_accepted() {
        let mut c = Correlator::new();
        let id = c.next_packet_id();
        let mut ping = Pdu::new(PduBody::Ping);
        ping.packet_id = id;
        assert!(c.accept(ping).is_none());
        assert!(c.is_pending(id));
    }
}
