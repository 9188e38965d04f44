//! AgentX PDU structures and their binary encoding (RFC 2741 §6).
//!
//! Every PDU is a 20-byte header followed by a payload whose length is a
//! multiple of four:
//!
//! ```text
//!  0                   1                   2                   3
//! +---------------+---------------+---------------+---------------+
//! |    h.version  |    h.type     |    h.flags    |  <reserved>   |
//! +---------------+---------------+---------------+---------------+
//! |                          h.sessionID                          |
//! +---------------+---------------+---------------+---------------+
//! |                        h.transactionID                        |
//! +---------------+---------------+---------------+---------------+
//! |                          h.packetID                           |
//! +---------------+---------------+---------------+---------------+
//! |                        h.payload_length                       |
//! +---------------+---------------+---------------+---------------+
//! ```
//!
//! PDUs that may carry a non-default context read and write it right after
//! the header; [`Pdu`] handles that once for all of them.

pub mod wire;

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::{AgentXError, Result},
    oid::Oid,
    value::{decode_varbinds, encode_varbinds, VarBind},
};

use wire::{put_octet_string, WireReader};

/// AgentX protocol version.
pub const AGENTX_VERSION: u8 = 1;

/// PDU header size in bytes.
pub const PDU_HEADER_SIZE: usize = 20;

/// Largest payload we are willing to buffer.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

// Header flag bits (RFC 2741 §6.1)
pub const FLAG_INSTANCE_REGISTRATION: u8 = 1 << 0;
pub const FLAG_NEW_INDEX: u8 = 1 << 1;
pub const FLAG_ANY_INDEX: u8 = 1 << 2;
pub const FLAG_NON_DEFAULT_CONTEXT: u8 = 1 << 3;
pub const FLAG_NETWORK_BYTE_ORDER: u8 = 1 << 4;

/// PDU type codes (RFC 2741 §6.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    Open = 1,
    Close = 2,
    Register = 3,
    Unregister = 4,
    Get = 5,
    GetNext = 6,
    GetBulk = 7,
    TestSet = 8,
    CommitSet = 9,
    UndoSet = 10,
    CleanupSet = 11,
    Notify = 12,
    Ping = 13,
    IndexAllocate = 14,
    IndexDeallocate = 15,
    AddAgentCaps = 16,
    RemoveAgentCaps = 17,
    Response = 18,
}

impl PduType {
    pub fn from_u8(v: u8) -> Option<PduType> {
        Some(match v {
            1 => PduType::Open,
            2 => PduType::Close,
            3 => PduType::Register,
            4 => PduType::Unregister,
            5 => PduType::Get,
            6 => PduType::GetNext,
            7 => PduType::GetBulk,
            8 => PduType::TestSet,
            9 => PduType::CommitSet,
            10 => PduType::UndoSet,
            11 => PduType::CleanupSet,
            12 => PduType::Notify,
            13 => PduType::Ping,
            14 => PduType::IndexAllocate,
            15 => PduType::IndexDeallocate,
            16 => PduType::AddAgentCaps,
            17 => PduType::RemoveAgentCaps,
            18 => PduType::Response,
            _ => return None,
        })
    }

    /// True for PDU types that may carry a context field.
    pub fn has_context(self) -> bool {
        !matches!(
            self,
            PduType::Open
                | PduType::Close
                | PduType::CommitSet
                | PduType::UndoSet
                | PduType::CleanupSet
                | PduType::Response
        )
    }
}

/// Reasons carried in a Close PDU (RFC 2741 §6.2.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum CloseReason {
    Other = 1,
    ParseError = 2,
    ProtocolError = 3,
    Timeouts = 4,
    Shutdown = 5,
    ByManager = 6,
}

impl CloseReason {
    pub fn from_u8(v: u8) -> Option<CloseReason> {
        Some(match v {
            1 => CloseReason::Other,
            2 => CloseReason::ParseError,
            3 => CloseReason::ProtocolError,
            4 => CloseReason::Timeouts,
            5 => CloseReason::Shutdown,
            6 => CloseReason::ByManager,
            _ => return None,
        })
    }
}

/// Values of the Response PDU `res.error` field (RFC 2741 §6.2.16, RFC 3416).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResponseError {
    NoAgentXError = 0,
    GenErr = 5,
    NoAccess = 6,
    WrongType = 7,
    WrongLength = 8,
    WrongEncoding = 9,
    WrongValue = 10,
    NoCreation = 11,
    InconsistentValue = 12,
    ResourceUnavailable = 13,
    CommitFailed = 14,
    UndoFailed = 15,
    AuthorizationError = 16,
    NotWritable = 17,
    InconsistentName = 18,
    OpenFailed = 256,
    NotOpen = 257,
    IndexWrongType = 258,
    IndexAlreadyAllocated = 259,
    IndexNoneAvailable = 260,
    IndexNotAllocated = 261,
    UnsupportedContext = 262,
    DuplicateRegistration = 263,
    UnknownRegistration = 264,
    UnknownAgentCaps = 265,
    ParseError = 266,
    RequestDenied = 267,
    ProcessingError = 268,
}

impl ResponseError {
    pub fn from_u16(v: u16) -> Option<ResponseError> {
        use ResponseError::*;
        Some(match v {
            0 => NoAgentXError,
            5 => GenErr,
            6 => NoAccess,
            7 => WrongType,
            8 => WrongLength,
            9 => WrongEncoding,
            10 => WrongValue,
            11 => NoCreation,
            12 => InconsistentValue,
            13 => ResourceUnavailable,
            14 => CommitFailed,
            15 => UndoFailed,
            16 => AuthorizationError,
            17 => NotWritable,
            18 => InconsistentName,
            256 => OpenFailed,
            257 => NotOpen,
            258 => IndexWrongType,
            259 => IndexAlreadyAllocated,
            260 => IndexNoneAvailable,
            261 => IndexNotAllocated,
            262 => UnsupportedContext,
            263 => DuplicateRegistration,
            264 => UnknownRegistration,
            265 => UnknownAgentCaps,
            266 => ParseError,
            267 => RequestDenied,
            268 => ProcessingError,
            _ => return None,
        })
    }
}

/// A SearchRange (RFC 2741 §5.2). The `include` flag of `start` selects an
/// inclusive lower bound; a null `end` means unbounded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRange {
    pub start: Oid,
    pub end: Oid,
}

impl SearchRange {
    pub fn new(start: Oid, end: Oid) -> Self {
        SearchRange { start, end }
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        self.start.encode(buf)?;
        self.end.encode(buf)
    }

    fn decode(r: &mut WireReader<'_>) -> Result<SearchRange> {
        let start = Oid::decode(r)?;
        let end = Oid::decode(r)?;
        Ok(SearchRange { start, end })
    }
}

fn decode_ranges(r: &mut WireReader<'_>) -> Result<Vec<SearchRange>> {
    let mut ranges = Vec::new();
    while !r.is_empty() {
        ranges.push(SearchRange::decode(r)?);
    }
    Ok(ranges)
}

fn encode_ranges(ranges: &[SearchRange], buf: &mut BytesMut) -> Result<()> {
    for range in ranges {
        range.encode(buf)?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenPdu {
    /// Default timeout in seconds for this session (0 = master default).
    pub timeout: u8,
    pub id: Oid,
    pub description: Bytes,
}

/// Register PDU body. `upper_bound` is present iff `range_subid != 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegisterPdu {
    pub timeout: u8,
    pub priority: u8,
    pub range_subid: u8,
    pub subtree: Oid,
    pub upper_bound: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnregisterPdu {
    pub priority: u8,
    pub range_subid: u8,
    pub subtree: Oid,
    pub upper_bound: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetBulkPdu {
    pub non_repeaters: u16,
    pub max_repetitions: u16,
    pub ranges: Vec<SearchRange>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponsePdu {
    pub sys_uptime: u32,
    pub error: ResponseError,
    /// 1-based index of the varbind that caused `error`, 0 otherwise.
    pub index: u16,
    pub varbinds: Vec<VarBind>,
}

impl ResponsePdu {
    pub fn new() -> Self {
        ResponsePdu {
            sys_uptime: 0,
            error: ResponseError::NoAgentXError,
            index: 0,
            varbinds: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error == ResponseError::NoAgentXError
    }

    /// Records a failure at `index`, discarding any collected varbinds.
    pub fn fail(&mut self, error: ResponseError, index: u16) {
        self.error = error;
        self.index = index;
        self.varbinds.clear();
    }
}

impl Default for ResponsePdu {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-specific PDU payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PduBody {
    Open(OpenPdu),
    Close(CloseReason),
    Register(RegisterPdu),
    Unregister(UnregisterPdu),
    Get(Vec<SearchRange>),
    GetNext(Vec<SearchRange>),
    GetBulk(GetBulkPdu),
    TestSet(Vec<VarBind>),
    CommitSet,
    UndoSet,
    CleanupSet,
    Notify(Vec<VarBind>),
    Ping,
    IndexAllocate(Vec<VarBind>),
    IndexDeallocate(Vec<VarBind>),
    AddAgentCaps { id: Oid, description: Bytes },
    RemoveAgentCaps { id: Oid },
    Response(ResponsePdu),
}

impl PduBody {
    pub fn pdu_type(&self) -> PduType {
        match self {
            PduBody::Open(_) => PduType::Open,
            PduBody::Close(_) => PduType::Close,
            PduBody::Register(_) => PduType::Register,
            PduBody::Unregister(_) => PduType::Unregister,
            PduBody::Get(_) => PduType::Get,
            PduBody::GetNext(_) => PduType::GetNext,
            PduBody::GetBulk(_) => PduType::GetBulk,
            PduBody::TestSet(_) => PduType::TestSet,
            PduBody::CommitSet => PduType::CommitSet,
            PduBody::UndoSet => PduType::UndoSet,
            PduBody::CleanupSet => PduType::CleanupSet,
            PduBody::Notify(_) => PduType::Notify,
            PduBody::Ping => PduType::Ping,
            PduBody::IndexAllocate(_) => PduType::IndexAllocate,
            PduBody::IndexDeallocate(_) => PduType::IndexDeallocate,
            PduBody::AddAgentCaps { .. } => PduType::AddAgentCaps,
            PduBody::RemoveAgentCaps { .. } => PduType::RemoveAgentCaps,
            PduBody::Response(_) => PduType::Response,
        }
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            PduBody::Open(open) => {
                buf.put_u8(open.timeout);
                buf.put_bytes(0, 3);
                open.id.encode(buf)?;
                put_octet_string(buf, &open.description)?;
            }
            PduBody::Close(reason) => {
                buf.put_u8(*reason as u8);
                buf.put_bytes(0, 3);
            }
            PduBody::Register(reg) => {
                buf.put_u8(reg.timeout);
                buf.put_u8(reg.priority);
                buf.put_u8(reg.range_subid);
                buf.put_u8(0);
                reg.subtree.encode(buf)?;
                put_upper_bound(buf, reg.range_subid, reg.upper_bound)?;
            }
            PduBody::Unregister(unreg) => {
                buf.put_u8(0);
                buf.put_u8(unreg.priority);
                buf.put_u8(unreg.range_subid);
                buf.put_u8(0);
                unreg.subtree.encode(buf)?;
                put_upper_bound(buf, unreg.range_subid, unreg.upper_bound)?;
            }
            PduBody::Get(ranges) | PduBody::GetNext(ranges) => encode_ranges(ranges, buf)?,
            PduBody::GetBulk(bulk) => {
                buf.put_u16(bulk.non_repeaters);
                buf.put_u16(bulk.max_repetitions);
                encode_ranges(&bulk.ranges, buf)?;
            }
            PduBody::TestSet(vbs)
            | PduBody::Notify(vbs)
            | PduBody::IndexAllocate(vbs)
            | PduBody::IndexDeallocate(vbs) => encode_varbinds(vbs, buf)?,
            PduBody::CommitSet | PduBody::UndoSet | PduBody::CleanupSet | PduBody::Ping => {}
            PduBody::AddAgentCaps { id, description } => {
                id.encode(buf)?;
                put_octet_string(buf, description)?;
            }
            PduBody::RemoveAgentCaps { id } => id.encode(buf)?,
            PduBody::Response(resp) => {
                buf.put_u32(resp.sys_uptime);
                buf.put_u16(resp.error as u16);
                buf.put_u16(resp.index);
                encode_varbinds(&resp.varbinds, buf)?;
            }
        }
        Ok(())
    }

    fn decode(pdu_type: PduType, r: &mut WireReader<'_>) -> Result<PduBody> {
        Ok(match pdu_type {
            PduType::Open => {
                let timeout = r.read_u8()?;
                r.skip(3)?;
                let id = Oid::decode(r)?;
                let description = r.read_octet_string()?;
                PduBody::Open(OpenPdu {
                    timeout,
                    id,
                    description,
                })
            }
            PduType::Close => {
                let raw = r.read_u8()?;
                r.skip(3)?;
                let reason = CloseReason::from_u8(raw)
                    .ok_or_else(|| AgentXError::Parse(format!("close reason {}", raw)))?;
                PduBody::Close(reason)
            }
            PduType::Register => {
                let timeout = r.read_u8()?;
                let priority = r.read_u8()?;
                let range_subid = r.read_u8()?;
                r.skip(1)?;
                let subtree = Oid::decode(r)?;
                let upper_bound = read_upper_bound(r, range_subid)?;
                PduBody::Register(RegisterPdu {
                    timeout,
                    priority,
                    range_subid,
                    subtree,
                    upper_bound,
                })
            }
            PduType::Unregister => {
                r.skip(1)?;
                let priority = r.read_u8()?;
                let range_subid = r.read_u8()?;
                r.skip(1)?;
                let subtree = Oid::decode(r)?;
                let upper_bound = read_upper_bound(r, range_subid)?;
                PduBody::Unregister(UnregisterPdu {
                    priority,
                    range_subid,
                    subtree,
                    upper_bound,
                })
            }
            PduType::Get => PduBody::Get(decode_ranges(r)?),
            PduType::GetNext => PduBody::GetNext(decode_ranges(r)?),
            PduType::GetBulk => {
                let non_repeaters = r.read_u16()?;
                let max_repetitions = r.read_u16()?;
                PduBody::GetBulk(GetBulkPdu {
                    non_repeaters,
                    max_repetitions,
                    ranges: decode_ranges(r)?,
                })
            }
            PduType::TestSet => PduBody::TestSet(decode_varbinds(r)?),
            PduType::CommitSet | PduType::UndoSet | PduType::CleanupSet => {
                // Header-only on the wire; a stray varbind list must still be well formed.
                decode_varbinds(r)?;
                match pdu_type {
                    PduType::CommitSet => PduBody::CommitSet,
                    PduType::UndoSet => PduBody::UndoSet,
                    _ => PduBody::CleanupSet,
                }
            }
            PduType::Notify => PduBody::Notify(decode_varbinds(r)?),
            PduType::Ping => PduBody::Ping,
            PduType::IndexAllocate => PduBody::IndexAllocate(decode_varbinds(r)?),
            PduType::IndexDeallocate => PduBody::IndexDeallocate(decode_varbinds(r)?),
            PduType::AddAgentCaps => {
                let id = Oid::decode(r)?;
                let description = r.read_octet_string()?;
                PduBody::AddAgentCaps { id, description }
            }
            PduType::RemoveAgentCaps => PduBody::RemoveAgentCaps {
                id: Oid::decode(r)?,
            },
            PduType::Response => {
                let sys_uptime = r.read_u32()?;
                let raw_error = r.read_u16()?;
                let index = r.read_u16()?;
                let error = ResponseError::from_u16(raw_error)
                    .ok_or_else(|| AgentXError::Parse(format!("response error {}", raw_error)))?;
                PduBody::Response(ResponsePdu {
                    sys_uptime,
                    error,
                    index,
                    varbinds: decode_varbinds(r)?,
                })
            }
        })
    }
}

fn put_upper_bound(buf: &mut BytesMut, range_subid: u8, upper_bound: Option<u32>) -> Result<()> {
    match (range_subid, upper_bound) {
        (0, _) => Ok(()),
        (_, Some(bound)) => {
            buf.put_u32(bound);
            Ok(())
        }
        (_, None) => Err(AgentXError::Encode(
            "range_subid set without an upper bound".to_string(),
        )),
    }
}

fn read_upper_bound(r: &mut WireReader<'_>, range_subid: u8) -> Result<Option<u32>> {
    if range_subid == 0 {
        Ok(None)
    } else {
        Ok(Some(r.read_u32()?))
    }
}

/// Decoded AgentX PDU header (20 bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PduHeader {
    pub version: u8,
    pub pdu_type: u8,
    pub flags: u8,
    pub session_id: u32,
    pub transaction_id: u32,
    pub packet_id: u32,
    pub payload_length: u32,
}

impl PduHeader {
    pub fn big_endian(&self) -> bool {
        self.flags & FLAG_NETWORK_BYTE_ORDER != 0
    }
}

/// Decodes an AgentX PDU header, honouring the payload byte-order flag.
pub fn decode_header(buf: &[u8]) -> Result<PduHeader> {
    if buf.len() < PDU_HEADER_SIZE {
        return Err(AgentXError::Parse(format!(
            "Header too short: {} bytes",
            buf.len()
        )));
    }
    let version = buf[0];
    if version != AGENTX_VERSION {
        return Err(AgentXError::Version(version));
    }
    let flags = buf[2];
    let mut r = WireReader::new(&buf[4..PDU_HEADER_SIZE], flags & FLAG_NETWORK_BYTE_ORDER != 0);
    let header = PduHeader {
        version,
        pdu_type: buf[1],
        flags,
        session_id: r.read_u32()?,
        transaction_id: r.read_u32()?,
        packet_id: r.read_u32()?,
        payload_length: r.read_u32()?,
    };
    if header.payload_length % 4 != 0 {
        return Err(AgentXError::Parse(format!(
            "payload length {} is not a multiple of 4",
            header.payload_length
        )));
    }
    Ok(header)
}

/// Extracts the payload length from a raw header, for framing.
///
/// Unlike [`decode_header`] this ignores the version, so that frames of an
/// unsupported version can still be skipped.
pub fn frame_payload_length(header: &[u8; PDU_HEADER_SIZE]) -> Result<usize> {
    let raw = [header[16], header[17], header[18], header[19]];
    let len = if header[2] & FLAG_NETWORK_BYTE_ORDER != 0 {
        u32::from_be_bytes(raw)
    } else {
        u32::from_le_bytes(raw)
    } as usize;
    if len % 4 != 0 {
        return Err(AgentXError::Parse(format!(
            "payload length {} is not a multiple of 4",
            len
        )));
    }
    if len > MAX_PAYLOAD_SIZE {
        return Err(AgentXError::Parse(format!("payload length {} too large", len)));
    }
    Ok(len)
}

/// Header flags with protocol meaning beyond framing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PduFlags {
    pub instance_registration: bool,
    pub new_index: bool,
    pub any_index: bool,
}

impl PduFlags {
    fn from_bits(bits: u8) -> Self {
        PduFlags {
            instance_registration: bits & FLAG_INSTANCE_REGISTRATION != 0,
            new_index: bits & FLAG_NEW_INDEX != 0,
            any_index: bits & FLAG_ANY_INDEX != 0,
        }
    }

    fn bits(self) -> u8 {
        let mut bits = 0;
        if self.instance_registration {
            bits |= FLAG_INSTANCE_REGISTRATION;
        }
        if self.new_index {
            bits |= FLAG_NEW_INDEX;
        }
        if self.any_index {
            bits |= FLAG_ANY_INDEX;
        }
        bits
    }
}

/// A complete AgentX PDU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pdu {
    pub flags: PduFlags,
    pub session_id: u32,
    pub transaction_id: u32,
    pub packet_id: u32,
    /// Non-default context, for PDU types that carry one.
    pub context: Option<Bytes>,
    pub body: PduBody,
}

impl Pdu {
    pub fn new(body: PduBody) -> Self {
        Pdu {
            flags: PduFlags::default(),
            session_id: 0,
            transaction_id: 0,
            packet_id: 0,
            context: None,
            body,
        }
    }

    pub fn pdu_type(&self) -> PduType {
        self.body.pdu_type()
    }

    /// Wraps a Response body into a PDU addressed back to `request`.
    pub fn reply_to(request: &Pdu, response: ResponsePdu) -> Pdu {
        Pdu {
            flags: PduFlags::default(),
            session_id: request.session_id,
            transaction_id: request.transaction_id,
            packet_id: request.packet_id,
            context: None,
            body: PduBody::Response(response),
        }
    }

    /// Serializes the PDU in network byte order.
    pub fn encode(&self) -> Result<Bytes> {
        let pdu_type = self.pdu_type();
        let mut buf = BytesMut::with_capacity(64);
        buf.put_bytes(0, PDU_HEADER_SIZE);

        let mut flags = self.flags.bits() | FLAG_NETWORK_BYTE_ORDER;
        if let Some(context) = &self.context {
            if !pdu_type.has_context() {
                return Err(AgentXError::Encode(format!(
                    "{:?} PDU cannot carry a context",
                    pdu_type
                )));
            }
            flags |= FLAG_NON_DEFAULT_CONTEXT;
            put_octet_string(&mut buf, context)?;
        }
        self.body.encode(&mut buf)?;

        self.add_header(&mut buf, pdu_type, flags)?;
        Ok(buf.freeze())
    }

    fn add_header(&self, buf: &mut BytesMut, pdu_type: PduType, flags: u8) -> Result<()> {
        let payload_length = u32::try_from(buf.len() - PDU_HEADER_SIZE)
            .map_err(|_| AgentXError::Encode("payload too large".to_string()))?;
        let mut header = &mut buf[..PDU_HEADER_SIZE];
        header.put_u8(AGENTX_VERSION);
        header.put_u8(pdu_type as u8);
        header.put_u8(flags);
        header.put_u8(0); // reserved
        header.put_u32(self.session_id);
        header.put_u32(self.transaction_id);
        header.put_u32(self.packet_id);
        header.put_u32(payload_length);
        Ok(())
    }

    /// Parses one complete PDU (header and payload).
    pub fn decode(buf: &[u8]) -> Result<Pdu> {
        let header = decode_header(buf)?;
        let pdu_type = PduType::from_u8(header.pdu_type)
            .ok_or_else(|| AgentXError::Parse(format!("unknown PDU type {}", header.pdu_type)))?;
        let end = usize::try_from(header.payload_length)
            .ok()
            .and_then(|len| len.checked_add(PDU_HEADER_SIZE))
            .ok_or_else(|| {
                AgentXError::Parse(format!("payload length {} too large", header.payload_length))
            })?;
        if buf.len() < end {
            return Err(AgentXError::Parse(format!(
                "payload truncated: need {} bytes, have {}",
                end,
                buf.len()
            )));
        }

        let mut r = WireReader::new(&buf[PDU_HEADER_SIZE..end], header.big_endian());
        let context = if header.flags & FLAG_NON_DEFAULT_CONTEXT != 0 {
            if !pdu_type.has_context() {
                return Err(AgentXError::Parse(format!(
                    "{:?} PDU with context flag",
                    pdu_type
                )));
            }
            Some(r.read_octet_string()?)
        } else {
            None
        };
        let body = PduBody::decode(pdu_type, &mut r)?;
        if !r.is_empty() {
            return Err(AgentXError::Parse(format!(
                "{} trailing bytes in {:?} PDU",
                r.remaining(),
                pdu_type
            )));
        }

        Ok(Pdu {
            flags: PduFlags::from_bits(header.flags),
            session_id: header.session_id,
            transaction_id: header.transaction_id,
            packet_id: header.packet_id,
            context,
            body,
        })
    }
}

impl fmt::Display for Pdu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} (session={}, transaction={}, packet={})",
            self.pdu_type(),
            self.session_id,
            self.transaction_id,
            self.packet_id
        )
    }
}
