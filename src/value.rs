//! SNMP values and variable bindings (RFC 2741 §5.4).

use std::{fmt, net::Ipv4Addr};

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::{AgentXError, Result},
    oid::Oid,
    pdu::wire::{put_octet_string, WireReader},
};

// --- VarBind type constants (RFC 2741 §5.4) ---

pub const VARBIND_INTEGER: u16 = 2;
pub const VARBIND_OCTET_STRING: u16 = 4;
pub const VARBIND_NULL: u16 = 5;
pub const VARBIND_OBJECT_IDENTIFIER: u16 = 6;
pub const VARBIND_IP_ADDRESS: u16 = 64;
pub const VARBIND_COUNTER32: u16 = 65;
pub const VARBIND_GAUGE32: u16 = 66;
pub const VARBIND_TIMETICKS: u16 = 67;
pub const VARBIND_OPAQUE: u16 = 68;
pub const VARBIND_COUNTER64: u16 = 70;
pub const VARBIND_NO_SUCH_OBJECT: u16 = 128;
pub const VARBIND_NO_SUCH_INSTANCE: u16 = 129;
pub const VARBIND_END_OF_MIB_VIEW: u16 = 130;

/// The kind of an SNMP base value, without its data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    Integer,
    OctetString,
    ObjectIdentifier,
    IpAddress,
    Counter32,
    Gauge32,
    TimeTicks,
    Opaque,
    Counter64,
}

impl ValueKind {
    /// The varbind type code for this kind.
    pub fn type_code(self) -> u16 {
        match self {
            ValueKind::Integer => VARBIND_INTEGER,
            ValueKind::OctetString => VARBIND_OCTET_STRING,
            ValueKind::ObjectIdentifier => VARBIND_OBJECT_IDENTIFIER,
            ValueKind::IpAddress => VARBIND_IP_ADDRESS,
            ValueKind::Counter32 => VARBIND_COUNTER32,
            ValueKind::Gauge32 => VARBIND_GAUGE32,
            ValueKind::TimeTicks => VARBIND_TIMETICKS,
            ValueKind::Opaque => VARBIND_OPAQUE,
            ValueKind::Counter64 => VARBIND_COUNTER64,
        }
    }
}

/// A typed SNMP value.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Integer(i32),
    OctetString(Bytes),
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Bytes),
    Counter64(u64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::OctetString(_) => ValueKind::OctetString,
            Value::ObjectIdentifier(_) => ValueKind::ObjectIdentifier,
            Value::IpAddress(_) => ValueKind::IpAddress,
            Value::Counter32(_) => ValueKind::Counter32,
            Value::Gauge32(_) => ValueKind::Gauge32,
            Value::TimeTicks(_) => ValueKind::TimeTicks,
            Value::Opaque(_) => ValueKind::Opaque,
            Value::Counter64(_) => ValueKind::Counter64,
        }
    }

    /// Convenience constructor for DisplayString-style values.
    pub fn string(s: &str) -> Value {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }

    fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        match self {
            Value::Integer(v) => buf.put_i32(*v),
            Value::OctetString(v) | Value::Opaque(v) => put_octet_string(buf, v)?,
            Value::ObjectIdentifier(oid) => oid.encode(buf)?,
            Value::IpAddress(addr) => put_octet_string(buf, addr)?,
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => buf.put_u32(*v),
            Value::Counter64(v) => buf.put_u64(*v),
        }
        Ok(())
    }

    fn decode(kind: ValueKind, r: &mut WireReader<'_>) -> Result<Value> {
        Ok(match kind {
            ValueKind::Integer => Value::Integer(r.read_u32()? as i32),
            ValueKind::OctetString => Value::OctetString(r.read_octet_string()?),
            ValueKind::ObjectIdentifier => Value::ObjectIdentifier(Oid::decode(r)?),
            ValueKind::IpAddress => {
                let raw = r.read_octet_string()?;
                let addr: [u8; 4] = raw[..].try_into().map_err(|_| {
                    AgentXError::Parse(format!("IpAddress of {} bytes", raw.len()))
                })?;
                Value::IpAddress(addr)
            }
            ValueKind::Counter32 => Value::Counter32(r.read_u32()?),
            ValueKind::Gauge32 => Value::Gauge32(r.read_u32()?),
            ValueKind::TimeTicks => Value::TimeTicks(r.read_u32()?),
            ValueKind::Opaque => Value::Opaque(r.read_octet_string()?),
            ValueKind::Counter64 => Value::Counter64(r.read_u64()?),
        })
    }
}

impl From<Ipv4Addr> for Value {
    fn from(addr: Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "INTEGER: {}", v),
            Value::OctetString(v) => write!(f, "STRING: {}", String::from_utf8_lossy(v)),
            Value::ObjectIdentifier(oid) => write!(f, "OID: {}", oid),
            Value::IpAddress(a) => write!(f, "IpAddress: {}", Ipv4Addr::from(*a)),
            Value::Counter32(v) => write!(f, "Counter32: {}", v),
            Value::Gauge32(v) => write!(f, "Gauge32: {}", v),
            Value::TimeTicks(v) => write!(f, "Timeticks: ({})", v),
            Value::Opaque(v) => write!(f, "Opaque: {} bytes", v.len()),
            Value::Counter64(v) => write!(f, "Counter64: {}", v),
        }
    }
}

/// What a variable binding carries besides its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarBindPayload {
    Value(Value),
    Null,
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl VarBindPayload {
    pub fn type_code(&self) -> u16 {
        match self {
            VarBindPayload::Value(v) => v.kind().type_code(),
            VarBindPayload::Null => VARBIND_NULL,
            VarBindPayload::NoSuchObject => VARBIND_NO_SUCH_OBJECT,
            VarBindPayload::NoSuchInstance => VARBIND_NO_SUCH_INSTANCE,
            VarBindPayload::EndOfMibView => VARBIND_END_OF_MIB_VIEW,
        }
    }
}

/// A variable binding (OID + value).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarBind {
    pub name: Oid,
    pub payload: VarBindPayload,
}

impl VarBind {
    pub fn new(name: Oid, value: Value) -> Self {
        VarBind {
            name,
            payload: VarBindPayload::Value(value),
        }
    }

    pub fn with_payload(name: Oid, payload: VarBindPayload) -> Self {
        VarBind { name, payload }
    }

    /// The bound value, if this varbind is not an exception marker.
    pub fn value(&self) -> Option<&Value> {
        match &self.payload {
            VarBindPayload::Value(v) => Some(v),
            _ => None,
        }
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        buf.put_u16(self.payload.type_code());
        buf.put_u16(0); // reserved
        self.name.encode(buf)?;
        if let VarBindPayload::Value(v) = &self.payload {
            v.encode(buf)?;
        }
        Ok(())
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> Result<VarBind> {
        let type_code = r.read_u16()?;
        r.skip(2)?;
        let name = Oid::decode(r)?;
        let kind = match type_code {
            VARBIND_INTEGER => ValueKind::Integer,
            VARBIND_OCTET_STRING => ValueKind::OctetString,
            VARBIND_OBJECT_IDENTIFIER => ValueKind::ObjectIdentifier,
            VARBIND_IP_ADDRESS => ValueKind::IpAddress,
            VARBIND_COUNTER32 => ValueKind::Counter32,
            VARBIND_GAUGE32 => ValueKind::Gauge32,
            VARBIND_TIMETICKS => ValueKind::TimeTicks,
            VARBIND_OPAQUE => ValueKind::Opaque,
            VARBIND_COUNTER64 => ValueKind::Counter64,
            VARBIND_NULL => return Ok(VarBind::with_payload(name, VarBindPayload::Null)),
            VARBIND_NO_SUCH_OBJECT => {
                return Ok(VarBind::with_payload(name, VarBindPayload::NoSuchObject))
            }
            VARBIND_NO_SUCH_INSTANCE => {
                return Ok(VarBind::with_payload(name, VarBindPayload::NoSuchInstance))
            }
            VARBIND_END_OF_MIB_VIEW => {
                return Ok(VarBind::with_payload(name, VarBindPayload::EndOfMibView))
            }
            other => return Err(AgentXError::Parse(format!("unknown varbind type {}", other))),
        };
        let value = Value::decode(kind, r)?;
        Ok(VarBind::new(name, value))
    }
}

impl fmt::Display for VarBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            VarBindPayload::Value(v) => write!(f, "{} = {}", self.name, v),
            VarBindPayload::Null => write!(f, "{} = NULL", self.name),
            VarBindPayload::NoSuchObject => write!(f, "{} = No Such Object", self.name),
            VarBindPayload::NoSuchInstance => write!(f, "{} = No Such Instance", self.name),
            VarBindPayload::EndOfMibView => write!(f, "{} = End of MIB View", self.name),
        }
    }
}

/// Decodes varbinds until the reader is exhausted.
pub(crate) fn decode_varbinds(r: &mut WireReader<'_>) -> Result<Vec<VarBind>> {
    let mut list = Vec::new();
    while !r.is_empty() {
        list.push(VarBind::decode(r)?);
    }
    Ok(list)
}

pub(crate) fn encode_varbinds(list: &[VarBind], buf: &mut BytesMut) -> Result<()> {
    for vb in list {
        vb.encode(buf)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name() -> Oid {
        Oid::from_slice(&[1, 3, 6, 1, 4, 1, 99999, 0])
    }

    fn encode(vb: &VarBind) -> BytesMut {
        let mut buf = BytesMut::new();
        vb.encode(&mut buf).unwrap();
        buf
    }

    fn decode(buf: &[u8]) -> VarBind {
        let mut r = WireReader::new(buf, true);
        let vb = VarBind::decode(&mut r).unwrap();
        assert!(r.is_empty());
        vb
    }

    #[test]
    fn test_varbind_encode_integer() {
        let vb = VarBind::new(name(), Value::Integer(-2));
        let encoded = encode(&vb);
        assert_eq!(u16::from_be_bytes([encoded[0], encoded[1]]), VARBIND_INTEGER);
        // type(2) + reserved(2) + oid(4 + 3*4) + value(4); the tail after .1.3.6.1.4 is 1.99999.0
        assert_eq!(encoded.len(), 4 + 16 + 4);
        assert_eq!(&encoded[encoded.len() - 4..], &(-2i32).to_be_bytes());
        assert_eq!(decode(&encoded), vb);
    }

    #[test]
    fn test_varbind_counter64_is_eight_bytes() {
        let vb = VarBind::new(name(), Value::Counter64(123456789));
        let encoded = encode(&vb);
        assert_eq!(encoded.len(), 4 + 16 + 8);
        assert_eq!(decode(&encoded), vb);
    }

    #[test]
    fn test_varbind_octet_string_padded() {
        let vb = VarBind::new(name(), Value::string("hello"));
        let encoded = encode(&vb);
        assert_eq!(encoded.len() % 4, 0);
        assert_eq!(encoded.len(), 4 + 16 + 4 + 8);
        assert_eq!(decode(&encoded), vb);
    }

    #[test]
    fn test_varbind_ip_address_wrapped_as_octet_string() {
        let vb = VarBind::new(name(), Value::from(Ipv4Addr::new(10, 0, 0, 1)));
        let encoded = encode(&vb);
        let tail = &encoded[20..];
        assert_eq!(tail, &[0, 0, 0, 4, 10, 0, 0, 1]);
        assert_eq!(decode(&encoded), vb);
    }

    #[test]
    fn test_varbind_ip_address_wrong_length() {
        let mut buf = BytesMut::new();
        buf.put_u16(VARBIND_IP_ADDRESS);
        buf.put_u16(0);
        name().encode(&mut buf).unwrap();
        put_octet_string(&mut buf, &[1, 2, 3]).unwrap();
        let mut r = WireReader::new(&buf, true);
        assert!(VarBind::decode(&mut r).is_err());
    }

    #[test]
    fn test_varbind_oid_value() {
        let vb = VarBind::new(name(), Value::ObjectIdentifier("1.3.6.1.6.3.1.1.5.1".parse().unwrap()));
        assert_eq!(decode(&encode(&vb)), vb);
    }

    #[test]
    fn test_varbind_exceptions_have_no_value() {
        for payload in [
            VarBindPayload::Null,
            VarBindPayload::NoSuchObject,
            VarBindPayload::NoSuchInstance,
            VarBindPayload::EndOfMibView,
        ] {
            let vb = VarBind::with_payload(name(), payload);
            let encoded = encode(&vb);
            assert_eq!(encoded.len(), 4 + 16);
            assert_eq!(decode(&encoded), vb);
        }
    }

    #[test]
    fn test_varbind_unknown_type_is_parse_error() {
        let mut buf = BytesMut::new();
        buf.put_u16(99);
        buf.put_u16(0);
        name().encode(&mut buf).unwrap();
        let mut r = WireReader::new(&buf, true);
        assert!(matches!(VarBind::decode(&mut r), Err(AgentXError::Parse(_))));
    }

    #[test]
    fn test_varbind_little_endian_decode() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&VARBIND_GAUGE32.to_le_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&[1, 4, 0, 0]);
        buf.extend_from_slice(&7u32.to_le_bytes());
        buf.extend_from_slice(&500u32.to_le_bytes());
        let mut r = WireReader::new(&buf, false);
        let vb = VarBind::decode(&mut r).unwrap();
        assert_eq!(vb.name, Oid::from_slice(&[1, 3, 6, 1, 4, 7]));
        assert_eq!(vb.value(), Some(&Value::Gauge32(500)));
    }

    #[test]
    fn test_value_kind_codes() {
        assert_eq!(ValueKind::Integer.type_code(), 2);
        assert_eq!(ValueKind::OctetString.type_code(), 4);
        assert_eq!(ValueKind::ObjectIdentifier.type_code(), 6);
        assert_eq!(ValueKind::IpAddress.type_code(), 64);
        assert_eq!(ValueKind::Counter32.type_code(), 65);
        assert_eq!(ValueKind::Gauge32.type_code(), 66);
        assert_eq!(ValueKind::TimeTicks.type_code(), 67);
        assert_eq!(ValueKind::Opaque.type_code(), 68);
        assert_eq!(ValueKind::Counter64.type_code(), 70);
    }
}
