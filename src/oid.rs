//! SNMP Object Identifiers and their AgentX wire form (RFC 2741 §5.1).

use std::{cmp::Ordering, fmt, hash::Hash, str::FromStr};

use bytes::{BufMut, BytesMut};

use crate::{
    error::{AgentXError, Result},
    pdu::wire::WireReader,
};

/// The `1.3.6.1` (internet) head that the wire prefix byte abbreviates.
const INTERNET: [u32; 4] = [1, 3, 6, 1];

/// An SNMP Object Identifier.
///
/// Ordering and equality consider only the sub-identifiers. The `include`
/// flag is carried alongside for SearchRange starting bounds.
#[derive(Clone, Debug, Default)]
pub struct Oid {
    subids: Vec<u32>,
    include: bool,
}

impl Oid {
    /// Maximum number of sub-identifiers (RFC 2578 §3.5).
    pub const MAX_LEN: usize = 128;

    /// The null Oid: no sub-identifiers, include cleared.
    pub const fn null() -> Self {
        Oid {
            subids: Vec::new(),
            include: false,
        }
    }

    /// Creates a new OID from a slice of sub-identifiers.
    pub fn from_slice(subs: &[u32]) -> Self {
        Oid {
            subids: subs.to_vec(),
            include: false,
        }
    }

    pub fn subids(&self) -> &[u32] {
        &self.subids
    }

    pub fn include(&self) -> bool {
        self.include
    }

    pub fn set_include(&mut self, include: bool) {
        self.include = include;
    }

    /// Builder form of [`Oid::set_include`].
    pub fn with_include(mut self, include: bool) -> Self {
        self.include = include;
        self
    }

    /// Returns the number of sub-identifiers.
    pub fn len(&self) -> usize {
        self.subids.len()
    }

    /// Returns true if the OID has no sub-identifiers.
    pub fn is_empty(&self) -> bool {
        self.subids.is_empty()
    }

    pub fn is_null(&self) -> bool {
        self.subids.is_empty() && !self.include
    }

    /// Returns a copy of this OID with one more sub-identifier appended.
    pub fn child(&self, subid: u32) -> Oid {
        let mut subids = Vec::with_capacity(self.subids.len() + 1);
        subids.extend_from_slice(&self.subids);
        subids.push(subid);
        Oid {
            subids,
            include: self.include,
        }
    }

    /// Returns `self` followed by all sub-identifiers of `tail`.
    pub fn concat(&self, tail: &Oid) -> Oid {
        let mut subids = self.subids.clone();
        subids.extend_from_slice(&tail.subids);
        Oid {
            subids,
            include: self.include,
        }
    }

    /// Returns true if `id` lies in the subtree rooted at `self` (or equals it).
    pub fn contains(&self, id: &Oid) -> bool {
        self.subids.len() <= id.subids.len() && id.subids[..self.subids.len()] == self.subids[..]
    }

    /// Encodes the OID, using the internet prefix byte when possible.
    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let subs = &self.subids;
        // Prefix 0 means "no prefix", so .1.3.6.1.0 is never compacted.
        let compact = subs.len() >= 5 && subs[..4] == INTERNET && (1..=255).contains(&subs[4]);
        let (prefix, start) = if compact { (subs[4] as u8, 5) } else { (0u8, 0) };

        let n_subid = u8::try_from(subs.len() - start)
            .map_err(|_| AgentXError::Encode(format!("OID too long: {} sub-identifiers", subs.len())))?;
        buf.put_u8(n_subid);
        buf.put_u8(prefix);
        buf.put_u8(u8::from(self.include));
        buf.put_u8(0); // reserved
        for &sub in &subs[start..] {
            buf.put_u32(sub);
        }
        Ok(())
    }

    pub(crate) fn decode(r: &mut WireReader<'_>) -> Result<Oid> {
        let n_subid = r.read_u8()? as usize;
        let prefix = r.read_u8()?;
        let include = match r.read_u8()? {
            0 => false,
            1 => true,
            other => return Err(AgentXError::Parse(format!("OID include byte {}", other))),
        };
        r.skip(1)?;

        let mut subids = Vec::with_capacity(n_subid + 5);
        if prefix != 0 {
            subids.extend_from_slice(&INTERNET);
            subids.push(u32::from(prefix));
        }
        for _ in 0..n_subid {
            subids.push(r.read_u32()?);
        }
        if subids.len() > Self::MAX_LEN {
            return Err(AgentXError::Parse(format!(
                "OID has {} sub-identifiers",
                subids.len()
            )));
        }
        Ok(Oid { subids, include })
    }
}

impl PartialEq for Oid {
    fn eq(&self, other: &Self) -> bool {
        self.subids == other.subids
    }
}

impl Eq for Oid {}

impl Hash for Oid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.subids.hash(state);
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.subids.iter().zip(other.subids.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        self.subids.len().cmp(&other.subids.len())
    }
}

impl From<Vec<u32>> for Oid {
    fn from(subids: Vec<u32>) -> Self {
        Oid {
            subids,
            include: false,
        }
    }
}

impl From<&[u32]> for Oid {
    fn from(subs: &[u32]) -> Self {
        Oid::from_slice(subs)
    }
}

impl FromStr for Oid {
    type Err = AgentXError;

    /// Parses dot-separated decimal sub-identifiers. A leading dot is
    /// accepted and the empty string yields the null OID.
    fn from_str(s: &str) -> Result<Self> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Ok(Oid::null());
        }
        let subids = body
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| AgentXError::Parse(format!("invalid OID {:?}", s)))
            })
            .collect::<Result<Vec<u32>>>()?;
        if subids.len() > Self::MAX_LEN {
            return Err(AgentXError::Parse(format!(
                "OID has {} sub-identifiers",
                subids.len()
            )));
        }
        Ok(Oid::from(subids))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subids.is_empty() {
            return f.write_str(".");
        }
        for sub in &self.subids {
            write!(f, ".{}", sub)?;
        }
        Ok(())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Oid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Oid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// `sysUpTime.0` (RFC 3418).
pub fn sys_uptime_0() -> Oid {
    Oid::from_slice(&[1, 3, 6, 1, 2, 1, 1, 3, 0])
}

/// `snmpTrapOID.0` (RFC 3418).
pub fn snmp_trap_oid_0() -> Oid {
    Oid::from_slice(&[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0])
}
