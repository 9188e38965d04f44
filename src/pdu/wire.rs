//! Byte-order aware primitives shared by every PDU encoder and decoder.
//!
//! Incoming payloads may use either byte order (selected by the
//! NETWORK_BYTE_ORDER header flag); everything we emit is big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{AgentXError, Result};

/// Cursor over a received payload.
pub struct WireReader<'a> {
    buf: &'a [u8],
    big_endian: bool,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8], big_endian: bool) -> Self {
        WireReader { buf, big_endian }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.buf.len() < n {
            return Err(AgentXError::Parse(format!(
                "truncated {}: need {} bytes, have {}",
                what,
                n,
                self.buf.len()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.need(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.need(2, "u16")?;
        Ok(if self.big_endian {
            self.buf.get_u16()
        } else {
            self.buf.get_u16_le()
        })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.need(4, "u32")?;
        Ok(if self.big_endian {
            self.buf.get_u32()
        } else {
            self.buf.get_u32_le()
        })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.need(8, "u64")?;
        Ok(if self.big_endian {
            self.buf.get_u64()
        } else {
            self.buf.get_u64_le()
        })
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.need(n, "reserved field")?;
        self.buf.advance(n);
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n, "byte field")?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Reads an Octet String (RFC 2741 §5.3): length, data, padding to 4 bytes.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.read_u32()? as usize;
        let data = self.read_bytes(len)?;
        self.skip(padding(len))?;
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Number of zero bytes needed to align `len` to a 4-byte boundary.
pub fn padding(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

/// Writes an Octet String (RFC 2741 §5.3) in network byte order.
pub fn put_octet_string(buf: &mut BytesMut, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| AgentXError::Encode(format!("octet string of {} bytes", data.len())))?;
    buf.put_u32(len);
    buf.put_slice(data);
    buf.put_bytes(0, padding(data.len()));
    Ok(())
}
