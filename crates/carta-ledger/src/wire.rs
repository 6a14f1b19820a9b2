//! Frame encoding and decoding for the ledger wire protocol.
//!
//! A frame is a fixed-size header followed by a JSON payload:
//!
//! ```text
//! ┌───────────┬──────────┬──────────┬────────────┬─────────────┐
//! │ magic:u32 │ ver:u16  │ len:u32  │ crc32:u32  │ payload ... │
//! └───────────┴──────────┴──────────┴────────────┴─────────────┘
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LedgerError, LedgerResult};

// ============================================================================
// Constants
// ============================================================================

/// Protocol magic bytes: "CART" in big-endian.
pub const MAGIC: u32 = 0x4341_5254;

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Frame header size in bytes (magic + version + length + checksum).
pub const FRAME_HEADER_SIZE: usize = 14;

/// Maximum payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// ============================================================================
// FrameHeader
// ============================================================================

/// Frame header containing metadata about the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Protocol magic bytes.
    pub magic: u32,
    /// Protocol version.
    pub version: u16,
    /// Payload length in bytes.
    pub length: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
}

impl FrameHeader {
    /// Creates a new frame header for the given payload.
    pub fn new(payload: &[u8]) -> Self {
        Self {
            magic: MAGIC,
            version: PROTOCOL_VERSION,
            length: payload.len() as u32,
            checksum: crc32fast::hash(payload),
        }
    }

    /// Encodes the header to bytes.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.magic);
        buf.put_u16(self.version);
        buf.put_u32(self.length);
        buf.put_u32(self.checksum);
    }

    /// Decodes a header from bytes.
    ///
    /// Returns `None` if there aren't enough bytes yet.
    pub fn decode(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < FRAME_HEADER_SIZE {
            return None;
        }

        Some(Self {
            magic: buf.get_u32(),
            version: buf.get_u16(),
            length: buf.get_u32(),
            checksum: buf.get_u32(),
        })
    }

    /// Validates the header.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.magic != MAGIC {
            return Err(LedgerError::Wire(format!(
                "invalid magic: {:#010x}",
                self.magic
            )));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(LedgerError::Wire(format!(
                "unsupported protocol version: {}",
                self.version
            )));
        }
        if self.length > MAX_PAYLOAD_SIZE {
            return Err(LedgerError::Wire(format!(
                "payload too large: {} bytes (max {MAX_PAYLOAD_SIZE})",
                self.length
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A complete frame with header and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,
    /// Payload bytes.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new frame from a payload.
    pub fn new(payload: Bytes) -> Self {
        let header = FrameHeader::new(&payload);
        Self { header, payload }
    }

    /// Encodes the frame to a new byte buffer.
    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        self.header.encode(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decodes one frame from the front of `buf`, consuming its bytes.
    ///
    /// Returns `Ok(None)` if the buffer does not yet hold a complete frame.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Wire`] on header validation or checksum failure.
    pub fn decode(buf: &mut BytesMut) -> LedgerResult<Option<Self>> {
        let mut peek = &buf[..];
        let Some(header) = FrameHeader::decode(&mut peek) else {
            return Ok(None);
        };
        header.validate()?;

        let total = FRAME_HEADER_SIZE + header.length as usize;
        if buf.len() < total {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(header.length as usize).freeze();

        let checksum = crc32fast::hash(&payload);
        if checksum != header.checksum {
            return Err(LedgerError::Wire(format!(
                "checksum mismatch: expected {:#010x}, got {checksum:#010x}",
                header.checksum
            )));
        }

        Ok(Some(Self { header, payload }))
    }
}

// ============================================================================
// Request / Response payloads
// ============================================================================

/// A ledger function invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerRequest {
    /// Ledger function name (e.g. `CreateRecord`).
    pub function: String,
    /// Positional arguments, JSON-encoded.
    pub args: Vec<Value>,
    /// True for submit (write) calls, false for evaluate (read) calls.
    pub submit: bool,
}

impl LedgerRequest {
    /// Serializes the request into a frame.
    pub fn to_frame(&self) -> Frame {
        let payload = serde_json::to_vec(self).expect("request serialization cannot fail");
        Frame::new(Bytes::from(payload))
    }
}

/// Error detail returned by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerFault {
    /// Machine-readable code (e.g. `FUNCTION_NOT_FOUND`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// The ledger's reply to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResponse {
    /// True if the function executed and committed.
    pub ok: bool,
    /// Function result when `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Fault detail when not `ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<LedgerFault>,
}

/// Fault code the ledger returns for an unknown function name.
pub const FAULT_FUNCTION_NOT_FOUND: &str = "FUNCTION_NOT_FOUND";

impl LedgerResponse {
    /// Parses a response from a frame payload.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Wire`] if the payload is not a valid response.
    pub fn from_frame(frame: &Frame) -> LedgerResult<Self> {
        serde_json::from_slice(&frame.payload)
            .map_err(|e| LedgerError::Wire(format!("malformed response: {e}")))
    }

    /// Converts the response into the function result.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::FunctionNotFound`] for the unknown-function fault
    /// - [`LedgerError::Rejected`] for any other fault
    pub fn into_result(self, function: &str) -> LedgerResult<Value> {
        if self.ok {
            return Ok(self.payload.unwrap_or(Value::Null));
        }

        match self.error {
            Some(fault) if fault.code == FAULT_FUNCTION_NOT_FOUND => {
                Err(LedgerError::FunctionNotFound(function.to_string()))
            }
            Some(fault) => Err(LedgerError::Rejected(format!(
                "{}: {}",
                fault.code, fault.message
            ))),
            None => Err(LedgerError::Rejected("unspecified fault".to_string())),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
