//! Envelope framing.
//!
//! On a byte stream every frame payload is wrapped in a 3-byte envelope
//! header: a direction marker followed by the payload length (little-endian).
//!
//! ```text
//! +--------+--------+--------+-------------------+
//! | marker | len_lo | len_hi | payload[0..len]   |
//! +--------+--------+--------+-------------------+
//!   '<' host → device, '>' device → host
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::DecodedFrame;
use crate::constants::*;
use crate::definitions::decode_frame;
use crate::error::ProtocolError;
use crate::field::Result;

/// Which way an envelope travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to device (`'<'`).
    HostToDevice,
    /// Device to host (`'>'`).
    DeviceToHost,
}

impl Direction {
    /// Wire marker byte.
    pub const fn marker(self) -> u8 {
        match self {
            Direction::HostToDevice => MARKER_HOST_TO_DEVICE,
            Direction::DeviceToHost => MARKER_DEVICE_TO_HOST,
        }
    }

    /// Parses a wire marker byte.
    pub fn from_marker(marker: u8) -> Result<Self> {
        match marker {
            MARKER_HOST_TO_DEVICE => Ok(Direction::HostToDevice),
            MARKER_DEVICE_TO_HOST => Ok(Direction::DeviceToHost),
            other => Err(ProtocolError::UnknownDirectionMarker(other)),
        }
    }
}

/// A parsed envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Direction marker.
    pub direction: Direction,
    /// Payload length, never zero.
    pub length: usize,
}

/// Wraps a payload for host → device transmission.
pub fn wrap(payload: &[u8]) -> Result<Vec<u8>> {
    wrap_as(Direction::HostToDevice, payload)
}

/// Wraps a payload with an explicit direction marker.
pub fn wrap_as(direction: Direction, payload: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
        size: payload.len(),
        max: MAX_ENVELOPE_PAYLOAD,
    })?;
    let mut buf = Vec::with_capacity(ENVELOPE_HEADER_SIZE + payload.len());
    buf.put_u8(direction.marker());
    buf.put_u16_le(len);
    buf.put_slice(payload);
    Ok(buf)
}

/// Parses exactly three header bytes.
pub fn parse_header(header: &[u8]) -> Result<EnvelopeHeader> {
    if header.len() != ENVELOPE_HEADER_SIZE {
        return Err(ProtocolError::InvalidHeaderLength(header.len()));
    }
    let direction = Direction::from_marker(header[0])?;
    let length = u16::from_le_bytes([header[1], header[2]]) as usize;
    if length == 0 {
        return Err(ProtocolError::ZeroLengthFrame);
    }
    Ok(EnvelopeHeader { direction, length })
}

/// Decodes an envelope body read after `header`.
pub fn decode_body(header: &EnvelopeHeader, body: &[u8]) -> Result<DecodedFrame> {
    if body.len() != header.length {
        return Err(ProtocolError::BodyLengthMismatch {
            expected: header.length,
            actual: body.len(),
        });
    }
    decode_frame(header.direction, body)
}

/// A complete envelope extracted from a byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Direction marker of the envelope.
    pub direction: Direction,
    /// Frame payload, code byte first.
    pub payload: Bytes,
}

impl Envelope {
    /// Decodes the payload against the table for its direction.
    pub fn decode(&self) -> Result<DecodedFrame> {
        decode_frame(self.direction, &self.payload)
    }
}

/// Incremental envelope decoder for byte streams.
///
/// Bytes are pushed as they arrive in chunks of any size. Corrupt headers are
/// reported once and skipped so the stream resynchronises on the next valid
/// marker.
#[derive(Debug)]
pub struct FrameDecoder {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    max_payload: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder accepting payloads up to [`MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_payload(MAX_FRAME_SIZE)
    }

    /// Create a decoder with a custom payload limit.
    pub fn with_max_payload(max_payload: usize) -> Self {
        FrameDecoder {
            buffer: BytesMut::with_capacity(ENVELOPE_HEADER_SIZE + max_payload),
            max_payload: max_payload.min(MAX_ENVELOPE_PAYLOAD),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract the next envelope.
    ///
    /// Returns `Ok(None)` when more data is needed. On a framing error the
    /// offending bytes are discarded before the error is returned, so calling
    /// again continues with the rest of the stream.
    pub fn decode(&mut self) -> Result<Option<Envelope>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        // Skip everything up to the next plausible marker in one step.
        let first = self.buffer[0];
        if Direction::from_marker(first).is_err() {
            let skip = self
                .buffer
                .iter()
                .position(|&b| Direction::from_marker(b).is_ok())
                .unwrap_or(self.buffer.len());
            self.buffer.advance(skip);
            log::debug!("resync: discarded {} bytes before marker", skip);
            return Err(ProtocolError::UnknownDirectionMarker(first));
        }

        if self.buffer.len() < ENVELOPE_HEADER_SIZE {
            return Ok(None);
        }

        let header = match parse_header(&self.buffer[..ENVELOPE_HEADER_SIZE]) {
            Ok(header) => header,
            Err(e) => {
                self.buffer.advance(1);
                log::debug!("resync after bad header: {}", e);
                return Err(e);
            }
        };
        if header.length > self.max_payload {
            self.buffer.advance(1);
            log::debug!("resync after oversized length {}", header.length);
            return Err(ProtocolError::FrameLengthOutOfRange {
                length: header.length,
                max: self.max_payload,
            });
        }

        if self.buffer.len() < ENVELOPE_HEADER_SIZE + header.length {
            return Ok(None);
        }

        self.buffer.advance(ENVELOPE_HEADER_SIZE);
        let payload = self.buffer.split_to(header.length).freeze();
        Ok(Some(Envelope {
            direction: header.direction,
            payload,
        }))
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
