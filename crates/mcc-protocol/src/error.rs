//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when encoding, decoding or framing protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The field type cannot be encoded at the declared width.
    #[error("field '{key}': {kind} of width {width} is not supported")]
    UnsupportedFieldEncoding {
        /// Field key.
        key: &'static str,
        /// Field type name.
        kind: &'static str,
        /// Declared width in bytes.
        width: usize,
    },

    /// A value does not fit in its fixed-width slot.
    #[error("field '{key}': {actual} bytes exceeds capacity of {max}")]
    FieldTooLong {
        /// Field key.
        key: &'static str,
        /// Usable capacity in bytes.
        max: usize,
        /// Actual encoded length.
        actual: usize,
    },

    /// A numeric value does not fit in the declared width.
    #[error("field '{key}': value {value} out of range for {width}-byte slot")]
    ValueOutOfRange {
        /// Field key.
        key: &'static str,
        /// Offending value, rendered.
        value: String,
        /// Declared width in bytes.
        width: usize,
    },

    /// Fixed text without a terminator inside its window.
    #[error("field '{key}': unterminated text")]
    UnterminatedText {
        /// Field key.
        key: &'static str,
    },

    /// Hex string input is malformed or of the wrong length.
    #[error("field '{key}': malformed hex ({reason})")]
    MalformedHex {
        /// Field key.
        key: &'static str,
        /// What was wrong.
        reason: String,
    },

    /// A required field has no value.
    #[error("missing required field '{0}'")]
    MissingRequiredField(&'static str),

    /// A value of the wrong kind was supplied or requested.
    #[error("field '{key}': expected {expected}")]
    TypeMismatch {
        /// Field key.
        key: &'static str,
        /// Expected value kind.
        expected: &'static str,
    },

    /// A required field extends past the end of the buffer.
    #[error("frame truncated at field '{key}': need {needed} bytes, {remaining} remaining")]
    TruncatedFrame {
        /// Field key.
        key: &'static str,
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the buffer.
        remaining: usize,
    },

    /// Zero-length frame input.
    #[error("empty frame")]
    EmptyFrame,

    /// Payload too large for a 16-bit envelope length.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Payload size.
        size: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Envelope header starts with an unknown direction marker.
    #[error("unknown direction marker: 0x{0:02X}")]
    UnknownDirectionMarker(u8),

    /// Envelope header declares a zero-length body.
    #[error("zero-length frame")]
    ZeroLengthFrame,

    /// Envelope header declares a body longer than the decoder accepts.
    #[error("frame length {length} out of range (max {max})")]
    FrameLengthOutOfRange {
        /// Declared length.
        length: usize,
        /// Maximum accepted.
        max: usize,
    },

    /// Envelope header slice is not exactly three bytes.
    #[error("invalid envelope header length: {0}")]
    InvalidHeaderLength(usize),

    /// Envelope body does not match the header's declared length.
    #[error("body length mismatch: header says {expected}, got {actual}")]
    BodyLengthMismatch {
        /// Length from the header.
        expected: usize,
        /// Length of the body supplied.
        actual: usize,
    },

    /// No frame definition for this code in the selected table.
    #[error("unknown {table} frame code: 0x{code:02X}")]
    UnknownFrameCode {
        /// Frame code.
        code: u8,
        /// Which dispatch table was searched.
        table: &'static str,
    },

    /// A decoded frame was not of the kind the caller asked for.
    #[error("unexpected frame {name} (0x{code:02X})")]
    UnexpectedFrame {
        /// Frame code.
        code: u8,
        /// Frame definition name.
        name: &'static str,
    },
}

/// Error codes returned by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareErrorCode {
    /// Command not supported.
    UnsupportedCommand,
    /// Contact or item not found.
    NotFound,
    /// Table (contacts, packets, etc.) is full.
    TableFull,
    /// Bad state for this operation.
    BadState,
    /// File I/O error.
    FileIoError,
    /// Illegal argument.
    IllegalArg,
    /// The firmware did not say.
    Unspecified,
    /// Unknown error code.
    Unknown(u8),
}

impl std::fmt::Display for FirmwareErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FirmwareErrorCode::UnsupportedCommand => write!(f, "unsupported command"),
            FirmwareErrorCode::NotFound => write!(f, "not found"),
            FirmwareErrorCode::TableFull => write!(f, "table full"),
            FirmwareErrorCode::BadState => write!(f, "bad state"),
            FirmwareErrorCode::FileIoError => write!(f, "file I/O error"),
            FirmwareErrorCode::IllegalArg => write!(f, "illegal argument"),
            FirmwareErrorCode::Unspecified => write!(f, "unspecified error"),
            FirmwareErrorCode::Unknown(code) => write!(f, "unknown error (0x{:02X})", code),
        }
    }
}

impl From<u8> for FirmwareErrorCode {
    fn from(code: u8) -> Self {
        use crate::constants::*;
        match code {
            ERR_CODE_UNSUPPORTED_CMD => FirmwareErrorCode::UnsupportedCommand,
            ERR_CODE_NOT_FOUND => FirmwareErrorCode::NotFound,
            ERR_CODE_TABLE_FULL => FirmwareErrorCode::TableFull,
            ERR_CODE_BAD_STATE => FirmwareErrorCode::BadState,
            ERR_CODE_FILE_IO_ERROR => FirmwareErrorCode::FileIoError,
            ERR_CODE_ILLEGAL_ARG => FirmwareErrorCode::IllegalArg,
            _ => FirmwareErrorCode::Unknown(code),
        }
    }
}
