//! Field codec.
//!
//! A [`Field`] describes one slot of a frame layout: its key, its wire
//! representation and whether it may be absent. Fields are plain `Copy` data
//! so that complete frame layouts can live in `static` tables.
//!
//! ```text
//! Uint(w) / Int(w)   little-endian integer, w in {1, 2, 4, 8}
//! Float(w)           IEEE-754 little-endian, w in {4, 8}
//! Hex(w)             w raw bytes, exposed as a 2w-char hex string
//! CString(w)         w bytes, NUL-terminated, zero padded
//! Bin(w)             w raw bytes, zero padded
//! Text               UTF-8 remainder of the frame (last field only)
//! ```

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// Result type for field and frame codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Wire representation of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Unsigned little-endian integer of the given width.
    Uint(usize),
    /// Signed little-endian integer of the given width.
    Int(usize),
    /// IEEE-754 float of the given width.
    Float(usize),
    /// Fixed-width binary exposed as a lower-case hex string.
    Hex(usize),
    /// Fixed-width NUL-terminated text.
    CString(usize),
    /// Fixed-width raw bytes.
    Bin(usize),
    /// Variable-length text consuming the rest of the frame.
    Text,
}

impl FieldType {
    /// Short name used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            FieldType::Uint(_) => "uint",
            FieldType::Int(_) => "int",
            FieldType::Float(_) => "float",
            FieldType::Hex(_) => "hex",
            FieldType::CString(_) => "cstring",
            FieldType::Bin(_) => "bin",
            FieldType::Text => "text",
        }
    }

    /// Declared width, or `None` for variable-length text.
    pub const fn width(&self) -> Option<usize> {
        match *self {
            FieldType::Uint(w)
            | FieldType::Int(w)
            | FieldType::Float(w)
            | FieldType::Hex(w)
            | FieldType::CString(w)
            | FieldType::Bin(w) => Some(w),
            FieldType::Text => None,
        }
    }

    /// Checks that the (type, width) pair has a wire encoding.
    fn check(&self, key: &'static str) -> Result<()> {
        let supported = match *self {
            FieldType::Uint(w) | FieldType::Int(w) => matches!(w, 1 | 2 | 4 | 8),
            FieldType::Float(w) => matches!(w, 4 | 8),
            FieldType::Hex(w) | FieldType::CString(w) | FieldType::Bin(w) => w > 0,
            FieldType::Text => true,
        };
        if supported {
            Ok(())
        } else {
            Err(ProtocolError::UnsupportedFieldEncoding {
                key,
                kind: self.kind(),
                width: self.width().unwrap_or(0),
            })
        }
    }
}

/// Two-way numeric transform applied between the wire and the value side.
///
/// `get` runs after decoding, `set` before encoding.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    /// Wire value to exposed value.
    pub get: fn(f64) -> f64,
    /// Exposed value to wire value.
    pub set: fn(f64) -> f64,
}

fn micro_to_degrees(raw: f64) -> f64 {
    raw / 1_000_000.0
}

fn degrees_to_micro(degrees: f64) -> f64 {
    degrees * 1_000_000.0
}

impl Transform {
    /// Integer microdegrees on the wire, floating degrees on the value side.
    pub const MICRODEGREES: Transform = Transform {
        get: micro_to_degrees,
        set: degrees_to_micro,
    };
}

/// A keyed field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Key in the decoded value map.
    pub key: &'static str,
    /// Wire representation.
    pub ty: FieldType,
    /// Trailing optional field: omitted on encode when absent, skipped on
    /// decode when the buffer is too short.
    pub optional: bool,
    /// Optional numeric transform.
    pub transform: Option<Transform>,
}

/// One slot of a frame layout.
#[derive(Debug, Clone, Copy)]
pub enum Field {
    /// Keyless zero padding of a static width.
    Reserved(usize),
    /// A keyed value.
    Value(FieldSpec),
}

impl Field {
    const fn keyed(key: &'static str, ty: FieldType) -> Field {
        Field::Value(FieldSpec {
            key,
            ty,
            optional: false,
            transform: None,
        })
    }

    /// Unsigned integer field.
    pub const fn uint(key: &'static str, width: usize) -> Field {
        Field::keyed(key, FieldType::Uint(width))
    }

    /// Signed integer field.
    pub const fn int(key: &'static str, width: usize) -> Field {
        Field::keyed(key, FieldType::Int(width))
    }

    /// Float field.
    pub const fn float(key: &'static str, width: usize) -> Field {
        Field::keyed(key, FieldType::Float(width))
    }

    /// Hex-exposed binary field.
    pub const fn hex(key: &'static str, width: usize) -> Field {
        Field::keyed(key, FieldType::Hex(width))
    }

    /// NUL-terminated text field.
    pub const fn cstr(key: &'static str, width: usize) -> Field {
        Field::keyed(key, FieldType::CString(width))
    }

    /// Raw binary field.
    pub const fn bin(key: &'static str, width: usize) -> Field {
        Field::keyed(key, FieldType::Bin(width))
    }

    /// Variable-length text field.
    pub const fn text(key: &'static str) -> Field {
        Field::keyed(key, FieldType::Text)
    }

    /// Keyless padding.
    pub const fn reserved(width: usize) -> Field {
        Field::Reserved(width)
    }

    /// Marks the field optional.
    pub const fn optional(self) -> Field {
        match self {
            Field::Value(spec) => Field::Value(FieldSpec {
                optional: true,
                ..spec
            }),
            Field::Reserved(width) => Field::Reserved(width),
        }
    }

    /// Attaches a numeric transform.
    pub const fn scaled(self, transform: Transform) -> Field {
        match self {
            Field::Value(spec) => Field::Value(FieldSpec {
                transform: Some(transform),
                ..spec
            }),
            Field::Reserved(width) => Field::Reserved(width),
        }
    }

    /// Returns the key, if any.
    pub const fn key(&self) -> Option<&'static str> {
        match self {
            Field::Value(spec) => Some(spec.key),
            Field::Reserved(_) => None,
        }
    }

    /// Returns true for variable-length text.
    pub const fn is_variable(&self) -> bool {
        matches!(
            self,
            Field::Value(FieldSpec {
                ty: FieldType::Text,
                ..
            })
        )
    }
}

/// A decoded or to-be-encoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unsigned integer.
    Uint(u64),
    /// Signed integer.
    Int(i64),
    /// Float, also used for transformed numeric fields.
    Float(f64),
    /// Text, also used for hex-exposed binary.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Unsigned view of an integer value.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Uint(v) => Some(v),
            Value::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Signed view of an integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Float view of a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v),
            Value::Uint(v) => Some(v as f64),
            Value::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Byte view.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($variant:ident: $($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

value_from!(Uint: u8, u16, u32, u64);
value_from!(Int: i8, i16, i32, i64);
value_from!(Float: f32, f64);
value_from!(Text: String, &str);
value_from!(Bytes: Vec<u8>, &[u8]);

impl FieldSpec {
    /// Appends the wire form of `value` to `buf`.
    pub fn encode(&self, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
        self.ty.check(self.key)?;
        let key = self.key;
        match self.ty {
            FieldType::Uint(width) => {
                let raw = match self.transform {
                    Some(t) => self.scaled_integer(value, t, 0.0, max_unsigned(width) as f64)?
                        as u64,
                    None => value.as_u64().ok_or(ProtocolError::TypeMismatch {
                        key,
                        expected: "unsigned integer",
                    })?,
                };
                if raw > max_unsigned(width) {
                    return Err(out_of_range(key, raw, width));
                }
                buf.put_uint_le(raw, width);
            }
            FieldType::Int(width) => {
                let (min, max) = signed_bounds(width);
                let raw = match self.transform {
                    Some(t) => self.scaled_integer(value, t, min as f64, max as f64)?,
                    None => value.as_i64().ok_or(ProtocolError::TypeMismatch {
                        key,
                        expected: "signed integer",
                    })?,
                };
                if raw < min || raw > max {
                    return Err(out_of_range(key, raw, width));
                }
                buf.put_int_le(raw, width);
            }
            FieldType::Float(width) => {
                let mut raw = value.as_f64().ok_or(ProtocolError::TypeMismatch {
                    key,
                    expected: "number",
                })?;
                if let Some(t) = self.transform {
                    raw = (t.set)(raw);
                }
                if width == 4 {
                    buf.put_f32_le(raw as f32);
                } else {
                    buf.put_f64_le(raw);
                }
            }
            FieldType::Hex(width) => {
                let text = value.as_str().ok_or(ProtocolError::TypeMismatch {
                    key,
                    expected: "hex string",
                })?;
                if text.len() != width * 2 {
                    return Err(ProtocolError::MalformedHex {
                        key,
                        reason: format!("expected {} hex chars, got {}", width * 2, text.len()),
                    });
                }
                let bytes = hex::decode(text).map_err(|e| ProtocolError::MalformedHex {
                    key,
                    reason: e.to_string(),
                })?;
                buf.put_slice(&bytes);
            }
            FieldType::CString(width) => {
                let text = value.as_str().ok_or(ProtocolError::TypeMismatch {
                    key,
                    expected: "text",
                })?;
                // One byte is always kept for the terminator.
                if text.len() + 1 > width {
                    return Err(ProtocolError::FieldTooLong {
                        key,
                        max: width - 1,
                        actual: text.len(),
                    });
                }
                buf.put_slice(text.as_bytes());
                buf.put_bytes(0, width - text.len());
            }
            FieldType::Bin(width) => {
                let bytes = value.as_bytes().ok_or(ProtocolError::TypeMismatch {
                    key,
                    expected: "bytes",
                })?;
                if bytes.len() > width {
                    return Err(ProtocolError::FieldTooLong {
                        key,
                        max: width,
                        actual: bytes.len(),
                    });
                }
                buf.put_slice(bytes);
                buf.put_bytes(0, width - bytes.len());
            }
            FieldType::Text => {
                let text = value.as_str().ok_or(ProtocolError::TypeMismatch {
                    key,
                    expected: "text",
                })?;
                buf.put_slice(text.as_bytes());
            }
        }
        log::trace!("encoded field {} ({})", key, self.ty.kind());
        Ok(())
    }

    /// Decodes the field from the start of `buf`.
    ///
    /// Returns the value and the number of bytes consumed, or `None` when an
    /// optional field does not fit in what is left of the frame.
    pub fn decode(&self, buf: &[u8]) -> Result<Option<(Value, usize)>> {
        self.ty.check(self.key)?;
        let key = self.key;
        let width = match self.ty.width() {
            Some(width) => width,
            None if buf.is_empty() && self.optional => return Ok(None),
            None => buf.len(),
        };
        if buf.len() < width {
            if self.optional {
                log::trace!("optional field {} absent", key);
                return Ok(None);
            }
            return Err(ProtocolError::TruncatedFrame {
                key,
                needed: width,
                remaining: buf.len(),
            });
        }

        let mut window = &buf[..width];
        let value = match self.ty {
            FieldType::Uint(_) => {
                let raw = window.get_uint_le(width);
                match self.transform {
                    Some(t) => Value::Float((t.get)(raw as f64)),
                    None => Value::Uint(raw),
                }
            }
            FieldType::Int(_) => {
                let raw = window.get_int_le(width);
                match self.transform {
                    Some(t) => Value::Float((t.get)(raw as f64)),
                    None => Value::Int(raw),
                }
            }
            FieldType::Float(_) => {
                let raw = if width == 4 {
                    window.get_f32_le() as f64
                } else {
                    window.get_f64_le()
                };
                Value::Float(self.transform.map_or(raw, |t| (t.get)(raw)))
            }
            FieldType::Hex(_) => Value::Text(hex::encode(window)),
            FieldType::CString(_) => {
                let end = window
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or(ProtocolError::UnterminatedText { key })?;
                Value::Text(String::from_utf8_lossy(&window[..end]).into_owned())
            }
            FieldType::Bin(_) => Value::Bytes(window.to_vec()),
            FieldType::Text => Value::Text(String::from_utf8_lossy(window).into_owned()),
        };
        log::trace!("decoded field {} ({} bytes)", key, width);
        Ok(Some((value, width)))
    }

    fn scaled_integer(&self, value: &Value, t: Transform, min: f64, max: f64) -> Result<i64> {
        let exposed = value.as_f64().ok_or(ProtocolError::TypeMismatch {
            key: self.key,
            expected: "number",
        })?;
        let raw = (t.set)(exposed).round();
        if !raw.is_finite() || raw < min || raw > max {
            return Err(ProtocolError::ValueOutOfRange {
                key: self.key,
                value: exposed.to_string(),
                width: self.ty.width().unwrap_or(0),
            });
        }
        Ok(raw as i64)
    }
}

fn max_unsigned(width: usize) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (width * 8)) - 1
    }
}

fn signed_bounds(width: usize) -> (i64, i64) {
    if width >= 8 {
        (i64::MIN, i64::MAX)
    } else {
        let half = 1i64 << (width * 8 - 1);
        (-half, half - 1)
    }
}

fn out_of_range(key: &'static str, value: impl ToString, width: usize) -> ProtocolError {
    ProtocolError::ValueOutOfRange {
        key,
        value: value.to_string(),
        width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(field: Field) -> FieldSpec {
        match field {
            Field::Value(spec) => spec,
            Field::Reserved(_) => panic!("reserved field has no spec"),
        }
    }

    fn encode(field: Field, value: impl Into<Value>) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        spec(field).encode(&value.into(), &mut buf)?;
        Ok(buf)
    }

    #[test]
    fn test_integers_little_endian() {
        assert_eq!(encode(Field::uint("a", 4), 0x0102_0304u32).unwrap(), [4, 3, 2, 1]);
        assert_eq!(encode(Field::uint("a", 2), 0xBEEFu16).unwrap(), [0xEF, 0xBE]);
        assert_eq!(encode(Field::int("a", 1), -1i8).unwrap(), [0xFF]);
        assert_eq!(encode(Field::int("a", 4), -2i32).unwrap(), [0xFE, 0xFF, 0xFF, 0xFF]);

        let (value, used) = spec(Field::int("a", 1)).decode(&[0xFF, 9]).unwrap().unwrap();
        assert_eq!(value, Value::Int(-1));
        assert_eq!(used, 1);
    }

    #[test]
    fn test_unsupported_width() {
        let err = encode(Field::uint("odd", 3), 1u8).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::UnsupportedFieldEncoding { key: "odd", width: 3, .. }
        ));
        let err = spec(Field::float("f", 2)).decode(&[0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::UnsupportedFieldEncoding { .. }));
    }

    #[test]
    fn test_value_out_of_range() {
        let err = encode(Field::uint("tx_power", 1), 256u16).unwrap_err();
        assert!(matches!(err, ProtocolError::ValueOutOfRange { key: "tx_power", .. }));
        let err = encode(Field::int("path", 1), 128i16).unwrap_err();
        assert!(matches!(err, ProtocolError::ValueOutOfRange { .. }));
        let err = encode(Field::uint("count", 4), -1i32).unwrap_err();
        assert!(matches!(err, ProtocolError::TypeMismatch { .. }));
    }

    #[test]
    fn test_cstring_capacity() {
        let field = Field::cstr("name", 8);
        let buf = encode(field, "abcdefg").unwrap();
        assert_eq!(buf, b"abcdefg\0");

        let err = encode(field, "abcdefgh").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldTooLong {
                key: "name",
                max: 7,
                actual: 8
            }
        );

        let (value, used) = spec(field).decode(b"ab\0\0\0\0\0\0rest").unwrap().unwrap();
        assert_eq!(value, Value::Text("ab".into()));
        assert_eq!(used, 8);
    }

    #[test]
    fn test_cstring_unterminated() {
        let err = spec(Field::cstr("name", 4)).decode(b"abcd\0").unwrap_err();
        assert_eq!(err, ProtocolError::UnterminatedText { key: "name" });
    }

    #[test]
    fn test_hex_field() {
        let field = Field::hex("ack", 4);
        assert_eq!(encode(field, "0a0b0c0d").unwrap(), [0x0a, 0x0b, 0x0c, 0x0d]);

        let err = encode(field, "0a0b0c0").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHex { key: "ack", .. }));
        let err = encode(field, "0a0b0c0z").unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedHex { .. }));

        let (value, _) = spec(field).decode(&[0xAB, 0xCD, 0xEF, 0x01]).unwrap().unwrap();
        assert_eq!(value, Value::Text("abcdef01".into()));
    }

    #[test]
    fn test_bin_padding() {
        let field = Field::bin("path", 4);
        assert_eq!(encode(field, vec![1u8, 2]).unwrap(), [1, 2, 0, 0]);
        let err = encode(field, vec![0u8; 5]).unwrap_err();
        assert!(matches!(err, ProtocolError::FieldTooLong { max: 4, actual: 5, .. }));
    }

    #[test]
    fn test_optional_absent_on_short_buffer() {
        let field = spec(Field::uint("since", 4).optional());
        assert_eq!(field.decode(&[1, 2]).unwrap(), None);

        let required = spec(Field::uint("since", 4));
        let err = required.decode(&[1, 2]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TruncatedFrame {
                key: "since",
                needed: 4,
                remaining: 2
            }
        );
    }

    #[test]
    fn test_microdegree_transform() {
        let field = Field::int("adv_lat", 4).scaled(Transform::MICRODEGREES);
        let buf = encode(field, 47.606209f64).unwrap();
        assert_eq!(i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]), 47_606_209);

        let (value, _) = spec(field).decode(&buf).unwrap().unwrap();
        let degrees = value.as_f64().unwrap();
        assert!((degrees - 47.606209).abs() < 1e-9);
    }

    #[test]
    fn test_text_consumes_remainder() {
        let field = spec(Field::text("text"));
        let (value, used) = field.decode(b"hello").unwrap().unwrap();
        assert_eq!(value, Value::Text("hello".into()));
        assert_eq!(used, 5);

        let (value, used) = field.decode(b"").unwrap().unwrap();
        assert_eq!(value, Value::Text(String::new()));
        assert_eq!(used, 0);
    }
}
