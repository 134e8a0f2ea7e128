//! Frame codec.
//!
//! A [`FrameDef`] is an immutable, ordered field layout preceded by a
//! one-byte frame code. Encoding walks the layout pulling values out of a
//! [`FieldValues`] map; decoding walks it with a byte cursor and produces a
//! [`DecodedFrame`].

use std::collections::HashMap;

use crate::error::ProtocolError;
use crate::field::{Field, Result, Value};

/// Static layout of one command, response or push frame.
#[derive(Debug)]
pub struct FrameDef {
    /// Human-readable frame name.
    pub name: &'static str,
    /// Frame code, always the first wire byte.
    pub code: u8,
    /// Fields following the code, in wire order.
    pub fields: &'static [Field],
}

impl FrameDef {
    /// Builds a frame definition.
    ///
    /// # Panics
    ///
    /// Panics if a variable-length text field is not the last field. Frame
    /// definitions are built in `static` items, so the panic surfaces at
    /// compile time.
    pub const fn new(name: &'static str, code: u8, fields: &'static [Field]) -> Self {
        let mut i = 0;
        while i < fields.len() {
            if fields[i].is_variable() && i + 1 != fields.len() {
                panic!("variable-length text must be the last field of a frame");
            }
            i += 1;
        }
        FrameDef { name, code, fields }
    }

    /// Returns true if this frame lives in the unsolicited push range.
    pub const fn is_push(&self) -> bool {
        crate::constants::is_push_code(self.code)
    }

    /// Encodes `values` into a frame payload, code byte first.
    ///
    /// Missing optional fields contribute no bytes. Encoding never returns a
    /// partially written buffer.
    pub fn encode(&self, values: &FieldValues) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(1 + self.fixed_len());
        buf.push(self.code);
        for field in self.fields {
            match field {
                Field::Reserved(width) => buf.resize(buf.len() + width, 0),
                Field::Value(spec) => match values.get(spec.key) {
                    Some(value) => spec.encode(value, &mut buf)?,
                    None if spec.optional => continue,
                    None => return Err(ProtocolError::MissingRequiredField(spec.key)),
                },
            }
        }
        log::trace!("encoded {} frame ({} bytes)", self.name, buf.len());
        Ok(buf)
    }

    /// Decodes a frame payload against this definition.
    ///
    /// The reported code is this definition's code; byte 0 of `bytes` is
    /// skipped without inspection. Bytes past the last field are ignored.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedFrame> {
        if bytes.is_empty() {
            return Err(ProtocolError::EmptyFrame);
        }
        let mut cursor = 1;
        let mut values = FieldValues::new();
        for field in self.fields {
            let rest = &bytes[cursor..];
            match field {
                Field::Reserved(width) => {
                    if rest.len() < *width {
                        return Err(ProtocolError::TruncatedFrame {
                            key: "reserved",
                            needed: *width,
                            remaining: rest.len(),
                        });
                    }
                    cursor += width;
                }
                Field::Value(spec) => {
                    if let Some((value, used)) = spec.decode(rest)? {
                        values.insert(spec.key, value);
                        cursor += used;
                    }
                }
            }
        }
        if cursor < bytes.len() {
            log::trace!(
                "{} frame: ignoring {} trailing bytes",
                self.name,
                bytes.len() - cursor
            );
        }
        Ok(DecodedFrame {
            code: self.code,
            name: self.name,
            values,
        })
    }

    /// Sum of all fixed field widths.
    fn fixed_len(&self) -> usize {
        self.fields
            .iter()
            .map(|field| match field {
                Field::Reserved(width) => *width,
                Field::Value(spec) => spec.ty.width().unwrap_or(0),
            })
            .sum()
    }
}

/// Key to value mapping for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: HashMap<&'static str, Value>,
}

impl FieldValues {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style insert of an optional value; `None` leaves the key absent.
    pub fn with_opt<V: Into<Value>>(mut self, key: &'static str, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Inserts or replaces a value.
    pub fn insert(&mut self, key: &'static str, value: impl Into<Value>) {
        self.values.insert(key, value.into());
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no values are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over all key/value pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.values.iter().map(|(k, v)| (*k, v))
    }

    /// Looks up a required value.
    pub fn require(&self, key: &'static str) -> Result<&Value> {
        self.get(key)
            .ok_or(ProtocolError::MissingRequiredField(key))
    }

    fn unsigned(&self, key: &'static str) -> Result<u64> {
        self.require(key)?
            .as_u64()
            .ok_or(ProtocolError::TypeMismatch {
                key,
                expected: "unsigned integer",
            })
    }

    fn signed(&self, key: &'static str) -> Result<i64> {
        self.require(key)?
            .as_i64()
            .ok_or(ProtocolError::TypeMismatch {
                key,
                expected: "signed integer",
            })
    }

    /// Required `u8` value.
    pub fn u8(&self, key: &'static str) -> Result<u8> {
        narrow(key, self.unsigned(key)?, 1)
    }

    /// Required `u32` value.
    pub fn u32(&self, key: &'static str) -> Result<u32> {
        narrow(key, self.unsigned(key)?, 4)
    }

    /// Required `i8` value.
    pub fn i8(&self, key: &'static str) -> Result<i8> {
        narrow(key, self.signed(key)?, 1)
    }

    /// Required numeric value as `f64`.
    pub fn f64(&self, key: &'static str) -> Result<f64> {
        self.require(key)?
            .as_f64()
            .ok_or(ProtocolError::TypeMismatch {
                key,
                expected: "number",
            })
    }

    /// Required text value.
    pub fn text(&self, key: &'static str) -> Result<&str> {
        self.require(key)?
            .as_str()
            .ok_or(ProtocolError::TypeMismatch {
                key,
                expected: "text",
            })
    }

    /// Required raw byte value.
    pub fn bytes(&self, key: &'static str) -> Result<&[u8]> {
        self.require(key)?
            .as_bytes()
            .ok_or(ProtocolError::TypeMismatch {
                key,
                expected: "bytes",
            })
    }

    /// Required hex value decoded into a fixed-size array.
    pub fn hex_array<const N: usize>(&self, key: &'static str) -> Result<[u8; N]> {
        let text = self.text(key)?;
        let mut out = [0u8; N];
        hex::decode_to_slice(text, &mut out).map_err(|e| ProtocolError::MalformedHex {
            key,
            reason: e.to_string(),
        })?;
        Ok(out)
    }

    /// Optional `u8` value.
    pub fn opt_u8(&self, key: &'static str) -> Result<Option<u8>> {
        self.optional(key, Self::u8)
    }

    /// Optional `u32` value.
    pub fn opt_u32(&self, key: &'static str) -> Result<Option<u32>> {
        self.optional(key, Self::u32)
    }

    /// Optional numeric value as `f64`.
    pub fn opt_f64(&self, key: &'static str) -> Result<Option<f64>> {
        self.optional(key, Self::f64)
    }

    fn optional<T>(
        &self,
        key: &'static str,
        get: impl FnOnce(&Self, &'static str) -> Result<T>,
    ) -> Result<Option<T>> {
        if self.contains(key) {
            get(self, key).map(Some)
        } else {
            Ok(None)
        }
    }
}

fn narrow<S, T>(key: &'static str, value: S, width: usize) -> Result<T>
where
    S: Copy + ToString,
    T: TryFrom<S>,
{
    T::try_from(value).map_err(|_| ProtocolError::ValueOutOfRange {
        key,
        value: value.to_string(),
        width,
    })
}

/// A frame decoded from wire bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Frame code.
    pub code: u8,
    /// Name of the definition used to decode it.
    pub name: &'static str,
    /// Decoded field values.
    pub values: FieldValues,
}

impl DecodedFrame {
    /// Returns true if the frame is an unsolicited push.
    pub fn is_push(&self) -> bool {
        crate::constants::is_push_code(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Transform;

    static SAMPLE: FrameDef = {
        const FIELDS: &[Field] = &[
            Field::uint("kind", 1),
            Field::reserved(2),
            Field::cstr("label", 6),
            Field::int("lat", 4).scaled(Transform::MICRODEGREES).optional(),
            Field::text("note").optional(),
        ];
        FrameDef::new("Sample", 0x42, FIELDS)
    };

    #[test]
    fn test_encode_layout() {
        let values = FieldValues::new()
            .with("kind", 7u8)
            .with("label", "abc")
            .with("lat", -1.5f64)
            .with("note", "hi");
        let bytes = SAMPLE.encode(&values).unwrap();
        assert_eq!(bytes[0], 0x42);
        assert_eq!(bytes[1], 7);
        assert_eq!(&bytes[2..4], &[0, 0]);
        assert_eq!(&bytes[4..10], b"abc\0\0\0");
        assert_eq!(&bytes[10..14], &(-1_500_000i32).to_le_bytes());
        assert_eq!(&bytes[14..], b"hi");

        let decoded = SAMPLE.decode(&bytes).unwrap();
        assert_eq!(decoded.code, 0x42);
        assert_eq!(decoded.values.u8("kind").unwrap(), 7);
        assert_eq!(decoded.values.text("label").unwrap(), "abc");
        assert_eq!(decoded.values.f64("lat").unwrap(), -1.5);
        assert_eq!(decoded.values.text("note").unwrap(), "hi");
    }

    #[test]
    fn test_missing_required_field() {
        let values = FieldValues::new().with("kind", 1u8);
        assert_eq!(
            SAMPLE.encode(&values).unwrap_err(),
            ProtocolError::MissingRequiredField("label")
        );
    }

    #[test]
    fn test_optional_fields_omitted() {
        let values = FieldValues::new().with("kind", 1u8).with("label", "x");
        let short = SAMPLE.encode(&values).unwrap();
        let long = SAMPLE.encode(&values.clone().with("lat", 10.0f64)).unwrap();
        assert!(short.len() < long.len());

        let decoded = SAMPLE.decode(&short).unwrap();
        assert!(!decoded.values.contains("lat"));
        assert!(!decoded.values.contains("note"));
        assert_eq!(decoded.values.opt_f64("lat").unwrap(), None);
    }

    #[test]
    fn test_empty_and_truncated() {
        assert_eq!(SAMPLE.decode(&[]).unwrap_err(), ProtocolError::EmptyFrame);
        let err = SAMPLE.decode(&[0x42, 1, 0, 0, b'a']).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedFrame { key: "label", .. }));
    }

    #[test]
    fn test_decode_reports_definition_code() {
        let bytes = SAMPLE
            .encode(&FieldValues::new().with("kind", 1u8).with("label", "x"))
            .unwrap();
        let mut other = bytes.clone();
        other[0] = 0x99;
        assert_eq!(SAMPLE.decode(&other).unwrap().code, 0x42);
    }

    #[test]
    fn test_typed_getters() {
        let values = FieldValues::new()
            .with("small", 300u32)
            .with("neg", -3i8)
            .with("key", "0a0b");
        assert!(matches!(
            values.u8("small").unwrap_err(),
            ProtocolError::ValueOutOfRange { key: "small", .. }
        ));
        assert_eq!(values.u32("small").unwrap(), 300);
        assert_eq!(values.i8("neg").unwrap(), -3);
        assert_eq!(values.hex_array::<2>("key").unwrap(), [0x0a, 0x0b]);
        assert!(values.hex_array::<3>("key").is_err());
        assert!(matches!(
            values.text("small").unwrap_err(),
            ProtocolError::TypeMismatch { .. }
        ));
    }
}
