//! Schema-driven byte codec used to move values across the boundary.
//!
//! Layout is little-endian and carries no type tags: both sides agree on
//! the [`ValueShape`] from the generated bindings.
//!
//! | shape | encoding |
//! |---|---|
//! | bool | 1 byte, 0 or 1 |
//! | integers, floats | fixed-width little-endian |
//! | string, binary | `u32` length + bytes |
//! | date | `i64` milliseconds |
//! | optional | `u8` presence tag (0 absent, 1 present) + value |
//! | list, set | `u32` count + elements |
//! | map | `u32` count + key/value pairs |
//! | enum | `u32` ordinal |
//! | flags, handle | `u64` |
//! | record | fields in declaration order |

use std::collections::BTreeSet;

use crate::error::{BridgeError, DomainError, Result};
use crate::value::{RecordValue, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueShape {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String,
    Binary,
    Date,
    Optional(Box<ValueShape>),
    List(Box<ValueShape>),
    Set(Box<ValueShape>),
    Map(Box<ValueShape>, Box<ValueShape>),
    Enum { items: Vec<String> },
    Flags,
    Record { name: String, fields: Vec<(String, ValueShape)> },
    Handle,
}

impl ValueShape {
    pub fn optional(inner: ValueShape) -> Self {
        ValueShape::Optional(Box::new(inner))
    }

    pub fn list(inner: ValueShape) -> Self {
        ValueShape::List(Box::new(inner))
    }

    pub fn set(inner: ValueShape) -> Self {
        ValueShape::Set(Box::new(inner))
    }

    pub fn map(key: ValueShape, value: ValueShape) -> Self {
        ValueShape::Map(Box::new(key), Box::new(value))
    }
}

/// Encode `value` according to `shape`.
pub fn encode(value: &Value, shape: &ValueShape) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    encode_into(value, shape, &mut out)?;
    Ok(out)
}

/// Decode one value of `shape`; trailing bytes are an error.
pub fn decode(bytes: &[u8], shape: &ValueShape) -> Result<Value> {
    let mut reader = Reader { bytes, pos: 0 };
    let value = reader.value(shape)?;
    if reader.pos != bytes.len() {
        return Err(BridgeError::wire(format!(
            "{} trailing byte(s) after value",
            bytes.len() - reader.pos
        )));
    }
    Ok(value)
}

fn mismatch(value: &Value, shape: &ValueShape) -> BridgeError {
    BridgeError::wire(format!("value {value} does not match shape {shape:?}"))
}

fn put_len(len: usize, out: &mut Vec<u8>) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| BridgeError::wire("length exceeds u32"))?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

pub fn encode_into(value: &Value, shape: &ValueShape, out: &mut Vec<u8>) -> Result<()> {
    match (shape, value) {
        (ValueShape::Bool, Value::Bool(v)) => out.push(u8::from(*v)),
        (ValueShape::I8, Value::I8(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueShape::I16, Value::I16(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueShape::I32, Value::I32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueShape::I64, Value::I64(v)) | (ValueShape::Date, Value::Date(v)) => {
            out.extend_from_slice(&v.to_le_bytes())
        }
        (ValueShape::F32, Value::F32(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueShape::F64, Value::F64(v)) => out.extend_from_slice(&v.to_le_bytes()),
        (ValueShape::String, Value::String(s)) => {
            put_len(s.len(), out)?;
            out.extend_from_slice(s.as_bytes());
        }
        (ValueShape::Binary, Value::Binary(b)) => {
            put_len(b.len(), out)?;
            out.extend_from_slice(b);
        }
        (ValueShape::Optional(_), Value::Optional(None)) => out.push(0),
        (ValueShape::Optional(inner), Value::Optional(Some(v))) => {
            out.push(1);
            encode_into(v, inner, out)?;
        }
        (ValueShape::List(inner), Value::List(items)) | (ValueShape::Set(inner), Value::Set(items)) => {
            put_len(items.len(), out)?;
            for item in items {
                encode_into(item, inner, out)?;
            }
        }
        (ValueShape::Map(key_shape, value_shape), Value::Map(entries)) => {
            put_len(entries.len(), out)?;
            for (k, v) in entries {
                encode_into(k, key_shape, out)?;
                encode_into(v, value_shape, out)?;
            }
        }
        (ValueShape::Enum { items }, Value::Enum { ordinal, .. }) => {
            if *ordinal as usize >= items.len() {
                return Err(BridgeError::wire(format!("enum ordinal {ordinal} out of range")));
            }
            out.extend_from_slice(&ordinal.to_le_bytes());
        }
        (ValueShape::Flags, Value::Flags(bits)) => out.extend_from_slice(&bits.to_le_bytes()),
        (ValueShape::Handle, Value::Handle(0)) => return Err(BridgeError::InvalidHandle),
        (ValueShape::Handle, Value::Handle(h)) => out.extend_from_slice(&h.to_le_bytes()),
        (ValueShape::Record { name, fields }, Value::Record(record)) => {
            if &record.name != name || record.fields.len() != fields.len() {
                return Err(mismatch(value, shape));
            }
            for ((field_name, field_shape), (value_name, field_value)) in fields.iter().zip(&record.fields) {
                if field_name != value_name {
                    return Err(BridgeError::wire(format!(
                        "record {name}: expected field '{field_name}', found '{value_name}'"
                    )));
                }
                encode_into(field_value, field_shape, out)?;
            }
        }
        _ => return Err(mismatch(value, shape)),
    }
    Ok(())
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(BridgeError::wire(format!(
                "truncated input: need {n} byte(s) at offset {}",
                self.pos
            )));
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.array()?) as usize)
    }

    fn value(&mut self, shape: &ValueShape) -> Result<Value> {
        Ok(match shape {
            ValueShape::Bool => match self.array::<1>()?[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(BridgeError::wire(format!("invalid bool byte {other}"))),
            },
            ValueShape::I8 => Value::I8(i8::from_le_bytes(self.array()?)),
            ValueShape::I16 => Value::I16(i16::from_le_bytes(self.array()?)),
            ValueShape::I32 => Value::I32(i32::from_le_bytes(self.array()?)),
            ValueShape::I64 => Value::I64(i64::from_le_bytes(self.array()?)),
            ValueShape::Date => Value::Date(i64::from_le_bytes(self.array()?)),
            ValueShape::F32 => Value::F32(f32::from_le_bytes(self.array()?)),
            ValueShape::F64 => Value::F64(f64::from_le_bytes(self.array()?)),
            ValueShape::String => {
                let len = self.len()?;
                let raw = self.take(len)?;
                let text = std::str::from_utf8(raw).map_err(|e| BridgeError::wire(format!("invalid utf-8: {e}")))?;
                Value::String(text.to_string())
            }
            ValueShape::Binary => {
                let len = self.len()?;
                Value::Binary(self.take(len)?.to_vec())
            }
            ValueShape::Optional(inner) => match self.array::<1>()?[0] {
                0 => Value::Optional(None),
                1 => Value::some(self.value(inner)?),
                other => return Err(BridgeError::wire(format!("invalid presence tag {other}"))),
            },
            ValueShape::List(inner) => {
                let count = self.len()?;
                let items = (0..count).map(|_| self.value(inner)).collect::<Result<Vec<_>>>()?;
                Value::List(items)
            }
            ValueShape::Set(inner) => {
                let count = self.len()?;
                let items = (0..count).map(|_| self.value(inner)).collect::<Result<Vec<_>>>()?;
                let mut seen = BTreeSet::new();
                if let Some(dup) = items.iter().find(|v| !seen.insert(*v)) {
                    return Err(BridgeError::wire(format!("duplicate set element {dup}")));
                }
                Value::Set(items)
            }
            ValueShape::Map(key_shape, value_shape) => {
                let count = self.len()?;
                let mut entries = Vec::with_capacity(count.min(1024));
                let mut keys = BTreeSet::new();
                for _ in 0..count {
                    let key = self.value(key_shape)?;
                    if !keys.insert(key.clone()) {
                        return Err(BridgeError::wire(format!("duplicate map key {key}")));
                    }
                    let value = self.value(value_shape)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            ValueShape::Enum { items } => {
                let ordinal = u32::from_le_bytes(self.array()?);
                let item = items
                    .get(ordinal as usize)
                    .ok_or_else(|| BridgeError::wire(format!("enum ordinal {ordinal} out of range")))?;
                Value::Enum {
                    ordinal,
                    item: item.clone(),
                }
            }
            ValueShape::Flags => Value::Flags(u64::from_le_bytes(self.array()?)),
            ValueShape::Handle => match u64::from_le_bytes(self.array()?) {
                0 => return Err(BridgeError::InvalidHandle),
                h => Value::Handle(h),
            },
            ValueShape::Record { name, fields } => {
                let mut record = RecordValue::new(name.clone());
                for (field_name, field_shape) in fields {
                    let value = self.value(field_shape)?;
                    record.fields.push((field_name.clone(), value));
                }
                Value::Record(record)
            }
        })
    }
}

/// Wire description of an error domain: its codes and their parameter shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorShape {
    pub domain: String,
    pub codes: Vec<(String, Vec<ValueShape>)>,
}

impl ErrorShape {
    /// Encode as `u32` code index, parameters, then the message string.
    pub fn encode(&self, error: &DomainError) -> Result<Vec<u8>> {
        if error.domain != self.domain {
            return Err(BridgeError::wire(format!(
                "error from domain '{}' encoded with shape for '{}'",
                error.domain, self.domain
            )));
        }
        let index = self
            .codes
            .iter()
            .position(|(code, _)| *code == error.code)
            .ok_or_else(|| BridgeError::wire(format!("unknown error code '{}'", error.code)))?;
        let (_, params) = &self.codes[index];
        if params.len() != error.params.len() {
            return Err(BridgeError::wire(format!(
                "error code '{}' expects {} parameter(s), found {}",
                error.code,
                params.len(),
                error.params.len()
            )));
        }
        let mut out = Vec::new();
        put_len(index, &mut out)?;
        for (value, shape) in error.params.iter().zip(params) {
            encode_into(value, shape, &mut out)?;
        }
        encode_into(&Value::text(error.message.clone()), &ValueShape::String, &mut out)?;
        Ok(out)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DomainError> {
        let mut reader = Reader { bytes, pos: 0 };
        let index = reader.len()?;
        let (code, shapes) = self
            .codes
            .get(index)
            .ok_or_else(|| BridgeError::wire(format!("error code index {index} out of range")))?;
        let params = shapes.iter().map(|s| reader.value(s)).collect::<Result<Vec<_>>>()?;
        let message = match reader.value(&ValueShape::String)? {
            Value::String(message) => message,
            other => return Err(BridgeError::wire(format!("expected message string, found {other}"))),
        };
        if reader.pos != bytes.len() {
            return Err(BridgeError::wire("trailing bytes after error"));
        }
        Ok(DomainError {
            domain: self.domain.clone(),
            code: code.clone(),
            params,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_shape() -> ValueShape {
        ValueShape::Record {
            name: "shop.item".into(),
            fields: vec![
                ("id".into(), ValueShape::I64),
                ("label".into(), ValueShape::optional(ValueShape::String)),
                ("tags".into(), ValueShape::set(ValueShape::String)),
                (
                    "color".into(),
                    ValueShape::Enum {
                        items: vec!["red".into(), "blue".into()],
                    },
                ),
            ],
        }
    }

    fn item() -> Value {
        Value::Record(
            RecordValue::new("shop.item")
                .field("id", Value::I64(7))
                .field("label", Value::some(Value::text("lamp")))
                .field("tags", Value::Set(vec![Value::text("a"), Value::text("b")]))
                .field(
                    "color",
                    Value::Enum {
                        ordinal: 1,
                        item: "blue".into(),
                    },
                ),
        )
    }

    #[test]
    fn nested_record_survives_the_boundary() {
        let shape = ValueShape::map(ValueShape::String, ValueShape::list(item_shape()));
        let value = Value::Map(vec![(Value::text("k"), Value::List(vec![item(), item()]))]);
        let bytes = encode(&value, &shape).unwrap();
        assert_eq!(decode(&bytes, &shape).unwrap(), value);
    }

    #[test]
    fn absence_is_a_tag_not_a_sentinel() {
        let shape = ValueShape::optional(ValueShape::I32);
        assert_eq!(encode(&Value::none(), &shape).unwrap(), vec![0]);
        assert_eq!(encode(&Value::some(Value::I32(0)), &shape).unwrap(), vec![1, 0, 0, 0, 0]);
    }

    #[test]
    fn decoded_copies_are_independent() {
        let original = Value::Binary(vec![1, 2, 3]);
        let bytes = encode(&original, &ValueShape::Binary).unwrap();
        let mut copy = decode(&bytes, &ValueShape::Binary).unwrap();
        if let Value::Binary(b) = &mut copy {
            b[0] = 9;
        }
        assert_eq!(original, Value::Binary(vec![1, 2, 3]));
    }

    #[test]
    fn duplicate_map_keys_are_rejected() {
        let shape = ValueShape::map(ValueShape::I8, ValueShape::Bool);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[5, 1, 5, 0]);
        let err = decode(&bytes, &shape).unwrap_err();
        assert!(err.to_string().contains("duplicate map key 5"), "{err}");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(decode(&[2], &ValueShape::Bool).is_err());
        assert!(decode(&[1, 0], &ValueShape::I32).is_err());
        assert!(decode(&[0, 0], &ValueShape::I8).is_err());
        assert_eq!(
            decode(&0u64.to_le_bytes(), &ValueShape::Handle).unwrap_err(),
            BridgeError::InvalidHandle
        );
        assert!(encode(&Value::I32(1), &ValueShape::I64).is_err());
    }

    #[test]
    fn error_domain_round_trip_keeps_code_and_parameters() {
        let shape = ErrorShape {
            domain: "test.errors".into(),
            codes: vec![
                ("simple_error".into(), vec![]),
                (
                    "something_with_parameters".into(),
                    vec![ValueShape::I32, ValueShape::String],
                ),
            ],
        };
        let error = DomainError::new("test.errors", "something_with_parameters", "some error message")
            .with_param(Value::I32(42))
            .with_param(Value::text("detail"));
        let decoded = shape.decode(&shape.encode(&error).unwrap()).unwrap();
        assert_eq!(decoded, error);
        assert_eq!(decoded.code, "something_with_parameters");
        assert_eq!(decoded.params[0], Value::I32(42));
        assert_eq!(decoded.message, "some error message");
    }
}
