//! Structural values crossing the boundary.
//!
//! `Value` carries the derived-capability semantics generated records
//! implement: structural equality, lexicographic ordering over fields in
//! declaration order, and the `name{field=value,...}` string form. Sets and
//! maps compare by membership, independent of iteration order. Floats
//! compare with `total_cmp`, so `NaN == NaN` and `-0.0 != 0.0`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Binary(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Optional(Option<Box<Value>>),
    List(Vec<Value>),
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Enum { ordinal: u32, item: String },
    Flags(u64),
    Record(RecordValue),
    /// A native or reverse handle; 0 only inside an absent optional.
    Handle(u64),
}

/// A record instance: qualified type name plus fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordValue {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl RecordValue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Value {
    pub fn some(value: Value) -> Self {
        Value::Optional(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Value::Optional(None)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::I8(_) => 1,
            Value::I16(_) => 2,
            Value::I32(_) => 3,
            Value::I64(_) => 4,
            Value::F32(_) => 5,
            Value::F64(_) => 6,
            Value::String(_) => 7,
            Value::Binary(_) => 8,
            Value::Date(_) => 9,
            Value::Optional(_) => 10,
            Value::List(_) => 11,
            Value::Set(_) => 12,
            Value::Map(_) => 13,
            Value::Enum { .. } => 14,
            Value::Flags(_) => 15,
            Value::Record(_) => 16,
            Value::Handle(_) => 17,
        }
    }
}

fn sorted(values: &[Value]) -> Vec<&Value> {
    let mut out: Vec<&Value> = values.iter().collect();
    out.sort();
    out
}

fn sorted_entries(entries: &[(Value, Value)]) -> Vec<&(Value, Value)> {
    let mut out: Vec<&(Value, Value)> = entries.iter().collect();
    out.sort();
    out
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::I8(a), Value::I8(b)) => a.cmp(b),
            (Value::I16(a), Value::I16(b)) => a.cmp(b),
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::F32(a), Value::F32(b)) => a.total_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Optional(a), Value::Optional(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (Value::Set(a), Value::Set(b)) => sorted(a).cmp(&sorted(b)),
            (Value::Map(a), Value::Map(b)) => sorted_entries(a).cmp(&sorted_entries(b)),
            (Value::Enum { ordinal: a, .. }, Value::Enum { ordinal: b, .. }) => a.cmp(b),
            (Value::Flags(a), Value::Flags(b)) => a.cmp(b),
            // Field-by-field in declaration order; the first difference wins.
            (Value::Record(a), Value::Record(b)) => a.cmp(b),
            (Value::Handle(a), Value::Handle(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::I8(v) => v.hash(state),
            Value::I16(v) => v.hash(state),
            Value::I32(v) => v.hash(state),
            Value::I64(v) | Value::Date(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Binary(v) => v.hash(state),
            Value::Optional(v) => v.hash(state),
            Value::List(v) => v.hash(state),
            Value::Set(v) => sorted(v).hash(state),
            Value::Map(v) => sorted_entries(v).hash(state),
            Value::Enum { ordinal, .. } => ordinal.hash(state),
            Value::Flags(v) | Value::Handle(v) => v.hash(state),
            Value::Record(v) => v.hash(state),
        }
    }
}

fn write_joined<T>(f: &mut fmt::Formatter<'_>, items: &[T], mut each: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::I8(v) => write!(f, "{v}"),
            Value::I16(v) => write!(f, "{v}"),
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) | Value::Date(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Binary(bytes) => {
                write!(f, "0x")?;
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Optional(None) => f.write_str("null"),
            Value::Optional(Some(v)) => write!(f, "{v}"),
            Value::List(items) | Value::Set(items) => {
                write!(f, "[")?;
                write_joined(f, items, |f, v| write!(f, "{v}"))?;
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                write_joined(f, entries, |f, (k, v)| write!(f, "{k}={v}"))?;
                write!(f, "}}")
            }
            Value::Enum { item, .. } => f.write_str(item),
            Value::Flags(bits) => write!(f, "{bits:#b}"),
            Value::Record(record) => write!(f, "{record}"),
            Value::Handle(h) => write!(f, "handle@{h:#x}"),
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: i32, b: i32) -> Value {
        Value::Record(RecordValue::new("test.pair").field("a", Value::I32(a)).field("b", Value::I32(b)))
    }

    #[test]
    fn first_field_dominates_ordering() {
        assert!(pair(1, 5) < pair(2, 0));
        assert!(pair(1, 0) < pair(1, 5));
        assert_eq!(pair(3, 3).cmp(&pair(3, 3)), Ordering::Equal);
    }

    #[test]
    fn equality_is_reflexive_and_symmetric() {
        let x = pair(1, 2);
        let y = pair(1, 2);
        assert_eq!(x, x);
        assert_eq!(x, y);
        assert_eq!(y, x);
        assert_ne!(x, pair(2, 1));
    }

    #[test]
    fn empty_records_are_equal() {
        let a = Value::Record(RecordValue::new("test.empty"));
        let b = Value::Record(RecordValue::new("test.empty"));
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn sets_and_maps_ignore_iteration_order() {
        let a = Value::Set(vec![Value::I32(1), Value::I32(2)]);
        let b = Value::Set(vec![Value::I32(2), Value::I32(1)]);
        assert_eq!(a, b);
        let m1 = Value::Map(vec![(Value::text("x"), Value::I8(1)), (Value::text("y"), Value::I8(2))]);
        let m2 = Value::Map(vec![(Value::text("y"), Value::I8(2)), (Value::text("x"), Value::I8(1))]);
        assert_eq!(m1, m2);
        let lists = (Value::List(vec![Value::I32(1), Value::I32(2)]), Value::List(vec![Value::I32(2), Value::I32(1)]));
        assert_ne!(lists.0, lists.1);
    }

    #[test]
    fn string_form_follows_declaration_order() {
        let record = RecordValue::new("test.point")
            .field("x", Value::I32(1))
            .field("y", Value::text("a"))
            .field("tags", Value::List(vec![Value::text("p"), Value::text("q")]))
            .field("note", Value::none());
        assert_eq!(record.to_string(), "test.point{x=1,y=a,tags=[p, q],note=null}");
    }

    #[test]
    fn nested_records_render_recursively() {
        let inner = RecordValue::new("test.inner").field("v", Value::Bool(true));
        let outer = RecordValue::new("test.outer").field("inner", Value::Record(inner));
        assert_eq!(outer.to_string(), "test.outer{inner=test.inner{v=true}}");
    }

    #[test]
    fn absent_sorts_before_present() {
        assert!(Value::none() < Value::some(Value::I32(i32::MIN)));
    }
}
