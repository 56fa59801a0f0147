//! Document value model
//!
//! Documents are insertion-ordered maps. Key order is observable: command
//! documents are dispatched on their first key and index specifications are
//! compound in declaration order.

use indexmap::IndexMap;
use rand::RngCore;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use std::sync::OnceLock;

/// An ordered document
pub type Document = IndexMap<String, Value>;

/// A single document value
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Document(Document),
    ObjectId(ObjectId),
    /// Milliseconds since the Unix epoch
    DateTime(i64),
    Regex { pattern: String, options: String },
    Binary { subtype: u8, bytes: Vec<u8> },
}

impl Value {
    /// Numeric view of the value, if it is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Integral view of the value, if it is an integer or an integral double
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::Double(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Self::Document(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int32(_) | Self::Int64(_) | Self::Double(_))
    }

    /// Truthiness as the store evaluates option flags (`unique: 1`, `unique: true`)
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            v if v.is_number() => v.as_f64().is_some_and(|n| n != 0.0),
            _ => true,
        }
    }

    /// Canonical type rank used when ordering values of different types
    fn type_rank(&self) -> u8 {
        match self {
            Self::Null => 1,
            Self::Int32(_) | Self::Int64(_) | Self::Double(_) => 2,
            Self::String(_) => 3,
            Self::Document(_) => 4,
            Self::Array(_) => 5,
            Self::Binary { .. } => 6,
            Self::ObjectId(_) => 7,
            Self::Bool(_) => 8,
            Self::DateTime(_) => 9,
            Self::Regex { .. } => 10,
        }
    }

    /// Total order over values: type rank first, then value
    pub fn compare(&self, other: &Value) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Self::Int32(_) | Self::Int64(_), Self::Int32(_) | Self::Int64(_)) => {
                self.as_i64().cmp(&other.as_i64())
            }
            (a, b) if a.is_number() => {
                let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Document(a), Self::Document(b)) => compare_documents(a, b),
            (Self::Array(a), Self::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (
                Self::Binary { subtype: sa, bytes: ba },
                Self::Binary { subtype: sb, bytes: bb },
            ) => ba.len().cmp(&bb.len()).then(sa.cmp(sb)).then(ba.cmp(bb)),
            (Self::ObjectId(a), Self::ObjectId(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (
                Self::Regex { pattern: pa, options: oa },
                Self::Regex { pattern: pb, options: ob },
            ) => pa.cmp(pb).then(oa.cmp(ob)),
            _ => Ordering::Equal,
        }
    }
}

fn compare_documents(a: &Document, b: &Document) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = va.type_rank().cmp(&vb.type_rank())
            .then_with(|| ka.cmp(kb))
            .then_with(|| va.compare(vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Key order matters for nested documents, and numbers compare by value
/// across widths.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_number() && b.is_number() => match (a, b) {
                (Self::Double(_), _) | (_, Self::Double(_)) => a.as_f64() == b.as_f64(),
                _ => a.as_i64() == b.as_i64(),
            },
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Document(a), Self::Document(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            }
            (Self::ObjectId(a), Self::ObjectId(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (
                Self::Regex { pattern: pa, options: oa },
                Self::Regex { pattern: pb, options: ob },
            ) => pa == pb && oa == ob,
            (
                Self::Binary { subtype: sa, bytes: ba },
                Self::Binary { subtype: sb, bytes: bb },
            ) => sa == sb && ba == bb,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map(Self::Int64).unwrap_or(Self::Double(v as f64))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Self::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Self::ObjectId(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Look up a dotted path (`a.b.c`) in a document. Numeric segments index
/// into arrays.
pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Document(d) => d.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Set a dotted path, creating intermediate documents as needed
pub fn set_path(doc: &mut Document, path: &str, value: Value) -> bool {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
            true
        }
        Some((head, rest)) => {
            let entry = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Document(Document::new()));
            match entry {
                Value::Document(inner) => set_path(inner, rest, value),
                _ => false,
            }
        }
    }
}

/// Remove a dotted path, returning the removed value
pub fn remove_path(doc: &mut Document, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => doc.shift_remove(path),
        Some((head, rest)) => match doc.get_mut(head)? {
            Value::Document(inner) => remove_path(inner, rest),
            _ => None,
        },
    }
}

/// A 12-byte object identifier: 4 bytes of seconds, 5 bytes of
/// process-unique randomness, 3 bytes of counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; 12]);

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

impl ObjectId {
    /// Generate a fresh identifier
    pub fn new() -> Self {
        let seconds = chrono::Utc::now().timestamp() as u32;
        let process = PROCESS_UNIQUE.get_or_init(|| {
            let mut bytes = [0u8; 5];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes
        });
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(rand::thread_rng().next_u32()))
            .fetch_add(1, AtomicOrdering::SeqCst);

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Parse a 24-character hex string
    pub fn parse_str(s: &str) -> Option<Self> {
        let decoded = hex::decode(s).ok()?;
        let bytes: [u8; 12] = decoded.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_numeric_equality_across_widths() {
        assert_eq!(Value::Int32(1), Value::Int64(1));
        assert_eq!(Value::Int64(3), Value::Double(3.0));
        assert_ne!(Value::Int32(1), Value::Double(1.5));
        assert_ne!(Value::Int32(1), Value::String("1".into()));
    }

    #[test]
    fn test_document_equality_is_order_sensitive() {
        let a = Value::Document(doc(&[("x", 1.into()), ("y", 2.into())]));
        let b = Value::Document(doc(&[("y", 2.into()), ("x", 1.into())]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_compare_orders_by_type_then_value() {
        assert_eq!(Value::Null.compare(&Value::Int32(0)), Ordering::Less);
        assert_eq!(Value::Int32(2).compare(&Value::Double(1.5)), Ordering::Greater);
        assert_eq!(Value::from("a").compare(&Value::Int32(100)), Ordering::Greater);
        assert_eq!(Value::Int64(i64::MAX).compare(&Value::Int64(i64::MAX - 1)), Ordering::Greater);
    }

    #[test]
    fn test_paths() {
        let mut d = doc(&[("a", Value::Document(doc(&[("b", 1.into())])))]);
        assert_eq!(get_path(&d, "a.b"), Some(&Value::Int32(1)));
        assert!(get_path(&d, "a.c").is_none());

        assert!(set_path(&mut d, "a.c.d", "x".into()));
        assert_eq!(get_path(&d, "a.c.d"), Some(&Value::from("x")));

        assert_eq!(remove_path(&mut d, "a.b"), Some(Value::Int32(1)));
        assert!(get_path(&d, "a.b").is_none());
    }

    #[test]
    fn test_object_id_hex_round_trip() {
        let oid = ObjectId::new();
        let hex = oid.to_hex();
        assert_eq!(hex.len(), 24);
        assert_eq!(ObjectId::parse_str(&hex), Some(oid));
        assert!(ObjectId::parse_str("not-hex").is_none());
        assert!(ObjectId::parse_str("abcd").is_none());
    }

    #[test]
    fn test_object_ids_are_distinct() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
    }
}
