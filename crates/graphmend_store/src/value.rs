//! Dynamic scalar value and canonical key types.

use std::cmp::Ordering;
use std::fmt;

/// A dynamic scalar attribute value.
///
/// This type represents any attribute value an entity row can hold.
/// Note that floats are intentionally not supported: attribute values
/// participate in canonical key comparison, and floats have no canonical
/// total order worth persisting identity on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value (also an explicitly cleared foreign key).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer (full i64 range).
    Integer(i64),
    /// Text string (UTF-8).
    Text(String),
}

impl Value {
    /// Returns true if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical form for key comparison.
    ///
    /// Payload keys may arrive as a different type than the stored key
    /// (a JSON string `"3"` against an integer-keyed row). The one
    /// uniform coercion rule: text whose entire content parses as `i64`
    /// collapses to `Integer`. Everything else is compared structurally.
    pub fn canonical(&self) -> Value {
        match self {
            Value::Text(t) => match t.parse::<i64>() {
                Ok(n) => Value::Integer(n),
                Err(_) => self.clone(),
            },
            other => other.clone(),
        }
    }

    /// Returns true if this value cannot serve as a key part:
    /// `Null` or empty text.
    pub fn is_empty_key(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(t) => t.is_empty(),
            _ => false,
        }
    }

    /// Rank of the value's variant, used for the total ordering.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Text(t) => write!(f, "{t:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A canonical primary-key value: one part per primary-key attribute,
/// every part canonicalized via [`Value::canonical`].
///
/// Canonicalization happens at construction, so two `KeyValue`s compare
/// equal whenever their source values identify the same row — including
/// the string-vs-integer id mismatches payload sources produce.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyValue(Vec<Value>);

impl KeyValue {
    /// Builds a key from its parts.
    ///
    /// Returns `None` when any part is absent-equivalent (`Null` or empty
    /// text): a row cannot be identified by a partial key.
    pub fn try_new(parts: Vec<Value>) -> Option<Self> {
        if parts.is_empty() || parts.iter().any(Value::is_empty_key) {
            return None;
        }
        Some(Self(parts.iter().map(Value::canonical).collect()))
    }

    /// Builds a single-part key.
    pub fn single(part: Value) -> Option<Self> {
        Self::try_new(vec![part])
    }

    /// The canonicalized key parts.
    pub fn parts(&self) -> &[Value] {
        &self.0
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, ")")
    }
}
