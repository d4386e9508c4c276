//! The decoded field tree.
//!
//! A [`DecodedMessage`] is an ordered list of [`DecodedField`]s, one per
//! distinct field index. Each field holds either a single [`Value`] or, once
//! its index has been seen more than once, a repeated group of values in
//! wire order. Nested messages are owned outright by the field holding them.

use crate::printer::escape_text;
use std::fmt;

/// One decoded element: a scalar or a nested message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Varint or fixed32 value that fits in a signed 32-bit integer
    Int32(i32),
    /// Varint outside the `i32` range, or any fixed64 value
    Int64(i64),
    /// Length-delimited payload that did not parse as a message
    Text(String),
    /// Length-delimited payload that parsed as a nested message
    Message(DecodedMessage),
}

impl Value {
    /// Short type name used by the printer: `int`, `long`, `string` or `message`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int",
            Value::Int64(_) => "long",
            Value::Text(_) => "string",
            Value::Message(_) => "message",
        }
    }

    /// Returns the value widened to `i64` if it is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the text if this is a string value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested message if this is a message value
    pub fn as_message(&self) -> Option<&DecodedMessage> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "\"{}\"", escape_text(s)),
            Value::Message(m) => write!(f, "<message with {} fields>", m.len()),
        }
    }
}

/// Contents of a field: one value, or every occurrence of a repeated index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// The index occurred once
    Single(Value),
    /// The index occurred more than once; elements are in wire order
    Repeated(Vec<Value>),
}

/// One logical field of a decoded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    /// Field index taken from the tag (`tag >> 3`)
    pub index: u64,
    /// The field's value or values
    pub value: FieldValue,
}

impl DecodedField {
    /// Creates a non-repeated field
    pub fn new(index: u64, value: Value) -> Self {
        Self {
            index,
            value: FieldValue::Single(value),
        }
    }

    /// Returns true if the index occurred more than once
    pub fn is_repeated(&self) -> bool {
        matches!(self.value, FieldValue::Repeated(_))
    }

    /// Type name of the field.
    ///
    /// For repeated groups this is the type of the first element; an empty
    /// group reports `unknown`.
    pub fn type_name(&self) -> &'static str {
        match &self.value {
            FieldValue::Single(v) => v.type_name(),
            FieldValue::Repeated(values) => values.first().map_or("unknown", Value::type_name),
        }
    }

    /// All values of this field in wire order
    pub fn values(&self) -> &[Value] {
        match &self.value {
            FieldValue::Single(v) => std::slice::from_ref(v),
            FieldValue::Repeated(values) => values,
        }
    }

    /// The single value, or the first element of a repeated group
    pub fn first(&self) -> Option<&Value> {
        self.values().first()
    }

    /// Turn a single value into a one-element repeated group and append `value`
    pub(crate) fn push(&mut self, value: Value) {
        if matches!(self.value, FieldValue::Single(_)) {
            let empty = FieldValue::Repeated(Vec::new());
            if let FieldValue::Single(first) = std::mem::replace(&mut self.value, empty) {
                self.value = FieldValue::Repeated(vec![first]);
            }
        }

        if let FieldValue::Repeated(values) = &mut self.value {
            values.push(value);
        }
    }
}

/// An ordered sequence of fields decoded from one region of the buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    fields: Vec<DecodedField>,
}

impl DecodedMessage {
    pub(crate) fn from_fields(fields: Vec<DecodedField>) -> Self {
        Self { fields }
    }

    /// Fields in first-seen order
    pub fn fields(&self) -> &[DecodedField] {
        &self.fields
    }

    /// Number of distinct field indices
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the message has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Look up a field by index
    pub fn get(&self, index: u64) -> Option<&DecodedField> {
        self.fields.iter().find(|f| f.index == index)
    }

    /// Iterate over fields in first-seen order
    pub fn iter(&self) -> std::slice::Iter<'_, DecodedField> {
        self.fields.iter()
    }
}

impl<'a> IntoIterator for &'a DecodedMessage {
    type Item = &'a DecodedField;
    type IntoIter = std::slice::Iter<'a, DecodedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl IntoIterator for DecodedMessage {
    type Item = DecodedField;
    type IntoIter = std::vec::IntoIter<DecodedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_converts_to_repeated() {
        let mut field = DecodedField::new(1, Value::Int32(1));
        assert!(!field.is_repeated());

        field.push(Value::Int32(2));
        field.push(Value::Int64(i64::MAX));

        assert!(field.is_repeated());
        assert_eq!(
            field.values(),
            &[Value::Int32(1), Value::Int32(2), Value::Int64(i64::MAX)]
        );
        assert_eq!(field.type_name(), "int");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Int32(0).type_name(), "int");
        assert_eq!(Value::Int64(0).type_name(), "long");
        assert_eq!(Value::Text(String::new()).type_name(), "string");
        assert_eq!(Value::Message(DecodedMessage::default()).type_name(), "message");

        let empty = DecodedField {
            index: 3,
            value: FieldValue::Repeated(Vec::new()),
        };
        assert_eq!(empty.type_name(), "unknown");
        assert!(empty.first().is_none());
    }

    #[test]
    fn test_get_by_index() {
        let message = DecodedMessage::from_fields(vec![
            DecodedField::new(4, Value::Text("x".into())),
            DecodedField::new(2, Value::Int32(9)),
        ]);

        assert_eq!(message.get(2).and_then(|f| f.first()).and_then(Value::as_i64), Some(9));
        assert_eq!(message.get(4).and_then(|f| f.first()).and_then(Value::as_str), Some("x"));
        assert!(message.get(1).is_none());
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int32(-5).to_string(), "-5");
        assert_eq!(Value::Text("a\"b".into()).to_string(), "\"a\\\"b\"");
    }
}
