//! Extensible tree walking.
//!
//! This module provides the [`MessageVisitor`] trait for consumers that
//! want something other than the text rendering, plus [`walk`] to drive it.

use crate::message::{DecodedField, DecodedMessage, Value};

/// Callbacks invoked while walking a decoded tree.
///
/// Every method has a no-op default, so implementors only override what
/// they need.
///
/// # Example
///
/// ```
/// use wirepeek_core::{walk, DecodedField, MessageVisitor};
///
/// #[derive(Default)]
/// struct Indices(Vec<u64>);
///
/// impl MessageVisitor for Indices {
///     fn visit_field(&mut self, field: &DecodedField, _depth: usize) {
///         self.0.push(field.index);
///     }
/// }
///
/// let message = wirepeek_core::parse(&[0x08, 0x01, 0x10, 0x02])?;
/// let mut indices = Indices::default();
/// walk(&message, &mut indices);
/// assert_eq!(indices.0, vec![1, 2]);
/// # Ok::<(), wirepeek_core::Error>(())
/// ```
pub trait MessageVisitor {
    /// Called before the fields of a message at `depth` (the root is 0)
    fn enter_message(&mut self, message: &DecodedMessage, depth: usize) {
        let _ = (message, depth);
    }

    /// Called after the last field of a message
    fn leave_message(&mut self, message: &DecodedMessage, depth: usize) {
        let _ = (message, depth);
    }

    /// Called once per field, before its values
    fn visit_field(&mut self, field: &DecodedField, depth: usize) {
        let _ = (field, depth);
    }

    /// Called once per value; a repeated field yields one call per element
    fn visit_value(&mut self, index: u64, value: &Value, depth: usize) {
        let _ = (index, value, depth);
    }
}

/// Walk `message` depth-first, nested messages included
pub fn walk(message: &DecodedMessage, visitor: &mut impl MessageVisitor) {
    walk_at(message, visitor, 0);
}

fn walk_at(message: &DecodedMessage, visitor: &mut impl MessageVisitor, depth: usize) {
    visitor.enter_message(message, depth);
    for field in message {
        visitor.visit_field(field, depth);
        for value in field.values() {
            visitor.visit_value(field.index, value, depth);
            if let Value::Message(nested) = value {
                walk_at(nested, visitor, depth + 1);
            }
        }
    }
    visitor.leave_message(message, depth);
}

/// A no-op visitor
pub struct NullVisitor;

impl MessageVisitor for NullVisitor {}

/// A visitor that collects statistics about a decoded tree
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsVisitor {
    /// Number of messages, the root included
    pub message_count: usize,
    /// Number of fields (a repeated group counts once)
    pub field_count: usize,
    /// Number of repeated groups
    pub repeated_count: usize,
    /// Number of integer values
    pub integer_count: usize,
    /// Number of text values
    pub text_count: usize,
    /// Deepest nesting level reached (the root is 0)
    pub max_depth: usize,
}

impl MessageVisitor for StatsVisitor {
    fn enter_message(&mut self, _message: &DecodedMessage, depth: usize) {
        self.message_count += 1;
        self.max_depth = self.max_depth.max(depth);
    }

    fn visit_field(&mut self, field: &DecodedField, _depth: usize) {
        self.field_count += 1;
        if field.is_repeated() {
            self.repeated_count += 1;
        }
    }

    fn visit_value(&mut self, _index: u64, value: &Value, _depth: usize) {
        match value {
            Value::Int32(_) | Value::Int64(_) => self.integer_count += 1,
            Value::Text(_) => self.text_count += 1,
            Value::Message(_) => {}
        }
    }
}
