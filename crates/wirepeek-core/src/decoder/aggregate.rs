//! Folding repeated field indices into a single entry.

use crate::message::{DecodedField, DecodedMessage, Value};
use std::collections::HashMap;

/// Accumulates fields for one message.
///
/// Fields keep first-seen order in a `Vec`; a side table maps each index to
/// its position so a repeated index is found in O(1) instead of scanning.
#[derive(Debug, Default)]
pub(crate) struct FieldAggregator {
    fields: Vec<DecodedField>,
    positions: HashMap<u64, usize>,
}

impl FieldAggregator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Insert a decoded value.
    ///
    /// A new index is appended as a single field. A known index becomes (or
    /// stays) a repeated group with `value` appended.
    pub(crate) fn insert(&mut self, index: u64, value: Value) {
        match self.positions.get(&index) {
            Some(&pos) => self.fields[pos].push(value),
            None => {
                self.positions.insert(index, self.fields.len());
                self.fields.push(DecodedField::new(index, value));
            }
        }
    }

    pub(crate) fn finish(self) -> DecodedMessage {
        DecodedMessage::from_fields(self.fields)
    }
}
