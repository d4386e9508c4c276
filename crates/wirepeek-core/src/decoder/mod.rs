//! Schema-less message decoding.
//!
//! [`Decoder`] walks a buffer tag by tag and builds a [`DecodedMessage`].
//!
//! ## Algorithm Overview
//!
//! 1. Read a tag varint and split it into field index and wire type
//! 2. Read the value according to the wire type
//! 3. For length-delimited values, speculatively parse the payload as a
//!    nested message; if that fails, keep it as UTF-8 text
//! 4. Hand the value to the aggregator, which folds repeated indices
//!
//! Any error aborts the whole message. The only recovered failure is the
//! speculative sub-parse in step 3, which silently falls back to text.
//!
//! ## Message or text?
//!
//! Step 3 is a heuristic. A payload is reported as a message whenever its
//! bytes happen to form a well-formed field sequence, so short strings can
//! be misread: `"\x08\x01"` is indistinguishable from a message holding
//! field 1 = 1. An empty payload is always an empty message.
//!
//! ## Diagnostics
//!
//! A failed top-level parse emits one line to the decoder's
//! [`DiagnosticSink`]. Speculative sub-parses never do.

mod aggregate;

use crate::error::{Error, ErrorKind, Result};
use crate::message::{DecodedMessage, Value};
use crate::wire::{read_varint32, read_varint64, Tag, WireType};
use aggregate::FieldAggregator;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Default limit on message nesting
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Configuration for the decoder
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Deepest nesting level at which a payload may still be read as a
    /// message. Deeper payloads are kept as text if they are valid UTF-8;
    /// otherwise the parse fails with [`Error::DepthLimitExceeded`].
    pub max_depth: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl DecoderConfig {
    /// Creates a new decoder config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// Receiver for human-readable diagnostic lines
///
/// Any `Fn(&str) + Send + Sync` closure is a sink:
///
/// ```
/// use wirepeek_core::Decoder;
///
/// let decoder = Decoder::new().with_sink(|line: &str| eprintln!("decode: {line}"));
/// assert!(decoder.parse_bytes(&[0x08]).is_err());
/// ```
pub trait DiagnosticSink: Send + Sync {
    /// Receive one diagnostic line
    fn emit(&self, line: &str);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn emit(&self, line: &str) {
        self(line)
    }
}

/// Default sink: forwards each line as a `tracing` warning
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, line: &str) {
        warn!("{}", line);
    }
}

/// Decoder for schema-less varint-tagged messages
///
/// Configuration and diagnostic sink are fixed when the decoder is built;
/// a decoder can be shared freely between threads.
#[derive(Clone)]
pub struct Decoder {
    config: DecoderConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Creates a new decoder with default configuration
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Creates a new decoder with custom configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the diagnostic sink
    pub fn with_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Returns the decoder configuration
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode the first `len` bytes of `data`.
    ///
    /// `len` larger than `data.len()` is rejected with [`Error::InvalidRange`].
    /// On failure no partial tree is returned; one diagnostic line is sent
    /// to the sink.
    pub fn parse(&self, data: &[u8], len: usize) -> Result<DecodedMessage> {
        let result = if len > data.len() {
            Err(Error::invalid_range(0, len, data.len()))
        } else {
            WireReader::new(data, self.config.max_depth).read_message(0, len, 0)
        };

        match result {
            Ok(message) => {
                debug!("Decoded {} top-level fields from {} bytes", message.len(), len);
                Ok(message)
            }
            Err(e) => {
                self.sink.emit(&format!("parse failed: {e}"));
                Err(e)
            }
        }
    }

    /// Decode the whole of `data`
    pub fn parse_bytes(&self, data: &[u8]) -> Result<DecodedMessage> {
        self.parse(data, data.len())
    }
}

/// Attempt to decode `data` as a message without emitting diagnostics.
///
/// Length-delimited payloads go through the same check; this exposes it for
/// callers that want to test a blob before committing to it.
pub fn try_parse_message(data: &[u8], config: &DecoderConfig) -> Option<DecodedMessage> {
    WireReader::new(data, config.max_depth)
        .read_message(0, data.len(), 0)
        .ok()
}

/// Cursor over one buffer. Offsets are absolute positions in `data`.
struct WireReader<'a> {
    data: &'a [u8],
    max_depth: usize,
}

impl<'a> WireReader<'a> {
    fn new(data: &'a [u8], max_depth: usize) -> Self {
        Self { data, max_depth }
    }

    /// Decode every field in `[start, end)`
    fn read_message(&self, start: usize, end: usize, depth: usize) -> Result<DecodedMessage> {
        if depth > self.max_depth {
            return Err(Error::DepthLimitExceeded {
                offset: start,
                depth,
                max: self.max_depth,
            });
        }
        if start > end || end > self.data.len() {
            return Err(Error::invalid_range(start, end, self.data.len()));
        }

        let mut fields = FieldAggregator::new();
        let mut pos = start;

        while pos < end {
            let (raw, used) =
                read_varint32(self.data, pos, end).map_err(|e| Error::tag_read(pos, e))?;
            let tag = Tag::from_raw(raw, pos)?;
            pos += used;

            let (value, used) = self.read_value(tag, pos, end, depth)?;
            pos += used;

            if let Some(value) = value {
                fields.insert(tag.index, value);
            }
        }

        Ok(fields.finish())
    }

    /// Read the value following `tag`, returning it with the bytes it used.
    ///
    /// Group markers produce no value.
    fn read_value(
        &self,
        tag: Tag,
        pos: usize,
        end: usize,
        depth: usize,
    ) -> Result<(Option<Value>, usize)> {
        match tag.wire_type {
            WireType::Varint => {
                let (raw, used) =
                    read_varint64(self.data, pos, end).map_err(|e| Error::value_read(pos, e))?;
                Ok((Some(varint_value(raw)), used))
            }
            WireType::I32 => {
                let bytes = self.read_fixed::<4>(pos, end)?;
                Ok((Some(Value::Int32(i32::from_le_bytes(bytes))), 4))
            }
            WireType::I64 => {
                let bytes = self.read_fixed::<8>(pos, end)?;
                Ok((Some(Value::Int64(i64::from_le_bytes(bytes))), 8))
            }
            WireType::Len => {
                let (value, used) = self.read_length_delimited(tag, pos, end, depth)?;
                Ok((Some(value), used))
            }
            WireType::StartGroup | WireType::EndGroup => Ok((None, 0)),
        }
    }

    fn read_fixed<const N: usize>(&self, pos: usize, end: usize) -> Result<[u8; N]> {
        let remaining = end - pos;
        if remaining < N {
            return Err(Error::TruncatedFixedValue {
                offset: pos,
                needed: N,
                remaining,
            });
        }

        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.data[pos..pos + N]);
        Ok(bytes)
    }

    fn read_length_delimited(
        &self,
        tag: Tag,
        pos: usize,
        end: usize,
        depth: usize,
    ) -> Result<(Value, usize)> {
        let (length, prefix_len) =
            read_varint32(self.data, pos, end).map_err(|e| Error::value_read(pos, e))?;
        let payload_start = pos + prefix_len;
        let remaining = end - payload_start;

        let payload_len = usize::try_from(length)
            .ok()
            .filter(|&len| len <= remaining)
            .ok_or(Error::LengthOutOfRange {
                offset: payload_start,
                length: u64::from(length),
                remaining,
            })?;
        let payload_end = payload_start + payload_len;

        let value = match self.read_message(payload_start, payload_end, depth + 1) {
            Ok(message) => {
                trace!(
                    "Field {} at offset {}: {} bytes read as message",
                    tag.index,
                    payload_start,
                    payload_len
                );
                Value::Message(message)
            }
            Err(nested_err) => {
                // Past the depth cap the payload was never really tested as
                // a message, so that is the failure to report.
                let text = std::str::from_utf8(&self.data[payload_start..payload_end])
                    .map_err(|source| match nested_err.kind() {
                        ErrorKind::DepthLimitExceeded => nested_err,
                        _ => Error::InvalidUtf8 {
                            offset: payload_start,
                            source,
                        },
                    })?;
                trace!(
                    "Field {} at offset {}: {} bytes read as text",
                    tag.index,
                    payload_start,
                    payload_len
                );
                Value::Text(text.to_owned())
            }
        };

        Ok((value, prefix_len + payload_len))
    }
}

/// Type a varint by magnitude.
///
/// Anything that fits an `i32` once reinterpreted as `i64` is `Int32`; this
/// includes sign-extended negative int32 values. Everything else is `Int64`.
fn varint_value(raw: u64) -> Value {
    let signed = raw as i64;
    match i32::try_from(signed) {
        Ok(v) => Value::Int32(v),
        Err(_) => Value::Int64(signed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::FieldValue;
    use pretty_assertions::assert_eq;
    use prost::Message as _;
    use std::sync::Mutex;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Leaf {
        #[prost(string, tag = "1")]
        name: String,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    struct Tree {
        #[prost(string, tag = "1")]
        label: String,
        #[prost(message, optional, tag = "2")]
        leaf: Option<Leaf>,
        #[prost(message, repeated, tag = "3")]
        children: Vec<Leaf>,
    }

    /// A fixed32 field wrapped in `levels` layers of field 1
    fn nested(levels: usize) -> Vec<u8> {
        let mut data = vec![0x0D, 0xFF, 0xFF, 0xFF, 0xFF];
        for _ in 0..levels {
            let mut outer = vec![0x0A];
            prost::encoding::encode_varint(data.len() as u64, &mut outer);
            outer.extend(data);
            data = outer;
        }
        data
    }

    fn parse(data: &[u8]) -> Result<DecodedMessage> {
        Decoder::new().parse_bytes(data)
    }

    fn single(message: &DecodedMessage, index: u64) -> &Value {
        match &message.get(index).expect("field present").value {
            FieldValue::Single(v) => v,
            FieldValue::Repeated(_) => panic!("field {index} is repeated"),
        }
    }

    fn capture() -> (Arc<Mutex<Vec<String>>>, impl DiagnosticSink) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink_lines = Arc::clone(&lines);
        let sink = move |line: &str| sink_lines.lock().unwrap().push(line.to_string());
        (lines, sink)
    }

    #[test]
    fn test_varint_field() {
        let message = parse(&[0x08, 0x96, 0x01]).unwrap();
        assert_eq!(message.len(), 1);
        assert_eq!(single(&message, 1), &Value::Int32(150));
    }

    #[test]
    fn test_text_field() {
        let message = parse(&[0x12, 0x03, b'a', b'b', b'c']).unwrap();
        assert_eq!(message.len(), 1);
        assert_eq!(single(&message, 2), &Value::Text("abc".into()));
    }

    #[test]
    fn test_repeated_scalars() {
        let message = parse(&[0x08, 0x01, 0x08, 0x02]).unwrap();
        assert_eq!(message.len(), 1);
        assert_eq!(
            message.fields()[0].value,
            FieldValue::Repeated(vec![Value::Int32(1), Value::Int32(2)])
        );
    }

    #[test]
    fn test_length_out_of_range() {
        let err = parse(&[0x12, 0x05, b'a', b'b']).unwrap_err();
        assert_eq!(
            err,
            Error::LengthOutOfRange {
                offset: 2,
                length: 5,
                remaining: 2
            }
        );
    }

    #[test]
    fn test_magnitude_typing() {
        let mut data = vec![0x08];
        prost::encoding::encode_varint(2_000_000_000, &mut data);
        assert_eq!(single(&parse(&data).unwrap(), 1), &Value::Int32(2_000_000_000));

        let mut data = vec![0x08];
        prost::encoding::encode_varint(3_000_000_000, &mut data);
        assert_eq!(single(&parse(&data).unwrap(), 1), &Value::Int64(3_000_000_000));

        let mut data = vec![0x08];
        prost::encoding::encode_varint(i32::MAX as u64 + 1, &mut data);
        assert_eq!(single(&parse(&data).unwrap(), 1), &Value::Int64(i32::MAX as i64 + 1));
    }

    #[test]
    fn test_negative_varints() {
        let mut data = vec![0x08];
        prost::encoding::encode_varint(-1i64 as u64, &mut data);
        assert_eq!(single(&parse(&data).unwrap(), 1), &Value::Int32(-1));

        let mut data = vec![0x08];
        prost::encoding::encode_varint(i64::MIN as u64, &mut data);
        assert_eq!(single(&parse(&data).unwrap(), 1), &Value::Int64(i64::MIN));
    }

    #[test]
    fn test_fixed_values() {
        let mut data = vec![0x0D];
        data.extend_from_slice(&(-2i32).to_le_bytes());
        data.push(0x11);
        data.extend_from_slice(&0x0102_0304_0506_0708i64.to_le_bytes());

        let message = parse(&data).unwrap();
        assert_eq!(single(&message, 1), &Value::Int32(-2));
        assert_eq!(single(&message, 2), &Value::Int64(0x0102_0304_0506_0708));
    }

    #[test]
    fn test_truncated_fixed_values() {
        let err = parse(&[0x0D, 0x01, 0x02, 0x03]).unwrap_err();
        assert_eq!(
            err,
            Error::TruncatedFixedValue {
                offset: 1,
                needed: 4,
                remaining: 3
            }
        );

        let err = parse(&[0x09, 0x01]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedFixedValue);
    }

    #[test]
    fn test_nested_message() {
        // field 3 = { field 1 = 150 }
        let message = parse(&[0x1A, 0x03, 0x08, 0x96, 0x01]).unwrap();
        let inner = single(&message, 3).as_message().expect("nested message");
        assert_eq!(single(inner, 1), &Value::Int32(150));
    }

    #[test]
    fn test_empty_payload_is_empty_message() {
        let message = parse(&[0x12, 0x00]).unwrap();
        assert_eq!(single(&message, 2), &Value::Message(DecodedMessage::default()));
    }

    #[test]
    fn test_empty_input() {
        let message = parse(&[]).unwrap();
        assert!(message.is_empty());
    }

    #[test]
    fn test_group_markers_produce_no_field() {
        // start group 1, field 2 = 5, end group 1
        let message = parse(&[0x0B, 0x10, 0x05, 0x0C]).unwrap();
        assert_eq!(message.len(), 1);
        assert_eq!(single(&message, 2), &Value::Int32(5));
    }

    #[test]
    fn test_unsupported_wire_type() {
        let err = parse(&[0x08, 0x01, 0x0E]).unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedWireType {
                offset: 2,
                wire_type: 6
            }
        );
    }

    #[test]
    fn test_tag_read_failure() {
        let err = parse(&[0x08, 0x01, 0x80]).unwrap_err();
        assert_eq!(err, Error::tag_read(2, Error::truncated_varint(2)));
    }

    #[test]
    fn test_value_read_failure() {
        let err = parse(&[0x08, 0xFF]).unwrap_err();
        assert_eq!(err, Error::value_read(1, Error::truncated_varint(1)));

        let err = parse(&[0x08]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueRead);
    }

    #[test]
    fn test_invalid_utf8() {
        // 0xFF 0xFF fails both as a message and as UTF-8.
        let err = parse(&[0x12, 0x02, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUtf8);
    }

    #[test]
    fn test_failure_inside_nested_field_fails_message() {
        // A good field followed by a field whose length overruns.
        let err = parse(&[0x08, 0x01, 0x1A, 0x09, 0x08]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthOutOfRange);
    }

    #[test]
    fn test_declared_len_limits_parse() {
        let data = [0x08, 0x01, 0x10, 0x02];
        let message = Decoder::new().parse(&data, 2).unwrap();
        assert_eq!(message.len(), 1);
        assert!(message.get(2).is_none());
    }

    #[test]
    fn test_len_beyond_buffer_is_invalid_range() {
        let (lines, sink) = capture();
        let decoder = Decoder::new().with_sink(sink);
        let err = decoder.parse(&[0x08, 0x01], 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRange);
        assert_eq!(lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_sink_receives_one_line_per_failure() {
        let (lines, sink) = capture();
        let decoder = Decoder::new().with_sink(sink);

        assert!(decoder.parse_bytes(&[0x12, 0x05, b'a']).is_err());
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("declares 5 bytes"));
    }

    #[test]
    fn test_speculative_parse_is_silent() {
        let (lines, sink) = capture();
        let decoder = Decoder::new().with_sink(sink);

        // "abc" fails as a message before falling back to text.
        let message = decoder.parse_bytes(&[0x12, 0x03, b'a', b'b', b'c']).unwrap();
        assert_eq!(single(&message, 2), &Value::Text("abc".into()));
        assert!(lines.lock().unwrap().is_empty());

        // Every string below fails a nested sub-parse before it is kept as text.
        let tree = Tree {
            label: "widget".into(),
            leaf: Some(Leaf {
                name: "gadget".into(),
            }),
            children: vec![
                Leaf {
                    name: "hello world".into(),
                },
                Leaf {
                    name: "alpha".into(),
                },
            ],
        };
        let message = decoder.parse_bytes(&tree.encode_to_vec()).unwrap();
        assert_eq!(single(&message, 1), &Value::Text("widget".into()));
        let leaf = single(&message, 2).as_message().unwrap();
        assert_eq!(single(leaf, 1), &Value::Text("gadget".into()));
        let children = message.get(3).unwrap().values();
        assert_eq!(children.len(), 2);
        let second = children[1].as_message().unwrap();
        assert_eq!(single(second, 1), &Value::Text("alpha".into()));
        assert!(lines.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ambiguous_payload_reads_as_message() {
        // The text "\x08\x01" is also a valid message.
        let message = parse(&[0x12, 0x02, 0x08, 0x01]).unwrap();
        let inner = single(&message, 2).as_message().expect("classified as message");
        assert_eq!(single(inner, 1), &Value::Int32(1));
    }

    #[test]
    fn test_depth_limit_falls_back_to_text() {
        // field 1 = { field 1 = { field 1 = 1 } }
        let data = [0x0A, 0x04, 0x0A, 0x02, 0x08, 0x01];

        let deep = Decoder::new().parse_bytes(&data).unwrap();
        let level1 = single(&deep, 1).as_message().unwrap();
        assert!(single(level1, 1).as_message().is_some());

        let shallow = Decoder::with_config(DecoderConfig::new().max_depth(1))
            .parse_bytes(&data)
            .unwrap();
        let level1 = single(&shallow, 1).as_message().unwrap();
        assert_eq!(single(level1, 1), &Value::Text("\x08\x01".into()));
    }

    #[test]
    fn test_depth_limit_exceeded() {
        let message = parse(&nested(DEFAULT_MAX_DEPTH)).unwrap();
        let mut level = &message;
        for _ in 1..DEFAULT_MAX_DEPTH {
            level = single(level, 1).as_message().unwrap();
        }
        assert_eq!(single(level, 1), &Value::Int32(-1));

        // The innermost payload is not UTF-8, so the depth error surfaces.
        let (lines, sink) = capture();
        let err = Decoder::new()
            .with_sink(sink)
            .parse_bytes(&nested(DEFAULT_MAX_DEPTH + 1))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DepthLimitExceeded);
        assert!(matches!(
            err,
            Error::DepthLimitExceeded { depth: 65, max: 64, .. }
        ));
        assert_eq!(lines.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_try_parse_message() {
        let config = DecoderConfig::default();
        assert!(try_parse_message(&[0x08, 0x01], &config).is_some());
        assert!(try_parse_message(b"abc", &config).is_none());
        assert_eq!(try_parse_message(&[], &config), Some(DecodedMessage::default()));
    }

    #[test]
    fn test_length_prefix_overflow32() {
        // A length prefix above u32::MAX is a value read failure.
        let mut data = vec![0x12];
        prost::encoding::encode_varint(u64::from(u32::MAX) + 1, &mut data);
        let err = parse(&data).unwrap_err();
        assert_eq!(err, Error::value_read(1, Error::varint_overflow32(1)));
    }
}
