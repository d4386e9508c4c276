//! Error types for the wirepeek-core library.
//!
//! Every decode failure carries the byte offset where it was detected. The
//! decoder never returns a partial tree: the first error aborts the message
//! being parsed and bubbles up to the caller unchanged.

use thiserror::Error;

/// Result type alias for wirepeek operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all decode operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The start offset, declared length, and buffer size do not form a valid range
    #[error("invalid range: start {start}, declared length {len}, buffer holds {available} bytes")]
    InvalidRange {
        /// Requested start offset
        start: usize,
        /// Declared exclusive end of the readable region
        len: usize,
        /// Actual size of the buffer
        available: usize,
    },

    /// Input ended, or ten bytes were read, before a varint terminated
    #[error("truncated varint at offset {offset}")]
    TruncatedVarint {
        /// Offset of the first byte of the varint
        offset: usize,
    },

    /// A varint read at 32-bit width decoded to a value above `u32::MAX`
    #[error("varint at offset {offset} does not fit in 32 bits")]
    VarintOverflow32 {
        /// Offset of the first byte of the varint
        offset: usize,
    },

    /// The field tag could not be read
    #[error("failed to read field tag at offset {offset}: {source}")]
    TagRead {
        /// Offset of the tag
        offset: usize,
        /// Underlying varint error
        #[source]
        source: Box<Error>,
    },

    /// The tag names a wire type above the fixed32 code
    #[error("unsupported wire type {wire_type} at offset {offset}")]
    UnsupportedWireType {
        /// Offset of the tag
        offset: usize,
        /// The raw 3-bit wire type
        wire_type: u8,
    },

    /// A varint value or length prefix could not be read
    #[error("failed to read field value at offset {offset}: {source}")]
    ValueRead {
        /// Offset of the value
        offset: usize,
        /// Underlying varint error
        #[source]
        source: Box<Error>,
    },

    /// Fewer bytes remain than a fixed32/fixed64 value needs
    #[error("truncated fixed value at offset {offset}: need {needed} bytes, have {remaining}")]
    TruncatedFixedValue {
        /// Offset of the value
        offset: usize,
        /// Width of the value (4 or 8)
        needed: usize,
        /// Bytes left before the end of the enclosing message
        remaining: usize,
    },

    /// A length prefix points past the end of the enclosing message
    #[error("length-delimited field at offset {offset} declares {length} bytes, only {remaining} remain")]
    LengthOutOfRange {
        /// Offset of the payload
        offset: usize,
        /// Declared payload length
        length: u64,
        /// Bytes left before the end of the enclosing message
        remaining: usize,
    },

    /// A length-delimited payload is neither a message nor valid UTF-8
    #[error("payload at offset {offset} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        /// Offset of the payload
        offset: usize,
        /// Underlying conversion error
        #[source]
        source: std::str::Utf8Error,
    },

    /// Nested messages go deeper than the configured limit
    #[error("nesting depth {depth} at offset {offset} exceeds the limit of {max}")]
    DepthLimitExceeded {
        /// Offset where the nested message starts
        offset: usize,
        /// Depth that was reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },
}

/// Fieldless discriminant of [`Error`], convenient for matching in callers and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// See [`Error::InvalidRange`]
    InvalidRange,
    /// See [`Error::TruncatedVarint`]
    TruncatedVarint,
    /// See [`Error::VarintOverflow32`]
    VarintOverflow32,
    /// See [`Error::TagRead`]
    TagRead,
    /// See [`Error::UnsupportedWireType`]
    UnsupportedWireType,
    /// See [`Error::ValueRead`]
    ValueRead,
    /// See [`Error::TruncatedFixedValue`]
    TruncatedFixedValue,
    /// See [`Error::LengthOutOfRange`]
    LengthOutOfRange,
    /// See [`Error::InvalidUtf8`]
    InvalidUtf8,
    /// See [`Error::DepthLimitExceeded`]
    DepthLimitExceeded,
}

impl Error {
    /// Creates a new invalid range error
    pub fn invalid_range(start: usize, len: usize, available: usize) -> Self {
        Self::InvalidRange {
            start,
            len,
            available,
        }
    }

    /// Creates a new truncated varint error
    pub fn truncated_varint(offset: usize) -> Self {
        Self::TruncatedVarint { offset }
    }

    /// Creates a new 32-bit overflow error
    pub fn varint_overflow32(offset: usize) -> Self {
        Self::VarintOverflow32 { offset }
    }

    /// Wraps a varint error that occurred while reading a tag
    pub fn tag_read(offset: usize, source: Error) -> Self {
        Self::TagRead {
            offset,
            source: Box::new(source),
        }
    }

    /// Wraps a varint error that occurred while reading a value or length prefix
    pub fn value_read(offset: usize, source: Error) -> Self {
        Self::ValueRead {
            offset,
            source: Box::new(source),
        }
    }

    /// Returns the kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRange { .. } => ErrorKind::InvalidRange,
            Self::TruncatedVarint { .. } => ErrorKind::TruncatedVarint,
            Self::VarintOverflow32 { .. } => ErrorKind::VarintOverflow32,
            Self::TagRead { .. } => ErrorKind::TagRead,
            Self::UnsupportedWireType { .. } => ErrorKind::UnsupportedWireType,
            Self::ValueRead { .. } => ErrorKind::ValueRead,
            Self::TruncatedFixedValue { .. } => ErrorKind::TruncatedFixedValue,
            Self::LengthOutOfRange { .. } => ErrorKind::LengthOutOfRange,
            Self::InvalidUtf8 { .. } => ErrorKind::InvalidUtf8,
            Self::DepthLimitExceeded { .. } => ErrorKind::DepthLimitExceeded,
        }
    }

    /// Returns true if the input ran out before the value was complete.
    ///
    /// Looks through `TagRead` / `ValueRead` wrappers.
    pub fn is_truncation(&self) -> bool {
        match self {
            Self::TruncatedVarint { .. } | Self::TruncatedFixedValue { .. } => true,
            Self::LengthOutOfRange { .. } => true,
            Self::TagRead { source, .. } | Self::ValueRead { source, .. } => source.is_truncation(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::tag_read(7, Error::truncated_varint(7));
        assert!(err.to_string().contains("field tag"));
        assert!(err.to_string().contains("offset 7"));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error as _;

        let err = Error::value_read(3, Error::varint_overflow32(3));
        let source = err.source().expect("value read wraps its cause");
        assert!(source.to_string().contains("32 bits"));
    }

    #[test]
    fn test_kind() {
        assert_eq!(Error::truncated_varint(0).kind(), ErrorKind::TruncatedVarint);
        assert_eq!(Error::invalid_range(1, 0, 0).kind(), ErrorKind::InvalidRange);
        assert_eq!(
            Error::DepthLimitExceeded {
                offset: 0,
                depth: 65,
                max: 64
            }
            .kind(),
            ErrorKind::DepthLimitExceeded
        );
    }

    #[test]
    fn test_is_truncation() {
        assert!(Error::truncated_varint(0).is_truncation());
        assert!(Error::tag_read(0, Error::truncated_varint(0)).is_truncation());
        assert!(!Error::varint_overflow32(0).is_truncation());
        assert!(!Error::UnsupportedWireType {
            offset: 0,
            wire_type: 7
        }
        .is_truncation());
    }
}
