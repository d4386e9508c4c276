//! # wirepeek-core
//!
//! A library for decoding protobuf-style binary messages without a schema.
//!
//! This crate provides the core functionality for:
//! - Reading base-128 varints with strict bounds checking
//! - Walking tag/value pairs into a tree of typed fields
//! - Telling nested messages from text by speculative parsing
//! - Rendering the tree as indented text
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Varint reading and wire type handling
//! - [`decoder`]: The message decoder and its configuration
//! - [`message`]: The decoded tree
//! - [`printer`]: Text rendering and tree visitors
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use wirepeek_core::{Decoder, Value};
//!
//! // field 1 = 150, field 2 = "abc"
//! let data = [0x08, 0x96, 0x01, 0x12, 0x03, b'a', b'b', b'c'];
//!
//! let message = Decoder::new().parse_bytes(&data)?;
//! assert_eq!(message.get(1).and_then(|f| f.first()), Some(&Value::Int32(150)));
//!
//! print!("{}", wirepeek_core::print(&message));
//! # Ok::<(), wirepeek_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`DiagnosticSink`]: Receive diagnostic lines from failed parses
//! - [`MessageVisitor`]: Walk a decoded tree with custom logic
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod decoder;
pub mod error;
pub mod message;
pub mod printer;
pub mod wire;

// Re-export primary types for convenience
pub use decoder::{try_parse_message, Decoder, DecoderConfig, DiagnosticSink, TracingSink};
pub use error::{Error, ErrorKind, Result};
pub use message::{DecodedField, DecodedMessage, FieldValue, Value};
pub use printer::{print, walk, MessageVisitor, NullVisitor, Printer, PrinterConfig, StatsVisitor};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Decode the whole of `data` with a default [`Decoder`]
pub fn parse(data: &[u8]) -> Result<DecodedMessage> {
    Decoder::new().parse_bytes(data)
}
