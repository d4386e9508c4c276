//! Text rendering of decoded trees.
//!
//! Each field becomes one line, `<index> <type> <value>`, indented by its
//! nesting depth:
//!
//! ```text
//! 1 int 150
//! 2 string "abc"
//! 3 message
//!     1 long 3000000000
//! 4 repeated int
//!     1
//!     2
//! ```
//!
//! Nested messages follow their header line at one extra indent level.
//! Repeated elements are listed under the header, one per line; message
//! elements show a `message` line with their fields one level deeper still.
//!
//! Text values are printed in double quotes with quotes, backslashes and
//! control characters escaped, so a value never spans lines. The reference
//! layout prints the raw string instead; tools diffing against it must
//! unquote first.

mod visitor;

use crate::message::{DecodedMessage, FieldValue, Value};
use std::fmt::Write as FmtWrite;

pub use visitor::{walk, MessageVisitor, NullVisitor, StatsVisitor};

/// Configuration for the printer
#[derive(Debug, Clone)]
pub struct PrinterConfig {
    /// Indentation string repeated once per depth level (default: tab)
    pub indent_str: String,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            indent_str: "\t".to_string(),
        }
    }
}

impl PrinterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }
}

/// Renders a [`DecodedMessage`] as indented text
#[derive(Debug, Clone, Default)]
pub struct Printer {
    config: PrinterConfig,
}

impl Printer {
    /// Creates a printer with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a printer with custom configuration
    pub fn with_config(config: PrinterConfig) -> Self {
        Self { config }
    }

    /// Render the message as a string
    pub fn print(&self, message: &DecodedMessage) -> String {
        let mut output = String::new();
        self.write_to(message, &mut output).expect("String write cannot fail");
        output
    }

    /// Write the rendering to a writer
    pub fn write_to(&self, message: &DecodedMessage, w: &mut impl FmtWrite) -> std::fmt::Result {
        let mut writer = TreeWriter {
            writer: w,
            config: &self.config,
            indent_level: 0,
        };
        writer.write_message(message)
    }
}

/// Render `message` with the default configuration
pub fn print(message: &DecodedMessage) -> String {
    Printer::new().print(message)
}

struct TreeWriter<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a PrinterConfig,
    indent_level: usize,
}

impl<W: FmtWrite> TreeWriter<'_, W> {
    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn write_message(&mut self, message: &DecodedMessage) -> std::fmt::Result {
        for field in message {
            self.write_indent()?;
            match &field.value {
                FieldValue::Single(Value::Message(nested)) => {
                    writeln!(self.writer, "{} message", field.index)?;
                    self.write_nested(nested)?;
                }
                FieldValue::Single(value) => {
                    writeln!(self.writer, "{} {} {}", field.index, value.type_name(), value)?;
                }
                FieldValue::Repeated(values) => {
                    writeln!(self.writer, "{} repeated {}", field.index, field.type_name())?;
                    self.indent();
                    for value in values {
                        self.write_element(value)?;
                    }
                    self.dedent();
                }
            }
        }
        Ok(())
    }

    fn write_nested(&mut self, message: &DecodedMessage) -> std::fmt::Result {
        self.indent();
        self.write_message(message)?;
        self.dedent();
        Ok(())
    }

    fn write_element(&mut self, value: &Value) -> std::fmt::Result {
        self.write_indent()?;
        match value {
            Value::Message(nested) => {
                writeln!(self.writer, "message")?;
                self.write_nested(nested)
            }
            scalar => writeln!(self.writer, "{}", scalar),
        }
    }
}

/// Escape text so a rendered value always stays on one line
pub(crate) fn escape_text(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_control() => {
                let _ = write!(result, "\\u{{{:x}}}", c as u32);
            }
            _ => result.push(c),
        }
    }
    result
}
