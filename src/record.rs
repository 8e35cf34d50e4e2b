//! Tab-delimited text records shared by the log file and the wire.
//!
//! # Line Format
//!
//! ```text
//! time <TAB> label <TAB> direction <TAB> direction_normalized <TAB> position_original <TAB> position_target <LF>
//! ```
//!
//! - **time**: local wall clock, `YYYY-MM-DD HH:MM:SS.mmm`
//! - **label**: opaque event label, sanitized to printable ASCII without tabs
//! - **vectors**: `(x, y, z)` with a fixed number of decimals
//!
//! The encoded bytes are pure ASCII, so the log file and the TCP stream
//! receive byte-identical lines. The peer splits records on `\n`.

use crate::core::Sample;
use std::fmt::Write;

/// Field delimiter
pub const DELIMITER: char = '\t';

/// Record terminator
pub const TERMINATOR: char = '\n';

/// Timestamp layout (chrono strftime)
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Column names, in record order
pub const COLUMNS: [&str; 6] = [
    "time",
    "label",
    "direction",
    "direction_normalized",
    "position_original",
    "position_target",
];

/// Default decimals per vector component
pub const DEFAULT_PRECISION: usize = 2;

/// Header line for the log file (terminated)
pub fn header_line() -> String {
    let mut line = COLUMNS.join("\t");
    line.push(TERMINATOR);
    line
}

/// One encoded sample
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    line: String,
}

impl Record {
    /// Full line including the terminator
    pub fn as_str(&self) -> &str {
        &self.line
    }

    /// Encoded bytes (ASCII)
    pub fn as_bytes(&self) -> &[u8] {
        self.line.as_bytes()
    }

    /// Line without the terminator
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.line.trim_end_matches(TERMINATOR).split(DELIMITER)
    }
}

/// Renders samples into [`Record`]s
#[derive(Clone, Debug)]
pub struct RecordFormatter {
    precision: usize,
}

impl Default for RecordFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl RecordFormatter {
    pub fn new(precision: usize) -> Self {
        Self { precision }
    }

    /// Format a sample. Deterministic: equal samples give equal records.
    pub fn format(&self, sample: &Sample) -> Record {
        let p = self.precision;
        let mut line = String::with_capacity(160);

        // Writing into a String cannot fail
        let _ = write!(line, "{}", sample.timestamp.format(TIME_FORMAT));
        line.push(DELIMITER);
        push_sanitized(&mut line, &sample.label);
        for v in [sample.raw, sample.normalized, sample.source, sample.target] {
            line.push(DELIMITER);
            let _ = write!(line, "{:.p$}", v, p = p);
        }
        line.push(TERMINATOR);

        Record { line }
    }
}

/// Append `label` so it cannot break the line framing or the ASCII encoding
fn push_sanitized(out: &mut String, label: &str) {
    if label.is_empty() {
        out.push('-');
        return;
    }
    for c in label.chars() {
        match c {
            '\t' | '\r' | '\n' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
}
