//! # Line-Ending Transducer
//!
//! A two-state byte rewriter converting DOS line endings (`CR LF`) to UNIX
//! line endings (`LF`) and back. The state survives between calls to
//! [`LineEndingTransducer::feed`], so a `CR` closing one chunk pairs with the
//! `LF` opening the next one.
//!
//! ## Example
//!
//! ```rust
//! use eol_batch_rs::eol::transducer::{Direction, LineEndingTransducer};
//!
//! # fn example() -> Result<(), eol_batch_rs::BatchError> {
//! let mut transducer = LineEndingTransducer::new(Vec::new(), Direction::ToUnix);
//! transducer.feed(b"A\r")?;
//! transducer.feed(b"\nB")?;
//! transducer.finish()?;
//!
//! let (output, stats) = transducer.into_parts()?;
//! assert_eq!(output, b"A\nB");
//! assert_eq!(stats.collapsed, 1);
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    io::{self, Write},
};

use serde::{Deserialize, Serialize};

use super::error::ConversionError;

/// Carriage return.
pub const CR: u8 = b'\r';
/// Line feed.
pub const LF: u8 = b'\n';

/// Target line-ending convention of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// `CR LF` becomes `LF`.
    ToUnix,
    /// A bare `LF` becomes `CR LF`.
    ToDos,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::ToUnix => write!(f, "to UNIX"),
            Direction::ToDos => write!(f, "to DOS"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    /// A `CR` has been read but not written yet.
    PendingCr,
}

/// Byte counters of one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Bytes fed into the transducer
    pub bytes_in: u64,
    /// Bytes written to the sink
    pub bytes_out: u64,
    /// `CR LF` pairs collapsed to `LF`
    pub collapsed: u64,
    /// Bare `LF` bytes expanded to `CR LF`
    pub expanded: u64,
}

impl ConversionStats {
    /// Number of line endings that were rewritten.
    pub fn rewritten(&self) -> u64 {
        self.collapsed + self.expanded
    }
}

/// Streaming DOS/UNIX line-ending converter writing into `W`.
///
/// A trailing `CR` still pending when the input ends is written by
/// [`finish`](Self::finish), so `"A\r"` converts to `"A\r"` in both directions.
pub struct LineEndingTransducer<W> {
    sink: W,
    direction: Direction,
    state: State,
    stats: ConversionStats,
    scratch: Vec<u8>,
}

impl<W: Write> LineEndingTransducer<W> {
    /// Creates a transducer in the scanning state.
    pub fn new(sink: W, direction: Direction) -> Self {
        Self {
            sink,
            direction,
            state: State::Scanning,
            stats: ConversionStats::default(),
            scratch: Vec::new(),
        }
    }

    /// Prepares the transducer for a new stream.
    ///
    /// Any `CR` still pending from the previous stream is discarded.
    pub fn reset(&mut self, direction: Direction) {
        self.direction = direction;
        self.state = State::Scanning;
        self.stats = ConversionStats::default();
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn stats(&self) -> ConversionStats {
        self.stats
    }

    /// Whether a `CR` has been consumed but not written yet.
    pub fn has_pending_cr(&self) -> bool {
        self.state == State::PendingCr
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Converts `chunk` and writes the result to the sink.
    ///
    /// Feeding a stream in several chunks gives the same output as feeding it
    /// at once. Errors only come from the sink.
    pub fn feed(&mut self, chunk: &[u8]) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let mut out = std::mem::take(&mut self.scratch);
        out.clear();
        out.reserve(chunk.len() + chunk.len() / 8 + 1);

        for &byte in chunk {
            self.step(byte, &mut out);
        }
        self.stats.bytes_in += chunk.len() as u64;

        let result = self.sink.write_all(&out);
        if result.is_ok() {
            self.stats.bytes_out += out.len() as u64;
        }
        self.scratch = out;
        result
    }

    fn step(&mut self, byte: u8, out: &mut Vec<u8>) {
        self.state = match (self.state, byte) {
            (State::Scanning, CR) => State::PendingCr,
            (State::Scanning, LF) if self.direction == Direction::ToDos => {
                out.extend_from_slice(&[CR, LF]);
                self.stats.expanded += 1;
                State::Scanning
            }
            (State::Scanning, other) => {
                out.push(other);
                State::Scanning
            }
            (State::PendingCr, LF) => {
                match self.direction {
                    Direction::ToUnix => {
                        out.push(LF);
                        self.stats.collapsed += 1;
                    }
                    Direction::ToDos => out.extend_from_slice(&[CR, LF]),
                }
                State::Scanning
            }
            // The held CR is not part of a pair; the new one takes its place.
            (State::PendingCr, CR) => {
                out.push(CR);
                State::PendingCr
            }
            (State::PendingCr, other) => {
                out.extend_from_slice(&[CR, other]);
                State::Scanning
            }
        };
    }

    /// Ends the stream: writes a pending `CR` and flushes the sink.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.state == State::PendingCr {
            self.sink.write_all(&[CR])?;
            self.stats.bytes_out += 1;
            self.state = State::Scanning;
        }
        self.sink.flush()
    }

    /// Checks the byte accounting and hands back the sink.
    ///
    /// Every input byte is written once, except that a collapsed pair loses
    /// its `CR` and an expanded `LF` gains one. Any other outcome, including a
    /// `CR` left pending because [`finish`](Self::finish) was not called, is a
    /// [`ConversionError::ConsistencyFault`].
    pub fn into_parts(self) -> Result<(W, ConversionStats), ConversionError> {
        if self.state != State::Scanning {
            return Err(ConversionError::ConsistencyFault(
                "stream ended with an undecided carriage return".to_string(),
            ));
        }

        let stats = self.stats;
        let expected = stats.bytes_in - stats.collapsed + stats.expanded;
        if stats.bytes_out != expected {
            return Err(ConversionError::ConsistencyFault(format!(
                "wrote {} bytes, expected {} ({} in, {} collapsed, {} expanded)",
                stats.bytes_out, expected, stats.bytes_in, stats.collapsed, stats.expanded
            )));
        }

        Ok((self.sink, stats))
    }
}

impl<W: Write> Write for LineEndingTransducer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.feed(buf)?;
        Ok(buf.len())
    }

    /// Flushes the sink. A pending `CR` stays pending since more input may
    /// still pair it with a `LF`.
    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// Converts a whole buffer in memory.
pub fn convert_bytes(input: &[u8], direction: Direction) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 8 + 1);
    let mut transducer = LineEndingTransducer::new(io::sink(), direction);
    for &byte in input {
        transducer.step(byte, &mut out);
    }
    if transducer.has_pending_cr() {
        out.push(CR);
    }
    out
}
