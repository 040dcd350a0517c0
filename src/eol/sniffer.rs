//! # File-Type Sniffer
//!
//! Guesses the line-ending convention of a file by counting `LF` and `CR`
//! bytes. A `CR` that is not directly followed by a `LF` marks the content as
//! binary and stops the scan.

use std::{
    fmt,
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

use log::debug;
use serde::{Deserialize, Serialize};

use super::transducer::{CR, Direction, LF};

/// Line-ending convention guessed for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Dos,
    Unix,
    Binary,
}

impl FileType {
    /// Direction used when converting a file of this type in guess mode.
    ///
    /// Only DOS files are converted to UNIX; UNIX and binary files both get
    /// DOS line endings.
    pub fn conversion_direction(self) -> Direction {
        match self {
            FileType::Dos => Direction::ToUnix,
            FileType::Unix | FileType::Binary => Direction::ToDos,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileType::Dos => write!(f, "DOS"),
            FileType::Unix => write!(f, "UNIX"),
            FileType::Binary => write!(f, "binary"),
        }
    }
}

/// Classifies the content of `reader`.
///
/// Every `CR` must be followed by a `LF`, otherwise the content is
/// [`FileType::Binary`]; this includes a `CR` ending the stream. When the
/// number of `LF` bytes equals the number of `CR` bytes, all line endings
/// were `CR LF` pairs and the content is [`FileType::Dos`]. Anything else is
/// [`FileType::Unix`]. Content without any line ending counts as DOS.
pub fn sniff<R: Read>(reader: R) -> io::Result<FileType> {
    let mut reader = BufReader::new(reader);
    let mut lf_count: u64 = 0;
    let mut cr_count: u64 = 0;
    let mut pending_cr = false;

    loop {
        let buffer = match reader.fill_buf() {
            Ok(buffer) => buffer,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        };
        if buffer.is_empty() {
            break;
        }

        for &byte in buffer {
            if pending_cr {
                pending_cr = false;
                if byte == LF {
                    lf_count += 1;
                    continue;
                }
                debug!("CR followed by 0x{byte:02x}, content is binary");
                return Ok(FileType::Binary);
            }

            match byte {
                CR => {
                    cr_count += 1;
                    pending_cr = true;
                }
                LF => lf_count += 1,
                _ => {}
            }
        }

        let consumed = buffer.len();
        reader.consume(consumed);
    }

    if pending_cr {
        debug!("content ends with a CR, content is binary");
        return Ok(FileType::Binary);
    }

    debug!("sniffed {lf_count} LF and {cr_count} CR");
    Ok(if lf_count == cr_count {
        FileType::Dos
    } else {
        FileType::Unix
    })
}

/// Classifies an in-memory buffer.
pub fn sniff_bytes(content: &[u8]) -> FileType {
    // Reading from a slice cannot fail.
    sniff(content).unwrap_or(FileType::Binary)
}

/// Classifies the file at `path`.
pub fn sniff_path<P: AsRef<Path>>(path: P) -> io::Result<FileType> {
    sniff(File::open(path)?)
}
