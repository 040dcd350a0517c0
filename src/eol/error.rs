use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while converting a single file.
///
/// `SourceUnreadable`, `SinkUnwritable` and `ReplaceFailed` are scoped to one
/// file: a batch records them and moves on to the next file.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// The source could not be opened or read.
    #[error("cannot read source {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The temporary file could not be created or written.
    #[error("cannot write temporary file for {}: {source}", path.display())]
    SinkUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The converted content could not replace the source. The temporary file
    /// is kept at `temp_path` for manual recovery.
    #[error(
        "cannot replace {} with {}: {source}",
        path.display(),
        temp_path.display()
    )]
    ReplaceFailed {
        path: PathBuf,
        temp_path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transducer produced output that does not match its own accounting.
    #[error("line-ending transducer consistency fault: {0}")]
    ConsistencyFault(String),

    /// The conversion was stopped through its cancellation flag.
    #[error("conversion of {} cancelled", path.display())]
    Cancelled { path: PathBuf },
}

impl ConversionError {
    /// Whether the error must stop the whole run instead of failing one file.
    pub fn aborts_run(&self) -> bool {
        matches!(
            self,
            ConversionError::ConsistencyFault(_) | ConversionError::Cancelled { .. }
        )
    }
}
