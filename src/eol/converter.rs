//! # Per-File Conversion
//!
//! Streams one file through a [`LineEndingTransducer`] into a temporary file
//! and then swaps the temporary file in place of the source. The source is
//! left untouched unless the whole conversion succeeded.
//!
//! ## Example
//!
//! ```rust
//! use eol_batch_rs::eol::converter::{ConversionMode, FileConverter};
//! use std::fs;
//!
//! # fn example() -> Result<(), eol_batch_rs::BatchError> {
//! let dir = tempfile::tempdir()?;
//! let path = dir.path().join("report.txt");
//! fs::write(&path, "first\r\nsecond\r\n")?;
//!
//! let conversion = FileConverter::default().convert(&path, ConversionMode::Guess)?;
//! assert_eq!(fs::read(&path)?, b"first\nsecond\n");
//! assert_eq!(conversion.stats.collapsed, 2);
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Read},
    path::{Path, PathBuf},
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::{Builder, NamedTempFile, PersistError};

use super::{
    error::ConversionError,
    sniffer::{FileType, sniff_path},
    transducer::{ConversionStats, Direction, LineEndingTransducer},
};

/// Size of the chunks read from the source.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Suffix of the temporary file holding the converted content.
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";

/// How the conversion direction of a file is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionMode {
    /// Sniff the file and convert DOS files to UNIX, anything else to DOS.
    #[default]
    #[serde(rename = "guess")]
    Guess,
    #[serde(rename = "dostounix")]
    DosToUnix,
    #[serde(rename = "unixtodos")]
    UnixToDos,
}

impl ConversionMode {
    /// The fixed direction of a forced mode, `None` in guess mode.
    pub fn forced_direction(self) -> Option<Direction> {
        match self {
            ConversionMode::Guess => None,
            ConversionMode::DosToUnix => Some(Direction::ToUnix),
            ConversionMode::UnixToDos => Some(Direction::ToDos),
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            ConversionMode::Guess => "guess",
            ConversionMode::DosToUnix => "dostounix",
            ConversionMode::UnixToDos => "unixtodos",
        };
        f.write_str(code)
    }
}

impl FromStr for ConversionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "guess" => Ok(ConversionMode::Guess),
            "dostounix" => Ok(ConversionMode::DosToUnix),
            "unixtodos" => Ok(ConversionMode::UnixToDos),
            other => Err(format!("Unknown conversion mode: {other}")),
        }
    }
}

/// Settings of a [`FileConverter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterOptions {
    /// Size of the chunks read from the source
    pub buffer_size: usize,
    /// Suffix of the temporary file
    pub temp_suffix: String,
    /// Directory of the temporary file, the source directory when `None`
    pub temp_directory: Option<PathBuf>,
    /// Whether the converted file keeps the permissions of the source
    pub preserve_permissions: bool,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            temp_directory: None,
            preserve_permissions: true,
        }
    }
}

/// Outcome of a successful file conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConversion {
    pub path: PathBuf,
    pub mode: ConversionMode,
    /// Sniffed file type, only set in guess mode
    pub file_type: Option<FileType>,
    pub direction: Direction,
    pub stats: ConversionStats,
    /// `false` when the rename failed and the content was copied over the source
    pub atomic: bool,
}

/// Converts the line endings of single files.
///
/// A converter holds no per-file state; one instance can be shared by
/// several threads, each converting its own files.
#[derive(Debug, Clone, Default)]
pub struct FileConverter {
    options: ConverterOptions,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl FileConverter {
    pub fn new(options: ConverterOptions) -> Self {
        Self {
            options,
            cancel_flag: None,
        }
    }

    /// Stops conversions in progress once `flag` is set. The flag is checked
    /// before each chunk is read.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Converts the file at `path` in place.
    ///
    /// # Errors
    /// - [`ConversionError::SourceUnreadable`] when the source cannot be read
    /// - [`ConversionError::SinkUnwritable`] when the temporary file cannot be written
    /// - [`ConversionError::ReplaceFailed`] when the source cannot be replaced
    /// - [`ConversionError::Cancelled`] when the cancellation flag was set
    /// - [`ConversionError::ConsistencyFault`] on a transducer accounting error
    pub fn convert<P: AsRef<Path>>(
        &self,
        path: P,
        mode: ConversionMode,
    ) -> Result<FileConversion, ConversionError> {
        let requested = path.as_ref();
        // Symbolic links are followed so the replace lands on the target.
        let resolved = fs::canonicalize(requested).map_err(|e| unreadable(requested, e))?;
        if resolved != requested {
            debug!("{} resolves to {}", requested.display(), resolved.display());
        }
        let path = resolved.as_path();
        let (direction, file_type) = self.resolve_direction(path, mode)?;

        debug!(
            "Converting {} {} (mode: {})",
            path.display(),
            direction,
            mode
        );

        let source = File::open(path).map_err(|e| unreadable(path, e))?;
        let permissions = if self.options.preserve_permissions {
            Some(
                source
                    .metadata()
                    .map_err(|e| unreadable(path, e))?
                    .permissions(),
            )
        } else {
            None
        };

        let temp = self.create_temp_file(path)?;
        let writer = BufWriter::with_capacity(self.options.buffer_size.max(1), temp);
        let mut transducer = LineEndingTransducer::new(writer, direction);

        self.pump(path, source, &mut transducer)?;

        transducer.finish().map_err(|e| unwritable(path, e))?;
        let (writer, stats) = transducer.into_parts()?;
        let temp = writer
            .into_inner()
            .map_err(|e| unwritable(path, e.into_error()))?;

        if let Some(permissions) = permissions {
            fs::set_permissions(temp.path(), permissions).map_err(|e| unwritable(path, e))?;
        }
        temp.as_file().sync_all().map_err(|e| unwritable(path, e))?;

        let atomic = self.replace(path, temp)?;

        info!(
            "Converted {} {}: {} line endings rewritten, {} -> {} bytes",
            path.display(),
            direction,
            stats.rewritten(),
            stats.bytes_in,
            stats.bytes_out
        );

        Ok(FileConversion {
            path: requested.to_path_buf(),
            mode,
            file_type,
            direction,
            stats,
            atomic,
        })
    }

    fn resolve_direction(
        &self,
        path: &Path,
        mode: ConversionMode,
    ) -> Result<(Direction, Option<FileType>), ConversionError> {
        if let Some(direction) = mode.forced_direction() {
            return Ok((direction, None));
        }

        let file_type = sniff_path(path).map_err(|e| unreadable(path, e))?;
        if file_type == FileType::Binary {
            warn!(
                "{} looks like a binary file, converting it to DOS anyway",
                path.display()
            );
        } else {
            debug!("{} looks like a {} file", path.display(), file_type);
        }

        Ok((file_type.conversion_direction(), Some(file_type)))
    }

    /// Reads the source chunk by chunk into the transducer. The source is
    /// closed when this returns.
    fn pump<W: io::Write>(
        &self,
        path: &Path,
        mut source: File,
        transducer: &mut LineEndingTransducer<W>,
    ) -> Result<(), ConversionError> {
        let mut buffer = vec![0u8; self.options.buffer_size.max(1)];

        loop {
            if self.is_cancelled() {
                warn!("Conversion of {} cancelled", path.display());
                return Err(ConversionError::Cancelled {
                    path: path.to_path_buf(),
                });
            }

            let read = match source.read(&mut buffer) {
                Ok(0) => return Ok(()),
                Ok(read) => read,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => return Err(unreadable(path, error)),
            };

            transducer
                .feed(&buffer[..read])
                .map_err(|e| unwritable(path, e))?;
        }
    }

    fn create_temp_file(&self, path: &Path) -> Result<NamedTempFile, ConversionError> {
        if let Some(directory) = &self.options.temp_directory {
            return self.temp_file_in(path, directory).map_err(|e| unwritable(path, e));
        }

        let directory = source_directory(path);
        match self.temp_file_in(path, directory) {
            Ok(temp) => Ok(temp),
            Err(error) => {
                warn!(
                    "Cannot create temporary file in {} ({}), using the system temp directory",
                    directory.display(),
                    error
                );
                self.temp_file_in(path, &std::env::temp_dir())
                    .map_err(|e| unwritable(path, e))
            }
        }
    }

    fn temp_file_in(&self, path: &Path, directory: &Path) -> io::Result<NamedTempFile> {
        let prefix = match path.file_name() {
            Some(name) => format!(".{}.", name.to_string_lossy()),
            None => ".eol.".to_string(),
        };
        Builder::new()
            .prefix(&prefix)
            .suffix(&self.options.temp_suffix)
            .tempfile_in(directory)
    }

    /// Moves the temporary file over the source. Returns whether the move was
    /// atomic.
    fn replace(&self, path: &Path, temp: NamedTempFile) -> Result<bool, ConversionError> {
        self.replace_with(path, temp, &rename_over)
    }

    /// Replaces `path` with `temp` through `rename`.
    ///
    /// A refused rename (typically a temporary file on another device) is
    /// retried from a copy staged in the source directory, which keeps the
    /// replace atomic. If the staged rename is refused as well the source is
    /// deleted before the rename: readers may then briefly see no file at
    /// all. On failure the source is untouched, unless the deletion succeeded,
    /// and the converted content stays in the temporary file named by
    /// [`ConversionError::ReplaceFailed`].
    fn replace_with(
        &self,
        path: &Path,
        temp: NamedTempFile,
        rename: &Rename<'_>,
    ) -> Result<bool, ConversionError> {
        let PersistError { error, file } = match rename(temp, path) {
            Ok(()) => return Ok(true),
            Err(persist_error) => persist_error,
        };

        debug!(
            "Cannot rename {} to {} ({}), staging the converted content next to it",
            file.path().display(),
            path.display(),
            error
        );

        let staged = match self.stage_beside(path, &file) {
            Ok(staged) => staged,
            Err(stage_error) => return Err(replace_failed(path, file, stage_error)),
        };
        drop(file);

        let PersistError { error, file } = match rename(staged, path) {
            Ok(()) => return Ok(true),
            Err(persist_error) => persist_error,
        };

        warn!(
            "Atomic replace of {} refused ({}), deleting it before renaming {}",
            path.display(),
            error,
            file.path().display()
        );

        if let Err(remove_error) = fs::remove_file(path) {
            return Err(replace_failed(path, file, remove_error));
        }
        match file.persist_noclobber(path) {
            Ok(_) => Ok(false),
            Err(PersistError { error, file }) => Err(replace_failed(path, file, error)),
        }
    }

    /// Copies `temp` into a new temporary file of the source directory.
    fn stage_beside(&self, path: &Path, temp: &NamedTempFile) -> io::Result<NamedTempFile> {
        let mut staged = self.temp_file_in(path, source_directory(path))?;
        io::copy(&mut temp.reopen()?, &mut staged)?;
        fs::set_permissions(staged.path(), temp.as_file().metadata()?.permissions())?;
        staged.as_file().sync_all()?;
        Ok(staged)
    }
}

type Rename<'a> = dyn Fn(NamedTempFile, &Path) -> Result<(), PersistError> + 'a;

fn rename_over(temp: NamedTempFile, path: &Path) -> Result<(), PersistError> {
    temp.persist(path).map(drop)
}

fn source_directory(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Keeps `temp` on disk and reports where it is.
fn replace_failed(path: &Path, temp: NamedTempFile, source: io::Error) -> ConversionError {
    let temp_path = match temp.keep() {
        Ok((_, temp_path)) => temp_path,
        Err(keep_error) => keep_error.file.path().to_path_buf(),
    };
    ConversionError::ReplaceFailed {
        path: path.to_path_buf(),
        temp_path,
        source,
    }
}

fn unreadable(path: &Path, source: io::Error) -> ConversionError {
    ConversionError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    }
}

fn unwritable(path: &Path, source: io::Error) -> ConversionError {
    ConversionError::SinkUnwritable {
        path: path.to_path_buf(),
        source,
    }
}
