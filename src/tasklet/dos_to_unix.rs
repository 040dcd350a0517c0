//! # DOS to UNIX Tasklet
//!
//! This module provides a tasklet converting the line endings of files, one
//! by one, between DOS (`CR LF`) and UNIX (`LF`) conventions.
//!
//! ## Features
//!
//! - Several sources, each a file or a folder with its own wildcard and mode
//! - Guess mode picking the direction from the current content of each file
//! - Optional recursion into sub-folders
//! - Success conditions evaluated over processed and failed files
//! - Early stop once the success condition can no longer be met
//! - Result files published to the next steps, and sources taken from the
//!   result files of the previous steps
//! - Builder pattern and JSON configuration
//!
//! ## Examples
//!
//! ### Converting a folder
//!
//! ```rust
//! use eol_batch_rs::core::step::{Step, StepBuilder, StepExecution};
//! use eol_batch_rs::eol::converter::ConversionMode;
//! use eol_batch_rs::tasklet::dos_to_unix::DosToUnixTaskletBuilder;
//! use std::fs;
//!
//! # fn example() -> Result<(), eol_batch_rs::BatchError> {
//! let dir = tempfile::tempdir()?;
//! fs::write(dir.path().join("a.csv"), "id,name\r\n1,alice\r\n")?;
//! fs::write(dir.path().join("notes.md"), "keep\r\n")?;
//!
//! let tasklet = DosToUnixTaskletBuilder::new()
//!     .source_with_mode(dir.path(), Some(r".*\.csv"), ConversionMode::DosToUnix)
//!     .build()?;
//!
//! let step = StepBuilder::new("normalize-csv").tasklet(&tasklet).build();
//! let mut step_execution = StepExecution::new("normalize-csv");
//! step.execute(&mut step_execution)?;
//!
//! assert_eq!(fs::read(dir.path().join("a.csv"))?, b"id,name\n1,alice\n");
//! assert_eq!(fs::read(dir.path().join("notes.md"))?, b"keep\r\n");
//! # Ok(())
//! # }
//! ```
//!
//! ### JSON configuration
//!
//! ```rust
//! use eol_batch_rs::tasklet::dos_to_unix::{DosToUnixConfig, DosToUnixTaskletBuilder};
//!
//! # fn example() -> Result<(), eol_batch_rs::BatchError> {
//! let config = DosToUnixConfig::from_json(
//!     r#"{
//!         "sources": [{ "path": "./inbound", "wildcard": ".*\\.txt", "mode": "unixtodos" }],
//!         "include_subfolders": true,
//!         "success_condition": { "type": "error_files_below", "limit": 10 }
//!     }"#,
//! )?;
//! let tasklet = DosToUnixTaskletBuilder::from_config(config).build()?;
//! # Ok(())
//! # }
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, atomic::AtomicBool},
};

use log::{debug, error, info, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    BatchError,
    core::step::{RepeatStatus, StepExecution, Tasklet},
    eol::converter::{
        ConversionMode, ConverterOptions, DEFAULT_BUFFER_SIZE, DEFAULT_TEMP_SUFFIX, FileConverter,
    },
};

use super::listing::{FileLister, WalkDirLister};

/// When a conversion run counts as successful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "limit", rename_all = "snake_case")]
pub enum SuccessCondition {
    /// Whatever happened.
    Always,
    /// At least `n` files were converted.
    AtLeastProcessed(usize),
    /// Fewer than `n` files failed to convert.
    ErrorFilesBelow(usize),
    /// No error at all.
    #[default]
    NoErrors,
}

impl SuccessCondition {
    pub fn is_met(&self, report: &ConversionReport) -> bool {
        match *self {
            SuccessCondition::Always => true,
            SuccessCondition::AtLeastProcessed(n) => report.processed >= n,
            SuccessCondition::ErrorFilesBelow(n) => report.error_files < n,
            SuccessCondition::NoErrors => report.errors == 0,
        }
    }

    /// Whether the condition can no longer be met, whatever the remaining
    /// files give.
    pub fn is_broken(&self, report: &ConversionReport) -> bool {
        match *self {
            SuccessCondition::Always | SuccessCondition::AtLeastProcessed(_) => false,
            SuccessCondition::ErrorFilesBelow(n) => report.error_files >= n,
            SuccessCondition::NoErrors => report.errors > 0,
        }
    }
}

impl fmt::Display for SuccessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessCondition::Always => write!(f, "always"),
            SuccessCondition::AtLeastProcessed(n) => write!(f, "at least {n} files processed"),
            SuccessCondition::ErrorFilesBelow(n) => write!(f, "less than {n} files in error"),
            SuccessCondition::NoErrors => write!(f, "no errors"),
        }
    }
}

/// Which file names end up in [`ConversionReport::result_files`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFilenames {
    #[default]
    None,
    All,
    ProcessedOnly,
    ErrorsOnly,
}

impl ResultFilenames {
    fn keeps_processed(self) -> bool {
        matches!(self, ResultFilenames::All | ResultFilenames::ProcessedOnly)
    }

    fn keeps_errors(self) -> bool {
        matches!(self, ResultFilenames::All | ResultFilenames::ErrorsOnly)
    }
}

/// One source of files to convert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// File or folder
    pub path: PathBuf,
    /// Regular expression the file names of a folder must fully match
    #[serde(default)]
    pub wildcard: Option<String>,
    #[serde(default)]
    pub mode: ConversionMode,
}

/// Summary of a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Files converted successfully
    pub processed: usize,
    /// Files whose conversion failed
    pub error_files: usize,
    /// All errors, including missing sources and listing failures
    pub errors: usize,
    /// Files selected by [`ResultFilenames`]
    pub result_files: Vec<PathBuf>,
    /// Whether the success condition was met
    pub success: bool,
    /// Whether the run stopped early because the success condition was broken
    pub aborted: bool,
}

/// Serializable description of a [`DosToUnixTasklet`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosToUnixConfig {
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    /// Take the sources from the result files of the previous steps
    #[serde(default)]
    pub sources_from_previous: bool,
    /// Mode of the sources taken from previous steps
    #[serde(default)]
    pub previous_mode: ConversionMode,
    #[serde(default)]
    pub include_subfolders: bool,
    #[serde(default)]
    pub success_condition: SuccessCondition,
    #[serde(default)]
    pub result_filenames: ResultFilenames,
    #[serde(default = "default_stop_on_broken_condition")]
    pub stop_on_broken_condition: bool,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_temp_suffix")]
    pub temp_suffix: String,
    #[serde(default)]
    pub temp_directory: Option<PathBuf>,
}

fn default_stop_on_broken_condition() -> bool {
    true
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_temp_suffix() -> String {
    DEFAULT_TEMP_SUFFIX.to_string()
}

impl DosToUnixConfig {
    pub fn from_json(json: &str) -> Result<Self, BatchError> {
        serde_json::from_str(json)
            .map_err(|e| BatchError::Configuration(format!("Invalid configuration: {}", e)))
    }
}

#[derive(Debug)]
struct Source {
    path: PathBuf,
    wildcard: Option<Regex>,
    mode: ConversionMode,
}

impl Source {
    fn accepts(&self, file: &Path) -> bool {
        match (&self.wildcard, file.file_name()) {
            (None, _) => true,
            (Some(wildcard), Some(name)) => wildcard.is_match(&name.to_string_lossy()),
            (Some(_), None) => false,
        }
    }
}

/// A tasklet converting the line endings of files in place.
///
/// Each file is converted through a temporary file; a failed file is left
/// untouched and counted, and the run moves on to the next file.
pub struct DosToUnixTasklet {
    sources: Vec<Source>,
    success_condition: SuccessCondition,
    result_filenames: ResultFilenames,
    stop_on_broken_condition: bool,
    sources_from_previous: bool,
    previous_mode: ConversionMode,
    converter: FileConverter,
    lister: Box<dyn FileLister + Send + Sync>,
    last_report: Mutex<Option<ConversionReport>>,
}

impl DosToUnixTasklet {
    /// Converts every source and evaluates the success condition.
    ///
    /// # Errors
    /// Fails only when a conversion error must stop the whole run (a
    /// transducer consistency fault or a cancellation). Per-file failures are
    /// counted in the returned report.
    pub fn run(&self) -> Result<ConversionReport, BatchError> {
        self.run_on(&[])
    }

    /// Same as [`run`](Self::run), with the result files of the previous
    /// steps. They replace the configured sources when the tasklet takes its
    /// sources from previous steps, and are ignored otherwise.
    pub fn run_on(
        &self,
        previous_result_files: &[PathBuf],
    ) -> Result<ConversionReport, BatchError> {
        let previous_sources: Vec<Source>;
        let sources: &[Source] = if self.sources_from_previous {
            debug!(
                "{} sources taken from previous steps",
                previous_result_files.len()
            );
            previous_sources = previous_result_files
                .iter()
                .map(|path| Source {
                    path: path.clone(),
                    wildcard: None,
                    mode: self.previous_mode,
                })
                .collect();
            &previous_sources
        } else {
            &self.sources
        };

        let mut report = ConversionReport::default();

        'sources: for source in sources {
            if self.should_stop(&report) {
                report.aborted = true;
                break;
            }

            let files = match self.resolve_files(source) {
                Ok(files) => files,
                Err(err) => {
                    error!("Cannot list {}: {}", source.path.display(), err);
                    report.errors += 1;
                    continue;
                }
            };
            debug!(
                "{} files to convert in {}",
                files.len(),
                source.path.display()
            );

            for file in files {
                if self.should_stop(&report) {
                    report.aborted = true;
                    break 'sources;
                }

                match self.converter.convert(&file, source.mode) {
                    Ok(conversion) => {
                        report.processed += 1;
                        if self.result_filenames.keeps_processed() {
                            report.result_files.push(conversion.path);
                        }
                    }
                    Err(err) if err.aborts_run() => {
                        error!("Conversion run stopped on {}: {}", file.display(), err);
                        self.store_report(&report);
                        return Err(BatchError::Conversion(err));
                    }
                    Err(err) => {
                        error!("Error converting {}: {}", file.display(), err);
                        report.error_files += 1;
                        report.errors += 1;
                        if self.result_filenames.keeps_errors() {
                            report.result_files.push(file);
                        }
                    }
                }
            }
        }

        if report.aborted {
            warn!(
                "Success condition ({}) broken, remaining files skipped",
                self.success_condition
            );
        }

        report.success = self.success_condition.is_met(&report);

        info!(
            "Line ending conversion finished: {} files processed, {} files in error, {} errors, success condition ({}) {}",
            report.processed,
            report.error_files,
            report.errors,
            self.success_condition,
            if report.success { "met" } else { "not met" }
        );

        self.store_report(&report);
        Ok(report)
    }

    /// Report of the latest run, if any.
    pub fn last_report(&self) -> Option<ConversionReport> {
        self.last_report
            .lock()
            .ok()
            .and_then(|report| report.clone())
    }

    fn store_report(&self, report: &ConversionReport) {
        if let Ok(mut last_report) = self.last_report.lock() {
            *last_report = Some(report.clone());
        }
    }

    fn should_stop(&self, report: &ConversionReport) -> bool {
        self.stop_on_broken_condition && self.success_condition.is_broken(report)
    }

    fn resolve_files(&self, source: &Source) -> Result<Vec<PathBuf>, BatchError> {
        if source.path.is_file() {
            return Ok(vec![source.path.clone()]);
        }

        if !source.path.is_dir() {
            return Err(BatchError::Configuration(format!(
                "Source path does not exist: {}",
                source.path.display()
            )));
        }

        self.lister
            .list(&source.path, &|path, _depth| source.accepts(path))
    }
}

impl Tasklet for DosToUnixTasklet {
    /// Runs the conversion and fails the step when the success condition is
    /// not met.
    fn execute(&self, step_execution: &StepExecution) -> Result<RepeatStatus, BatchError> {
        let report = self.run_on(&step_execution.previous_result_files)?;

        if report.success {
            Ok(RepeatStatus::Finished)
        } else {
            Err(BatchError::Tasklet(format!(
                "success condition ({}) not met: {} files processed, {} files in error, {} errors",
                self.success_condition, report.processed, report.error_files, report.errors
            )))
        }
    }

    /// The files selected by [`ResultFilenames`] in the latest run.
    fn result_files(&self) -> Vec<PathBuf> {
        self.last_report()
            .map(|report| report.result_files)
            .unwrap_or_default()
    }
}

/// Builder for creating DosToUnixTasklet instances with a fluent interface.
///
/// # Examples
///
/// ```rust
/// use eol_batch_rs::eol::converter::ConversionMode;
/// use eol_batch_rs::tasklet::dos_to_unix::{DosToUnixTaskletBuilder, ResultFilenames, SuccessCondition};
///
/// # fn example() -> Result<(), eol_batch_rs::BatchError> {
/// let tasklet = DosToUnixTaskletBuilder::new()
///     .source("./inbound", Some(r".*\.txt"))
///     .source_with_mode("./outbound/export.csv", None::<&str>, ConversionMode::UnixToDos)
///     .include_subfolders(true)
///     .success_condition(SuccessCondition::ErrorFilesBelow(5))
///     .result_filenames(ResultFilenames::ErrorsOnly)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct DosToUnixTaskletBuilder {
    sources: Vec<SourceSpec>,
    include_subfolders: bool,
    success_condition: SuccessCondition,
    result_filenames: ResultFilenames,
    stop_on_broken_condition: bool,
    sources_from_previous: bool,
    previous_mode: ConversionMode,
    options: ConverterOptions,
    cancel_flag: Option<Arc<AtomicBool>>,
    lister: Option<Box<dyn FileLister + Send + Sync>>,
}

impl Default for DosToUnixTaskletBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DosToUnixTaskletBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            include_subfolders: false,
            success_condition: SuccessCondition::default(),
            result_filenames: ResultFilenames::default(),
            stop_on_broken_condition: true,
            sources_from_previous: false,
            previous_mode: ConversionMode::Guess,
            options: ConverterOptions::default(),
            cancel_flag: None,
            lister: None,
        }
    }

    pub fn from_config(config: DosToUnixConfig) -> Self {
        let mut builder = Self::new()
            .include_subfolders(config.include_subfolders)
            .success_condition(config.success_condition)
            .result_filenames(config.result_filenames)
            .stop_on_broken_condition(config.stop_on_broken_condition)
            .sources_from_previous(config.sources_from_previous)
            .previous_mode(config.previous_mode)
            .buffer_size(config.buffer_size)
            .temp_suffix(config.temp_suffix);
        if let Some(directory) = config.temp_directory {
            builder = builder.temp_directory(directory);
        }
        builder.sources = config.sources;
        builder
    }

    /// Adds a source converted in guess mode.
    pub fn source<P: AsRef<Path>, S: Into<String>>(self, path: P, wildcard: Option<S>) -> Self {
        self.source_with_mode(path, wildcard, ConversionMode::Guess)
    }

    pub fn source_with_mode<P: AsRef<Path>, S: Into<String>>(
        mut self,
        path: P,
        wildcard: Option<S>,
        mode: ConversionMode,
    ) -> Self {
        self.sources.push(SourceSpec {
            path: path.as_ref().to_path_buf(),
            wildcard: wildcard.map(Into::into),
            mode,
        });
        self
    }

    /// Converts the result files of the previous steps instead of the
    /// configured sources.
    pub fn sources_from_previous(mut self, from_previous: bool) -> Self {
        self.sources_from_previous = from_previous;
        self
    }

    /// Mode of the sources taken from previous steps, guess by default.
    pub fn previous_mode(mut self, mode: ConversionMode) -> Self {
        self.previous_mode = mode;
        self
    }

    pub fn include_subfolders(mut self, include: bool) -> Self {
        self.include_subfolders = include;
        self
    }

    pub fn success_condition(mut self, condition: SuccessCondition) -> Self {
        self.success_condition = condition;
        self
    }

    pub fn result_filenames(mut self, result_filenames: ResultFilenames) -> Self {
        self.result_filenames = result_filenames;
        self
    }

    /// Whether to skip the remaining files once the success condition is
    /// broken. Enabled by default.
    pub fn stop_on_broken_condition(mut self, stop: bool) -> Self {
        self.stop_on_broken_condition = stop;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.options.buffer_size = buffer_size;
        self
    }

    pub fn temp_suffix<S: Into<String>>(mut self, suffix: S) -> Self {
        self.options.temp_suffix = suffix.into();
        self
    }

    pub fn temp_directory<P: AsRef<Path>>(mut self, directory: P) -> Self {
        self.options.temp_directory = Some(directory.as_ref().to_path_buf());
        self
    }

    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.options.preserve_permissions = preserve;
        self
    }

    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(flag);
        self
    }

    /// Replaces the default filesystem walk. `include_subfolders` is then up
    /// to the given lister.
    pub fn file_lister<L: FileLister + Send + Sync + 'static>(mut self, lister: L) -> Self {
        self.lister = Some(Box::new(lister));
        self
    }

    /// Builds the DosToUnixTasklet instance.
    ///
    /// # Errors
    /// Returns [`BatchError::Configuration`] when no source is set and none
    /// is taken from previous steps, a wildcard is not a valid regular
    /// expression, the success condition can never be met, the buffer size is
    /// zero or the temporary suffix is empty.
    pub fn build(self) -> Result<DosToUnixTasklet, BatchError> {
        if self.sources.is_empty() && !self.sources_from_previous {
            return Err(BatchError::Configuration(
                "At least one source is required".to_string(),
            ));
        }
        if self.success_condition == SuccessCondition::ErrorFilesBelow(0) {
            return Err(BatchError::Configuration(
                "Success condition can never be met: less than 0 files in error".to_string(),
            ));
        }
        if self.options.buffer_size == 0 {
            return Err(BatchError::Configuration(
                "Buffer size must be greater than zero".to_string(),
            ));
        }
        if self.options.temp_suffix.is_empty() {
            return Err(BatchError::Configuration(
                "Temporary file suffix must not be empty".to_string(),
            ));
        }

        let sources = self
            .sources
            .into_iter()
            .map(compile_source)
            .collect::<Result<Vec<_>, _>>()?;

        let mut converter = FileConverter::new(self.options);
        if let Some(flag) = self.cancel_flag {
            converter = converter.with_cancel_flag(flag);
        }

        let include_subfolders = self.include_subfolders;
        let lister = self
            .lister
            .unwrap_or_else(|| Box::new(WalkDirLister::new(include_subfolders)));

        Ok(DosToUnixTasklet {
            sources,
            success_condition: self.success_condition,
            result_filenames: self.result_filenames,
            stop_on_broken_condition: self.stop_on_broken_condition,
            sources_from_previous: self.sources_from_previous,
            previous_mode: self.previous_mode,
            converter,
            lister,
            last_report: Mutex::new(None),
        })
    }
}

fn compile_source(row: SourceSpec) -> Result<Source, BatchError> {
    let wildcard = match row.wildcard.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(pattern) => Some(Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            BatchError::Configuration(format!("Invalid wildcard {}: {}", pattern, e))
        })?),
    };

    Ok(Source {
        path: row.path,
        wildcard,
        mode: row.mode,
    })
}
