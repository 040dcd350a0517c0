//! # DOS to UNIX Tasklet Integration Tests
//!
//! Runs the conversion tasklet over real directory trees, alone and inside
//! jobs: file selection, conversion modes, success conditions, early stop,
//! reported file names, result files handed between steps and JSON
//! configuration.

pub mod common;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::Result;
use common::{init_logger, write_files};
use eol_batch_rs::{
    BatchError,
    core::{
        job::{Job, JobBuilder},
        step::{Step, StepBuilder, StepExecution, StepStatus},
    },
    eol::{converter::ConversionMode, error::ConversionError},
    tasklet::{
        dos_to_unix::{
            ConversionReport, DosToUnixConfig, DosToUnixTasklet, DosToUnixTaskletBuilder,
            ResultFilenames, SuccessCondition,
        },
        listing::{FileFilter, FileLister},
    },
};
use tempfile::TempDir;

const DOS: &[u8] = b"first\r\nsecond\r\n";
const UNIX: &[u8] = b"first\nsecond\n";

/// Creates an inbound tree:
///
/// ```text
/// a.txt          DOS
/// b.txt          DOS
/// c.log          DOS
/// nested/d.txt   DOS
/// nested/e.txt   UNIX
/// ```
fn create_inbound(base: &Path) -> Result<()> {
    write_files(
        base,
        &[
            ("a.txt", DOS),
            ("b.txt", DOS),
            ("c.log", DOS),
            ("nested/d.txt", DOS),
            ("nested/e.txt", UNIX),
        ],
    )?;
    Ok(())
}

fn run_in_job(tasklet: &DosToUnixTasklet) -> Result<(), BatchError> {
    let step = StepBuilder::new("convert").tasklet(tasklet).build();
    let job = JobBuilder::new()
        .name("line-endings".to_string())
        .start(&step)
        .build();
    job.run().map(|_| ())
}

/// Lists a fixed set of names below the source folder, existing or not.
struct FixedLister(Vec<&'static str>);

impl FileLister for FixedLister {
    fn list(&self, root: &Path, filter: &FileFilter<'_>) -> Result<Vec<PathBuf>, BatchError> {
        Ok(self
            .0
            .iter()
            .map(|name| root.join(name))
            .filter(|path| filter(path, 1))
            .collect())
    }
}

/// `a.txt` and `c.txt` exist, `ghost.txt` does not.
fn tasklet_with_ghost(
    base: &Path,
    condition: SuccessCondition,
    stop_on_broken_condition: bool,
) -> Result<DosToUnixTasklet> {
    write_files(base, &[("a.txt", DOS), ("c.txt", DOS)])?;
    let tasklet = DosToUnixTaskletBuilder::new()
        .source_with_mode(base, None::<&str>, ConversionMode::DosToUnix)
        .file_lister(FixedLister(vec!["a.txt", "ghost.txt", "c.txt"]))
        .success_condition(condition)
        .stop_on_broken_condition(stop_on_broken_condition)
        .result_filenames(ResultFilenames::All)
        .build()?;
    Ok(tasklet)
}

#[test]
fn job_converts_matching_files_of_a_folder() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path(), Some(r".*\.txt"))
        .build()?;
    run_in_job(&tasklet)?;

    let base = temp_dir.path();
    assert_eq!(fs::read(base.join("a.txt"))?, UNIX);
    assert_eq!(fs::read(base.join("b.txt"))?, UNIX);
    assert_eq!(fs::read(base.join("c.log"))?, DOS);
    assert_eq!(fs::read(base.join("nested/d.txt"))?, DOS);
    assert_eq!(fs::read(base.join("nested/e.txt"))?, UNIX);

    let report = tasklet.last_report().expect("report after run");
    assert_eq!(report.processed, 2);
    assert_eq!(report.errors, 0);
    assert!(report.success);
    assert!(report.result_files.is_empty());
    Ok(())
}

#[test]
fn subfolders_are_converted_when_requested() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path(), Some(r".*\.txt"))
        .include_subfolders(true)
        .result_filenames(ResultFilenames::ProcessedOnly)
        .build()?;
    let report = tasklet.run()?;

    let base = temp_dir.path();
    assert_eq!(report.processed, 4);
    assert_eq!(
        report.result_files,
        vec![
            base.join("a.txt"),
            base.join("b.txt"),
            base.join("nested").join("d.txt"),
            base.join("nested").join("e.txt"),
        ]
    );
    assert_eq!(fs::read(base.join("nested/d.txt"))?, UNIX);
    // Guess mode turns the UNIX file into a DOS one.
    assert_eq!(fs::read(base.join("nested/e.txt"))?, DOS);
    Ok(())
}

#[test]
fn each_source_uses_its_own_mode() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    let base = temp_dir.path();
    write_files(
        base,
        &[
            ("inbound/x.csv", b"1\r\n2\n"),
            ("outbound/y.csv", b"1\r\n2\n"),
            ("single.dat", b"1\r\n2\n"),
        ],
    )?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source_with_mode(base.join("inbound"), None::<&str>, ConversionMode::DosToUnix)
        .source_with_mode(base.join("outbound"), None::<&str>, ConversionMode::UnixToDos)
        .source_with_mode(base.join("single.dat"), Some(r".*\.csv"), ConversionMode::DosToUnix)
        .build()?;
    let report = tasklet.run()?;

    assert_eq!(report.processed, 3);
    assert_eq!(fs::read(base.join("inbound/x.csv"))?, b"1\n2\n");
    assert_eq!(fs::read(base.join("outbound/y.csv"))?, b"1\r\n2\r\n");
    assert_eq!(fs::read(base.join("single.dat"))?, b"1\n2\n");
    Ok(())
}

#[test]
fn missing_source_fails_the_step() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path().join("does-not-exist"), None::<&str>)
        .source(temp_dir.path(), Some(r"a\.txt"))
        .stop_on_broken_condition(false)
        .build()?;

    let step = StepBuilder::new("convert").tasklet(&tasklet).build();
    let mut step_execution = StepExecution::new(step.get_name());
    let result = step.execute(&mut step_execution);

    assert!(matches!(result, Err(BatchError::Tasklet(_))));
    assert_eq!(step_execution.status, StepStatus::Failed);

    let report = tasklet.last_report().expect("report after run");
    assert_eq!(report.errors, 1);
    assert_eq!(report.error_files, 0);
    assert_eq!(report.processed, 1);
    assert!(!report.success);
    assert_eq!(fs::read(temp_dir.path().join("a.txt"))?, UNIX);
    Ok(())
}

#[test]
fn missing_source_is_tolerated_by_error_files_condition() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path().join("does-not-exist"), None::<&str>)
        .source(temp_dir.path(), Some(r"a\.txt"))
        .success_condition(SuccessCondition::ErrorFilesBelow(1))
        .build()?;

    run_in_job(&tasklet)?;
    let report = tasklet.last_report().expect("report after run");
    assert_eq!(report.errors, 1);
    assert!(report.success);
    Ok(())
}

#[test]
fn first_error_stops_the_run_with_no_errors_condition() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    let tasklet = tasklet_with_ghost(temp_dir.path(), SuccessCondition::NoErrors, true)?;

    let report = tasklet.run()?;

    assert_eq!(
        report,
        ConversionReport {
            processed: 1,
            error_files: 1,
            errors: 1,
            result_files: vec![
                temp_dir.path().join("a.txt"),
                temp_dir.path().join("ghost.txt")
            ],
            success: false,
            aborted: true,
        }
    );
    assert_eq!(fs::read(temp_dir.path().join("a.txt"))?, UNIX);
    assert_eq!(fs::read(temp_dir.path().join("c.txt"))?, DOS);
    Ok(())
}

#[test]
fn run_continues_when_early_stop_is_disabled() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let tasklet = tasklet_with_ghost(temp_dir.path(), SuccessCondition::NoErrors, false)?;

    let report = tasklet.run()?;

    assert_eq!(report.processed, 2);
    assert_eq!(report.error_files, 1);
    assert!(!report.aborted);
    assert!(!report.success);
    assert_eq!(fs::read(temp_dir.path().join("c.txt"))?, UNIX);
    Ok(())
}

#[test]
fn error_files_below_tolerates_some_failures() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let tasklet = tasklet_with_ghost(temp_dir.path(), SuccessCondition::ErrorFilesBelow(2), true)?;

    run_in_job(&tasklet)?;

    let report = tasklet.last_report().expect("report after run");
    assert_eq!(report.processed, 2);
    assert_eq!(report.error_files, 1);
    assert!(report.success);
    assert!(!report.aborted);
    Ok(())
}

#[test]
fn errors_only_reports_failed_files() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_files(temp_dir.path(), &[("a.txt", DOS), ("b.txt", DOS)])?;

    // A configured temporary directory that does not exist fails every file.
    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path(), None::<&str>)
        .temp_directory(temp_dir.path().join("no-such-dir"))
        .success_condition(SuccessCondition::Always)
        .result_filenames(ResultFilenames::ErrorsOnly)
        .build()?;
    let report = tasklet.run()?;

    assert_eq!(report.processed, 0);
    assert_eq!(report.error_files, 2);
    assert!(report.success);
    assert_eq!(
        report.result_files,
        vec![temp_dir.path().join("a.txt"), temp_dir.path().join("b.txt")]
    );
    assert_eq!(fs::read(temp_dir.path().join("a.txt"))?, DOS);
    Ok(())
}

#[test]
fn at_least_processed_fails_the_job_when_too_few_files() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path(), Some(r".*\.txt"))
        .success_condition(SuccessCondition::AtLeastProcessed(3))
        .build()?;

    let result = run_in_job(&tasklet);

    match result {
        Err(BatchError::Step(message)) => assert!(message.contains("at least 3 files processed")),
        other => panic!("unexpected result: {:?}", other),
    }
    // The files were still converted.
    assert_eq!(fs::read(temp_dir.path().join("a.txt"))?, UNIX);
    Ok(())
}

#[test]
fn cancellation_aborts_the_run() -> Result<()> {
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;
    let cancel = Arc::new(AtomicBool::new(false));

    let tasklet = DosToUnixTaskletBuilder::new()
        .source(temp_dir.path(), None::<&str>)
        .success_condition(SuccessCondition::Always)
        .cancel_flag(Arc::clone(&cancel))
        .build()?;

    cancel.store(true, Ordering::Relaxed);
    let result = tasklet.run();

    assert!(matches!(
        result,
        Err(BatchError::Conversion(ConversionError::Cancelled { .. }))
    ));
    assert_eq!(fs::read(temp_dir.path().join("a.txt"))?, DOS);
    assert_eq!(
        common::entry_names(temp_dir.path())?,
        vec!["a.txt", "b.txt", "c.log", "nested"]
    );
    Ok(())
}

#[test]
fn json_configuration_drives_the_run() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;

    let json = serde_json::json!({
        "sources": [
            { "path": temp_dir.path(), "wildcard": r".*\.log", "mode": "dostounix" },
            { "path": temp_dir.path().join("nested"), "wildcard": r"e\.txt", "mode": "unixtodos" }
        ],
        "success_condition": { "type": "at_least_processed", "limit": 2 },
        "result_filenames": "all",
        "buffer_size": 3
    })
    .to_string();

    let config = DosToUnixConfig::from_json(&json)?;
    let tasklet = DosToUnixTaskletBuilder::from_config(config).build()?;
    run_in_job(&tasklet)?;

    let base = temp_dir.path();
    assert_eq!(fs::read(base.join("c.log"))?, UNIX);
    assert_eq!(fs::read(base.join("nested/e.txt"))?, DOS);
    assert_eq!(fs::read(base.join("a.txt"))?, DOS);

    let report = tasklet.last_report().expect("report after run");
    assert_eq!(
        report.result_files,
        vec![base.join("c.log"), base.join("nested").join("e.txt")]
    );
    Ok(())
}

#[test]
fn next_step_converts_files_published_by_previous_step() -> Result<()> {
    init_logger();
    let temp_dir = TempDir::new()?;
    create_inbound(temp_dir.path())?;
    let base = temp_dir.path();

    let to_unix = DosToUnixTaskletBuilder::new()
        .source_with_mode(base, Some(r"[ab]\.txt"), ConversionMode::DosToUnix)
        .result_filenames(ResultFilenames::ProcessedOnly)
        .build()?;
    let back_to_dos = DosToUnixTaskletBuilder::new()
        .sources_from_previous(true)
        .previous_mode(ConversionMode::UnixToDos)
        .build()?;

    let first = StepBuilder::new("to-unix").tasklet(&to_unix).build();
    let second = StepBuilder::new("back-to-dos").tasklet(&back_to_dos).build();
    let execution = JobBuilder::new().start(&first).next(&second).build().run()?;

    let published = vec![base.join("a.txt"), base.join("b.txt")];
    assert_eq!(execution.step_executions[0].result_files, published);
    assert_eq!(execution.step_executions[1].previous_result_files, published);
    assert_eq!(execution.result_files, published);

    let report = back_to_dos.last_report().expect("report after run");
    assert_eq!(report.processed, 2);
    assert_eq!(fs::read(base.join("a.txt"))?, DOS);
    assert_eq!(fs::read(base.join("b.txt"))?, DOS);
    assert_eq!(fs::read(base.join("c.log"))?, DOS);
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlinked_file_source_converts_the_target() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let target = temp_dir.path().join("target.txt");
    let link = temp_dir.path().join("link.txt");
    fs::write(&target, DOS)?;
    std::os::unix::fs::symlink(&target, &link)?;

    let tasklet = DosToUnixTaskletBuilder::new()
        .source_with_mode(&link, None::<&str>, ConversionMode::DosToUnix)
        .build()?;
    run_in_job(&tasklet)?;

    assert!(fs::symlink_metadata(&link)?.file_type().is_symlink());
    assert_eq!(fs::read(&target)?, UNIX);
    Ok(())
}
