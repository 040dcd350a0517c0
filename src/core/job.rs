use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{error, info};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    step::{Step, StepExecution},
};

/// Type alias for job execution results.
///
/// A `JobResult` is a `Result` that contains either:
/// - A successful `JobExecution` with execution details
/// - A `BatchError` indicating what went wrong
type JobResult<T> = Result<T, BatchError>;

/// Represents a job that can be executed.
///
/// A job is a container for a sequence of steps that are executed in order.
/// The job is responsible for orchestrating the steps and reporting the
/// overall result.
///
/// # Example Usage
///
/// ```rust
/// use eol_batch_rs::core::job::{Job, JobBuilder};
/// use eol_batch_rs::core::step::StepBuilder;
/// use eol_batch_rs::tasklet::dos_to_unix::DosToUnixTaskletBuilder;
///
/// # fn example() -> Result<(), eol_batch_rs::BatchError> {
/// let tasklet = DosToUnixTaskletBuilder::new()
///     .source("./exports", Some(r".*\.csv"))
///     .build()?;
///
/// let step = StepBuilder::new("normalize-exports").tasklet(&tasklet).build();
///
/// let job = JobBuilder::new()
///     .name("nightly-export".to_string())
///     .start(&step)
///     .build();
///
/// let result = job.run()?;
/// # Ok(())
/// # }
/// ```
pub trait Job {
    /// Runs the job and returns the result of the job execution.
    ///
    /// # Returns
    /// - `Ok(JobExecution)` when the job executes successfully
    /// - `Err(BatchError)` when the job execution fails
    fn run(&self) -> JobResult<JobExecution>;
}

/// Represents the execution of a job.
///
/// A `JobExecution` contains timing information about a job run and the
/// execution details of each of its steps.
#[derive(Debug)]
pub struct JobExecution {
    /// The time when the job started executing
    pub start: Instant,
    /// The time when the job finished executing
    pub end: Instant,
    /// The total duration of the job execution
    pub duration: Duration,
    /// Executions of the steps, in order
    pub step_executions: Vec<StepExecution>,
    /// Result files published by all steps, in order
    pub result_files: Vec<PathBuf>,
}

/// Represents an instance of a job.
///
/// A job instance is created through the `JobBuilder` and executed by calling
/// the `run` method. The steps are executed in the order they were added.
pub struct JobInstance<'a> {
    /// Unique identifier for this job instance
    id: Uuid,
    /// Human-readable name for the job
    name: String,
    /// Collection of steps that make up this job, in execution order
    steps: Vec<&'a dyn Step>,
}

impl JobInstance<'_> {
    pub fn get_name(&self) -> &str {
        &self.name
    }
}

impl Job for JobInstance<'_> {
    /// Runs the job by executing its steps in sequence.
    ///
    /// Each step sees the result files published by the steps before it. The
    /// first failing step aborts the job with a [`BatchError::Step`].
    fn run(&self) -> JobResult<JobExecution> {
        let start = Instant::now();

        info!("Start of job: {}, id: {}", self.name, self.id);

        let mut step_executions = Vec::with_capacity(self.steps.len());
        let mut result_files = Vec::new();
        for step in &self.steps {
            let mut step_execution = StepExecution::new(step.get_name());
            step_execution.previous_result_files = result_files.clone();

            if let Err(err) = step.execute(&mut step_execution) {
                error!(
                    "Job {} aborted, step {} failed: {}",
                    self.name,
                    step.get_name(),
                    err
                );
                return Err(BatchError::Step(format!("{}: {}", step.get_name(), err)));
            }

            result_files.extend(step_execution.result_files.iter().cloned());
            step_executions.push(step_execution);
        }

        info!("End of job: {}, id: {}", self.name, self.id);

        Ok(JobExecution {
            start,
            end: Instant::now(),
            duration: start.elapsed(),
            step_executions,
            result_files,
        })
    }
}

/// Builder for creating a job instance.
///
/// ```rust,ignore
/// let job = JobBuilder::new()
///     .name("normalize-line-endings".to_string())
///     .start(&inbound_step)
///     .next(&outbound_step)
///     .build();
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    /// Optional name for the job (generated randomly if not specified)
    name: Option<String>,
    /// Collection of steps to be executed, in order
    steps: Vec<&'a dyn Step>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
        }
    }

    pub fn name(mut self, name: String) -> JobBuilder<'a> {
        self.name = Some(name);
        self
    }

    /// Sets the first step of the job.
    ///
    /// This method is semantically identical to `next()` but provides better readability
    /// when constructing the initial step of a job.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Adds a step to the job. Steps are executed in the order they are added.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Builds a `JobInstance`. If no name has been provided, a random name is
    /// generated.
    pub fn build(self) -> JobInstance<'a> {
        JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
        }
    }
}
