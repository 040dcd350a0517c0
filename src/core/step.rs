use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{error, info};
use uuid::Uuid;

use crate::BatchError;

/// Status of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The step has been created but not started yet
    Starting,
    /// The step is running
    Started,
    /// The step completed successfully
    Success,
    /// The step failed
    Failed,
}

/// Tells a [`TaskletStep`] whether its tasklet must be called again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatStatus {
    /// The tasklet has more work to do.
    Continuable,
    /// The tasklet has finished executing.
    Finished,
}

/// Runtime information about one execution of a step.
#[derive(Debug, Clone)]
pub struct StepExecution {
    /// Unique identifier for this step execution
    pub id: Uuid,
    /// Human-readable name for the step
    pub name: String,
    /// Current status of the step execution
    pub status: StepStatus,
    pub start_time: Instant,
    pub end_time: Instant,
    pub duration: Duration,
    /// Number of times the tasklet was called
    pub iterations: usize,
    /// Result files published by the steps run before this one
    pub previous_result_files: Vec<PathBuf>,
    /// Result files published by this step
    pub result_files: Vec<PathBuf>,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: StepStatus::Starting,
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            iterations: 0,
            previous_result_files: Vec::new(),
            result_files: Vec::new(),
        }
    }
}

/// A phase of a job.
pub trait Step {
    fn get_name(&self) -> &str;

    /// Executes the step.
    ///
    /// # Returns
    /// - `Ok(())`: The step completed successfully
    /// - `Err(BatchError)`: The step failed
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError>;
}

/// A single unit of work run by a [`TaskletStep`].
///
/// The step calls [`Tasklet::execute`] until it returns
/// [`RepeatStatus::Finished`] or an error.
pub trait Tasklet {
    fn execute(&self, step_execution: &StepExecution) -> Result<RepeatStatus, BatchError>;

    /// Files handed to the next steps once the tasklet has finished.
    fn result_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A step running a [`Tasklet`].
pub struct TaskletStep<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
}

impl Step for TaskletStep<'_> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError> {
        let start_time = Instant::now();
        step_execution.start_time = start_time;
        step_execution.status = StepStatus::Started;

        info!(
            "Start of step: {}, id: {}",
            step_execution.name, step_execution.id
        );

        let result = loop {
            step_execution.iterations += 1;
            match self.tasklet.execute(step_execution) {
                Ok(RepeatStatus::Continuable) => continue,
                Ok(RepeatStatus::Finished) => break Ok(()),
                Err(error) => break Err(error),
            }
        };

        step_execution.end_time = Instant::now();
        step_execution.duration = start_time.elapsed();

        match result {
            Ok(()) => {
                step_execution.status = StepStatus::Success;
                step_execution.result_files = self.tasklet.result_files();
                info!(
                    "End of step: {}, id: {}",
                    step_execution.name, step_execution.id
                );
                Ok(())
            }
            Err(error) => {
                step_execution.status = StepStatus::Failed;
                error!(
                    "Step {} (id: {}) failed: {}",
                    step_execution.name, step_execution.id, error
                );
                Err(error)
            }
        }
    }
}

pub struct TaskletBuilder<'a> {
    name: String,
    tasklet: &'a dyn Tasklet,
}

impl<'a> TaskletBuilder<'a> {
    fn new(name: String, tasklet: &'a dyn Tasklet) -> Self {
        Self { name, tasklet }
    }

    pub fn build(self) -> TaskletStep<'a> {
        TaskletStep {
            name: self.name,
            tasklet: self.tasklet,
        }
    }
}

/// Entry point for building steps.
///
/// ```rust
/// use eol_batch_rs::core::step::{RepeatStatus, Step, StepBuilder, StepExecution, StepStatus, Tasklet};
/// use eol_batch_rs::BatchError;
///
/// struct Noop;
///
/// impl Tasklet for Noop {
///     fn execute(&self, _step_execution: &StepExecution) -> Result<RepeatStatus, BatchError> {
///         Ok(RepeatStatus::Finished)
///     }
/// }
///
/// let step = StepBuilder::new("noop").tasklet(&Noop).build();
/// let mut step_execution = StepExecution::new(step.get_name());
/// step.execute(&mut step_execution).unwrap();
/// assert_eq!(step_execution.status, StepStatus::Success);
/// ```
pub struct StepBuilder {
    name: String,
}

impl StepBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn tasklet<'a>(self, tasklet: &'a dyn Tasklet) -> TaskletBuilder<'a> {
        TaskletBuilder::new(self.name, tasklet)
    }
}
