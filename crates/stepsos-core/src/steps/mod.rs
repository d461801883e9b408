//! The closed set of pipeline steps.
//!
//! Each variant has a typed output contract and is dispatched through
//! [`Step::run`]. A [`Pipeline`] is the ordered list the runner walks.

pub mod entry;
pub mod process;
pub mod validate;

pub use entry::{EntryStep, NormalizedUpload};
pub use process::{ProcessStep, ProcessedArtifact, ProcessingResult};
pub use validate::{ValidateStep, ValidatedUpload, ValidationMarker, DEFAULT_ALLOWED_FILE_TYPES};

use crate::error::{Error, Result, StepError};
use serde_json::Value;

/// One unit of the pipeline
#[derive(Debug, Clone)]
pub enum Step {
    /// Normalize an arbitrary submission into the canonical upload shape
    Entry(EntryStep),
    /// Enforce field rules on the canonical shape
    Validate(ValidateStep),
    /// Turn a validated upload into an artifact
    Process(ProcessStep),
}

impl Step {
    /// Declared step name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Entry(_) => entry::NAME,
            Self::Validate(_) => validate::NAME,
            Self::Process(_) => process::NAME,
        }
    }

    /// Run the step against the previous step's output
    pub async fn run(&self, input: Value) -> std::result::Result<Value, StepError> {
        match self {
            Self::Entry(step) => to_value(step.run(&input)),
            Self::Validate(step) => to_value(step.run(&input)?),
            Self::Process(step) => to_value(step.run(&input)?),
        }
    }
}

fn to_value<T: serde::Serialize>(output: T) -> std::result::Result<Value, StepError> {
    serde_json::to_value(output)
        .map_err(|e| StepError::Execution(format!("failed to serialize step output: {e}")))
}

/// Ordered list of declared steps
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    /// Pipeline from an explicit step list.
    ///
    /// Step names key the execution record, so each may appear once.
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].iter().any(|s| s.name() == step.name()) {
                return Err(Error::DuplicateStep(step.name().to_string()));
            }
        }
        Ok(Self { steps })
    }

    /// The file upload pipeline: entry, validate, process
    #[must_use]
    pub fn file_upload(allowed_file_types: Vec<String>) -> Self {
        Self {
            steps: vec![
                Step::Entry(EntryStep),
                Step::Validate(ValidateStep::new(allowed_file_types)),
                Step::Process(ProcessStep),
            ],
        }
    }

    /// Steps in declared order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Step names in declared order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.steps.iter().map(Step::name)
    }

    /// Number of declared steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps are declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::file_upload(
            DEFAULT_ALLOWED_FILE_TYPES
                .iter()
                .map(|t| (*t).to_string())
                .collect(),
        )
    }
}
