//! StepsOS LLM - narration of step outcomes
//!
//! The narration collaborator is optional: [`NarrationService`] uses a remote
//! provider when one is configured and otherwise, or when the call fails,
//! answers with [`LocalNarrator`]'s deterministic summaries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod groq;
pub mod local;
pub mod narrator;
pub mod prompts;
pub mod service;

pub use error::{Error, Result};
pub use groq::{GroqConfig, GroqNarrator};
pub use local::LocalNarrator;
pub use narrator::{ExecutionNarration, Narrator, StepNarration};
pub use service::{NarrationService, NarrationSettings};
