//! Queue processing for the inbox engine.
//!
//! - Claim manager (Pending -> Processing via compare-and-swap)
//! - Pipeline executor (resolve, extract, analyze, materialize)
//! - Status resolver (outcome write and sender reply)
//! - Recovery (stale claims, manual retry)
//! - Scheduler (interval-driven runs)

pub mod claim;
pub mod config;
pub mod executor;
pub mod processor;
pub mod recovery;
pub mod resolver;
pub mod scheduler;
pub mod stages;

#[cfg(test)]
pub(crate) mod testing;

pub use claim::ClaimManager;
pub use config::ProcessorConfig;
pub use executor::PipelineExecutor;
pub use processor::{Processor, RunSummary};
pub use recovery::{Recovery, RecoveryReport};
pub use resolver::StatusResolver;
pub use scheduler::*;
pub use stages::{Collaborators, PartialNote, PipelineSettings, Stage, StageError};
