//! Analysis Pipeline
//!
//! Orchestrates clone → snapshot → prompt → model call → result assembly
//! for one scan, with a cache short-circuit keyed by repository identity
//! and commit SHA. The Git source and the language model are external
//! collaborators behind async traits; the pipeline itself never observes
//! cancellation; it runs to completion or failure and the scan driver
//! decides whether to keep the outcome.

pub mod analyzer;
pub mod error;
pub mod git;
pub mod llm;
pub mod prompt;
pub mod snapshot;

pub use analyzer::{AnalysisPipeline, PipelineOutcome};
pub use error::{PipelineError, PipelineResult};
pub use git::{parse_remote_url, CloneInfo, GitCli, GitSource, ProviderMetadata};
pub use llm::{GeminiClient, LanguageModel};
pub use snapshot::{FileEntry, RepoSnapshot};
