//! Repository identity, analysis documents, and the result cache

pub mod analysis;
pub mod cache;
pub mod id;

pub use analysis::{
    CodeQuality, Complexity, FileStats, ModelAnalysis, RepoMetadata, RepositoryAnalysis,
    SkillLevel, StructureAnalysis, TechCategory, TechStackItem,
};
pub use cache::RepositoryCache;
pub use id::{normalize_repo_url, repo_id};
