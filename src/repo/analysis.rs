//! Persisted repository analysis documents
//!
//! `RepositoryAnalysis` is the cache payload: the model's structured output
//! plus provider metadata and cache bookkeeping. `ModelAnalysis` is the
//! subset the language model itself returns; both are schema-validated at
//! the serde boundary before any field is trusted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-side repository metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub url: String,
    pub owner: String,
    pub name: String,
    /// e.g. "rust-lang/rust"
    pub full_name: String,
    pub provider: String,
    pub branch: String,
    pub commit_sha: Option<String>,
    pub stars: Option<i64>,
    pub forks: Option<i64>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// One detected technology
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechStackItem {
    pub name: String,
    pub category: TechCategory,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub confidence: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechCategory {
    Language,
    Framework,
    Library,
    Tool,
    Platform,
    Database,
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStats {
    pub total_files: u64,
    #[serde(default)]
    pub total_lines: Option<u64>,
    #[serde(default)]
    pub language_breakdown: Option<std::collections::HashMap<String, u64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub has_tests: bool,
    pub has_ci: bool,
    pub has_documentation: bool,
    pub has_license: bool,
    #[serde(default)]
    pub package_managers: Vec<String>,
    #[serde(default)]
    pub build_tools: Vec<String>,
    #[serde(default)]
    pub dockerized: bool,
    #[serde(default)]
    pub monorepo: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeQuality {
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Complexity {
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub factors: Vec<String>,
}

/// Assessed skill level required to work on the repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillLevel {
    #[serde(rename = "beginner")]
    Beginner,
    #[serde(rename = "junior")]
    Junior,
    #[serde(rename = "mid-level")]
    MidLevel,
    #[serde(rename = "senior")]
    Senior,
}

/// The structured document the language model returns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAnalysis {
    pub description: String,
    pub tech_stack: Vec<TechStackItem>,
    #[serde(default)]
    pub primary_language: Option<String>,
    pub skill_level: SkillLevel,
    #[serde(default)]
    pub skill_level_rationale: Option<String>,
    #[serde(default)]
    pub file_stats: Option<FileStats>,
    #[serde(default)]
    pub structure: Option<StructureAnalysis>,
    #[serde(default)]
    pub code_quality: Option<CodeQuality>,
    #[serde(default)]
    pub complexity: Option<Complexity>,
}

/// Cached analysis for one repository, keyed by repo id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
    pub repo_id: String,
    pub metadata: RepoMetadata,

    pub description: String,
    pub tech_stack: Vec<TechStackItem>,
    pub primary_language: Option<String>,
    pub skill_level: SkillLevel,
    pub skill_level_rationale: Option<String>,
    pub file_stats: Option<FileStats>,
    pub structure: Option<StructureAnalysis>,
    pub code_quality: Option<CodeQuality>,
    pub complexity: Option<Complexity>,

    /// Model that produced the analysis
    pub ai_model: Option<String>,
    /// Commit the analysis was computed from; cache hits compare against it
    pub analyzed_commit: Option<String>,
    /// Total scans ever resolved against this repository
    pub total_scans: u64,
    pub last_scanned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RepositoryAnalysis {
    /// Assemble a fresh analysis document from the model output
    pub fn from_model(
        repo_id: String,
        metadata: RepoMetadata,
        model: ModelAnalysis,
        ai_model: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let analyzed_commit = metadata.commit_sha.clone();
        Self {
            repo_id,
            metadata,
            description: model.description,
            tech_stack: model.tech_stack,
            primary_language: model.primary_language,
            skill_level: model.skill_level,
            skill_level_rationale: model.skill_level_rationale,
            file_stats: model.file_stats,
            structure: model.structure,
            code_quality: model.code_quality,
            complexity: model.complexity,
            ai_model: Some(ai_model.to_string()),
            analyzed_commit,
            total_scans: 1,
            last_scanned_at: now,
            created_at: now,
        }
    }
}
