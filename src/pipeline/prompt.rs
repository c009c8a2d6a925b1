//! Analysis prompt assembly
//!
//! Builds the single prompt sent to the language model. The exact wording
//! is not contractual; the JSON shape requested here must stay in sync with
//! `repo::analysis::ModelAnalysis`.

use crate::pipeline::git::CloneInfo;
use crate::pipeline::snapshot::RepoSnapshot;

/// Cap on README characters included in the prompt
const README_EXCERPT_CHARS: usize = 4_000;
/// Cap on sampled file content characters across the whole prompt
const CONTENT_BUDGET_CHARS: usize = 60_000;

pub fn build_analysis_prompt(info: &CloneInfo, snapshot: &RepoSnapshot) -> String {
    let mut prompt = String::with_capacity(CONTENT_BUDGET_CHARS / 2);

    prompt.push_str(
        "You are a senior engineer reviewing a repository. Analyze it and respond with \
         ONLY a JSON object (no markdown fences, no commentary) with these fields:\n\
         description (string, <=2000 chars), techStack (array of {name, category: \
         language|framework|library|tool|platform|database|other, version?, confidence?}), \
         primaryLanguage (string|null), skillLevel (beginner|junior|mid-level|senior), \
         skillLevelRationale (string), fileStats ({total_files, total_lines?, \
         language_breakdown?}), structure ({has_tests, has_ci, has_documentation, \
         has_license, package_managers, build_tools, dockerized, monorepo}), \
         codeQuality ({score?, issues, strengths}), complexity ({score?, factors}).\n\n",
    );

    prompt.push_str(&format!(
        "Repository: {} (branch {}, {} files)\n\n",
        info.full_name(),
        info.branch,
        snapshot.total_files
    ));

    if let Some(readme) = &snapshot.readme {
        prompt.push_str("README excerpt:\n");
        prompt.push_str(truncate(readme, README_EXCERPT_CHARS));
        prompt.push_str("\n\n");
    }

    prompt.push_str("File tree:\n");
    for file in &snapshot.files {
        prompt.push_str(&format!("  {} ({} lines)\n", file.path, file.lines));
    }
    prompt.push('\n');

    let mut budget = CONTENT_BUDGET_CHARS;
    for file in &snapshot.files {
        if budget == 0 {
            break;
        }
        let excerpt = truncate(&file.content, budget.min(8_000));
        budget = budget.saturating_sub(excerpt.len());
        prompt.push_str(&format!("--- {} ---\n{}\n", file.path, excerpt));
    }

    prompt
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
