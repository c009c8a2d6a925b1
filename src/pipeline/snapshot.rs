//! Repository snapshot for model analysis
//!
//! Walks a cloned working tree and collects a bounded sample of textual
//! files plus the README. The model does the actual analysis; the snapshot
//! only has to be representative and small enough to prompt with.

use crate::pipeline::error::{PipelineError, PipelineResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Directories that never contribute source worth analyzing
const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "target",
    ".next",
    ".cache",
    "coverage",
    ".vscode",
    ".idea",
    "vendor",
];

/// Upper bound on files carried into the snapshot
const MAX_FILES: usize = 200;
/// Files larger than this are listed but not sampled
const MAX_FILE_BYTES: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to the repository root
    pub path: String,
    pub content: String,
    pub size: u64,
    pub lines: usize,
}

#[derive(Debug, Clone)]
pub struct RepoSnapshot {
    pub files: Vec<FileEntry>,
    pub readme: Option<String>,
    /// Count before sampling caps applied
    pub total_files: usize,
}

/// Build a snapshot from a cloned repository directory
///
/// Binary and oversized files are skipped silently; the walk is blocking
/// and belongs inside `spawn_blocking`.
pub fn build_snapshot(root: &Path) -> PipelineResult<RepoSnapshot> {
    let mut files = Vec::new();
    let mut total_files = 0usize;
    walk(root, root, &mut files, &mut total_files)?;

    let readme = files
        .iter()
        .find(|f| {
            matches!(
                f.path.to_lowercase().as_str(),
                "readme.md" | "readme.rst" | "readme.txt" | "readme"
            )
        })
        .map(|f| f.content.clone());

    Ok(RepoSnapshot {
        files,
        readme,
        total_files,
    })
}

fn walk(
    root: &Path,
    dir: &Path,
    files: &mut Vec<FileEntry>,
    total_files: &mut usize,
) -> PipelineResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::Io {
        message: format!("Failed to read directory {}: {}", dir.display(), e),
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();

    for path in paths {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if path.is_dir() {
            if SKIPPED_DIRS.contains(&file_name.as_str()) {
                continue;
            }
            walk(root, &path, files, total_files)?;
        } else if path.is_file() {
            *total_files += 1;
            if files.len() >= MAX_FILES {
                continue;
            }

            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(_) => continue,
            };
            if size > MAX_FILE_BYTES {
                continue;
            }

            // Non-UTF8 content marks a binary file; skip it.
            let content = match fs::read(&path).ok().and_then(|b| String::from_utf8(b).ok()) {
                Some(content) => content,
                None => continue,
            };

            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .replace('\\', "/");
            let lines = content.lines().count();
            files.push(FileEntry {
                path: relative,
                content,
                size,
                lines,
            });
        }
    }

    Ok(())
}
