use crate::language::{detect_language, extension_of};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file selected for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProjectFile {
    /// `/`-separated path relative to the project root; the cache key.
    pub relative: String,
    pub path: PathBuf,
    pub language: &'static str,
    pub extension: String,
    /// `0` when metadata could not be read; the read itself reports the error.
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Selection<'a> {
    pub ignore_dirs: &'a [String],
    pub files: Option<&'a [PathBuf]>,
    pub language: Option<&'a str>,
    pub max_files: Option<usize>,
}

/// List analyzable files under `root` in sorted relative-path order.
///
/// With an explicit file list only those files are considered, and missing
/// ones are still returned so that the read reports them. Files in a language
/// the analyzer does not know are skipped either way.
pub(crate) fn enumerate(root: &Path, selection: &Selection<'_>) -> Vec<ProjectFile> {
    let mut files: Vec<ProjectFile> = match selection.files {
        Some(explicit) => explicit
            .iter()
            .map(|path| if path.is_absolute() { path.clone() } else { root.join(path) })
            .filter_map(|path| project_file(root, path))
            .collect(),
        None => walk(root, selection.ignore_dirs),
    };

    if let Some(language) = selection.language {
        files.retain(|file| file.language.eq_ignore_ascii_case(language));
    }
    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    files.dedup_by(|a, b| a.relative == b.relative);
    if let Some(max) = selection.max_files {
        files.truncate(max);
    }
    files
}

fn walk(root: &Path, ignore_dirs: &[String]) -> Vec<ProjectFile> {
    let ignored: BTreeSet<&str> = ignore_dirs.iter().map(String::as_str).collect();
    let mut files = Vec::new();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || entry
                .file_name()
                .to_str()
                .map_or(true, |name| !ignored.contains(name))
    });
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(
                    target: "strata.analyzer",
                    root = %root.display(),
                    error = %err,
                    "skipping unreadable directory entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(file) = project_file(root, entry.into_path()) {
            files.push(file);
        }
    }
    files
}

fn project_file(root: &Path, path: PathBuf) -> Option<ProjectFile> {
    let language = detect_language(&path)?;
    let extension = extension_of(&path)?;
    let relative = path
        .strip_prefix(root)
        .unwrap_or(&path)
        .to_string_lossy()
        .replace('\\', "/");
    let size_bytes = std::fs::metadata(&path).map_or(0, |meta| meta.len());
    Some(ProjectFile {
        relative,
        path,
        language,
        extension,
        size_bytes,
    })
}

/// Extension histogram and total size of a file selection.
pub(crate) fn file_stats(files: &[ProjectFile]) -> (BTreeMap<String, u64>, u64) {
    let mut stats = BTreeMap::new();
    let mut total = 0u64;
    for file in files {
        *stats.entry(file.extension.clone()).or_insert(0) += 1;
        total = total.saturating_add(file.size_bytes);
    }
    (stats, total)
}
