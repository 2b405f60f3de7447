/// Line-comment markers per language.
fn comment_prefixes(language: &str) -> &'static [&'static str] {
    match language {
        "python" | "ruby" | "r" | "yaml" | "toml" | "shell" => &["#"],
        "javascript" | "typescript" | "java" | "csharp" | "kotlin" | "scala" | "swift" => {
            &["//", "/*", "*/", "*"]
        }
        // `*` starts dereferences here, not just doc-comment continuations.
        "go" | "rust" | "c" | "cpp" => &["//", "/*", "*/"],
        "php" => &["//", "#", "/*", "*/", "*"],
        "css" | "scss" => &["/*", "*/", "*", "//"],
        "sql" => &["--"],
        "html" | "vue" | "svelte" | "markdown" | "xml" => &["<!--"],
        _ => &[],
    }
}

/// Canonical form of a line for whitespace comparison: trimmed, with blank
/// or comment-only lines mapped to the empty string. Inner whitespace is kept
/// as-is, since it may sit inside a string literal.
pub fn normalize_line(line: &str, language: &str) -> String {
    let trimmed = line.trim();
    if trimmed.is_empty()
        || comment_prefixes(language)
            .iter()
            .any(|prefix| trimmed.starts_with(prefix))
    {
        return String::new();
    }
    trimmed.to_owned()
}

/// Normalized, non-empty lines of `lines` in order.
pub(crate) fn significant_lines<'a, I>(lines: I, language: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .map(|line| normalize_line(line, language))
        .filter(|line| !line.is_empty())
        .collect()
}
