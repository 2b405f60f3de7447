use std::path::Path;

/// Extension to language name. Files whose extension is absent here are not
/// analyzed.
const LANGUAGES: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("vue", "vue"),
    ("svelte", "svelte"),
    ("css", "css"),
    ("scss", "scss"),
    ("html", "html"),
    ("java", "java"),
    ("go", "go"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("php", "php"),
    ("cs", "csharp"),
    ("kt", "kotlin"),
    ("scala", "scala"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("h", "c"),
    ("sql", "sql"),
    ("ipynb", "jupyter"),
    ("r", "r"),
    ("csv", "csv"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("md", "markdown"),
    ("rst", "rst"),
    ("txt", "text"),
];

/// Lowercased extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn language_for_extension(extension: &str) -> Option<&'static str> {
    let extension = extension.trim_start_matches('.');
    LANGUAGES
        .iter()
        .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
        .map(|(_, language)| *language)
}

pub fn detect_language(path: &Path) -> Option<&'static str> {
    language_for_extension(&extension_of(path)?)
}
