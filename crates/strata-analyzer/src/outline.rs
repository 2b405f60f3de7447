use serde::Serialize;
use std::mem::size_of;
use strata_cache::SizeEstimable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Struct,
    /// A CSS rule, keyed by its selector.
    Rule,
    Heading,
    Key,
    Element,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutlineSymbol {
    pub kind: SymbolKind,
    pub name: String,
    /// 1-based.
    pub line: usize,
}

/// The cached structural representation of one file: a flat list of named
/// declarations plus a few size counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralOutline {
    pub language: String,
    pub parser: String,
    pub symbols: Vec<OutlineSymbol>,
    pub line_count: usize,
    pub token_count: usize,
}

impl StructuralOutline {
    pub(crate) fn new(
        language: &str,
        parser: &str,
        content: &str,
        mut symbols: Vec<OutlineSymbol>,
    ) -> Self {
        symbols.sort_by_key(|symbol| symbol.line);
        Self {
            language: language.to_owned(),
            parser: parser.to_owned(),
            symbols,
            line_count: content.lines().count(),
            token_count: content.split_whitespace().count(),
        }
    }

    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(|symbol| symbol.name.as_str())
    }
}

impl SizeEstimable for OutlineSymbol {
    fn estimated_size_bytes(&self) -> u64 {
        (size_of::<Self>() + self.name.capacity()) as u64
    }
}

impl SizeEstimable for StructuralOutline {
    fn estimated_size_bytes(&self) -> u64 {
        (2 * size_of::<usize>()) as u64
            + self.language.estimated_size_bytes()
            + self.parser.estimated_size_bytes()
            + self.symbols.estimated_size_bytes()
    }
}

/// How an outline was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildMode {
    Full,
    /// Symbols re-extracted only on changed lines and spliced into the
    /// previous outline.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct BuildError {
    pub line: usize,
    pub message: String,
}

impl BuildError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}
