use crate::outline::{BuildError, BuildMode, OutlineSymbol, StructuralOutline, SymbolKind};
use crate::scan::{scan, ScannedLine, Syntax};
use std::collections::{BTreeMap, BTreeSet};

/// Produces a [`StructuralOutline`] from source text.
///
/// Builders are stand-ins for real grammars: they recognize declarations line
/// by line and reject input that is lexically broken (unbalanced brackets,
/// unterminated literals, malformed block headers).
pub trait StructuralBuilder: Send + Sync {
    /// Name recorded as the artifact's parser.
    fn parser(&self) -> &'static str;

    fn build(&self, language: &str, content: &str) -> Result<StructuralOutline, BuildError>;

    /// Rebuild after an edit, re-extracting only `changed_lines` (1-based)
    /// when the builder supports it.
    fn rebuild(
        &self,
        language: &str,
        content: &str,
        previous: &StructuralOutline,
        changed_lines: &[usize],
    ) -> Result<(StructuralOutline, BuildMode), BuildError> {
        let _ = (previous, changed_lines);
        self.build(language, content)
            .map(|outline| (outline, BuildMode::Full))
    }
}

/// The builder used for `language`.
pub fn builder_for(language: &str) -> &'static dyn StructuralBuilder {
    match language {
        "python" => &IndentOutlineBuilder,
        "javascript" | "typescript" | "java" | "go" | "rust" | "php" | "csharp" | "kotlin"
        | "scala" | "c" | "cpp" | "css" | "scss" => &BraceOutlineBuilder,
        _ => &LineOutlineBuilder,
    }
}

/// Python: `def`/`class` outline.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndentOutlineBuilder;

/// C-family languages and stylesheets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BraceOutlineBuilder;

/// Markup, data and prose. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineOutlineBuilder;

const PYTHON_BLOCK_KEYWORDS: &[&str] = &[
    "def", "class", "if", "elif", "else", "for", "while", "try", "except", "finally", "with",
    "async",
];

impl StructuralBuilder for IndentOutlineBuilder {
    fn parser(&self) -> &'static str {
        "indent-outline"
    }

    fn build(&self, language: &str, content: &str) -> Result<StructuralOutline, BuildError> {
        let scanned = scan(content, Syntax::Hash)?;
        check_block_headers(&scanned)?;
        let symbols = extract(&scanned, |line, line_no| python_symbol(line, line_no), |_| true);
        Ok(StructuralOutline::new(language, self.parser(), content, symbols))
    }

    fn rebuild(
        &self,
        language: &str,
        content: &str,
        previous: &StructuralOutline,
        changed_lines: &[usize],
    ) -> Result<(StructuralOutline, BuildMode), BuildError> {
        let scanned = scan(content, Syntax::Hash)?;
        check_block_headers(&scanned)?;
        Ok(splice_or_build(
            language,
            self.parser(),
            content,
            &scanned,
            previous,
            changed_lines,
            python_symbol,
        ))
    }
}

impl StructuralBuilder for BraceOutlineBuilder {
    fn parser(&self) -> &'static str {
        "brace-outline"
    }

    fn build(&self, language: &str, content: &str) -> Result<StructuralOutline, BuildError> {
        let scanned = scan(content, Syntax::CFamily)?;
        let symbols = extract(
            &scanned,
            |line, line_no| brace_symbol(language, line, line_no),
            |_| true,
        );
        Ok(StructuralOutline::new(language, self.parser(), content, symbols))
    }

    fn rebuild(
        &self,
        language: &str,
        content: &str,
        previous: &StructuralOutline,
        changed_lines: &[usize],
    ) -> Result<(StructuralOutline, BuildMode), BuildError> {
        let scanned = scan(content, Syntax::CFamily)?;
        Ok(splice_or_build(
            language,
            self.parser(),
            content,
            &scanned,
            previous,
            changed_lines,
            |line, line_no| brace_symbol(language, line, line_no),
        ))
    }
}

impl StructuralBuilder for LineOutlineBuilder {
    fn parser(&self) -> &'static str {
        "line-outline"
    }

    fn build(&self, language: &str, content: &str) -> Result<StructuralOutline, BuildError> {
        Ok(StructuralOutline::new(
            language,
            self.parser(),
            content,
            line_symbols(language, content),
        ))
    }
}

fn extract(
    scanned: &[ScannedLine],
    symbol_at: impl Fn(&ScannedLine, usize) -> Option<OutlineSymbol>,
    include: impl Fn(usize) -> bool,
) -> Vec<OutlineSymbol> {
    scanned
        .iter()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line))
        .filter(|(line_no, _)| include(*line_no))
        .filter_map(|(line_no, line)| symbol_at(line, line_no))
        .collect()
}

/// Keep the previous symbols on untouched lines and re-extract the changed
/// ones. The whole file is still scanned, since a local edit can unbalance
/// brackets or open a string anywhere after it. Falls back to a full
/// extraction when the line count changed, or when an untouched line no
/// longer yields the symbol it had before.
fn splice_or_build(
    language: &str,
    parser: &str,
    content: &str,
    scanned: &[ScannedLine],
    previous: &StructuralOutline,
    changed_lines: &[usize],
    symbol_at: impl Fn(&ScannedLine, usize) -> Option<OutlineSymbol>,
) -> (StructuralOutline, BuildMode) {
    let changed: BTreeSet<usize> = changed_lines.iter().copied().collect();
    let kept: BTreeMap<usize, &OutlineSymbol> = previous
        .symbols
        .iter()
        .filter(|symbol| !changed.contains(&symbol.line))
        .map(|symbol| (symbol.line, symbol))
        .collect();

    let untouched_agree = previous.line_count == scanned.len()
        && scanned
            .iter()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line))
            .filter(|(line_no, _)| !changed.contains(line_no))
            .all(|(line_no, line)| symbol_at(line, line_no).as_ref() == kept.get(&line_no).copied());

    if !untouched_agree {
        let symbols = extract(scanned, symbol_at, |_| true);
        return (
            StructuralOutline::new(language, parser, content, symbols),
            BuildMode::Full,
        );
    }

    let mut symbols: Vec<OutlineSymbol> = kept.into_values().cloned().collect();
    symbols.extend(extract(scanned, symbol_at, |line_no| changed.contains(&line_no)));
    (
        StructuralOutline::new(language, parser, content, symbols),
        BuildMode::Partial,
    )
}

fn symbol(kind: SymbolKind, name: &str, line: usize) -> OutlineSymbol {
    OutlineSymbol {
        kind,
        name: name.to_owned(),
        line,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn leading_identifier(text: &str) -> Option<&str> {
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    (end > 0).then(|| &text[..end])
}

/// Identifier-like words of `text` with their byte offsets. Member accesses
/// (`obj.class`) are skipped.
fn words(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (idx, c) in text.char_indices().chain(std::iter::once((text.len(), ' '))) {
        match (start, is_ident_char(c)) {
            (None, true) => start = Some(idx),
            (Some(begin), false) => {
                let member = text[..begin].ends_with('.');
                if !member {
                    out.push((begin, &text[begin..idx]));
                }
                start = None;
            }
            _ => {}
        }
    }
    out
}

fn python_header_keyword(text: &str) -> bool {
    leading_identifier(text).is_some_and(|word| PYTHON_BLOCK_KEYWORDS.contains(&word))
}

/// A `:` outside any bracket opened on this line.
fn has_top_level_colon(code: &str) -> bool {
    let mut depth = 0usize;
    for c in code.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Every compound statement header must reach a `:` by the line on which its
/// brackets close.
fn check_block_headers(scanned: &[ScannedLine]) -> Result<(), BuildError> {
    let mut pending: Option<usize> = None;
    let mut header_colon = false;
    let mut backslash = false;

    for (idx, line) in scanned.iter().enumerate() {
        let line_no = idx + 1;
        let text = line.code.trim();
        let joined = std::mem::replace(&mut backslash, text.ends_with('\\'));

        if pending.is_none()
            && !line.continued
            && !joined
            && line.depth_start == 0
            && python_header_keyword(text)
        {
            pending = Some(line_no);
            header_colon = false;
        }

        if let Some(start) = pending {
            // Only the part of a continuation line after its brackets close
            // can hold the header's colon.
            let tail = if line.depth_start > 0 {
                text.rfind([')', ']', '}']).map_or("", |pos| &text[pos..])
            } else {
                text
            };
            header_colon |= has_top_level_colon(tail);
            if line.depth_end == 0 && !backslash {
                pending = None;
                if !header_colon {
                    return Err(BuildError::new(start, "block header is missing `:`"));
                }
            }
        }
    }

    match pending {
        Some(start) => Err(BuildError::new(start, "block header is missing `:`")),
        None => Ok(()),
    }
}

fn python_symbol(line: &ScannedLine, line_no: usize) -> Option<OutlineSymbol> {
    if line.continued || line.depth_start > 0 {
        return None;
    }
    let text = line.code.trim_start();
    let text = text.strip_prefix("async ").map_or(text, str::trim_start);
    let (kind, rest) = if let Some(rest) = text.strip_prefix("def ") {
        (SymbolKind::Function, rest)
    } else if let Some(rest) = text.strip_prefix("class ") {
        (SymbolKind::Class, rest)
    } else {
        return None;
    };
    let name = leading_identifier(rest.trim_start())?;
    Some(symbol(kind, name, line_no))
}

const FUNCTION_KEYWORDS: &[&str] = &["fn", "func", "function", "fun", "def"];
const CLASS_KEYWORDS: &[&str] = &["class", "interface", "trait", "object"];
const STRUCT_KEYWORDS: &[&str] = &["struct", "enum", "union"];
const C_NOT_FUNCTIONS: &[&str] = &["if", "for", "while", "switch", "return", "sizeof", "catch"];

fn brace_symbol(language: &str, line: &ScannedLine, line_no: usize) -> Option<OutlineSymbol> {
    if line.continued {
        return None;
    }
    let text = line.code.trim();
    if text.is_empty() {
        return None;
    }

    if matches!(language, "css" | "scss") {
        if line.depth_start != 0 {
            return None;
        }
        let (selector, _) = text.split_once('{')?;
        let selector = selector.trim();
        return (!selector.is_empty()).then(|| symbol(SymbolKind::Rule, selector, line_no));
    }

    let words = words(text);
    for (offset, word) in &words {
        let kind = if FUNCTION_KEYWORDS.contains(word) {
            SymbolKind::Function
        } else if CLASS_KEYWORDS.contains(word) {
            SymbolKind::Class
        } else if STRUCT_KEYWORDS.contains(word) {
            SymbolKind::Struct
        } else {
            continue;
        };

        let after = text[offset + word.len()..].trim_start();
        // Go method receivers: `func (s *Server) Serve(`.
        let after = match (kind, after.strip_prefix('(')) {
            (SymbolKind::Function, Some(rest)) => rest.split_once(')')?.1.trim_start(),
            _ => after,
        };
        if let Some(name) = leading_identifier(after) {
            return Some(symbol(kind, name, line_no));
        }
        // Go: `type Server struct {`.
        return match words.as_slice() {
            [(_, "type"), (_, name), ..] if kind == SymbolKind::Struct => {
                Some(symbol(kind, name, line_no))
            }
            _ => None,
        };
    }

    if matches!(language, "c" | "cpp") && line.depth_start == 0 {
        return c_function(text, line_no);
    }
    None
}

/// `int main(void) {` style definitions at file scope.
fn c_function(text: &str, line_no: usize) -> Option<OutlineSymbol> {
    if text.ends_with(';') || text.starts_with('#') {
        return None;
    }
    let head = text[..text.find('(')?].trim_end();
    let name_start = head
        .char_indices()
        .rev()
        .find(|(_, c)| !(is_ident_char(*c) || *c == ':' || *c == '~'))
        .map_or(0, |(idx, c)| idx + c.len_utf8());
    let name = &head[name_start..];
    if name.is_empty() || name_start == 0 || C_NOT_FUNCTIONS.contains(&name) {
        return None;
    }
    Some(symbol(SymbolKind::Function, name, line_no))
}

fn line_symbols(language: &str, content: &str) -> Vec<OutlineSymbol> {
    let lines: Vec<&str> = content.lines().collect();
    let mut symbols = Vec::new();
    let mut in_fence = false;

    for (idx, line) in lines.iter().enumerate() {
        let line_no = idx + 1;
        let found = match language {
            "markdown" => {
                if line.trim_start().starts_with("```") {
                    in_fence = !in_fence;
                    None
                } else if in_fence {
                    None
                } else {
                    markdown_heading(line)
                }
            }
            "rst" => lines.get(idx + 1).and_then(|next| rst_heading(line, next)),
            "yaml" => yaml_key(line),
            "toml" => toml_table(line),
            "json" => json_key(line),
            "html" | "vue" | "svelte" => root_element(line),
            "sql" => sql_definition(line),
            "ruby" => ruby_definition(line),
            "r" => r_function(line),
            "csv" if idx == 0 => {
                symbols.extend(
                    line.split(',')
                        .map(|column| column.trim().trim_matches('"'))
                        .filter(|column| !column.is_empty())
                        .map(|column| symbol(SymbolKind::Key, column, line_no)),
                );
                None
            }
            _ => None,
        };
        if let Some((kind, name)) = found {
            symbols.push(OutlineSymbol {
                kind,
                name,
                line: line_no,
            });
        }
    }
    symbols
}

fn markdown_heading(line: &str) -> Option<(SymbolKind, String)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    let title = rest.trim();
    (rest.starts_with(' ') && !title.is_empty()).then(|| (SymbolKind::Heading, title.to_owned()))
}

fn rst_heading(line: &str, next: &str) -> Option<(SymbolKind, String)> {
    let title = line.trim();
    let underline = next.trim_end();
    let marker = underline.chars().next()?;
    let is_underline = |text: &str| {
        !text.is_empty()
            && matches!(marker, '=' | '-' | '~' | '^' | '*' | '#')
            && text.chars().all(|c| c == marker)
    };
    (!title.is_empty()
        && !is_underline(title)
        && is_underline(underline)
        && underline.chars().count() >= title.chars().count())
    .then(|| (SymbolKind::Heading, title.to_owned()))
}

fn yaml_key(line: &str) -> Option<(SymbolKind, String)> {
    if line.starts_with(|c: char| c.is_whitespace() || c == '#' || c == '-') {
        return None;
    }
    let (key, _) = line.split_once(':')?;
    let key = key.trim().trim_matches(|c| c == '"' || c == '\'');
    (!key.is_empty()).then(|| (SymbolKind::Key, key.to_owned()))
}

fn toml_table(line: &str) -> Option<(SymbolKind, String)> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('[')?.strip_suffix(']')?;
    let name = inner.trim_matches(|c| c == '[' || c == ']').trim();
    (!name.is_empty()).then(|| (SymbolKind::Table, name.to_owned()))
}

/// Keys of a pretty-printed top-level object.
fn json_key(line: &str) -> Option<(SymbolKind, String)> {
    let trimmed = line.trim_start();
    let indent = line.len() - trimmed.len();
    if !(1..=2).contains(&indent) {
        return None;
    }
    let rest = trimmed.strip_prefix('"')?;
    let (key, after) = rest.split_once('"')?;
    after
        .trim_start()
        .starts_with(':')
        .then(|| (SymbolKind::Key, key.to_owned()))
}

fn root_element(line: &str) -> Option<(SymbolKind, String)> {
    let rest = line.strip_prefix('<')?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(rest.len());
    let tag = &rest[..end];
    tag.starts_with(|c: char| c.is_ascii_alphabetic())
        .then(|| (SymbolKind::Element, tag.to_ascii_lowercase()))
}

fn sql_definition(line: &str) -> Option<(SymbolKind, String)> {
    let mut tokens = line.split_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("create") {
        return None;
    }
    let mut kind = None;
    for token in tokens.by_ref() {
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            "OR" | "REPLACE" | "TEMP" | "TEMPORARY" | "UNIQUE" | "MATERIALIZED" => continue,
            "TABLE" | "VIEW" => kind = Some(SymbolKind::Table),
            "FUNCTION" | "PROCEDURE" => kind = Some(SymbolKind::Function),
            _ => return None,
        }
        break;
    }
    let kind = kind?;
    let mut name = tokens.next()?;
    if name.eq_ignore_ascii_case("if") {
        // IF NOT EXISTS
        name = tokens.nth(2)?;
    }
    let name = name
        .split('(')
        .next()
        .unwrap_or(name)
        .trim_matches(|c| c == '"' || c == '`' || c == '[' || c == ']');
    (!name.is_empty()).then(|| (kind, name.to_owned()))
}

fn ruby_definition(line: &str) -> Option<(SymbolKind, String)> {
    let trimmed = line.trim_start();
    let (kind, rest) = if let Some(rest) = trimmed.strip_prefix("def ") {
        (SymbolKind::Function, rest)
    } else if let Some(rest) = trimmed.strip_prefix("class ") {
        (SymbolKind::Class, rest)
    } else if let Some(rest) = trimmed.strip_prefix("module ") {
        (SymbolKind::Class, rest)
    } else {
        return None;
    };
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !(is_ident_char(c) || matches!(c, '.' | '?' | '!' | ':')))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    (!name.is_empty()).then(|| (kind, name.to_owned()))
}

fn r_function(line: &str) -> Option<(SymbolKind, String)> {
    let (name, value) = line.split_once("<-")?;
    let name = name.trim();
    (value.trim_start().starts_with("function")
        && !name.is_empty()
        && name.chars().all(|c| is_ident_char(c) || c == '.'))
    .then(|| (SymbolKind::Function, name.to_owned()))
}
