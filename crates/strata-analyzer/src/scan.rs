//! Line-oriented lexical scan shared by the bracket-aware builders.
//!
//! The scan strips comments and literal contents, tracks bracket nesting
//! across lines, and fails on the first unbalanced bracket or unterminated
//! multi-line construct.

use crate::outline::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Syntax {
    /// `#` comments, single-line `'`/`"` strings, `'''`/`"""` blocks.
    Hash,
    /// `//` and `/* */` comments, `"` strings, `'c'` literals, backtick templates.
    CFamily,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScannedLine {
    /// The line with comments removed and string contents blanked.
    pub code: String,
    pub depth_start: usize,
    pub depth_end: usize,
    /// The line starts inside a multi-line string, comment, or template.
    pub continued: bool,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Code,
    BlockComment { line: usize },
    TripleString { quote: char, line: usize },
    Template { line: usize },
}

pub(crate) fn scan(content: &str, syntax: Syntax) -> Result<Vec<ScannedLine>, BuildError> {
    let mut out = Vec::new();
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut state = State::Code;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let chars: Vec<char> = line.chars().collect();
        let continued = !matches!(state, State::Code);
        let depth_start = stack.len();
        let mut code = String::with_capacity(line.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match state {
                State::BlockComment { .. } => {
                    if c == '*' && chars.get(i + 1) == Some(&'/') {
                        state = State::Code;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                State::TripleString { quote, .. } => {
                    if c == '\\' {
                        i += 2;
                    } else if starts_triple(&chars, i, quote) {
                        state = State::Code;
                        i += 3;
                    } else {
                        i += 1;
                    }
                }
                State::Template { .. } => {
                    if c == '\\' {
                        i += 2;
                    } else {
                        if c == '`' {
                            state = State::Code;
                        }
                        i += 1;
                    }
                }
                State::Code => match (syntax, c) {
                    (Syntax::Hash, '#') => break,
                    (Syntax::CFamily, '/') if chars.get(i + 1) == Some(&'/') => break,
                    (Syntax::CFamily, '/') if chars.get(i + 1) == Some(&'*') => {
                        state = State::BlockComment { line: line_no };
                        i += 2;
                    }
                    (Syntax::Hash, '"' | '\'') if starts_triple(&chars, i, c) => {
                        state = State::TripleString {
                            quote: c,
                            line: line_no,
                        };
                        code.push_str("\"\"");
                        i += 3;
                    }
                    (Syntax::Hash, '"' | '\'') => match closing_quote(&chars, i + 1, c) {
                        Some(end) => {
                            code.push_str("\"\"");
                            i = end + 1;
                        }
                        None => {
                            return Err(BuildError::new(line_no, "unterminated string literal"))
                        }
                    },
                    // An unterminated C-family string runs to the end of the line.
                    (Syntax::CFamily, '"') => match closing_quote(&chars, i + 1, '"') {
                        Some(end) => {
                            code.push_str("\"\"");
                            i = end + 1;
                        }
                        None => break,
                    },
                    (Syntax::CFamily, '\'') => match char_literal_end(&chars, i) {
                        Some(end) => {
                            code.push_str("''");
                            i = end + 1;
                        }
                        None => {
                            code.push(c);
                            i += 1;
                        }
                    },
                    (Syntax::CFamily, '`') => {
                        state = State::Template { line: line_no };
                        i += 1;
                    }
                    (_, '(' | '[' | '{') => {
                        stack.push((c, line_no));
                        code.push(c);
                        i += 1;
                    }
                    (_, ')' | ']' | '}') => {
                        match stack.pop() {
                            Some((open, _)) if closer_for(open) == c => {}
                            Some((open, opened)) => {
                                return Err(BuildError::new(
                                    line_no,
                                    format!("`{c}` does not close `{open}` opened on line {opened}"),
                                ))
                            }
                            None => {
                                return Err(BuildError::new(line_no, format!("unmatched `{c}`")))
                            }
                        }
                        code.push(c);
                        i += 1;
                    }
                    _ => {
                        code.push(c);
                        i += 1;
                    }
                },
            }
        }

        out.push(ScannedLine {
            code,
            depth_start,
            depth_end: stack.len(),
            continued,
        });
    }

    if let Some((open, line)) = stack.pop() {
        return Err(BuildError::new(line, format!("unclosed `{open}`")));
    }
    match state {
        State::Code => Ok(out),
        State::BlockComment { line } => Err(BuildError::new(line, "unterminated block comment")),
        State::TripleString { line, .. } => {
            Err(BuildError::new(line, "unterminated triple-quoted string"))
        }
        State::Template { line } => Err(BuildError::new(line, "unterminated template literal")),
    }
}

fn closer_for(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn starts_triple(chars: &[char], i: usize, quote: char) -> bool {
    chars.get(i) == Some(&quote) && chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)
}

fn closing_quote(chars: &[char], mut i: usize, quote: char) -> Option<usize> {
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// End index of a `'x'` or `'\…'` literal starting at `start`. Anything else
/// (Rust lifetimes, apostrophes in prose) is not a literal.
fn char_literal_end(chars: &[char], start: usize) -> Option<usize> {
    match chars.get(start + 1)? {
        '\\' => (start + 3..chars.len().min(start + 12)).find(|&j| chars[j] == '\''),
        '\'' => None,
        _ => (chars.get(start + 2) == Some(&'\'')).then_some(start + 2),
    }
}
