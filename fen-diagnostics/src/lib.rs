// Error reporting for the Fen compiler
// Stable error kinds, source spans, and Rust-style colored rendering

use colored::Colorize;
use std::fmt;

/// Stable tags for every semantic failure class. The tag is part of the
/// compiler's contract: tests and tooling match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SyntaxError,
    UndefinedSymbol,
    DuplicateDefinition,
    TypeMismatch,
    TypeConflict,
    ConstraintViolation,
    UnresolvedAttribute,
    AmbiguousCall,
    ArityMismatch,
    ReturnOutsideFunction,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let tag = match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::UndefinedSymbol => "UndefinedSymbol",
            ErrorKind::DuplicateDefinition => "DuplicateDefinition",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::TypeConflict => "TypeConflict",
            ErrorKind::ConstraintViolation => "ConstraintViolation",
            ErrorKind::UnresolvedAttribute => "UnresolvedAttribute",
            ErrorKind::AmbiguousCall => "AmbiguousCall",
            ErrorKind::ArityMismatch => "ArityMismatch",
            ErrorKind::ReturnOutsideFunction => "ReturnOutsideFunction",
            ErrorKind::BreakOutsideLoop => "BreakOutsideLoop",
            ErrorKind::ContinueOutsideLoop => "ContinueOutsideLoop",
            ErrorKind::Internal => "Internal",
        };
        write!(f, "{}", tag)
    }
}

/// A single compile failure: kind, message, byte span into the offending
/// source. The pipeline stops at the first one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("error[{kind}]: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: std::ops::Range<usize>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: std::ops::Range<usize>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }
}

/// Line/column position resolved from a byte span
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Location {
    pub fn from_span(source: &str, span: &std::ops::Range<usize>) -> Self {
        let start = span.start.min(source.len());
        let before = &source[..start];
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);
        let length = span.end.saturating_sub(span.start).max(1);

        Self {
            line,
            column,
            length,
        }
    }
}

/// Render a compile error against its source in Rust style:
///
/// ```text
/// error[TypeMismatch]: expected type `Int` but got `String`
///  --> demo.fen:3:9
///   |
/// 1 | ...two lines of leading context...
/// 3 | let x = "oops";
///   |         ^^^^^^
/// 5 | ...two lines of trailing context...
/// ```
pub fn render(error: &CompileError, file: &str, source: &str) -> String {
    let loc = Location::from_span(source, &error.span);
    let mut output = String::new();

    output.push_str(&format!(
        "{}{}{} {}\n",
        "error".red().bold(),
        format!("[{}]", error.kind).red().bold(),
        ":".bold(),
        error.message.bold()
    ));
    output.push_str(&format!(
        " {} {}:{}:{}\n",
        "-->".cyan().bold(),
        file,
        loc.line,
        loc.column
    ));

    let lines: Vec<&str> = source.lines().collect();
    if loc.line == 0 || loc.line > lines.len() {
        return output;
    }

    // Two context lines either side of the offending line
    let first = loc.line.saturating_sub(2).max(1);
    let last = (loc.line + 2).min(lines.len());
    let line_num_width = last.to_string().len().max(2);

    output.push_str(&format!(" {} {}\n", " ".repeat(line_num_width), "|".cyan().bold()));
    for row in first..=last {
        let line = lines[row - 1];
        output.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", row, width = line_num_width).cyan().bold(),
            "|".cyan().bold(),
            line
        ));
        if row == loc.line {
            let caret_width = loc.length.min(line.len().saturating_sub(loc.column - 1)).max(1);
            output.push_str(&format!(
                " {} {} {}{}\n",
                " ".repeat(line_num_width),
                "|".cyan().bold(),
                " ".repeat(loc.column - 1),
                "^".repeat(caret_width).red().bold()
            ));
        }
    }

    output
}

/// Nearest-name suggestion for `UndefinedSymbol` diagnostics. Returns the
/// closest candidate when it is similar enough to be a plausible typo.
pub fn suggest<'a>(name: &str, candidates: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;
    for candidate in candidates {
        let score = strsim::jaro_winkler(name, candidate);
        if score >= 0.85 && best.map_or(true, |(s, _)| score > s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_span() {
        let source = "let a = 1;\nlet b = oops;\n";
        let offset = source.find("oops").expect("test source");
        let loc = Location::from_span(source, &(offset..offset + 4));
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 9);
        assert_eq!(loc.length, 4);
    }

    #[test]
    fn test_render_includes_context_and_caret() {
        colored::control::set_override(false);
        let source = "let a = 1;\nlet b = 2;\nlet c = oops;\nlet d = 4;\nlet e = 5;\n";
        let offset = source.find("oops").expect("test source");
        let error = CompileError::new(
            ErrorKind::UndefinedSymbol,
            "`oops` is not defined",
            offset..offset + 4,
        );
        let out = render(&error, "demo.fen", source);
        assert!(out.contains("error[UndefinedSymbol]"));
        assert!(out.contains("demo.fen:3:9"));
        // two lines of context either side
        assert!(out.contains("let a = 1;"));
        assert!(out.contains("let e = 5;"));
        assert!(out.contains("^^^^"));
    }

    #[test]
    fn test_suggest_close_name() {
        let names = ["counter", "echo", "int_to_string"];
        assert_eq!(
            suggest("int_to_strng", names.iter().copied()),
            Some("int_to_string".to_string())
        );
        assert_eq!(suggest("zzz", names.iter().copied()), None);
    }

    #[test]
    fn test_error_display() {
        let error = CompileError::new(ErrorKind::TypeConflict, "cannot rebind T", 0..1);
        assert_eq!(error.to_string(), "error[TypeConflict]: cannot rebind T");
    }
}
