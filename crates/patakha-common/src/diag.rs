use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::span::{FileId, Span};

/// How serious a diagnostic is.
///
/// Warnings and notes never stop the pipeline; any error does, at the next
/// stage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic record.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    /// Optional localized nag-line trailing the message.
    pub nag: Option<&'static str>,
}

/// The shared diagnostic sink, passed by reference through the pipeline.
///
/// Stages append records as they find problems; nothing is printed until the
/// driver renders the collected set. Rendering order is stable: by file, then
/// by source offset, then by insertion order.
#[derive(Debug, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error.
    pub fn error(&mut self, span: Span, message: impl Into<String>) {
        self.push(Severity::Error, span, message.into(), None);
    }

    /// Append an error with a trailing nag-line.
    pub fn error_nag(&mut self, span: Span, message: impl Into<String>, nag: &'static str) {
        self.push(Severity::Error, span, message.into(), Some(nag));
    }

    /// Append a warning.
    pub fn warning(&mut self, span: Span, message: impl Into<String>) {
        self.push(Severity::Warning, span, message.into(), None);
    }

    /// Append a note.
    pub fn note(&mut self, span: Span, message: impl Into<String>) {
        self.push(Severity::Note, span, message.into(), None);
    }

    fn push(&mut self, severity: Severity, span: Span, message: String, nag: Option<&'static str>) {
        self.records.push(Diagnostic {
            severity,
            span,
            message,
            nag,
        });
    }

    /// Whether any error-severity record has been collected.
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|d| d.severity == Severity::Error)
    }

    /// Number of collected records of any severity.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Records sorted for rendering: by file, then by source offset, then by
    /// insertion order.
    pub fn sorted(&self) -> Vec<&Diagnostic> {
        let mut out: Vec<&Diagnostic> = self.records.iter().collect();
        // sort_by_key is stable, so equal (file, offset) keys keep insertion order.
        out.sort_by_key(|d| (d.span.file, d.span.start));
        out
    }

    /// Promote every warning to an error. Used by `lint --strict`.
    pub fn promote_warnings(&mut self) {
        for d in &mut self.records {
            if d.severity == Severity::Warning {
                d.severity = Severity::Error;
            }
        }
    }
}

/// A loaded source file.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub text: String,
}

impl SourceFile {
    /// The 1-based (line, column) of a byte offset, derived from the text.
    ///
    /// Diagnostics and dumps are the only consumers of line/column pairs, so
    /// the file keeps no side table; the prefix up to `offset` is scanned
    /// when a record is rendered. Column is measured in bytes from the start
    /// of the line.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let cut = (offset as usize).min(self.text.len());
        let prefix = &self.text[..cut];
        let line = prefix.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
        let col = match prefix.rfind('\n') {
            Some(newline) => cut - newline,
            None => cut + 1,
        };
        (line, col as u32)
    }
}

/// All source files of one compilation unit, indexed by [`FileId`].
///
/// File 0 is the root file; imports are added in the order the loader first
/// reaches them, which keeps artifact output deterministic.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and return its assigned [`FileId`].
    pub fn add(&mut self, path: PathBuf, text: String) -> FileId {
        self.files.push(SourceFile { path, text });
        FileId((self.files.len() - 1) as u32)
    }

    /// Get a file by id.
    pub fn get(&self, id: FileId) -> &SourceFile {
        &self.files[id.0 as usize]
    }

    /// Look up a file by path, if already loaded.
    pub fn lookup(&self, path: &std::path::Path) -> Option<FileId> {
        self.files
            .iter()
            .position(|f| f.path == path)
            .map(|i| FileId(i as u32))
    }

    /// Number of loaded files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether no files are loaded.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Render one diagnostic as the canonical single-line form:
    /// `<path>:<line>:<col>: <severity>: <message>`, with the optional
    /// nag-line trailing in parentheses.
    pub fn render_line(&self, d: &Diagnostic) -> String {
        let file = self.get(d.span.file);
        let (line, col) = file.line_col(d.span.start);
        let mut out = format!(
            "{}:{}:{}: {}: {}",
            file.path.display(),
            line,
            col,
            d.severity,
            d.message
        );
        if let Some(nag) = d.nag {
            out.push_str(" (");
            out.push_str(nag);
            out.push(')');
        }
        out
    }

    /// Render all collected diagnostics in stable order, one per line.
    pub fn render_all(&self, diags: &Diagnostics) -> String {
        let mut out = String::new();
        for d in diags.sorted() {
            out.push_str(&self.render_line(d));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sink_has_no_errors() {
        let diags = Diagnostics::new();
        assert!(!diags.has_errors());
        assert!(diags.is_empty());
    }

    #[test]
    fn warnings_are_not_errors() {
        let mut diags = Diagnostics::new();
        diags.warning(Span::new(FileId(0), 0, 1), "unused variable `x`");
        assert!(!diags.has_errors());
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn promote_warnings_makes_errors() {
        let mut diags = Diagnostics::new();
        diags.warning(Span::new(FileId(0), 0, 1), "unused variable `x`");
        diags.promote_warnings();
        assert!(diags.has_errors());
    }

    #[test]
    fn sorted_orders_by_file_then_offset_then_insertion() {
        let mut diags = Diagnostics::new();
        diags.error(Span::new(FileId(1), 4, 5), "third");
        diags.error(Span::new(FileId(0), 9, 10), "second");
        diags.error(Span::new(FileId(0), 2, 3), "first");
        diags.error(Span::new(FileId(1), 4, 5), "fourth");
        let order: Vec<&str> = diags.sorted().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn line_col_is_derived_from_the_text() {
        let file = SourceFile {
            path: PathBuf::from("pos.bhai"),
            text: "shuru\nbhai x = 1\nbol(x)\nbass".to_string(),
        };
        // `shuru` starts the file.
        assert_eq!(file.line_col(0), (1, 1));
        // `x` on line 2.
        assert_eq!(file.line_col(11), (2, 6));
        // The newline byte still belongs to the line it ends.
        assert_eq!(file.line_col(5), (1, 6));
        // First byte after a newline starts the next line.
        assert_eq!(file.line_col(6), (2, 1));
        // Offsets past the end clamp to the last position.
        assert_eq!(file.line_col(999), (4, 5));
    }

    #[test]
    fn render_line_format() {
        let mut map = SourceMap::new();
        let file = map.add(PathBuf::from("main.bhai"), "bhai x = 1\nbol(y)\n".to_string());
        let mut diags = Diagnostics::new();
        diags.error(Span::new(file, 15, 16), "undeclared name `y`");
        let rendered = map.render_all(&diags);
        assert_eq!(rendered, "main.bhai:2:5: error: undeclared name `y`\n");
    }

    #[test]
    fn render_line_with_nag() {
        let mut map = SourceMap::new();
        let file = map.add(PathBuf::from("main.bhai"), "bol(".to_string());
        let mut diags = Diagnostics::new();
        diags.error_nag(
            Span::new(file, 3, 4),
            "expected `)`",
            "arre bhai, bracket band kar",
        );
        let line = map.render_line(&diags.sorted()[0]);
        assert_eq!(
            line,
            "main.bhai:1:4: error: expected `)` (arre bhai, bracket band kar)"
        );
    }
}
