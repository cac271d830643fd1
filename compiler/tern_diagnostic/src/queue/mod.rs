//! Collects diagnostics from every pass, positions them, collapses repeats
//! and sorts them for reporting.
//!
//! Errors with the same code on the same source line are reported once,
//! the same collapsing rule the parser applies to syntax errors.

use rustc_hash::FxHashSet;
use tern_ir::Span;

use crate::span_utils::LineOffsetTable;
use crate::{Diagnostic, ErrorCode, ErrorGuaranteed};

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Errors accepted before the queue stops taking more (0 = unlimited).
    pub error_limit: usize,
    /// Collapse errors with the same code on the same line.
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 10,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// Keep everything. Used by tests that count diagnostics.
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
        }
    }
}

#[derive(Clone, Debug)]
struct Queued {
    diagnostic: Diagnostic,
    line: u32,
    column: u32,
}

#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Queued>,
    error_count: usize,
    /// `(line, code)` of every accepted error.
    seen: FxHashSet<(u32, ErrorCode)>,
    limit_hit: bool,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            config,
            ..DiagnosticQueue::default()
        }
    }

    /// Queue `diag` at an explicit position. Returns `false` if it was
    /// dropped as a duplicate or over the limit.
    pub fn add(&mut self, diag: Diagnostic, line: u32, column: u32) -> bool {
        let is_error = diag.is_error();
        if is_error && self.limit_reached() {
            self.limit_hit = true;
            return false;
        }
        if is_error && self.config.deduplicate && !self.seen.insert((line, diag.code)) {
            return false;
        }
        if is_error {
            self.error_count += 1;
        }
        self.diagnostics.push(Queued {
            diagnostic: diag,
            line,
            column,
        });
        true
    }

    /// Queue `diag`, positioned by its primary span in `source`.
    pub fn add_with_source(&mut self, diag: Diagnostic, source: &str, lines: &LineOffsetTable) -> bool {
        let (line, column) = diag
            .primary_span()
            .map_or((1, 1), |span| lines.line_col(source, span.start));
        self.add(diag, line, column)
    }

    /// Queue an error and get proof that one was reported.
    pub fn emit_error(&mut self, diag: Diagnostic, line: u32, column: u32) -> ErrorGuaranteed {
        debug_assert!(diag.is_error());
        self.add(diag, line, column);
        ErrorGuaranteed::new()
    }

    pub fn limit_reached(&self) -> bool {
        self.config.error_limit > 0 && self.error_count >= self.config.error_limit
    }

    /// Whether an error was dropped because the limit was reached.
    pub fn overflowed(&self) -> bool {
        self.limit_hit
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn has_errors(&self) -> Option<ErrorGuaranteed> {
        ErrorGuaranteed::from_error_count(self.error_count)
    }

    pub fn peek(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().map(|q| &q.diagnostic)
    }

    /// Drain the queue in source order (stable for equal positions).
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        self.diagnostics.sort_by_key(|q| (q.line, q.column));
        let out = self.diagnostics.drain(..).map(|q| q.diagnostic).collect();
        self.error_count = 0;
        self.seen.clear();
        self.limit_hit = false;
        out
    }
}

/// Reported once after the error limit swallowed further errors.
#[cold]
pub fn too_many_errors(limit: usize, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E9002)
        .with_message(format!("aborting after {limit} errors"))
        .with_label(span, "error limit reached here")
        .with_note("raise `DiagnosticConfig::error_limit` to see more")
}
