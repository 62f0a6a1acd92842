//! Diagnostic reporting.
//!
//! The engine never formats final human-facing output; it hands finished
//! message text, a severity, and an optional source span to a
//! [`DiagnosticSink`] supplied by the caller.

use core::cell::RefCell;
use core::fmt;

use crate::syntax::Span;

/// How serious a diagnostic is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// The expression is unusable.
    Error,
    /// The expression works but probably not as intended.
    Warning,
    /// Extra detail attached to a preceding error or warning.
    Note,
}

/// One reported message.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Option<Span>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, span: Option<Span>, message: impl Into<String>) -> Self {
        Self {
            severity,
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
        };
        match self.span {
            Some(span) => write!(f, "{}: {}..{}: {}", tag, span.start, span.end, self.message),
            None => write!(f, "{}: {}", tag, self.message),
        }
    }
}

/// Receiver for diagnostics produced during compilation and evaluation.
pub trait DiagnosticSink {
    fn report(&self, diagnostic: Diagnostic);
}

impl<'a> dyn DiagnosticSink + 'a {
    pub fn error(&self, span: Option<Span>, message: impl Into<String>) {
        self.report(Diagnostic::new(Severity::Error, span, message));
    }

    pub fn warn(&self, span: Option<Span>, message: impl Into<String>) {
        self.report(Diagnostic::new(Severity::Warning, span, message));
    }

    pub fn note(&self, span: Option<Span>, message: impl Into<String>) {
        self.report(Diagnostic::new(Severity::Note, span, message));
    }
}

/// Sink that keeps every diagnostic in memory.
#[derive(Default)]
pub struct Collector {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Diagnostic> {
        self.diagnostics.take()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.borrow().is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Messages only, in report order. Handy in tests.
    pub fn messages(&self) -> Vec<String> {
        self.diagnostics
            .borrow()
            .iter()
            .map(|d| d.message.clone())
            .collect()
    }
}

impl DiagnosticSink for Collector {
    fn report(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }
}

/// Sink that drops everything.
pub struct IgnoreSink;

impl DiagnosticSink for IgnoreSink {
    fn report(&self, _diagnostic: Diagnostic) {}
}
