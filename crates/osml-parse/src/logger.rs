//! Diagnostic sinks.
//!
//! Parser components report non-fatal problems through a [`Logger`] and keep
//! going. Speculative work logs into a [`LoggerFork`], which only reaches the
//! parent logger once it is committed.

use osml_tokenizer::SourceLocation;
use tracing::{error, info, warn};

use crate::{Diagnostic, ErrorKind, Severity};

/// Receives diagnostics.
pub trait Logger {
    fn log(&mut self, diagnostic: Diagnostic);

    fn error(&mut self, kind: ErrorKind, message: String, location: SourceLocation) {
        self.log(Diagnostic::new(Severity::Error, kind, message, location));
    }

    fn warning(&mut self, kind: ErrorKind, message: String, location: SourceLocation) {
        self.log(Diagnostic::new(Severity::Warning, kind, message, location));
    }

    fn note(&mut self, kind: ErrorKind, message: String, location: SourceLocation) {
        self.log(Diagnostic::new(Severity::Note, kind, message, location));
    }
}

impl dyn Logger + '_ {
    /// Start buffering diagnostics on top of this logger.
    pub fn fork(&mut self) -> LoggerFork<'_> {
        LoggerFork::new(self)
    }
}

/// A buffered child logger.
///
/// Diagnostics are handed to the parent on [`commit`](Self::commit) and
/// discarded if the fork is dropped instead.
pub struct LoggerFork<'a> {
    parent: &'a mut dyn Logger,
    buffer: Vec<Diagnostic>,
}

impl<'a> LoggerFork<'a> {
    pub fn new(parent: &'a mut dyn Logger) -> Self {
        Self {
            parent,
            buffer: Vec::new(),
        }
    }

    /// Diagnostics collected so far.
    pub fn pending(&self) -> &[Diagnostic] {
        &self.buffer
    }

    /// Forward every buffered diagnostic to the parent.
    pub fn commit(self) {
        let LoggerFork { parent, buffer } = self;
        for diagnostic in buffer {
            parent.log(diagnostic);
        }
    }
}

impl Logger for LoggerFork<'_> {
    fn log(&mut self, diagnostic: Diagnostic) {
        self.buffer.push(diagnostic);
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingLogger {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Kinds of all logged errors, in order.
    pub fn error_kinds(&self) -> Vec<ErrorKind> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.kind)
            .collect()
    }
}

impl Logger for CollectingLogger {
    fn log(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&mut self, diagnostic: Diagnostic) {
        let Diagnostic {
            severity,
            kind,
            message,
            location,
        } = diagnostic;
        match severity {
            Severity::Error => error!(%kind, %location, "{message}"),
            Severity::Warning => warn!(%kind, %location, "{message}"),
            Severity::Note => info!(%kind, %location, "{message}"),
        }
    }
}
