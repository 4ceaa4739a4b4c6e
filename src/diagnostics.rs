//! Diagnostic accumulation
//!
//! One [`Diagnostics`] sink is shared by every compilation stage. Entries are
//! append-only for the lifetime of a compilation unit; the sink never drops
//! or rewrites earlier entries. Deciding what an accumulated error *means*
//! (halting the pipeline, exit codes, rendering) is the driver's job.

use crate::span::SourceLocation;

/// Severity of a diagnostic entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// Gates progression to the next compilation stage
    Error,
    /// Informational; compilation continues
    Warning,
    /// Informational; lowest severity
    Note,
}

/// A single diagnostic entry
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub location: SourceLocation,
    pub hint: Option<String>,
}

/// The per-compilation diagnostic sink
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    has_errors: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>, location: SourceLocation, hint: impl Into<String>) {
        self.push(DiagnosticLevel::Error, message, location, hint);
        self.has_errors = true;
    }

    pub fn add_warning(&mut self, message: impl Into<String>, location: SourceLocation, hint: impl Into<String>) {
        self.push(DiagnosticLevel::Warning, message, location, hint);
    }

    pub fn add_note(&mut self, message: impl Into<String>, location: SourceLocation, hint: impl Into<String>) {
        self.push(DiagnosticLevel::Note, message, location, hint);
    }

    fn push(&mut self, level: DiagnosticLevel, message: impl Into<String>, location: SourceLocation, hint: impl Into<String>) {
        let hint = hint.into();
        self.entries.push(Diagnostic {
            level,
            message: message.into(),
            location,
            hint: if hint.is_empty() { None } else { Some(hint) },
        });
    }

    /// Whether any Error-level entry has been recorded
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// All entries, in the order they were recorded
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Number of Error-level entries
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_ordering() {
        let mut diag = Diagnostics::new();
        diag.add_note("first", SourceLocation::point(1, 0), "");
        diag.add_error("second", SourceLocation::point(2, 0), "a hint");
        diag.add_warning("third", SourceLocation::point(3, 0), "");

        let messages: Vec<_> = diag.entries().iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_error_flag_and_count() {
        let mut diag = Diagnostics::new();
        assert!(!diag.has_errors());

        diag.add_warning("w", SourceLocation::point(1, 0), "");
        assert!(!diag.has_errors());

        diag.add_error("e1", SourceLocation::point(1, 0), "");
        diag.add_error("e2", SourceLocation::point(1, 0), "");
        assert!(diag.has_errors());
        assert_eq!(diag.error_count(), 2);
    }

    #[test]
    fn test_empty_hint_is_none() {
        let mut diag = Diagnostics::new();
        diag.add_error("e", SourceLocation::point(1, 0), "");
        diag.add_error("f", SourceLocation::point(1, 0), "try this");
        assert_eq!(diag.entries()[0].hint, None);
        assert_eq!(diag.entries()[1].hint.as_deref(), Some("try this"));
    }
}
