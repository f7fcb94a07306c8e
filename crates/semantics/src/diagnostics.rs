//! Diagnostic collection for the semantic core.
//!
//! Every pass reports through an owned [`DiagnosticBag`] rather than
//! constructing its own error channel, so there is exactly one place that
//! accumulates user-visible failures (see the "no global mutable state"
//! design note). Truly unrecoverable situations (parser contract violations,
//! unimplemented features) are not diagnostics at all: they panic.

use std::fmt;

/// A single source location, in 1-based line/column terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(line: u32, column: u32) -> Self {
        SourceLocation { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Taxonomy of recoverable semantic errors (see spec §7). Parse invariant
/// violations and unsupported constructs are not represented here because
/// they are fatal and surface as panics, never as a `Diagnostic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    DuplicateDefinition,
    UnknownIdentifier,
    UnknownType,
    NoMatchingOverload,
    AmbiguousDispatch,
    TypeMismatch,
    AmbiguousNarrowing,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::DuplicateDefinition => "duplicate definition",
            DiagnosticKind::UnknownIdentifier => "unknown identifier",
            DiagnosticKind::UnknownType => "unknown type",
            DiagnosticKind::NoMatchingOverload => "no matching overload",
            DiagnosticKind::AmbiguousDispatch => "ambiguous dispatch",
            DiagnosticKind::TypeMismatch => "type mismatch",
            DiagnosticKind::AmbiguousNarrowing => "ambiguous narrowing",
        };
        write!(f, "{s}")
    }
}

/// One reported error, anchored to the original identifier that caused it
/// (never to a rewritten/resolved name, so the message stays stable across
/// re-runs of inference).
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub file: String,
    pub location: SourceLocation,
    pub source_line: Option<String>,
}

impl Diagnostic {
    pub fn new(
        kind: DiagnosticKind,
        message: impl Into<String>,
        file: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Diagnostic {
            kind,
            message: message.into(),
            file: file.into(),
            location,
            source_line: None,
        }
    }

    pub fn with_source_line(mut self, line: impl Into<String>) -> Self {
        self.source_line = Some(line.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.file, self.location, self.kind, self.message
        )?;
        if let Some(line) = &self.source_line {
            write!(f, "\n    {line}")?;
        }
        Ok(())
    }
}

/// Accumulates diagnostics across a compilation run. Errors bubble up
/// through a node's inference state to *failed* but sibling inference
/// continues, so a single run can surface many diagnostics (spec §7).
#[derive(Debug, Clone, Default)]
pub struct DiagnosticBag {
    entries: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        DiagnosticBag::default()
    }

    pub fn report(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(kind = %diagnostic.kind, file = %diagnostic.file, "diagnostic reported");
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diagnostics in source order (insertion order matches visit order
    /// because inference visits in fixed, deterministic order — spec §5).
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_accumulate_in_order() {
        let mut bag = DiagnosticBag::new();
        bag.report(Diagnostic::new(
            DiagnosticKind::UnknownIdentifier,
            "`foo` is not defined",
            "main.ember",
            SourceLocation::new(3, 5),
        ));
        bag.report(Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            "expected integer, got string",
            "main.ember",
            SourceLocation::new(4, 1),
        ));

        assert_eq!(bag.len(), 2);
        let messages: Vec<_> = bag.iter().map(|d| d.kind).collect();
        assert_eq!(
            messages,
            vec![DiagnosticKind::UnknownIdentifier, DiagnosticKind::TypeMismatch]
        );
    }

    #[test]
    fn empty_bag_has_no_errors() {
        let bag = DiagnosticBag::new();
        assert!(!bag.has_errors());
        assert!(bag.is_empty());
    }

    #[test]
    fn display_includes_source_line_when_present() {
        let diag = Diagnostic::new(
            DiagnosticKind::NoMatchingOverload,
            "no overload of `f` takes 0 arguments",
            "main.ember",
            SourceLocation::new(10, 2),
        )
        .with_source_line("f()");
        let rendered = diag.to_string();
        assert!(rendered.contains("main.ember:10:2"));
        assert!(rendered.contains("f()"));
    }
}
