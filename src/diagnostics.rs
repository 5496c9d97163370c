//! Diagnostic collection for the semantic passes.
//!
//! Recoverable errors (unresolved names, redeclarations, type disagreements,
//! bad call arity, constant division by zero) are collected here and the
//! reporting pass continues with a safe placeholder, so one mistake never
//! masks the rest of the diagnostics. Fatal conditions are a separate
//! [`FatalError`] value that travels through `Result` and aborts the
//! compilation.

use colored::Colorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DiagnosticKind {
    /// Identifier not bound in any enclosing scope
    #[strum(serialize = "lookup")]
    Lookup,
    /// Same name bound twice in one scope
    #[strum(serialize = "redeclaration")]
    Redeclaration,
    /// Operator, assignment, return or argument type disagreement
    #[strum(serialize = "type mismatch")]
    TypeMismatch,
    /// Call argument count does not match the parameter count
    #[strum(serialize = "arity")]
    Arity,
    /// Literal division by a literal zero caught while building the DAG
    #[strum(serialize = "constant division by zero")]
    ConstantDivideByZero,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}{} {}",
            "error".red().bold(),
            "[".bold(),
            self.kind.to_string().bold(),
            "]:".bold(),
            self.message
        )
    }
}

/// Append-only collection of recoverable diagnostics
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.items.push(Diagnostic::new(kind, message));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn count_of(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }
}

/// Unrecoverable failures. There is no retry or spill path: hitting one of
/// these aborts the compilation immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FatalError {
    /// The scratch register pool was exhausted while generating code for a
    /// function. Spilling to memory is not implemented.
    RegisterExhaustion { function: String },
}

impl core::fmt::Display for FatalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RegisterExhaustion { function } => {
                write!(
                    f,
                    "{}: out of scratch registers while compiling `{function}`",
                    "fatal".red().bold()
                )
            }
        }
    }
}

impl std::error::Error for FatalError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order_and_counts_by_kind() {
        let mut diagnostics = Diagnostics::new();

        diagnostics.report(DiagnosticKind::Lookup, "use of undeclared identifier `x`");
        diagnostics.report(DiagnosticKind::TypeMismatch, "expected `int`, found `bool`");
        diagnostics.report(DiagnosticKind::Lookup, "use of undeclared identifier `y`");

        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics.count_of(DiagnosticKind::Lookup), 2);
        assert_eq!(diagnostics.count_of(DiagnosticKind::Arity), 0);

        let first = diagnostics.iter().next().unwrap();
        assert_eq!(first.kind, DiagnosticKind::Lookup);
        assert!(first.message.contains("`x`"));
    }

    #[test]
    fn fatal_error_names_the_function() {
        let error = FatalError::RegisterExhaustion {
            function: "main".into(),
        };

        assert!(error.to_string().contains("main"));
    }
}
