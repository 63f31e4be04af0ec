//! Error types for tnetck.
//!
//! All failures inside the crate are represented by [`TnError`] and
//! propagated via `Result<T, TnError>`. Callers at the CLI boundary map any
//! error to exit code 2.
//!
//! # Error Classification
//!
//! Errors fall into three categories that determine how a caller should
//! react:
//! - **Input** — malformed labels, files, or ill-defined networks. Fix the
//!   input and retry.
//! - **Arithmetic** — a weight sum left the representable range. The input
//!   is outside the safe domain; widen the weights or bound the instance.
//! - **Io** — filesystem or XML transport problems.
//!
//! Inconsistency of a network is *not* an error: it is a valid answer and
//! travels through [`crate::status::CheckStatus`]. Likewise a timeout is a
//! non-fatal status, not a `TnError`.

use std::fmt;

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum TnError {
    // ── Input errors — fix the instance ──────────────────────────────────
    /// A propositional label could not be parsed.
    #[error("label parse error: {0}")]
    LabelParse(String),

    /// An integer weight (possibly `∞`/`-∞`) could not be parsed.
    #[error("weight parse error: {0}")]
    ValueParse(String),

    /// The GraphML document is structurally invalid for the key schema.
    #[error("graphml parse error: {0}")]
    GraphmlParse(String),

    /// The network violates a well-definedness condition the initializer
    /// cannot repair.
    #[error("ill-defined network: {0}")]
    IllDefined(String),

    /// A node referenced by name does not exist.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// A node with this name already exists.
    #[error("node already exists: {0}")]
    DuplicateNode(String),

    /// An edge between this ordered node pair already exists.
    #[error("edge already exists: {0} -> {1}")]
    DuplicateEdge(String, String),

    /// An engine option is outside its documented range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    // ── Arithmetic errors — input outside the safe range ─────────────────
    /// A weight sum left the representable range.
    #[error("integer overflow summing {0} and {1}")]
    Overflow(i32, i32),

    // ── Alphabet errors — internal contract violations surfaced ─────────
    /// More than 64 distinct node names were registered for case labels.
    #[error("node-name alphabet full: cannot register '{0}' (max 64 names)")]
    AlphabetFull(String),

    /// Two case labels from different alphabets were combined.
    #[error("case labels from different alphabets cannot be combined")]
    MixedAlphabets,

    // ── Transport errors ─────────────────────────────────────────────────
    /// Filesystem error while reading or writing a network file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level XML error from the GraphML reader.
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// Coarse classification for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TnErrorKind {
    Input,
    Arithmetic,
    Io,
}

impl fmt::Display for TnErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TnErrorKind::Input => write!(f, "INPUT"),
            TnErrorKind::Arithmetic => write!(f, "ARITHMETIC"),
            TnErrorKind::Io => write!(f, "IO"),
        }
    }
}

impl TnError {
    /// Classify the error for reporting.
    pub fn kind(&self) -> TnErrorKind {
        match self {
            TnError::LabelParse(_)
            | TnError::ValueParse(_)
            | TnError::GraphmlParse(_)
            | TnError::IllDefined(_)
            | TnError::NodeNotFound(_)
            | TnError::DuplicateNode(_)
            | TnError::DuplicateEdge(_, _)
            | TnError::InvalidOption(_)
            | TnError::AlphabetFull(_)
            | TnError::MixedAlphabets => TnErrorKind::Input,

            TnError::Overflow(_, _) => TnErrorKind::Arithmetic,

            TnError::Io(_) | TnError::Xml(_) => TnErrorKind::Io,
        }
    }

    /// Whether the error can be fixed by repairing the input instance.
    pub fn is_input_error(&self) -> bool {
        self.kind() == TnErrorKind::Input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(TnError::LabelParse("x".into()).kind(), TnErrorKind::Input);
        assert_eq!(TnError::IllDefined("x".into()).kind(), TnErrorKind::Input);
        assert_eq!(TnError::Overflow(1, 2).kind(), TnErrorKind::Arithmetic);
        assert_eq!(
            TnError::Io(std::io::Error::other("x")).kind(),
            TnErrorKind::Io
        );
    }

    #[test]
    fn test_input_errors_are_input() {
        assert!(TnError::DuplicateNode("A".into()).is_input_error());
        assert!(TnError::MixedAlphabets.is_input_error());
        assert!(!TnError::Overflow(1, 2).is_input_error());
    }

    #[test]
    fn test_display_messages() {
        let e = TnError::DuplicateEdge("A".into(), "B".into());
        assert_eq!(e.to_string(), "edge already exists: A -> B");
        let e = TnError::Overflow(3, 4);
        assert!(e.to_string().contains("overflow"));
    }
}
