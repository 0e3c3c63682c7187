//! The closed error taxonomy used throughout the engine.
//!
//! Every fallible entry point in this crate returns a [`GraphError`] variant
//! from this module rather than a bespoke per-module error type, so that a
//! caller walking up through graph, network, and algorithm layers only ever
//! has to match on one enum. Each variant carries a human-readable message
//! plus a small context map for diagnostics; the engine itself never logs
//! these, it only returns them (see the crate-level docs).

use std::collections::BTreeMap;
use std::fmt;

/// Structured diagnostic context attached to a [`GraphError`].
///
/// Kept as a sorted map so that `Display` output and JSON export are
/// deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorContext(pub BTreeMap<String, String>);

impl ErrorContext {
    pub fn new() -> Self {
        ErrorContext(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.0.insert(key.into(), value.to_string());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, " [")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "]")
    }
}

/// The error kinds enumerated in the specification's error-handling design.
///
/// `CapacityExhausted`/`Unplaceable` are deliberately absent here: the
/// specification treats them as a data value (`placed`/`remaining`), not an
/// exception, so they are never constructed as a `GraphError`.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum GraphError {
    /// A referenced node or edge is absent.
    #[error("unknown entity: {message}{context}")]
    UnknownEntity {
        message: String,
        context: ErrorContext,
    },

    /// Attempted re-addition of a node, or reuse of an edge id.
    #[error("duplicate entity: {message}{context}")]
    DuplicateEntity {
        message: String,
        context: ErrorContext,
    },

    /// Inconsistent parameters, unsupported policy, `src == dst`, invalid regex, etc.
    #[error("invalid argument: {message}{context}")]
    InvalidArgument {
        message: String,
        context: ErrorContext,
    },

    /// A selection expression matched zero sources or sinks.
    #[error("no match: {message}{context}")]
    NoMatch {
        message: String,
        context: ErrorContext,
    },
}

impl GraphError {
    pub fn unknown_entity(message: impl Into<String>) -> Self {
        GraphError::UnknownEntity {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn duplicate_entity(message: impl Into<String>) -> Self {
        GraphError::DuplicateEntity {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        GraphError::InvalidArgument {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn no_match(message: impl Into<String>) -> Self {
        GraphError::NoMatch {
            message: message.into(),
            context: ErrorContext::new(),
        }
    }

    /// Attaches (or extends) the diagnostic context map for this error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        let ctx = match &mut self {
            GraphError::UnknownEntity { context, .. }
            | GraphError::DuplicateEntity { context, .. }
            | GraphError::InvalidArgument { context, .. }
            | GraphError::NoMatch { context, .. } => context,
        };
        ctx.0.insert(key.into(), value.to_string());
        self
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_renders_sorted() {
        let err = GraphError::unknown_entity("node missing")
            .with_context("node", "B")
            .with_context("op", "add_edge");
        let rendered = err.to_string();
        assert!(rendered.contains("node=B"));
        assert!(rendered.contains("op=add_edge"));
        assert!(rendered.find("node=B").unwrap() < rendered.find("op=add_edge").unwrap());
    }
}
