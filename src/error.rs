//! Library error surface.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A component asked for a bar the window does not hold yet (or ever).
    /// Handled internally by skipping the dependent check for this bar.
    #[error("insufficient history: requested {requested} bars ago, window holds {available}")]
    InsufficientHistory { requested: usize, available: usize },

    /// Rejected at construction time. Never silently patched with defaults.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// A collaborator input (smoothed range / ATR) was absent where a
    /// threshold needed it. Components degrade to neutral behavior instead
    /// of surfacing this from `process_bar`.
    #[error("missing collaborator value: {0}")]
    MissingCollaboratorValue(&'static str),
}

pub type EngineResult<T> = Result<T, EngineError>;
