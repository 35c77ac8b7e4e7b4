//! Error types for ns-frame.

use thiserror::Error;

/// Column graph definition errors.
///
/// All of these are raised before the first row is evaluated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A column with this name is already registered.
    #[error("duplicate column: '{0}'")]
    DuplicateColumn(String),

    /// A column lists a dependency that is not registered.
    #[error("column '{column}' depends on unknown column '{dependency}'")]
    UnknownDependency {
        /// Column declaring the dependency.
        column: String,
        /// Missing dependency name.
        dependency: String,
    },

    /// A requested column (e.g. bound to a histogram) is not registered.
    #[error("unknown column: '{0}'")]
    UnknownColumn(String),

    /// The dependency chain loops back on itself.
    ///
    /// The path starts and ends with the same column name.
    #[error("cyclic dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// ns-frame error type
#[derive(Error, Debug)]
pub enum FrameError {
    /// Malformed input parameter (event count, binning, reference frame).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Column graph definition error
    #[error("column graph error: {0}")]
    Graph(#[from] GraphError),

    /// A column evaluator received a value it cannot handle.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Lifecycle violation (second run, attaching after run, feeding a finalized sink).
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// Output container could not be opened, written or closed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FrameError>;
