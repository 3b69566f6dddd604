//! Errors raised while turning local paths into publish paths.

use thiserror::Error;

/// Path normalization errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("{path} is not under the publish root {root}")]
    PathOutsideRoot { path: String, root: String },

    #[error("Scope {scope} leaves the publish root")]
    ScopeEscapesRoot { scope: String },
}
