//! Registry error types
//!
//! Error types for broadcast hub operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Hub has been closed for shutdown; no new subscribers
    Closed,
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Closed => write!(f, "Broadcast hub is closed"),
        }
    }
}

impl std::error::Error for RegistryError {}
