use std::io;
use thiserror::Error;

/// Errors raised by an engine while executing a host operation
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine failed to initialize: {0}")]
    Initialization(String),

    #[error("Engine error: {0}")]
    Host(String),

    #[error("Failed to parse item: {0}")]
    InvalidItem(String),

    #[error("Failed to load build: {0}")]
    InvalidBuild(String),

    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    #[error("Unknown modifier category: {0}")]
    UnknownCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for host operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::UnknownSlot("Weapon 3".to_string());
        assert_eq!(err.to_string(), "Unknown slot: Weapon 3");

        let err = EngineError::Host("attempt to index a nil value".to_string());
        assert_eq!(err.to_string(), "Engine error: attempt to index a nil value");
    }
}
