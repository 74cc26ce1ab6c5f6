use pob_engine::EngineError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while driving the embedded Lua engine
#[derive(Error, Debug)]
pub enum LuaEngineError {
    #[error("Lua error: {0}")]
    Lua(String),

    #[error("Engine root not found or invalid at: {0}")]
    RootNotFound(PathBuf),

    #[error("Headless script not found: {0}")]
    MissingScript(PathBuf),

    #[error("Missing Lua global '{0}'")]
    MissingGlobal(String),

    #[error("Failed to initialize Lua engine: {0}")]
    Initialization(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Generic conversion from mlua::Error.
///
/// The Lua traceback is kept in the message, which is what callers see.
impl From<mlua::Error> for LuaEngineError {
    fn from(err: mlua::Error) -> Self {
        LuaEngineError::Lua(err.to_string())
    }
}

impl From<LuaEngineError> for EngineError {
    fn from(err: LuaEngineError) -> Self {
        match err {
            LuaEngineError::Lua(message) => EngineError::Host(message),
            LuaEngineError::Io(err) => EngineError::Io(err),
            other => EngineError::Initialization(other.to_string()),
        }
    }
}

/// Lua failure raised inside a host operation
pub(crate) fn host_error(err: mlua::Error) -> EngineError {
    EngineError::Host(err.to_string())
}
