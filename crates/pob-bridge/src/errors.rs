//! Error types for the bridge
//!
//! Every handler failure becomes a [`CommandError`] whose `Display` text is
//! the `error` string of the failure envelope, so the messages here are part
//! of the wire protocol.

use std::io;

use pob_engine::{EngineError, ItemId, NodeId};
use thiserror::Error;

/// Sandbox violations and builds-directory setup failures
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Path traversal detected: {0}")]
    Traversal(String),

    #[error("Path is outside the builds directory: {0}")]
    OutsideRoot(String),

    #[error("Failed to create builds directory {path}: {source}")]
    CreateDir { path: String, source: io::Error },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SkillTextError {
    #[error("No gems found in skill text. Expected lines like 'Fireball 20/0 1' (name level/quality [DISABLED] [count])")]
    NoGems,
}

/// Failure of a single command
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("No build loaded")]
    NoBuild,

    #[error("Missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("Invalid parameter '{name}': expected {expected}")]
    InvalidParam {
        name: &'static str,
        expected: &'static str,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    #[error("Skill group not found: {0}")]
    SkillGroupNotFound(usize),

    #[error("Skill group {index} is granted by an item ({granted_by}) and cannot be removed")]
    ItemSkillGroup { index: usize, granted_by: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Precondition(String),

    #[error(transparent)]
    SkillText(#[from] SkillTextError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Request framing errors and stream failures
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Request must be a JSON object")]
    NotAnObject,

    #[error("Missing 'command' field")]
    MissingCommand,

    #[error("'params' must be a JSON object")]
    InvalidParams,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Failed to read request: {0}")]
    Read(io::Error),

    #[error("Failed to write response: {0}")]
    Write(io::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures that end the bridge before or during a session
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Engine failed to start: {0}")]
    Startup(String),

    #[error(transparent)]
    BuildsDirectory(#[from] PathError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
