//! pob-bridge library
//!
//! The bridge exposes a Path of Building calculation engine over
//! line-delimited JSON on standard input and output. This crate holds
//! everything except the process entry point: the request loop, the command
//! handlers, the builds-directory sandbox and the serializer that turns
//! engine output into JSON.

pub mod build_files;
pub mod commands;
pub mod common;
pub mod errors;
pub mod params;
pub mod paths;
pub mod protocol;
pub mod registry;
pub mod serializer;
pub mod session;
pub mod skill_text;

use std::io::{BufRead, Write};

use pob_engine::Engine;

pub use common::{GlobalOpts, LogFormat};
pub use errors::BridgeError;
pub use paths::{BuildsCandidates, PathResolver};
pub use session::{BridgeState, Session};

/// Start a bridge session on `engine`.
///
/// Fails before anything is written when the engine reported a startup
/// error or the builds directory cannot be created. Otherwise writes the
/// ready line and serves requests until EOF or `shutdown`.
pub fn start<E, R, W>(
    engine: E,
    candidates: &BuildsCandidates,
    input: R,
    output: W,
) -> Result<(), BridgeError>
where
    E: Engine,
    R: BufRead,
    W: Write,
{
    if let Some(message) = engine.startup_message() {
        return Err(BridgeError::Startup(message));
    }
    let paths = candidates.detect()?;
    Session::new(engine, paths).serve(input, output)?;
    Ok(())
}
