//! The request loop and the state every handler works on

use std::any::Any;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use pob_engine::Engine;
use tracing::{debug, error, info, warn};

use crate::errors::{CommandError, ProtocolError};
use crate::paths::PathResolver;
use crate::protocol::{decode, write_line, write_ready, Envelope, Request};
use crate::registry::CommandRegistry;

/// Engine, current build and builds directory of one bridge process
pub struct BridgeState<E: Engine> {
    pub engine: E,
    build: Option<E::Build>,
    pub paths: PathResolver,
    shutdown_requested: bool,
}

impl<E: Engine> BridgeState<E> {
    pub fn new(engine: E, paths: PathResolver) -> Self {
        Self {
            engine,
            build: None,
            paths,
            shutdown_requested: false,
        }
    }

    pub fn build(&self) -> Result<&E::Build, CommandError> {
        self.build.as_ref().ok_or(CommandError::NoBuild)
    }

    pub fn build_mut(&mut self) -> Result<&mut E::Build, CommandError> {
        self.build.as_mut().ok_or(CommandError::NoBuild)
    }

    pub fn has_build(&self) -> bool {
        self.build.is_some()
    }

    /// Make `build` the current build, dropping the previous one
    pub fn replace_build(&mut self, build: E::Build) {
        self.build = Some(build);
    }

    pub fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }
}

pub struct Session<E: Engine> {
    state: BridgeState<E>,
    registry: CommandRegistry<E>,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E, paths: PathResolver) -> Self {
        Self {
            state: BridgeState::new(engine, paths),
            registry: CommandRegistry::new(),
        }
    }

    pub fn state(&self) -> &BridgeState<E> {
        &self.state
    }

    /// Announce readiness, then answer requests until EOF or `shutdown`
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> Result<(), ProtocolError> {
        write_ready(&mut output)?;
        info!("Bridge ready, builds directory {}", self.state.paths.root());
        for line in input.lines() {
            let line = line.map_err(ProtocolError::Read)?;
            if line.trim().is_empty() {
                continue;
            }
            let envelope = self.handle_line(&line);
            write_line(&mut output, &envelope)?;
            if self.state.shutdown_requested() {
                info!("Shutdown requested");
                return Ok(());
            }
        }
        info!("Input closed");
        Ok(())
    }

    pub fn handle_line(&mut self, line: &str) -> Envelope {
        match decode(line) {
            Ok(request) => self.dispatch(&request),
            Err(e) => {
                warn!("Rejected request: {}", e);
                Envelope::failure(e.to_string())
            }
        }
    }

    /// Run one request; no handler failure escapes this call
    pub fn dispatch(&mut self, request: &Request) -> Envelope {
        let command = request.command.as_str();
        let Some(handler) = self.registry.get(command) else {
            let err = ProtocolError::UnknownCommand(command.to_string());
            warn!("{}", err);
            return Envelope::failure(err.to_string());
        };

        let start = Instant::now();
        let state = &mut self.state;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(state, &request.params)));
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(Ok(result)) => {
                debug!(command, ok = true, elapsed_ms, "Command completed");
                Envelope::success(result)
            }
            Ok(Err(err)) => {
                debug!(command, ok = false, elapsed_ms, "Command completed");
                warn!(command, "Command failed: {}", err);
                Envelope::failure(err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(command, "Command panicked: {}", message);
                Envelope::failure(format!("Internal error: {}", message))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Params;
    use pob_engine::memory::MemoryEngine;
    use serde_json::Value;

    fn session() -> Session<MemoryEngine> {
        Session::new(MemoryEngine::new(), PathResolver::new("/tmp/pob-bridge-unused", "/"))
    }

    fn explode(_: &mut BridgeState<MemoryEngine>, _: &Params) -> Result<Value, CommandError> {
        panic!("engine exploded")
    }

    #[test]
    fn test_panicking_handler_is_reported() {
        let mut session = session();
        session.registry.register("explode", explode);
        let envelope = session.handle_line(r#"{"command":"explode"}"#);
        assert!(!envelope.is_ok());
        let Ok(json) = serde_json::to_value(&envelope) else {
            panic!("envelope should encode");
        };
        assert_eq!(json["error"], "Internal error: engine exploded");

        // The session keeps working afterwards
        assert!(session.handle_line(r#"{"command":"ping"}"#).is_ok());
    }

    #[test]
    fn test_unknown_command() {
        let mut session = session();
        let Ok(json) = serde_json::to_value(session.handle_line(r#"{"command":"fly"}"#)) else {
            panic!("envelope should encode");
        };
        assert_eq!(json["error"], "Unknown command: fly");
    }

    #[test]
    fn test_build_is_required() {
        let mut session = session();
        assert!(!session.state().has_build());
        let Ok(json) = serde_json::to_value(session.handle_line(r#"{"command":"get_build_info"}"#))
        else {
            panic!("envelope should encode");
        };
        assert_eq!(json["error"], "No build loaded");
    }
}
