//! Wire format: one JSON object per line in each direction
//!
//! Requests are `{"command": "...", "params": {...}}`. Every accepted line
//! gets exactly one envelope back, `{"ok":true,"result":...}` or
//! `{"ok":false,"error":"..."}`.

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::ProtocolError;
use crate::params::Params;

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub command: String,
    pub params: Params,
}

/// Decode one request line
pub fn decode(line: &str) -> Result<Request, ProtocolError> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    let Value::Object(mut object) = value else {
        return Err(ProtocolError::NotAnObject);
    };
    let command = match object.remove("command") {
        Some(Value::String(command)) if !command.is_empty() => command,
        _ => return Err(ProtocolError::MissingCommand),
    };
    let params = match object.remove("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params,
        Some(_) => return Err(ProtocolError::InvalidParams),
    };
    Ok(Request {
        command,
        params: Params::from(params),
    })
}

#[derive(Debug, Serialize)]
pub struct Envelope {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Envelope {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }
}

#[derive(Serialize)]
struct Ready {
    ready: bool,
}

/// Serialize `message` as a single line and flush it
pub fn write_line<W: Write, T: Serialize>(out: &mut W, message: &T) -> Result<(), ProtocolError> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    out.write_all(&line).map_err(ProtocolError::Write)?;
    out.flush().map_err(ProtocolError::Write)
}

pub fn write_ready<W: Write>(out: &mut W) -> Result<(), ProtocolError> {
    write_line(out, &Ready { ready: true })
}
