//! Build lifecycle: create, import, export and the session commands

use pob_engine::{Build, Engine};
use serde_json::{json, Value};

use super::{success, to_json};
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;

const DEFAULT_IMPORT_NAME: &str = "Imported Build";

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("ping", ping);
    registry.register("new_build", new_build);
    registry.register("load_build_xml", load_build_xml);
    registry.register("get_build_info", get_build_info);
    registry.register("get_build_xml", get_build_xml);
    registry.register("shutdown", shutdown);
}

fn ping<E: Engine>(_state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    Ok(json!({ "pong": true }))
}

fn new_build<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    let mut build = state.engine.new_build()?;
    build.recalculate()?;
    state.replace_build(build);
    Ok(success())
}

fn load_build_xml<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let xml = params.required_text("xml")?;
    let name = params.str_or("name", DEFAULT_IMPORT_NAME)?;
    let mut build = state.engine.load_build_xml(xml, name)?;
    build.recalculate()?;
    state.replace_build(build);
    Ok(success())
}

fn get_build_info<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    to_json(&state.build()?.info()?)
}

fn get_build_xml<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    Ok(json!({ "xml": state.build()?.to_xml()? }))
}

fn shutdown<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    state.request_shutdown();
    Ok(success())
}
