//! Passive tree commands

use pob_engine::{Build, Engine, NodeSummary};
use serde_json::{json, Value};

use super::{contains_ci, success, to_json};
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;

const DEFAULT_SEARCH_RESULTS: usize = 50;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("alloc_node", alloc_node);
    registry.register("dealloc_node", dealloc_node);
    registry.register("list_alloc_nodes", list_alloc_nodes);
    registry.register("search_nodes", search_nodes);
    registry.register("get_node_info", get_node_info);
}

fn alloc_node<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let id = params.required_id("node_id")?;
    let build = state.build_mut()?;
    let node = build.node(id)?.ok_or(CommandError::NodeNotFound(id))?;
    if node.alloc {
        return Ok(json!({ "success": true, "already_allocated": true }));
    }
    build.alloc_node(id)?;
    build.recalculate()?;
    Ok(success())
}

fn dealloc_node<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let id = params.required_id("node_id")?;
    let build = state.build_mut()?;
    let node = build.node(id)?.ok_or(CommandError::NodeNotFound(id))?;
    if !node.alloc {
        return Ok(json!({ "success": true, "already_deallocated": true }));
    }
    build.dealloc_node(id)?;
    build.recalculate()?;
    Ok(success())
}

fn list_alloc_nodes<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    let nodes: Vec<NodeSummary> = state
        .build()?
        .allocated_nodes()?
        .iter()
        .map(NodeSummary::from)
        .collect();
    Ok(json!({ "nodes": to_json(&nodes)?, "count": nodes.len() }))
}

fn search_nodes<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let query = params.required_text("query")?.trim().to_lowercase();
    let max_results = params.max_results(DEFAULT_SEARCH_RESULTS)?;
    let nodes: Vec<NodeSummary> = state
        .build()?
        .nodes()?
        .filter(|node| node.name.as_deref().is_some_and(|name| contains_ci(name, &query)))
        .take(max_results)
        .map(|node| NodeSummary::from(&node))
        .collect();
    Ok(json!({ "nodes": to_json(&nodes)?, "count": nodes.len() }))
}

fn get_node_info<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let id = params.required_id("node_id")?;
    let node = state.build()?.node(id)?.ok_or(CommandError::NodeNotFound(id))?;
    to_json(&node)
}
