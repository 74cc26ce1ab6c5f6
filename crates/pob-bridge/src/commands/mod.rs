//! Command handlers, grouped by the part of the build they touch
//!
//! Every handler has the [`Handler`](crate::registry::Handler) signature.
//! Handlers that mutate the build trigger one recalculation before they
//! return.

pub mod build;
pub mod calcs;
pub mod catalog;
pub mod config;
pub mod files;
pub mod items;
pub mod skills;
pub mod tree;

use pob_engine::Engine;
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::CommandError;
use crate::registry::CommandRegistry;

pub fn register_all<E: Engine>(registry: &mut CommandRegistry<E>) {
    build::register(registry);
    tree::register(registry);
    items::register(registry);
    skills::register(registry);
    calcs::register(registry);
    catalog::register(registry);
    config::register(registry);
    files::register(registry);
}

fn success() -> Value {
    json!({ "success": true })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, CommandError> {
    Ok(serde_json::to_value(value)?)
}

/// Case-insensitive substring match against an already lowercased needle
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}
