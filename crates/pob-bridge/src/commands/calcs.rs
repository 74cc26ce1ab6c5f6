//! Calculated output queries
//!
//! The output mapping belongs to the engine and can be arbitrarily deep, so
//! everything read from it goes through the bounded serializer.

use pob_engine::{Build, Engine, HostValue};
use serde_json::{json, Map, Value};

use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::serializer::{serialize, to_json};
use crate::session::BridgeState;

/// Stats returned by `get_output` when the caller names none
pub const DEFAULT_STATS: [&str; 16] = [
    "TotalDPS",
    "CombinedDPS",
    "FullDPS",
    "Life",
    "EnergyShield",
    "Mana",
    "Spirit",
    "FireResist",
    "ColdResist",
    "LightningResist",
    "ChaosResist",
    "Armour",
    "Evasion",
    "TotalEHP",
    "Speed",
    "CritChance",
];

/// Depth at which members of the output mapping sit
const STAT_DEPTH: usize = 1;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("get_output", get_output);
    registry.register("get_full_output", get_full_output);
    registry.register("get_stat", get_stat);
    registry.register("get_stats_list", get_stats_list);
}

fn lookup(output: &HostValue, key: &str) -> Option<HostValue> {
    output.get(key).filter(|v| !matches!(v, HostValue::Nil))
}

/// `value`, `type` and `table_size` of a found stat
fn describe(value: &HostValue) -> Map<String, Value> {
    let mut entry = Map::new();
    if let Some(json) = serialize(value, STAT_DEPTH) {
        entry.insert("value".to_string(), json);
    }
    entry.insert("type".to_string(), json!(value.type_name()));
    if let Some(table) = value.as_table() {
        entry.insert("table_size".to_string(), json!(table.entries().len()));
    }
    entry
}

fn get_output<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let stats = params
        .string_list("stats")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_STATS.iter().map(|s| (*s).to_string()).collect());
    let output = state.build()?.output()?;

    let mut result = Map::new();
    for stat in stats {
        let Some(value) = lookup(&output, &stat).filter(HostValue::is_primitive) else {
            continue;
        };
        if let Some(json) = serialize(&value, STAT_DEPTH) {
            result.insert(stat, json);
        }
    }
    Ok(Value::Object(result))
}

fn get_full_output<E: Engine>(state: &mut BridgeState<E>, _params: &Params) -> Result<Value, CommandError> {
    Ok(to_json(&state.build()?.output()?))
}

fn get_stat<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let key = params.required_text("key")?;
    let output = state.build()?.output()?;
    let Some(value) = lookup(&output, key) else {
        return Ok(json!({ "key": key, "found": false }));
    };
    let mut result = Map::new();
    result.insert("key".to_string(), json!(key));
    result.insert("found".to_string(), json!(true));
    result.extend(describe(&value));
    Ok(Value::Object(result))
}

fn get_stats_list<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let keys = params
        .string_list("keys")?
        .ok_or(CommandError::MissingParam("keys"))?;
    let output = state.build()?.output()?;

    let mut found = Map::new();
    let mut not_found = Vec::new();
    for key in &keys {
        match lookup(&output, key) {
            Some(value) => {
                found.insert(key.clone(), Value::Object(describe(&value)));
            }
            None => not_found.push(key.clone()),
        }
    }
    Ok(json!({
        "found_count": found.len(),
        "found": found,
        "not_found": not_found,
        "count": keys.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{error_of, params, state};
    use pob_engine::memory::MemoryEngine;

    fn loaded() -> BridgeState<MemoryEngine> {
        let mut state = state();
        if let Ok(build) = state.engine.new_build() {
            state.replace_build(build);
        }
        state
    }

    #[test]
    fn test_get_output_default_stats() {
        let mut state = loaded();
        let Ok(output) = get_output(&mut state, &Params::default()) else {
            panic!("output should be available");
        };
        assert_eq!(output["Life"], 100);
        assert_eq!(output["Speed"], 1.5);
        // Only stats the engine produced are reported
        assert!(output.get("Armour").is_none());
    }

    #[test]
    fn test_get_output_skips_tables_and_non_finite() {
        let mut state = loaded();
        let p = params(json!({ "stats": ["Life", "Resists", "Infinity", "Missing"] }));
        let Ok(output) = get_output(&mut state, &p) else {
            panic!("output should be available");
        };
        assert_eq!(output, json!({ "Life": 100 }));
    }

    #[test]
    fn test_full_output_is_bounded() {
        let mut state = loaded();
        let Ok(output) = get_full_output(&mut state, &Params::default()) else {
            panic!("output should be available");
        };
        assert_eq!(output["Resists"]["Fire"], 0);
        assert!(output.get("Infinity").is_none());
        assert!(output["Breakdown"].get("calculate").is_none());
        assert_eq!(output["Breakdown"]["parent"]["Life"], 100);
    }

    #[test]
    fn test_get_stat() {
        let mut state = loaded();
        let Ok(life) = get_stat(&mut state, &params(json!({ "key": "Life" }))) else {
            panic!("stat should resolve");
        };
        assert_eq!(life, json!({ "key": "Life", "found": true, "value": 100, "type": "number" }));

        let Ok(resists) = get_stat(&mut state, &params(json!({ "key": "Resists" }))) else {
            panic!("stat should resolve");
        };
        assert_eq!(resists["type"], "table");
        assert_eq!(resists["table_size"], 3);

        let Ok(missing) = get_stat(&mut state, &params(json!({ "key": "Nope" }))) else {
            panic!("missing stat is not an error");
        };
        assert_eq!(missing, json!({ "key": "Nope", "found": false }));
        assert_eq!(
            error_of(get_stat(&mut state, &Params::default())),
            "Missing required parameter: key"
        );
    }

    #[test]
    fn test_get_stats_list() {
        let mut state = loaded();
        let p = params(json!({ "keys": ["Life", "Infinity", "Nope"] }));
        let Ok(result) = get_stats_list(&mut state, &p) else {
            panic!("stats should resolve");
        };
        assert_eq!(result["count"], 3);
        assert_eq!(result["found_count"], 2);
        assert_eq!(result["found"]["Life"]["value"], 100);
        assert!(result["found"]["Infinity"].get("value").is_none());
        assert_eq!(result["not_found"], json!(["Nope"]));
    }
}
