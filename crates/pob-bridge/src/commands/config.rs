//! Configuration inputs and custom modifiers

use pob_engine::{Build, ConfigValue, Engine};
use serde_json::Value;

use super::success;
use crate::errors::CommandError;
use crate::params::Params;
use crate::registry::CommandRegistry;
use crate::session::BridgeState;

pub fn register<E: Engine>(registry: &mut CommandRegistry<E>) {
    registry.register("set_config", set_config);
    registry.register("set_custom_mods", set_custom_mods);
}

/// Map the JSON `value` parameter onto a config input; `null` clears it
fn config_value(params: &Params) -> Result<ConfigValue, CommandError> {
    if !params.contains("value") {
        return Err(CommandError::MissingParam("value"));
    }
    match params.get("value") {
        None => Ok(ConfigValue::Clear),
        Some(Value::Bool(b)) => Ok(ConfigValue::Boolean(*b)),
        Some(Value::Number(n)) => n.as_f64().map(ConfigValue::Number).ok_or(CommandError::InvalidParam {
            name: "value",
            expected: "a finite number",
        }),
        Some(Value::String(s)) => Ok(ConfigValue::String(s.clone())),
        Some(_) => Err(CommandError::InvalidParam {
            name: "value",
            expected: "a boolean, number, string or null",
        }),
    }
}

fn set_config<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let key = params.required_text("key")?;
    let value = config_value(params)?;
    let build = state.build_mut()?;
    build.set_config(key, &value)?;
    build.recalculate()?;
    Ok(success())
}

fn set_custom_mods<E: Engine>(state: &mut BridgeState<E>, params: &Params) -> Result<Value, CommandError> {
    let mods = params.required_str("mods")?;
    let build = state.build_mut()?;
    build.set_custom_mods(mods)?;
    build.recalculate()?;
    Ok(success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{error_of, params, state};
    use pob_engine::memory::MemoryEngine;
    use pob_engine::HostValue;
    use serde_json::json;

    fn loaded() -> BridgeState<MemoryEngine> {
        let mut state = state();
        if let Ok(build) = state.engine.new_build() {
            state.replace_build(build);
        }
        state
    }

    #[test]
    fn test_config_values() {
        let mut state = loaded();
        let cases = [
            (json!({ "key": "enemyIsBoss", "value": true }), Some(ConfigValue::Boolean(true))),
            (json!({ "key": "enemyLevel", "value": 84 }), Some(ConfigValue::Number(84.0))),
            (json!({ "key": "bandit", "value": "None" }), Some(ConfigValue::String("None".to_string()))),
            (json!({ "key": "enemyIsBoss", "value": null }), None),
        ];
        for (p, expected) in cases {
            assert!(set_config(&mut state, &params(p.clone())).is_ok());
            let key = p["key"].as_str().unwrap_or_default();
            let stored = state.build().ok().and_then(|b| b.config_value(key).cloned());
            assert_eq!(stored, expected, "{}", p);
        }
    }

    #[test]
    fn test_config_value_errors() {
        let mut state = loaded();
        assert_eq!(
            error_of(set_config(&mut state, &params(json!({ "key": "enemyLevel" })))),
            "Missing required parameter: value"
        );
        assert_eq!(
            error_of(set_config(&mut state, &params(json!({ "key": "x", "value": [1] })))),
            "Invalid parameter 'value': expected a boolean, number, string or null"
        );
    }

    #[test]
    fn test_custom_mods_recalculate() {
        let mut state = loaded();
        let p = params(json!({ "mods": "+40 to maximum Life" }));
        assert!(set_custom_mods(&mut state, &p).is_ok());
        let life = state
            .build()
            .ok()
            .and_then(|b| b.output().ok())
            .and_then(|o| o.get("Life"));
        assert!(matches!(life, Some(HostValue::Number(n)) if n == 140.0));
    }
}
