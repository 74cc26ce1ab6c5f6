//! Lua values as engine host values
//!
//! Tables are wrapped, not copied: a [`LuaHostTable`] lists its entries
//! only when asked, so consumers that stop at a depth limit never touch the
//! rest of the graph.

use std::rc::Rc;

use mlua::{Table, Value};
use pob_engine::{HostKey, HostTable, HostValue, OpaqueKind};

/// Host view of a Lua table
pub struct LuaHostTable(pub Table);

impl HostTable for LuaHostTable {
    fn entries(&self) -> Vec<(HostKey, HostValue)> {
        let mut entries = Vec::new();
        let _ = self.0.for_each(|key: Value, value: Value| {
            entries.push((to_host_key(&key), to_host(value)));
            Ok(())
        });
        entries
    }

    fn get(&self, key: &str) -> Option<HostValue> {
        match self.0.get::<Value>(key) {
            Ok(Value::Nil) | Err(_) => None,
            Ok(value) => Some(to_host(value)),
        }
    }
}

pub fn to_host(value: Value) -> HostValue {
    match value {
        Value::Nil => HostValue::Nil,
        Value::Boolean(b) => HostValue::Boolean(b),
        Value::Integer(i) => HostValue::Integer(i as i64),
        Value::Number(n) => HostValue::Number(n),
        Value::String(s) => HostValue::String(s.to_string_lossy().to_string()),
        Value::Table(t) => HostValue::Table(Rc::new(LuaHostTable(t))),
        Value::Function(_) => HostValue::Opaque(OpaqueKind::Function),
        Value::UserData(_) | Value::LightUserData(_) => HostValue::Opaque(OpaqueKind::UserData),
        Value::Thread(_) => HostValue::Opaque(OpaqueKind::Thread),
        _ => HostValue::Opaque(OpaqueKind::Other),
    }
}

fn to_host_key(key: &Value) -> HostKey {
    match key {
        Value::Integer(i) => HostKey::Integer(*i as i64),
        Value::Number(n) => HostKey::Number(*n),
        Value::String(s) => HostKey::String(s.to_string_lossy().to_string()),
        _ => HostKey::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlua::Lua;

    fn number(value: Option<HostValue>) -> Option<f64> {
        match value? {
            HostValue::Integer(i) => Some(i as f64),
            HostValue::Number(n) => Some(n),
            _ => None,
        }
    }

    fn eval(lua: &Lua, code: &str) -> Value {
        lua.load(code).eval::<Value>().unwrap_or(Value::Nil)
    }

    #[test]
    fn test_primitives_convert() {
        let lua = Lua::new();
        assert!(matches!(to_host(eval(&lua, "return nil")), HostValue::Nil));
        assert!(matches!(to_host(eval(&lua, "return true")), HostValue::Boolean(true)));
        assert!(matches!(to_host(eval(&lua, "return 'Life'")), HostValue::String(s) if s == "Life"));
        assert!(matches!(
            to_host(eval(&lua, "return print")),
            HostValue::Opaque(OpaqueKind::Function)
        ));
        assert_eq!(number(Some(to_host(eval(&lua, "return 1.5")))), Some(1.5));
    }

    #[test]
    fn test_table_entries_are_lazy_views() {
        let lua = Lua::new();
        let value = to_host(eval(
            &lua,
            "local t = { Life = 120, { 1, 2 } }; t.self = t; return t",
        ));
        let Some(table) = value.as_table() else {
            panic!("expected a table");
        };
        let entries = table.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().any(|(k, _)| k.as_index() == Some(1)));

        let inner = value.get("self").and_then(|v| v.get("Life"));
        assert_eq!(number(inner), Some(120.0));
        assert!(value.get("missing").is_none());
    }
}
