//! Layout constants of the engine checkout and field readers for Lua tables
//!
//! Engine tables are loosely typed: numbers sometimes arrive as strings and
//! optional fields are simply absent. The readers here never fail; a field
//! that is missing or of the wrong type reads as `None`.

use mlua::{Table, Value};

/// Directory holding the engine's Lua sources, relative to its root
pub const SRC_DIR: &str = "src";

/// Script that boots the engine without its UI
pub const HEADLESS_SCRIPT: &str = "HeadlessWrapper.lua";

/// Module search path, relative to [`SRC_DIR`]
pub const LUA_PATH: &str = "../runtime/lua/?.lua;../runtime/lua/?/init.lua;";

/// Native module search path, relative to [`SRC_DIR`]
#[cfg(windows)]
pub const LUA_CPATH: &str = "../runtime/?.dll;";

pub(crate) fn field(table: &Table, key: &str) -> Value {
    table.get::<Value>(key).unwrap_or(Value::Nil)
}

pub(crate) fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.to_string_lossy().to_string()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(format_number(*n)),
        _ => None,
    }
}

pub(crate) fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Number(n) => Some(*n),
        Value::String(s) => s.to_string_lossy().trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn opt_string(table: &Table, key: &str) -> Option<String> {
    value_string(&field(table, key))
}

pub(crate) fn opt_number(table: &Table, key: &str) -> Option<f64> {
    value_number(&field(table, key))
}

pub(crate) fn opt_u32(table: &Table, key: &str) -> Option<u32> {
    opt_number(table, key)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u32)
}

pub(crate) fn opt_table(table: &Table, key: &str) -> Option<Table> {
    match field(table, key) {
        Value::Table(t) => Some(t),
        _ => None,
    }
}

/// Lua truthiness of a field
pub(crate) fn flag(table: &Table, key: &str) -> bool {
    !matches!(field(table, key), Value::Nil | Value::Boolean(false))
}

/// Values at `1..=#table`, keeping those `f` accepts
pub(crate) fn sequence<T>(table: &Table, f: impl Fn(Value) -> Option<T>) -> Vec<T> {
    (1..=table.raw_len())
        .filter_map(|i| table.raw_get::<Value>(i).ok())
        .filter_map(f)
        .collect()
}

/// Sequence field of strings
pub(crate) fn string_list(table: &Table, key: &str) -> Vec<String> {
    opt_table(table, key)
        .map(|t| sequence(&t, |v| value_string(&v)))
        .unwrap_or_default()
}

/// `(key, table)` entries of a table keyed by strings or numbers
pub(crate) fn keyed_tables(table: &Table) -> Vec<(String, Table)> {
    let mut entries = Vec::new();
    let _ = table.for_each(|key: Value, value: Value| {
        if let (Some(key), Value::Table(t)) = (value_string(&key), value) {
            entries.push((key, t));
        }
        Ok(())
    });
    entries
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
