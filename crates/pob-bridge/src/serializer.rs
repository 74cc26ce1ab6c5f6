//! Depth-bounded conversion of engine-owned values to JSON
//!
//! Engine tables are arbitrary graphs: they nest deeply, reference each
//! other cyclically and hold functions. [`serialize`] walks them one level at
//! a time and stops at [`MAX_DEPTH`], so every walk terminates. Values that
//! cannot be represented are omitted rather than reported.

use pob_engine::{HostKey, HostTable, HostValue};
use serde_json::{Map, Number, Value};

pub const MAX_DEPTH: usize = 5;

/// Largest magnitude at which every integer is exactly representable in f64
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Convert `value` found at `depth`, or `None` when it is omitted
pub fn serialize(value: &HostValue, depth: usize) -> Option<Value> {
    if depth > MAX_DEPTH {
        return None;
    }
    match value {
        HostValue::Nil => Some(Value::Null),
        HostValue::Boolean(b) => Some(Value::Bool(*b)),
        HostValue::Integer(i) => Some(Value::from(*i)),
        HostValue::Number(n) => number(*n),
        HostValue::String(s) => Some(Value::String(s.clone())),
        HostValue::Table(table) => Some(serialize_table(table.as_ref(), depth)),
        HostValue::Opaque(_) => None,
    }
}

/// Serialize a top-level value, mapping omission to `null`
pub fn to_json(value: &HostValue) -> Value {
    serialize(value, 0).unwrap_or(Value::Null)
}

fn number(n: f64) -> Option<Value> {
    if !n.is_finite() {
        return None;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::from(n as i64));
    }
    Number::from_f64(n).map(Value::Number)
}

/// Sequences become arrays in key order; elements that are omitted are
/// dropped, so a sequence at the depth ceiling becomes `[]`
fn serialize_table(table: &dyn HostTable, depth: usize) -> Value {
    let entries = table.entries();
    if let Some(slots) = sequence_positions(&entries) {
        let mut items: Vec<Option<Value>> = vec![None; entries.len()];
        for (slot, (_, value)) in slots.into_iter().zip(&entries) {
            items[slot] = serialize(value, depth + 1);
        }
        return Value::Array(items.into_iter().flatten().collect());
    }

    let mut object = Map::new();
    for (key, value) in &entries {
        let Some(key) = key.to_json_key() else {
            continue;
        };
        if let Some(member) = serialize(value, depth + 1) {
            object.insert(key, member);
        }
    }
    Value::Object(object)
}

/// Zero-based positions when the keys are exactly `1..=n`
fn sequence_positions(entries: &[(HostKey, HostValue)]) -> Option<Vec<usize>> {
    let len = entries.len();
    if len == 0 {
        return None;
    }
    let mut seen = vec![false; len];
    let mut positions = Vec::with_capacity(len);
    for (key, _) in entries {
        let index = key.as_index()?;
        if index < 1 || index as usize > len {
            return None;
        }
        let slot = index as usize - 1;
        if seen[slot] {
            return None;
        }
        seen[slot] = true;
        positions.push(slot);
    }
    Some(positions)
}
