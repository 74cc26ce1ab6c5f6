//! Typed access to request parameters

use serde_json::{Map, Value};

use crate::errors::CommandError;

pub const MIN_RESULTS: i64 = 1;
pub const MAX_RESULTS: i64 = 500;

/// The `params` object of a request; absent and `null` members are the same
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params(map)
    }
}

impl Params {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    /// Whether `name` was sent at all, even as `null`
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn required_str(&self, name: &'static str) -> Result<&str, CommandError> {
        self.optional_str(name)?
            .ok_or(CommandError::MissingParam(name))
    }

    /// A required string that must contain more than whitespace
    pub fn required_text(&self, name: &'static str) -> Result<&str, CommandError> {
        let value = self.required_str(name)?;
        if value.trim().is_empty() {
            return Err(CommandError::MissingParam(name));
        }
        Ok(value)
    }

    pub fn optional_str(&self, name: &'static str) -> Result<Option<&str>, CommandError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(invalid(name, "a string")),
        }
    }

    pub fn str_or<'a>(&'a self, name: &'static str, default: &'a str) -> Result<&'a str, CommandError> {
        Ok(self.optional_str(name)?.unwrap_or(default))
    }

    /// A non-negative id given as a JSON integer or a string of digits
    pub fn required_id(&self, name: &'static str) -> Result<u32, CommandError> {
        let value = self.get(name).ok_or(CommandError::MissingParam(name))?;
        integer(value)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(name, "an integer"))
    }

    /// A 1-based index
    pub fn required_index(&self, name: &'static str) -> Result<usize, CommandError> {
        Ok(self.required_id(name)? as usize)
    }

    /// `max_results`, clamped to the supported range
    pub fn max_results(&self, default: usize) -> Result<usize, CommandError> {
        let Some(value) = self.get("max_results") else {
            return Ok(default);
        };
        let n = integer(value).ok_or_else(|| invalid("max_results", "an integer"))?;
        Ok(n.clamp(MIN_RESULTS, MAX_RESULTS) as usize)
    }

    pub fn string_list(&self, name: &'static str) -> Result<Option<Vec<String>>, CommandError> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let Value::Array(items) = value else {
            return Err(invalid(name, "a list of strings"));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(invalid(name, "a list of strings")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

fn invalid(name: &'static str, expected: &'static str) -> CommandError {
    CommandError::InvalidParam { name, expected }
}
