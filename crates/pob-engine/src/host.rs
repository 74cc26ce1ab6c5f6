//! Capability-typed view of engine-owned values
//!
//! Engine output is an unbounded graph the bridge does not own. It may be
//! cyclic, hold executable handles, and mix sequence-like and keyed data in
//! one structure. [`HostValue`] is the tagged union the bridge sees; tables
//! are shared handles that expose their entries one level at a time, so a
//! consumer decides how deep it walks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A value owned by the engine
#[derive(Clone)]
pub enum HostValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// Keyed structure; may be reachable from itself
    Table(Rc<dyn HostTable>),
    /// Functions, userdata and other handles with no data representation
    Opaque(OpaqueKind),
}

/// Kind of a non-serializable host handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpaqueKind {
    Function,
    UserData,
    Thread,
    Other,
}

/// Key of a host table entry
#[derive(Debug, Clone, PartialEq)]
pub enum HostKey {
    Integer(i64),
    Number(f64),
    String(String),
    /// Booleans, tables and handles used as keys
    Other,
}

/// A host structure whose entries can be listed and looked up.
///
/// Implementations must not fail: entries that cannot be read are skipped.
pub trait HostTable {
    /// All entries at this level, in host iteration order
    fn entries(&self) -> Vec<(HostKey, HostValue)>;

    /// Look up a string-keyed entry
    fn get(&self, key: &str) -> Option<HostValue> {
        self.entries().into_iter().find_map(|(k, v)| match k {
            HostKey::String(ref s) if s == key => Some(v),
            _ => None,
        })
    }
}

impl HostKey {
    /// Integer index of this key, if it is integral
    pub fn as_index(&self) -> Option<i64> {
        match self {
            HostKey::Integer(i) => Some(*i),
            HostKey::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Key coerced to a JSON object key; `None` for keys JSON cannot carry
    pub fn to_json_key(&self) -> Option<String> {
        match self {
            HostKey::String(s) => Some(s.clone()),
            HostKey::Integer(i) => Some(i.to_string()),
            HostKey::Number(n) if n.is_finite() => match self.as_index() {
                Some(i) => Some(i.to_string()),
                None => Some(n.to_string()),
            },
            _ => None,
        }
    }
}

impl From<&str> for HostKey {
    fn from(value: &str) -> Self {
        HostKey::String(value.to_string())
    }
}

impl From<i64> for HostKey {
    fn from(value: i64) -> Self {
        HostKey::Integer(value)
    }
}

impl HostValue {
    /// Wrap a table implementation
    pub fn table(table: impl HostTable + 'static) -> Self {
        HostValue::Table(Rc::new(table))
    }

    /// Host-side type name as reported to callers
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Nil => "nil",
            HostValue::Boolean(_) => "boolean",
            HostValue::Integer(_) | HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Table(_) => "table",
            HostValue::Opaque(OpaqueKind::Function) => "function",
            HostValue::Opaque(OpaqueKind::UserData) => "userdata",
            HostValue::Opaque(OpaqueKind::Thread) => "thread",
            HostValue::Opaque(OpaqueKind::Other) => "opaque",
        }
    }

    pub fn as_table(&self) -> Option<&Rc<dyn HostTable>> {
        match self {
            HostValue::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Look up a string key when this value is a table
    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.as_table().and_then(|t| t.get(key))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            HostValue::Nil
                | HostValue::Boolean(_)
                | HostValue::Integer(_)
                | HostValue::Number(_)
                | HostValue::String(_)
        )
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Nil => write!(f, "Nil"),
            HostValue::Boolean(b) => write!(f, "Boolean({})", b),
            HostValue::Integer(i) => write!(f, "Integer({})", i),
            HostValue::Number(n) => write!(f, "Number({})", n),
            HostValue::String(s) => write!(f, "String({:?})", s),
            HostValue::Table(_) => write!(f, "Table(..)"),
            HostValue::Opaque(kind) => write!(f, "Opaque({:?})", kind),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Boolean(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Integer(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

impl From<Rc<MemoryTable>> for HostValue {
    fn from(value: Rc<MemoryTable>) -> Self {
        HostValue::Table(value)
    }
}

/// Host table held in Rust memory.
///
/// Entries can be added after the table is shared, which is how cyclic
/// structures are built.
#[derive(Default)]
pub struct MemoryTable {
    entries: RefCell<Vec<(HostKey, HostValue)>>,
}

impl MemoryTable {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Table with keys `1..=n` holding `values` in order
    pub fn sequence(values: impl IntoIterator<Item = HostValue>) -> Rc<Self> {
        let table = Self::new();
        for (i, value) in values.into_iter().enumerate() {
            table.insert(HostKey::Integer(i as i64 + 1), value);
        }
        table
    }

    /// Set `key`, replacing an existing entry with an equal key
    pub fn insert(&self, key: impl Into<HostKey>, value: impl Into<HostValue>) {
        let key = key.into();
        let value = value.into();
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl HostTable for MemoryTable {
    fn entries(&self) -> Vec<(HostKey, HostValue)> {
        self.entries.borrow().clone()
    }
}
