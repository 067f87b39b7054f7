//! Per-control attribute storage with dirty tracking.
//!
//! Attribute names are normalized to lowercase. Each slot holds a typed
//! value plus a dirty flag; only dirty slots are included in incremental
//! update commands, and folding a slot into a command marks it clean.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};

/// A typed attribute value.
///
/// Each variant knows how to render itself for the wire and how to
/// coerce into the neighboring types. Unsupported coercions return
/// `None`; the caller supplies the default.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Bool(bool),
    Number(f64),
    Date(DateTime<Utc>),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Str(s) => Some(s.eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            AttrValue::Date(d) => Some(*d),
            AttrValue::Str(s) => DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// The string form sent to the host.
    pub fn to_wire(&self) -> String {
        match self {
            AttrValue::Str(s) => s.clone(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Number(n) => n.to_string(),
            AttrValue::Date(d) => d.to_rfc3339(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Number(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Number(v as f64)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Number(v as f64)
    }
}

impl From<u32> for AttrValue {
    fn from(v: u32) -> Self {
        AttrValue::Number(v as f64)
    }
}

impl From<DateTime<Utc>> for AttrValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttrValue::Date(v)
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: AttrValue,
    dirty: bool,
}

/// Attribute map of one control.
#[derive(Debug, Default)]
pub struct AttrStore {
    slots: BTreeMap<String, Slot>,
}

impl AttrStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<AttrValue> {
        self.slots.get(&name.to_ascii_lowercase()).map(|s| s.value.clone())
    }

    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| v.to_wire())
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_number(&self, name: &str, default: f64) -> f64 {
        self.get(name).and_then(|v| v.as_number()).unwrap_or(default)
    }

    pub fn get_date(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(|v| v.as_date())
    }

    /// Set or clear an attribute, marking it dirty on change.
    pub fn set(&mut self, name: &str, value: Option<AttrValue>) {
        self.set_with_dirty(name, value, true);
    }

    /// Set or clear an attribute with an explicit dirty flag.
    ///
    /// `None` is the explicit-clear sentinel: clearing an absent slot is
    /// a no-op, clearing a present slot stores an empty string so the
    /// host resets it. Storing a value equal to the current one leaves
    /// the slot (and its dirty flag) untouched.
    pub fn set_with_dirty(&mut self, name: &str, value: Option<AttrValue>, dirty: bool) {
        let name = name.to_ascii_lowercase();
        let current = self.slots.get(&name);

        let value = match value {
            None if current.is_none() => return,
            None => AttrValue::Str(String::new()),
            Some(v) => v,
        };

        if current.map(|s| s.value != value).unwrap_or(true) {
            self.slots.insert(name, Slot { value, dirty });
        }
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.slots
            .get(&name.to_ascii_lowercase())
            .map(|s| s.dirty)
            .unwrap_or(false)
    }

    /// Render attributes for a command, marking everything rendered
    /// clean. With `dirty_only`, clean slots are skipped (incremental
    /// update); otherwise all slots are rendered (subtree definition).
    ///
    /// The `id` slot is identity, not state; it is rendered separately
    /// by the serializer and never cleaned here.
    pub fn fold_command_attrs(&mut self, dirty_only: bool) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, slot) in self.slots.iter_mut() {
            if name == "id" || (dirty_only && !slot.dirty) {
                continue;
            }
            out.insert(name.clone(), slot.value.to_wire());
            slot.dirty = false;
        }
        out
    }
}
