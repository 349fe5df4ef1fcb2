//! Data model: snapshot owner and event source
//!
//! Every mutation updates the snapshot first, releases the borrow, then
//! triggers the bus so listeners read the new state.
//!
//! Event taxonomy:
//! - `set:<path>` with the new value
//! - `set:<list>.length` followed by `add:<list>` / `delete:<list>` with
//!   `{index, length}` for list splices

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::bus::{EventBus, Payload};
use crate::error::{LsdomError, Result};
use crate::path::{lookup, set_path, Path};

/// Shared handle to a data snapshot and the bus its mutations notify
#[derive(Clone, Debug)]
pub struct Model {
    data: Rc<RefCell<Value>>,
    bus: EventBus,
}

impl Default for Model {
    fn default() -> Self {
        Self::new(Value::Object(Default::default()))
    }
}

impl Model {
    pub fn new(data: Value) -> Self {
        Self::with_bus(data, EventBus::new())
    }

    pub fn with_bus(data: Value, bus: EventBus) -> Self {
        Self {
            data: Rc::new(RefCell::new(data)),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Borrow the current snapshot. Do not hold it across a mutation.
    pub fn snapshot(&self) -> Ref<'_, Value> {
        self.data.borrow()
    }

    /// Owned copy of the snapshot
    pub fn to_value(&self) -> Value {
        self.data.borrow().clone()
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        let path = Path::parse(path).ok()?;
        lookup(&self.data.borrow(), path.segments())
    }

    /// Write `value` at `path` and trigger `set:<path>`
    pub fn set(&self, path: &str, value: Value) -> Result<()> {
        let path = Path::parse(path)?;
        set_path(&mut self.data.borrow_mut(), path.as_str(), value.clone())?;
        tracing::debug!(%path, "set");
        self.bus.trigger(&format!("set:{path}"), Payload::Value(value));
        Ok(())
    }

    /// Re-notify `set:<path>` without changing data
    pub fn touch(&self, path: &str) -> Result<()> {
        let path = Path::parse(path)?;
        let current = self.get(path.as_str()).unwrap_or(Value::Null);
        self.bus.trigger(&format!("set:{path}"), Payload::Value(current));
        Ok(())
    }

    /// Insert `items` at `index` (clamped to the list length)
    pub fn insert(&self, path: &str, index: usize, items: Vec<Value>) -> Result<()> {
        let path = Path::parse(path)?;
        if items.is_empty() {
            return Ok(());
        }
        let count = items.len();
        let (index, len) = self.with_list(&path, |list| {
            let index = index.min(list.len());
            list.splice(index..index, items);
            (index, list.len())
        })?;

        tracing::debug!(%path, index, count, "insert");
        self.bus
            .trigger(&format!("set:{path}.length"), Payload::Value(Value::from(len)));
        self.bus.trigger(
            &format!("add:{path}"),
            Payload::Splice {
                index,
                length: count,
            },
        );
        Ok(())
    }

    pub fn push(&self, path: &str, item: Value) -> Result<()> {
        self.insert(path, usize::MAX, vec![item])
    }

    /// Remove up to `count` items starting at `index`, returning them
    pub fn remove(&self, path: &str, index: usize, count: usize) -> Result<Vec<Value>> {
        let path = Path::parse(path)?;
        let (index, removed, len) = self.with_list(&path, |list| {
            let index = index.min(list.len());
            let end = index.saturating_add(count).min(list.len());
            let removed: Vec<Value> = list.drain(index..end).collect();
            (index, removed, list.len())
        })?;
        if removed.is_empty() {
            return Ok(removed);
        }

        tracing::debug!(%path, index, count = removed.len(), "remove");
        self.bus
            .trigger(&format!("set:{path}.length"), Payload::Value(Value::from(len)));
        self.bus.trigger(
            &format!("delete:{path}"),
            Payload::Splice {
                index,
                length: removed.len(),
            },
        );
        Ok(removed)
    }

    /// Remove the first item equal to `item`; returns its former index
    pub fn remove_item(&self, path: &str, item: &Value) -> Result<Option<usize>> {
        let position = match self.get(path) {
            Some(Value::Array(items)) => items.iter().position(|v| v == item),
            Some(Value::Null) | None => None,
            Some(_) => {
                return Err(LsdomError::NotAList {
                    path: path.to_string(),
                })
            }
        };
        if let Some(index) = position {
            self.remove(path, index, 1)?;
        }
        Ok(position)
    }

    /// Run `f` on the array at `path`, creating it when missing.
    /// The borrow ends before any event is triggered.
    fn with_list<T>(&self, path: &Path, f: impl FnOnce(&mut Vec<Value>) -> T) -> Result<T> {
        let mut data = self.data.borrow_mut();
        if value_mut(&mut data, path).map_or(true, |v| v.is_null()) {
            set_path(&mut data, path.as_str(), Value::Array(Vec::new()))?;
        }
        match value_mut(&mut data, path) {
            Some(Value::Array(list)) => Ok(f(list)),
            _ => Err(LsdomError::NotAList {
                path: path.to_string(),
            }),
        }
    }
}

fn value_mut<'a>(value: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = value;
    for segment in path.segments() {
        current = match current {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
