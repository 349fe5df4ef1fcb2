//! Data paths
//!
//! Supports:
//! - `a.b.c` (dot notation)
//! - `a[0].b` and `a['b']` (bracket notation, normalized to dots)
//! - `a.0.b` (numeric segment as list index)
//!
//! Reads are chained-safe: a missing segment yields `None` instead of an error.
//! Writes create empty objects for missing intermediate segments.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{LsdomError, Result};

/// A normalized, dot-separated data address (`todos.0.name`).
///
/// The empty path addresses the whole snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path(String);

impl Path {
    /// The empty path (whole snapshot)
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and normalize a path
    ///
    /// Examples:
    /// - "todos[0].name" → "todos.0.name"
    /// - "a['b']" → "a.b"
    ///
    /// Segments never contain whitespace, dots or brackets, since event
    /// names built from paths are whitespace-separated.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::root());
        }

        let invalid = || LsdomError::InvalidPath {
            path: raw.to_string(),
        };

        let mut segments: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut chars = raw.chars().peekable();
        // Set after ']' so that "a[0].b" does not yield an empty segment
        let mut after_bracket = false;

        while let Some(ch) = chars.next() {
            match ch {
                '.' => {
                    if current.is_empty() && !after_bracket {
                        return Err(invalid());
                    }
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    }
                    after_bracket = false;
                }
                '[' => {
                    if !current.is_empty() {
                        segments.push(std::mem::take(&mut current));
                    } else if segments.is_empty() {
                        return Err(invalid());
                    }
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(invalid());
                    }
                    let inner = inner.trim();
                    let unquoted = inner
                        .strip_prefix('\'')
                        .and_then(|s| s.strip_suffix('\''))
                        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                    let segment = match unquoted {
                        Some(s) if is_segment(s) => s.to_string(),
                        None if !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit()) => {
                            inner.to_string()
                        }
                        _ => return Err(invalid()),
                    };
                    segments.push(segment);
                    after_bracket = true;
                    if let Some(&next) = chars.peek() {
                        if next != '.' && next != '[' {
                            return Err(invalid());
                        }
                    }
                }
                ']' => return Err(invalid()),
                c if c.is_whitespace() => return Err(invalid()),
                c => {
                    after_bracket = false;
                    current.push(c);
                }
            }
        }

        if !current.is_empty() {
            segments.push(current);
        } else if !after_bracket {
            // trailing dot
            return Err(invalid());
        }

        Ok(Self(segments.join(".")))
    }

    /// Build a path from already-normalized segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        Self(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over segments (empty for the root path)
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Append one segment
    pub fn child(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}.{}", self.0, segment))
        }
    }

    /// Append a list index segment
    pub fn index(&self, index: usize) -> Self {
        self.child(&index.to_string())
    }

    /// Append every segment of `other`
    pub fn join(&self, other: &Path) -> Self {
        if other.is_root() {
            self.clone()
        } else if self.is_root() {
            other.clone()
        } else {
            Self(format!("{}.{}", self.0, other.0))
        }
    }

    /// Whether `self` equals `ancestor` or lies below it
    pub fn starts_with(&self, ancestor: &Path) -> bool {
        ancestor.is_root()
            || self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0)
                && self.0.as_bytes().get(ancestor.0.len()) == Some(&b'.'))
    }
}

/// Whether `segment` can stand as one path segment
pub fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '.' | '[' | ']'))
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.0
    }
}

/// Read one segment of a value
///
/// `length` on arrays and strings yields their size.
pub fn step(value: &Value, segment: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(segment).cloned(),
        Value::Array(items) => {
            if segment == "length" {
                return Some(Value::from(items.len()));
            }
            let idx = segment.parse::<usize>().ok()?;
            items.get(idx).cloned()
        }
        Value::String(s) if segment == "length" => Some(Value::from(s.chars().count())),
        _ => None,
    }
}

/// Apply already-parsed segments to a value
pub fn lookup<'a, I>(value: &Value, segments: I) -> Option<Value>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut segments = segments.into_iter();
    // Stay borrowed while the walk only touches objects and arrays
    let mut current: &Value = value;
    while let Some(segment) = segments.next() {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) if segment != "length" => {
                segment.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            _ => {
                // synthesized value (length), continue on an owned copy
                let mut owned = step(current, segment)?;
                for rest in segments.by_ref() {
                    owned = step(&owned, rest)?;
                }
                return Some(owned);
            }
        };
        current = next?;
    }
    Some(current.clone())
}

/// Borrow the value stored at `path` (no synthesized `length`)
pub fn resolve<'a>(value: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Read a path from a value (`None` when any segment is missing)
pub fn get_path(value: &Value, path: &str) -> Option<Value> {
    let path = Path::parse(path).ok()?;
    lookup(value, path.segments())
}

/// Write `new_value` at `path`, creating empty objects for missing
/// intermediate segments.
///
/// Writing through a primitive is an error; `null` counts as missing.
pub fn set_path(target: &mut Value, path: &str, new_value: Value) -> Result<()> {
    let parsed = Path::parse(path)?;
    let segments: Vec<&str> = parsed.segments().collect();

    let Some((last, intermediate)) = segments.split_last() else {
        *target = new_value;
        return Ok(());
    };

    let mut current = target;
    for segment in intermediate {
        current = descend(current, segment, parsed.as_str())?;
    }
    assign(current, last, new_value, parsed.as_str())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn traversal_error(value: &Value, segment: &str, path: &str) -> LsdomError {
    LsdomError::InvalidTraversal {
        segment: segment.to_string(),
        value_type: type_name(value).to_string(),
        path: path.to_string(),
    }
}

/// Largest run of `null` holes a write past the end of a list may open
const MAX_INDEX_GAP: usize = 1024;

/// Slot `segment` of a list, padding with `null` when writing past the end
fn slot<'a>(items: &'a mut Vec<Value>, segment: &str, path: &str) -> Result<&'a mut Value> {
    let out_of_range = || LsdomError::InvalidTraversal {
        segment: segment.to_string(),
        value_type: "array".to_string(),
        path: path.to_string(),
    };
    let idx = segment.parse::<usize>().map_err(|_| out_of_range())?;
    if idx >= items.len() {
        if idx - items.len() > MAX_INDEX_GAP {
            return Err(out_of_range());
        }
        items.resize(idx + 1, Value::Null);
    }
    Ok(&mut items[idx])
}

fn descend<'a>(current: &'a mut Value, segment: &str, path: &str) -> Result<&'a mut Value> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .and_modify(|v| {
                if v.is_null() {
                    *v = Value::Object(Map::new());
                }
            })
            .or_insert_with(|| Value::Object(Map::new()))),
        Value::Array(items) => {
            let slot = slot(items, segment, path)?;
            if slot.is_null() {
                *slot = Value::Object(Map::new());
            }
            Ok(slot)
        }
        other => Err(traversal_error(other, segment, path)),
    }
}

fn assign(current: &mut Value, segment: &str, new_value: Value, path: &str) -> Result<()> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(segment.to_string(), new_value);
            Ok(())
        }
        Value::Array(items) => {
            *slot(items, segment, path)? = new_value;
            Ok(())
        }
        other => Err(traversal_error(other, segment, path)),
    }
}
