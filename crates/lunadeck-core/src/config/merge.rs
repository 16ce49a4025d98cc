//! JSON tree helpers for config merging and dotted-path writes.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Merge `patch` into `base`.
///
/// Objects merge key by key and arrays merge index by index, recursively.
/// Extra array elements in `patch` are appended. Any other value in `patch`
/// replaces the one in `base`. A `null` in `patch` leaves the base value
/// alone, so a partial payload can never erase a key or shorten an array.
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None if value.is_null() => {}
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (Value::Array(base), Value::Array(patch)) => {
            for (index, value) in patch.iter().enumerate() {
                match base.get_mut(index) {
                    Some(existing) => deep_merge(existing, value),
                    None => base.push(value.clone()),
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Split `patch` into one single-leaf patch per non-object value, keyed by
/// the dotted path of that leaf. Arrays count as one leaf. Nulls are dropped.
pub fn leaf_patches(patch: &Value) -> Vec<(String, Value)> {
    fn walk(value: &Value, path: &mut Vec<String>, out: &mut Vec<(String, Value)>) {
        match value {
            Value::Null => {}
            Value::Object(map) => {
                for (key, child) in map {
                    path.push(key.clone());
                    walk(child, path, out);
                    path.pop();
                }
            }
            leaf => {
                let wrapped = path.iter().rev().fold(leaf.clone(), |inner, key| {
                    let mut map = Map::new();
                    map.insert(key.clone(), inner);
                    Value::Object(map)
                });
                out.push((path.join("."), wrapped));
            }
        }
    }

    let mut out = Vec::new();
    walk(patch, &mut Vec::new(), &mut out);
    out
}

fn segments(path: &str) -> Result<Vec<&str>> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(Error::InvalidPath(path.to_string()));
    }
    Ok(parts)
}

/// Write `value` at a dotted `path`, creating intermediate objects.
/// Numeric segments index into existing arrays.
///
/// # Errors
///
/// Returns `Error::InvalidPath` for an empty segment, or when the path runs
/// through a value that is neither an object nor an indexable array.
pub fn set_path(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let parts = segments(path)?;
    let invalid = || Error::InvalidPath(path.to_string());

    let Some((last, parents)) = parts.split_last() else {
        return Err(invalid());
    };

    let mut current = root;
    for part in parents {
        current = match current {
            Value::Object(map) => map
                .entry((*part).to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            Value::Array(items) => {
                let index: usize = part.parse().map_err(|_| invalid())?;
                items.get_mut(index).ok_or_else(invalid)?
            }
            _ => return Err(invalid()),
        };
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), value);
        }
        Value::Array(items) => {
            let index: usize = last.parse().map_err(|_| invalid())?;
            let slot = items.get_mut(index).ok_or_else(invalid)?;
            *slot = value;
        }
        _ => return Err(invalid()),
    }
    Ok(())
}

/// Whether a dotted `path` resolves to an existing value.
#[must_use]
pub fn has_path(root: &Value, path: &str) -> bool {
    let Ok(parts) = segments(path) else {
        return false;
    };
    let mut current = root;
    for part in parts {
        let next = match current {
            Value::Object(map) => map.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return false,
        }
    }
    true
}
