//! Config validation - warns about unknown fields

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Warn about fields in a file config payload that will be dropped.
pub fn warn_unknown_fields(value: &Value, config_name: &str) {
    let expected = expected_file_config_keys();
    for path in find_unknown_keys(value, &expected, "") {
        warn!("Unknown config field in {config_name}: {path}");
    }
}

/// Find unknown keys in JSON value compared to expected keys.
/// Returns paths like "general.unknownField" for unknown fields.
fn find_unknown_keys(value: &Value, expected: &ExpectedKeys, prefix: &str) -> Vec<String> {
    let mut unknowns = Vec::new();

    let Value::Object(obj) = value else {
        return unknowns;
    };

    for (key, child) in obj {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        if let Some(nested) = expected.nested.get(key.as_str()) {
            unknowns.extend(find_unknown_keys(child, nested, &path));
        } else if !expected.fields.contains(key.as_str()) {
            unknowns.push(path);
        }
    }

    unknowns
}

/// Expected keys for a config section.
/// `fields` are leaf fields, `nested` are nested objects with their own expected keys.
struct ExpectedKeys {
    fields: HashSet<&'static str>,
    nested: HashMap<&'static str, ExpectedKeys>,
}

impl ExpectedKeys {
    fn new(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.iter().copied().collect(),
            nested: HashMap::new(),
        }
    }

    fn with_nested(mut self, key: &'static str, nested: ExpectedKeys) -> Self {
        self.nested.insert(key, nested);
        self
    }
}

/// Expected keys for `FileConfig`
fn expected_file_config_keys() -> ExpectedKeys {
    let general_keys = ExpectedKeys::new(&[
        "instanceName",
        "chartVisible",
        "hideTempWaits",
        "defaultExtrudeLength",
        "defaultExtrudeSpeed",
        "defaultToolheadMoveLength",
        "defaultToolheadXYSpeed",
        "defaultToolheadZSpeed",
        "useGcodeCoords",
        "zAdjustDistances",
    ]);

    let camera_keys = ExpectedKeys::new(&["enabled", "type", "url", "flipX", "flipY"]);

    let dashboard_keys = ExpectedKeys::new(&["hiddenMacros", "tempPresets"]);

    ExpectedKeys::new(&[])
        .with_nested("general", general_keys)
        .with_nested("camera", camera_keys)
        .with_nested("dashboard", dashboard_keys)
}
