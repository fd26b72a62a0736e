//! Shared TOML config-writing helper for backends that read a snake_case options object but
//! expect a kebab-case native config file (Pyrefly, ty).

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use lsp_core::Error;

/// Recursively lowers and hyphen-separates every table key (`python_version` → `python-version`)
/// while leaving array/scalar values untouched. Keys with no underscore pass through unchanged.
pub fn kebab_case_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, val) in map {
                out.insert(key.replace('_', "-"), kebab_case_keys(val));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(kebab_case_keys).collect()),
        other => other.clone(),
    }
}

/// Converts `options` (a JSON object; non-object/null is treated as empty) into a TOML document
/// with kebab-cased keys and writes it to `path`.
pub fn write_toml_config(path: &Path, options: &Value) -> Result<(), Error> {
    let transformed = kebab_case_keys(options);
    let empty = Value::Object(Map::new());
    let object = if transformed.is_object() { &transformed } else { &empty };

    let toml_value: toml::Value = serde_json::from_value(object.clone())
        .map_err(|err| Error::Configuration(format!("options are not TOML-representable: {err}")))?;
    let body = toml::to_string_pretty(&toml_value)
        .map_err(|err| Error::Configuration(format!("failed to render TOML: {err}")))?;

    std::fs::write(path, &body).map_err(|source| Error::ConfigWrite {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = body.len(), "wrote backend config file");
    Ok(())
}
