//! Pyrefly adapter (`pyrefly lsp [--threads N] [--verbose] [--indexing-mode M]`).
//!
//! Writes `<base>/pyrefly.toml` from the caller's options, kebab-cased. Rename support is
//! best-effort; Pyrefly does not support `completionItem/resolve`.

use std::path::Path;

use lsp_core::{BackendAdapter, Error, ProcessLaunchInfo};
use serde_json::{json, Value};

use crate::config::write_toml_config;

#[derive(Debug, Default)]
pub struct PyreflyBackend;

impl BackendAdapter for PyreflyBackend {
    fn id(&self) -> &'static str {
        "pyrefly"
    }

    fn write_config(&self, base_path: &Path, options: &Value) -> Result<(), Error> {
        write_toml_config(&base_path.join("pyrefly.toml"), options)
    }

    fn create_process_launch_info(&self, base_path: &Path, options: &Value) -> ProcessLaunchInfo {
        let mut args = vec!["lsp".to_string()];

        if options.get("verbose").and_then(Value::as_bool) == Some(true) {
            args.push("--verbose".to_string());
        }
        if let Some(threads) = options.get("threads").and_then(Value::as_u64) {
            args.push("--threads".to_string());
            args.push(threads.to_string());
        }
        if let Some(mode) = options.get("indexing_mode").and_then(Value::as_str) {
            args.push("--indexing-mode".to_string());
            args.push(mode.to_string());
        }

        ProcessLaunchInfo {
            command: "pyrefly".into(),
            args,
            env: Default::default(),
            current_dir: Some(base_path.to_path_buf()),
        }
    }

    fn get_lsp_capabilities(&self) -> Value {
        json!({
            "textDocument": {
                "publishDiagnostics": {
                    "versionSupport": true,
                    "tagSupport": { "valueSet": [1, 2] },
                },
                "hover": { "contentFormat": ["markdown", "plaintext"] },
                "signatureHelp": {},
                "completion": {},
                "definition": {},
                "references": {},
            },
        })
    }

    fn get_workspace_settings(&self, options: &Value) -> Result<Value, Error> {
        Ok(options.clone())
    }

    fn requires_file_on_disk(&self) -> bool {
        false
    }

    fn supports_completion_resolve(&self) -> bool {
        false
    }
}
