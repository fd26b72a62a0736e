//! ty adapter (`ty server`).
//!
//! ty requires the document on disk: writes `<base>/ty.toml` (kebab-cased, including nested
//! `environment`/`src`/`rules`/`terminal` tables) and mirrors the document to `new.py` on every
//! change. Does not support `completionItem/resolve`.

use std::path::Path;

use lsp_core::{BackendAdapter, Error, ProcessLaunchInfo};
use serde_json::{json, Value};

use crate::config::write_toml_config;

#[derive(Debug, Default)]
pub struct TyBackend;

impl BackendAdapter for TyBackend {
    fn id(&self) -> &'static str {
        "ty"
    }

    fn write_config(&self, base_path: &Path, options: &Value) -> Result<(), Error> {
        write_toml_config(&base_path.join("ty.toml"), options)
    }

    fn create_process_launch_info(&self, base_path: &Path, _options: &Value) -> ProcessLaunchInfo {
        ProcessLaunchInfo {
            command: "ty".into(),
            args: vec!["server".to_string()],
            env: Default::default(),
            current_dir: Some(base_path.to_path_buf()),
        }
    }

    fn get_lsp_capabilities(&self) -> Value {
        json!({
            "textDocument": {
                "publishDiagnostics": { "versionSupport": true },
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
        true
    }

    fn supports_completion_resolve(&self) -> bool {
        false
    }
}
