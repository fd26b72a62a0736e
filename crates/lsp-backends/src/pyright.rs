//! Pyright adapter (`pyright-langserver --stdio`).
//!
//! Pyright needs no on-disk document and no config file of its own; all configuration flows
//! through `workspace/didChangeConfiguration`.

use std::path::Path;

use lsp_core::protocol::SemanticTokensLegend;
use lsp_core::{BackendAdapter, Error, ProcessLaunchInfo};
use serde_json::{json, Value};

#[derive(Debug, Default)]
pub struct PyrightBackend;

impl BackendAdapter for PyrightBackend {
    fn id(&self) -> &'static str {
        "pyright"
    }

    fn write_config(&self, _base_path: &Path, _options: &Value) -> Result<(), Error> {
        Ok(())
    }

    fn create_process_launch_info(&self, base_path: &Path, _options: &Value) -> ProcessLaunchInfo {
        ProcessLaunchInfo {
            command: "pyright-langserver".into(),
            args: vec!["--stdio".to_string()],
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
                "completion": {
                    "completionItem": { "resolveSupport": { "properties": ["documentation", "detail"] } },
                },
                "definition": {},
                "references": {},
                "rename": {},
                "semanticTokens": {
                    "requests": { "full": true },
                    "tokenTypes": [],
                    "tokenModifiers": [],
                    "formats": ["relative"],
                },
            },
        })
    }

    fn get_workspace_settings(&self, options: &Value) -> Result<Value, Error> {
        Ok(options.clone())
    }

    fn get_semantic_tokens_legend(&self) -> Option<SemanticTokensLegend> {
        None
    }

    fn requires_file_on_disk(&self) -> bool {
        false
    }

    fn supports_completion_resolve(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launches_with_stdio_flag() {
        let backend = PyrightBackend;
        let launch = backend.create_process_launch_info(Path::new("/tmp/ws"), &Value::Null);
        assert_eq!(launch.command.to_str(), Some("pyright-langserver"));
        assert_eq!(launch.args, vec!["--stdio"]);
    }

    #[test]
    fn write_config_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        PyrightBackend.write_config(dir.path(), &Value::Null).unwrap();
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
