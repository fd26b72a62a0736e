//! The per-analyzer strategy seam: command line, config file, capabilities, legend.

use std::path::Path;

use serde_json::Value;

use crate::error::Error;
use crate::protocol::SemanticTokensLegend;
use crate::transport::ProcessLaunchInfo;

/// A stateless strategy object parameterizing everything backend-specific about driving one
/// kind of LSP server. Implementations live in `lsp-backends`; the session depends only on
/// this trait.
pub trait BackendAdapter: Send + Sync {
    /// Short identifier used as part of the pool key, e.g. `"pyright"`.
    fn id(&self) -> &'static str;

    /// Writes the backend's native config file (if any) inside `base_path`. Unknown option
    /// keys must pass through unchanged; implementations that target TOML lower and
    /// hyphen-separate key names recursively.
    fn write_config(&self, base_path: &Path, options: &Value) -> Result<(), Error>;

    /// Command, args, env, and working directory used to spawn the server subprocess.
    fn create_process_launch_info(&self, base_path: &Path, options: &Value) -> ProcessLaunchInfo;

    /// Client capabilities advertised on `initialize`.
    fn get_lsp_capabilities(&self) -> Value;

    /// Payload sent via `workspace/didChangeConfiguration` after `initialized`. Fallible: a
    /// backend that rejects or fails to assemble the caller's options surfaces
    /// `Error::Configuration` here, after the transport has already been leased from the pool —
    /// `Session::create` releases that lease before propagating the error.
    fn get_workspace_settings(&self, options: &Value) -> Result<Value, Error>;

    /// A hardcoded legend for backends that don't advertise one in their `initialize` result.
    /// Returns `None` when the server's own capabilities response should be trusted instead.
    fn get_semantic_tokens_legend(&self) -> Option<SemanticTokensLegend> {
        None
    }

    /// If true, the session mirrors document text to disk at `uri` on create and every edit.
    fn requires_file_on_disk(&self) -> bool {
        false
    }

    /// If true, `Session::resolve_completion` sends `completionItem/resolve`; if false, it
    /// returns `Error::Unsupported` without issuing a request.
    fn supports_completion_resolve(&self) -> bool {
        false
    }
}
