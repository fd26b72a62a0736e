//! Fixtures for exercising the transport/multiplexer/pool/session against a real subprocess.
//!
//! Mirrors the teacher crate's NDJSON fake-server fixtures, but speaks the genuine
//! `Content-Length`-framed wire format so tests drive the actual framing code path.

use std::{fs, os::unix::fs::PermissionsExt, path::PathBuf};

use crate::protocol::METHOD_INITIALIZE;
use crate::transport::{ProcessLaunchInfo, Transport, TransportOptions};

/// Writes a small Python LSP server to a scratch directory and returns its launch info.
///
/// `hang_on` never responds to the named method (timeout testing); `error_on` responds with
/// a JSON-RPC error of `error_code`/`error_message`; `malformed_on` writes a framed body that
/// isn't valid JSON. At most one of these should be set per fixture.
pub fn write_mock_lsp_server(
    hang_on: Option<&str>,
    error_on: Option<(&str, i64, &str)>,
    malformed_on: Option<&str>,
) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let script_path = dir.path().join("mock-lsp-server.py");

    let hang_on = hang_on.unwrap_or("");
    let (error_on, error_code, error_message) = error_on.unwrap_or(("", -32600, "Mock error"));
    let malformed_on = malformed_on.unwrap_or("");

    let script = format!(
        r#"#!/usr/bin/env python3
import json
import sys

HANG_ON = {hang_on:?}
ERROR_ON = {error_on:?}
ERROR_CODE = {error_code}
ERROR_MESSAGE = {error_message:?}
MALFORMED_ON = {malformed_on:?}

def read_message():
    content_length = 0
    while True:
        line = sys.stdin.buffer.readline()
        if not line or line == b"\r\n":
            break
        if line.lower().startswith(b"content-length:"):
            content_length = int(line.split(b":")[1].strip())
    if content_length == 0:
        return None
    body = sys.stdin.buffer.read(content_length)
    return json.loads(body.decode("utf-8"))

def write_message(message):
    body = json.dumps(message).encode("utf-8")
    header = f"Content-Length: {{len(body)}}\r\n\r\n"
    sys.stdout.buffer.write(header.encode("utf-8"))
    sys.stdout.buffer.write(body)
    sys.stdout.buffer.flush()

def write_malformed():
    body = b"not valid json {{"
    header = f"Content-Length: {{len(body)}}\r\n\r\n"
    sys.stdout.buffer.write(header.encode("utf-8"))
    sys.stdout.buffer.write(body)
    sys.stdout.buffer.flush()

def default_result(method):
    if method == "textDocument/hover":
        return {{"contents": {{"kind": "markdown", "value": "mock hover for " + method}}}}
    if method == "textDocument/completion":
        return {{"isIncomplete": False, "items": [{{"label": "my_method"}}]}}
    if method == "textDocument/semanticTokens/full":
        return {{"data": [0, 0, 3, 0, 0]}}
    return None

def handle(message):
    method = message.get("method", "")
    request_id = message.get("id")
    is_notification = request_id is None

    if method == HANG_ON:
        return
    if method == MALFORMED_ON and not is_notification:
        write_malformed()
        return
    if method == ERROR_ON and not is_notification:
        write_message({{"jsonrpc": "2.0", "id": request_id, "error": {{"code": ERROR_CODE, "message": ERROR_MESSAGE}}}})
        return

    if method == "initialize" and request_id is not None:
        write_message({{
            "jsonrpc": "2.0",
            "id": request_id,
            "result": {{
                "capabilities": {{
                    "textDocumentSync": 1,
                    "hoverProvider": True,
                    "completionProvider": {{}},
                    "semanticTokensProvider": {{"legend": {{"tokenTypes": ["class", "function"], "tokenModifiers": ["declaration"]}}}},
                }},
                "serverInfo": {{"name": "mock-lsp-server", "version": "1.0.0"}},
            }},
        }})
    elif method == "initialized":
        pass
    elif method == "textDocument/didOpen":
        write_message({{
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {{"uri": message.get("params", {{}}).get("textDocument", {{}}).get("uri", ""), "version": 1, "diagnostics": []}},
        }})
    elif method == "textDocument/didChange":
        params = message.get("params", {{}})
        version = params.get("textDocument", {{}}).get("version", 1)
        uri = params.get("textDocument", {{}}).get("uri", "")
        write_message({{
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {{"uri": uri, "version": version, "diagnostics": []}},
        }})
    elif method == "shutdown" and request_id is not None:
        write_message({{"jsonrpc": "2.0", "id": request_id, "result": None}})
    elif method == "exit":
        sys.exit(0)
    elif not is_notification and request_id is not None:
        write_message({{"jsonrpc": "2.0", "id": request_id, "result": default_result(method)}})

def main():
    while True:
        message = read_message()
        if message is None:
            break
        handle(message)

if __name__ == "__main__":
    main()
"#,
        hang_on = hang_on,
        error_on = error_on,
        error_code = error_code,
        error_message = error_message,
        malformed_on = malformed_on,
    );

    fs::write(&script_path, script).expect("write mock server script");
    let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&script_path, perms).expect("chmod");

    (dir, script_path)
}

pub fn mock_launch_info(script_path: &std::path::Path) -> ProcessLaunchInfo {
    ProcessLaunchInfo {
        command: PathBuf::from("python3"),
        args: vec![script_path.to_string_lossy().to_string()],
        env: Default::default(),
        current_dir: None,
    }
}

/// Spawns the mock server and runs its `initialize`/`initialized` handshake.
pub async fn spawn_initialized(script_path: &std::path::Path) -> Transport {
    let launch = mock_launch_info(script_path);
    let transport = Transport::spawn(&launch, TransportOptions::default())
        .await
        .expect("spawn mock transport");
    transport
        .send_request(METHOD_INITIALIZE, serde_json::json!({}))
        .await
        .expect("initialize handshake");
    transport
        .send_notification(crate::protocol::METHOD_INITIALIZED, serde_json::json!({}))
        .expect("initialized notification");
    transport
}
