//! Method-name constants and typed payloads for the LSP subset this harness speaks.
//!
//! This is the "generated bindings" layer described in the design notes: one type or
//! constant per LSP message, no branching, nothing clever. A real pipeline would emit this
//! module from the LSP meta-model; here it is hand-authored to the same shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique identifier for JSON-RPC calls. Chosen by the client; the multiplexer allocates these.
pub type RequestId = u64;

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_INITIALIZED: &str = "initialized";
pub const METHOD_SHUTDOWN: &str = "shutdown";
pub const METHOD_EXIT: &str = "exit";
pub const METHOD_CANCEL: &str = "$/cancelRequest";
pub const METHOD_SET_TRACE: &str = "$/setTrace";

pub const METHOD_DID_CHANGE_CONFIGURATION: &str = "workspace/didChangeConfiguration";
pub const METHOD_DID_CHANGE_WATCHED_FILES: &str = "workspace/didChangeWatchedFiles";
pub const METHOD_WORKSPACE_DIAGNOSTIC: &str = "workspace/diagnostic";

pub const METHOD_DID_OPEN: &str = "textDocument/didOpen";
pub const METHOD_DID_CHANGE: &str = "textDocument/didChange";
pub const METHOD_DID_CLOSE: &str = "textDocument/didClose";
pub const METHOD_DID_SAVE: &str = "textDocument/didSave";
pub const METHOD_WILL_SAVE: &str = "textDocument/willSave";
pub const METHOD_PUBLISH_DIAGNOSTICS: &str = "textDocument/publishDiagnostics";
pub const METHOD_HOVER: &str = "textDocument/hover";
pub const METHOD_COMPLETION: &str = "textDocument/completion";
pub const METHOD_COMPLETION_RESOLVE: &str = "completionItem/resolve";
pub const METHOD_SIGNATURE_HELP: &str = "textDocument/signatureHelp";
pub const METHOD_RENAME: &str = "textDocument/rename";
pub const METHOD_SEMANTIC_TOKENS_FULL: &str = "textDocument/semanticTokens/full";
pub const METHOD_DIAGNOSTIC: &str = "textDocument/diagnostic";

/// Client metadata attached to the `initialize` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Parameters for the initial `initialize` handshake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "processId")]
    pub process_id: Option<u32>,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
    #[serde(rename = "rootUri")]
    pub root_uri: Option<String>,
    pub capabilities: Value,
}

/// `line`/`character` position within a document, both zero-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextDocumentItem {
    pub uri: String,
    #[serde(rename = "languageId")]
    pub language_id: String,
    pub version: u64,
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DidOpenTextDocumentParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentItem,
}

/// A single full-document replacement (the session never sends incremental ranges).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextDocumentContentChangeEvent {
    pub text: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DidChangeTextDocumentParams {
    #[serde(rename = "textDocument")]
    pub text_document: VersionedTextDocumentIdentifier,
    #[serde(rename = "contentChanges")]
    pub content_changes: Vec<TextDocumentContentChangeEvent>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DidCloseTextDocumentParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DidChangeConfigurationParams {
    pub settings: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TextDocumentPositionParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
}

pub type HoverParams = TextDocumentPositionParams;
pub type SignatureHelpParams = TextDocumentPositionParams;
pub type CompletionParams = TextDocumentPositionParams;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenameParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
    pub position: Position,
    #[serde(rename = "newName")]
    pub new_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticTokensParams {
    #[serde(rename = "textDocument")]
    pub text_document: TextDocumentIdentifier,
}

/// Published diagnostics for a single `(uri, version)` pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    #[serde(default)]
    pub version: Option<u64>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub range: Range,
    #[serde(default)]
    pub severity: Option<i64>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
    pub message: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Ordered token-type/modifier names a backend advertises for `textDocument/semanticTokens`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticTokensLegend {
    #[serde(rename = "tokenTypes")]
    pub token_types: Vec<String>,
    #[serde(rename = "tokenModifiers")]
    pub token_modifiers: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticTokens {
    #[serde(default)]
    pub data: Vec<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompletionList {
    #[serde(rename = "isIncomplete", default)]
    pub is_incomplete: bool,
    #[serde(default)]
    pub items: Vec<CompletionItem>,
}

/// `textDocument/completion` results come back either as a bare array or a `CompletionList`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompletionResponse {
    Items(Vec<CompletionItem>),
    List(CompletionList),
}

impl CompletionResponse {
    pub fn items(&self) -> &[CompletionItem] {
        match self {
            CompletionResponse::Items(items) => items,
            CompletionResponse::List(list) => &list.items,
        }
    }
}
