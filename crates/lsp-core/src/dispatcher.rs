//! Typed dispatcher: one method per LSP request this harness speaks, borrowing a transport and
//! the session's document uri. Each method is a thin, monomorphic forward onto
//! [`Transport::send_request`] — no branching, no backend-specific behavior. The session owns
//! capability gating (e.g. `completionItem/resolve` support) and document/version state; this
//! layer owns neither.

use serde_json::Value;

use crate::error::Error;
use crate::protocol::{
    self, CompletionItem, CompletionResponse, Position, SemanticTokens, TextDocumentIdentifier,
    METHOD_COMPLETION, METHOD_COMPLETION_RESOLVE, METHOD_HOVER, METHOD_RENAME,
    METHOD_SEMANTIC_TOKENS_FULL, METHOD_SIGNATURE_HELP,
};
use crate::transport::Transport;

pub(crate) struct Dispatcher<'a> {
    transport: &'a Transport,
    uri: &'a str,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(transport: &'a Transport, uri: &'a str) -> Self {
        Self { transport, uri }
    }

    fn position_params(&self, position: Position) -> protocol::TextDocumentPositionParams {
        protocol::TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: self.uri.to_string() },
            position,
        }
    }

    pub(crate) async fn hover(&self, position: Position) -> Result<Value, Error> {
        self.transport
            .send_request(METHOD_HOVER, serde_json::to_value(self.position_params(position))?)
            .await
    }

    pub(crate) async fn signature_help(&self, position: Position) -> Result<Value, Error> {
        self.transport
            .send_request(METHOD_SIGNATURE_HELP, serde_json::to_value(self.position_params(position))?)
            .await
    }

    pub(crate) async fn completion(&self, position: Position) -> Result<CompletionResponse, Error> {
        let result = self
            .transport
            .send_request(METHOD_COMPLETION, serde_json::to_value(self.position_params(position))?)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub(crate) async fn resolve_completion(&self, item: CompletionItem) -> Result<CompletionItem, Error> {
        let result = self
            .transport
            .send_request(METHOD_COMPLETION_RESOLVE, serde_json::to_value(&item)?)
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub(crate) async fn rename_edits(&self, position: Position, new_name: &str) -> Result<Value, Error> {
        self.transport
            .send_request(
                METHOD_RENAME,
                serde_json::to_value(protocol::RenameParams {
                    text_document: TextDocumentIdentifier { uri: self.uri.to_string() },
                    position,
                    new_name: new_name.to_string(),
                })?,
            )
            .await
    }

    pub(crate) async fn semantic_tokens(&self) -> Result<SemanticTokens, Error> {
        let result = self
            .transport
            .send_request(
                METHOD_SEMANTIC_TOKENS_FULL,
                serde_json::to_value(protocol::SemanticTokensParams {
                    text_document: TextDocumentIdentifier { uri: self.uri.to_string() },
                })?,
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }
}
