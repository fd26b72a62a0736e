#![forbid(unsafe_code)]
//! Async client-side harness for Language Server Protocol analyzers (Pyright, Pyrefly, ty).
//!
//! Spawns an LSP server subprocess, speaks `Content-Length`-framed JSON-RPC 2.0 over its
//! stdio, and exposes a single typed, pooled session API for programmatic hover, diagnostics,
//! completion, rename, signature help, and semantic tokens against an in-memory document.
//!
//! ## Layers
//! - [`wire`] encodes/decodes one framed JSON-RPC message.
//! - [`transport`] owns a subprocess and its reader/writer/stderr tasks.
//! - [`multiplexer`] correlates request ids to completions and routes notifications to
//!   one-shot waiters, a generic queue, and persistent subscriptions.
//! - [`protocol`] is the generated-shape layer: method-name constants plus typed param/result
//!   structs, one per LSP message this harness speaks.
//! - `dispatcher` is a thin typed facade over a borrowed transport: one method per request,
//!   no branching. Internal; `session` is its only caller.
//! - [`pool`] recycles warm transports keyed by `(backend, canonical workspace path)`.
//! - [`backend`] is the strategy seam (`BackendAdapter`) that `lsp-backends` implements for
//!   each analyzer.
//! - [`session`] owns one virtual document, drives it over a leased transport, and turns
//!   `publishDiagnostics` push notifications into a version-gated pull API.
//!
//! ```rust,no_run
//! use lsp_core::{BackendAdapter, Pool, Session, SessionOptions};
//! # use serde_json::Value;
//! # use std::{path::Path, sync::Arc, time::Duration};
//! # async fn run(backend: Arc<dyn BackendAdapter>) -> Result<(), lsp_core::Error> {
//! let pool = Pool::new(4, Duration::from_secs(60), Duration::from_secs(30));
//! let mut session = Session::create(
//!     backend,
//!     Path::new("/tmp/workspace"),
//!     "def f(): pass\n",
//!     Value::Null,
//!     pool,
//!     SessionOptions::default(),
//! )
//! .await?;
//! let diagnostics = session.get_diagnostics().await?;
//! session.shutdown().await?;
//! # let _ = diagnostics;
//! # Ok(()) }
//! ```

mod backend;
mod dispatcher;
mod error;
mod multiplexer;
mod pool;
mod session;
pub mod protocol;
mod transport;

#[cfg(test)]
pub mod test_support;

pub mod wire;

pub use backend::BackendAdapter;
pub use error::Error;
pub use pool::{Lease, Pool, PoolKey};
pub use session::{Session, SessionOptions, CANONICAL_TOKEN_MODIFIERS, CANONICAL_TOKEN_TYPES};
pub use transport::{env_from_os_pairs, ProcessLaunchInfo, Transport, TransportOptions};
