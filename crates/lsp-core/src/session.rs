//! Owns one virtual document, drives it through a leased transport, and turns the
//! `publishDiagnostics` push model into a version-gated pull API.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex as StdMutex,
    },
    time::Duration,
};

use serde_json::Value;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::warn;

use crate::backend::BackendAdapter;
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::pool::{Lease, Pool, PoolKey};
use crate::protocol::{
    self, CompletionItem, CompletionResponse, Diagnostic, Position, PublishDiagnosticsParams,
    SemanticTokens, SemanticTokensLegend, METHOD_DIAGNOSTIC, METHOD_DID_CHANGE,
    METHOD_DID_CHANGE_CONFIGURATION, METHOD_DID_OPEN, METHOD_INITIALIZE, METHOD_INITIALIZED,
    METHOD_PUBLISH_DIAGNOSTICS,
};
use crate::transport::{Transport, TransportOptions};

/// Token types the session normalizes semantic tokens onto, independent of backend.
pub const CANONICAL_TOKEN_TYPES: &[&str] = &[
    "namespace", "type", "class", "enum", "interface", "struct", "typeParameter", "parameter",
    "variable", "property", "enumMember", "event", "function", "method", "macro", "keyword",
    "modifier", "comment", "string", "number", "regexp", "operator", "decorator",
];

/// Token modifiers the session normalizes semantic tokens onto, independent of backend.
pub const CANONICAL_TOKEN_MODIFIERS: &[&str] = &[
    "declaration", "definition", "readonly", "static", "deprecated", "abstract", "async",
    "modification", "documentation", "defaultLibrary",
];

fn canonical_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: CANONICAL_TOKEN_TYPES.iter().map(|s| s.to_string()).collect(),
        token_modifiers: CANONICAL_TOKEN_MODIFIERS.iter().map(|s| s.to_string()).collect(),
    }
}

/// Maps a backend's advertised legend onto the canonical one. Unknown names fall back to
/// index/bit 0, matching the canonical legend's first entry (`namespace`/`declaration`).
struct RemapTable {
    type_map: Vec<u32>,
    modifier_bit_map: Vec<u32>,
}

impl RemapTable {
    fn build(backend_legend: &SemanticTokensLegend) -> Self {
        let type_map = backend_legend
            .token_types
            .iter()
            .map(|name| {
                CANONICAL_TOKEN_TYPES
                    .iter()
                    .position(|c| c == name)
                    .map(|i| i as u32)
                    .unwrap_or(0)
            })
            .collect();
        let modifier_bit_map = backend_legend
            .token_modifiers
            .iter()
            .map(|name| {
                CANONICAL_TOKEN_MODIFIERS
                    .iter()
                    .position(|c| c == name)
                    .map(|i| i as u32)
                    .unwrap_or(0)
            })
            .collect();
        Self { type_map, modifier_bit_map }
    }

    fn remap_type(&self, idx: u32) -> u32 {
        self.type_map.get(idx as usize).copied().unwrap_or(0)
    }

    fn remap_modifiers(&self, bitset: u32) -> u32 {
        let mut out = 0u32;
        for (bit, &canon_bit) in self.modifier_bit_map.iter().enumerate() {
            if bitset & (1 << bit) != 0 {
                out |= 1 << canon_bit;
            }
        }
        out
    }

    fn normalize(&self, data: &[u32]) -> Vec<u32> {
        let mut out = Vec::with_capacity(data.len());
        for chunk in data.chunks(5) {
            if chunk.len() < 5 {
                out.extend_from_slice(chunk);
                continue;
            }
            out.push(chunk[0]);
            out.push(chunk[1]);
            out.push(chunk[2]);
            out.push(self.remap_type(chunk[3]));
            out.push(self.remap_modifiers(chunk[4]));
        }
        out
    }
}

struct DiagnosticsInner {
    records: HashMap<u64, Value>,
    waiters: HashMap<u64, Vec<oneshot::Sender<()>>>,
    latest: Option<(u64, Value)>,
}

/// Demuxes `publishDiagnostics` notifications into a per-version record, fed by a persistent
/// subscription on the transport's multiplexer. `current_version` lets the background task
/// stamp version-less publishes with the client's version at receipt time.
struct DiagnosticsBarrier {
    inner: Arc<StdMutex<DiagnosticsInner>>,
    current_version: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl DiagnosticsBarrier {
    fn spawn(mut rx: tokio::sync::mpsc::UnboundedReceiver<Value>, current_version: Arc<AtomicU64>) -> Self {
        let inner = Arc::new(StdMutex::new(DiagnosticsInner {
            records: HashMap::new(),
            waiters: HashMap::new(),
            latest: None,
        }));

        let task_inner = inner.clone();
        let task_version = current_version.clone();
        let task = tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                let params: PublishDiagnosticsParams = match serde_json::from_value(value) {
                    Ok(p) => p,
                    Err(err) => {
                        warn!("malformed publishDiagnostics payload: {err}");
                        continue;
                    }
                };
                let version = params.version.unwrap_or_else(|| task_version.load(Ordering::SeqCst));
                let payload = serde_json::to_value(&params.diagnostics).unwrap_or(Value::Null);

                let mut guard = task_inner.lock().expect("diagnostics barrier poisoned");
                guard.records.insert(version, payload.clone());
                guard.latest = Some((version, payload));
                if let Some(waiters) = guard.waiters.remove(&version) {
                    for tx in waiters {
                        let _ = tx.send(());
                    }
                }
            }
        });

        Self { inner, current_version, task }
    }

    fn arm(&self, version: u64) {
        let mut guard = self.inner.lock().expect("diagnostics barrier poisoned");
        guard.waiters.entry(version).or_default();
    }

    async fn get(&self, version: u64, timeout: Duration) -> (Vec<Diagnostic>, bool) {
        {
            let guard = self.inner.lock().expect("diagnostics barrier poisoned");
            if let Some(value) = guard.records.get(&version) {
                return (parse_diagnostics(value), false);
            }
        }

        let rx = {
            let mut guard = self.inner.lock().expect("diagnostics barrier poisoned");
            if let Some(value) = guard.records.get(&version) {
                return (parse_diagnostics(value), false);
            }
            let (tx, rx) = oneshot::channel();
            guard.waiters.entry(version).or_default().push(tx);
            rx
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(_) => {
                let guard = self.inner.lock().expect("diagnostics barrier poisoned");
                let value = guard.records.get(&version).cloned().unwrap_or(Value::Null);
                (parse_diagnostics(&value), false)
            }
            Err(_) => {
                warn!("diagnostics wait timed out at version {version}, returning stale payload");
                let guard = self.inner.lock().expect("diagnostics barrier poisoned");
                match &guard.latest {
                    Some((_, value)) => (parse_diagnostics(value), true),
                    None => (Vec::new(), true),
                }
            }
        }
    }
}

impl Drop for DiagnosticsBarrier {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn parse_diagnostics(value: &Value) -> Vec<Diagnostic> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

/// Tunables threaded from `Session::create` through to the leased transport.
#[derive(Clone, Copy, Debug)]
pub struct SessionOptions {
    pub transport: TransportOptions,
    pub diagnostics_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            transport: TransportOptions::default(),
            diagnostics_timeout: Duration::from_millis(500),
        }
    }
}

/// Owns exactly one virtual document over a leased LSP transport.
pub struct Session {
    backend: Arc<dyn BackendAdapter>,
    pool: Arc<Pool>,
    lease: Option<Lease>,
    uri: String,
    version: u64,
    text: String,
    diagnostics: DiagnosticsBarrier,
    current_version: Arc<AtomicU64>,
    backend_legend: Option<SemanticTokensLegend>,
    remap: Option<RemapTable>,
    last_diagnostics: Option<(u64, Vec<Diagnostic>)>,
    options: SessionOptions,
    closed: bool,
}

impl Session {
    /// Resolves `base_path`, writes the backend's config, acquires a transport from `pool`,
    /// performs the `initialize`/`initialized` handshake, applies workspace settings, and opens
    /// the document. Any failure releases the transport before propagating.
    pub async fn create(
        backend: Arc<dyn BackendAdapter>,
        base_path: &Path,
        initial_code: &str,
        backend_options: Value,
        pool: Arc<Pool>,
        options: SessionOptions,
    ) -> Result<Self, Error> {
        let base_path = std::fs::canonicalize(base_path).unwrap_or_else(|_| base_path.to_path_buf());

        backend
            .write_config(&base_path, &backend_options)
            .map_err(|err| Error::Configuration(err.to_string()))?;

        let uri = format!("file://{}/new.py", base_path.display());
        if backend.requires_file_on_disk() {
            write_document(&base_path, initial_code)?;
        }

        let key = PoolKey::new(backend.id(), base_path.to_string_lossy());
        let backend_for_factory = backend.clone();
        let base_path_for_factory = base_path.clone();
        let transport_options = options.transport;

        let lease = pool
            .acquire(key, move || {
                spawn_and_initialize(backend_for_factory, base_path_for_factory, backend_options, transport_options)
            })
            .await;

        let lease = match lease {
            Ok(lease) => lease,
            Err(err) => return Err(err),
        };

        let result = Self::finish_create(backend, pool.clone(), lease, uri, initial_code, options).await;
        match result {
            Ok(session) => Ok(session),
            Err((err, lease)) => {
                pool.release(lease).await;
                Err(err)
            }
        }
    }

    async fn finish_create(
        backend: Arc<dyn BackendAdapter>,
        pool: Arc<Pool>,
        lease: Lease,
        uri: String,
        initial_code: &str,
        options: SessionOptions,
    ) -> Result<Self, (Error, Lease)> {
        let rx = lease.transport().subscribe(METHOD_PUBLISH_DIAGNOSTICS).await;
        let current_version = Arc::new(AtomicU64::new(1));
        let diagnostics = DiagnosticsBarrier::spawn(rx, current_version.clone());
        diagnostics.arm(1);

        let mut session = Session {
            backend,
            pool,
            lease: Some(lease),
            uri,
            version: 1,
            text: initial_code.to_string(),
            diagnostics,
            current_version,
            backend_legend: None,
            remap: None,
            last_diagnostics: None,
            options,
            closed: false,
        };

        if let Err(err) = session.open_document().await {
            let lease = session.lease.take().expect("lease present during create");
            return Err((err, lease));
        }

        Ok(session)
    }

    async fn open_document(&mut self) -> Result<(), Error> {
        let transport = self.transport()?;

        let settings = self.backend.get_workspace_settings(&Value::Null)?;
        transport.send_notification(
            METHOD_DID_CHANGE_CONFIGURATION,
            serde_json::to_value(protocol::DidChangeConfigurationParams { settings })?,
        )?;

        transport.send_notification(
            METHOD_DID_OPEN,
            serde_json::to_value(protocol::DidOpenTextDocumentParams {
                text_document: protocol::TextDocumentItem {
                    uri: self.uri.clone(),
                    language_id: "python".to_string(),
                    version: self.version,
                    text: self.text.clone(),
                },
            })?,
        )?;

        Ok(())
    }

    fn transport(&self) -> Result<&Transport, Error> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        Ok(self.lease.as_ref().expect("lease present while open").transport())
    }

    fn dispatcher(&self) -> Result<Dispatcher<'_>, Error> {
        Ok(Dispatcher::new(self.transport()?, &self.uri))
    }

    /// Increments the version, mirrors the edit to disk if required, arms the diagnostics
    /// slot, and sends `didChange`. Returns the new version.
    pub async fn update_code(&mut self, text: &str) -> Result<u64, Error> {
        let transport = self.transport()?;
        self.version += 1;
        self.text = text.to_string();

        if self.backend.requires_file_on_disk() {
            let base_path = base_dir_from_uri(&self.uri);
            write_document(&base_path, text)?;
        }

        self.current_version.store(self.version, Ordering::SeqCst);
        self.diagnostics.arm(self.version);

        transport.send_notification(
            METHOD_DID_CHANGE,
            serde_json::to_value(protocol::DidChangeTextDocumentParams {
                text_document: protocol::VersionedTextDocumentIdentifier {
                    uri: self.uri.clone(),
                    version: self.version,
                },
                content_changes: vec![protocol::TextDocumentContentChangeEvent { text: text.to_string() }],
            })?,
        )?;

        Ok(self.version)
    }

    /// Returns diagnostics for the current version: a recorded publish, a pull-model request
    /// for backends that support one, or a bounded wait that falls back to the most recent
    /// payload on timeout. Repeated calls at the same version return the memoized result.
    pub async fn get_diagnostics(&mut self) -> Result<Vec<Diagnostic>, Error> {
        if let Some((v, diagnostics)) = &self.last_diagnostics {
            if *v == self.version {
                return Ok(diagnostics.clone());
            }
        }

        let transport = self.transport()?;

        if supports_pull_diagnostics(&*self.backend) {
            let result = transport
                .send_request(
                    METHOD_DIAGNOSTIC,
                    serde_json::to_value(protocol::TextDocumentIdentifier { uri: self.uri.clone() })?,
                )
                .await?;
            let diagnostics: Vec<Diagnostic> = result
                .get("items")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            self.last_diagnostics = Some((self.version, diagnostics.clone()));
            return Ok(diagnostics);
        }

        let (diagnostics, _stale) = self
            .diagnostics
            .get(self.version, self.options.diagnostics_timeout)
            .await;
        self.last_diagnostics = Some((self.version, diagnostics.clone()));
        Ok(diagnostics)
    }

    pub async fn get_hover_info(&self, position: Position) -> Result<Value, Error> {
        self.dispatcher()?.hover(position).await
    }

    pub async fn get_signature_help(&self, position: Position) -> Result<Value, Error> {
        self.dispatcher()?.signature_help(position).await
    }

    pub async fn get_completion(&self, position: Position) -> Result<CompletionResponse, Error> {
        self.dispatcher()?.completion(position).await
    }

    pub async fn resolve_completion(&self, item: CompletionItem) -> Result<CompletionItem, Error> {
        let dispatcher = self.dispatcher()?;
        if !self.backend.supports_completion_resolve() {
            return Err(Error::Unsupported(format!(
                "{} does not support completionItem/resolve",
                self.backend.id()
            )));
        }
        dispatcher.resolve_completion(item).await
    }

    pub async fn get_rename_edits(&self, position: Position, new_name: &str) -> Result<Value, Error> {
        self.dispatcher()?.rename_edits(position, new_name).await
    }

    /// Fetches semantic tokens; when `normalize` is true, remaps the backend's legend indices
    /// onto the canonical legend, leaving the positional triple untouched.
    pub async fn get_semantic_tokens(&mut self, normalize: bool) -> Result<SemanticTokens, Error> {
        let tokens = self.dispatcher()?.semantic_tokens().await?;

        if !normalize {
            return Ok(tokens);
        }

        if self.remap.is_none() {
            let legend = self
                .backend_legend
                .clone()
                .or_else(|| self.negotiated_legend())
                .or_else(|| self.backend.get_semantic_tokens_legend())
                .unwrap_or_else(canonical_legend);
            self.backend_legend = Some(legend.clone());
            self.remap = Some(RemapTable::build(&legend));
        }

        let remap = self.remap.as_ref().expect("remap table built above");
        Ok(SemanticTokens { data: remap.normalize(&tokens.data) })
    }

    /// The fixed, backend-independent legend the session normalizes onto.
    pub fn canonical_legend(&self) -> SemanticTokensLegend {
        canonical_legend()
    }

    /// The backend's observed legend, if `get_semantic_tokens(true)` has run at least once.
    pub fn backend_legend(&self) -> Option<&SemanticTokensLegend> {
        self.backend_legend.as_ref()
    }

    /// Releases the transport back to the pool and marks the session terminal.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(lease) = self.lease.take() {
            self.pool.release(lease).await;
        }
        Ok(())
    }

    /// Reads `capabilities.semanticTokensProvider.legend` from the server's `initialize`
    /// result, if the server advertised one.
    fn negotiated_legend(&self) -> Option<SemanticTokensLegend> {
        let capabilities = self.lease.as_ref()?.transport().capabilities()?;
        let legend = capabilities.get("capabilities")?.get("semanticTokensProvider")?.get("legend")?;
        serde_json::from_value(legend.clone()).ok()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            warn!("session dropped without calling shutdown(); transport was not released");
        }
    }
}

fn supports_pull_diagnostics(_backend: &dyn BackendAdapter) -> bool {
    false
}

fn base_dir_from_uri(uri: &str) -> PathBuf {
    let path = uri.strip_prefix("file://").unwrap_or(uri);
    Path::new(path)
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn write_document(base_path: &Path, text: &str) -> Result<(), Error> {
    std::fs::write(base_path.join("new.py"), text).map_err(Error::Io)
}

async fn spawn_and_initialize(
    backend: Arc<dyn BackendAdapter>,
    base_path: PathBuf,
    backend_options: Value,
    transport_options: TransportOptions,
) -> Result<Transport, Error> {
    let launch = backend.create_process_launch_info(&base_path, &backend_options);
    let transport = Transport::spawn(&launch, transport_options).await?;

    let init_params = protocol::InitializeParams {
        process_id: Some(std::process::id()),
        client_info: protocol::ClientInfo {
            name: "lsp-core".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        root_uri: Some(format!("file://{}", base_path.display())),
        capabilities: backend.get_lsp_capabilities(),
    };
    let init_result = tokio::time::timeout(
        transport_options.startup_timeout,
        transport.send_request(METHOD_INITIALIZE, serde_json::to_value(init_params)?),
    )
    .await
    .map_err(|_| Error::Timeout(transport_options.startup_timeout))??;
    transport.record_capabilities(init_result);
    transport.send_notification(METHOD_INITIALIZED, serde_json::json!({}))?;

    Ok(transport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{mock_launch_info, write_mock_lsp_server};

    struct MockBackend {
        script_path: PathBuf,
        requires_disk: bool,
        fail_settings: bool,
        completion_resolve: bool,
    }

    impl MockBackend {
        fn new(script_path: PathBuf) -> Self {
            Self {
                script_path,
                requires_disk: false,
                fail_settings: false,
                completion_resolve: false,
            }
        }
    }

    impl BackendAdapter for MockBackend {
        fn id(&self) -> &'static str {
            "mock"
        }

        fn write_config(&self, _base_path: &Path, _options: &Value) -> Result<(), Error> {
            Ok(())
        }

        fn create_process_launch_info(&self, _base_path: &Path, _options: &Value) -> crate::ProcessLaunchInfo {
            mock_launch_info(&self.script_path)
        }

        fn get_lsp_capabilities(&self) -> Value {
            serde_json::json!({})
        }

        fn get_workspace_settings(&self, _options: &Value) -> Result<Value, Error> {
            if self.fail_settings {
                return Err(Error::Configuration("mock backend rejected workspace settings".to_string()));
            }
            Ok(serde_json::json!({}))
        }

        fn requires_file_on_disk(&self) -> bool {
            self.requires_disk
        }

        fn supports_completion_resolve(&self) -> bool {
            self.completion_resolve
        }
    }

    fn fast_options() -> SessionOptions {
        SessionOptions {
            transport: TransportOptions {
                shutdown_timeout: Duration::from_millis(200),
                ..TransportOptions::default()
            },
            diagnostics_timeout: Duration::from_millis(300),
        }
    }

    #[tokio::test]
    async fn create_update_diagnose_and_shutdown_round_trip() {
        let (_dir, script_path) = write_mock_lsp_server(None, None, None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend::new(script_path));
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let mut session = Session::create(
            backend,
            base.path(),
            "def f(): pass\n",
            Value::Null,
            pool.clone(),
            fast_options(),
        )
        .await
        .unwrap();

        let version = session.update_code("def f(): return 1\n").await.unwrap();
        assert_eq!(version, 2);

        let diagnostics = session.get_diagnostics().await.unwrap();
        assert!(diagnostics.is_empty());

        session.shutdown().await.unwrap();
        let err = session.update_code("x").await.unwrap_err();
        assert!(matches!(err, Error::SessionClosed));
    }

    #[tokio::test]
    async fn diagnostics_are_idempotent_without_an_intervening_edit() {
        let (_dir, script_path) = write_mock_lsp_server(None, None, None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend::new(script_path));
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let mut session = Session::create(backend, base.path(), "x = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap();

        let first = session.get_diagnostics().await.unwrap();
        let second = session.get_diagnostics().await.unwrap();
        assert_eq!(first, second);

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn hover_times_out_on_a_hanging_server_and_shutdown_still_completes() {
        let (_dir, script_path) = write_mock_lsp_server(Some("textDocument/hover"), None, None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend::new(script_path));
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let session = Session::create(backend, base.path(), "x = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap();

        let hover = tokio::time::timeout(
            Duration::from_millis(500),
            session.get_hover_info(Position { line: 0, character: 0 }),
        )
        .await;
        assert!(hover.is_err(), "hover request should still be pending when our test timeout fires");

        let mut session = session;
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn server_error_surfaces_as_rpc_error() {
        let (_dir, script_path) =
            write_mock_lsp_server(None, Some(("textDocument/hover", -32600, "Test")), None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend::new(script_path));
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let mut session = Session::create(backend, base.path(), "x = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap();

        let err = session
            .get_hover_info(Position { line: 0, character: 0 })
            .await
            .unwrap_err();
        match err {
            Error::Rpc { code, message, .. } => {
                assert_eq!(code, -32600);
                assert!(message.contains("Test"));
            }
            other => panic!("expected Rpc error, got {other:?}"),
        }

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn semantic_tokens_normalize_onto_the_canonical_legend() {
        let (_dir, script_path) = write_mock_lsp_server(None, None, None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend::new(script_path));
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let mut session = Session::create(backend, base.path(), "x = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap();

        // The mock server advertises legend tokenTypes=["class","function"], tokenModifiers=["declaration"]
        // and returns raw data [0, 0, 3, 0, 0] (type index 0 = "class", empty modifier bitset).
        let tokens = session.get_semantic_tokens(true).await.unwrap();
        let class_index = CANONICAL_TOKEN_TYPES.iter().position(|t| *t == "class").unwrap() as u32;

        assert_eq!(tokens.data, vec![0, 0, 3, class_index, 0]);

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn ty_backend_mirrors_document_text_to_disk() {
        let (_dir, script_path) = write_mock_lsp_server(None, None, None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend { requires_disk: true, ..MockBackend::new(script_path) });
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let mut session = Session::create(backend, base.path(), "a = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(base.path().join("new.py")).unwrap(), "a = 1\n");

        session.update_code("a = 2\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(base.path().join("new.py")).unwrap(), "a = 2\n");

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn create_releases_the_lease_when_open_document_fails() {
        let (_dir, script_path) = write_mock_lsp_server(None, None, None);
        let backend: Arc<dyn BackendAdapter> =
            Arc::new(MockBackend { fail_settings: true, ..MockBackend::new(script_path) });
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let err = Session::create(backend, base.path(), "x = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        // The transport was spawned and initialized before `open_document` failed; the pool
        // must get it back rather than leaking it as permanently active.
        assert_eq!(pool.current_size().await, 1);
        assert_eq!(pool.available_count().await, 1);
    }

    #[tokio::test]
    async fn resolve_completion_is_rejected_when_the_backend_does_not_support_it() {
        let (_dir, script_path) = write_mock_lsp_server(None, None, None);
        let backend: Arc<dyn BackendAdapter> = Arc::new(MockBackend::new(script_path));
        let base = tempfile::tempdir().unwrap();
        let pool = Pool::new(2, Duration::from_secs(60), Duration::ZERO);

        let mut session = Session::create(backend, base.path(), "x = 1\n", Value::Null, pool.clone(), fast_options())
            .await
            .unwrap();

        let item = CompletionItem { label: "my_method".to_string(), extra: Default::default() };
        let err = session.resolve_completion(item).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        session.shutdown().await.unwrap();
    }
}
