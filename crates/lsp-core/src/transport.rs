//! Subprocess transport: spawns the LSP server, pumps stdio, and feeds the multiplexer.

use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::PathBuf,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use serde_json::Value;
use tokio::{
    io::BufReader,
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::error;

use crate::error::Error;
use crate::multiplexer::Multiplexer;
use crate::protocol::{RequestId, METHOD_EXIT, METHOD_SHUTDOWN};
use crate::wire;

/// Command + environment + working directory used to spawn an LSP server subprocess.
#[derive(Clone, Debug)]
pub struct ProcessLaunchInfo {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

/// Tunables that apply across every transport a session or pool spawns.
#[derive(Clone, Copy, Debug)]
pub struct TransportOptions {
    pub startup_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub mirror_stdio: bool,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            mirror_stdio: false,
        }
    }
}

/// A live connection to a single LSP subprocess.
///
/// Owns the child process and its reader/writer/stderr tasks exclusively. No cross-session
/// sharing is permitted except through the pool's lend/return cycle.
pub struct Transport {
    multiplexer: Arc<Multiplexer>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    child: Mutex<Option<Child>>,
    shutdown_timeout: Duration,
    negotiated_capabilities: std::sync::OnceLock<Value>,
}

impl Transport {
    /// Spawns `launch` and wires up the reader/writer/stderr tasks. Does not perform the LSP
    /// `initialize` handshake; callers drive that over [`Transport::send_request`].
    pub async fn spawn(launch: &ProcessLaunchInfo, options: TransportOptions) -> Result<Self, Error> {
        let mut command = Command::new(&launch.command);
        command
            .args(&launch.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &launch.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &launch.env {
            command.env(key, value);
        }

        let command_debug = format!("{command:?}");
        let mut child = command.spawn().map_err(|source| Error::Spawn {
            command: command_debug,
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Protocol("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Protocol("child stdout unavailable".into()))?;
        let stderr = child.stderr.take();

        let (writer_tx, writer_rx) = mpsc::unbounded_channel();
        let multiplexer = Arc::new(Multiplexer::new(writer_tx.clone()));

        let writer_handle = tokio::spawn(writer_task(stdin, writer_rx));
        let reader_handle = tokio::spawn(reader_task(
            stdout,
            multiplexer.clone(),
            writer_tx,
            options.mirror_stdio,
        ));

        let mut tasks = vec![writer_handle, reader_handle];
        if let Some(stderr) = stderr {
            tasks.push(tokio::spawn(stderr_task(stderr)));
        }

        Ok(Self {
            multiplexer,
            tasks: StdMutex::new(tasks),
            child: Mutex::new(Some(child)),
            shutdown_timeout: options.shutdown_timeout,
            negotiated_capabilities: std::sync::OnceLock::new(),
        })
    }

    pub(crate) fn multiplexer(&self) -> &Arc<Multiplexer> {
        &self.multiplexer
    }

    /// Records the server's `initialize` result capabilities. Set once, right after the
    /// handshake completes; later calls are ignored.
    pub(crate) fn record_capabilities(&self, result: Value) {
        let _ = self.negotiated_capabilities.set(result);
    }

    /// The server's `initialize` result, if the handshake has completed.
    pub(crate) fn capabilities(&self) -> Option<&Value> {
        self.negotiated_capabilities.get()
    }

    pub async fn send_request(&self, method: &str, params: Value) -> Result<Value, Error> {
        self.multiplexer.send_request(method, params).await
    }

    pub(crate) async fn start_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(RequestId, oneshot::Receiver<Result<Value, Error>>), Error> {
        self.multiplexer.start_request(method, params).await
    }

    pub fn send_notification(&self, method: &str, params: Value) -> Result<(), Error> {
        self.multiplexer.send_notification(method, params)
    }

    pub fn cancel_request(&self, id: RequestId) -> Result<(), Error> {
        self.multiplexer.cancel_request(id)
    }

    pub async fn on_notification(&self, method: &str, timeout: Duration) -> Result<Value, Error> {
        self.multiplexer.on_notification(method, timeout).await
    }

    pub(crate) async fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<Value> {
        self.multiplexer.subscribe(method).await
    }

    /// Best-effort `shutdown`/`exit` handshake, then waits up to the configured timeout before
    /// killing the process. Swallows connection-reset errors from the handshake itself.
    pub async fn stop(&self) {
        let _ = tokio::time::timeout(
            self.shutdown_timeout,
            self.multiplexer.send_request(METHOD_SHUTDOWN, Value::Null),
        )
        .await;
        let _ = self.multiplexer.send_notification(METHOD_EXIT, Value::Null);

        self.multiplexer.fail_all_pending().await;

        let mut child_guard = self.child.lock().await;
        if let Some(mut child) = child_guard.take() {
            if tokio::time::timeout(self.shutdown_timeout, child.wait())
                .await
                .is_err()
            {
                let _ = child.start_kill();
            }
        }
        drop(child_guard);

        let tasks = {
            let mut guard = self.tasks.lock().expect("transport task list poisoned");
            std::mem::take(&mut *guard)
        };
        for handle in tasks {
            handle.abort();
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Ok(guard) = self.tasks.lock() {
            for handle in guard.iter() {
                handle.abort();
            }
        }
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.start_kill();
            }
        }
    }
}

async fn writer_task(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Value>) {
    while let Some(message) = rx.recv().await {
        if wire::write_message(&mut stdin, &message).await.is_err() {
            break;
        }
    }
}

async fn reader_task(
    stdout: ChildStdout,
    multiplexer: Arc<Multiplexer>,
    writer: mpsc::UnboundedSender<Value>,
    mirror_stdio: bool,
) {
    let mut reader = BufReader::new(stdout);
    loop {
        match wire::read_message(&mut reader).await {
            Ok(Some(value)) => {
                if mirror_stdio {
                    eprintln!("[lsp stdout] {value}");
                }
                if let Some(ack) = multiplexer.dispatch_inbound(value).await {
                    let _ = writer.send(ack);
                }
            }
            Ok(None) => break,
            Err(err) => {
                error!("LSP transport protocol error, tearing down: {err}");
                break;
            }
        }
    }

    multiplexer.fail_all_pending().await;
}

async fn stderr_task(stderr: ChildStderr) {
    use tokio::io::{AsyncBufReadExt, BufReader as TokioBufReader};

    let mut lines = TokioBufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        error!("lsp stderr: {line}");
    }
}

/// Converts a `Vec<(OsString, OsString)>`-shaped env override into the `BTreeMap<String,
/// String>` [`ProcessLaunchInfo`] expects, dropping entries that aren't valid UTF-8.
pub fn env_from_os_pairs(pairs: impl IntoIterator<Item = (OsString, OsString)>) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}
