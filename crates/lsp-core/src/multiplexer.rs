//! Request/response correlation and notification routing over a framed JSON-RPC stream.

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::warn;

use crate::error::Error;
use crate::protocol::{RequestId, METHOD_CANCEL};

type PendingMap = HashMap<RequestId, oneshot::Sender<Result<Value, Error>>>;

#[derive(Default)]
struct NotificationRouter {
    queue: HashMap<String, VecDeque<Value>>,
    waiters: HashMap<String, Vec<oneshot::Sender<Value>>>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<Value>>>,
}

/// Correlates outbound requests to inbound responses and routes inbound notifications.
///
/// Owns nothing about the subprocess itself; [`crate::transport::Transport`] feeds it decoded
/// wire messages and writes the framed bytes it produces.
pub(crate) struct Multiplexer {
    writer: mpsc::UnboundedSender<Value>,
    pending: Mutex<PendingMap>,
    router: Mutex<NotificationRouter>,
    next_id: AtomicU64,
}

impl Multiplexer {
    pub(crate) fn new(writer: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            writer,
            pending: Mutex::new(HashMap::new()),
            router: Mutex::new(NotificationRouter::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends a request and returns its id alongside a receiver for the eventual result.
    ///
    /// Splitting send from await lets callers (e.g. cancellation) hold onto the id without
    /// forcing them to await the response inline.
    pub(crate) async fn start_request(
        &self,
        method: &str,
        params: Value,
    ) -> Result<(RequestId, oneshot::Receiver<Result<Value, Error>>), Error> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = self.pending.lock().await;
            guard.insert(id, tx);
        }

        if self.writer.send(message).is_err() {
            let mut guard = self.pending.lock().await;
            guard.remove(&id);
            return Err(Error::ChannelClosed);
        }

        Ok((id, rx))
    }

    pub(crate) async fn send_request(&self, method: &str, params: Value) -> Result<Value, Error> {
        let (_, rx) = self.start_request(method, params).await?;
        rx.await.unwrap_or(Err(Error::ChannelClosed))
    }

    pub(crate) fn send_notification(&self, method: &str, params: Value) -> Result<(), Error> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.writer.send(message).map_err(|_| Error::ChannelClosed)
    }

    pub(crate) fn cancel_request(&self, id: RequestId) -> Result<(), Error> {
        self.send_notification(METHOD_CANCEL, serde_json::json!({ "id": id }))
    }

    /// Registers a one-shot waiter for `method`, first checking the generic queue for an
    /// already-arrived notification. Times out after `timeout` if nothing matches.
    pub(crate) async fn on_notification(&self, method: &str, timeout: Duration) -> Result<Value, Error> {
        let rx = {
            let mut guard = self.router.lock().await;
            if let Some(value) = guard.queue.get_mut(method).and_then(VecDeque::pop_front) {
                return Ok(value);
            }
            let (tx, rx) = oneshot::channel();
            guard.waiters.entry(method.to_string()).or_default().push(tx);
            rx
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::Cancelled),
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    /// Registers a persistent, multi-fire subscription to every future notification matching
    /// `method`. Used by the session's diagnostics barrier, which needs to see every publish
    /// rather than just the next one.
    pub(crate) async fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self.router.lock().await;
        guard.subscribers.entry(method.to_string()).or_default().push(tx);
        rx
    }

    /// Feeds one decoded inbound message through response/notification routing.
    ///
    /// Returns `Some(ack)` when the message was a server-to-client request that needs an
    /// immediate `{id, result: null}` acknowledgement written back.
    pub(crate) async fn dispatch_inbound(&self, value: Value) -> Option<Value> {
        let has_id = value.get("id").is_some();
        let method = value.get("method").and_then(Value::as_str).map(str::to_string);

        match (has_id, method) {
            (false, Some(method)) | (true, Some(method)) if value.get("result").is_none() && value.get("error").is_none() => {
                let params = value.get("params").cloned().unwrap_or(Value::Null);
                self.route_notification(&method, params).await;
                if has_id {
                    return Some(serde_json::json!({
                        "jsonrpc": "2.0",
                        "id": value.get("id").cloned().unwrap_or(Value::Null),
                        "result": Value::Null,
                    }));
                }
                None
            }
            (true, _) => {
                self.handle_response(value).await;
                None
            }
            _ => {
                warn!("received unroutable LSP message: {value}");
                None
            }
        }
    }

    async fn route_notification(&self, method: &str, params: Value) {
        let mut guard = self.router.lock().await;

        if let Some(subscribers) = guard.subscribers.get_mut(method) {
            subscribers.retain(|tx| tx.send(params.clone()).is_ok());
        }

        if let Some(waiters) = guard.waiters.get_mut(method) {
            if !waiters.is_empty() {
                let waiter = waiters.remove(0);
                let _ = waiter.send(params);
                return;
            }
        }

        guard.queue.entry(method.to_string()).or_default().push_back(params);
    }

    async fn handle_response(&self, value: Value) {
        let Some(id) = parse_request_id(value.get("id")) else {
            warn!("received response without a numeric or parseable id");
            return;
        };

        let sender = { self.pending.lock().await.remove(&id) };
        let Some(tx) = sender else {
            warn!("received response for unknown request id {id}");
            return;
        };

        if let Some(err) = value.get("error") {
            let code = err.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let data = err.get("data").cloned();
            let _ = tx.send(Err(Error::Rpc { code, message, data }));
        } else if let Some(result) = value.get("result") {
            let _ = tx.send(Ok(result.clone()));
        } else {
            let _ = tx.send(Err(Error::Protocol(
                "response missing both result and error".into(),
            )));
        }
    }

    /// Resolves every outstanding pending slot with [`Error::Cancelled`]. Called on transport
    /// shutdown or on a fatal reader-task error.
    pub(crate) async fn fail_all_pending(&self) {
        let mut guard = self.pending.lock().await;
        for (_, tx) in guard.drain() {
            let _ = tx.send(Err(Error::Cancelled));
        }
    }
}

fn parse_request_id(value: Option<&Value>) -> Option<RequestId> {
    let value = value?;
    if let Some(num) = value.as_u64() {
        return Some(num);
    }
    value.as_str().and_then(|s| s.parse::<RequestId>().ok())
}
