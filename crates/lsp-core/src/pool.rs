//! Keyed recycling pool of warm [`Transport`]s, bounded by a global capacity.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{sync::Mutex, task::JoinHandle};
use tracing::info;

use crate::error::Error;
use crate::transport::Transport;

/// Identifies an analyzer process by backend and canonical workspace path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolKey {
    pub backend_id: String,
    pub workspace_path: String,
}

impl PoolKey {
    pub fn new(backend_id: impl Into<String>, workspace_path: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
            workspace_path: workspace_path.into(),
        }
    }
}

struct AvailableEntry {
    key: PoolKey,
    transport: Arc<Transport>,
    last_released_at: Instant,
}

#[derive(Default)]
struct PoolState {
    available: Vec<AvailableEntry>,
    active: Vec<(PoolKey, Arc<Transport>)>,
    pending: usize,
}

/// A transport on loan from the pool. `pooled` records whether it should be returned to the
/// available set on release or shut down immediately (non-pooled overflow, or `max_size == 0`).
pub struct Lease {
    transport: Arc<Transport>,
    key: PoolKey,
    pooled: bool,
}

impl Lease {
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }
}

/// Recycles warm transports keyed by `(backend_id, canonical_workspace_path)`.
///
/// `max_size == 0` means "do not recycle": every acquisition is a non-pooled overflow
/// transport and every release shuts it down immediately.
pub struct Pool {
    max_size: usize,
    max_idle_time: Duration,
    state: Arc<Mutex<PoolState>>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    pub fn new(max_size: usize, max_idle_time: Duration, cleanup_interval: Duration) -> Arc<Self> {
        let pool = Arc::new(Self {
            max_size,
            max_idle_time,
            state: Arc::new(Mutex::new(PoolState::default())),
            sweep_task: Mutex::new(None),
        });

        if !cleanup_interval.is_zero() {
            let weak = Arc::downgrade(&pool);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(cleanup_interval);
                ticker.tick().await; // first tick fires immediately; skip it
                loop {
                    ticker.tick().await;
                    let Some(pool) = weak.upgrade() else {
                        break;
                    };
                    pool.sweep_once().await;
                }
            });
            if let Ok(mut guard) = pool.sweep_task.try_lock() {
                *guard = Some(handle);
            }
        }

        pool
    }

    /// Reuses an idle entry for `key`, builds a new pooled entry if under capacity, or builds a
    /// non-pooled overflow transport otherwise. `factory` runs outside any lock, so concurrent
    /// acquisitions for distinct keys (or for the same key needing fresh processes) proceed in
    /// parallel; only the capacity bookkeeping is serialized.
    pub async fn acquire<F, Fut>(&self, key: PoolKey, factory: F) -> Result<Lease, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Transport, Error>>,
    {
        {
            let mut state = self.state.lock().await;
            if let Some(pos) = state.available.iter().position(|e| e.key == key) {
                let entry = state.available.remove(pos);
                state.active.push((key.clone(), entry.transport.clone()));
                info!(backend = %key.backend_id, workspace = %key.workspace_path, "reusing pooled transport");
                return Ok(Lease {
                    transport: entry.transport,
                    key,
                    pooled: true,
                });
            }
        }

        let reserved = {
            let mut state = self.state.lock().await;
            let current_size = state.available.len() + state.active.len() + state.pending;
            if self.max_size > 0 && current_size < self.max_size {
                state.pending += 1;
                true
            } else {
                false
            }
        };

        let built = factory().await;

        if reserved {
            let mut state = self.state.lock().await;
            state.pending -= 1;
        }

        let transport = Arc::new(built?);

        if reserved {
            let mut state = self.state.lock().await;
            state.active.push((key.clone(), transport.clone()));
            info!(backend = %key.backend_id, workspace = %key.workspace_path, "spawned new pooled transport");
        } else {
            info!(backend = %key.backend_id, workspace = %key.workspace_path, "spawned non-pooled overflow transport");
        }

        Ok(Lease {
            transport,
            key,
            pooled: reserved,
        })
    }

    /// Returns a leased transport to the pool, or shuts it down if it was non-pooled/overflow.
    pub async fn release(&self, lease: Lease) {
        if lease.pooled && self.max_size > 0 {
            let mut state = self.state.lock().await;
            remove_active(&mut state.active, &lease.key, &lease.transport);
            state.available.push(AvailableEntry {
                key: lease.key,
                transport: lease.transport,
                last_released_at: Instant::now(),
            });
            return;
        }

        if lease.pooled {
            let mut state = self.state.lock().await;
            remove_active(&mut state.active, &lease.key, &lease.transport);
        }
        lease.transport.stop().await;
    }

    pub async fn current_size(&self) -> usize {
        let state = self.state.lock().await;
        state.available.len() + state.active.len()
    }

    pub async fn available_count(&self) -> usize {
        self.state.lock().await.available.len()
    }

    async fn sweep_once(&self) {
        let stale = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let mut stale = Vec::new();
            state.available.retain(|entry| {
                if now.duration_since(entry.last_released_at) > self.max_idle_time {
                    stale.push(entry.transport.clone());
                    false
                } else {
                    true
                }
            });
            stale
        };

        for transport in stale {
            info!("evicting idle pooled transport");
            transport.stop().await;
        }
    }

    /// Shuts down every available and active entry and cancels the idle sweep task.
    pub async fn cleanup(&self) {
        let (available, active) = {
            let mut state = self.state.lock().await;
            (
                std::mem::take(&mut state.available),
                std::mem::take(&mut state.active),
            )
        };

        for entry in available {
            entry.transport.stop().await;
        }
        for (_, transport) in active {
            transport.stop().await;
        }

        if let Some(handle) = self.sweep_task.lock().await.take() {
            handle.abort();
        }
    }
}

fn remove_active(active: &mut Vec<(PoolKey, Arc<Transport>)>, key: &PoolKey, transport: &Arc<Transport>) {
    if let Some(pos) = active
        .iter()
        .position(|(k, t)| k == key && Arc::ptr_eq(t, transport))
    {
        active.remove(pos);
    }
}
