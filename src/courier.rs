//! Courier: the batching classification worker.
//!
//! A single task ferries batches between the pending queue and the brain.
//! It sleeps until a `release` wakes it, debounces so a burst of files
//! coalesces into one request (and the kernel finishes flushing writes),
//! drains the queue, and applies the verdicts. The FUSE loop never waits
//! on it.
//!
//! CRITICAL RULE: the Courier is the only user of the brain socket. No
//! other task sends or receives on it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::brain::BrainClient;
use crate::error::Result;
use crate::state::SharedState;

/// Debounce before draining, so co-arriving files ride one batch.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

pub struct Courier {
    /// Shared state for coordinating with the kernel surface.
    pub state: SharedState,

    /// Tokio runtime owning the worker task and brain I/O.
    pub runtime: Arc<tokio::runtime::Runtime>,

    /// Handle to the worker task.
    pub task_handle: Option<JoinHandle<()>>,

    client: Arc<BrainClient>,
    debounce: Duration,
}

impl Courier {
    /// Courier against the default brain socket.
    pub fn new(state: SharedState) -> Result<Self> {
        Self::with_client(state, BrainClient::new(), DEBOUNCE)
    }

    /// Courier with a custom client and debounce (tests shorten both).
    pub fn with_client(state: SharedState, client: BrainClient, debounce: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;

        Ok(Self {
            state,
            runtime: Arc::new(runtime),
            task_handle: None,
            client: Arc::new(client),
            debounce,
        })
    }

    /// Spawn the worker task.
    pub fn start(&mut self) {
        let state = Arc::clone(&self.state);
        let client = Arc::clone(&self.client);
        let debounce = self.debounce;
        let handle = self.runtime.spawn(async move {
            Courier::run_task(state, client, debounce).await;
        });

        self.task_handle = Some(handle);
        tracing::info!("[Courier] Started worker task");
    }

    /// Signal shutdown and join the worker. The current batch is finished
    /// or abandoned; nothing is interrupted mid-exchange.
    pub fn stop(&mut self) {
        self.state.begin_shutdown();
        if let Some(handle) = self.task_handle.take() {
            let _ = self.runtime.block_on(handle);
            tracing::info!("[Courier] Stopped");
        }
    }

    async fn run_task(state: SharedState, client: Arc<BrainClient>, debounce: Duration) {
        tracing::info!("[Courier] Worker loop started");

        loop {
            // Sleep until there is work or shutdown begins.
            while state.is_running() && state.queue_is_empty() {
                state.queue_notify.notified().await;
            }
            if !state.is_running() && state.queue_is_empty() {
                break;
            }

            tokio::time::sleep(debounce).await;

            let batch = state.drain_batch();
            if batch.is_empty() {
                if !state.is_running() {
                    break;
                }
                continue;
            }

            if !state.is_running() {
                // Unmounting: abandon rather than open a fresh exchange.
                Self::reject_all(&state, &batch);
                state.finish_batch(&batch);
                break;
            }

            Self::classify_batch(&state, &client, &batch).await;
            state.finish_batch(&batch);

            if !state.is_running() && state.queue_is_empty() {
                break;
            }
        }

        tracing::info!("[Courier] Worker loop stopped");
    }

    async fn classify_batch(state: &SharedState, client: &BrainClient, batch: &[(String, u64)]) {
        let paths: Vec<String> = batch
            .iter()
            .map(|(name, _)| state.backing_path(name).to_string_lossy().into_owned())
            .collect();

        tracing::info!("[Courier] Sending batch request ({} files)", batch.len());

        match client.classify(&paths).await {
            Ok(verdicts) => {
                let mut registry = state.registry.lock().unwrap_or_else(|e| e.into_inner());
                for ((name, generation), path) in batch.iter().zip(&paths) {
                    match verdicts.get(path) {
                        Some(category) => {
                            if registry.categorize(name, category, *generation) {
                                tracing::info!(
                                    "[Courier] File '{}' moved to '{}'",
                                    name,
                                    category
                                );
                            } else {
                                tracing::debug!(
                                    "[Courier] Stale verdict for '{}' dropped",
                                    name
                                );
                            }
                        }
                        None => {
                            registry.reject(name, *generation);
                            tracing::warn!("[Courier] Brain returned no verdict for '{}'", name);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    "[Courier] Brain exchange failed, rejecting {} files: {}",
                    batch.len(),
                    e
                );
                Self::reject_all(state, batch);
            }
        }
    }

    fn reject_all(state: &SharedState, batch: &[(String, u64)]) {
        let mut registry = state.registry.lock().unwrap_or_else(|e| e.into_inner());
        for (name, generation) in batch {
            registry.reject(name, *generation);
        }
    }
}

impl Drop for Courier {
    fn drop(&mut self) {
        if let Some(handle) = &self.task_handle {
            handle.abort();
        }
    }
}
