//! Runs one sync loop per chain and shuts them down together.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::IndexerError;
use crate::scheduler::{ChainStatus, SyncScheduler};
use crate::types::ChainId;

/// Final result of one chain's sync loop.
#[derive(Debug)]
pub struct ChainReport {
    pub chain: ChainId,
    pub result: Result<(), IndexerError>,
}

/// A set of chains to mirror, before they are started.
#[derive(Default)]
pub struct ChainMirror {
    schedulers: Vec<SyncScheduler>,
}

impl ChainMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, scheduler: SyncScheduler) -> Self {
        self.schedulers.push(scheduler);
        self
    }

    pub fn chains(&self) -> Vec<ChainId> {
        self.schedulers.iter().map(|s| s.chain().clone()).collect()
    }

    /// Spawn every sync loop on the current tokio runtime.
    pub fn spawn(self) -> RunningMirror {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut status = HashMap::new();
        let mut handles = Vec::with_capacity(self.schedulers.len());

        for mut scheduler in self.schedulers {
            let chain = scheduler.chain().clone();
            status.insert(chain.clone(), scheduler.status());
            let rx = shutdown_rx.clone();
            let handle = tokio::spawn(async move { scheduler.run(rx).await });
            handles.push((chain, handle));
        }

        tracing::info!(chains = handles.len(), "Mirror started");
        RunningMirror {
            shutdown: ShutdownHandle(Arc::new(shutdown)),
            status,
            handles,
        }
    }
}

/// Cloneable trigger that stops every loop of a [`RunningMirror`].
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        let _ = self.0.send(true);
    }
}

/// Handle to running sync loops.
pub struct RunningMirror {
    shutdown: ShutdownHandle,
    status: HashMap<ChainId, watch::Receiver<ChainStatus>>,
    handles: Vec<(ChainId, JoinHandle<Result<(), IndexerError>>)>,
}

impl RunningMirror {
    /// Ask every loop to stop after its current ingestion.
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// A handle that can stop the loops from another task (e.g. a signal handler).
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Latest status of `chain`.
    pub fn status(&self, chain: &ChainId) -> Option<ChainStatus> {
        self.status.get(chain).map(|rx| rx.borrow().clone())
    }

    /// Status receivers for every chain.
    pub fn status_receivers(&self) -> &HashMap<ChainId, watch::Receiver<ChainStatus>> {
        &self.status
    }

    /// Wait for every loop to finish. A loop that panicked is reported as aborted.
    pub async fn join(self) -> Vec<ChainReport> {
        let mut reports = Vec::with_capacity(self.handles.len());
        for (chain, handle) in self.handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(IndexerError::Aborted {
                    reason: e.to_string(),
                }),
            };
            reports.push(ChainReport { chain, result });
        }
        reports
    }
}
