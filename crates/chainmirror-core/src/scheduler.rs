//! Per-chain sync loop: backfill up to head, then follow new heads.
//!
//! # Backfill
//! While the head is more than one block ahead of the cursor, heights are
//! ingested strictly in order. The cursor only ever moves through store commits,
//! so a restart resumes exactly where the last commit left off.
//!
//! # Live
//! With a head subscription, each signaled height `n` triggers ingestion of
//! `cursor+1 ..= n`. Without one (or while the subscription is down) the head is
//! re-queried every `poll_interval`. Whenever the head runs ahead again the loop
//! is back in backfill without any special casing. A wake-up that brings no new
//! height re-checks the stored tip against the node, so a replacement branch of
//! equal or lower height is still noticed.
//!
//! # Failures
//! Retryable errors back off exponentially and retry the same step. Fatal
//! errors stop this chain's loop and are returned to the caller. Every wait is
//! cancelled by the shutdown signal; an ingestion already in flight finishes
//! before the loop stops.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;

use crate::adapter::{ChainAdapter, HeadStream};
use crate::backoff::Backoff;
use crate::config::SyncConfig;
use crate::cursor::initial_height;
use crate::error::IndexerError;
use crate::pipeline::{IngestOutcome, IngestPipeline};
use crate::reorg::ReorgResolver;
use crate::store::ChainStore;
use crate::types::ChainId;

/// Runtime state of one chain's sync loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    /// Not yet started.
    Idle,
    /// Ingesting towards a head more than one block ahead.
    Backfilling,
    /// Following the chain tip.
    Live,
    /// Re-ingesting after a rollback.
    ReorgRecovery,
    /// Waiting before retrying a failed step.
    Backoff,
    /// Shut down on request.
    Stopped,
    /// Stopped by a fatal error.
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Backfilling => write!(f, "backfilling"),
            Self::Live => write!(f, "live"),
            Self::ReorgRecovery => write!(f, "reorg-recovery"),
            Self::Backoff => write!(f, "backoff"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a chain's progress, published on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainStatus {
    pub chain: ChainId,
    pub state: SyncState,
    /// Last committed height.
    pub cursor: Option<u64>,
    /// Last observed remote head.
    pub head: Option<u64>,
}

/// How a catch-up pass ended.
enum Progress {
    /// Cursor reached the target head.
    CaughtUp,
    /// The pass stopped early and the head should be re-read.
    Interrupted,
}

/// What ended a live-mode wait.
enum Wake {
    Head(u64),
    Tick,
    StreamClosed(Option<IndexerError>),
}

/// Resolves once shutdown has been requested or the signal sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleep for `delay` unless shutdown comes first.
async fn cancellable_sleep(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), IndexerError> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = shutdown_requested(shutdown) => Err(IndexerError::Shutdown),
    }
}

/// Drives one chain from its cursor to the remote head and keeps it there.
pub struct SyncScheduler {
    config: SyncConfig,
    adapter: Arc<dyn ChainAdapter>,
    store: Arc<dyn ChainStore>,
    pipeline: IngestPipeline,
    backoff: Backoff,
    status: watch::Sender<ChainStatus>,
    heads: Option<HeadStream>,
    /// Cleared once the adapter reports it cannot push heads.
    push_capable: bool,
    /// Consecutive blocks that failed linkage while the store below them was canonical.
    unlinked: u64,
}

impl SyncScheduler {
    pub fn new(
        config: SyncConfig,
        adapter: Arc<dyn ChainAdapter>,
        store: Arc<dyn ChainStore>,
    ) -> Self {
        let pipeline = IngestPipeline::new(
            adapter.clone(),
            store.clone(),
            ReorgResolver::new(config.max_reorg_depth),
            config.max_transactions_per_block,
        );
        let (status, _) = watch::channel(ChainStatus {
            chain: adapter.chain().clone(),
            state: SyncState::Idle,
            cursor: None,
            head: None,
        });
        Self {
            backoff: Backoff::new(config.backoff.clone()),
            config,
            adapter,
            store,
            pipeline,
            status,
            heads: None,
            push_capable: true,
            unlinked: 0,
        }
    }

    pub fn chain(&self) -> &ChainId {
        self.adapter.chain()
    }

    /// Subscribe to status updates.
    pub fn status(&self) -> watch::Receiver<ChainStatus> {
        self.status.subscribe()
    }

    /// Run until shutdown (`Ok`) or a fatal error (`Err`).
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), IndexerError> {
        tracing::info!(
            chain = %self.chain(),
            kind = %self.adapter.kind(),
            start_height = ?self.config.start_height,
            backfill_depth = self.config.backfill_depth,
            "Starting sync"
        );

        match self.store.cursor(self.adapter.chain()).await {
            Ok(cursor) => {
                let height = cursor.map(|c| c.height);
                self.status.send_modify(|s| s.cursor = height);
            }
            Err(e) => tracing::debug!(chain = %self.chain(), error = %e, "Cursor not readable yet"),
        }

        match self.sync(&mut shutdown).await {
            Ok(()) | Err(IndexerError::Shutdown) => {
                self.set_state(SyncState::Stopped);
                tracing::info!(chain = %self.chain(), "Sync stopped");
                Ok(())
            }
            Err(e) => {
                self.set_state(SyncState::Failed);
                tracing::error!(chain = %self.chain(), error = %e, "Sync failed");
                Err(e)
            }
        }
    }

    async fn sync(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<(), IndexerError> {
        let mut target: Option<u64> = None;
        loop {
            if *shutdown.borrow() {
                return Err(IndexerError::Shutdown);
            }

            match self.catch_up(target.take(), shutdown).await {
                Ok(Progress::CaughtUp) => {
                    self.backoff.reset();
                    target = self.wait_for_head(shutdown).await?;
                }
                Ok(Progress::Interrupted) => {}
                Err(e) if e.is_retryable() => {
                    let delay = self.backoff.next_delay();
                    self.set_state(SyncState::Backoff);
                    tracing::warn!(
                        chain = %self.chain(),
                        error = %e,
                        attempt = self.backoff.attempts(),
                        retry_in_ms = delay.as_millis() as u64,
                        "Sync step failed, backing off"
                    );
                    cancellable_sleep(delay, shutdown).await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Ingest every height between the cursor and `target` (or the current head).
    async fn catch_up(
        &mut self,
        target: Option<u64>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Progress, IndexerError> {
        let head = match target {
            Some(h) => h,
            None => self.adapter.head_height().await?,
        };
        self.status.send_modify(|s| s.head = Some(head));

        let cursor = self.store.cursor(self.adapter.chain()).await?;
        let mut next = match &cursor {
            Some(cursor) => cursor.next_height(),
            None => {
                let start = initial_height(self.config.start_height, self.config.backfill_depth, head);
                tracing::info!(chain = %self.chain(), start, head, "No cursor, starting fresh");
                start
            }
        };

        if next > head {
            if let Some(cursor) = cursor {
                if let Some(event) = self.pipeline.recheck_tip(cursor.height.min(head)).await? {
                    self.set_state(SyncState::ReorgRecovery);
                    self.status.send_modify(|s| s.cursor = Some(event.ancestor));
                    return Ok(Progress::Interrupted);
                }
            }
            return Ok(Progress::CaughtUp);
        }
        let backfill = head > next;
        if backfill {
            self.set_state(SyncState::Backfilling);
            tracing::info!(chain = %self.chain(), from = next, to = head, "Backfilling");
        } else {
            self.set_state(SyncState::Live);
        }

        while next <= head {
            if *shutdown.borrow() {
                return Err(IndexerError::Shutdown);
            }

            match self.pipeline.ingest(next).await? {
                IngestOutcome::Committed(summary) => {
                    self.backoff.reset();
                    self.unlinked = 0;
                    self.status.send_modify(|s| s.cursor = Some(summary.height));
                    tracing::info!(
                        chain = %self.chain(),
                        height = summary.height,
                        hash = %summary.hash,
                        txs = summary.transactions,
                        "Block indexed"
                    );
                    next += 1;
                }
                IngestOutcome::NotYetAvailable => {
                    cancellable_sleep(self.config.not_ready_delay(), shutdown).await?;
                    return Ok(Progress::Interrupted);
                }
                IngestOutcome::Reorged(event) if event.depth == 0 => {
                    self.unlinked += 1;
                    if self.unlinked > self.config.max_reorg_depth {
                        return Err(IndexerError::UnresolvableReorg {
                            chain: event.chain,
                            height: event.detected_at,
                            max_depth: self.config.max_reorg_depth,
                        });
                    }
                    let delay = self.backoff.next_delay();
                    self.set_state(SyncState::Backoff);
                    tracing::warn!(
                        chain = %self.chain(),
                        height = event.detected_at,
                        attempt = self.unlinked,
                        retry_in_ms = delay.as_millis() as u64,
                        "Block does not link to a canonical parent, retrying"
                    );
                    cancellable_sleep(delay, shutdown).await?;
                    return Ok(Progress::Interrupted);
                }
                IngestOutcome::Reorged(event) => {
                    self.set_state(SyncState::ReorgRecovery);
                    self.status.send_modify(|s| s.cursor = Some(event.ancestor));
                    next = event.ancestor + 1;
                }
            }
        }

        if backfill {
            tracing::info!(chain = %self.chain(), at = head, "Backfill complete");
        }
        Ok(Progress::CaughtUp)
    }

    /// Wait for the next head signal. `None` means "re-query the head".
    async fn wait_for_head(
        &mut self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<Option<u64>, IndexerError> {
        self.set_state(SyncState::Live);

        if self.heads.is_none() && self.push_capable {
            match self.adapter.subscribe_heads().await {
                Ok(Some(stream)) => {
                    tracing::info!(chain = %self.chain(), "Subscribed to new heads");
                    self.heads = Some(stream);
                }
                Ok(None) => {
                    tracing::debug!(chain = %self.chain(), "Adapter is poll-only");
                    self.push_capable = false;
                }
                Err(e) => {
                    tracing::warn!(chain = %self.chain(), error = %e, "Head subscription failed, polling");
                }
            }
        }

        let interval = self.config.poll_interval();
        let wake = match self.heads.as_mut() {
            Some(stream) => tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(height)) => Wake::Head(height),
                    Some(Err(e)) => Wake::StreamClosed(Some(e)),
                    None => Wake::StreamClosed(None),
                },
                _ = tokio::time::sleep(interval) => Wake::Tick,
                _ = shutdown_requested(shutdown) => return Err(IndexerError::Shutdown),
            },
            None => {
                cancellable_sleep(interval, shutdown).await?;
                Wake::Tick
            }
        };

        match wake {
            Wake::Head(height) => {
                tracing::debug!(chain = %self.chain(), height, "New head");
                Ok(Some(height))
            }
            Wake::Tick => Ok(None),
            Wake::StreamClosed(err) => {
                match err {
                    Some(e) => tracing::warn!(chain = %self.chain(), error = %e, "Head stream failed, resubscribing"),
                    None => tracing::debug!(chain = %self.chain(), "Head stream ended, resubscribing"),
                }
                self.heads = None;
                Ok(None)
            }
        }
    }

    fn set_state(&self, state: SyncState) {
        self.status.send_if_modified(|s| {
            if s.state == state {
                return false;
            }
            s.state = state;
            true
        });
    }
}
