//! Scripted chain and store doubles shared by the scenario tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chainmirror_core::{
    BlockCommit, BlockRef, ChainAdapter, ChainId, ChainKind, ChainStatus, ChainStore, Cursor,
    HeadStream, IndexerError, MemoryStore, QueryStore, RawBlock, RawTransaction, SyncConfig,
    SyncConfigBuilder, SyncScheduler, SyncState,
};
use chainmirror_core::backoff::BackoffConfig;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

// ─── MockAdapter ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    blocks: BTreeMap<u64, RawBlock>,
    /// Reported head; defaults to the highest scripted block.
    head: Option<u64>,
    fetched: Vec<u64>,
    failing_fetches: u32,
    fatal_head: bool,
    subscriptions: u32,
    failing_subscriptions: u32,
}

/// Sender side of the head stream currently handed out, if any.
#[derive(Default)]
struct HeadChannel {
    sender: Option<mpsc::UnboundedSender<u64>>,
    /// Receiver created up front so announcements made before the first
    /// subscription are not lost.
    pending: Option<mpsc::UnboundedReceiver<u64>>,
}

/// A remote chain whose blocks, head and failures are scripted by the test.
pub struct MockAdapter {
    chain: ChainId,
    state: Mutex<MockState>,
    push: bool,
    heads: Mutex<HeadChannel>,
}

impl MockAdapter {
    /// Poll-only chain.
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.into(),
            state: Mutex::new(MockState::default()),
            push: false,
            heads: Mutex::new(HeadChannel::default()),
        }
    }

    /// Chain that can push head notifications through [`MockAdapter::announce`].
    pub fn with_subscription(chain: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            chain: chain.into(),
            state: Mutex::new(MockState::default()),
            push: true,
            heads: Mutex::new(HeadChannel {
                sender: Some(tx),
                pending: Some(rx),
            }),
        }
    }

    /// Script blocks `from..=to` on `branch`; block hashes are `{branch}{height}`
    /// and transaction hashes `{branch}{height}-tx{i}`. Existing blocks at those
    /// heights are replaced, which is how tests switch branches.
    pub fn extend(&self, branch: &str, from: u64, to: u64, txs_per_block: usize) {
        let mut state = self.state.lock().unwrap();
        for height in from..=to {
            let parent_hash = match height.checked_sub(1) {
                None => String::new(),
                Some(parent) => state
                    .blocks
                    .get(&parent)
                    .map(|b| b.hash.clone())
                    .unwrap_or_else(|| format!("{branch}{parent}")),
            };
            let transactions = (0..txs_per_block)
                .map(|i| RawTransaction {
                    hash: format!("{branch}{height}-tx{i}"),
                    from: Some(format!("0xsender{i}")),
                    to: Some("0xrecipient".into()),
                    value: format!("0x{:x}", 1_000 + i),
                })
                .collect();
            state.blocks.insert(
                height,
                RawBlock {
                    height,
                    hash: format!("{branch}{height}"),
                    parent_hash,
                    timestamp: 1_700_000_000 + height as i64 * 12,
                    transactions,
                },
            );
        }
    }

    /// Forget every block at `from` and above, as a node on a shorter branch would.
    pub fn truncate(&self, from: u64) {
        let mut state = self.state.lock().unwrap();
        state.blocks.retain(|height, _| *height < from);
        state.head = None;
    }

    /// Script one hand-built block.
    pub fn insert(&self, block: RawBlock) {
        self.state.lock().unwrap().blocks.insert(block.height, block);
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = Some(head);
    }

    /// Set the head and push it to the subscriber.
    pub fn announce(&self, head: u64) {
        self.set_head(head);
        if let Some(tx) = &self.heads.lock().unwrap().sender {
            let _ = tx.send(head);
        }
    }

    /// Close the head stream handed to the subscriber, as a dropped WebSocket would.
    pub fn end_stream(&self) {
        let mut heads = self.heads.lock().unwrap();
        heads.sender = None;
        heads.pending = None;
    }

    /// The next `n` subscription attempts fail with a transient error.
    pub fn fail_subscriptions(&self, n: u32) {
        self.state.lock().unwrap().failing_subscriptions = n;
    }

    /// Number of `subscribe_heads` calls so far, failed ones included.
    pub fn subscriptions(&self) -> u32 {
        self.state.lock().unwrap().subscriptions
    }

    /// The next `n` block fetches fail with a transient error.
    pub fn fail_fetches(&self, n: u32) {
        self.state.lock().unwrap().failing_fetches = n;
    }

    /// Every head query fails with a configuration error.
    pub fn reject_head_queries(&self) {
        self.state.lock().unwrap().fatal_head = true;
    }

    /// Heights requested through `fetch_block`, in order.
    pub fn fetched(&self) -> Vec<u64> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub fn clear_fetched(&self) {
        self.state.lock().unwrap().fetched.clear();
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain(&self) -> &ChainId {
        &self.chain
    }

    fn kind(&self) -> ChainKind {
        ChainKind::Account
    }

    async fn head_height(&self) -> Result<u64, IndexerError> {
        let state = self.state.lock().unwrap();
        if state.fatal_head {
            return Err(IndexerError::FatalConfig("HTTP 401 Unauthorized".into()));
        }
        Ok(state
            .head
            .unwrap_or_else(|| state.blocks.keys().next_back().copied().unwrap_or(0)))
    }

    async fn fetch_block(&self, at: &BlockRef) -> Result<Option<RawBlock>, IndexerError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(IndexerError::TransientNetwork("connection reset".into()));
        }
        match at {
            BlockRef::Height(height) => {
                state.fetched.push(*height);
                let head = state
                    .head
                    .unwrap_or_else(|| state.blocks.keys().next_back().copied().unwrap_or(0));
                if *height > head {
                    return Ok(None);
                }
                Ok(state.blocks.get(height).cloned())
            }
            BlockRef::Hash(hash) => Ok(state.blocks.values().find(|b| &b.hash == hash).cloned()),
        }
    }

    async fn subscribe_heads(&self) -> Result<Option<HeadStream>, IndexerError> {
        if !self.push {
            return Ok(None);
        }
        {
            let mut state = self.state.lock().unwrap();
            state.subscriptions += 1;
            if state.failing_subscriptions > 0 {
                state.failing_subscriptions -= 1;
                return Err(IndexerError::TransientNetwork("websocket handshake failed".into()));
            }
        }
        let rx = {
            let mut heads = self.heads.lock().unwrap();
            match heads.pending.take() {
                Some(rx) => rx,
                None => {
                    let (tx, rx) = mpsc::unbounded_channel();
                    heads.sender = Some(tx);
                    rx
                }
            }
        };
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|height| (Ok(height), rx))
        });
        Ok(Some(Box::pin(stream)))
    }

    async fn balance(&self, _address: &str) -> Result<String, IndexerError> {
        Ok("0".into())
    }
}

// ─── FlakyStore ──────────────────────────────────────────────────────────────

/// Memory store whose commits can be made to fail before anything is written.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    failing_commits: Mutex<u32>,
}

impl FlakyStore {
    pub fn fail_commits(&self, n: u32) {
        *self.failing_commits.lock().unwrap() = n;
    }
}

#[async_trait]
impl ChainStore for FlakyStore {
    async fn cursor(&self, chain: &ChainId) -> Result<Option<Cursor>, IndexerError> {
        self.inner.cursor(chain).await
    }

    async fn block_hash(&self, chain: &ChainId, height: u64) -> Result<Option<String>, IndexerError> {
        self.inner.block_hash(chain, height).await
    }

    async fn commit(&self, commit: &BlockCommit) -> Result<(), IndexerError> {
        {
            let mut failing = self.failing_commits.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(IndexerError::Storage("database is locked".into()));
            }
        }
        self.inner.commit(commit).await
    }

    async fn rollback_to(&self, chain: &ChainId, ancestor: u64) -> Result<u64, IndexerError> {
        self.inner.rollback_to(chain, ancestor).await
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Config with short waits so scenarios finish quickly.
pub fn fast_config() -> SyncConfig {
    SyncConfigBuilder::new()
        .poll_interval_ms(20)
        .not_ready_delay_ms(5)
        .backoff(BackoffConfig {
            initial_ms: 1,
            max_ms: 10,
            multiplier: 2.0,
        })
        .build()
}

pub struct Running {
    pub status: watch::Receiver<ChainStatus>,
    pub shutdown: watch::Sender<bool>,
    pub task: JoinHandle<Result<(), IndexerError>>,
}

impl Running {
    pub async fn stop(self) -> Result<(), IndexerError> {
        let _ = self.shutdown.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("sync loop did not stop")
            .expect("sync loop panicked")
    }
}

pub fn spawn(
    config: SyncConfig,
    adapter: Arc<dyn ChainAdapter>,
    store: Arc<dyn ChainStore>,
) -> Running {
    let mut scheduler = SyncScheduler::new(config, adapter, store);
    let status = scheduler.status();
    let (shutdown, rx) = watch::channel(false);
    let task = tokio::spawn(async move { scheduler.run(rx).await });
    Running {
        status,
        shutdown,
        task,
    }
}

/// Wait until `condition` holds, checking every few milliseconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

/// Wait until the published state equals `state`.
pub async fn wait_for_state(status: &mut watch::Receiver<ChainStatus>, state: SyncState) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if status.borrow_and_update().state == state {
                return;
            }
            status.changed().await.expect("scheduler dropped");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for state {state}"));
}

/// Wait until the stored cursor points at the block `hash`.
pub async fn wait_for_tip(store: &dyn ChainStore, chain: &ChainId, hash: &str) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let cursor = store.cursor(chain).await.unwrap();
            if cursor.is_some_and(|c| c.hash == hash) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for tip {hash}"));
}

/// Wait until the published cursor equals `height`.
pub async fn wait_for_cursor(status: &mut watch::Receiver<ChainStatus>, height: u64) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if status.borrow_and_update().cursor == Some(height) {
                return;
            }
            status.changed().await.expect("scheduler dropped");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for cursor {height}"));
}

/// Assert that every stored block links to the stored block below it.
pub async fn assert_linked(store: &MemoryStore, chain: &ChainId) {
    let heights = store.heights(chain);
    for pair in heights.windows(2) {
        let parent = store.block(chain, &BlockRef::Height(pair[0])).await.unwrap().unwrap();
        let child = store.block(chain, &BlockRef::Height(pair[1])).await.unwrap().unwrap();
        assert_eq!(pair[1], pair[0] + 1, "gap between {} and {}", pair[0], pair[1]);
        assert_eq!(
            child.block.parent_hash, parent.block.hash,
            "block {} does not link to {}",
            pair[1], pair[0]
        );
    }
}
