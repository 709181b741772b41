//! chainmirror-storage — storage backends for ChainMirror.
//!
//! Backends:
//! - [`MemoryStore`] — in-memory (dev/testing, no persistence)
//! - [`sqlite`] — SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres` — PostgreSQL via `sqlx` (shared deployments)
//!
//! [`open`] picks a backend from a database URL:
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), chainmirror_core::IndexerError> {
//! let backend = chainmirror_storage::open("sqlite:./mirror.db").await?;
//! let writer = backend.chain_store();
//! let reader = backend.query_store();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chainmirror_core::{ChainStore, IndexerError, QueryStore};

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "memory")]
pub use chainmirror_core::memory::MemoryStore;

/// An opened store, usable both by the sync schedulers and by readers.
#[derive(Clone)]
pub enum Backend {
    #[cfg(feature = "memory")]
    Memory(Arc<MemoryStore>),
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<sqlite::SqliteStorage>),
    #[cfg(feature = "postgres")]
    Postgres(Arc<postgres::PostgresStorage>),
}

impl Backend {
    /// Write side, for the ingestion pipeline.
    pub fn chain_store(&self) -> Arc<dyn ChainStore> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.clone(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.clone(),
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.clone(),
        }
    }

    /// Read side, for query consumers.
    pub fn query_store(&self) -> Arc<dyn QueryStore> {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(s) => s.clone(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(s) => s.clone(),
            #[cfg(feature = "postgres")]
            Self::Postgres(s) => s.clone(),
        }
    }

    /// Short backend name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            #[cfg(feature = "memory")]
            Self::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => "sqlite",
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => "postgres",
        }
    }
}

/// Which backend a database URL selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    Sqlite,
    Postgres,
}

impl BackendKind {
    /// `"memory"`, `postgres://…` / `postgresql://…`, and anything else is
    /// treated as a SQLite URL or file path.
    pub fn from_url(url: &str) -> Self {
        let url = url.trim();
        if url.eq_ignore_ascii_case("memory") || url.eq_ignore_ascii_case("memory:") {
            Self::Memory
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Self::Postgres
        } else {
            Self::Sqlite
        }
    }
}

fn disabled(feature: &str) -> IndexerError {
    IndexerError::FatalConfig(format!(
        "storage backend '{feature}' is not compiled in (enable the `{feature}` feature)"
    ))
}

/// Open the store named by `url`.
pub async fn open(url: &str) -> Result<Backend, IndexerError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(IndexerError::FatalConfig("database url is empty".into()));
    }
    let backend = match BackendKind::from_url(url) {
        #[cfg(feature = "memory")]
        BackendKind::Memory => Backend::Memory(Arc::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => Backend::Sqlite(Arc::new(sqlite::SqliteStorage::open(url).await?)),
        #[cfg(feature = "postgres")]
        BackendKind::Postgres => {
            Backend::Postgres(Arc::new(postgres::PostgresStorage::connect(url).await?))
        }
        #[allow(unreachable_patterns)]
        BackendKind::Memory => return Err(disabled("memory")),
        #[allow(unreachable_patterns)]
        BackendKind::Sqlite => return Err(disabled("sqlite")),
        #[allow(unreachable_patterns)]
        BackendKind::Postgres => return Err(disabled("postgres")),
    };
    tracing::info!(backend = backend.name(), "storage opened");
    Ok(backend)
}
