//! Facade tying the backend channel, the query scheduler and table population together.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use posdb_core::position::PositionError;
use posdb_core::table::{self, Table, TableOptions};
use posdb_core::QueryCacheEntry;

use crate::config::ClientConfig;
use crate::error::{ClientError, QueryError};
use crate::eval::{self, EvalProvider};
use crate::protocol::DatabaseInfo;
use crate::proxy::DatabaseProxy;
use crate::scheduler::{QueryEvent, QueryOutcome, QueryQueueEntry, QueryScheduler};

pub struct Explorer {
    proxy: Arc<DatabaseProxy>,
    scheduler: QueryScheduler,
    query_eval: bool,
    pub options: TableOptions,
}

impl Explorer {
    /// Spawn the backend and start the query worker.
    pub async fn launch(
        config: &ClientConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<QueryEvent>), ClientError> {
        let eval = eval::provider_for(config)?;
        let proxy = Arc::new(DatabaseProxy::launch(config).await?);
        Ok(Self::new(proxy, eval, config))
    }

    pub fn new(
        proxy: Arc<DatabaseProxy>,
        eval: Arc<dyn EvalProvider>,
        config: &ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<QueryEvent>) {
        let (scheduler, events) = QueryScheduler::new(proxy.clone(), eval, config.query_cache_size);
        (
            Self {
                proxy,
                scheduler,
                query_eval: config.query_eval,
                options: TableOptions::default(),
            },
            events,
        )
    }

    pub fn proxy(&self) -> &DatabaseProxy {
        &self.proxy
    }

    pub fn scheduler(&self) -> &QueryScheduler {
        &self.scheduler
    }

    /// Open `path`; cached results of the previous database are dropped.
    pub async fn open(&self, path: impl AsRef<Path>) -> Result<DatabaseInfo, ClientError> {
        // Nothing of the old database is served while the switch is in progress,
        // and nothing that slipped in meanwhile survives it.
        self.scheduler.reset();
        let opened = self.proxy.open(path).await;
        self.scheduler.reset();
        opened?;
        self.proxy.info().await
    }

    pub async fn close(&self) {
        self.scheduler.reset();
        self.proxy.close().await;
        self.scheduler.reset();
    }

    pub fn entry_for_position(&self, fen: &str) -> QueryQueueEntry {
        QueryQueueEntry::for_position(fen, self.query_eval)
    }

    pub fn entry_for_move(&self, prev_fen: &str, san: &str) -> Result<QueryQueueEntry, PositionError> {
        QueryQueueEntry::for_move(prev_fen, san, self.query_eval)
    }

    /// The board now shows `entry.current_fen`; its result arrives as an event.
    pub fn navigate(&self, entry: QueryQueueEntry) {
        self.scheduler.set_current_fen(&entry.current_fen);
        self.scheduler.schedule(entry);
    }

    pub async fn query(&self, entry: QueryQueueEntry) -> QueryOutcome {
        self.scheduler.query(entry).await
    }

    /// Rows for the position shown by `entry`.
    pub fn populate(
        &self,
        entry: &QueryQueueEntry,
        cached: &QueryCacheEntry,
    ) -> Result<Table, PositionError> {
        table::populate(cached, &entry.current_fen, &self.options)
    }

    /// Query and tabulate in one step.
    pub async fn table(&self, entry: QueryQueueEntry) -> Result<Table, QueryError> {
        let cached = self.query(entry.clone()).await?;
        self.populate(&entry, &cached)
            .map_err(|e| QueryError::Backend(e.to_string()))
    }

    /// Stop the worker and shut the backend down.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
        self.proxy.exit().await;
        info!("Explorer shut down");
    }
}
