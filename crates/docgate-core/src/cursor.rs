//! Resumable cursor pagination
//!
//! A cursor is bound to the connection it was opened on. Every batch is
//! pulled under a lease on that connection, so a disconnect waits for an
//! in-flight batch and every later batch fails with "no connection".

use crate::registry::{Connection, ConnectionLease};
use crate::{GatewayError, Result};
use dashmap::DashMap;
use docgate_store::{Document, StoreCursor, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Documents per batch when the request does not say
pub const DEFAULT_BATCH_SIZE: u64 = 15;

/// One page of cursor results
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub id: u64,
    pub results: Vec<Document>,
}

impl Batch {
    /// `{results: [...], id, ok: 1}`
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(
            "results".to_string(),
            Value::Array(self.results.iter().cloned().map(Value::Document).collect()),
        );
        doc.insert("id".to_string(), Value::from(self.id));
        doc.insert("ok".to_string(), Value::Int32(1));
        doc
    }
}

struct OpenCursor {
    handle: Box<dyn StoreCursor>,
    /// Fetched but undelivered documents, served before the handle
    pending: VecDeque<Document>,
}

impl OpenCursor {
    async fn pull(&mut self) -> docgate_store::Result<Option<Document>> {
        match self.pending.pop_front() {
            Some(doc) => Ok(Some(doc)),
            None => self.handle.next().await,
        }
    }

    fn push_back(&mut self, docs: Vec<Document>) {
        for doc in docs.into_iter().rev() {
            self.pending.push_front(doc);
        }
    }
}

struct CursorEntry {
    connection: Arc<Connection>,
    state: Mutex<OpenCursor>,
    last_used: parking_lot::Mutex<Instant>,
}

impl CursorEntry {
    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }

    /// Pull one batch. The caller holds a lease on `self.connection`; the
    /// lease is always taken before the cursor lock.
    async fn fill(&self, id: u64, batch_size: u64) -> Result<Batch> {
        self.touch();
        let batch_size = if batch_size == 0 { DEFAULT_BATCH_SIZE } else { batch_size };
        let mut cursor = self.state.lock().await;
        let mut results = Vec::new();

        while (results.len() as u64) < batch_size {
            match cursor.pull().await {
                Ok(Some(doc)) => results.push(doc),
                Ok(None) => break,
                Err(e) => {
                    let fetched = results.len();
                    cursor.push_back(results);
                    if e.is_transient() {
                        warn!(cursor_id = id, fetched, error = %e, "Cursor interrupted");
                        return Err(GatewayError::CursorInterrupted { id });
                    }
                    return Err(GatewayError::from_store(e, self.connection.name()));
                }
            }
        }

        self.touch();
        debug!(cursor_id = id, returned = results.len(), "Cursor batch");
        Ok(Batch { id, results })
    }
}

/// Gateway-wide table of open cursors
pub struct CursorManager {
    next_id: AtomicU64,
    cursors: DashMap<u64, Arc<CursorEntry>>,
}

impl CursorManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            cursors: DashMap::new(),
        }
    }

    /// Register a store cursor opened on `connection` and return its id
    pub fn register(&self, connection: Arc<Connection>, handle: Box<dyn StoreCursor>) -> u64 {
        self.insert(connection, handle).0
    }

    fn insert(&self, connection: Arc<Connection>, handle: Box<dyn StoreCursor>) -> (u64, Arc<CursorEntry>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(cursor_id = id, connection = connection.name(), "Cursor opened");
        let entry = Arc::new(CursorEntry {
            connection,
            state: Mutex::new(OpenCursor {
                handle,
                pending: VecDeque::new(),
            }),
            last_used: parking_lot::Mutex::new(Instant::now()),
        });
        self.cursors.insert(id, Arc::clone(&entry));
        (id, entry)
    }

    /// Register a cursor and fetch its first batch under the caller's lease
    pub async fn open(&self, lease: &ConnectionLease, handle: Box<dyn StoreCursor>, batch_size: u64) -> Result<Batch> {
        let (id, entry) = self.insert(Arc::clone(lease.connection()), handle);
        entry.fill(id, batch_size).await
    }

    /// Fetch up to `batch_size` documents (0 means the default size).
    ///
    /// Exhaustion returns a short batch. A connectivity fault puts the
    /// documents fetched so far back in front of the cursor and fails with a
    /// retryable error; the cursor stays open. A cursor whose connection has
    /// been closed is dropped and reported as "no connection".
    pub async fn next_batch(&self, id: u64, batch_size: u64) -> Result<Batch> {
        let entry = self
            .cursors
            .get(&id)
            .map(|e| Arc::clone(e.value()))
            .ok_or(GatewayError::CursorNotFound(id))?;

        let _lease = match entry.connection.lease().await {
            Ok(lease) => lease,
            Err(e) => {
                self.cursors.remove(&id);
                debug!(cursor_id = id, connection = entry.connection.name(), "Cursor outlived its connection");
                return Err(e);
            }
        };
        entry.fill(id, batch_size).await
    }

    /// Drop every cursor opened on `connection` and return how many were
    /// removed
    pub fn evict_connection(&self, connection: &Arc<Connection>) -> usize {
        let mut count = 0;
        self.cursors.retain(|_, entry| {
            let keep = !Arc::ptr_eq(&entry.connection, connection);
            if !keep {
                count += 1;
            }
            keep
        });
        if count > 0 {
            debug!(count, connection = connection.name(), "Evicted cursors of closed connection");
        }
        count
    }

    /// Drop cursors idle for at least `ttl` and return how many were removed
    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        let expired: Vec<u64> = self
            .cursors
            .iter()
            .filter(|e| e.value().idle_for() >= ttl)
            .map(|e| *e.key())
            .collect();

        let count = expired.len();
        for id in expired {
            self.cursors.remove(&id);
        }
        if count > 0 {
            debug!(count, "Evicted idle cursors");
        }
        count
    }

    pub fn contains(&self, id: u64) -> bool {
        self.cursors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

impl Default for CursorManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionRegistry;
    use async_trait::async_trait;
    use docgate_store::{MemoryConnector, StoreError};

    async fn connected() -> (ConnectionRegistry, Arc<Connection>) {
        let connector = MemoryConnector::new().with_server("localhost:27017");
        let registry = ConnectionRegistry::new(Arc::new(connector), Duration::from_secs(1));
        let conn = registry.connect(None, "localhost").await.unwrap();
        (registry, conn)
    }

    /// Yields `count` numbered documents, failing once at `fail_at`
    struct ScriptedCursor {
        next: i32,
        count: i32,
        fail_at: Option<(i32, StoreError)>,
    }

    #[async_trait]
    impl StoreCursor for ScriptedCursor {
        async fn next(&mut self) -> docgate_store::Result<Option<Document>> {
            if let Some((at, _)) = &self.fail_at {
                if *at == self.next {
                    let (_, err) = self.fail_at.take().unwrap();
                    return Err(err);
                }
            }
            if self.next >= self.count {
                return Ok(None);
            }
            let mut doc = Document::new();
            doc.insert("n".to_string(), Value::Int32(self.next));
            self.next += 1;
            Ok(Some(doc))
        }
    }

    fn scripted(count: i32, fail_at: Option<(i32, StoreError)>) -> Box<dyn StoreCursor> {
        Box::new(ScriptedCursor { next: 0, count, fail_at })
    }

    fn numbers(batch: &Batch) -> Vec<i32> {
        batch
            .results
            .iter()
            .map(|d| match d.get("n") {
                Some(Value::Int32(n)) => *n,
                other => panic!("unexpected {other:?}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ids_start_at_zero_and_increase() {
        let (_registry, conn) = connected().await;
        let cursors = CursorManager::new();
        assert_eq!(cursors.register(Arc::clone(&conn), scripted(0, None)), 0);
        assert_eq!(cursors.register(Arc::clone(&conn), scripted(0, None)), 1);
        assert_eq!(cursors.len(), 2);
    }

    #[tokio::test]
    async fn test_paging_and_exhaustion() {
        let (_registry, conn) = connected().await;
        let cursors = CursorManager::new();
        let id = cursors.register(Arc::clone(&conn), scripted(5, None));

        assert_eq!(numbers(&cursors.next_batch(id, 2).await.unwrap()), vec![0, 1]);
        assert_eq!(numbers(&cursors.next_batch(id, 2).await.unwrap()), vec![2, 3]);
        let last = cursors.next_batch(id, 2).await.unwrap();
        assert_eq!(numbers(&last), vec![4]);
        assert_eq!(last.id, id);
        assert!(cursors.next_batch(id, 2).await.unwrap().results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_cursor() {
        let cursors = CursorManager::new();
        let err = cursors.next_batch(42, 1).await.unwrap_err();
        assert_eq!(err.to_string(), "couldn't find the cursor with id 42");
    }

    #[tokio::test]
    async fn test_transient_fault_redelivers() {
        let (_registry, conn) = connected().await;
        let cursors = CursorManager::new();
        let fault = StoreError::Transient("connection reset".into());
        let id = cursors.register(Arc::clone(&conn), scripted(6, Some((3, fault))));

        assert_eq!(numbers(&cursors.next_batch(id, 2).await.unwrap()), vec![0, 1]);
        let err = cursors.next_batch(id, 3).await.unwrap_err();
        assert!(matches!(err, GatewayError::CursorInterrupted { id: i } if i == id));
        assert!(cursors.contains(id));

        assert_eq!(numbers(&cursors.next_batch(id, 10).await.unwrap()), vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_operation_fault_is_not_retryable() {
        let (_registry, conn) = connected().await;
        let cursors = CursorManager::new();
        let id = cursors.register(Arc::clone(&conn), scripted(3, Some((1, StoreError::operation("bad sort")))));
        let err = cursors.next_batch(id, 5).await.unwrap_err();
        assert!(matches!(err, GatewayError::Operation { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let (_registry, conn) = connected().await;
        let cursors = CursorManager::new();
        let id = cursors.register(Arc::clone(&conn), scripted(1, None));

        assert_eq!(cursors.cleanup_expired(Duration::from_secs(3600)), 0);
        assert_eq!(cursors.cleanup_expired(Duration::ZERO), 1);
        assert!(matches!(cursors.next_batch(id, 1).await, Err(GatewayError::CursorNotFound(_))));
    }

    #[tokio::test]
    async fn test_closed_connection_ends_cursor() {
        let (registry, conn) = connected().await;
        let cursors = CursorManager::new();
        let id = cursors.register(Arc::clone(&conn), scripted(10, None));
        assert_eq!(numbers(&cursors.next_batch(id, 2).await.unwrap()), vec![0, 1]);

        registry.disconnect(None).await.unwrap();
        // Reconnecting the same name does not revive cursors of the old one
        registry.connect(None, "localhost").await.unwrap();

        let err = cursors.next_batch(id, 2).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoConnection { ref name } if name == "default"));
        assert!(!cursors.contains(id));
    }

    #[tokio::test]
    async fn test_open_fetches_under_callers_lease() {
        let (registry, _conn) = connected().await;
        let cursors = CursorManager::new();

        let lease = registry.lease(None).await.unwrap();
        let first = cursors.open(&lease, scripted(3, None), 2).await.unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(numbers(&first), vec![0, 1]);
        drop(lease);

        assert_eq!(numbers(&cursors.next_batch(first.id, 2).await.unwrap()), vec![2]);
    }

    #[tokio::test]
    async fn test_evict_connection_keeps_other_connections() {
        let connector = MemoryConnector::new().with_server("localhost:27017");
        let registry = ConnectionRegistry::new(Arc::new(connector), Duration::from_secs(1));
        let a = registry.connect(Some("a"), "localhost").await.unwrap();
        let b = registry.connect(Some("b"), "localhost").await.unwrap();

        let cursors = CursorManager::new();
        let on_a = cursors.register(Arc::clone(&a), scripted(1, None));
        let on_b = cursors.register(Arc::clone(&b), scripted(1, None));

        assert_eq!(cursors.evict_connection(&a), 1);
        assert!(!cursors.contains(on_a));
        assert!(cursors.contains(on_b));
    }

    #[test]
    fn test_batch_document_shape() {
        let doc = Batch { id: 7, results: vec![] }.to_document();
        let keys: Vec<_> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["results", "id", "ok"]);
    }
}
