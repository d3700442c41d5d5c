//! Push queue: a producer fed by explicit `push` requests instead of a playlist.

use crate::{ItemProducer, Result, SourceError};
use async_trait::async_trait;
use parking_lot::Mutex;
use pmoplaylist::{ItemHandle, ItemResolver, LocalResolver};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::info;

/// Items waiting for the source, and whether pushes are still accepted.
/// Both live under the same lock so a push cannot land after shutdown drained it.
#[derive(Default)]
struct Backlog {
    items: VecDeque<ItemHandle>,
    closed: bool,
}

struct PushQueueInner {
    id: String,
    resolver: Arc<dyn ItemResolver>,
    backlog: Mutex<Backlog>,
}

/// FIFO of pushed items.
///
/// Handles are created at push time so that each push gets its id
/// immediately. Availability is exactly "backlog non-empty".
#[derive(Clone)]
pub struct PushQueue {
    inner: Arc<PushQueueInner>,
}

impl PushQueue {
    pub fn new(id: impl Into<String>, resolver: Arc<dyn ItemResolver>) -> Self {
        Self {
            inner: Arc::new(PushQueueInner {
                id: id.into(),
                resolver,
                backlog: Mutex::new(Backlog::default()),
            }),
        }
    }

    /// Queue backed by the local resolver.
    pub fn local(id: impl Into<String>) -> Self {
        Self::new(id, Arc::new(LocalResolver::new()))
    }

    /// Appends `uri` (plain or `annotate:`) to the tail and returns the new item id.
    pub fn push(&self, uri: &str) -> Result<u64> {
        if self.inner.backlog.lock().closed {
            return Err(SourceError::ShutDown(self.inner.id.clone()));
        }

        let handle = self.inner.resolver.create(uri);
        let id = handle.id();
        {
            let mut backlog = self.inner.backlog.lock();
            if backlog.closed {
                drop(backlog);
                self.inner.resolver.destroy(handle);
                return Err(SourceError::ShutDown(self.inner.id.clone()));
            }
            backlog.items.push_back(handle);
        }
        info!(queue = %self.inner.id, id, uri = %uri, "Item pushed");
        Ok(id)
    }

    /// Ids waiting in the backlog, head first.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.inner.backlog.lock().items.iter().map(ItemHandle::id).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.backlog.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.backlog.lock().items.is_empty()
    }
}

#[async_trait]
impl ItemProducer for PushQueue {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn resolver(&self) -> Arc<dyn ItemResolver> {
        self.inner.resolver.clone()
    }

    fn is_available(&self) -> bool {
        !self.is_empty()
    }

    async fn next_item(&self) -> Option<ItemHandle> {
        let handle = self.inner.backlog.lock().items.pop_front()?;
        info!(queue = %self.inner.id, "Next song: {}", handle.uri());
        Some(handle)
    }

    fn shutdown(&self) {
        let backlog = {
            let mut backlog = self.inner.backlog.lock();
            backlog.closed = true;
            std::mem::take(&mut backlog.items)
        };
        for handle in backlog {
            self.inner.resolver.destroy(handle);
        }
        info!(queue = %self.inner.id, "Queue shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Resolver that shuts the queue down while a handle is being created
    #[derive(Default)]
    struct ClosingResolver {
        queue: OnceLock<PushQueue>,
        outstanding: AtomicUsize,
    }

    #[async_trait]
    impl ItemResolver for ClosingResolver {
        fn create(&self, uri: &str) -> ItemHandle {
            if let Some(queue) = self.queue.get() {
                queue.shutdown();
            }
            self.outstanding.fetch_add(1, Ordering::SeqCst);
            ItemHandle::new(0, uri)
        }

        async fn resolve(&self, _handle: &mut ItemHandle, _timeout: Duration) -> pmoplaylist::Result<()> {
            Ok(())
        }

        fn destroy(&self, handle: ItemHandle) {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            handle.release();
        }
    }

    #[tokio::test]
    async fn test_push_is_fifo() {
        let queue = PushQueue::local("requests");
        let x = queue.push("/music/x.flac").unwrap();
        let y = queue.push("/music/y.flac").unwrap();
        assert_eq!(queue.pending_ids(), vec![x, y]);

        let first = queue.next_item().await.unwrap();
        let second = queue.next_item().await.unwrap();
        assert_eq!(first.uri(), "/music/x.flac");
        assert_eq!(second.uri(), "/music/y.flac");
        assert!(!queue.is_available());
        assert!(queue.next_item().await.is_none());

        queue.resolver().destroy(first);
        queue.resolver().destroy(second);
    }

    #[test]
    fn test_availability_follows_backlog() {
        let queue = PushQueue::local("requests");
        assert!(!queue.is_available());
        queue.push("/a.flac").unwrap();
        assert!(queue.is_available());
    }

    #[test]
    fn test_push_after_shutdown_fails() {
        let queue = PushQueue::local("requests");
        queue.push("/a.flac").unwrap();
        queue.shutdown();

        assert!(queue.is_empty());
        assert!(matches!(
            queue.push("/b.flac"),
            Err(SourceError::ShutDown(_))
        ));
    }

    #[test]
    fn test_push_racing_shutdown_releases_its_handle() {
        let resolver = Arc::new(ClosingResolver::default());
        let queue = PushQueue::new("requests", resolver.clone());
        assert!(resolver.queue.set(queue.clone()).is_ok());

        assert!(matches!(
            queue.push("/a.flac"),
            Err(SourceError::ShutDown(_))
        ));
        assert!(queue.is_empty());
        assert_eq!(resolver.outstanding.load(Ordering::SeqCst), 0);
    }
}
