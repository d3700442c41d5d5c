//! Dynamic source: a pull-based driver that keeps resolved items ahead of playback.
//!
//! A [`DynamicSource`] wraps an [`ItemProducer`] (a playlist scheduler or a
//! push queue). A background task keeps enough resolved items queued to cover
//! the configured look-ahead, and the playback side pulls them one at a time
//! with [`DynamicSource::next_track`].

use crate::settings::{Callback, PrefetchSettings};
use crate::ItemProducer;
use parking_lot::Mutex;
use pmoplaylist::{ItemHandle, ItemResolver, Metadata};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A resolved item handed to playback.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub uri: String,
    pub path: PathBuf,
    pub metadata: Metadata,
    pub duration: Duration,
}

struct Current {
    handle: ItemHandle,
    duration: Duration,
    started: Instant,
}

#[derive(Default)]
struct SourceState {
    ready: VecDeque<ItemHandle>,
    current: Option<Current>,
}

struct SourceInner<P> {
    producer: P,
    resolver: Arc<dyn ItemResolver>,
    settings: PrefetchSettings,
    state: Mutex<SourceState>,
    fill_lock: tokio::sync::Mutex<()>,
    wake: Arc<Notify>,
    skipped: Notify,
    cancel: CancellationToken,
    shutdown_hooks: Mutex<Vec<Callback>>,
    prefetcher: Mutex<Option<JoinHandle<()>>>,
}

/// Pull-based source with bounded look-ahead.
///
/// Cloning is cheap; all clones drive the same source.
pub struct DynamicSource<P: ItemProducer> {
    inner: Arc<SourceInner<P>>,
}

impl<P: ItemProducer> Clone for DynamicSource<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Estimated duration of a handle: its `duration` metadata, else the default.
pub fn estimated_duration(handle: &ItemHandle, default: Duration) -> Duration {
    handle
        .metadata()
        .get("duration")
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .and_then(|d| Duration::try_from_secs_f64(d).ok())
        .unwrap_or(default)
}

impl<P: ItemProducer> DynamicSource<P> {
    /// Creates the source without starting the prefetcher.
    pub fn new(producer: P, settings: PrefetchSettings) -> Self {
        let resolver = producer.resolver();
        Self {
            inner: Arc::new(SourceInner {
                producer,
                resolver,
                settings,
                state: Mutex::new(SourceState::default()),
                fill_lock: tokio::sync::Mutex::new(()),
                wake: Arc::new(Notify::new()),
                skipped: Notify::new(),
                cancel: CancellationToken::new(),
                shutdown_hooks: Mutex::new(Vec::new()),
                prefetcher: Mutex::new(None),
            }),
        }
    }

    /// Creates the source and starts its prefetcher.
    pub fn spawn(producer: P, settings: PrefetchSettings) -> Self {
        let source = Self::new(producer, settings);
        source.start();
        source
    }

    pub fn id(&self) -> &str {
        self.inner.producer.id()
    }

    pub fn producer(&self) -> &P {
        &self.inner.producer
    }

    pub fn settings(&self) -> &PrefetchSettings {
        &self.inner.settings
    }

    /// Starts the background prefetch task.
    ///
    /// The task fills the queue, then waits for a wake-up, a delivery or
    /// `retry_delay`, whichever comes first. Calling `start` twice is a no-op.
    pub fn start(&self) {
        let mut prefetcher = self.inner.prefetcher.lock();
        if prefetcher.is_some() || self.inner.cancel.is_cancelled() {
            return;
        }

        let weak: Weak<SourceInner<P>> = Arc::downgrade(&self.inner);
        let wake = self.inner.wake.clone();
        let cancel = self.inner.cancel.clone();
        let retry_delay = self.inner.settings.retry_delay;

        *prefetcher = Some(tokio::spawn(async move {
            loop {
                match weak.upgrade() {
                    Some(inner) => {
                        DynamicSource { inner }.fill().await;
                    }
                    None => break,
                }

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = wake.notified() => {}
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
            debug!("Prefetcher stopped");
        }));
    }

    /// Wakes the prefetcher up, e.g. after a push.
    pub fn wake(&self) {
        self.inner.wake.notify_one();
    }

    /// Total time covered by the prefetched items, plus the remaining time
    /// of the current item unless `conservative` is set.
    pub fn queued_length(&self) -> Duration {
        let state = self.inner.state.lock();
        self.queued_length_of(&state)
    }

    fn queued_length_of(&self, state: &SourceState) -> Duration {
        let default = self.inner.settings.default_duration;
        let ready: Duration = state
            .ready
            .iter()
            .map(|handle| estimated_duration(handle, default))
            .sum();

        match &state.current {
            Some(current) if !self.inner.settings.conservative => {
                ready + current.duration.saturating_sub(current.started.elapsed())
            }
            _ => ready,
        }
    }

    fn needs_more(&self) -> bool {
        let state = self.inner.state.lock();
        state.ready.is_empty() || self.queued_length_of(&state) < self.inner.settings.length
    }

    /// Pulls and resolves items until the look-ahead is covered.
    ///
    /// Stops early when the producer is unavailable or a resolution fails.
    /// Returns the number of items added.
    pub async fn fill(&self) -> usize {
        let _guard = self.inner.fill_lock.lock().await;
        let mut added = 0;

        while !self.inner.cancel.is_cancelled() && self.needs_more() {
            if !self.inner.producer.is_available() {
                break;
            }

            let Some(mut handle) = self.inner.producer.next_item().await else {
                break;
            };

            if let Err(e) = self
                .inner
                .resolver
                .resolve(&mut handle, self.inner.settings.timeout)
                .await
            {
                warn!(source = %self.id(), uri = %handle.uri(), "Failed to prepare item: {}", e);
                self.inner.resolver.destroy(handle);
                break;
            }

            let mut state = self.inner.state.lock();
            if self.inner.cancel.is_cancelled() {
                drop(state);
                self.inner.resolver.destroy(handle);
                break;
            }
            debug!(source = %self.id(), id = handle.id(), "Item prefetched");
            state.ready.push_back(handle);
            added += 1;
        }

        added
    }

    /// True when an item can be delivered now or the producer can provide one.
    pub fn is_ready(&self) -> bool {
        if self.inner.cancel.is_cancelled() {
            return false;
        }
        !self.inner.state.lock().ready.is_empty() || self.inner.producer.is_available()
    }

    /// Finishes the current item and hands the next one to playback.
    ///
    /// Fills synchronously when nothing has been prefetched yet. Returns
    /// `None` when no item is available.
    pub async fn next_track(&self) -> Option<Track> {
        self.finish_current();

        let handle = match self.pop_ready() {
            Some(handle) => handle,
            None => {
                self.fill().await;
                self.pop_ready()?
            }
        };

        let track = self.deliver(handle);
        self.wake();
        track
    }

    fn pop_ready(&self) -> Option<ItemHandle> {
        self.inner.state.lock().ready.pop_front()
    }

    fn deliver(&self, mut handle: ItemHandle) -> Option<Track> {
        let Some(path) = handle.local_path().map(|p| p.to_path_buf()) else {
            warn!(source = %self.id(), uri = %handle.uri(), "Dropping unresolved item");
            self.inner.resolver.destroy(handle);
            return None;
        };

        handle.mark_delivered();
        let duration = estimated_duration(&handle, self.inner.settings.default_duration);
        let track = Track {
            id: handle.id(),
            uri: handle.target().to_string(),
            path,
            metadata: handle.metadata().clone(),
            duration,
        };

        let mut state = self.inner.state.lock();
        if self.inner.cancel.is_cancelled() {
            drop(state);
            self.inner.resolver.destroy(handle);
            return None;
        }
        state.current = Some(Current {
            handle,
            duration,
            started: Instant::now(),
        });
        Some(track)
    }

    fn finish_current(&self) -> bool {
        let current = self.inner.state.lock().current.take();
        match current {
            Some(current) => {
                self.inner.resolver.destroy(current.handle);
                true
            }
            None => false,
        }
    }

    /// Id of the item being played, if any.
    pub fn current_id(&self) -> Option<u64> {
        self.inner.state.lock().current.as_ref().map(|c| c.handle.id())
    }

    /// Abandons the current item and tells playback to pull again.
    pub fn skip(&self) {
        if self.finish_current() {
            info!(source = %self.id(), "Skipping current item");
            self.inner.skipped.notify_one();
        }
    }

    /// Completes when [`skip`](Self::skip) is called.
    pub async fn skipped(&self) {
        self.inner.skipped.notified().await;
    }

    /// Ids of the prefetched items, in delivery order.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.inner
            .state
            .lock()
            .ready
            .iter()
            .map(ItemHandle::id)
            .collect()
    }

    /// Registers a hook run once by [`shutdown`](Self::shutdown).
    pub fn on_shutdown(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.inner.shutdown_hooks.lock().push(Arc::new(hook));
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Stops the prefetcher and the producer, then releases every held item.
    pub fn shutdown(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.producer.shutdown();

        let (ready, current) = {
            let mut state = self.inner.state.lock();
            (std::mem::take(&mut state.ready), state.current.take())
        };
        for handle in ready {
            self.inner.resolver.destroy(handle);
        }
        if let Some(current) = current {
            self.inner.resolver.destroy(current.handle);
        }

        let hooks = std::mem::take(&mut *self.inner.shutdown_hooks.lock());
        for hook in hooks {
            hook();
        }
        info!(source = %self.id(), "Source shut down");
    }
}
