//! Test doubles shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pmoplaylist::{
    Filesystem, HandleState, ItemHandle, ItemResolver, M3uParser, PlaylistLoader, WatchCallback,
    WatchHandle,
};
use pmosource::{Hooks, PlaylistOptions, PlaylistScheduler};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// A destroyed handle, as seen by the resolver
#[derive(Debug, Clone, PartialEq)]
pub struct Released {
    pub id: u64,
    pub uri: String,
    pub delivered: bool,
}

/// Resolver that records every handle it creates and destroys.
///
/// Resolution always succeeds, except for targets containing `broken`.
#[derive(Default)]
pub struct RecordingResolver {
    next_id: AtomicU64,
    created: Mutex<Vec<(u64, String)>>,
    released: Mutex<Vec<Released>>,
}

impl RecordingResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().iter().map(|(_, uri)| uri.clone()).collect()
    }

    pub fn released(&self) -> Vec<Released> {
        self.released.lock().clone()
    }

    /// Handles created but not yet destroyed
    pub fn outstanding(&self) -> usize {
        self.created.lock().len() - self.released.lock().len()
    }
}

#[async_trait]
impl ItemResolver for RecordingResolver {
    fn create(&self, uri: &str) -> ItemHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.created.lock().push((id, uri.to_string()));
        ItemHandle::new(id, uri)
    }

    async fn resolve(&self, handle: &mut ItemHandle, _timeout: Duration) -> pmoplaylist::Result<()> {
        if handle.target().contains("broken") {
            handle.set_state(HandleState::Failed);
            return Err(pmoplaylist::Error::Unresolvable(handle.uri().to_string()));
        }
        let path = PathBuf::from(handle.target());
        handle.set_state(HandleState::Resolved(path));
        Ok(())
    }

    fn destroy(&self, handle: ItemHandle) {
        self.released.lock().push(Released {
            id: handle.id(),
            uri: handle.uri().to_string(),
            delivered: handle.was_delivered(),
        });
        handle.release();
    }
}

/// In-memory filesystem: every registered uri is a directory with a fixed listing.
#[derive(Default)]
pub struct FakeFilesystem {
    listings: Mutex<HashMap<String, Vec<String>>>,
    watchers: Arc<Mutex<HashMap<u64, WatchCallback>>>,
    next_watch: AtomicU64,
    lists: AtomicUsize,
    delay: Mutex<Duration>,
}

impl FakeFilesystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_listing(&self, uri: &str, files: &[&str]) {
        self.listings.lock().insert(
            uri.to_string(),
            files.iter().map(|f| f.to_string()).collect(),
        );
    }

    /// Makes every following listing take `delay`
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Number of listings served (one per load)
    pub fn list_count(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn active_watches(&self) -> usize {
        self.watchers.lock().len()
    }

    /// Simulates a change on every watched path
    pub fn trigger(&self) {
        let callbacks: Vec<WatchCallback> = self.watchers.lock().values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }
}

#[async_trait]
impl Filesystem for FakeFilesystem {
    async fn is_directory(&self, uri: &str) -> bool {
        self.listings.lock().contains_key(uri)
    }

    async fn list(&self, uri: &str, _recursive: bool) -> pmoplaylist::Result<Vec<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.listings.lock().get(uri).cloned().unwrap_or_default())
    }

    fn watch(&self, _uri: &str, callback: WatchCallback) -> pmoplaylist::Result<WatchHandle> {
        let id = self.next_watch.fetch_add(1, Ordering::SeqCst);
        self.watchers.lock().insert(id, callback);
        let watchers = self.watchers.clone();
        Ok(WatchHandle::new(move || {
            watchers.lock().remove(&id);
        }))
    }
}

/// Scheduler over the fake filesystem and the recording resolver
pub async fn scheduler(
    fs: &Arc<FakeFilesystem>,
    resolver: &Arc<RecordingResolver>,
    options: &PlaylistOptions,
    hooks: Hooks,
) -> PlaylistScheduler {
    let loader = PlaylistLoader::new(
        fs.clone(),
        resolver.clone(),
        Arc::new(M3uParser::new()),
        options.loader_options(),
    );
    PlaylistScheduler::create(options, hooks, loader).await
}

/// Playlist options with sequential order and no automatic reload
pub fn sequential(uri: &str) -> PlaylistOptions {
    PlaylistOptions {
        mode: "normal".into(),
        reload_mode: "never".into(),
        ..PlaylistOptions::new("test", uri)
    }
}

/// Counter usable from a hook
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Polls `cond` until it holds, for at most a few seconds
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
