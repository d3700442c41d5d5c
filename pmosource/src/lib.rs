//! # PMOSource
//!
//! Pull-based item sources for the scheduler.
//!
//! This crate turns the building blocks of `pmoplaylist` into sources that a
//! playback loop can pull from:
//!
//! - **PlaylistScheduler**: selects items from a loaded playlist, filters them
//!   through `check_next`, notifies exhaustion, and reloads the playlist
//!   (never, every N rounds, every T seconds, or on filesystem change).
//! - **PushQueue**: a FIFO fed by explicit `push` requests.
//! - **DynamicSource**: wraps either producer, keeps enough resolved items
//!   ahead of playback, and supports skipping the current item.
//! - **SchedulerConfigExt**: reads instance declarations from `pmoconfig`
//!   (feature `pmoconfig`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pmosource::{Hooks, PlaylistOptions, playlist_source};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let options = PlaylistOptions::new("jazz", "/music/jazz.m3u");
//! let source = playlist_source(&options, Hooks::new().on_done(|| println!("done"))).await;
//!
//! while let Some(track) = source.next_track().await {
//!     println!("Playing {}", track.uri);
//! }
//! source.shutdown();
//! # }
//! ```

mod queue;
mod reload;
mod scheduler;
mod settings;
mod source;

#[cfg(feature = "pmoconfig")]
pub mod config_ext;

use async_trait::async_trait;
use pmoplaylist::{ItemHandle, ItemResolver};
use std::sync::Arc;

pub use queue::PushQueue;
pub use reload::{ReloadKind, ReloadMode};
pub use scheduler::PlaylistScheduler;
pub use settings::{Callback, CheckNext, Hooks, PlaylistOptions, PrefetchSettings, QueueOptions};
pub use source::{DynamicSource, Track, estimated_duration};

#[cfg(feature = "pmoconfig")]
pub use config_ext::SchedulerConfigExt;

/// Error types for source operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source {0} is shut down")]
    ShutDown(String),

    #[error("Invalid value '{value}' for option {option}")]
    InvalidOption { option: &'static str, value: String },

    #[error(transparent)]
    Playlist(#[from] pmoplaylist::Error),
}

/// Result type for source operations
pub type Result<T> = std::result::Result<T, SourceError>;

/// Producer of item handles pulled by a [`DynamicSource`].
///
/// Every handle returned by [`next_item`](ItemProducer::next_item) becomes
/// the responsibility of the caller, which must eventually hand it back to
/// [`resolver`](ItemProducer::resolver) through `destroy`.
#[async_trait]
pub trait ItemProducer: Send + Sync + 'static {
    /// Instance id
    fn id(&self) -> &str;

    /// Resolver that created the handles
    fn resolver(&self) -> Arc<dyn ItemResolver>;

    /// Whether a pull may produce an item
    fn is_available(&self) -> bool;

    /// Next unresolved handle, or `None` when nothing is available
    async fn next_item(&self) -> Option<ItemHandle>;

    /// Releases timers, watches and held handles
    fn shutdown(&self);
}

/// Source driven by a playlist scheduler
pub type PlaylistSource = DynamicSource<PlaylistScheduler>;

/// Source driven by a push queue
pub type QueueSource = DynamicSource<PushQueue>;

/// Builds a playlist source on the local filesystem and starts prefetching
pub async fn playlist_source(options: &PlaylistOptions, hooks: Hooks) -> PlaylistSource {
    let scheduler = PlaylistScheduler::local(options, hooks).await;
    DynamicSource::spawn(scheduler, options.prefetch())
}

/// Builds a push-queue source with the local resolver and starts prefetching
pub fn queue_source(options: &QueueOptions) -> QueueSource {
    DynamicSource::spawn(PushQueue::local(options.id.clone()), options.prefetch())
}

impl DynamicSource<PushQueue> {
    /// Pushes `uri` to the backlog and wakes the prefetcher up
    pub fn push(&self, uri: &str) -> Result<u64> {
        let id = self.producer().push(uri)?;
        self.wake();
        Ok(id)
    }

    /// Prefetched ids followed by backlog ids
    pub fn queue_ids(&self) -> Vec<u64> {
        let mut ids = self.pending_ids();
        ids.extend(self.producer().pending_ids());
        ids
    }
}

impl DynamicSource<PlaylistScheduler> {
    /// Forces a reload of the playlist
    pub async fn reload(&self) -> bool {
        self.producer().reload().await
    }

    pub fn uri(&self) -> String {
        self.producer().uri()
    }

    pub async fn set_uri(&self, uri: impl Into<String>) {
        self.producer().set_uri(uri).await
    }
}
