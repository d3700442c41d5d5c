//! Accès au système de fichiers : listing de répertoires et surveillance

use crate::resolver::local_path_of;
use crate::Result;
use async_trait::async_trait;
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Callback déclenché lors d'un changement sur le chemin surveillé
pub type WatchCallback = Arc<dyn Fn() + Send + Sync>;

/// Enregistrement d'une surveillance, annulée par `unwatch()` ou au drop
pub struct WatchHandle {
    unwatch: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    /// Crée un handle à partir de la fonction de désenregistrement
    pub fn new(unwatch: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unwatch: Some(Box::new(unwatch)),
        }
    }

    /// Arrête la surveillance
    pub fn unwatch(mut self) {
        if let Some(unwatch) = self.unwatch.take() {
            unwatch();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(unwatch) = self.unwatch.take() {
            unwatch();
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.unwatch.is_some())
            .finish()
    }
}

/// Opérations de système de fichiers utilisées par le chargeur
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn is_directory(&self, uri: &str) -> bool;

    /// Liste les fichiers (jamais les sous-répertoires), triés par chemin
    async fn list(&self, uri: &str, recursive: bool) -> Result<Vec<String>>;

    /// Surveille `uri` et appelle `callback` à chaque modification
    fn watch(&self, uri: &str, callback: WatchCallback) -> Result<WatchHandle>;
}

/// Implémentation sur le système de fichiers local
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }
}

fn list_files(root: &Path, recursive: bool) -> Vec<String> {
    let mut walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .map(|entry| entry.path().to_string_lossy().to_string())
        .collect()
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn is_directory(&self, uri: &str) -> bool {
        match tokio::fs::metadata(local_path_of(uri)).await {
            Ok(meta) => meta.is_dir(),
            Err(_) => false,
        }
    }

    async fn list(&self, uri: &str, recursive: bool) -> Result<Vec<String>> {
        let root = PathBuf::from(local_path_of(uri));
        let files = tokio::task::spawn_blocking(move || list_files(&root, recursive))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(files)
    }

    fn watch(&self, uri: &str, callback: WatchCallback) -> Result<WatchHandle> {
        let path = PathBuf::from(local_path_of(uri));
        let target = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                    tracing::debug!(path = %target.display(), "Change detected: {:?}", event.kind);
                    callback();
                }
            }
            Err(e) => tracing::warn!("Watch error on {}: {}", target.display(), e),
        })?;

        let mode = if path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&path, mode)?;
        tracing::debug!(path = %path.display(), "Watching for changes");

        Ok(WatchHandle::new(move || {
            tracing::debug!(path = %path.display(), "Watch released");
            drop(watcher);
        }))
    }
}
