//! ItemHandle et ItemResolver : cycle de vie d'un élément jouable
//!
//! Chaque handle créé doit finir d'une seule façon : livré à la lecture puis
//! détruit, ou détruit sans avoir été livré. Un handle abandonné sans appel
//! à [`ItemResolver::destroy`] est signalé dans les logs.

use crate::item::{ItemSpec, Metadata};
use crate::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// État de résolution d'un handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    Unresolved,
    Resolved(PathBuf),
    Failed,
}

/// Référence résolvable vers un élément jouable
#[derive(Debug)]
pub struct ItemHandle {
    id: u64,
    uri: String,
    spec: ItemSpec,
    state: HandleState,
    delivered: bool,
    released: bool,
}

impl ItemHandle {
    /// Crée un handle non résolu
    ///
    /// Une URI annotée invalide est conservée telle quelle, sans métadonnées.
    pub fn new(id: u64, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let spec = ItemSpec::parse(&uri).unwrap_or_else(|e| {
            tracing::warn!("Keeping {} as a plain uri: {}", uri, e);
            ItemSpec::new(uri.clone())
        });

        Self {
            id,
            uri,
            spec,
            state: HandleState::Unresolved,
            delivered: false,
            released: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// URI telle que fournie à la création (annotations comprises)
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI sans annotation
    pub fn target(&self) -> &str {
        self.spec.uri()
    }

    pub fn metadata(&self) -> &Metadata {
        self.spec.metadata()
    }

    pub fn state(&self) -> &HandleState {
        &self.state
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.state, HandleState::Resolved(_))
    }

    /// Chemin local une fois résolu
    pub fn local_path(&self) -> Option<&Path> {
        match &self.state {
            HandleState::Resolved(path) => Some(path),
            _ => None,
        }
    }

    pub fn set_state(&mut self, state: HandleState) {
        self.state = state;
    }

    /// Marque le handle comme livré à la lecture
    pub fn mark_delivered(&mut self) {
        self.delivered = true;
    }

    pub fn was_delivered(&self) -> bool {
        self.delivered
    }

    /// Libère le handle (fin de vie normale)
    pub fn release(mut self) {
        self.released = true;
    }
}

impl Drop for ItemHandle {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(id = self.id, uri = %self.uri, "Item handle dropped without release");
        }
    }
}

/// Résolveur d'éléments : crée, résout et détruit les handles
#[async_trait]
pub trait ItemResolver: Send + Sync {
    /// Crée un handle non résolu pour une URI
    fn create(&self, uri: &str) -> ItemHandle;

    /// Résout le handle en un fichier local, en au plus `timeout`
    async fn resolve(&self, handle: &mut ItemHandle, timeout: Duration) -> Result<()>;

    /// Détruit le handle
    fn destroy(&self, handle: ItemHandle) {
        handle.release();
    }
}

/// Résolveur pour les chemins locaux et les URI `file://`
#[derive(Debug, Default)]
pub struct LocalResolver {
    next_id: AtomicU64,
}

impl LocalResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Retire le schéma `file://` d'une URI locale
pub fn local_path_of(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

#[async_trait]
impl ItemResolver for LocalResolver {
    fn create(&self, uri: &str) -> ItemHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        ItemHandle::new(id, uri)
    }

    async fn resolve(&self, handle: &mut ItemHandle, timeout: Duration) -> Result<()> {
        let path = PathBuf::from(local_path_of(handle.target()));

        match tokio::time::timeout(timeout, tokio::fs::metadata(&path)).await {
            Ok(Ok(meta)) if meta.is_file() => {
                tracing::debug!(id = handle.id(), path = %path.display(), "Item resolved");
                handle.set_state(HandleState::Resolved(path));
                Ok(())
            }
            Ok(_) => {
                handle.set_state(HandleState::Failed);
                Err(Error::Unresolvable(handle.uri().to_string()))
            }
            Err(_) => {
                handle.set_state(HandleState::Failed);
                Err(Error::Timeout {
                    uri: handle.uri().to_string(),
                    timeout,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.flac");
        std::fs::write(&file, b"x").unwrap();

        let resolver = LocalResolver::new();
        let mut handle = resolver.create(&format!("file://{}", file.display()));
        resolver
            .resolve(&mut handle, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(handle.local_path(), Some(file.as_path()));
        resolver.destroy(handle);
    }

    #[tokio::test]
    async fn test_resolve_missing_file_fails() {
        let resolver = LocalResolver::new();
        let mut handle = resolver.create("/does/not/exist.flac");

        let err = resolver
            .resolve(&mut handle, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unresolvable(_)));
        assert_eq!(handle.state(), &HandleState::Failed);
        resolver.destroy(handle);
    }

    #[tokio::test]
    async fn test_annotated_handle_keeps_metadata() {
        let resolver = LocalResolver::new();
        let first = resolver.create(r#"annotate:title="T":/x.flac"#);
        let second = resolver.create("/y.flac");

        assert_eq!(first.target(), "/x.flac");
        assert_eq!(first.metadata().get("title").map(String::as_str), Some("T"));
        assert_ne!(first.id(), second.id());

        resolver.destroy(first);
        resolver.destroy(second);
    }
}
