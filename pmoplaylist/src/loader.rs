//! PlaylistLoader : transforme une URI de playlist en suite de descripteurs
//!
//! - un répertoire est listé récursivement, chaque fichier devient un descripteur ;
//! - tout autre URI est résolue comme document de playlist (avec timeout),
//!   puis analysée en paires (métadonnées, chemin).
//!
//! Un échec de chargement n'est jamais fatal : [`PlaylistLoader::load`]
//! journalise l'erreur et retourne une suite vide.

use crate::fs::{Filesystem, LocalFilesystem};
use crate::item::ItemSpec;
use crate::parser::{M3uParser, PlaylistParser};
use crate::resolver::{ItemHandle, ItemResolver, LocalResolver};
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Timeout par défaut d'une résolution
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Options du chargeur
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Préfixe ajouté à chaque chemin lu dans une playlist
    pub prefix: String,
    /// Type MIME attendu (`None` = détection automatique)
    pub mime_type: Option<String>,
    /// Durée maximale de résolution du document
    pub timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            mime_type: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Chargeur de playlists
#[derive(Clone)]
pub struct PlaylistLoader {
    fs: Arc<dyn Filesystem>,
    resolver: Arc<dyn ItemResolver>,
    parser: Arc<dyn PlaylistParser>,
    options: LoaderOptions,
}

impl PlaylistLoader {
    pub fn new(
        fs: Arc<dyn Filesystem>,
        resolver: Arc<dyn ItemResolver>,
        parser: Arc<dyn PlaylistParser>,
        options: LoaderOptions,
    ) -> Self {
        Self {
            fs,
            resolver,
            parser,
            options,
        }
    }

    /// Chargeur sur le système de fichiers local avec l'analyseur M3U
    pub fn local(options: LoaderOptions) -> Self {
        Self::new(
            Arc::new(LocalFilesystem::new()),
            Arc::new(LocalResolver::new()),
            Arc::new(M3uParser::new()),
            options,
        )
    }

    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    pub fn resolver(&self) -> &Arc<dyn ItemResolver> {
        &self.resolver
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Charge la playlist ; retourne une suite vide en cas d'échec
    pub async fn load(&self, uri: &str) -> Vec<ItemSpec> {
        match self.try_load(uri).await {
            Ok(items) => {
                tracing::info!(uri = %uri, count = items.len(), "Playlist loaded");
                items
            }
            Err(e) => {
                tracing::error!(uri = %uri, "Failed to load playlist: {}", e);
                Vec::new()
            }
        }
    }

    /// Charge la playlist en propageant les erreurs
    pub async fn try_load(&self, uri: &str) -> Result<Vec<ItemSpec>> {
        if self.fs.is_directory(uri).await {
            let files = self.fs.list(uri, true).await?;
            return Ok(files.into_iter().map(ItemSpec::new).collect());
        }

        let mut handle = self.resolver.create(uri);
        let result = self.read_document(&mut handle).await;
        // Le handle du document est libéré dans tous les cas
        self.resolver.destroy(handle);
        result
    }

    async fn read_document(&self, handle: &mut ItemHandle) -> Result<Vec<ItemSpec>> {
        self.resolver.resolve(handle, self.options.timeout).await?;

        let path = handle
            .local_path()
            .ok_or_else(|| Error::Unresolvable(handle.uri().to_string()))?
            .to_path_buf();
        let text = tokio::fs::read_to_string(&path).await?;

        let entries = self
            .parser
            .parse(self.options.mime_type.as_deref(), &text)?;

        let base = path.parent();
        Ok(entries
            .into_iter()
            .map(|(metadata, entry)| self.to_spec(metadata, &entry, base))
            .collect())
    }

    fn to_spec(&self, mut metadata: crate::Metadata, entry: &str, base: Option<&Path>) -> ItemSpec {
        let full = format!("{}{}", self.options.prefix, entry);
        let inner = ItemSpec::parse(&full).unwrap_or_else(|_| ItemSpec::new(full.clone()));

        // Les annotations présentes dans la ligne l'emportent
        metadata.extend(inner.metadata().clone());

        let uri = match base {
            Some(base) if !has_scheme(inner.uri()) && !Path::new(inner.uri()).is_absolute() => {
                base.join(inner.uri()).to_string_lossy().to_string()
            }
            _ => inner.uri().to_string(),
        };

        ItemSpec::with_metadata(uri, metadata)
    }
}

/// Vrai si l'URI commence par un schéma (`http:`, `file:`...)
fn has_scheme(uri: &str) -> bool {
    match uri.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// Résolveur dont la résolution dépasse toujours le timeout
    #[derive(Default)]
    struct StalledResolver {
        next_id: AtomicU64,
        destroyed: AtomicUsize,
    }

    #[async_trait]
    impl ItemResolver for StalledResolver {
        fn create(&self, uri: &str) -> ItemHandle {
            ItemHandle::new(self.next_id.fetch_add(1, Ordering::SeqCst), uri)
        }

        async fn resolve(&self, handle: &mut ItemHandle, timeout: Duration) -> Result<()> {
            let stalled = tokio::time::sleep(timeout * 10);
            if tokio::time::timeout(timeout, stalled).await.is_err() {
                return Err(Error::Timeout {
                    uri: handle.uri().to_string(),
                    timeout,
                });
            }
            Ok(())
        }

        fn destroy(&self, handle: ItemHandle) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
            handle.release();
        }
    }

    #[tokio::test]
    async fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("cd1")).unwrap();
        std::fs::write(dir.path().join("a.flac"), b"").unwrap();
        std::fs::write(dir.path().join("cd1").join("b.flac"), b"").unwrap();

        let loader = PlaylistLoader::local(LoaderOptions::default());
        let items = loader.load(&dir.path().to_string_lossy()).await;

        assert_eq!(items.len(), 2);
        assert!(items[0].uri().ends_with("a.flac"));
        assert!(items[1].uri().ends_with("b.flac"));
        assert!(items.iter().all(|i| i.metadata().is_empty()));
    }

    #[tokio::test]
    async fn test_load_m3u_with_prefix_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = dir.path().join("list.m3u");
        std::fs::write(
            &playlist,
            "#EXTM3U\n#EXTINF:200,First\none.flac\ntwo.flac\n",
        )
        .unwrap();

        let loader = PlaylistLoader::local(LoaderOptions {
            prefix: "music/".into(),
            ..Default::default()
        });
        let items = loader.load(&playlist.to_string_lossy()).await;

        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].uri(),
            dir.path().join("music/one.flac").to_string_lossy()
        );
        assert_eq!(items[0].get("title"), Some("First"));
        assert!(items[0].to_uri().starts_with("annotate:"));
        assert!(items[1].metadata().is_empty());
    }

    #[tokio::test]
    async fn test_urls_and_absolute_paths_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let playlist = dir.path().join("list.txt");
        std::fs::write(&playlist, "http://radio/live\n/abs/two.flac\n").unwrap();

        let loader = PlaylistLoader::local(LoaderOptions {
            mime_type: Some("text/plain".into()),
            ..Default::default()
        });
        let uris: Vec<String> = loader
            .load(&playlist.to_string_lossy())
            .await
            .into_iter()
            .map(|i| i.uri().to_string())
            .collect();

        assert_eq!(uris, vec!["http://radio/live", "/abs/two.flac"]);
    }

    #[tokio::test]
    async fn test_missing_playlist_yields_empty() {
        let loader = PlaylistLoader::local(LoaderOptions::default());
        assert!(loader.load("/no/such/playlist.m3u").await.is_empty());
        assert!(loader.try_load("/no/such/playlist.m3u").await.is_err());
    }

    #[test]
    fn test_has_scheme() {
        assert!(has_scheme("http://x"));
        assert!(has_scheme("annotate:a=\"b\":c"));
        assert!(!has_scheme("C:\\music\\a.flac"));
        assert!(!has_scheme("relative/a.flac"));
    }

    #[tokio::test]
    async fn test_document_timeout_yields_empty() {
        let resolver = Arc::new(StalledResolver::default());
        let loader = PlaylistLoader::new(
            Arc::new(LocalFilesystem::new()),
            resolver.clone(),
            Arc::new(M3uParser::new()),
            LoaderOptions {
                timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );

        assert!(matches!(
            loader.try_load("http://slow/list.m3u").await,
            Err(Error::Timeout { .. })
        ));
        assert!(loader.load("http://slow/list.m3u").await.is_empty());
        assert_eq!(resolver.destroyed.load(Ordering::SeqCst), 2);
    }
}
