//! # pmoplaylist - Playlists dynamiques : chargement, sélection et résolution
//!
//! Cette crate fournit les briques d'un ordonnanceur de playlist :
//! - **ItemSpec** : descripteur immuable (URI + métadonnées, forme `annotate:`)
//! - **ItemHandle / ItemResolver** : cycle de vie create → resolve → destroy
//! - **Filesystem** : listing récursif et surveillance des changements
//! - **PlaylistParser** : analyse M3U / listes d'URI
//! - **PlaylistLoader** : URI de playlist → suite de descripteurs
//! - **ShuffleMode** : normal, random (tirage uniforme), randomize (permutation)
//! - **SelectionQueue** : file de sélection et instantané du chargement
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use pmoplaylist::{LoaderOptions, PlaylistLoader, SelectionQueue, ShuffleMode};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let loader = PlaylistLoader::local(LoaderOptions::default());
//! let items = loader.load("/music/jazz.m3u").await;
//!
//! let mut queue = SelectionQueue::new();
//! queue.replace(items, ShuffleMode::Randomize);
//!
//! while let Some(next) = queue.pick(ShuffleMode::Randomize) {
//!     println!("Next: {}", next);
//! }
//! # }
//! ```

mod error;
mod fs;
mod item;
mod loader;
mod parser;
mod queue;
mod resolver;
mod shuffle;

// Réexports publics
pub use error::{Error, Result};
pub use fs::{Filesystem, LocalFilesystem, WatchCallback, WatchHandle};
pub use item::{ItemSpec, Metadata, ANNOTATE_PREFIX};
pub use loader::{LoaderOptions, PlaylistLoader, DEFAULT_TIMEOUT};
pub use parser::{M3uParser, PlaylistParser, M3U_MIME_TYPES};
pub use queue::SelectionQueue;
pub use resolver::{local_path_of, HandleState, ItemHandle, ItemResolver, LocalResolver};
pub use shuffle::ShuffleMode;
