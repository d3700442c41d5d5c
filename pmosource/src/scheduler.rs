//! PlaylistScheduler : ordonnanceur d'une playlist chargée depuis une URI
//!
//! Tout l'état mutable (file, instantané, drapeau `stopped`, compteur de tours,
//! URI courante) est protégé par un unique mutex. Le chargement lui-même
//! s'exécute hors du verrou ; seul l'échange de la file est atomique vis-à-vis
//! des sélections concurrentes.

use crate::reload::{spawn_every, watch_playlist, ReloadMode};
use crate::settings::{Hooks, PlaylistOptions};
use crate::ItemProducer;
use async_trait::async_trait;
use parking_lot::Mutex;
use pmoplaylist::{
    ItemHandle, ItemResolver, ItemSpec, PlaylistLoader, SelectionQueue, ShuffleMode, WatchCallback,
    WatchHandle,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct SchedulerState {
    uri: String,
    queue: SelectionQueue,
    stopped: bool,
    round: u32,
}

impl SchedulerState {
    /// Compte un tour ; vrai quand le n-ième est atteint (compteur remis à 0)
    fn complete_round(&mut self, rounds: u32) -> bool {
        self.round += 1;
        if self.round >= rounds {
            self.round = 0;
            true
        } else {
            false
        }
    }
}

struct SchedulerInner {
    id: String,
    mode: ShuffleMode,
    looping: bool,
    reload_mode: ReloadMode,
    hooks: Hooks,
    loader: PlaylistLoader,
    state: Mutex<SchedulerState>,
    loading: AtomicBool,
    reload_pending: AtomicBool,
    cancel: CancellationToken,
    watch: Mutex<Option<WatchHandle>>,
}

/// Résultat d'une étape de sélection, calculé sous le verrou
enum Step {
    Picked(ItemSpec),
    RoundReload,
    Exhausted { reload: bool },
    Unavailable,
}

/// Ordonnanceur de playlist
///
/// Clonable : toutes les copies partagent le même état.
#[derive(Clone)]
pub struct PlaylistScheduler {
    inner: Arc<SchedulerInner>,
}

impl PlaylistScheduler {
    /// Crée l'ordonnanceur, charge la playlist et démarre la politique de rechargement
    pub async fn create(options: &PlaylistOptions, hooks: Hooks, loader: PlaylistLoader) -> Self {
        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                id: options.instance_id().to_string(),
                mode: options.shuffle_mode(),
                looping: options.looping,
                reload_mode: options.reload_mode(),
                hooks,
                loader,
                state: Mutex::new(SchedulerState {
                    uri: options.uri.clone(),
                    queue: SelectionQueue::new(),
                    stopped: false,
                    round: 0,
                }),
                loading: AtomicBool::new(false),
                reload_pending: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                watch: Mutex::new(None),
            }),
        };

        info!(
            scheduler = %scheduler.id(),
            uri = %options.uri,
            mode = %scheduler.inner.mode,
            reload = %scheduler.inner.reload_mode,
            "Loading playlist"
        );
        scheduler.load_current().await;
        scheduler.start_reload_policy();
        scheduler
    }

    /// Crée l'ordonnanceur sur le système de fichiers local
    pub async fn local(options: &PlaylistOptions, hooks: Hooks) -> Self {
        let loader = PlaylistLoader::local(options.loader_options());
        Self::create(options, hooks, loader).await
    }

    fn start_reload_policy(&self) {
        match self.inner.reload_mode {
            ReloadMode::Seconds(period) => {
                let weak = Arc::downgrade(&self.inner);
                spawn_every(period, self.inner.cancel.clone(), move || {
                    Self::upgrade(&weak).map(|scheduler| async move {
                        scheduler.reload().await;
                    })
                });
            }
            ReloadMode::Watch => {
                let weak = Arc::downgrade(&self.inner);
                let runtime = tokio::runtime::Handle::current();
                let on_change: WatchCallback = Arc::new(move || {
                    if let Some(scheduler) = Self::upgrade(&weak) {
                        runtime.spawn(async move {
                            scheduler.reload().await;
                        });
                    }
                });

                // L'URI surveillée reste celle de la création, même après `set_uri`
                let uri = self.uri();
                let handle = watch_playlist(self.inner.loader.filesystem().as_ref(), &uri, on_change);
                *self.inner.watch.lock() = handle;
            }
            ReloadMode::Never | ReloadMode::Rounds(_) => {}
        }
    }

    fn upgrade(weak: &Weak<SchedulerInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn mode(&self) -> ShuffleMode {
        self.inner.mode
    }

    pub fn looping(&self) -> bool {
        self.inner.looping
    }

    pub fn reload_mode(&self) -> ReloadMode {
        self.inner.reload_mode
    }

    /// URI courante de la playlist
    pub fn uri(&self) -> String {
        self.inner.state.lock().uri.clone()
    }

    /// Change l'URI et recharge
    ///
    /// En mode `watch`, la surveillance n'est pas déplacée sur le nouveau chemin.
    pub async fn set_uri(&self, uri: impl Into<String>) {
        let uri = uri.into();
        info!(scheduler = %self.id(), uri = %uri, "Playlist uri changed");
        self.inner.state.lock().uri = uri;
        self.reload().await;
    }

    /// Compteur de tours (mode `rounds`)
    pub fn round(&self) -> u32 {
        self.inner.state.lock().round
    }

    /// Vrai après épuisement d'une playlist sans boucle
    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }

    /// Descripteurs encore en attente, dans l'ordre de la file
    pub fn pending(&self) -> Vec<ItemSpec> {
        self.inner.state.lock().queue.pending().cloned().collect()
    }

    /// Recharge la playlist depuis l'URI courante
    ///
    /// Si un chargement est déjà en cours, la demande est fusionnée : un seul
    /// chargement supplémentaire aura lieu après celui en cours, et l'appel
    /// retourne `false` immédiatement.
    pub async fn reload(&self) -> bool {
        if self.inner.cancel.is_cancelled() {
            return false;
        }

        loop {
            if self.inner.loading.swap(true, Ordering::AcqRel) {
                self.inner.reload_pending.store(true, Ordering::Release);
                debug!(scheduler = %self.id(), "Reload already in progress");
                return false;
            }

            loop {
                self.inner.reload_pending.store(false, Ordering::Release);
                info!(scheduler = %self.id(), "Reloading playlist");
                self.load_current().await;
                (self.inner.hooks.on_reload)();

                if !self.inner.reload_pending.load(Ordering::Acquire) {
                    break;
                }
            }

            self.inner.loading.store(false, Ordering::Release);

            // Une demande a pu arriver entre la dernière vérification et la libération
            if !self.inner.reload_pending.load(Ordering::Acquire) {
                return true;
            }
        }
    }

    async fn load_current(&self) {
        let uri = self.uri();
        let items = self.inner.loader.load(&uri).await;

        // Le compteur de tours n'est remis à zéro que par le rechargement qu'il déclenche
        let mut state = self.inner.state.lock();
        state.queue.replace(items, self.inner.mode);
        state.stopped = false;
    }

    fn select(&self) -> Step {
        let mut state = self.inner.state.lock();

        if state.queue.is_empty() && self.inner.looping && !state.queue.snapshot_is_empty() {
            if let ReloadMode::Rounds(rounds) = self.inner.reload_mode {
                if state.complete_round(rounds) {
                    return Step::RoundReload;
                }
            }
            state.queue.reset();
        }

        if let Some(spec) = state.queue.pick(self.inner.mode) {
            return Step::Picked(spec);
        }

        if self.inner.looping || state.stopped {
            return Step::Unavailable;
        }

        state.stopped = true;
        let reload = match self.inner.reload_mode {
            ReloadMode::Rounds(rounds) => state.complete_round(rounds),
            _ => false,
        };
        Step::Exhausted { reload }
    }

    fn item_resolver(&self) -> &Arc<dyn ItemResolver> {
        self.inner.loader.resolver()
    }
}

#[async_trait]
impl ItemProducer for PlaylistScheduler {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn resolver(&self) -> Arc<dyn ItemResolver> {
        self.item_resolver().clone()
    }

    /// Faux une fois la playlist épuisée, jusqu'au prochain chargement
    ///
    /// Une file vide sans boucle reste disponible tant que l'épuisement n'a
    /// pas été constaté par une sélection : c'est elle qui déclenche `on_done`.
    fn is_available(&self) -> bool {
        !self.inner.cancel.is_cancelled() && !self.inner.state.lock().stopped
    }

    /// Sélectionne le prochain élément accepté par `check_next`
    ///
    /// Un candidat refusé est détruit avant la sélection suivante. Il n'y a
    /// pas de limite au nombre de refus : un filtre qui refuse tout bloque
    /// l'appel.
    async fn next_item(&self) -> Option<ItemHandle> {
        loop {
            match self.select() {
                Step::Picked(spec) => {
                    let handle = self.item_resolver().create(&spec.to_uri());
                    if (self.inner.hooks.check_next)(&handle) {
                        info!(scheduler = %self.id(), "Next song: {}", handle.uri());
                        return Some(handle);
                    }
                    info!(scheduler = %self.id(), "Candidate rejected by check_next: {}", handle.uri());
                    self.item_resolver().destroy(handle);
                }
                Step::RoundReload => {
                    if !self.reload().await {
                        let mut state = self.inner.state.lock();
                        if state.queue.is_empty() {
                            state.queue.reset();
                        }
                    }
                }
                Step::Exhausted { reload } => {
                    info!(scheduler = %self.id(), "Playlist exhausted");
                    (self.inner.hooks.on_done)();
                    if reload {
                        self.reload().await;
                    }
                    return None;
                }
                Step::Unavailable => return None,
            }
        }
    }

    fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(watch) = self.inner.watch.lock().take() {
            watch.unwatch();
        }
        info!(scheduler = %self.id(), "Scheduler shut down");
    }
}
