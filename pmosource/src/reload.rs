//! Politique de rechargement d'une playlist
//!
//! - `Never` : uniquement sur commande explicite ;
//! - `Rounds(n)` : après `n` tours complets de la playlist ;
//! - `Seconds(t)` : toutes les `t` secondes, indépendamment de la lecture ;
//! - `Watch` : sur modification du fichier ou du répertoire de la playlist.

use crate::SourceError;
use pmoplaylist::{Filesystem, WatchCallback, WatchHandle};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Mode de rechargement actif d'un ordonnanceur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadMode {
    #[default]
    Never,
    Rounds(u32),
    Seconds(Duration),
    Watch,
}

/// Nom du mode, tel qu'il apparaît dans la configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadKind {
    Never,
    Rounds,
    #[default]
    Seconds,
    Watch,
}

impl FromStr for ReloadKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(ReloadKind::Never),
            "rounds" => Ok(ReloadKind::Rounds),
            "seconds" => Ok(ReloadKind::Seconds),
            "watch" => Ok(ReloadKind::Watch),
            _ => Err(SourceError::InvalidOption {
                option: "reload_mode",
                value: s.to_string(),
            }),
        }
    }
}

impl ReloadMode {
    /// Construit le mode depuis `reload_mode` et `reload`
    ///
    /// Un `reload_mode` invalide retombe sur `seconds`. Une valeur `reload`
    /// nulle désactive les modes `rounds` et `seconds`.
    pub fn from_config(mode: &str, reload: u64) -> Self {
        let kind = mode.parse::<ReloadKind>().unwrap_or_else(|e| {
            tracing::error!("{}, falling back to seconds", e);
            ReloadKind::default()
        });

        match kind {
            ReloadKind::Never => ReloadMode::Never,
            ReloadKind::Watch => ReloadMode::Watch,
            _ if reload == 0 => ReloadMode::Never,
            ReloadKind::Rounds => ReloadMode::Rounds(u32::try_from(reload).unwrap_or(u32::MAX)),
            ReloadKind::Seconds => ReloadMode::Seconds(Duration::from_secs(reload)),
        }
    }
}

impl fmt::Display for ReloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReloadMode::Never => f.write_str("never"),
            ReloadMode::Rounds(n) => write!(f, "every {} rounds", n),
            ReloadMode::Seconds(t) => write!(f, "every {}s", t.as_secs()),
            ReloadMode::Watch => f.write_str("on change"),
        }
    }
}

/// Lance une tâche qui appelle `tick` toutes les `period`
///
/// Le premier appel a lieu une période après le démarrage. La tâche s'arrête
/// sur annulation ou quand `tick` retourne `None`.
pub(crate) fn spawn_every<F, Fut>(
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Option<Fut> + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => match tick() {
                    Some(fut) => fut.await,
                    None => break,
                },
            }
        }
    })
}

/// Enregistre une surveillance ; une erreur est journalisée, pas propagée
pub(crate) fn watch_playlist(
    fs: &dyn Filesystem,
    uri: &str,
    on_change: WatchCallback,
) -> Option<WatchHandle> {
    match fs.watch(uri, on_change) {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::error!(uri = %uri, "Failed to watch playlist: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_mode_from_config() {
        assert_eq!(ReloadMode::from_config("rounds", 3), ReloadMode::Rounds(3));
        assert_eq!(
            ReloadMode::from_config("seconds", 60),
            ReloadMode::Seconds(Duration::from_secs(60))
        );
        assert_eq!(ReloadMode::from_config("watch", 0), ReloadMode::Watch);
        assert_eq!(ReloadMode::from_config("never", 10), ReloadMode::Never);
        assert_eq!(ReloadMode::from_config("rounds", 0), ReloadMode::Never);
    }

    #[test]
    fn test_invalid_reload_mode_falls_back_to_seconds() {
        assert_eq!(
            ReloadMode::from_config("hourly", 30),
            ReloadMode::Seconds(Duration::from_secs(30))
        );
        assert_eq!(ReloadMode::from_config("hourly", 0), ReloadMode::Never);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_every_ticks_until_cancelled() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let count = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let c = count.clone();
        let task = spawn_every(Duration::from_secs(10), cancel.clone(), move || {
            c.fetch_add(1, Ordering::SeqCst);
            Some(async {})
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
