//! Options des sources : lues depuis la configuration, puis converties en
//! types forts (modes, durées, options du chargeur)

use crate::reload::ReloadMode;
use pmoplaylist::{ItemHandle, LoaderOptions, ShuffleMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Filtre de candidats : `true` accepte l'élément proposé
pub type CheckNext = Arc<dyn Fn(&ItemHandle) -> bool + Send + Sync>;

/// Callback sans argument (`on_done`, `on_reload`)
pub type Callback = Arc<dyn Fn() + Send + Sync>;

const DEFAULT_DURATION_SECS: f64 = 30.0;
const DEFAULT_LENGTH_SECS: f64 = 10.0;
const DEFAULT_TIMEOUT_SECS: f64 = 20.0;
const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

/// Convertit des secondes de configuration en `Duration`
fn seconds(option: &'static str, value: f64, default: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| {
        tracing::error!("Invalid value {} for option {}, using {}", value, option, default);
        Duration::from_secs_f64(default)
    })
}

/// Fonctions injectées dans un ordonnanceur de playlist
#[derive(Clone)]
pub struct Hooks {
    pub check_next: CheckNext,
    pub on_done: Callback,
    pub on_reload: Callback,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            check_next: Arc::new(|_| true),
            on_done: Arc::new(|| {}),
            on_reload: Arc::new(|| {}),
        }
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_next(mut self, f: impl Fn(&ItemHandle) -> bool + Send + Sync + 'static) -> Self {
        self.check_next = Arc::new(f);
        self
    }

    pub fn on_done(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_done = Arc::new(f);
        self
    }

    pub fn on_reload(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reload = Arc::new(f);
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks").finish_non_exhaustive()
    }
}

/// Réglages du préchargement d'une [`DynamicSource`](crate::DynamicSource)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefetchSettings {
    /// Durée d'avance à garder résolue
    pub length: Duration,
    /// Ne pas compter le temps restant de l'élément courant
    pub conservative: bool,
    /// Durée supposée quand l'élément n'en déclare pas
    pub default_duration: Duration,
    /// Durée maximale d'une résolution
    pub timeout: Duration,
    /// Délai avant de solliciter à nouveau un producteur indisponible
    pub retry_delay: Duration,
}

impl Default for PrefetchSettings {
    fn default() -> Self {
        Self {
            length: Duration::from_secs_f64(DEFAULT_LENGTH_SECS),
            conservative: false,
            default_duration: Duration::from_secs_f64(DEFAULT_DURATION_SECS),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            retry_delay: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Options d'un ordonnanceur de playlist, telles que déclarées en YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistOptions {
    /// Nom de l'instance (l'URI par défaut)
    pub id: String,
    /// URI de la playlist (fichier ou répertoire)
    pub uri: String,
    pub conservative: bool,
    pub default_duration: f64,
    pub length: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    /// Type MIME attendu, vide pour la détection automatique
    pub mime_type: String,
    /// `normal`, `random` ou `randomize`
    pub mode: String,
    pub prefix: String,
    /// Nombre de tours ou de secondes selon `reload_mode`, 0 = jamais
    pub reload: u64,
    /// `never`, `rounds`, `seconds` ou `watch`
    pub reload_mode: String,
    pub timeout: f64,
    pub retry_delay: f64,
}

impl Default for PlaylistOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            uri: String::new(),
            conservative: false,
            default_duration: DEFAULT_DURATION_SECS,
            length: DEFAULT_LENGTH_SECS,
            looping: true,
            mime_type: String::new(),
            mode: ShuffleMode::default().to_string(),
            prefix: String::new(),
            reload: 0,
            reload_mode: "seconds".to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl PlaylistOptions {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }

    /// Identifiant effectif de l'instance
    pub fn instance_id(&self) -> &str {
        if self.id.is_empty() {
            &self.uri
        } else {
            &self.id
        }
    }

    pub fn shuffle_mode(&self) -> ShuffleMode {
        ShuffleMode::from_config(&self.mode)
    }

    pub fn reload_mode(&self) -> ReloadMode {
        ReloadMode::from_config(&self.reload_mode, self.reload)
    }

    pub fn loader_options(&self) -> LoaderOptions {
        let mime_type = match self.mime_type.trim() {
            "" => None,
            mime => Some(mime.to_string()),
        };

        LoaderOptions {
            prefix: self.prefix.clone(),
            mime_type,
            timeout: seconds("timeout", self.timeout, DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn prefetch(&self) -> PrefetchSettings {
        PrefetchSettings {
            length: seconds("length", self.length, DEFAULT_LENGTH_SECS),
            conservative: self.conservative,
            default_duration: seconds(
                "default_duration",
                self.default_duration,
                DEFAULT_DURATION_SECS,
            ),
            timeout: seconds("timeout", self.timeout, DEFAULT_TIMEOUT_SECS),
            retry_delay: seconds("retry_delay", self.retry_delay, DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

/// Options d'une file alimentée par `push`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    pub id: String,
    pub conservative: bool,
    pub default_duration: f64,
    pub length: f64,
    pub timeout: f64,
    pub retry_delay: f64,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            id: String::new(),
            conservative: false,
            default_duration: DEFAULT_DURATION_SECS,
            length: DEFAULT_LENGTH_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
        }
    }
}

impl QueueOptions {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn prefetch(&self) -> PrefetchSettings {
        PrefetchSettings {
            length: seconds("length", self.length, DEFAULT_LENGTH_SECS),
            conservative: self.conservative,
            default_duration: seconds(
                "default_duration",
                self.default_duration,
                DEFAULT_DURATION_SECS,
            ),
            timeout: seconds("timeout", self.timeout, DEFAULT_TIMEOUT_SECS),
            retry_delay: seconds("retry_delay", self.retry_delay, DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PlaylistOptions::new("", "/music/jazz.m3u");
        assert_eq!(options.instance_id(), "/music/jazz.m3u");
        assert_eq!(options.shuffle_mode(), ShuffleMode::Randomize);
        assert_eq!(options.reload_mode(), ReloadMode::Never);
        assert!(options.looping);

        let loader = options.loader_options();
        assert_eq!(loader.mime_type, None);
        assert_eq!(loader.timeout, Duration::from_secs(20));

        let prefetch = options.prefetch();
        assert_eq!(prefetch.length, Duration::from_secs(10));
        assert_eq!(prefetch.default_duration, Duration::from_secs(30));
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = r#"
id: jazz
uri: /music/jazz
loop: false
mode: normal
reload: 2
reload_mode: rounds
mime_type: audio/x-mpegurl
length: 60
"#;
        let options: PlaylistOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.instance_id(), "jazz");
        assert!(!options.looping);
        assert_eq!(options.shuffle_mode(), ShuffleMode::Normal);
        assert_eq!(options.reload_mode(), ReloadMode::Rounds(2));
        assert_eq!(
            options.loader_options().mime_type.as_deref(),
            Some("audio/x-mpegurl")
        );
        assert_eq!(options.prefetch().length, Duration::from_secs(60));
        assert_eq!(options.timeout, 20.0);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let options = PlaylistOptions {
            mode: "shuffle".into(),
            length: -5.0,
            ..PlaylistOptions::new("x", "/x")
        };
        assert_eq!(options.shuffle_mode(), ShuffleMode::Randomize);
        assert_eq!(options.prefetch().length, Duration::from_secs(10));
    }

    #[test]
    fn test_default_hooks_accept_everything() {
        let hooks = Hooks::default();
        let handle = ItemHandle::new(0, "/a.flac");
        assert!((hooks.check_next)(&handle));
        handle.release();
    }
}
