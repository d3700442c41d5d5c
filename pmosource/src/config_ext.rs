//! Extension de pmoconfig pour les sources
//!
//! Les instances sont déclarées dans la configuration :
//!
//! ```yaml
//! schedulers:
//!   playlists:
//!     - id: jazz
//!       uri: /music/jazz.m3u
//!       mode: normal
//!       reload: 3
//!       reload_mode: rounds
//!   queues:
//!     - id: requests
//!       length: 30
//! ```

use crate::settings::{PlaylistOptions, QueueOptions};
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

/// Trait d'extension pour pmoconfig::Config
pub trait SchedulerConfigExt {
    /// Ordonnanceurs de playlist déclarés sous `schedulers.playlists`
    fn get_playlist_schedulers(&self) -> Result<Vec<PlaylistOptions>>;

    /// Files déclarées sous `schedulers.queues`
    fn get_queue_schedulers(&self) -> Result<Vec<QueueOptions>>;

    /// Ajoute un ordonnanceur de playlist et sauvegarde
    fn add_playlist_scheduler(&self, options: &PlaylistOptions) -> Result<()>;
}

fn read_list<T: DeserializeOwned>(config: &pmoconfig::Config, key: &str) -> Result<Vec<T>> {
    match config.get_value(&["schedulers", key]) {
        Ok(Value::Null) | Err(_) => Ok(Vec::new()),
        Ok(value) => Ok(serde_yaml::from_value(value)?),
    }
}

impl SchedulerConfigExt for pmoconfig::Config {
    fn get_playlist_schedulers(&self) -> Result<Vec<PlaylistOptions>> {
        read_list(self, "playlists")
    }

    fn get_queue_schedulers(&self) -> Result<Vec<QueueOptions>> {
        read_list(self, "queues")
    }

    fn add_playlist_scheduler(&self, options: &PlaylistOptions) -> Result<()> {
        let mut list = match self.get_value(&["schedulers", "playlists"]) {
            Ok(Value::Sequence(list)) => list,
            _ => Vec::new(),
        };
        list.push(serde_yaml::to_value(options)?);
        self.set_value(&["schedulers", "playlists"], Value::Sequence(list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReloadMode;
    use pmoplaylist::ShuffleMode;

    #[test]
    fn test_read_declared_schedulers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            r#"
schedulers:
  playlists:
    - id: jazz
      uri: /music/jazz.m3u
      mode: normal
      reload: 3
      reload_mode: rounds
    - uri: /music/rock
  queues:
    - id: requests
      length: 30
"#,
        )
        .unwrap();

        let config = pmoconfig::Config::load_config(&dir.path().to_string_lossy()).unwrap();

        let playlists = config.get_playlist_schedulers().unwrap();
        assert_eq!(playlists.len(), 2);
        assert_eq!(playlists[0].instance_id(), "jazz");
        assert_eq!(playlists[0].shuffle_mode(), ShuffleMode::Normal);
        assert_eq!(playlists[0].reload_mode(), ReloadMode::Rounds(3));
        assert_eq!(playlists[1].instance_id(), "/music/rock");
        assert!(playlists[1].looping);

        let queues = config.get_queue_schedulers().unwrap();
        assert_eq!(queues.len(), 1);
        assert_eq!(queues[0].id, "requests");
        assert_eq!(queues[0].length, 30.0);
    }

    #[test]
    fn test_add_playlist_scheduler_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();

        let config = pmoconfig::Config::load_config(&path).unwrap();
        assert!(config.get_playlist_schedulers().unwrap().is_empty());
        config
            .add_playlist_scheduler(&PlaylistOptions::new("news", "/podcasts"))
            .unwrap();

        let reloaded = pmoconfig::Config::load_config(&path).unwrap();
        let playlists = reloaded.get_playlist_schedulers().unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].uri, "/podcasts");
    }
}
