use std::sync::Arc;
use std::time::Duration;

use pmoconfig::Config;
use pmocontrol::ControlRegistry;
use pmosource::{
    DynamicSource, Hooks, ItemProducer, PlaylistOptions, PlaylistSource, QueueSource,
    SchedulerConfigExt, playlist_source, queue_source,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, prelude::*};

/// Installe le subscriber : niveau de la configuration, `RUST_LOG` prioritaire
fn init_logging(config: &Config) {
    let level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "INFO".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let subscriber = tracing_subscriber::registry().with(filter);

    if enable_console {
        subscriber
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_ansi(true),
            )
            .init();
    } else {
        subscriber.init();
    }
}

/// Lecture simulée : attend la durée de l'élément, ou son saut
fn spawn_playback<P: ItemProducer>(
    source: DynamicSource<P>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while !cancel.is_cancelled() && !source.is_shut_down() {
            let track = match source.next_track().await {
                Some(track) => track,
                None => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(source.settings().retry_delay) => {}
                    }
                    continue;
                }
            };

            info!(
                source = %source.id(),
                id = track.id,
                "▶️ Playing {} ({:.0}s)",
                track.uri,
                track.duration.as_secs_f64()
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(track.duration) => {}
                _ = source.skipped() => info!(source = %source.id(), "⏭️ Skipped"),
            }
        }
        debug!(source = %source.id(), "Playback stopped");
    })
}

async fn start_playlist(options: &PlaylistOptions) -> PlaylistSource {
    let id = options.instance_id().to_string();
    let done_id = id.clone();
    let hooks = Hooks::new()
        .on_done(move || info!(scheduler = %done_id, "🏁 Playlist finished"))
        .on_reload(move || debug!(scheduler = %id, "Playlist reloaded"));

    playlist_source(options, hooks).await
}

async fn run_console(registry: &ControlRegistry) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    match line {
                        "" => continue,
                        "quit" | "exit" => break,
                        _ => println!("{}", registry.handle_line(line).await),
                    }
                }
                Ok(None) => {
                    info!("End of input");
                    break;
                }
                Err(e) => {
                    error!("Failed to read command: {}", e);
                    break;
                }
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Répertoire de configuration optionnel en premier argument
    let config = match std::env::args().nth(1) {
        Some(dir) => Arc::new(Config::load_config(&dir)?),
        None => pmoconfig::get_config(),
    };
    init_logging(&config);
    info!(config_dir = %config.directory(), "🎵 Starting PMOScheduler...");

    let registry = ControlRegistry::new();
    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();
    let mut playlists: Vec<PlaylistSource> = Vec::new();
    let mut queues: Vec<QueueSource> = Vec::new();

    for options in config.get_playlist_schedulers()? {
        let source = start_playlist(&options).await;
        if let Err(e) = registry.register(Arc::new(source.clone())) {
            warn!("⚠️ Skipping playlist {}: {}", options.instance_id(), e);
            source.shutdown();
            continue;
        }
        tasks.push(spawn_playback(source.clone(), cancel.clone()));
        playlists.push(source);
    }

    for options in config.get_queue_schedulers()? {
        let source = queue_source(&options);
        if let Err(e) = registry.register(Arc::new(source.clone())) {
            warn!("⚠️ Skipping queue {}: {}", options.id, e);
            source.shutdown();
            continue;
        }
        tasks.push(spawn_playback(source.clone(), cancel.clone()));
        queues.push(source);
    }

    info!("✅ {} instance(s) running", playlists.len() + queues.len());
    for line in registry.list().lines() {
        info!("  - {}", line);
    }
    info!("Type 'help' for commands, Ctrl+C to stop...");

    run_console(&registry).await;

    // ========== Arrêt ==========
    info!("Shutting down...");
    cancel.cancel();
    for source in &playlists {
        source.shutdown();
    }
    for source in &queues {
        source.shutdown();
    }

    let timeout = Duration::from_secs(config.get_shutdown_timeout().unwrap_or(5) as u64);
    for task in tasks {
        if tokio::time::timeout(timeout, task).await.is_err() {
            warn!("⚠️ Playback task did not stop within {:?}", timeout);
        }
    }

    info!("👋 PMOScheduler stopped");
    Ok(())
}
