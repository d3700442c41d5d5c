//! Example: plays a directory or an M3U playlist through a playlist source
//!
//! Usage: `cargo run -p pmosource --example playlist -- <dir-or-m3u> [count]`
//!
//! Tracks are not decoded: the example only prints what playback would get.

use pmosource::{Hooks, PlaylistOptions, playlist_source};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("pmosource=debug,pmoplaylist=info")
        .init();

    let mut args = std::env::args().skip(1);
    let uri = args.next().unwrap_or_else(|| ".".to_string());
    let count: usize = args.next().map(|n| n.parse()).transpose()?.unwrap_or(10);

    let options = PlaylistOptions {
        mode: "randomize".into(),
        reload_mode: "never".into(),
        looping: false,
        ..PlaylistOptions::new("example", uri)
    };
    let hooks = Hooks::new().on_done(|| println!("-- playlist finished --"));
    let source = playlist_source(&options, hooks).await;

    println!("Playlist {} ({} items)\n", source.uri(), source.producer().pending().len());

    for n in 1..=count {
        let Some(track) = source.next_track().await else {
            break;
        };
        println!("{:>3}. [{}] {}", n, track.id, track.path.display());
        if let Some(title) = track.metadata.get("title") {
            println!("       title: {}", title);
        }
        println!("       duration: {:.0}s", track.duration.as_secs_f64());
        println!("       next: {:?}", source.pending_ids());
    }

    source.shutdown();
    Ok(())
}
