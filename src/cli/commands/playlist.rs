//! Playlist creation, listing and export commands.

use std::io::Write;
use std::path::Path;
use tokio::runtime::Runtime;

use crate::ai;
use crate::config::Config;
use crate::db::{self, TrackFilters};
use crate::error::Error;
use crate::index::TrackIndex;
use crate::playlist::{self, PlaylistGenerator};
use crate::progress::{CancelToken, Reporter};
use crate::remote::{MediaServerApi, MediaServerClient};

/// Generate and save a mood playlist.
#[allow(clippy::too_many_arguments)]
pub fn cmd_create(
    rt: &Runtime,
    config: &Config,
    query: &str,
    name: Option<&str>,
    length: Option<usize>,
    pool_size: Option<usize>,
    no_rerank: bool,
    push: bool,
    export: Option<&Path>,
    filters: &TrackFilters,
) -> anyhow::Result<()> {
    let embedder = ai::embedding_provider(config)?;
    let reranker = if no_rerank {
        None
    } else {
        match ai::completion_provider(config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!("AI track selection disabled: {}", e);
                None
            }
        }
    };

    let index_path = config.database.index_path();
    let index = TrackIndex::load(&index_path).map_err(|e| {
        anyhow::anyhow!(
            "Could not load the vector index at {:?} ({}). Run `moodmixer sync` first.",
            index_path,
            e
        )
    })?;

    let remote_client = if push {
        let (url, token) = super::server_connection(config)?;
        Some(MediaServerClient::new(url, token))
    } else {
        None
    };
    if export.is_some() && config.server.url.is_empty() {
        anyhow::bail!(
            "M3U export needs a media server URL for stream links (set server.url or MEDIA_SERVER_URL)"
        );
    }

    let length = length.unwrap_or(config.playlist.default_length);
    let pool_size = pool_size.unwrap_or(config.playlist.candidate_pool_size);
    let name = name.unwrap_or(query).to_string();

    rt.block_on(async {
        let pool = db::init_db(&config.database.db_path()).await?;

        let mut generator = PlaylistGenerator::new(&pool, embedder.as_ref(), &index);
        if let Some(reranker) = reranker.as_deref() {
            generator = generator.with_reranker(reranker);
        }

        let (reporter, rx) = Reporter::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                print!("\r{:>3.0}% {}", event.fraction * 100.0, event.message);
                let _ = std::io::stdout().flush();
            }
        });

        let result = generator
            .generate(query, length, pool_size, filters, &reporter, &CancelToken::new())
            .await;

        drop(reporter);
        let _ = printer.join();
        println!();

        let tracks = result?;
        if tracks.is_empty() {
            println!("No tracks matched \"{}\".", query);
            return Ok(());
        }

        for (position, track) in tracks.iter().enumerate() {
            println!(
                "{:>3}. {} - {}  [{}]  ({:.2})",
                position + 1,
                track.artist,
                track.title,
                track.album,
                track.similarity
            );
        }

        let remote = remote_client.as_ref().map(|c| c as &dyn MediaServerApi);
        let playlist_id = playlist::save_playlist(&pool, &name, &tracks, query, None, remote).await?;
        println!("Saved playlist \"{}\" ({} tracks).", name, tracks.len());

        if let Some(path) = export {
            playlist::export_m3u(&pool, playlist_id, path, &config.server.url).await?;
            println!("Exported to {:?}.", path);
        }
        Ok::<(), Error>(())
    })?;

    Ok(())
}

/// Export a previously saved playlist as an extended M3U file.
pub fn cmd_export(rt: &Runtime, config: &Config, name: &str, output: &Path) -> anyhow::Result<()> {
    if config.server.url.is_empty() {
        anyhow::bail!(
            "M3U export needs a media server URL for stream links (set server.url or MEDIA_SERVER_URL)"
        );
    }

    rt.block_on(async {
        let pool = db::init_db(&config.database.db_path()).await?;
        let playlist = db::get_playlist_by_name(&pool, name)
            .await?
            .ok_or_else(|| Error::playlist(format!("no playlist named {:?}", name)))?;
        playlist::export_m3u(&pool, playlist.id, output, &config.server.url).await
    })?;

    println!("Exported \"{}\" to {:?}.", name, output);
    Ok(())
}

/// List synced tracks, or saved playlists.
pub fn cmd_list(rt: &Runtime, config: &Config, playlists: bool) -> anyhow::Result<()> {
    rt.block_on(async {
        let pool = db::init_db(&config.database.db_path()).await?;

        if playlists {
            let saved = db::list_playlists(&pool).await?;
            if saved.is_empty() {
                println!("No playlists saved yet.");
            }
            for playlist in saved {
                let tracks = db::playlist_tracks(&pool, playlist.id).await?;
                let origin = playlist
                    .mood_query
                    .map(|q| format!("  [{}]", q))
                    .unwrap_or_default();
                println!("{} ({} tracks){}", playlist.name, tracks.len(), origin);
            }
        } else {
            let tracks = db::list_tracks(&pool).await?;
            if tracks.is_empty() {
                println!("No tracks synced yet. Run `moodmixer sync` first.");
            }
            for track in tracks {
                let tags = track.tags.map(|t| format!("  [{}]", t)).unwrap_or_default();
                println!("{} - {}{}", track.artist_name, track.title, tags);
            }
        }
        Ok::<(), Error>(())
    })?;

    Ok(())
}
