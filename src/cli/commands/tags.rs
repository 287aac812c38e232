//! AI tag generation command.

use std::io::Write;
use tokio::runtime::Runtime;

use crate::ai;
use crate::ai::tagger::{TagGenerator, TrackDescriptor};
use crate::config::Config;
use crate::db;
use crate::error::Error;
use crate::model;
use crate::progress::{CancelToken, Reporter};

/// Generate tags, environments and instruments for untagged tracks.
pub fn cmd_tags(rt: &Runtime, config: &Config, batch_size: Option<usize>) -> anyhow::Result<()> {
    let provider = ai::completion_provider(config)?;
    let batch_size = batch_size.unwrap_or(config.tagging.batch_size);

    rt.block_on(async {
        let pool = db::init_db(&config.database.db_path()).await?;
        let untagged = db::tracks_without_tags(&pool).await?;
        if untagged.is_empty() {
            println!("All tracks are already tagged.");
            return Ok(());
        }
        println!("Tagging {} tracks...", untagged.len());

        let descriptors: Vec<TrackDescriptor> = untagged
            .iter()
            .map(|track| TrackDescriptor {
                id: track.id,
                title: track.title.clone(),
                artist: track.artist_name.clone(),
                genre: track.genre.clone().unwrap_or_default(),
            })
            .collect();

        let generator = TagGenerator::new(provider.as_ref());
        let (reporter, rx) = Reporter::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                print!("\r{}", event.message);
                let _ = std::io::stdout().flush();
            }
        });

        let cancel = CancelToken::new();
        let results = generator
            .generate_tags(&descriptors, batch_size, &reporter, &cancel)
            .await;

        drop(reporter);
        let _ = printer.join();
        println!();

        let mut tagged = 0usize;
        for (track_id, tags) in &results {
            if tags.is_empty() {
                continue;
            }
            db::update_track_enrichment(
                &pool,
                *track_id,
                model::join_list(&tags.tags).as_deref(),
                model::join_list(&tags.environments).as_deref(),
                model::join_list(&tags.instruments).as_deref(),
            )
            .await?;
            tagged += 1;
        }

        println!("Tagged {} of {} tracks.", tagged, untagged.len());
        Ok::<(), Error>(())
    })?;

    Ok(())
}
