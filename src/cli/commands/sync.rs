//! Library synchronization command.

use std::io::Write;
use tokio::runtime::Runtime;

use crate::ai;
use crate::config::Config;
use crate::db;
use crate::progress::{CancelToken, Reporter};
use crate::remote::MediaServerClient;
use crate::sync::SyncEngine;

/// Mirror the remote library into the local database.
pub fn cmd_sync(
    rt: &Runtime,
    config: &Config,
    incremental: bool,
    skip_embeddings: bool,
) -> anyhow::Result<()> {
    let (url, token) = super::server_connection(config)?;

    let embedder = if skip_embeddings {
        None
    } else {
        match ai::embedding_provider(config) {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!("Embeddings disabled for this sync: {}", e);
                None
            }
        }
    };

    let summary = rt.block_on(async {
        let pool = db::init_db(&config.database.db_path()).await?;
        let client = MediaServerClient::new(url, token);

        let mut engine = SyncEngine::new(&pool, &client, config.database.index_path());
        if let Some(provider) = embedder.as_deref() {
            engine = engine.with_embedder(provider, config.embedding.provider.clone());
        }

        let (reporter, rx) = Reporter::channel();
        let printer = std::thread::spawn(move || {
            for event in rx {
                print!("\r{:>3.0}% {}", event.fraction * 100.0, event.message);
                let _ = std::io::stdout().flush();
            }
        });

        let cancel = CancelToken::new();
        let result = if incremental {
            engine.incremental_sync(&reporter, &cancel).await
        } else {
            engine.full_sync(&reporter, &cancel).await
        };

        drop(reporter);
        let _ = printer.join();
        println!();
        result
    })?;

    println!(
        "Sync complete: {} added, {} updated, {} removed",
        summary.added, summary.updated, summary.removed
    );
    Ok(())
}
