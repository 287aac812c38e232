//! Sync engine: reconciles the remote library snapshot into the local
//! mirror.
//!
//! A pass upserts artists, then albums, then tracks, keyed on the remote
//! external keys so local ids stay stable. Enrichment fields are sticky
//! (see [`crate::model::merge_track`]). A full sync also removes local
//! tracks missing from the snapshot; an incremental sync only sees
//! additions and modifications, so it never removes anything.
//!
//! Connectivity failure aborts before any entity write. Per-item failures
//! are logged and skipped. Every pass, successful or not, leaves a row in
//! sync_history.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use crate::ai::EmbeddingApi;
use crate::db::{self, UpsertOutcome};
use crate::error::{Error, Result};
use crate::index::TrackIndex;
use crate::model::{NewAlbum, NewArtist, NewTrack};
use crate::progress::{CancelToken, Reporter};
use crate::remote::{MediaServerApi, RemoteAlbum, RemoteTrack};

/// Texts per embedding request.
const EMBEDDING_BATCH_SIZE: usize = 100;

/// Counts reported by a completed sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub added: u64,
    pub updated: u64,
    pub removed: u64,
}

pub struct SyncEngine<'a> {
    pool: &'a SqlitePool,
    server: &'a dyn MediaServerApi,
    embedder: Option<(&'a dyn EmbeddingApi, String)>,
    index_path: PathBuf,
}

impl<'a> SyncEngine<'a> {
    pub fn new(pool: &'a SqlitePool, server: &'a dyn MediaServerApi, index_path: PathBuf) -> Self {
        Self {
            pool,
            server,
            embedder: None,
            index_path,
        }
    }

    /// Enable re-embedding and index rebuild at the end of each pass.
    pub fn with_embedder(
        mut self,
        embedder: &'a dyn EmbeddingApi,
        model_label: impl Into<String>,
    ) -> Self {
        self.embedder = Some((embedder, model_label.into()));
        self
    }

    /// Reconcile the complete remote snapshot, removing local tracks the
    /// snapshot no longer contains.
    pub async fn full_sync(
        &self,
        reporter: &Reporter,
        cancel: &CancelToken,
    ) -> Result<SyncSummary> {
        let started_at = Utc::now().to_rfc3339();
        let result = self.run(reporter, cancel, None).await;
        self.record_outcome(&started_at, &result).await?;
        result
    }

    /// Reconcile only tracks changed since the last successful sync.
    ///
    /// With no successful sync on record (or an unreadable timestamp) this
    /// degrades to a full sync.
    pub async fn incremental_sync(
        &self,
        reporter: &Reporter,
        cancel: &CancelToken,
    ) -> Result<SyncSummary> {
        let since = match db::last_successful_sync(self.pool).await? {
            Some(ts) => match DateTime::parse_from_rfc3339(&ts) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(e) => {
                    tracing::warn!("Unreadable last sync timestamp {:?} ({}), running full sync", ts, e);
                    None
                }
            },
            None => {
                tracing::info!("No successful sync on record, running full sync");
                None
            }
        };

        match since {
            None => self.full_sync(reporter, cancel).await,
            Some(since) => {
                let started_at = Utc::now().to_rfc3339();
                let result = self.run(reporter, cancel, Some(since)).await;
                self.record_outcome(&started_at, &result).await?;
                result
            }
        }
    }

    async fn record_outcome(
        &self,
        started_at: &str,
        result: &Result<SyncSummary>,
    ) -> Result<()> {
        let (summary, status) = match result {
            Ok(summary) => (*summary, "success"),
            Err(_) => (SyncSummary::default(), "failed"),
        };
        db::insert_sync_record(
            self.pool,
            started_at,
            summary.added as i64,
            summary.updated as i64,
            summary.removed as i64,
            status,
        )
        .await?;
        Ok(())
    }

    async fn run(
        &self,
        reporter: &Reporter,
        cancel: &CancelToken,
        since: Option<DateTime<Utc>>,
    ) -> Result<SyncSummary> {
        // Fetch everything up front: a connectivity failure must abort
        // before any entity write.
        reporter.report(0.0, "Fetching remote library");
        let artists = self.server.list_artists().await?;
        let albums = self.server.list_albums().await?;
        let tracks = match since {
            None => self.server.list_tracks().await?,
            Some(since) => self.server.list_tracks_since(since).await?,
        };
        tracing::info!(
            "Remote snapshot: {} artists, {} albums, {} tracks",
            artists.len(),
            albums.len(),
            tracks.len()
        );

        reporter.report(0.1, format!("Syncing {} artists", artists.len()));
        let mut artist_map: HashMap<String, i64> = HashMap::new();
        for artist in &artists {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let record = NewArtist {
                external_key: artist.key.clone(),
                name: artist.name.clone(),
                genre: artist.genre.clone(),
                bio: artist.bio.clone(),
            };
            match db::upsert_artist(self.pool, &record).await {
                Ok(id) => {
                    artist_map.insert(artist.key.clone(), id);
                }
                Err(e) => tracing::warn!("Skipping artist {:?}: {}", artist.name, e),
            }
        }

        let unknown_artist_id = db::ensure_unknown_artist(self.pool).await?;

        reporter.report(0.25, format!("Syncing {} albums", albums.len()));
        let mut album_map: HashMap<String, i64> = HashMap::new();
        for album in &albums {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let record = self.album_record(album, &artist_map, unknown_artist_id);
            match db::upsert_album(self.pool, &record).await {
                Ok(id) => {
                    album_map.insert(album.key.clone(), id);
                }
                Err(e) => tracing::warn!("Skipping album {:?}: {}", album.title, e),
            }
        }

        reporter.report(0.4, format!("Syncing {} tracks", tracks.len()));
        let mut summary = SyncSummary::default();
        let mut touched: Vec<i64> = Vec::new();
        for track in &tracks {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let Some(record) =
                self.track_record(track, &artist_map, &album_map, unknown_artist_id)
            else {
                continue;
            };
            match db::upsert_track(self.pool, &record).await {
                Ok((id, UpsertOutcome::Added)) => {
                    summary.added += 1;
                    touched.push(id);
                }
                Ok((id, UpsertOutcome::Updated)) => {
                    summary.updated += 1;
                    touched.push(id);
                }
                Ok((_, UpsertOutcome::Unchanged)) => {}
                Err(e) => tracing::warn!("Skipping track {:?}: {}", track.title, e),
            }
        }

        // Removals only make sense against the complete snapshot.
        if since.is_none() {
            reporter.report(0.7, "Removing vanished tracks");
            let remote_keys: HashSet<&str> = tracks.iter().map(|t| t.key.as_str()).collect();
            let local = db::track_key_map(self.pool).await?;
            let vanished: Vec<i64> = local
                .iter()
                .filter(|(key, _)| !remote_keys.contains(key.as_str()))
                .map(|(_, &id)| id)
                .collect();
            if !vanished.is_empty() {
                summary.removed = db::delete_tracks(self.pool, &vanished).await?;
                tracing::info!("Removed {} tracks no longer on the server", summary.removed);
            }
        }

        if let Some((embedder, model)) = &self.embedder {
            self.refresh_embeddings(reporter, cancel, *embedder, model, &touched)
                .await?;
        }

        reporter.report(1.0, "Sync complete");
        tracing::info!(
            "Sync finished: {} added, {} updated, {} removed",
            summary.added,
            summary.updated,
            summary.removed
        );
        Ok(summary)
    }

    fn album_record(
        &self,
        album: &RemoteAlbum,
        artist_map: &HashMap<String, i64>,
        unknown_artist_id: i64,
    ) -> NewAlbum {
        // The album's own artist reference, or the sentinel. Never derived
        // from the album key itself.
        let artist_id = album
            .artist_key
            .as_deref()
            .and_then(|key| artist_map.get(key).copied())
            .unwrap_or(unknown_artist_id);

        NewAlbum {
            external_key: album.key.clone(),
            title: album.title.clone(),
            artist_id,
            year: album.year,
            genre: album.genre.clone(),
            cover_url: album.cover_url.clone(),
        }
    }

    fn track_record(
        &self,
        track: &RemoteTrack,
        artist_map: &HashMap<String, i64>,
        album_map: &HashMap<String, i64>,
        unknown_artist_id: i64,
    ) -> Option<NewTrack> {
        let artist_id = track
            .artist_key
            .as_deref()
            .and_then(|key| artist_map.get(key).copied())
            .unwrap_or(unknown_artist_id);

        let Some(album_id) = track
            .album_key
            .as_deref()
            .and_then(|key| album_map.get(key).copied())
        else {
            tracing::warn!("Skipping track {:?}: album not in snapshot", track.title);
            return None;
        };

        Some(NewTrack {
            external_key: track.key.clone(),
            title: track.title.clone(),
            artist_id,
            album_id,
            duration: track.duration,
            genre: track.genre.clone(),
            year: track.year,
            rating: track.rating,
            play_count: track.play_count,
            last_played: track.last_played.clone(),
            tags: None,
            environments: None,
            instruments: None,
        })
    }

    /// Re-embed new/changed tracks plus any track missing an embedding,
    /// then rebuild and save the index from the complete set.
    async fn refresh_embeddings(
        &self,
        reporter: &Reporter,
        cancel: &CancelToken,
        embedder: &dyn EmbeddingApi,
        model: &str,
        touched: &[i64],
    ) -> Result<()> {
        let mut pending: Vec<i64> = touched.to_vec();
        pending.extend(db::tracks_without_embeddings(self.pool).await?);
        pending.sort_unstable();
        pending.dedup();

        if !pending.is_empty() {
            reporter.report(0.8, format!("Embedding {} tracks", pending.len()));
            let rows = db::get_tracks_with_names(self.pool, &pending).await?;

            for chunk in rows.chunks(EMBEDDING_BATCH_SIZE) {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let texts: Vec<String> = chunk.iter().map(|t| t.embedding_text()).collect();
                let vectors = embedder.embed_batch(&texts, EMBEDDING_BATCH_SIZE).await?;
                for (row, vector) in chunk.iter().zip(vectors) {
                    db::upsert_embedding(self.pool, row.id, model, &vector).await?;
                }
            }
        }

        reporter.report(0.95, "Rebuilding vector index");
        let entries = db::all_embeddings(self.pool).await?;
        let index = TrackIndex::build(embedder.dimension(), entries)?;
        index.save(&self.index_path)?;

        Ok(())
    }
}
