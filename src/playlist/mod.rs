//! Playlist generation: filters → semantic retrieval → AI re-rank →
//! dedup → persist/export.
//!
//! The mood query is embedded with the same provider used at sync time, the
//! vector index supplies a candidate pool (restricted to the filtered id
//! set when filters are present), and a completion model picks and orders
//! the final tracks. When no reranker is configured, or it returns nothing
//! usable, the top tracks by similarity stand in.

use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::ai::tagger::clean_json_response;
use crate::ai::{retry, CompletionApi, EmbeddingApi};
use crate::db::{self, TrackFilters, TrackWithNames};
use crate::error::{Error, Result};
use crate::index::TrackIndex;
use crate::progress::{CancelToken, Reporter};
use crate::remote::MediaServerApi;

const RERANK_TEMPERATURE: f32 = 0.7;
const RERANK_MAX_TOKENS: u32 = 2048;

/// One entry of a generated playlist, with display metadata.
#[derive(Debug, Clone)]
pub struct PlaylistTrack {
    pub id: i64,
    pub external_key: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Option<i64>,
    /// Semantic similarity to the mood query, higher = closer
    pub similarity: f32,
}

pub struct PlaylistGenerator<'a> {
    pool: &'a SqlitePool,
    embedder: &'a dyn EmbeddingApi,
    index: &'a TrackIndex,
    reranker: Option<&'a dyn CompletionApi>,
}

impl<'a> PlaylistGenerator<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        embedder: &'a dyn EmbeddingApi,
        index: &'a TrackIndex,
    ) -> Self {
        Self {
            pool,
            embedder,
            index,
            reranker: None,
        }
    }

    /// Enable AI selection/ordering of the candidate pool.
    pub fn with_reranker(mut self, reranker: &'a dyn CompletionApi) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Generate an ordered playlist for a mood query.
    ///
    /// Progress is reported after each stage; the cancel token is polled
    /// between stages, so a rerank request already in flight completes
    /// before cancellation is observed.
    pub async fn generate(
        &self,
        mood_query: &str,
        max_tracks: usize,
        candidate_pool_size: usize,
        filters: &TrackFilters,
        reporter: &Reporter,
        cancel: &CancelToken,
    ) -> Result<Vec<PlaylistTrack>> {
        // 1. Filters restrict the candidate universe; no filters means all.
        reporter.report(0.0, "Applying filters");
        let allowed: Option<HashSet<i64>> = if filters.is_empty() {
            None
        } else {
            let ids = db::filter_track_ids(self.pool, filters).await?;
            if ids.is_empty() {
                tracing::info!("No tracks match the filters");
                return Ok(vec![]);
            }
            Some(ids.into_iter().collect())
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // 2. Semantic retrieval.
        reporter.report(0.2, "Retrieving candidates");
        let query_vector = self.embedder.embed(mood_query).await?;
        let neighbours =
            self.index
                .search(&query_vector, candidate_pool_size, allowed.as_ref())?;
        if neighbours.is_empty() {
            return Ok(vec![]);
        }

        let similarity: HashMap<i64, f32> = neighbours.iter().copied().collect();
        let candidate_order: Vec<i64> = neighbours.iter().map(|(id, _)| *id).collect();
        let candidates = db::get_tracks_with_names(self.pool, &candidate_order).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // 3. AI selection, falling back to similarity order.
        reporter.report(
            0.5,
            format!("Selecting from {} candidates", candidates.len()),
        );
        let ordered_ids = match self.reranker {
            Some(reranker) => self
                .rerank(reranker, mood_query, &candidates, max_tracks)
                .await
                .unwrap_or_default(),
            None => vec![],
        };
        let ordered_ids = if ordered_ids.is_empty() {
            candidate_order.clone()
        } else {
            ordered_ids
        };
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // 4. Dedup by normalized (title, artist), first occurrence wins.
        reporter.report(0.9, "Removing duplicates");
        let by_id: HashMap<i64, &TrackWithNames> =
            candidates.iter().map(|t| (t.id, t)).collect();
        let mut seen_pairs = HashSet::new();
        let mut playlist = Vec::new();
        for id in ordered_ids {
            let Some(track) = by_id.get(&id) else { continue };
            let pair = (
                track.title.trim().to_lowercase(),
                track.artist_name.trim().to_lowercase(),
            );
            if !seen_pairs.insert(pair) {
                continue;
            }
            playlist.push(PlaylistTrack {
                id: track.id,
                external_key: track.external_key.clone(),
                title: track.title.clone(),
                artist: track.artist_name.clone(),
                album: track.album_title.clone(),
                duration: track.duration,
                similarity: similarity.get(&track.id).copied().unwrap_or(0.0),
            });
            if playlist.len() >= max_tracks {
                break;
            }
        }

        reporter.report(1.0, "Playlist ready");
        tracing::info!(
            "Generated {} tracks for mood {:?} from a pool of {}",
            playlist.len(),
            mood_query,
            candidates.len()
        );
        Ok(playlist)
    }

    async fn rerank(
        &self,
        reranker: &dyn CompletionApi,
        mood_query: &str,
        candidates: &[TrackWithNames],
        max_tracks: usize,
    ) -> Option<Vec<i64>> {
        let prompt = render_rerank_prompt(mood_query, candidates, max_tracks);

        let response = retry::with_retry("playlist rerank", || {
            reranker.complete(&prompt, RERANK_TEMPERATURE, RERANK_MAX_TOKENS)
        })
        .await;

        match response {
            Ok(text) => {
                let ids = parse_id_list(&text, candidates);
                if ids.is_empty() {
                    tracing::warn!("Reranker returned nothing usable, using similarity order");
                    None
                } else {
                    Some(ids)
                }
            }
            Err(e) => {
                tracing::warn!("Reranker failed ({}), using similarity order", e);
                None
            }
        }
    }
}

fn render_rerank_prompt(
    mood_query: &str,
    candidates: &[TrackWithNames],
    max_tracks: usize,
) -> String {
    let listing: Vec<Value> = candidates
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "title": t.title,
                "artist": t.artist_name,
                "genre": t.genre,
                "tags": t.tags,
            })
        })
        .collect();
    let candidates_json =
        serde_json::to_string_pretty(&listing).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a music curator building a playlist for this mood: "{mood_query}"

From the candidate songs below, pick the {max_tracks} best fits and order them
for a coherent listening flow.

Candidates:

{candidates_json}

Return ONLY a JSON array of the chosen track IDs, best first, at most {max_tracks} entries."#
    )
}

/// Parse the reranker's id array, dropping ids that are not in the
/// candidate pool.
fn parse_id_list(response: &str, candidates: &[TrackWithNames]) -> Vec<i64> {
    let cleaned = clean_json_response(response);
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&cleaned) else {
        return vec![];
    };

    let known: HashSet<i64> = candidates.iter().map(|t| t.id).collect();
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|id| known.contains(id) && seen.insert(*id))
        .collect()
}

/// Persist a generated playlist, optionally pushing it to the remote
/// service and recording the remote key.
pub async fn save_playlist(
    pool: &SqlitePool,
    name: &str,
    tracks: &[PlaylistTrack],
    mood_query: &str,
    description: Option<&str>,
    remote: Option<&dyn MediaServerApi>,
) -> Result<i64> {
    let track_ids: Vec<i64> = tracks.iter().map(|t| t.id).collect();
    let playlist_id =
        db::create_playlist(pool, name, description, Some(mood_query), true, &track_ids).await?;

    if let Some(server) = remote {
        let keys: Vec<String> = tracks.iter().map(|t| t.external_key.clone()).collect();
        match server.create_playlist(name, &keys, description).await {
            Ok(remote_key) => {
                db::set_playlist_external_key(pool, playlist_id, &remote_key).await?;
                tracing::info!("Created remote playlist {:?} as {}", name, remote_key);
            }
            Err(e) => tracing::warn!("Failed to create remote playlist {:?}: {}", name, e),
        }
    }

    Ok(playlist_id)
}

/// Export a saved playlist as an extended M3U file.
///
/// Each track becomes an `#EXTINF` line ("artist - title" with the duration)
/// followed by a stream URL on the media server.
pub async fn export_m3u(
    pool: &SqlitePool,
    playlist_id: i64,
    path: &Path,
    server_url: &str,
) -> Result<()> {
    let tracks = db::playlist_tracks(pool, playlist_id).await?;
    if tracks.is_empty() {
        return Err(Error::playlist(format!(
            "playlist {} has no tracks to export",
            playlist_id
        )));
    }

    let base = server_url.trim_end_matches('/');
    let mut file = std::fs::File::create(path)?;
    let mut writer = m3u::Writer::new_ext(&mut file)?;
    for track in &tracks {
        let url = format!("{}/library/metadata/{}", base, track.external_key);
        let entry = m3u::url_entry(&url)
            .map_err(|e| Error::playlist(format!("invalid stream url {:?}: {}", url, e)))?
            .extend(
                track.duration.unwrap_or(-1) as f64,
                format!("{} - {}", track.artist_name, track.title),
            );
        writer.write_entry(&entry)?;
    }

    tracing::info!("Exported {} tracks to {:?}", tracks.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::traits::mocks::MockCompletion;
    use crate::ai::ProviderError;
    use crate::remote::traits::mocks::MockMediaServer;
    use crate::test_utils::{new_album, new_artist, new_track, temp_db};
    use async_trait::async_trait;
    use tempfile::TempDir;

    const DIM: usize = 384;

    /// Embedder that maps every text to a constant vector.
    struct FlatEmbedder {
        value: f32,
    }

    #[async_trait]
    impl EmbeddingApi for FlatEmbedder {
        async fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
            Ok(vec![self.value; DIM])
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Five tracks whose vectors sit at ascending offsets from 0.10.
    async fn seeded_library(pool: &SqlitePool) -> (Vec<i64>, TrackIndex) {
        let artist_id = db::upsert_artist(pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = db::upsert_album(pool, &new_album("al1", "Album", artist_id)).await.unwrap();

        let mut ids = Vec::new();
        let mut entries = Vec::new();
        for i in 0..5 {
            let (id, _) = db::upsert_track(
                pool,
                &new_track(&format!("t{}", i), &format!("Song {}", i), artist_id, album_id),
            )
            .await
            .unwrap();
            ids.push(id);
            entries.push((id, vec![0.10 + 0.01 * i as f32; DIM]));
        }

        (ids, TrackIndex::build(DIM, entries).unwrap())
    }

    #[tokio::test]
    async fn test_generate_orders_by_similarity_without_reranker() {
        let (pool, _dir) = temp_db().await;
        let (ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        let playlist = generator
            .generate("calm evening", 3, 5, &TrackFilters::default(), &Reporter::disabled(), &CancelToken::new())
            .await
            .unwrap();

        // The three smallest offsets, ascending
        let got: Vec<i64> = playlist.iter().map(|t| t.id).collect();
        assert_eq!(got, vec![ids[0], ids[1], ids[2]]);
        assert!(playlist[0].similarity > playlist[1].similarity);
        assert!(playlist[1].similarity > playlist[2].similarity);
        assert_eq!(playlist[0].title, "Song 0");
        assert_eq!(playlist[0].artist, "Artist");
    }

    #[tokio::test]
    async fn test_generate_uses_reranker_order() {
        let (pool, _dir) = temp_db().await;
        let (ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        // Reranker flips the order and sneaks in an unknown id
        let reply = format!("[{}, {}, 999]", ids[2], ids[0]);
        let reranker = MockCompletion::always(&reply);
        let generator =
            PlaylistGenerator::new(&pool, &embedder, &index).with_reranker(&reranker);

        let playlist = generator
            .generate("energetic", 3, 5, &TrackFilters::default(), &Reporter::disabled(), &CancelToken::new())
            .await
            .unwrap();

        let got: Vec<i64> = playlist.iter().map(|t| t.id).collect();
        assert_eq!(got, vec![ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn test_generate_falls_back_when_reranker_fails() {
        let (pool, _dir) = temp_db().await;
        let (ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        let reranker = MockCompletion::failing(ProviderError::Auth("bad key".to_string()));
        let generator =
            PlaylistGenerator::new(&pool, &embedder, &index).with_reranker(&reranker);

        let playlist = generator
            .generate("mood", 2, 5, &TrackFilters::default(), &Reporter::disabled(), &CancelToken::new())
            .await
            .unwrap();

        let got: Vec<i64> = playlist.iter().map(|t| t.id).collect();
        assert_eq!(got, vec![ids[0], ids[1]]);
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_unusable_reply() {
        let (pool, _dir) = temp_db().await;
        let (ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        let reranker = MockCompletion::always("I would recommend some jazz.");
        let generator =
            PlaylistGenerator::new(&pool, &embedder, &index).with_reranker(&reranker);

        let playlist = generator
            .generate("mood", 1, 5, &TrackFilters::default(), &Reporter::disabled(), &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(playlist[0].id, ids[0]);
    }

    #[tokio::test]
    async fn test_generate_dedups_same_title_and_artist() {
        let (pool, _dir) = temp_db().await;
        let artist_id = db::upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_a = db::upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();
        let album_b = db::upsert_album(&pool, &new_album("al2", "Live", artist_id)).await.unwrap();

        // Same song on two albums, plus a distinct one
        let (dup1, _) = db::upsert_track(&pool, &new_track("t1", "Same Song", artist_id, album_a))
            .await
            .unwrap();
        let (dup2, _) =
            db::upsert_track(&pool, &new_track("t2", "same song ", artist_id, album_b))
                .await
                .unwrap();
        let (other, _) = db::upsert_track(&pool, &new_track("t3", "Other", artist_id, album_a))
            .await
            .unwrap();

        let index = TrackIndex::build(
            DIM,
            vec![
                (dup1, vec![0.10; DIM]),
                (dup2, vec![0.11; DIM]),
                (other, vec![0.12; DIM]),
            ],
        )
        .unwrap();
        let embedder = FlatEmbedder { value: 0.10 };

        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        let playlist = generator
            .generate("mood", 5, 5, &TrackFilters::default(), &Reporter::disabled(), &CancelToken::new())
            .await
            .unwrap();

        let got: Vec<i64> = playlist.iter().map(|t| t.id).collect();
        assert_eq!(got, vec![dup1, other]);
    }

    #[tokio::test]
    async fn test_generate_respects_filters() {
        let (pool, _dir) = temp_db().await;
        let (ids, index) = seeded_library(&pool).await;
        // Only the farthest track gets the genre
        sqlx::query("UPDATE tracks SET genre = 'Jazz' WHERE id = ?")
            .bind(ids[4])
            .execute(&pool)
            .await
            .unwrap();
        let embedder = FlatEmbedder { value: 0.10 };

        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        let filters = TrackFilters {
            genre: Some("Jazz".to_string()),
            ..Default::default()
        };
        let playlist = generator.generate("mood", 3, 5, &filters, &Reporter::disabled(), &CancelToken::new()).await.unwrap();

        let got: Vec<i64> = playlist.iter().map(|t| t.id).collect();
        assert_eq!(got, vec![ids[4]]);
    }

    #[tokio::test]
    async fn test_generate_empty_when_filters_match_nothing() {
        let (pool, _dir) = temp_db().await;
        let (_ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        let filters = TrackFilters {
            genre: Some("Polka".to_string()),
            ..Default::default()
        };
        let playlist = generator.generate("mood", 3, 5, &filters, &Reporter::disabled(), &CancelToken::new()).await.unwrap();

        assert!(playlist.is_empty());
    }

    #[tokio::test]
    async fn test_generate_reports_stage_progress() {
        let (pool, _dir) = temp_db().await;
        let (_ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        let (reporter, rx) = Reporter::channel();
        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        generator
            .generate("mood", 3, 5, &TrackFilters::default(), &reporter, &CancelToken::new())
            .await
            .unwrap();
        drop(reporter);

        let events: Vec<_> = rx.iter().collect();
        assert!(events.len() >= 4);
        assert_eq!(events[0].fraction, 0.0);
        assert_eq!(events.last().unwrap().fraction, 1.0);
        assert!(events.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    }

    #[tokio::test]
    async fn test_generate_observes_cancellation() {
        let (pool, _dir) = temp_db().await;
        let (_ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };

        let cancel = CancelToken::new();
        cancel.cancel();

        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        let result = generator
            .generate("mood", 3, 5, &TrackFilters::default(), &Reporter::disabled(), &cancel)
            .await;

        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_save_playlist_persists_and_pushes_remote() {
        let (pool, _dir) = temp_db().await;
        let (ids, index) = seeded_library(&pool).await;
        let embedder = FlatEmbedder { value: 0.10 };
        let generator = PlaylistGenerator::new(&pool, &embedder, &index);
        let tracks = generator
            .generate("calm", 3, 5, &TrackFilters::default(), &Reporter::disabled(), &CancelToken::new())
            .await
            .unwrap();

        let server = MockMediaServer::empty();
        let playlist_id = save_playlist(
            &pool,
            "Calm Evening",
            &tracks,
            "calm",
            Some("AI generated"),
            Some(&server),
        )
        .await
        .unwrap();

        let stored = db::playlist_tracks(&pool, playlist_id).await.unwrap();
        let got: Vec<i64> = stored.iter().map(|t| t.id).collect();
        assert_eq!(got, vec![ids[0], ids[1], ids[2]]);

        let saved = db::get_playlist_by_name(&pool, "Calm Evening").await.unwrap().unwrap();
        assert!(saved.external_key.is_some());
        assert_eq!(saved.mood_query.as_deref(), Some("calm"));

        let created = server.created_playlists.lock().unwrap();
        assert_eq!(created[0].1, vec!["t0", "t1", "t2"]);
    }

    #[tokio::test]
    async fn test_export_m3u_writes_extended_entries() {
        let (pool, _dir) = temp_db().await;
        let (ids, _index) = seeded_library(&pool).await;
        let playlist_id = db::create_playlist(&pool, "Mix", None, None, true, &ids[..2])
            .await
            .unwrap();

        let out = TempDir::new().unwrap();
        let path = out.path().join("mix.m3u");
        export_m3u(&pool, playlist_id, &path, "http://music.local:32400/")
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("#EXTM3U"));
        assert!(contents.contains("#EXTINF:200,Artist - Song 0"));
        assert!(contents.contains("http://music.local:32400/library/metadata/t0"));
        assert!(contents.contains("Song 1"));
    }

    #[tokio::test]
    async fn test_export_m3u_empty_playlist_is_an_error() {
        let (pool, _dir) = temp_db().await;
        let playlist_id = db::create_playlist(&pool, "Empty", None, None, false, &[])
            .await
            .unwrap();

        let out = TempDir::new().unwrap();
        let result = export_m3u(&pool, playlist_id, &out.path().join("e.m3u"), "http://x").await;
        assert!(matches!(result, Err(Error::Playlist(_))));
    }
}
