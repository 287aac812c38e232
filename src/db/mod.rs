//! Database access layer using SQLx with SQLite.
//!
//! Owns the library mirror: artists, albums, tracks (with sticky AI
//! enrichment), embeddings, playlists and sync history. Schema lives in
//! `migrations/` and is applied on startup.
//!
//! Upserts key on the remote service's external key so database ids stay
//! stable across repeated syncs; embeddings and playlist memberships
//! reference those ids and must never be invalidated by a re-sync.

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::model::{merge_track, needs_update, NewAlbum, NewArtist, NewTrack, Track};

/// External key of the sentinel artist used when an album's artist
/// reference cannot be resolved.
pub const UNKNOWN_ARTIST_KEY: &str = "__unknown__";

/// Initialize the database, creating it and running migrations if needed.
pub async fn init_db(db_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}", db_path.display());

    if !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
        tracing::info!("Creating database at {:?}", db_path);
        Sqlite::create_database(&db_url).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Outcome of a track upsert, used for sync change counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
    Unchanged,
}

// ============================================================================
// Artists & Albums
// ============================================================================

/// Get or create the unknown-artist sentinel, returning its id.
pub async fn ensure_unknown_artist(pool: &SqlitePool) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO artists (external_key, name)
        VALUES (?, 'Unknown Artist')
        ON CONFLICT(external_key) DO UPDATE SET name = name
        RETURNING id
        "#,
    )
    .bind(UNKNOWN_ARTIST_KEY)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Insert or update an artist by external key, returning its id.
pub async fn upsert_artist(pool: &SqlitePool, artist: &NewArtist) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO artists (external_key, name, genre, bio)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(external_key) DO UPDATE SET
            name = excluded.name,
            genre = excluded.genre,
            bio = excluded.bio
        RETURNING id
        "#,
    )
    .bind(&artist.external_key)
    .bind(&artist.name)
    .bind(&artist.genre)
    .bind(&artist.bio)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Insert or update an album by external key, returning its id.
pub async fn upsert_album(pool: &SqlitePool, album: &NewAlbum) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO albums (external_key, title, artist_id, year, genre, cover_url)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_key) DO UPDATE SET
            title = excluded.title,
            artist_id = excluded.artist_id,
            year = excluded.year,
            genre = excluded.genre,
            cover_url = excluded.cover_url
        RETURNING id
        "#,
    )
    .bind(&album.external_key)
    .bind(&album.title)
    .bind(album.artist_id)
    .bind(album.year)
    .bind(&album.genre)
    .bind(&album.cover_url)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

// ============================================================================
// Tracks
// ============================================================================

/// Insert or update a track by external key.
///
/// Applies the sticky-enrichment merge: an incoming record without tags,
/// environments or instruments never erases stored ones. Returns the stable
/// id plus whether the row was added, materially updated (per
/// [`needs_update`]) or unchanged.
pub async fn upsert_track(
    pool: &SqlitePool,
    track: &NewTrack,
) -> Result<(i64, UpsertOutcome)> {
    let existing = get_track_by_external_key(pool, &track.external_key).await?;

    match existing {
        None => {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO tracks
                    (external_key, title, artist_id, album_id, duration, genre,
                     year, rating, play_count, last_played, tags, environments,
                     instruments)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                RETURNING id
                "#,
            )
            .bind(&track.external_key)
            .bind(&track.title)
            .bind(track.artist_id)
            .bind(track.album_id)
            .bind(track.duration)
            .bind(&track.genre)
            .bind(track.year)
            .bind(track.rating)
            .bind(track.play_count)
            .bind(&track.last_played)
            .bind(&track.tags)
            .bind(&track.environments)
            .bind(&track.instruments)
            .fetch_one(pool)
            .await?;

            Ok((id, UpsertOutcome::Added))
        }
        Some(existing) => {
            let merged = merge_track(&existing, track);
            let changed = needs_update(&existing, track);

            sqlx::query(
                r#"
                UPDATE tracks SET
                    title = ?, artist_id = ?, album_id = ?, duration = ?,
                    genre = ?, year = ?, rating = ?, play_count = ?,
                    last_played = ?, tags = ?, environments = ?, instruments = ?
                WHERE id = ?
                "#,
            )
            .bind(&merged.title)
            .bind(merged.artist_id)
            .bind(merged.album_id)
            .bind(merged.duration)
            .bind(&merged.genre)
            .bind(merged.year)
            .bind(merged.rating)
            .bind(merged.play_count)
            .bind(&merged.last_played)
            .bind(&merged.tags)
            .bind(&merged.environments)
            .bind(&merged.instruments)
            .bind(existing.id)
            .execute(pool)
            .await?;

            let outcome = if changed {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Unchanged
            };
            Ok((existing.id, outcome))
        }
    }
}

/// Look up a track by its remote external key.
pub async fn get_track_by_external_key(
    pool: &SqlitePool,
    external_key: &str,
) -> Result<Option<Track>> {
    let track = sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE external_key = ?")
        .bind(external_key)
        .fetch_optional(pool)
        .await?;

    Ok(track)
}

/// Look up a track by id.
pub async fn get_track(pool: &SqlitePool, id: i64) -> Result<Option<Track>> {
    let track = sqlx::query_as::<_, Track>("SELECT * FROM tracks WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(track)
}

/// Map of every stored track's external key to its database id.
pub async fn track_key_map(pool: &SqlitePool) -> Result<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT external_key, id FROM tracks").fetch_all(pool).await?;

    Ok(rows.into_iter().collect())
}

/// Delete tracks by id. Embeddings and playlist memberships cascade.
pub async fn delete_tracks(pool: &SqlitePool, ids: &[i64]) -> Result<u64> {
    let mut deleted = 0;
    for id in ids {
        let result = sqlx::query("DELETE FROM tracks WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        deleted += result.rows_affected();
    }
    Ok(deleted)
}

/// Store the AI-generated enrichment for a track.
pub async fn update_track_enrichment(
    pool: &SqlitePool,
    track_id: i64,
    tags: Option<&str>,
    environments: Option<&str>,
    instruments: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE tracks SET tags = ?, environments = ?, instruments = ? WHERE id = ?")
        .bind(tags)
        .bind(environments)
        .bind(instruments)
        .bind(track_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ============================================================================
// Track views
// ============================================================================

/// A track joined with its artist and album names, for display, prompt
/// rendering and embedding text.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackWithNames {
    pub id: i64,
    pub external_key: String,
    pub title: String,
    pub artist_name: String,
    pub album_title: String,
    pub duration: Option<i64>,
    pub genre: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<f64>,
    pub tags: Option<String>,
    pub environments: Option<String>,
    pub instruments: Option<String>,
}

impl TrackWithNames {
    /// Text representation fed to the embedding provider.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![format!("{} by {}", self.title, self.artist_name)];
        parts.push(format!("Album: {}", self.album_title));
        if let Some(genre) = &self.genre {
            parts.push(format!("Genre: {}", genre));
        }
        if let Some(year) = self.year {
            parts.push(format!("Year: {}", year));
        }
        if let Some(tags) = self.tags.as_deref().filter(|t| !t.is_empty()) {
            parts.push(format!("Tags: {}", tags));
        }
        if let Some(envs) = self.environments.as_deref().filter(|e| !e.is_empty()) {
            parts.push(format!("Environments: {}", envs));
        }
        if let Some(instr) = self.instruments.as_deref().filter(|i| !i.is_empty()) {
            parts.push(format!("Instruments: {}", instr));
        }
        parts.join(". ")
    }
}

const TRACK_VIEW_SQL: &str = r#"
    SELECT
        t.id, t.external_key, t.title,
        COALESCE(ar.name, 'Unknown Artist') AS artist_name,
        COALESCE(al.title, 'Unknown Album') AS album_title,
        t.duration, t.genre, t.year, t.rating,
        t.tags, t.environments, t.instruments
    FROM tracks t
    LEFT JOIN artists ar ON t.artist_id = ar.id
    LEFT JOIN albums al ON t.album_id = al.id
"#;

/// All tracks with artist/album names, ordered by id.
pub async fn list_tracks(pool: &SqlitePool) -> Result<Vec<TrackWithNames>> {
    let rows = sqlx::query_as::<_, TrackWithNames>(&format!("{} ORDER BY t.id", TRACK_VIEW_SQL))
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Tracks by id, preserving the requested order.
pub async fn get_tracks_with_names(
    pool: &SqlitePool,
    ids: &[i64],
) -> Result<Vec<TrackWithNames>> {
    let mut by_id = HashMap::new();
    for id in ids {
        let row =
            sqlx::query_as::<_, TrackWithNames>(&format!("{} WHERE t.id = ?", TRACK_VIEW_SQL))
                .bind(id)
                .fetch_optional(pool)
                .await?;
        if let Some(row) = row {
            by_id.insert(*id, row);
        }
    }

    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Tracks that have no generated tags yet.
pub async fn tracks_without_tags(pool: &SqlitePool) -> Result<Vec<TrackWithNames>> {
    let rows = sqlx::query_as::<_, TrackWithNames>(&format!(
        "{} WHERE t.tags IS NULL OR t.tags = '' ORDER BY t.id",
        TRACK_VIEW_SQL
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ============================================================================
// Filtering
// ============================================================================

/// Conjunctive track filters for playlist generation. Empty filters match
/// every track.
#[derive(Debug, Clone, Default)]
pub struct TrackFilters {
    /// Exact genre match
    pub genre: Option<String>,
    pub year_min: Option<i64>,
    pub year_max: Option<i64>,
    /// Minimum rating (inclusive)
    pub min_rating: Option<f64>,
    /// Environments list must contain this value
    pub environment: Option<String>,
    /// Instruments list must contain this value
    pub instrument: Option<String>,
}

impl TrackFilters {
    pub fn is_empty(&self) -> bool {
        self.genre.is_none()
            && self.year_min.is_none()
            && self.year_max.is_none()
            && self.min_rating.is_none()
            && self.environment.is_none()
            && self.instrument.is_none()
    }
}

fn list_contains(stored: Option<&str>, wanted: &str) -> bool {
    let wanted = wanted.trim().to_lowercase();
    stored
        .unwrap_or_default()
        .split(',')
        .any(|item| item.trim().to_lowercase() == wanted)
}

/// IDs of tracks matching all given filters.
///
/// Scalar conditions run in SQL; list-membership conditions (environments,
/// instruments) are checked against the split comma lists in Rust.
pub async fn filter_track_ids(pool: &SqlitePool, filters: &TrackFilters) -> Result<Vec<i64>> {
    let rows: Vec<(i64, Option<String>, Option<String>)> = sqlx::query_as(
        r#"
        SELECT id, environments, instruments FROM tracks
        WHERE (?1 IS NULL OR genre = ?1)
          AND (?2 IS NULL OR year >= ?2)
          AND (?3 IS NULL OR year <= ?3)
          AND (?4 IS NULL OR rating >= ?4)
        ORDER BY id
        "#,
    )
    .bind(&filters.genre)
    .bind(filters.year_min)
    .bind(filters.year_max)
    .bind(filters.min_rating)
    .fetch_all(pool)
    .await?;

    let ids = rows
        .into_iter()
        .filter(|(_, envs, instruments)| {
            let env_ok = filters
                .environment
                .as_deref()
                .map_or(true, |wanted| list_contains(envs.as_deref(), wanted));
            let instr_ok = filters
                .instrument
                .as_deref()
                .map_or(true, |wanted| list_contains(instruments.as_deref(), wanted));
            env_ok && instr_ok
        })
        .map(|(id, _, _)| id)
        .collect();

    Ok(ids)
}

// ============================================================================
// Embeddings
// ============================================================================

/// Insert or replace the embedding for a track. The vector is stored as a
/// JSON array.
pub async fn upsert_embedding(
    pool: &SqlitePool,
    track_id: i64,
    model: &str,
    vector: &[f32],
) -> Result<()> {
    let encoded = serde_json::to_string(vector)
        .map_err(|e| crate::error::Error::index(format!("encode embedding: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO embeddings (track_id, model, dimension, vector)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(track_id) DO UPDATE SET
            model = excluded.model,
            dimension = excluded.dimension,
            vector = excluded.vector
        "#,
    )
    .bind(track_id)
    .bind(model)
    .bind(vector.len() as i64)
    .bind(encoded)
    .execute(pool)
    .await?;

    Ok(())
}

/// All stored embeddings as (track id, vector) pairs.
pub async fn all_embeddings(pool: &SqlitePool) -> Result<Vec<(i64, Vec<f32>)>> {
    let rows: Vec<(i64, String)> =
        sqlx::query_as("SELECT track_id, vector FROM embeddings ORDER BY track_id")
            .fetch_all(pool)
            .await?;

    let mut result = Vec::with_capacity(rows.len());
    for (track_id, encoded) in rows {
        let vector: Vec<f32> = serde_json::from_str(&encoded)
            .map_err(|e| crate::error::Error::index(format!("decode embedding: {}", e)))?;
        result.push((track_id, vector));
    }

    Ok(result)
}

/// IDs of tracks that have no stored embedding.
pub async fn tracks_without_embeddings(pool: &SqlitePool) -> Result<Vec<i64>> {
    let ids: Vec<(i64,)> = sqlx::query_as(
        "SELECT t.id FROM tracks t LEFT JOIN embeddings e ON e.track_id = t.id
         WHERE e.track_id IS NULL ORDER BY t.id",
    )
    .fetch_all(pool)
    .await?;

    Ok(ids.into_iter().map(|(id,)| id).collect())
}

// ============================================================================
// Sync history
// ============================================================================

/// Record the outcome of a sync pass.
pub async fn insert_sync_record(
    pool: &SqlitePool,
    started_at: &str,
    added: i64,
    updated: i64,
    removed: i64,
    status: &str,
) -> Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sync_history (started_at, tracks_added, tracks_updated, tracks_removed, status)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(started_at)
    .bind(added)
    .bind(updated)
    .bind(removed)
    .bind(status)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Start time of the most recent successful sync, if any.
pub async fn last_successful_sync(pool: &SqlitePool) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        "SELECT started_at FROM sync_history WHERE status = 'success'
         ORDER BY started_at DESC LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(ts,)| ts))
}

// ============================================================================
// Playlists
// ============================================================================

/// A saved playlist.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Playlist {
    pub id: i64,
    pub external_key: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub created_by_ai: i64,
    pub mood_query: Option<String>,
    pub created_at: String,
}

/// Persist a playlist with explicit track positions, in one transaction.
pub async fn create_playlist(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    mood_query: Option<&str>,
    created_by_ai: bool,
    track_ids: &[i64],
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let playlist_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO playlists (name, description, created_by_ai, mood_query)
        VALUES (?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(created_by_ai as i64)
    .bind(mood_query)
    .fetch_one(&mut *tx)
    .await?;

    for (position, track_id) in track_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO playlist_tracks (playlist_id, track_id, position) VALUES (?, ?, ?)",
        )
        .bind(playlist_id)
        .bind(track_id)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(playlist_id)
}

/// Store the remote service's key for a playlist after pushing it.
pub async fn set_playlist_external_key(
    pool: &SqlitePool,
    playlist_id: i64,
    external_key: &str,
) -> Result<()> {
    sqlx::query("UPDATE playlists SET external_key = ? WHERE id = ?")
        .bind(external_key)
        .bind(playlist_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// All saved playlists, newest first.
pub async fn list_playlists(pool: &SqlitePool) -> Result<Vec<Playlist>> {
    let rows =
        sqlx::query_as::<_, Playlist>("SELECT * FROM playlists ORDER BY created_at DESC, id DESC")
            .fetch_all(pool)
            .await?;

    Ok(rows)
}

/// Look up a playlist by name.
pub async fn get_playlist_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Playlist>> {
    let row = sqlx::query_as::<_, Playlist>("SELECT * FROM playlists WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Tracks of a playlist in stored position order.
pub async fn playlist_tracks(pool: &SqlitePool, playlist_id: i64) -> Result<Vec<TrackWithNames>> {
    let rows = sqlx::query_as::<_, TrackWithNames>(&format!(
        r#"{}
        INNER JOIN playlist_tracks pt ON pt.track_id = t.id
        WHERE pt.playlist_id = ?
        ORDER BY pt.position
        "#,
        TRACK_VIEW_SQL
    ))
    .bind(playlist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{new_album, new_artist, new_track, temp_db};

    #[tokio::test]
    async fn test_init_creates_schema() {
        let (pool, _dir) = temp_db().await;
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tracks")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_upsert_artist_is_stable() {
        let (pool, _dir) = temp_db().await;

        let id1 = upsert_artist(&pool, &new_artist("a1", "Miles Davis")).await.unwrap();
        let mut renamed = new_artist("a1", "Miles Davis");
        renamed.genre = Some("Jazz".to_string());
        let id2 = upsert_artist(&pool, &renamed).await.unwrap();

        assert_eq!(id1, id2);
    }

    #[tokio::test]
    async fn test_unknown_artist_sentinel_created_once() {
        let (pool, _dir) = temp_db().await;

        let id1 = ensure_unknown_artist(&pool).await.unwrap();
        let id2 = ensure_unknown_artist(&pool).await.unwrap();
        assert_eq!(id1, id2);

        let (name,): (String,) = sqlx::query_as("SELECT name FROM artists WHERE id = ?")
            .bind(id1)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(name, "Unknown Artist");
    }

    #[tokio::test]
    async fn test_track_id_stable_across_syncs() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();

        let track = new_track("t1", "Song", artist_id, album_id);
        let (id1, outcome1) = upsert_track(&pool, &track).await.unwrap();
        assert_eq!(outcome1, UpsertOutcome::Added);

        let (id2, outcome2) = upsert_track(&pool, &track).await.unwrap();
        assert_eq!(id1, id2);
        assert_eq!(outcome2, UpsertOutcome::Unchanged);

        let mut changed = track.clone();
        changed.play_count = 5;
        let (id3, outcome3) = upsert_track(&pool, &changed).await.unwrap();
        assert_eq!(id1, id3);
        assert_eq!(outcome3, UpsertOutcome::Updated);
    }

    #[tokio::test]
    async fn test_upsert_preserves_enrichment() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();

        let (id, _) = upsert_track(&pool, &new_track("t1", "Song", artist_id, album_id))
            .await
            .unwrap();
        update_track_enrichment(&pool, id, Some("chill,mellow"), Some("study"), Some("piano"))
            .await
            .unwrap();

        // Re-sync with a record that carries no enrichment
        let mut incoming = new_track("t1", "Song", artist_id, album_id);
        incoming.play_count = 3;
        upsert_track(&pool, &incoming).await.unwrap();

        let stored = get_track(&pool, id).await.unwrap().unwrap();
        assert_eq!(stored.tags.as_deref(), Some("chill,mellow"));
        assert_eq!(stored.environments.as_deref(), Some("study"));
        assert_eq!(stored.instruments.as_deref(), Some("piano"));
        assert_eq!(stored.play_count, 3);
    }

    #[tokio::test]
    async fn test_delete_tracks_cascades_embeddings() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();
        let (id, _) = upsert_track(&pool, &new_track("t1", "Song", artist_id, album_id))
            .await
            .unwrap();

        upsert_embedding(&pool, id, "test-model", &[0.1, 0.2]).await.unwrap();
        assert_eq!(all_embeddings(&pool).await.unwrap().len(), 1);

        let deleted = delete_tracks(&pool, &[id]).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(all_embeddings(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embedding_roundtrip_and_replace() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();
        let (id, _) = upsert_track(&pool, &new_track("t1", "Song", artist_id, album_id))
            .await
            .unwrap();

        upsert_embedding(&pool, id, "m", &[1.0, 2.0, 3.0]).await.unwrap();
        upsert_embedding(&pool, id, "m", &[4.0, 5.0, 6.0]).await.unwrap();

        let stored = all_embeddings(&pool).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].1, vec![4.0, 5.0, 6.0]);
    }

    #[tokio::test]
    async fn test_filter_track_ids() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();

        let mut jazz = new_track("t1", "Jazz Tune", artist_id, album_id);
        jazz.genre = Some("Jazz".to_string());
        jazz.year = Some(1959);
        jazz.rating = Some(4.5);
        let (jazz_id, _) = upsert_track(&pool, &jazz).await.unwrap();
        update_track_enrichment(&pool, jazz_id, None, Some("study,focus"), Some("piano"))
            .await
            .unwrap();

        let mut rock = new_track("t2", "Rock Tune", artist_id, album_id);
        rock.genre = Some("Rock".to_string());
        rock.year = Some(1985);
        rock.rating = Some(3.0);
        let (rock_id, _) = upsert_track(&pool, &rock).await.unwrap();

        // No filters matches everything
        let all = filter_track_ids(&pool, &TrackFilters::default()).await.unwrap();
        assert_eq!(all, vec![jazz_id, rock_id]);

        let genre = TrackFilters {
            genre: Some("Jazz".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_track_ids(&pool, &genre).await.unwrap(), vec![jazz_id]);

        let years = TrackFilters {
            year_min: Some(1980),
            year_max: Some(1990),
            ..Default::default()
        };
        assert_eq!(filter_track_ids(&pool, &years).await.unwrap(), vec![rock_id]);

        let rating = TrackFilters {
            min_rating: Some(4.0),
            ..Default::default()
        };
        assert_eq!(filter_track_ids(&pool, &rating).await.unwrap(), vec![jazz_id]);

        let env = TrackFilters {
            environment: Some("Focus".to_string()),
            ..Default::default()
        };
        assert_eq!(filter_track_ids(&pool, &env).await.unwrap(), vec![jazz_id]);

        // Conjunction that matches nothing
        let none = TrackFilters {
            genre: Some("Jazz".to_string()),
            year_min: Some(1980),
            ..Default::default()
        };
        assert!(filter_track_ids(&pool, &none).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tracks_without_tags() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();

        let (tagged, _) = upsert_track(&pool, &new_track("t1", "Tagged", artist_id, album_id))
            .await
            .unwrap();
        update_track_enrichment(&pool, tagged, Some("chill"), None, None).await.unwrap();
        upsert_track(&pool, &new_track("t2", "Untagged", artist_id, album_id))
            .await
            .unwrap();

        let untagged = tracks_without_tags(&pool).await.unwrap();
        assert_eq!(untagged.len(), 1);
        assert_eq!(untagged[0].title, "Untagged");
    }

    #[tokio::test]
    async fn test_embedding_text_includes_enrichment() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Miles Davis")).await.unwrap();
        let album_id =
            upsert_album(&pool, &new_album("al1", "Kind of Blue", artist_id)).await.unwrap();
        let mut track = new_track("t1", "So What", artist_id, album_id);
        track.genre = Some("Jazz".to_string());
        let (id, _) = upsert_track(&pool, &track).await.unwrap();
        update_track_enrichment(&pool, id, Some("cool,modal"), Some("late night"), None)
            .await
            .unwrap();

        let rows = get_tracks_with_names(&pool, &[id]).await.unwrap();
        let text = rows[0].embedding_text();
        assert!(text.starts_with("So What by Miles Davis"));
        assert!(text.contains("Album: Kind of Blue"));
        assert!(text.contains("Genre: Jazz"));
        assert!(text.contains("Tags: cool,modal"));
        assert!(text.contains("Environments: late night"));
        assert!(!text.contains("Instruments"));
    }

    #[tokio::test]
    async fn test_sync_history() {
        let (pool, _dir) = temp_db().await;

        assert!(last_successful_sync(&pool).await.unwrap().is_none());

        insert_sync_record(&pool, "2025-01-01T00:00:00Z", 10, 0, 0, "success")
            .await
            .unwrap();
        insert_sync_record(&pool, "2025-01-02T00:00:00Z", 0, 0, 0, "failed")
            .await
            .unwrap();

        let last = last_successful_sync(&pool).await.unwrap();
        assert_eq!(last.as_deref(), Some("2025-01-01T00:00:00Z"));
    }

    #[tokio::test]
    async fn test_playlist_positions_preserved() {
        let (pool, _dir) = temp_db().await;
        let artist_id = upsert_artist(&pool, &new_artist("a1", "Artist")).await.unwrap();
        let album_id = upsert_album(&pool, &new_album("al1", "Album", artist_id)).await.unwrap();

        let mut ids = vec![];
        for i in 0..3 {
            let (id, _) = upsert_track(
                &pool,
                &new_track(&format!("t{}", i), &format!("Song {}", i), artist_id, album_id),
            )
            .await
            .unwrap();
            ids.push(id);
        }

        // Insert in reverse order; positions must win over ids
        let reversed: Vec<i64> = ids.iter().rev().copied().collect();
        let playlist_id =
            create_playlist(&pool, "Evening", None, Some("mellow evening"), true, &reversed)
                .await
                .unwrap();

        let tracks = playlist_tracks(&pool, playlist_id).await.unwrap();
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Song 2", "Song 1", "Song 0"]);

        set_playlist_external_key(&pool, playlist_id, "remote-9").await.unwrap();
        let stored = get_playlist_by_name(&pool, "Evening").await.unwrap().unwrap();
        assert_eq!(stored.external_key.as_deref(), Some("remote-9"));
        assert_eq!(stored.created_by_ai, 1);
    }
}
