//! Approximate nearest-neighbor index over track embeddings.
//!
//! Wraps `hnsw_rs::Hnsw<f32, DistL2>` with a track-id ↔ internal-id mapping
//! and JSON sidecar persistence. The stored embeddings are the source of
//! truth; loading rebuilds the graph from the sidecar rather than
//! deserializing graph internals. Saves replace the sidecar atomically
//! (tmp file + rename).
//!
//! Search reports similarity as `1 / (1 + L2 distance)`: 1.0 for an exact
//! match, falling toward 0 with distance, higher = closer.

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

const MAX_NB_CONNECTION: usize = 16;
const MAX_LAYER: usize = 16;
const EF_CONSTRUCTION: usize = 200;
const EF_SEARCH: usize = 50;

/// Sidecar file contents: everything needed to rebuild the graph.
#[derive(Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    entries: Vec<(i64, Vec<f32>)>,
}

/// In-memory ANN index over track embeddings.
pub struct TrackIndex {
    hnsw: Hnsw<'static, f32, DistL2>,
    dimension: usize,
    /// Internal id → track id
    track_ids: Vec<i64>,
    /// Source vectors, kept for persistence
    vectors: Vec<Vec<f32>>,
}

impl TrackIndex {
    /// Build an index from (track id, vector) pairs.
    pub fn build(dimension: usize, entries: Vec<(i64, Vec<f32>)>) -> Result<Self> {
        for (track_id, vector) in &entries {
            if vector.len() != dimension {
                return Err(Error::index(format!(
                    "dimension mismatch for track {}: expected {}, got {}",
                    track_id,
                    dimension,
                    vector.len()
                )));
            }
        }

        let hnsw = Hnsw::new(
            MAX_NB_CONNECTION,
            entries.len().max(1024),
            MAX_LAYER,
            EF_CONSTRUCTION,
            DistL2,
        );

        let mut seen = HashMap::new();
        let mut track_ids = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());
        for (track_id, vector) in entries {
            // Last write wins for duplicate ids
            if seen.insert(track_id, track_ids.len()).is_none() {
                track_ids.push(track_id);
                vectors.push(vector);
            } else {
                let slot = seen[&track_id];
                vectors[slot] = vector;
            }
        }

        let batch: Vec<(&Vec<f32>, usize)> = vectors
            .iter()
            .enumerate()
            .map(|(internal, vector)| (vector, internal))
            .collect();
        hnsw.parallel_insert(&batch);

        Ok(Self {
            hnsw,
            dimension,
            track_ids,
            vectors,
        })
    }

    /// Number of indexed tracks.
    pub fn len(&self) -> usize {
        self.track_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.track_ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// K-nearest search.
    ///
    /// When `allowed` is given, only those track ids can appear in the
    /// result. Results are (track id, similarity) pairs, closest first.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        allowed: Option<&HashSet<i64>>,
    ) -> Result<Vec<(i64, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::index(format!(
                "query dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }
        if self.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let ef = EF_SEARCH.max(k);
        let neighbours = match allowed {
            None => self.hnsw.search(query, k, ef),
            Some(allowed) => {
                // Concrete closure so the blanket FilterT impl applies
                let track_ids = &self.track_ids;
                let filter = |internal: &usize| -> bool {
                    track_ids
                        .get(*internal)
                        .is_some_and(|id| allowed.contains(id))
                };
                self.hnsw.search_filter(query, k, ef, Some(&filter))
            }
        };

        Ok(neighbours
            .into_iter()
            .filter_map(|n| {
                self.track_ids
                    .get(n.d_id)
                    .map(|&track_id| (track_id, 1.0 / (1.0 + n.distance)))
            })
            .collect())
    }

    /// Write the sidecar file, replacing any previous one atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = IndexFile {
            dimension: self.dimension,
            entries: self
                .track_ids
                .iter()
                .copied()
                .zip(self.vectors.iter().cloned())
                .collect(),
        };
        let json = serde_json::to_string(&file)
            .map_err(|e| Error::index(format!("serialize index: {}", e)))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        fs::rename(&tmp_path, path)?;

        tracing::info!("Saved vector index ({} tracks) to {:?}", self.len(), path);
        Ok(())
    }

    /// Rebuild an index from a sidecar file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let file: IndexFile = serde_json::from_str(&json)
            .map_err(|e| Error::index(format!("parse index file {:?}: {}", path, e)))?;

        Self::build(file.dimension, file.entries)
    }
}
