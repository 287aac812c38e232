//! Tag generation: batched completion calls producing structured
//! enrichment per track.
//!
//! The model is asked for a strict JSON object keyed by track id. Replies
//! are repaired (code fences, trailing commas) and coerced field by field;
//! anything unusable degrades to empty lists for the affected tracks. A
//! failing batch never fails the run.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::retry;
use super::traits::CompletionApi;
use crate::progress::{CancelToken, Reporter};

/// Per-track limits on generated lists.
pub const MAX_TAGS: usize = 5;
pub const MAX_ENVIRONMENTS: usize = 3;
pub const MAX_INSTRUMENTS: usize = 3;

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 4096;

/// What the model needs to know about a track.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackDescriptor {
    pub id: i64,
    pub title: String,
    pub artist: String,
    pub genre: String,
}

/// Generated enrichment for one track. Lists are lowercased, trimmed and
/// capped at 5/3/3.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub tags: Vec<String>,
    pub environments: Vec<String>,
    pub instruments: Vec<String>,
}

impl TrackTags {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.environments.is_empty() && self.instruments.is_empty()
    }
}

pub struct TagGenerator<'a> {
    provider: &'a dyn CompletionApi,
}

impl<'a> TagGenerator<'a> {
    pub fn new(provider: &'a dyn CompletionApi) -> Self {
        Self { provider }
    }

    /// Generate tags for every track, in sequential fixed-size batches.
    ///
    /// Never fails: batches that exhaust retries or return unusable JSON
    /// map their tracks to empty tag sets. Cancellation between batches
    /// returns the results accumulated so far.
    pub async fn generate_tags(
        &self,
        tracks: &[TrackDescriptor],
        batch_size: usize,
        reporter: &Reporter,
        cancel: &CancelToken,
    ) -> HashMap<i64, TrackTags> {
        tracing::info!("Generating tags for {} tracks", tracks.len());
        let mut all_tags = HashMap::new();
        let batch_size = batch_size.max(1);
        let total = tracks.len();

        for (index, batch) in tracks.chunks(batch_size).enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!("Tag generation cancelled after {} tracks", all_tags.len());
                break;
            }

            all_tags.extend(self.generate_batch(batch).await);

            let done = (index * batch_size + batch.len()).min(total);
            reporter.report(
                done as f32 / total.max(1) as f32,
                format!("Tagged {}/{} tracks", done, total),
            );
        }

        tracing::info!("Generated tags for {} tracks", all_tags.len());
        all_tags
    }

    async fn generate_batch(&self, batch: &[TrackDescriptor]) -> HashMap<i64, TrackTags> {
        let prompt = render_prompt(batch);

        let response = retry::with_retry("tag generation", || {
            self.provider.complete(&prompt, TEMPERATURE, MAX_TOKENS)
        })
        .await;

        match response {
            Ok(text) => parse_response(&text, batch).unwrap_or_else(|e| {
                tracing::error!("Failed to parse tag response: {}", e);
                empty_results(batch)
            }),
            Err(e) => {
                tracing::error!("Failed to generate tags for batch: {}", e);
                empty_results(batch)
            }
        }
    }
}

fn empty_results(batch: &[TrackDescriptor]) -> HashMap<i64, TrackTags> {
    batch.iter().map(|t| (t.id, TrackTags::default())).collect()
}

fn render_prompt(batch: &[TrackDescriptor]) -> String {
    let tracks_json =
        serde_json::to_string_pretty(batch).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"You are a music expert helping to categorize songs with descriptive metadata.

For each song, based on its title, artist and genre, assign:
- "tags": up to {MAX_TAGS} descriptive tags (mood, energy level, activity fit, tempo feel, emotional tone)
- "environments": up to {MAX_ENVIRONMENTS} listening environments (e.g. workout, study, party, sleep, driving)
- "instruments": up to {MAX_INSTRUMENTS} prominent instruments

Rules:
1. Use lowercase, single words or hyphenated phrases
2. Be consistent with naming across songs
3. Return ONLY a JSON object mapping track IDs to objects with those three arrays

Example output format:
{{
  "1": {{"tags": ["energetic", "workout", "upbeat"], "environments": ["gym", "party"], "instruments": ["guitar", "drums"]}},
  "2": {{"tags": ["melancholic", "slow", "sad"], "environments": ["relax"], "instruments": ["piano"]}}
}}

Assign metadata to the following songs:

{tracks_json}

Return a JSON object mapping each track ID to its tags, environments and instruments."#
    )
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[\]}])").unwrap())
}

/// Strip markdown code fences and repair trailing commas. Also used by the
/// playlist reranker, whose replies suffer the same decorations.
pub(crate) fn clean_json_response(response: &str) -> String {
    let without_fences: String = response
        .trim()
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    trailing_comma_re()
        .replace_all(&without_fences, "$1")
        .into_owned()
}

/// Coerce one field value into a normalized string list.
///
/// Arrays keep their elements, a bare string becomes a one-element list,
/// anything else is empty. Values are lowercased and trimmed.
fn coerce_list(value: Option<&Value>, limit: usize) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => vec![],
    };

    items
        .into_iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect()
}

/// Parse a model reply against the batch it answers.
///
/// Every track in the batch gets an entry; tracks the reply omits or maps
/// to an unusable value get empty lists. The legacy reply shape (a bare
/// tag array per id) still parses, as tags only.
fn parse_response(
    response: &str,
    batch: &[TrackDescriptor],
) -> Result<HashMap<i64, TrackTags>, serde_json::Error> {
    let cleaned = clean_json_response(response);
    let parsed: Value = serde_json::from_str(&cleaned)?;

    let mut result = HashMap::new();
    for track in batch {
        let entry = parsed.get(track.id.to_string());
        let tags = match entry {
            Some(Value::Object(fields)) => TrackTags {
                tags: coerce_list(fields.get("tags"), MAX_TAGS),
                environments: coerce_list(fields.get("environments"), MAX_ENVIRONMENTS),
                instruments: coerce_list(fields.get("instruments"), MAX_INSTRUMENTS),
            },
            // Legacy shape: a bare array of tags
            Some(array @ Value::Array(_)) => TrackTags {
                tags: coerce_list(Some(array), MAX_TAGS),
                ..Default::default()
            },
            _ => TrackTags::default(),
        };
        result.insert(track.id, tags);
    }

    Ok(result)
}
