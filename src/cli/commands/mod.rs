//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `sync`: Mirror the remote media library into the local database
//! - `tags`: AI tag generation for untagged tracks
//! - `playlist`: Mood playlist creation, listing and M3U export
//! - `config`: Configuration inspection and editing

mod config;
mod playlist;
mod sync;
mod tags;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use config::cmd_config;
pub use playlist::{cmd_create, cmd_export, cmd_list};
pub use sync::cmd_sync;
pub use tags::cmd_tags;

use crate::config::{self as app_config, Config};
use crate::db::TrackFilters;

/// MoodMixer CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Media server connection overrides; flags beat the config file
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Media server URL (or set MEDIA_SERVER_URL)
    #[arg(long, env = "MEDIA_SERVER_URL")]
    pub server: Option<String>,
    /// Media server auth token (or set MEDIA_SERVER_TOKEN)
    #[arg(long, env = "MEDIA_SERVER_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl ServerArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.server {
            config.server.url = url.clone();
        }
        if self.token.is_some() {
            config.credentials.server_token = self.token.clone();
        }
    }
}

/// AI provider API keys; flags beat the config file
#[derive(Args, Debug, Default)]
pub struct KeyArgs {
    /// Google API key (or set GEMINI_API_KEY)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,
    /// OpenAI API key (or set OPENAI_API_KEY)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
    /// Anthropic API key (or set ANTHROPIC_API_KEY)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,
    /// Cohere API key (or set COHERE_API_KEY)
    #[arg(long, env = "COHERE_API_KEY", hide_env_values = true)]
    pub cohere_api_key: Option<String>,
}

impl KeyArgs {
    pub fn apply(&self, config: &mut Config) {
        if self.gemini_api_key.is_some() {
            config.credentials.gemini_api_key = self.gemini_api_key.clone();
        }
        if self.openai_api_key.is_some() {
            config.credentials.openai_api_key = self.openai_api_key.clone();
        }
        if self.anthropic_api_key.is_some() {
            config.credentials.anthropic_api_key = self.anthropic_api_key.clone();
        }
        if self.cohere_api_key.is_some() {
            config.credentials.cohere_api_key = self.cohere_api_key.clone();
        }
    }
}

/// Candidate filters applied before semantic retrieval
#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Exact genre match
    #[arg(long)]
    pub genre: Option<String>,
    /// Earliest release year
    #[arg(long)]
    pub year_min: Option<i64>,
    /// Latest release year
    #[arg(long)]
    pub year_max: Option<i64>,
    /// Minimum user rating (0-10)
    #[arg(long)]
    pub min_rating: Option<f64>,
    /// Required listening environment, e.g. "gym"
    #[arg(long)]
    pub environment: Option<String>,
    /// Required instrument, e.g. "piano"
    #[arg(long)]
    pub instrument: Option<String>,
}

impl FilterArgs {
    pub fn to_filters(&self) -> TrackFilters {
        TrackFilters {
            genre: self.genre.clone(),
            year_min: self.year_min,
            year_max: self.year_max,
            min_rating: self.min_rating,
            environment: self.environment.clone(),
            instrument: self.instrument.clone(),
        }
    }
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Mirror the media server library into the local database
    Sync {
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        keys: KeyArgs,
        /// Only fetch tracks changed since the last successful sync
        #[arg(long)]
        incremental: bool,
        /// Skip the embedding refresh and index rebuild
        #[arg(long)]
        skip_embeddings: bool,
    },
    /// Generate AI tags for tracks that have none
    Tags {
        #[command(flatten)]
        keys: KeyArgs,
        /// Tracks per completion request
        #[arg(long)]
        batch_size: Option<usize>,
    },
    /// Create a mood playlist from a natural-language query
    Create {
        /// Mood description, e.g. "rainy sunday morning jazz"
        query: String,
        /// Playlist name (defaults to the mood query)
        #[arg(short, long)]
        name: Option<String>,
        /// Number of tracks
        #[arg(short, long)]
        length: Option<usize>,
        /// Candidate pool size before AI selection
        #[arg(long)]
        pool: Option<usize>,
        /// Keep similarity order, skipping AI selection
        #[arg(long)]
        no_rerank: bool,
        /// Also create the playlist on the media server
        #[arg(long)]
        push: bool,
        /// Write the playlist to an M3U file
        #[arg(long)]
        export: Option<PathBuf>,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        server: ServerArgs,
        #[command(flatten)]
        keys: KeyArgs,
    },
    /// Export a saved playlist as an extended M3U file
    Export {
        /// Playlist name
        name: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
        #[command(flatten)]
        server: ServerArgs,
    },
    /// List synced tracks, or saved playlists with --playlists
    List {
        /// List saved playlists instead of tracks
        #[arg(long)]
        playlists: bool,
    },
    /// Show the configuration, or update settings and save
    Config {
        /// Set the media server URL
        #[arg(long)]
        server_url: Option<String>,
        /// Set the media server auth token
        #[arg(long)]
        server_token: Option<String>,
        /// Set the completion provider (gemini, openai, claude, cohere)
        #[arg(long)]
        ai_provider: Option<String>,
        /// Set the embedding provider (gemini, openai, cohere)
        #[arg(long)]
        embedding_provider: Option<String>,
    },
}

/// Resolve the configured server URL and token, erroring when either is
/// missing.
pub(crate) fn server_connection(config: &Config) -> anyhow::Result<(String, String)> {
    let url = Some(config.server.url.clone())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No media server URL configured (set server.url in the config file or MEDIA_SERVER_URL)"
            )
        })?;
    let token = config
        .credentials
        .server_token
        .clone()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No media server token configured (set credentials.server_token in the config file or MEDIA_SERVER_TOKEN)"
            )
        })?;
    Ok((url, token))
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let rt = Runtime::new()?;

    match &cli.command {
        Some(Commands::Sync {
            server,
            keys,
            incremental,
            skip_embeddings,
        }) => {
            let mut config = app_config::load();
            server.apply(&mut config);
            keys.apply(&mut config);
            cmd_sync(&rt, &config, *incremental, *skip_embeddings)?;
            Ok(true)
        }
        Some(Commands::Tags { keys, batch_size }) => {
            let mut config = app_config::load();
            keys.apply(&mut config);
            cmd_tags(&rt, &config, *batch_size)?;
            Ok(true)
        }
        Some(Commands::Create {
            query,
            name,
            length,
            pool,
            no_rerank,
            push,
            export,
            filters,
            server,
            keys,
        }) => {
            let mut config = app_config::load();
            server.apply(&mut config);
            keys.apply(&mut config);
            cmd_create(
                &rt,
                &config,
                query,
                name.as_deref(),
                *length,
                *pool,
                *no_rerank,
                *push,
                export.as_deref(),
                &filters.to_filters(),
            )?;
            Ok(true)
        }
        Some(Commands::Export {
            name,
            output,
            server,
        }) => {
            let mut config = app_config::load();
            server.apply(&mut config);
            cmd_export(&rt, &config, name, output)?;
            Ok(true)
        }
        Some(Commands::List { playlists }) => {
            let config = app_config::load();
            cmd_list(&rt, &config, *playlists)?;
            Ok(true)
        }
        Some(Commands::Config {
            server_url,
            server_token,
            ai_provider,
            embedding_provider,
        }) => {
            cmd_config(
                server_url.as_deref(),
                server_token.as_deref(),
                ai_provider.as_deref(),
                embedding_provider.as_deref(),
            )?;
            Ok(true)
        }
        None => Ok(false),
    }
}
