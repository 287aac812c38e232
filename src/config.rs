//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\moodmixer\config.toml
//! - macOS: ~/Library/Application Support/moodmixer/config.toml
//! - Linux: ~/.config/moodmixer/config.toml
//!
//! The config file is human-readable and editable. Settings are loaded at
//! startup; API keys may also come from environment variables via the CLI.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API credentials (keep separate for potential future encryption)
    pub credentials: Credentials,

    /// Remote media server settings
    pub server: ServerConfig,

    /// Database and index locations
    pub database: DatabaseConfig,

    /// AI completion provider settings
    pub ai: AiConfig,

    /// Embedding provider settings
    pub embedding: EmbeddingConfig,

    /// Playlist generation settings
    pub playlist: PlaylistConfig,

    /// Tag generation settings
    pub tagging: TaggingConfig,
}

/// API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Token for the remote media server
    pub server_token: Option<String>,
    /// Google API key (Gemini completion + embeddings)
    pub gemini_api_key: Option<String>,
    /// OpenAI API key
    pub openai_api_key: Option<String>,
    /// Anthropic API key
    pub anthropic_api_key: Option<String>,
    /// Cohere API key
    pub cohere_api_key: Option<String>,
}

/// Remote media server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the media server (e.g. "http://localhost:32400")
    pub url: String,
}

/// Database and index locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file path (empty = data dir default)
    pub path: Option<PathBuf>,
    /// Vector index file path (empty = alongside the database)
    pub index_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            index_path: None,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the database path, falling back to the OS data directory.
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("moodmixer.db")
        })
    }

    /// Resolve the vector index path, falling back next to the database.
    pub fn index_path(&self) -> PathBuf {
        self.index_path
            .clone()
            .unwrap_or_else(|| self.db_path().with_extension("index.json"))
    }
}

/// AI completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Default provider: "gemini", "openai", "claude", "cohere"
    pub provider: String,
    /// Model override (empty = provider default)
    pub model: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider: "gemini", "openai", "cohere"
    pub provider: String,
    /// Model override (empty = provider default)
    pub model: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
        }
    }
}

/// Playlist generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Default number of tracks per generated playlist
    pub default_length: usize,
    /// Nearest-neighbor candidate pool size before reranking
    pub candidate_pool_size: usize,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            default_length: 25,
            candidate_pool_size: 100,
        }
    }
}

/// Tag generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    /// Tracks per completion request
    pub batch_size: usize,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self { batch_size: 20 }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("moodmixer"))
}

/// Get the data directory path (database, vector index)
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("moodmixer"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    // Ensure directory exists
    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::CreateDir(dir.clone(), e))?;

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, &path)
        .map_err(|e| ConfigError::Rename(temp_path, path.clone(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[server]"));
        assert!(toml.contains("[ai]"));
        assert!(toml.contains("[playlist]"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.credentials.gemini_api_key = Some("test-key-123".to_string());
        config.server.url = "http://localhost:32400".to_string();
        config.playlist.default_length = 40;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(
            parsed.credentials.gemini_api_key,
            Some("test-key-123".to_string())
        );
        assert_eq!(parsed.server.url, "http://localhost:32400");
        assert_eq!(parsed.playlist.default_length, 40);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        // Config with only some fields
        let toml = r#"
[server]
url = "http://music.local"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        // Specified field is set
        assert_eq!(config.server.url, "http://music.local");

        // Other fields use defaults
        assert_eq!(config.ai.provider, "gemini");
        assert_eq!(config.playlist.candidate_pool_size, 100);
        assert_eq!(config.tagging.batch_size, 20);
    }

    #[test]
    fn test_db_path_default_has_filename() {
        let config = DatabaseConfig::default();
        assert!(config.db_path().to_string_lossy().contains("moodmixer.db"));
    }
}
