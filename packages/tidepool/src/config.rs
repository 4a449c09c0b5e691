use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [auth]
//                    session_ttl_secs = 86400
//
//   env var:         TIDEPOOL_AUTH__SESSION_TTL_SECS=86400
//                    (double underscore = nesting into sections)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub auth: AuthFileConfig,
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub chat: ChatFileConfig,
}

/// Auth-related tunables (lives under `[auth]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthFileConfig {
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_allow_registration")]
    pub allow_registration: bool,
    /// Set the Secure flag on session cookies.
    #[serde(default)]
    pub https: bool,
}

impl Default for AuthFileConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            allow_registration: default_allow_registration(),
            https: false,
        }
    }
}

/// Server tuning knobs (lives under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
        }
    }
}

/// Chat tunables (lives under `[chat]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatFileConfig {
    /// Default number of messages returned by the room history endpoint.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    /// Upper bound a client may request via `?limit=`.
    #[serde(default = "default_history_limit_max")]
    pub history_limit_max: u32,
}

impl Default for ChatFileConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            history_limit_max: default_history_limit_max(),
        }
    }
}

fn default_session_ttl() -> u64 {
    604800 // 7 days
}
fn default_allow_registration() -> bool {
    true
}
fn default_history_limit() -> u32 {
    50
}
fn default_history_limit_max() -> u32 {
    100
}

/// Build a figment that layers: struct defaults → config.toml → TIDEPOOL_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `TIDEPOOL_AUTH__SESSION_TTL_SECS=86400`  →  `auth.session_ttl_secs = 86400`
///   `TIDEPOOL_SERVER__PORT=9090`             →  `server.port = 9090`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("TIDEPOOL_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig, used throughout the server)
// =============================================================================

/// Authentication configuration (runtime view).
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// Session time-to-live in seconds (default: 7 days)
    pub session_ttl_secs: u64,
    /// Whether new user registration is open (default: true)
    pub allow_registration: bool,
    /// Whether to set Secure flag on cookies
    pub https: bool,
}

impl AuthConfig {
    pub fn from_file(fc: &AuthFileConfig) -> Self {
        Self {
            session_ttl_secs: fc.session_ttl_secs,
            allow_registration: fc.allow_registration,
            https: fc.https,
        }
    }
}

/// Chat configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub history_limit: u32,
    pub history_limit_max: u32,
}

impl ChatConfig {
    pub fn from_file(fc: &ChatFileConfig) -> Self {
        Self {
            history_limit: fc.history_limit,
            history_limit_max: fc.history_limit_max,
        }
    }
}

/// Filesystem layout: data directory and database location.
#[derive(Clone, Debug)]
pub struct TidepoolConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl TidepoolConfig {
    pub fn new(data_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".tidepool"),
        };

        std::fs::create_dir_all(&data_dir).with_context(|| {
            format!("Failed to create data directory: {}", data_dir.display())
        })?;

        let db_path = data_dir.join("tidepool.db");

        Ok(Self { data_dir, db_path })
    }

    pub fn db_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.db_path.display())
    }

    pub fn reset_database(&self) -> Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let path = PathBuf::from(format!("{}{}", self.db_path.display(), suffix));
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let fc = FileConfig::default();
        assert_eq!(fc.auth.session_ttl_secs, 604800);
        assert!(fc.auth.allow_registration);
        assert!(!fc.auth.https);
        assert_eq!(fc.chat.history_limit, 50);
        assert_eq!(fc.chat.history_limit_max, 100);
        assert!(fc.server.host.is_none());
    }

    #[test]
    fn toml_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[auth]\nsession_ttl_secs = 60\n\n[chat]\nhistory_limit = 10\n",
        )
        .unwrap();

        let fc: FileConfig = load_config(dir.path()).extract().unwrap();
        assert_eq!(fc.auth.session_ttl_secs, 60);
        assert_eq!(fc.chat.history_limit, 10);
        // Untouched values keep struct defaults
        assert_eq!(fc.chat.history_limit_max, 100);
    }

    #[test]
    fn data_dir_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = TidepoolConfig::new(Some(dir.path().join("data"))).unwrap();
        assert!(config.data_dir.exists());
        assert!(config.db_url().starts_with("sqlite://"));
        assert!(config.db_url().ends_with("tidepool.db?mode=rwc"));
    }
}
