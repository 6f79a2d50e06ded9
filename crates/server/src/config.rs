//! Server configuration and shared state

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::Secret;
use tracing::warn;

use crate::auth::AuthManager;
use crate::relay::StreamingRelay;
use crate::store::ProfileStore;
use crate::vendors::Vendors;

const DEV_JWT_SECRET: &str = "yapgpt-dev-secret-change-me";

/// Configuration for the YapGPT server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Data directory (SQLite database lives here)
    pub data_dir: PathBuf,
    /// Explicit database URL, overrides the file in `data_dir`
    pub database_url: Option<String>,
    /// HTTP port
    pub port: u16,
    /// HS256 signing secret for bearer tokens
    pub jwt_secret: Secret<String>,
    /// bcrypt work factor
    pub bcrypt_cost: u32,
    /// Broadcast buffer per relay topic
    pub relay_capacity: usize,
    pub openai: OpenAiConfig,
    pub elevenlabs: ElevenLabsConfig,
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub chat_model: String,
    pub transcription_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ElevenLabsConfig {
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub model: String,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            model: "eleven_turbo_v2".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("yap_data"),
            database_url: None,
            port: 4000,
            jwt_secret: Secret::new(DEV_JWT_SECRET.to_string()),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            relay_capacity: 256,
            openai: OpenAiConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Build config from environment variables, falling back to defaults
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let jwt_secret = match env("JWT_SECRET") {
            Some(secret) => Secret::new(secret),
            None if cfg!(debug_assertions) => {
                warn!("[Config] JWT_SECRET not set, using development secret");
                defaults.jwt_secret
            }
            None => anyhow::bail!("JWT_SECRET must be set"),
        };

        let openai_defaults = OpenAiConfig::default();
        let elevenlabs_defaults = ElevenLabsConfig::default();

        Ok(Self {
            data_dir: env("YAP_ROOT").map(PathBuf::from).unwrap_or(defaults.data_dir),
            database_url: env("YAP_DATABASE_URL"),
            port: parsed("PORT")?.unwrap_or(defaults.port),
            jwt_secret,
            bcrypt_cost: parsed("BCRYPT_COST")?.unwrap_or(defaults.bcrypt_cost),
            relay_capacity: parsed("RELAY_CAPACITY")?.unwrap_or(defaults.relay_capacity),
            openai: OpenAiConfig {
                api_key: env("OPENAI_API_KEY").map(Secret::new),
                base_url: env("OPENAI_BASE_URL").unwrap_or(openai_defaults.base_url),
                chat_model: env("OPENAI_CHAT_MODEL").unwrap_or(openai_defaults.chat_model),
                transcription_model: env("OPENAI_TRANSCRIPTION_MODEL")
                    .unwrap_or(openai_defaults.transcription_model),
            },
            elevenlabs: ElevenLabsConfig {
                api_key: env("ELEVENLABS_API_KEY").map(Secret::new),
                base_url: env("ELEVENLABS_BASE_URL").unwrap_or(elevenlabs_defaults.base_url),
                model: env("ELEVENLABS_MODEL").unwrap_or(elevenlabs_defaults.model),
            },
        })
    }

    /// Create config rooted at a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// SQLite URL for the profile store
    pub fn database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}",
                self.data_dir
                    .join("yappers.sqlite")
                    .to_string_lossy()
                    .replace('\\', "/")
            )
        })
    }

    /// Ensure the data directory exists
    pub async fn ensure_dirs(&self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}"))
        })
        .transpose()
}

/// App state shared across all resolvers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub profiles: Arc<ProfileStore>,
    pub auth: Arc<AuthManager>,
    pub relay: Arc<StreamingRelay>,
    pub vendors: Vendors,
}
