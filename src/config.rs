use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Settings for the external encoder binaries.
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub preset: String,
    /// Upper bound for a single ffmpeg/ffprobe invocation. `None` waits forever.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sendgrid_api_key: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: String,
    pub server_port: u16,
    pub media_root: PathBuf,
    pub media_base_url: String,
    pub frontend_url: String,
    pub backend_url: String,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
    pub worker_concurrency: usize,
    pub ffmpeg: FfmpegConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let timeout = match lookup("FFMPEG_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => Some(Duration::from_secs(parse(
                "FFMPEG_TIMEOUT_SECS",
                &raw,
            )?)),
            _ => None,
        };

        let worker_concurrency: usize =
            parse("WORKER_CONCURRENCY", &get("WORKER_CONCURRENCY", "1"))?;
        if worker_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "WORKER_CONCURRENCY",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            redis_url: get("REDIS_URL", "redis://localhost:6379"),
            server_port: parse("SERVER_PORT", &get("SERVER_PORT", "8000"))?,
            media_root: PathBuf::from(get("MEDIA_ROOT", "media")),
            media_base_url: get("MEDIA_BASE_URL", "http://localhost:8000/media"),
            frontend_url: get("FRONTEND_URL", "http://localhost:4200"),
            backend_url: get("BACKEND_URL", "http://localhost:8000"),
            cors_origin: get("CORS_ORIGIN", "http://localhost:4200"),
            max_upload_bytes: parse(
                "MAX_UPLOAD_BYTES",
                &get("MAX_UPLOAD_BYTES", "524288000"),
            )?,
            worker_concurrency,
            ffmpeg: FfmpegConfig {
                ffmpeg_bin: get("FFMPEG_BIN", "ffmpeg"),
                ffprobe_bin: get("FFPROBE_BIN", "ffprobe"),
                preset: get("FFMPEG_PRESET", "medium"),
                timeout,
            },
            mail: MailConfig {
                sendgrid_api_key: lookup("SENDGRID_API_KEY").filter(|k| !k.is_empty()),
                from: get("MAIL_FROM", "no-reply@videoflix.com"),
            },
        })
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: raw.to_string(),
    })
}
