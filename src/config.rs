use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// How long `initialize` waits for the frame before giving up.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Origins whose messages the router accepts.
pub const ALLOWED_ORIGINS: &[&str] = &["https://staging-app.avitor.ai"];
/// Where the embedded widget is served from.
pub const WIDGET_BASE_URL: &str = "http://localhost:8081";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read widget settings: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse widget URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("origin {0} has no host and cannot be trusted")]
    OpaqueOrigin(String),
    #[error("base URL {0} cannot carry a path")]
    CannotBeABase(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    timeout_ms: Option<u64>,
    allowed_origins: Option<Vec<String>>,
    base_url: Option<String>,
    same_origin_frame: Option<bool>,
}

/// Process-wide widget constants. Fixed once handed to a `Widget`.
#[derive(Debug, Clone)]
pub struct WidgetSettings {
    timeout: Duration,
    allowed_origins: Vec<String>,
    base_url: Url,
    same_origin_frame: bool,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, ALLOWED_ORIGINS, WIDGET_BASE_URL)
            .expect("built-in widget settings are valid")
    }
}

impl WidgetSettings {
    pub fn new(
        timeout: Duration,
        allowed_origins: &[&str],
        base_url: &str,
    ) -> Result<Self, SettingsError> {
        let allowed_origins = allowed_origins
            .iter()
            .map(|origin| normalize_origin(origin))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            timeout,
            allowed_origins,
            base_url: parse_base_url(base_url)?,
            same_origin_frame: false,
        })
    }

    /// Load overrides from a YAML file; a missing path or file keeps the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, SettingsError> {
        let file = match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                serde_yaml::from_str::<SettingsFile>(&contents)?
            }
            _ => SettingsFile::default(),
        };

        let mut settings = Self::default();
        if let Some(timeout_ms) = file.timeout_ms {
            settings.timeout = Duration::from_millis(timeout_ms);
        }
        if let Some(origins) = file.allowed_origins {
            settings.allowed_origins = origins
                .iter()
                .map(|origin| normalize_origin(origin))
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(base_url) = file.base_url {
            settings.base_url = parse_base_url(&base_url)?;
        }
        if let Some(same_origin) = file.same_origin_frame {
            settings.same_origin_frame = same_origin;
        }
        Ok(settings)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Grant the frame `allow-same-origin` for widgets that need their own storage.
    pub fn with_same_origin_frame(mut self, enabled: bool) -> Self {
        self.same_origin_frame = enabled;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn same_origin_frame(&self) -> bool {
        self.same_origin_frame
    }

    pub fn is_allowed_origin(&self, origin: &str) -> bool {
        let Ok(origin) = normalize_origin(origin) else {
            return false;
        };
        self.allowed_origins.iter().any(|allowed| *allowed == origin)
    }
}

/// Reduce a URL or origin string to its `scheme://host[:port]` serialization.
pub fn normalize_origin(raw: &str) -> Result<String, SettingsError> {
    let url = Url::parse(raw.trim())?;
    let origin = url.origin();
    if !origin.is_tuple() {
        return Err(SettingsError::OpaqueOrigin(raw.to_string()));
    }
    Ok(origin.ascii_serialization())
}

fn parse_base_url(raw: &str) -> Result<Url, SettingsError> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(SettingsError::CannotBeABase(raw.to_string()));
    }
    Ok(url)
}
