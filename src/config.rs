use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LOOKUPS_URL: &str = "https://lookups.twilio.com";
pub const DEFAULT_API_URL: &str = "https://api.twilio.com";
pub const DEFAULT_STUDIO_URL: &str = "https://studio.twilio.com";
pub const DEFAULT_PREVIEW_URL: &str = "https://preview.twilio.com";

/// Base URLs of the Twilio API hosts the gateway talks to.
///
/// Overridable so tests (and regional edge locations) can point elsewhere.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Endpoints {
    #[serde(rename = "TWILIO_LOOKUPS_URL", default = "default_lookups_url")]
    pub lookups: String,
    #[serde(rename = "TWILIO_API_URL", default = "default_api_url")]
    pub api: String,
    #[serde(rename = "TWILIO_STUDIO_URL", default = "default_studio_url")]
    pub studio: String,
    #[serde(rename = "TWILIO_PREVIEW_URL", default = "default_preview_url")]
    pub preview: String,
}

fn default_lookups_url() -> String {
    DEFAULT_LOOKUPS_URL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_studio_url() -> String {
    DEFAULT_STUDIO_URL.to_string()
}

fn default_preview_url() -> String {
    DEFAULT_PREVIEW_URL.to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            lookups: default_lookups_url(),
            api: default_api_url(),
            studio: default_studio_url(),
            preview: default_preview_url(),
        }
    }
}

impl Endpoints {
    /// Points every host at the same base URL.
    pub fn all(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self {
            lookups: base.clone(),
            api: base.clone(),
            studio: base.clone(),
            preview: base,
        }
    }
}

/// Account credentials and sender identities, fixed for the life of the process.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "TWILIO_ACCOUNT_SID")]
    pub account_sid: String,
    #[serde(rename = "TWILIO_AUTH_TOKEN")]
    pub auth_token: String,
    /// Numeric sender (E.164).
    #[serde(rename = "TWILIO_PHONENUMBER")]
    pub phone_number: String,
    /// Alphanumeric sender ID, used by `send_message_with_alias`.
    #[serde(rename = "TWILIO_PHONENUMBER_ALPHA", default)]
    pub phone_number_alpha: Option<String>,
    /// Studio Flow SID (FWxxxxxxxx).
    #[serde(rename = "TWILIO_FLOW_SID")]
    pub flow_sid: String,
    /// ISO country used by Lookup to interpret national-format numbers.
    #[serde(rename = "TWILIO_LOOKUP_COUNTRY_CODE", default)]
    pub lookup_country_code: Option<String>,
    #[serde(rename = "TWILIO_HTTP_TIMEOUT_SECS", default)]
    pub http_timeout_secs: Option<u64>,
    #[serde(flatten)]
    pub endpoints: Endpoints,
}

impl Config {
    /// Loads configuration from the process environment (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            account_sid: required_env("TWILIO_ACCOUNT_SID")?,
            auth_token: required_env("TWILIO_AUTH_TOKEN")?,
            phone_number: required_env("TWILIO_PHONENUMBER")?,
            phone_number_alpha: optional_env("TWILIO_PHONENUMBER_ALPHA"),
            flow_sid: required_env("TWILIO_FLOW_SID")?,
            lookup_country_code: optional_env("TWILIO_LOOKUP_COUNTRY_CODE"),
            http_timeout_secs: optional_env("TWILIO_HTTP_TIMEOUT_SECS")
                .map(|v| {
                    v.parse().map_err(|_| {
                        anyhow::anyhow!("TWILIO_HTTP_TIMEOUT_SECS must be a whole number of seconds")
                    })
                })
                .transpose()?,
            endpoints: Endpoints {
                lookups: optional_env("TWILIO_LOOKUPS_URL").unwrap_or_else(default_lookups_url),
                api: optional_env("TWILIO_API_URL").unwrap_or_else(default_api_url),
                studio: optional_env("TWILIO_STUDIO_URL").unwrap_or_else(default_studio_url),
                preview: optional_env("TWILIO_PREVIEW_URL").unwrap_or_else(default_preview_url),
            },
        };

        config.validate()?;
        config.log_loaded("environment");
        Ok(config)
    }

    /// Loads configuration from a JSON document such as `twilio_config.json`.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
        })?;
        let config = Self::from_json_str(&raw)?;
        config.log_loaded(&path.display().to_string());
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let mut config: Self = serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("Invalid Twilio configuration: {}", e))?;
        // Blank optionals mean "unset", same as in the environment.
        config.phone_number_alpha = config.phone_number_alpha.filter(|s| !s.trim().is_empty());
        config.lookup_country_code = config.lookup_country_code.filter(|s| !s.trim().is_empty());
        config.validate()?;
        Ok(config)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> anyhow::Result<()> {
        for (key, value) in [
            ("TWILIO_ACCOUNT_SID", &self.account_sid),
            ("TWILIO_AUTH_TOKEN", &self.auth_token),
            ("TWILIO_PHONENUMBER", &self.phone_number),
            ("TWILIO_FLOW_SID", &self.flow_sid),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", key);
            }
        }

        for (key, value) in [
            ("TWILIO_LOOKUPS_URL", &self.endpoints.lookups),
            ("TWILIO_API_URL", &self.endpoints.api),
            ("TWILIO_STUDIO_URL", &self.endpoints.studio),
            ("TWILIO_PREVIEW_URL", &self.endpoints.preview),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", key, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                anyhow::bail!("{} must start with http:// or https://", key);
            }
        }

        Ok(())
    }

    fn log_loaded(&self, source: &str) {
        // Never log the auth token.
        tracing::info!("Twilio configuration loaded from {}", source);
        tracing::debug!("Account SID: {}", self.account_sid);
        tracing::debug!("Sender: {}", self.phone_number);
        if let Some(ref alpha) = self.phone_number_alpha {
            tracing::debug!("Alpha sender: {}", alpha);
        }
        tracing::debug!("Studio Flow: {}", self.flow_sid);
    }
}

fn required_env(key: &str) -> anyhow::Result<String> {
    let value = std::env::var(key)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", key))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", key);
    }
    Ok(value)
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}
