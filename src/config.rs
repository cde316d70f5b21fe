//! Configuration file handling.
//!
//! Everything lives in `<config_dir>/mailcast/config.toml`. A missing file
//! means defaults; a handful of environment variables override secrets so they
//! need not be written to disk.

use crate::ai::providers::google::{DEFAULT_GEMINI_MODEL, GEMINI_API_BASE};
use crate::ai::{AIError, DraftBranding, DraftComposer, GoogleProvider};
use crate::dispatch::{BulkSender, DispatchEngine, DEFAULT_ATTEMPT_TIMEOUT, DEFAULT_MAX_RECIPIENTS};
use crate::oauth2::client::GOOGLE_TOKEN_URL;
use crate::oauth2::{OAuth2Client, OAuth2Error, SharedCredential, TokenManager};
use crate::smtp::{MailRelay, SmtpAuth, SmtpClient, SmtpConfig, SmtpError, SmtpSecurity};
use crate::templates::sheets::DEFAULT_SHEET_NAME;
use crate::templates::{FileTemplateStore, SheetsTemplateStore, TemplateError, TemplateStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";
const TEMPLATES_FILE: &str = "templates.json";
/// Upper bound for `oauth.refresh_margin_secs` (one day)
const MAX_REFRESH_MARGIN_SECS: u64 = 86_400;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    #[error(transparent)]
    OAuth2(#[from] OAuth2Error),

    #[error(transparent)]
    Smtp(#[from] SmtpError),

    #[error(transparent)]
    Draft(#[from] AIError),

    #[error(transparent)]
    Templates(#[from] TemplateError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub token_url: String,
    pub refresh_timeout_secs: u64,
    /// Refresh this many seconds before expiry
    pub refresh_margin_secs: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            refresh_timeout_secs: 30,
            refresh_margin_secs: 0,
        }
    }
}

/// How the relay authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpAuthMode {
    /// XOAUTH2 with the delegated access token
    #[default]
    OAuth2,
    /// Basic auth with an app password
    AppPassword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub auth: SmtpAuthMode,
    /// Relay login; the sender address is used when unset
    pub username: Option<String>,
    pub app_password: Option<String>,
    pub timeout_secs: u64,
    pub pool_size: u32,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            security: SmtpSecurity::StartTls,
            auth: SmtpAuthMode::OAuth2,
            username: None,
            app_password: None,
            timeout_secs: 30,
            pool_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub max_recipients: usize,
    pub attempt_timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_recipients: DEFAULT_MAX_RECIPIENTS,
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT.as_secs(),
            max_concurrency: DEFAULT_MAX_RECIPIENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub brand: String,
    pub support_email: String,
    pub inquiry_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for DraftSettings {
    fn default() -> Self {
        let branding = DraftBranding::default();
        Self {
            api_key: None,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
            brand: branding.brand,
            support_email: branding.support_email,
            inquiry_url: branding.inquiry_url,
            temperature: 0.7,
            max_output_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

impl DraftSettings {
    pub fn branding(&self) -> DraftBranding {
        DraftBranding {
            brand: self.brand.clone(),
            support_email: self.support_email.clone(),
            inquiry_url: self.inquiry_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateBackend {
    Sheets,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    pub backend: TemplateBackend,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
    /// Defaults to `templates.json` in the config directory
    pub file_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            backend: TemplateBackend::File,
            spreadsheet_id: None,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            file_path: None,
            timeout_secs: 30,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailcastConfig {
    pub oauth: OAuthSettings,
    pub smtp: SmtpSettings,
    pub dispatch: DispatchSettings,
    pub draft: DraftSettings,
    pub templates: TemplateSettings,
}

impl MailcastConfig {
    /// `<config_dir>/mailcast`
    pub fn default_dir() -> ConfigResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("mailcast"))
            .ok_or_else(|| ConfigError::Io("Could not determine config directory".to_string()))
    }

    pub fn file_in(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILE)
    }

    /// Load configuration from file, falling back to defaults when absent
    pub async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::Io(format!("Failed to read {:?}: {}", path, e)))?;

        let config: MailcastConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Parse(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::Io(format!("Failed to create config directory: {}", e)))?;
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ConfigError::Io(format!("Failed to write {:?}: {}", path, e)))?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup; blank values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(client_id) = get("GOOGLE_CLIENT_ID") {
            self.oauth.client_id = client_id;
        }
        if let Some(secret) = get("GOOGLE_CLIENT_SECRET") {
            self.oauth.client_secret = Some(secret);
        }
        if let Some(api_key) = get("GEMINI_API_KEY") {
            self.draft.api_key = Some(api_key);
        }
        if let Some(password) = get("GMAIL_APP_PASSWORD") {
            self.smtp.app_password = Some(password);
        }
        if let Some(sheet_id) = get("GOOGLE_SHEET_ID") {
            self.templates.spreadsheet_id = Some(sheet_id);
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.dispatch.max_recipients == 0 || self.dispatch.max_recipients > DEFAULT_MAX_RECIPIENTS {
            return Err(ConfigError::Invalid(format!(
                "dispatch.max_recipients must be between 1 and {}",
                DEFAULT_MAX_RECIPIENTS
            )));
        }
        if self.dispatch.max_concurrency == 0 {
            return Err(ConfigError::Invalid("dispatch.max_concurrency must be greater than 0".to_string()));
        }
        if self.dispatch.attempt_timeout_secs == 0 {
            return Err(ConfigError::Invalid("dispatch.attempt_timeout_secs must be greater than 0".to_string()));
        }
        if self.oauth.refresh_margin_secs > MAX_REFRESH_MARGIN_SECS {
            return Err(ConfigError::Invalid(format!(
                "oauth.refresh_margin_secs must be at most {}",
                MAX_REFRESH_MARGIN_SECS
            )));
        }
        if self.oauth.refresh_timeout_secs == 0 {
            return Err(ConfigError::Invalid("oauth.refresh_timeout_secs must be greater than 0".to_string()));
        }
        if self.smtp.timeout_secs == 0 || self.draft.timeout_secs == 0 || self.templates.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than 0".to_string()));
        }
        if !(0.0..=2.0).contains(&self.draft.temperature) {
            return Err(ConfigError::Invalid("draft.temperature must be between 0.0 and 2.0".to_string()));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Invalid("smtp.port must be greater than 0".to_string()));
        }
        Ok(())
    }

    /// Identity provider client for the refresh grant
    pub fn oauth_client(&self) -> ConfigResult<OAuth2Client> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("oauth.client_id (or GOOGLE_CLIENT_ID)"));
        }

        Ok(OAuth2Client::new(
            self.oauth.client_id.clone(),
            self.oauth.client_secret.clone(),
            &self.oauth.token_url,
            Duration::from_secs(self.oauth.refresh_timeout_secs),
        )?)
    }

    pub fn token_manager(&self) -> ConfigResult<TokenManager> {
        let client = self.oauth_client()?;
        Ok(TokenManager::new(Arc::new(client))
            .with_refresh_timeout(Duration::from_secs(self.oauth.refresh_timeout_secs))
            .with_refresh_margin(chrono::Duration::seconds(self.oauth.refresh_margin_secs as i64)))
    }

    /// Relay configuration; `sender_address` is the login when no username is set
    pub fn smtp_config(&self, sender_address: &str) -> ConfigResult<SmtpConfig> {
        let username = self
            .smtp
            .username
            .clone()
            .unwrap_or_else(|| sender_address.to_string());

        let auth = match self.smtp.auth {
            SmtpAuthMode::OAuth2 => SmtpAuth::OAuth2 { username },
            SmtpAuthMode::AppPassword => {
                let password = self
                    .smtp
                    .app_password
                    .clone()
                    .ok_or(ConfigError::Missing("smtp.app_password (or GMAIL_APP_PASSWORD)"))?;
                SmtpAuth::Plain { username, password }
            }
        };

        let config = SmtpConfig::new(self.smtp.server.clone(), self.smtp.port, auth)
            .with_security(self.smtp.security.clone())
            .with_timeout(Duration::from_secs(self.smtp.timeout_secs))
            .with_pool_size(self.smtp.pool_size);
        config.validate()?;
        Ok(config)
    }

    pub fn smtp_client(&self, sender_address: &str) -> ConfigResult<SmtpClient> {
        Ok(SmtpClient::new(self.smtp_config(sender_address)?)?)
    }

    pub fn dispatch_engine(&self, relay: Arc<dyn MailRelay>) -> DispatchEngine {
        DispatchEngine::new(relay)
            .with_attempt_timeout(Duration::from_secs(self.dispatch.attempt_timeout_secs))
            .with_max_concurrency(self.dispatch.max_concurrency)
    }

    pub fn bulk_sender(&self, token_manager: TokenManager, relay: Arc<dyn MailRelay>) -> BulkSender {
        BulkSender::new(token_manager, self.dispatch_engine(relay))
            .with_max_recipients(self.dispatch.max_recipients)
    }

    pub fn draft_composer(&self) -> ConfigResult<DraftComposer> {
        let api_key = self
            .draft
            .api_key
            .clone()
            .ok_or(ConfigError::Missing("draft.api_key (or GEMINI_API_KEY)"))?;

        let provider = GoogleProvider::new(
            api_key,
            self.draft.model.clone(),
            Duration::from_secs(self.draft.timeout_secs),
        )?
        .with_api_base(self.draft.api_base.clone())
        .with_temperature(self.draft.temperature)
        .with_max_output_tokens(self.draft.max_output_tokens);

        Ok(DraftComposer::new(Arc::new(provider), self.draft.branding()))
    }

    pub fn template_file_path(&self, config_dir: &Path) -> PathBuf {
        self.templates
            .file_path
            .clone()
            .unwrap_or_else(|| config_dir.join(TEMPLATES_FILE))
    }

    /// Template backend chosen by `templates.backend`
    pub fn template_store(
        &self,
        config_dir: &Path,
        token_manager: Option<TokenManager>,
        credential: Option<SharedCredential>,
    ) -> ConfigResult<Box<dyn TemplateStore>> {
        match self.templates.backend {
            TemplateBackend::File => Ok(Box::new(FileTemplateStore::new(
                self.template_file_path(config_dir),
            ))),
            TemplateBackend::Sheets => {
                let spreadsheet_id = self
                    .templates
                    .spreadsheet_id
                    .clone()
                    .ok_or(ConfigError::Missing("templates.spreadsheet_id (or GOOGLE_SHEET_ID)"))?;
                let token_manager = token_manager.ok_or(ConfigError::Missing("oauth settings"))?;
                let credential = credential.ok_or(ConfigError::Missing("stored credential"))?;

                let store = SheetsTemplateStore::new(
                    spreadsheet_id,
                    token_manager,
                    credential,
                    Duration::from_secs(self.templates.timeout_secs),
                )?
                .with_sheet_name(self.templates.sheet_name.clone());
                Ok(Box::new(store))
            }
        }
    }
}
