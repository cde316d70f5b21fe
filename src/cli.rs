use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::{DraftLanguage, DraftRequest};
use crate::config::{MailcastConfig, TemplateBackend};
use crate::dispatch::{DispatchOutcome, DispatchRequest, DispatchStatus, RecipientList};
use crate::oauth2::{
    CredentialRecord, CredentialStorage, SharedCredential, TokenManager, TokenResponse,
};
use crate::smtp::Sender;
use crate::templates::{Template, TemplateStore};

/// Mailcast - send one message to many recipients through a delegated mail account
#[derive(Parser)]
#[command(name = "mailcast")]
#[command(about = "Bulk mail sender with OAuth2 relay credentials and AI drafts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration directory path
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Dry run mode (validate only, send and write nothing)
    #[arg(long, global = true)]
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message to every recipient
    Send(SendArgs),

    /// Generate a draft subject and body
    Draft(DraftArgs),

    /// Saved template operations
    Template(TemplateArgs),

    /// Stored OAuth2 credential operations
    Credential(CredentialArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct SendArgs {
    /// Sender address
    #[arg(long)]
    pub from: String,

    /// Sender display name
    #[arg(long)]
    pub name: Option<String>,

    /// Subject line (overrides the template's)
    #[arg(long)]
    pub subject: Option<String>,

    /// HTML body (overrides the template's)
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the HTML body from a file
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Recipients, separated by whitespace, commas or semicolons (repeatable)
    #[arg(long)]
    pub to: Vec<String>,

    /// Read recipients from a file
    #[arg(long)]
    pub to_file: Option<PathBuf>,

    /// Start from a saved template
    #[arg(long)]
    pub template: Option<String>,
}

#[derive(Args)]
pub struct DraftArgs {
    /// What the email should say
    #[arg(long)]
    pub prompt: String,

    /// Draft language: english, japanese or korean
    #[arg(long, default_value = "korean")]
    pub language: String,

    /// Save the generated draft as a template with this name
    #[arg(long)]
    pub save_as: Option<String>,
}

#[derive(Args)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommands,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// List saved templates
    List,

    /// Save a new template
    Save {
        /// Template name
        #[arg(long)]
        name: String,

        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,

        /// HTML body
        #[arg(long, conflicts_with = "body_file")]
        body: Option<String>,

        /// Read the HTML body from a file
        #[arg(long)]
        body_file: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub command: CredentialCommands,
}

#[derive(Subcommand)]
pub enum CredentialCommands {
    /// Import a credential from a token response or credential JSON file
    Import {
        /// JSON file with access_token, refresh_token and expires_in (or expires_at)
        #[arg(long)]
        file: PathBuf,
    },

    /// Delete the stored credential
    Remove,

    /// Show the stored credential state
    Status {
        /// Also open an authenticated relay connection as this sender
        #[arg(long, value_name = "ADDRESS")]
        check_relay: Option<String>,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (secrets masked)
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// CLI command handler
pub struct CliHandler {
    config_dir: PathBuf,
    config: MailcastConfig,
    storage: CredentialStorage,
}

impl CliHandler {
    /// Create a new CLI handler, loading configuration and environment overrides
    pub async fn new(config_dir: Option<PathBuf>) -> Result<Self> {
        let config_dir = match config_dir {
            Some(dir) => dir,
            None => MailcastConfig::default_dir()?,
        };

        let mut config = MailcastConfig::load_from_file(&MailcastConfig::file_in(&config_dir))
            .await
            .context("Failed to load configuration")?;
        config.apply_env();
        config.validate()?;

        let storage = CredentialStorage::new(&config_dir)?;

        Ok(Self {
            config_dir,
            config,
            storage,
        })
    }

    pub fn config(&self) -> &MailcastConfig {
        &self.config
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands, dry_run: bool) -> Result<()> {
        match command {
            Commands::Send(args) => self.handle_send(args, dry_run).await,
            Commands::Draft(args) => self.handle_draft(args, dry_run).await,
            Commands::Template(args) => self.handle_template(args, dry_run).await,
            Commands::Credential(args) => self.handle_credential(args, dry_run).await,
            Commands::Config(args) => self.handle_config(args, dry_run).await,
        }
    }

    fn load_credential(&self) -> Result<SharedCredential> {
        let record = self.storage.load()?.ok_or_else(|| {
            anyhow!("No stored credential. Run 'mailcast credential import --file <token.json>' first")
        })?;
        Ok(SharedCredential::new(record))
    }

    /// Persist the record, which may have been refreshed or marked failed.
    ///
    /// Runs after the command's own work has completed and been reported, so
    /// a storage failure is logged rather than replacing the command result.
    async fn persist_credential(&self, credential: &SharedCredential) {
        let record = credential.snapshot().await;
        if let Err(e) = self.storage.save(&record) {
            tracing::error!(
                "Failed to persist credential to {:?}: {}",
                self.storage.credential_path(),
                e
            );
        }
    }

    /// Open the configured template store. The credential is returned when
    /// the store uses it so the caller can persist a refresh.
    fn open_template_store(&self) -> Result<(Box<dyn TemplateStore>, Option<SharedCredential>)> {
        match self.config.templates.backend {
            TemplateBackend::File => Ok((self.config.template_store(&self.config_dir, None, None)?, None)),
            TemplateBackend::Sheets => {
                let credential = self.load_credential()?;
                let store = self.config.template_store(
                    &self.config_dir,
                    Some(self.config.token_manager()?),
                    Some(credential.clone()),
                )?;
                Ok((store, Some(credential)))
            }
        }
    }

    async fn handle_send(&self, args: SendArgs, dry_run: bool) -> Result<()> {
        let template = match &args.template {
            Some(name) => {
                let (store, credential) = self.open_template_store()?;
                let found = store.find(name).await;
                if let Some(credential) = &credential {
                    self.persist_credential(credential).await;
                }
                Some(found?.ok_or_else(|| anyhow!("Template '{}' not found", name))?)
            }
            None => None,
        };

        let subject = args
            .subject
            .clone()
            .or_else(|| template.as_ref().map(|t| t.subject.clone()))
            .unwrap_or_default();
        let body = match read_body(args.body.clone(), args.body_file.as_deref()).await? {
            Some(body) => body,
            None => template.map(|t| t.body).unwrap_or_default(),
        };

        let mut recipients_text = args.to.join("\n");
        if let Some(path) = &args.to_file {
            let from_file = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read recipients from {:?}", path))?;
            recipients_text.push('\n');
            recipients_text.push_str(&from_file);
        }

        let mut sender = Sender::new(args.from.clone());
        if let Some(name) = &args.name {
            sender = sender.with_display_name(name.clone());
        }

        if dry_run {
            let request = DispatchRequest::new(
                sender,
                &subject,
                &body,
                RecipientList::parse(&recipients_text),
                self.config.dispatch.max_recipients,
            )?;
            println!("🔍 Dry run: message is valid");
            println!("   From: {}", request.sender());
            println!("   Subject: {}", request.subject());
            println!("   Recipients: {}", request.recipients().len());
            return Ok(());
        }

        let credential = self.load_credential()?;
        let token_manager = self.config.token_manager()?;
        let relay = Arc::new(self.config.smtp_client(&args.from)?);
        let bulk_sender = self.config.bulk_sender(token_manager, relay);

        let result = bulk_sender
            .send_bulk(&credential, sender, &subject, &body, &recipients_text)
            .await;
        let reported = result
            .map_err(anyhow::Error::from)
            .and_then(|outcome| report_outcome(&outcome));
        self.persist_credential(&credential).await;
        reported
    }

    async fn handle_draft(&self, args: DraftArgs, dry_run: bool) -> Result<()> {
        let language: DraftLanguage = args.language.parse()?;
        let composer = self.config.draft_composer()?;
        let request = DraftRequest::new(args.prompt, language);

        if dry_run {
            println!("{}", composer.build_prompt(&request));
            return Ok(());
        }

        let draft = composer.compose(&request).await?;
        println!("Subject: {}", draft.subject);
        println!();
        println!("{}", draft.body);

        if let Some(name) = args.save_as {
            let (store, credential) = self.open_template_store()?;
            let result = store
                .append(Template::new(name.clone(), draft.subject, draft.body)?)
                .await;
            if result.is_ok() {
                println!("\n✅ Saved as template '{}'", name);
            }
            if let Some(credential) = &credential {
                self.persist_credential(credential).await;
            }
            result?;
        }

        Ok(())
    }

    async fn handle_template(&self, args: TemplateArgs, dry_run: bool) -> Result<()> {
        match args.command {
            TemplateCommands::List => {
                let (store, credential) = self.open_template_store()?;
                let result = store.list().await;
                let listed = result.map(|templates| {
                    if templates.is_empty() {
                        println!("No templates saved");
                    }
                    for template in templates {
                        println!("📋 {} - {}", template.name, template.subject);
                    }
                });
                if let Some(credential) = &credential {
                    self.persist_credential(credential).await;
                }
                Ok(listed?)
            }
            TemplateCommands::Save {
                name,
                subject,
                body,
                body_file,
            } => {
                let body = read_body(body, body_file.as_deref()).await?.unwrap_or_default();
                let template = Template::new(name, subject, body)?;

                if dry_run {
                    println!("🔍 Dry run: would save template '{}'", template.name);
                    return Ok(());
                }

                let (store, credential) = self.open_template_store()?;
                let name = template.name.clone();
                let result = store.append(template).await;
                if result.is_ok() {
                    println!("✅ Saved template '{}'", name);
                }
                if let Some(credential) = &credential {
                    self.persist_credential(credential).await;
                }
                Ok(result?)
            }
        }
    }

    async fn handle_credential(&self, args: CredentialArgs, dry_run: bool) -> Result<()> {
        match args.command {
            CredentialCommands::Import { file } => {
                let content = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("Failed to read {:?}", file))?;
                let record = parse_credential_json(&content)?;

                if dry_run {
                    println!("🔍 Dry run: credential expiring at {} is valid JSON", record.expires_at);
                    return Ok(());
                }

                self.storage.save(&record)?;
                println!("✅ Credential imported to {:?}", self.storage.credential_path());
                Ok(())
            }
            CredentialCommands::Remove => {
                let path = self.storage.credential_path();
                if dry_run {
                    println!("🔍 Dry run: would delete {:?}", path);
                    return Ok(());
                }
                self.storage.delete()?;
                println!("✅ Credential removed from {:?}", path);
                Ok(())
            }
            CredentialCommands::Status { check_relay } => {
                let credential = self.load_credential()?;
                let record = credential.snapshot().await;
                let state = credential.state().await;

                println!("🔑 Credential: {}", state);
                println!("   Expires at: {}", record.expires_at.to_rfc3339());
                println!(
                    "   Refresh token: {}",
                    if record.can_refresh() { "present" } else { "missing" }
                );
                if let Some(error) = &record.error {
                    println!("   Error: {} (since {})", error.reason, error.failed_at.to_rfc3339());
                }

                if !dry_run && record.error.is_none() && record.is_expired() && record.can_refresh() {
                    let token_manager: TokenManager = self.config.token_manager()?;
                    match token_manager.ensure_valid(&credential).await {
                        Ok(valid) => println!("✅ Refreshed, valid until {}", valid.expires_at().to_rfc3339()),
                        Err(e) => println!("❌ Refresh failed: {}", e),
                    }
                    self.persist_credential(&credential).await;
                }

                if let Some(address) = check_relay {
                    if dry_run {
                        println!("🔍 Dry run: skipping relay check");
                        return Ok(());
                    }
                    let token_manager = self.config.token_manager()?;
                    let valid = token_manager.ensure_valid(&credential).await;
                    self.persist_credential(&credential).await;
                    let client = self.config.smtp_client(&address)?;
                    client.test_connection(&valid?).await?;
                    println!(
                        "✅ Relay {}:{} accepted the credential",
                        client.config().server,
                        client.config().port
                    );
                }
                Ok(())
            }
        }
    }

    async fn handle_config(&self, args: ConfigArgs, dry_run: bool) -> Result<()> {
        match args.command {
            ConfigCommands::Show => {
                let masked = masked(&self.config);
                println!("# {}", MailcastConfig::file_in(&self.config_dir).display());
                println!("{}", toml::to_string_pretty(&masked)?);
                Ok(())
            }
            ConfigCommands::Init { force } => {
                let path = MailcastConfig::file_in(&self.config_dir);
                if path.exists() && !force {
                    return Err(anyhow!("{:?} already exists (use --force to overwrite)", path));
                }
                if dry_run {
                    println!("🔍 Dry run: would write {:?}", path);
                    return Ok(());
                }
                MailcastConfig::default().save_to_file(&path).await?;
                println!("✅ Wrote default configuration to {:?}", path);
                Ok(())
            }
        }
    }
}

/// Print the per-recipient report. Anything short of full delivery is an error.
fn report_outcome(outcome: &DispatchOutcome) -> Result<()> {
    match outcome.status() {
        DispatchStatus::AllDelivered => {
            println!("✅ {}", outcome.summary());
            Ok(())
        }
        DispatchStatus::Partial | DispatchStatus::AllFailed => {
            println!("❌ {}", outcome.summary());
            for failure in &outcome.failures {
                println!("   - {}", failure);
            }
            Err(anyhow!(
                "{} of {} deliveries failed",
                outcome.failed_count(),
                outcome.attempted
            ))
        }
    }
}

async fn read_body(inline: Option<String>, file: Option<&Path>) -> Result<Option<String>> {
    if let Some(body) = inline {
        return Ok(Some(body));
    }
    match file {
        Some(path) => {
            let body = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read body from {:?}", path))?;
            Ok(Some(body))
        }
        None => Ok(None),
    }
}

/// Accept either a stored credential record or a raw token endpoint response
pub fn parse_credential_json(content: &str) -> Result<CredentialRecord> {
    if let Ok(mut record) = serde_json::from_str::<CredentialRecord>(content) {
        // Importing is a fresh authorization
        record.error = None;
        return Ok(record);
    }

    let response: TokenResponse = serde_json::from_str(content)
        .context("Expected a credential record or a token response with access_token")?;
    if response.access_token.is_empty() {
        return Err(anyhow!("access_token is empty"));
    }
    Ok(CredentialRecord::from_response(&response)?)
}

fn masked(config: &MailcastConfig) -> MailcastConfig {
    let hide = |value: &Option<String>| value.as_ref().map(|_| "********".to_string());
    let mut masked = config.clone();
    masked.oauth.client_secret = hide(&config.oauth.client_secret);
    masked.smtp.app_password = hide(&config.smtp.app_password);
    masked.draft.api_key = hide(&config.draft.api_key);
    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::CredentialState;
    use chrono::Utc;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send_command() {
        let cli = Cli::try_parse_from([
            "mailcast",
            "--dry-run",
            "send",
            "--from",
            "me@example.com",
            "--subject",
            "Hi",
            "--body",
            "<p>Hi</p>",
            "--to",
            "a@x.com, b@x.com",
            "--to",
            "c@x.com",
        ])
        .unwrap();

        assert!(cli.dry_run);
        match cli.command {
            Commands::Send(args) => {
                assert_eq!(args.from, "me@example.com");
                assert_eq!(args.to.len(), 2);
            }
            _ => panic!("expected send"),
        }
    }

    #[test]
    fn test_body_and_body_file_conflict() {
        let result = Cli::try_parse_from([
            "mailcast", "send", "--from", "me@example.com", "--body", "x", "--body-file", "b.html",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_token_response_json() {
        let record = parse_credential_json(
            r#"{"access_token": "ya29", "refresh_token": "1//r", "expires_in": 3599, "token_type": "Bearer"}"#,
        )
        .unwrap();
        assert_eq!(record.access_token, "ya29");
        assert_eq!(record.refresh_token.as_deref(), Some("1//r"));
        assert!(record.expires_at > Utc::now());
    }

    #[test]
    fn test_parse_record_json_clears_error() {
        let mut record = CredentialRecord::new("a".to_string(), Some("r".to_string()), Utc::now());
        record.mark_failed("revoked");
        let json = serde_json::to_string(&record).unwrap();

        let parsed = parse_credential_json(&json).unwrap();
        assert!(parsed.error.is_none());
        assert_eq!(parsed.state_at(Utc::now() - chrono::Duration::hours(1)), CredentialState::Valid);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_credential_json("{}").is_err());
        assert!(parse_credential_json("not json").is_err());
    }

    #[test]
    fn test_masked_hides_secrets() {
        let mut config = MailcastConfig::default();
        config.draft.api_key = Some("secret".to_string());
        let masked = masked(&config);
        assert_eq!(masked.draft.api_key.as_deref(), Some("********"));
        assert!(masked.smtp.app_password.is_none());
    }

    #[tokio::test]
    async fn test_dry_run_send_never_needs_credential() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();

        let cli = Cli::try_parse_from([
            "mailcast", "send", "--from", "me@example.com", "--subject", "Hi", "--body", "<p>x</p>",
            "--to", "a@x.com;b@x.com",
        ])
        .unwrap();

        handler.handle_command(cli.command, true).await.unwrap();
        assert!(!handler.storage.credential_path().exists());
    }

    #[tokio::test]
    async fn test_dry_run_send_rejects_too_many_recipients() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();
        let recipients: Vec<String> = (0..301).map(|i| format!("user{}@x.com", i)).collect();

        let args = SendArgs {
            from: "me@example.com".to_string(),
            name: None,
            subject: Some("Hi".to_string()),
            body: Some("<p>x</p>".to_string()),
            body_file: None,
            to: vec![recipients.join(",")],
            to_file: None,
            template: None,
        };

        assert!(handler.handle_command(Commands::Send(args), true).await.is_err());
    }

    #[tokio::test]
    async fn test_template_save_and_send_from_template() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();

        handler
            .handle_command(
                Commands::Template(TemplateArgs {
                    command: TemplateCommands::Save {
                        name: "welcome".to_string(),
                        subject: "Welcome".to_string(),
                        body: Some("<p>Hello</p>".to_string()),
                        body_file: None,
                    },
                }),
                false,
            )
            .await
            .unwrap();
        assert!(dir.path().join("templates.json").exists());

        let args = SendArgs {
            from: "me@example.com".to_string(),
            name: Some("Me".to_string()),
            subject: None,
            body: None,
            body_file: None,
            to: vec!["a@x.com".to_string()],
            to_file: None,
            template: Some("welcome".to_string()),
        };
        handler.handle_command(Commands::Send(args), true).await.unwrap();
    }

    #[tokio::test]
    async fn test_credential_import_and_status() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();
        let token_file = dir.path().join("token.json");
        std::fs::write(
            &token_file,
            r#"{"access_token": "ya29", "refresh_token": "r", "expires_in": 3600}"#,
        )
        .unwrap();

        handler
            .handle_command(
                Commands::Credential(CredentialArgs {
                    command: CredentialCommands::Import { file: token_file },
                }),
                false,
            )
            .await
            .unwrap();

        let stored = handler.storage.load().unwrap().unwrap();
        assert_eq!(stored.access_token, "ya29");

        handler
            .handle_command(
                Commands::Credential(CredentialArgs {
                    command: CredentialCommands::Status { check_relay: None },
                }),
                false,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_config_init_respects_existing_file() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();
        let init = |force| {
            Commands::Config(ConfigArgs {
                command: ConfigCommands::Init { force },
            })
        };

        handler.handle_command(init(false), false).await.unwrap();
        assert!(MailcastConfig::file_in(dir.path()).exists());
        assert!(handler.handle_command(init(false), false).await.is_err());
        handler.handle_command(init(true), false).await.unwrap();
    }

    fn credential_command(command: CredentialCommands) -> Commands {
        Commands::Credential(CredentialArgs { command })
    }

    #[tokio::test]
    async fn test_credential_remove_deletes_stored_record() {
        let dir = tempdir().unwrap();
        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();
        handler
            .storage
            .save(&CredentialRecord::new("a".to_string(), None, Utc::now()))
            .unwrap();

        handler
            .handle_command(credential_command(CredentialCommands::Remove), true)
            .await
            .unwrap();
        assert!(handler.storage.credential_path().exists());

        handler
            .handle_command(credential_command(CredentialCommands::Remove), false)
            .await
            .unwrap();
        assert!(!handler.storage.credential_path().exists());
        assert!(handler
            .handle_command(credential_command(CredentialCommands::Status { check_relay: None }), false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_refresh_result_survives_unwritable_credential_store() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let mut config = MailcastConfig::default();
        config.oauth.client_id = "client".to_string();
        config.oauth.token_url = format!("{}/token", server.uri());
        config.save_to_file(&MailcastConfig::file_in(dir.path())).await.unwrap();

        let handler = CliHandler::new(Some(dir.path().to_path_buf())).await.unwrap();
        handler
            .storage
            .save(&CredentialRecord::new(
                "stale".to_string(),
                Some("refresh".to_string()),
                Utc::now() - chrono::Duration::minutes(1),
            ))
            .unwrap();
        std::fs::create_dir(dir.path().join("credential.json.tmp")).unwrap();

        handler
            .handle_command(credential_command(CredentialCommands::Status { check_relay: None }), false)
            .await
            .unwrap();

        let stored = handler.storage.load().unwrap().unwrap();
        assert_eq!(stored.access_token, "stale");
    }

    #[test]
    fn test_report_outcome_fails_on_partial_delivery() {
        use crate::dispatch::{DeliveryAttempt, DeliveryErrorKind};

        let delivered = DispatchOutcome::from_attempts(vec![DeliveryAttempt::delivered("a@x.com")]);
        assert!(report_outcome(&delivered).is_ok());

        let partial = DispatchOutcome::from_attempts(vec![
            DeliveryAttempt::delivered("a@x.com"),
            DeliveryAttempt::failed("b@x.com", DeliveryErrorKind::Rejected("550".to_string())),
        ]);
        let err = report_outcome(&partial).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 deliveries failed");
    }
}
