use crate::oauth2::ValidCredential;
use crate::smtp::{MailRelay, SmtpAuth, SmtpError, SmtpResult, SmtpSecurity};
use async_trait::async_trait;
use lettre::{
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{Tls, TlsParameters},
        PoolConfig,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::time::Duration;
use tokio::sync::RwLock;

type Transport = AsyncSmtpTransport<Tokio1Executor>;

/// SMTP client configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub security: SmtpSecurity,
    pub auth: SmtpAuth,
    pub timeout: Duration,
    pub pool_max_size: u32,
}

impl SmtpConfig {
    pub fn new(server: String, port: u16, auth: SmtpAuth) -> Self {
        Self {
            server,
            port,
            security: SmtpSecurity::StartTls,
            auth,
            timeout: Duration::from_secs(30),
            pool_max_size: 10,
        }
    }

    /// Gmail relay authorized with the OAuth2 access token
    pub fn gmail_oauth2(username: String) -> Self {
        Self::new(
            "smtp.gmail.com".to_string(),
            587,
            SmtpAuth::OAuth2 { username },
        )
    }

    /// Gmail relay authorized with an app password
    pub fn gmail_app_password(username: String, password: String) -> Self {
        Self::new(
            "smtp.gmail.com".to_string(),
            587,
            SmtpAuth::Plain { username, password },
        )
    }

    pub fn with_security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pool_size(mut self, max_size: u32) -> Self {
        self.pool_max_size = max_size;
        self
    }

    pub fn validate(&self) -> SmtpResult<()> {
        if self.server.is_empty() {
            return Err(SmtpError::InvalidConfig("SMTP server cannot be empty".to_string()));
        }
        if self.port == 0 {
            return Err(SmtpError::InvalidConfig("SMTP port cannot be zero".to_string()));
        }
        if self.auth.username().is_empty() {
            return Err(SmtpError::InvalidConfig("SMTP username cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Transport built for one bearer token
struct CachedTransport {
    access_token: Option<String>,
    transport: Transport,
}

/// SMTP relay client.
///
/// The pooled transport is rebuilt only when the bearer token changes, so all
/// deliveries of a batch share one pool.
pub struct SmtpClient {
    config: SmtpConfig,
    cached: RwLock<Option<CachedTransport>>,
}

impl SmtpClient {
    /// Create a new SMTP client. No connection is opened until the first delivery.
    pub fn new(config: SmtpConfig) -> SmtpResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cached: RwLock::new(None),
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    /// Build the lettre transport from configuration
    fn build_transport(config: &SmtpConfig, access_token: Option<&str>) -> SmtpResult<Transport> {
        let mut builder = Transport::builder_dangerous(&config.server)
            .port(config.port)
            .timeout(Some(config.timeout))
            .pool_config(PoolConfig::new().max_size(config.pool_max_size));

        builder = match config.security {
            SmtpSecurity::None => builder.tls(Tls::None),
            SmtpSecurity::StartTls => builder.tls(Tls::Required(Self::tls_parameters(config)?)),
            SmtpSecurity::Tls => builder.tls(Tls::Wrapper(Self::tls_parameters(config)?)),
        };

        builder = match &config.auth {
            SmtpAuth::OAuth2 { username } => {
                let token = access_token.ok_or_else(|| {
                    SmtpError::InvalidConfig("OAuth2 relay needs an access token".to_string())
                })?;
                builder
                    .credentials(Credentials::new(username.clone(), token.to_string()))
                    .authentication(vec![Mechanism::Xoauth2])
            }
            SmtpAuth::Plain { username, password } => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .authentication(vec![Mechanism::Plain]),
        };

        Ok(builder.build())
    }

    fn tls_parameters(config: &SmtpConfig) -> SmtpResult<TlsParameters> {
        TlsParameters::new(config.server.clone())
            .map_err(|e| SmtpError::ConnectionFailed(format!("TLS configuration failed: {}", e)))
    }

    /// Transport for this token, reusing the cached one when possible
    async fn transport_for(&self, credential: &ValidCredential) -> SmtpResult<Transport> {
        let token = self
            .config
            .auth
            .uses_bearer_token()
            .then(|| credential.access_token().to_string());

        {
            let cached = self.cached.read().await;
            if let Some(cached) = cached.as_ref() {
                if cached.access_token == token {
                    return Ok(cached.transport.clone());
                }
            }
        }

        let mut cached = self.cached.write().await;
        if let Some(existing) = cached.as_ref() {
            if existing.access_token == token {
                return Ok(existing.transport.clone());
            }
        }

        tracing::debug!(
            "Building SMTP transport for {}:{}",
            self.config.server,
            self.config.port
        );
        let transport = Self::build_transport(&self.config, token.as_deref())?;
        *cached = Some(CachedTransport {
            access_token: token,
            transport: transport.clone(),
        });
        Ok(transport)
    }

    /// Test the SMTP connection
    pub async fn test_connection(&self, credential: &ValidCredential) -> SmtpResult<()> {
        let transport = self.transport_for(credential).await?;

        match transport.test_connection().await {
            Ok(true) => {
                tracing::info!(
                    "SMTP connection test successful for {}:{}",
                    self.config.server,
                    self.config.port
                );
                Ok(())
            }
            Ok(false) => Err(SmtpError::ConnectionFailed(format!(
                "{}:{} did not accept the connection",
                self.config.server, self.config.port
            ))),
            Err(e) => {
                tracing::error!("SMTP connection test failed: {}", e);
                Err(SmtpError::ConnectionFailed(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl MailRelay for SmtpClient {
    async fn deliver(&self, credential: &ValidCredential, message: Message) -> SmtpResult<()> {
        let transport = self.transport_for(credential).await?;

        match transport.send(message).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_permanent() => Err(SmtpError::Rejected(e.to_string())),
            Err(e) => Err(SmtpError::SendFailed(e.to_string())),
        }
    }
}
