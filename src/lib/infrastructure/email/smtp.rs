//! SMTP client implementation

use std::{fmt, time::Duration};

use async_trait::async_trait;
use clap::{ArgAction, Args};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        Error as SmtpError, PoolConfig,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::domain::{
    communication::mailer::{
        ConnectAttemptError, DeliverySession, OpenSessionError, OutgoingMessage, RetryPolicy,
        SendError, SmtpClient, SmtpConfig, SmtpConfigError, NETWORK_TIMEOUT,
    },
    configuration::{
        config_value_or, ConfigRepository, SMTP_EMAIL_KEY, SMTP_PASSWORD_KEY, SMTP_PORT_KEY,
        SMTP_SERVER_KEY,
    },
};

/// Port used when neither the command line nor the settings store names one
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// SMTP settings from the command line or environment.
///
/// Anything left unset is read from the settings store by [`SmtpSettings::resolve`].
#[derive(Clone, Args)]
pub struct SmtpSettings {
    /// The SMTP host
    #[arg(long = "smtp-host", env = "SMTP_HOST")]
    pub host: Option<String>,

    /// The SMTP port
    #[arg(long = "smtp-port", env = "SMTP_PORT")]
    pub port: Option<u16>,

    /// The sender address, also used as the login name
    #[arg(long = "smtp-user", env = "SMTP_USER")]
    pub user: Option<String>,

    /// The SMTP password
    #[arg(long = "smtp-password", env = "SMTP_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Verify the server's TLS certificate
    #[arg(
        long = "smtp-verify-tls",
        env = "SMTP_VERIFY_TLS",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub verify_tls: bool,
}

impl SmtpSettings {
    /// Fills unset fields from the settings store and validates the result
    pub async fn resolve<R: ConfigRepository>(
        &self,
        store: &R,
    ) -> Result<SmtpConfig, SmtpConfigError> {
        let host = match &self.host {
            Some(host) => host.clone(),
            None => config_value_or(store, SMTP_SERVER_KEY, "").await,
        };

        let port = match self.port {
            Some(port) => port,
            None => config_value_or(store, SMTP_PORT_KEY, &DEFAULT_SMTP_PORT.to_string())
                .await
                .trim()
                .parse::<u16>()
                .map_err(|_| SmtpConfigError::InvalidPort)?,
        };

        let address = match &self.user {
            Some(user) => user.clone(),
            None => config_value_or(store, SMTP_EMAIL_KEY, "").await,
        };

        let password = match &self.password {
            Some(password) => password.clone(),
            None => config_value_or(store, SMTP_PASSWORD_KEY, "").await,
        };

        let config = SmtpConfig {
            verify_tls: self.verify_tls,
            ..SmtpConfig::new(address.trim(), password, host.trim(), port)
        };

        config.validate()?;

        Ok(config)
    }
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// [`SmtpClient`] backed by a lettre transport holding one connection
#[derive(Default)]
pub struct LettreSmtpClient {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl LettreSmtpClient {
    /// Create a disconnected client
    pub fn new() -> Self {
        Self::default()
    }

    fn transport(config: &SmtpConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, SmtpError> {
        let parameters = TlsParameters::builder(config.host.clone())
            .dangerous_accept_invalid_certs(!config.verify_tls)
            .build()?;

        let tls = if config.implicit_tls() {
            Tls::Wrapper(parameters)
        } else {
            Tls::Required(parameters)
        };

        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(config.host.as_str())
                .port(config.port)
                .tls(tls)
                .credentials(Credentials::new(
                    config.address.clone(),
                    config.password.clone(),
                ))
                .timeout(Some(NETWORK_TIMEOUT))
                .pool_config(PoolConfig::new().max_size(1))
                .build(),
        )
    }
}

impl fmt::Debug for LettreSmtpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LettreSmtpClient")
            .field("connected", &self.transport.is_some())
            .finish()
    }
}

/// Reply codes meaning the server refused the login (RFC 4954)
const CREDENTIALS_REFUSED_CODES: [&str; 2] = ["534", "535"];

/// Whether a failed login or connection test means the credentials were refused
fn is_authentication_failure(err: &SmtpError) -> bool {
    credentials_refused(
        err.status().map(|code| code.to_string()).as_deref(),
        &err.to_string(),
    )
}

fn credentials_refused(code: Option<&str>, message: &str) -> bool {
    match code {
        Some(code) => CREDENTIALS_REFUSED_CODES.contains(&code),
        None => message.to_lowercase().contains("authentication"),
    }
}

#[async_trait]
impl SmtpClient for LettreSmtpClient {
    #[mutants::skip]
    async fn connect(&mut self, config: &SmtpConfig) -> Result<(), ConnectAttemptError> {
        let transport = Self::transport(config)
            .map_err(|err| ConnectAttemptError::Connection(err.to_string()))?;

        debug!(host = %config.host, port = config.port, implicit_tls = config.implicit_tls(), "connecting");

        match transport.test_connection().await {
            Ok(true) => {
                self.transport = Some(transport);

                Ok(())
            }
            Ok(false) => Err(ConnectAttemptError::Connection(
                "server did not respond to NOOP".to_string(),
            )),
            Err(err) if is_authentication_failure(&err) => {
                Err(ConnectAttemptError::Authentication(err.to_string()))
            }
            Err(err) => Err(ConnectAttemptError::Connection(err.to_string())),
        }
    }

    #[mutants::skip]
    async fn send(&mut self, message: &OutgoingMessage) -> Result<(), SendError> {
        let transport = self.transport.as_ref().ok_or(SendError::NotConnected)?;

        let email = Message::builder()
            .from(message.from.parse::<Mailbox>()?)
            .to(message.to.as_str().parse::<Mailbox>()?)
            .subject(message.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                message.plain_body.clone(),
                message.html_body.clone(),
            ))?;

        transport.send(email).await?;

        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.transport.take().is_some() {
            debug!("SMTP transport dropped");
        }
    }
}

/// Opens and closes one session to check the settings
#[mutants::skip]
pub async fn test_smtp(config: &SmtpConfig) -> Result<(), OpenSessionError> {
    let mut session = DeliverySession::new(LettreSmtpClient::new());

    session
        .open(config, RetryPolicy::new(1, Duration::ZERO), |message| {
            info!("{message}")
        })
        .await?;
    session.close().await;

    info!(host = %config.host, port = config.port, "SMTP settings verified");

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use testresult::TestResult;

    use crate::domain::{
        communication::mailer::SessionState,
        configuration::tests::MockConfigRepository,
        recipients::EmailAddress,
    };

    use super::*;

    fn empty_settings() -> SmtpSettings {
        SmtpSettings {
            host: None,
            port: None,
            user: None,
            password: None,
            verify_tls: true,
        }
    }

    fn store(values: &[(&str, &str)]) -> MockConfigRepository {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        let mut store = MockConfigRepository::new();
        store
            .expect_get_config_value()
            .returning(move |key| Ok(values.get(key).cloned()));

        store
    }

    #[tokio::test]
    async fn test_resolve_from_store() -> TestResult {
        let store = store(&[
            (SMTP_SERVER_KEY, "smtp.example.com"),
            (SMTP_PORT_KEY, "465"),
            (SMTP_EMAIL_KEY, "sender@example.com"),
            (SMTP_PASSWORD_KEY, "secret"),
        ]);

        let config = empty_settings().resolve(&store).await?;

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert!(config.implicit_tls());
        assert_eq!(config.address, "sender@example.com");

        Ok(())
    }

    #[tokio::test]
    async fn test_command_line_overrides_store() -> TestResult {
        let store = store(&[
            (SMTP_SERVER_KEY, "smtp.example.com"),
            (SMTP_EMAIL_KEY, "sender@example.com"),
            (SMTP_PASSWORD_KEY, "secret"),
        ]);

        let settings = SmtpSettings {
            host: Some("mail.example.org".into()),
            verify_tls: false,
            ..empty_settings()
        };

        let config = settings.resolve(&store).await?;

        assert_eq!(config.host, "mail.example.org");
        assert_eq!(config.port, DEFAULT_SMTP_PORT);
        assert!(!config.verify_tls);

        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_rejects_incomplete_settings() {
        let store = store(&[(SMTP_SERVER_KEY, "smtp.example.com")]);

        let result = empty_settings().resolve(&store).await;

        assert_eq!(result, Err(SmtpConfigError::MissingField("email")));
    }

    #[tokio::test]
    async fn test_resolve_rejects_invalid_stored_port() {
        let store = store(&[(SMTP_PORT_KEY, "smtp")]);

        let result = empty_settings().resolve(&store).await;

        assert_eq!(result, Err(SmtpConfigError::InvalidPort));
    }

    #[test]
    fn test_only_login_refusals_count_as_authentication_failures() {
        assert!(credentials_refused(Some("535"), "5.7.8 Username and Password not accepted"));
        assert!(credentials_refused(Some("534"), "5.7.9 Application-specific password required"));
        assert!(!credentials_refused(Some("530"), "5.7.0 Must issue a STARTTLS command first"));
        assert!(!credentials_refused(Some("550"), "Authentication relay denied"));
        assert!(!credentials_refused(Some("421"), "Service not available"));
        assert!(credentials_refused(None, "No compatible authentication mechanism was found"));
        assert!(!credentials_refused(None, "Connection refused"));
    }

    #[test]
    fn test_settings_debug_redacts_password() {
        let settings = SmtpSettings {
            password: Some("hunter2".into()),
            ..empty_settings()
        };

        assert!(!format!("{settings:?}").contains("hunter2"));
    }

    #[tokio::test]
    async fn test_send_before_connect() {
        let mut client = LettreSmtpClient::new();
        let message = OutgoingMessage::new(
            "sender@example.com",
            EmailAddress::new_unchecked("ann@example.com"),
            "Hello",
            "<p>Hello</p>",
        );

        assert!(matches!(
            client.send(&message).await,
            Err(SendError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_session_over_unopened_client_closes_cleanly() {
        let mut session = DeliverySession::new(LettreSmtpClient::new());

        session.close().await;

        assert_eq!(session.state(), SessionState::Closed);
    }
}
