//! Mailer module

mod config;
mod errors;
mod message;
mod session;

use async_trait::async_trait;

#[cfg(test)]
use mockall::mock;

pub use config::{SmtpConfig, SmtpConfigError, IMPLICIT_TLS_PORT, NETWORK_TIMEOUT};
pub use errors::{ConnectAttemptError, OpenSessionError, SendError};
pub use message::OutgoingMessage;
pub use session::{DeliverySession, RetryPolicy, SessionState};

/// A client for a single SMTP connection
#[async_trait]
pub trait SmtpClient: Send + 'static {
    /// Opens and authenticates one connection.
    ///
    /// Makes a single attempt; retrying is the [`DeliverySession`]'s job.
    ///
    /// # Arguments
    /// * `config` - The endpoint and credentials to connect with.
    ///
    /// # Returns
    /// - [`Ok`] once the server has accepted the credentials.
    /// - [`Err`] with [`ConnectAttemptError::Authentication`] if the credentials were rejected,
    ///   or [`ConnectAttemptError::Connection`] for anything worth retrying.
    async fn connect(&mut self, config: &SmtpConfig) -> Result<(), ConnectAttemptError>;

    /// Transmits one message over the open connection.
    async fn send(&mut self, message: &OutgoingMessage) -> Result<(), SendError>;

    /// Terminates the connection, if any.
    async fn disconnect(&mut self);
}

#[cfg(test)]
mock! {
    pub SmtpClient {}

    #[async_trait]
    impl SmtpClient for SmtpClient {
        async fn connect(&mut self, config: &SmtpConfig) -> Result<(), ConnectAttemptError>;
        async fn send(&mut self, message: &OutgoingMessage) -> Result<(), SendError>;
        async fn disconnect(&mut self);
    }
}

#[cfg(test)]
pub mod tests {
    pub use super::MockSmtpClient;
}
