//! Delivery session: one authenticated SMTP connection

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use super::{
    ConnectAttemptError, OpenSessionError, OutgoingMessage, SendError, SmtpClient, SmtpConfig,
};

/// Where a [`DeliverySession`] is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Never opened, or the last open failed
    Disconnected,

    /// An open is in progress
    Connecting,

    /// Authenticated and able to send
    Ready,

    /// Closed by the owner
    Closed,
}

/// How often and how patiently to retry a failed connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total connection attempts, including the first
    pub max_attempts: u32,

    /// Pause between consecutive attempts
    pub pause: Duration,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(max_attempts: u32, pause: Duration) -> Self {
        Self {
            max_attempts,
            pause,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// A single SMTP connection used to send zero or more messages.
///
/// A failed send leaves the session open; closing and reopening is up to the owner.
#[derive(Debug)]
pub struct DeliverySession<C: SmtpClient> {
    client: C,
    state: SessionState,
}

impl<C: SmtpClient> DeliverySession<C> {
    /// Create a disconnected session
    pub fn new(client: C) -> Self {
        Self {
            client,
            state: SessionState::Disconnected,
        }
    }

    /// The current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Connects and authenticates, retrying connection failures.
    ///
    /// Authentication failures are reported immediately. `on_status` receives
    /// human-readable progress messages (connected, retrying, giving up).
    pub async fn open<F>(
        &mut self,
        config: &SmtpConfig,
        policy: RetryPolicy,
        on_status: F,
    ) -> Result<(), OpenSessionError>
    where
        F: Fn(String) + Send + Sync,
    {
        if self.state == SessionState::Ready {
            return Ok(());
        }

        let attempts = policy.max_attempts.max(1);
        let mut last_reason = String::new();

        self.state = SessionState::Connecting;

        for attempt in 1..=attempts {
            match self.client.connect(config).await {
                Ok(()) => {
                    info!(host = %config.host, port = config.port, attempt, "connected to SMTP server");
                    self.state = SessionState::Ready;
                    on_status("Connected to SMTP server".to_string());

                    return Ok(());
                }
                Err(ConnectAttemptError::Authentication(reason)) => {
                    error!(host = %config.host, port = config.port, %reason, "SMTP authentication failed");
                    self.state = SessionState::Disconnected;
                    on_status("Authentication failed. Check credentials.".to_string());

                    return Err(OpenSessionError::AuthenticationFailed(reason));
                }
                Err(ConnectAttemptError::Connection(reason)) => {
                    warn!(host = %config.host, port = config.port, attempt, %reason, "SMTP connection attempt failed");
                    last_reason = reason;

                    if attempt < attempts {
                        on_status(format!(
                            "Connection failed, retrying in {}s... (Attempt {attempt}/{attempts})",
                            policy.pause.as_secs()
                        ));
                        sleep(policy.pause).await;
                    }
                }
            }
        }

        self.state = SessionState::Disconnected;
        on_status(format!("Failed to connect after {attempts} attempts"));

        Err(OpenSessionError::ConnectionFailed {
            attempts,
            reason: last_reason,
        })
    }

    /// Sends one message over the open session
    pub async fn send(&mut self, message: &OutgoingMessage) -> Result<(), SendError> {
        if self.state != SessionState::Ready {
            return Err(SendError::NotConnected);
        }

        self.client.send(message).await
    }

    /// Closes the session. Closing a closed session does nothing.
    pub async fn close(&mut self) {
        match self.state {
            SessionState::Closed => {}
            SessionState::Disconnected => self.state = SessionState::Closed,
            SessionState::Connecting | SessionState::Ready => {
                self.client.disconnect().await;
                self.state = SessionState::Closed;
            }
        }
    }
}
