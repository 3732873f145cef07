//! Bulk send worker

mod control;
mod events;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver},
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::{
    campaigns::{CampaignRepository, NewOutcome},
    communication::{
        mailer::{
            DeliverySession, OutgoingMessage, RetryPolicy, SendError, SessionState, SmtpClient,
            SmtpConfig,
        },
        templates::render,
    },
    recipients::{EmailAddress, Recipient},
};

pub use control::{spawn_control_reader, SendControl, WorkerState};
pub use events::{DeliveryLog, SendEvent, SendSummary};

use events::EventSink;

/// How often a paused worker checks whether it may continue
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(500);

const UNKNOWN_ADDRESS: &str = "unknown";
const NO_ADDRESS_DETAIL: &str = "No email address found";

/// Everything one bulk send needs
#[derive(Clone, Debug)]
pub struct SendJob {
    /// The campaign outcomes are recorded against
    pub campaign_id: Uuid,

    /// Endpoint and credentials
    pub config: SmtpConfig,

    /// Validated recipients, sent in this order
    pub recipients: Vec<Recipient>,

    /// Subject template
    pub subject_template: String,

    /// HTML body template
    pub body_template: String,

    /// Pause between consecutive sends
    pub delay: Duration,
}

/// Sends one personalised message per recipient over a single session,
/// recording every outcome.
#[derive(Debug)]
pub struct BulkSender<C, R>
where
    C: SmtpClient,
    R: CampaignRepository,
{
    client: C,
    repo: Arc<R>,
    retry: RetryPolicy,
    pause_poll: Duration,
}

impl<C, R> BulkSender<C, R>
where
    C: SmtpClient,
    R: CampaignRepository,
{
    /// Create a new worker
    pub fn new(client: C, repo: Arc<R>) -> Self {
        Self {
            client,
            repo,
            retry: RetryPolicy::default(),
            pause_poll: PAUSE_POLL_INTERVAL,
        }
    }

    /// Override the connection retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Override how often a paused run checks for resume or stop
    pub fn with_pause_poll(mut self, pause_poll: Duration) -> Self {
        self.pause_poll = pause_poll;
        self
    }

    /// Runs the job on a background task.
    ///
    /// The returned handle controls the run and receives its events.
    pub fn start(self, job: SendJob) -> SendHandle {
        let control = SendControl::new();
        let (sender, events) = unbounded_channel();
        let sink = EventSink::new(sender);

        let task = tokio::spawn(self.run(job, control.clone(), sink));

        SendHandle {
            control,
            events,
            task,
        }
    }

    async fn run(self, job: SendJob, control: SendControl, events: EventSink) -> SendSummary {
        let started = Instant::now();
        let total = job.recipients.len() as u32;
        let campaign_id = job.campaign_id;

        info!(%campaign_id, total, "starting bulk send");
        events.status(format!("Starting to send {total} emails..."));

        let mut send_loop = SendLoop {
            job: &job,
            repo: self.repo.as_ref(),
            events: &events,
            successful: 0,
            failed: 0,
        };

        let mut session = DeliverySession::new(self.client);
        let mut stopped = control.is_stopped();

        if !stopped {
            control.set_state(WorkerState::Connecting);

            if let Err(err) = session
                .open(&job.config, self.retry, |message| events.status(message))
                .await
            {
                error!(%campaign_id, %err, "could not open delivery session");

                send_loop.fail_all(&err.to_string()).await;

                return finish(
                    &control,
                    &events,
                    self.repo.as_ref(),
                    campaign_id,
                    send_loop.summary(total, started),
                )
                .await;
            }

            control.set_state(WorkerState::Sending);
        }

        for (index, recipient) in job.recipients.iter().enumerate() {
            if control.is_stopped() {
                stopped = true;
                break;
            }

            if control.is_paused() {
                control.set_state(WorkerState::Paused);
                events.status("Email sending paused");

                while control.is_paused() && !control.is_stopped() {
                    sleep(self.pause_poll).await;
                }

                if control.is_stopped() {
                    stopped = true;
                    break;
                }

                control.set_state(WorkerState::Sending);
                events.status("Email sending resumed");
            }

            send_loop.deliver(&mut session, recipient).await;

            let done = index as u32 + 1;
            events.progress(percent(done, total));

            if done < total && !control.is_stopped() && !job.delay.is_zero() {
                sleep(job.delay).await;
            }
        }

        if stopped {
            control.set_state(WorkerState::Stopping);
            events.status("Email sending stopped by user");
            info!(%campaign_id, "bulk send stopped");
        }

        let was_open = session.state() == SessionState::Ready;
        session.close().await;

        if was_open {
            events.status("SMTP connection closed");
        }

        finish(
            &control,
            &events,
            self.repo.as_ref(),
            campaign_id,
            send_loop.summary(total, started),
        )
        .await
    }
}

async fn finish<R: CampaignRepository>(
    control: &SendControl,
    events: &EventSink,
    repo: &R,
    campaign_id: Uuid,
    summary: SendSummary,
) -> SendSummary {
    if let Err(err) = repo.finish_campaign(&campaign_id).await {
        error!(%campaign_id, %err, "could not mark campaign finished");
    }

    info!(
        %campaign_id,
        successful = summary.successful,
        failed = summary.failed,
        elapsed = ?summary.elapsed,
        "bulk send finished"
    );

    events.status(format!(
        "Completed: {} successful, {} failed in {:.1}s",
        summary.successful,
        summary.failed,
        summary.elapsed.as_secs_f64()
    ));
    events.publish(SendEvent::Completed(summary));
    control.set_state(WorkerState::Completed);

    summary
}

/// `round(100 * done / total)`
fn percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }

    let done = u64::from(done.min(total));
    let total = u64::from(total);

    ((done * 100 + total / 2) / total) as u8
}

struct SendLoop<'a, R: CampaignRepository> {
    job: &'a SendJob,
    repo: &'a R,
    events: &'a EventSink,
    successful: u32,
    failed: u32,
}

impl<'a, R: CampaignRepository> SendLoop<'a, R> {
    async fn deliver<C: SmtpClient>(
        &mut self,
        session: &mut DeliverySession<C>,
        recipient: &Recipient,
    ) {
        let address = recipient.email();
        let name = recipient.name();
        let subject = render(&self.job.subject_template, recipient);

        if address.is_empty() {
            warn!(campaign_id = %self.job.campaign_id, "recipient has no address");
            self.failed += 1;
            self.record(NewOutcome::failure(
                self.job.campaign_id,
                UNKNOWN_ADDRESS,
                name,
                subject,
                NO_ADDRESS_DETAIL,
            ))
            .await;

            return;
        }

        let message = OutgoingMessage::new(
            self.job.config.address.as_str(),
            EmailAddress::new_unchecked(address),
            subject.as_str(),
            render(&self.job.body_template, recipient),
        );

        match session.send(&message).await {
            Ok(()) => {
                self.successful += 1;
                debug!(campaign_id = %self.job.campaign_id, recipient = %address, "sent");
                self.events.status(format!(
                    "Sent to {address} ({}/{})",
                    self.successful,
                    self.job.recipients.len()
                ));
                self.record(NewOutcome::success(
                    self.job.campaign_id,
                    address,
                    name,
                    subject,
                ))
                .await;
            }
            Err(err) => {
                self.failed += 1;

                match &err {
                    SendError::ProtocolError(_) => {
                        warn!(campaign_id = %self.job.campaign_id, recipient = %address, %err, "server rejected message")
                    }
                    _ => {
                        error!(campaign_id = %self.job.campaign_id, recipient = %address, error = ?err, "unexpected error sending message")
                    }
                }

                self.record(NewOutcome::failure(
                    self.job.campaign_id,
                    address,
                    name,
                    subject,
                    err.to_string(),
                ))
                .await;
            }
        }
    }

    /// Records every recipient as failed without contacting the server
    async fn fail_all(&mut self, detail: &str) {
        for recipient in &self.job.recipients {
            let address = match recipient.email() {
                "" => UNKNOWN_ADDRESS,
                address => address,
            };

            self.failed += 1;
            self.record(NewOutcome::failure(
                self.job.campaign_id,
                address,
                recipient.name(),
                render(&self.job.subject_template, recipient),
                detail,
            ))
            .await;
        }

        self.events.progress(100);
    }

    async fn record(&self, outcome: NewOutcome) {
        if let Err(err) = self.repo.record_outcome(&outcome).await {
            error!(
                campaign_id = %outcome.campaign_id,
                recipient = %outcome.address,
                %err,
                "could not record outcome"
            );
        }

        self.events.publish(SendEvent::Delivery(DeliveryLog {
            address: outcome.address,
            name: outcome.name,
            status: outcome.status,
            error: outcome.error.unwrap_or_default(),
        }));
    }

    fn summary(&self, total: u32, started: Instant) -> SendSummary {
        SendSummary {
            successful: self.successful,
            failed: self.failed,
            total,
            elapsed: started.elapsed(),
        }
    }
}

/// Owner's side of a running bulk send
#[derive(Debug)]
pub struct SendHandle {
    control: SendControl,
    events: UnboundedReceiver<SendEvent>,
    task: JoinHandle<SendSummary>,
}

impl SendHandle {
    /// Pause, resume and stop controls
    pub fn control(&self) -> &SendControl {
        &self.control
    }

    /// The next event, or [`None`] once the run is over and every event has been read
    pub async fn next_event(&mut self) -> Option<SendEvent> {
        self.events.recv().await
    }

    /// Waits for the run to end
    pub async fn join(self) -> Result<SendSummary> {
        self.task
            .await
            .map_err(|err| anyhow!("bulk send task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    };

    use testresult::TestResult;

    use crate::domain::{
        campaigns::{tests::MockCampaignRepository, DeliveryStatus},
        communication::mailer::{tests::MockSmtpClient, ConnectAttemptError},
    };

    use super::*;

    fn recipients() -> Vec<Recipient> {
        vec![
            Recipient::new()
                .with("Email", "ann@example.com")
                .with("Name", "Ann"),
            Recipient::new()
                .with("Email", "bob@example.com")
                .with("Name", "Bob"),
            Recipient::new()
                .with("Email", "cat@example.com")
                .with("Name", "Cat"),
        ]
    }

    fn job(recipients: Vec<Recipient>, delay: Duration) -> SendJob {
        SendJob {
            campaign_id: Uuid::now_v7(),
            config: SmtpConfig::new("sender@example.com", "secret", "smtp.example.com", 587),
            recipients,
            subject_template: "Hi {name}".into(),
            body_template: "<p>Hello {name}</p>".into(),
            delay,
        }
    }

    fn connected_client() -> MockSmtpClient {
        let mut client = MockSmtpClient::new();

        client.expect_connect().times(1).returning(|_| Ok(()));
        client.expect_disconnect().times(1).returning(|| ());

        client
    }

    fn recording_repo(outcomes: usize) -> MockCampaignRepository {
        let mut repo = MockCampaignRepository::new();

        repo.expect_record_outcome()
            .times(outcomes)
            .returning(|_| Ok(()));
        repo.expect_finish_campaign()
            .times(1)
            .returning(|_| Ok(()));

        repo
    }

    fn sender(
        client: MockSmtpClient,
        repo: MockCampaignRepository,
    ) -> BulkSender<MockSmtpClient, MockCampaignRepository> {
        BulkSender::new(client, Arc::new(repo))
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO))
            .with_pause_poll(Duration::from_millis(5))
    }

    async fn run(
        sender: BulkSender<MockSmtpClient, MockCampaignRepository>,
        job: SendJob,
        control: SendControl,
    ) -> (SendSummary, Vec<SendEvent>) {
        let (events, mut receiver) = unbounded_channel();
        let summary = sender.run(job, control, EventSink::new(events)).await;

        let mut published = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            published.push(event);
        }

        (summary, published)
    }

    fn statuses(events: &[SendEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                SendEvent::Status { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    fn progress(events: &[SendEvent]) -> Vec<u8> {
        events
            .iter()
            .filter_map(|event| match event {
                SendEvent::Progress { percent } => Some(*percent),
                _ => None,
            })
            .collect()
    }

    fn deliveries(events: &[SendEvent]) -> Vec<&DeliveryLog> {
        events
            .iter()
            .filter_map(|event| match event {
                SendEvent::Delivery(log) => Some(log),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_percent_rounds() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(1, 8), 13);
    }

    #[tokio::test]
    async fn test_sends_to_every_recipient_in_order() {
        let mut client = connected_client();
        let order = Arc::new(Mutex::new(Vec::new()));
        let seen = order.clone();

        client.expect_send().times(3).returning(move |message| {
            seen.lock().unwrap().push(message.to.to_string());
            Ok(())
        });

        let mut repo = MockCampaignRepository::new();
        repo.expect_record_outcome()
            .withf(|outcome| outcome.status == DeliveryStatus::Success && outcome.error.is_none())
            .times(3)
            .returning(|_| Ok(()));
        repo.expect_finish_campaign().times(1).returning(|_| Ok(()));

        let (summary, events) = run(
            sender(client, repo),
            job(recipients(), Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed, summary.total), (3, 0, 3));
        assert_eq!(
            *order.lock().unwrap(),
            ["ann@example.com", "bob@example.com", "cat@example.com"]
        );
        assert_eq!(progress(&events), [33, 67, 100]);
        assert!(matches!(events.last(), Some(SendEvent::Completed(done)) if *done == summary));

        let statuses = statuses(&events);
        assert_eq!(statuses[0], "Starting to send 3 emails...");
        assert_eq!(statuses[1], "Connected to SMTP server");
        assert!(statuses.contains(&"Sent to bob@example.com (2/3)"));
        assert!(statuses.contains(&"SMTP connection closed"));
        assert!(statuses
            .last()
            .is_some_and(|status| status.starts_with("Completed: 3 successful, 0 failed in ")));
    }

    #[tokio::test]
    async fn test_renders_subject_and_body_per_recipient() {
        let mut client = connected_client();

        client
            .expect_send()
            .withf(|message| {
                message.subject == format!("Hi {}", message.plain_body.trim_start_matches("Hello "))
            })
            .times(3)
            .returning(|_| Ok(()));

        let mut repo = MockCampaignRepository::new();
        repo.expect_record_outcome()
            .withf(|outcome| outcome.subject == format!("Hi {}", outcome.name))
            .times(3)
            .returning(|_| Ok(()));
        repo.expect_finish_campaign().times(1).returning(|_| Ok(()));

        let (summary, _) = run(
            sender(client, repo),
            job(recipients(), Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!(summary.successful, 3);
    }

    #[tokio::test]
    async fn test_failed_send_is_recorded_and_loop_continues() {
        let mut client = connected_client();

        client.expect_send().times(3).returning(|message| {
            if message.to.as_str() == "bob@example.com" {
                Err(SendError::ProtocolError("550 mailbox unavailable".into()))
            } else {
                Ok(())
            }
        });

        let mut repo = MockCampaignRepository::new();
        repo.expect_record_outcome()
            .withf(|outcome| {
                (outcome.address == "bob@example.com")
                    == (outcome.status == DeliveryStatus::Failed
                        && outcome.error.as_deref() == Some("SMTP Error: 550 mailbox unavailable"))
            })
            .times(3)
            .returning(|_| Ok(()));
        repo.expect_finish_campaign().times(1).returning(|_| Ok(()));

        let (summary, events) = run(
            sender(client, repo),
            job(recipients(), Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed), (2, 1));

        let logs = deliveries(&events);
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[1].status, DeliveryStatus::Failed);
        assert_eq!(logs[1].error, "SMTP Error: 550 mailbox unavailable");
        assert_eq!(logs[2].error, "");
    }

    #[tokio::test]
    async fn test_unexpected_send_error_does_not_abort() {
        let mut client = connected_client();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        client.expect_send().times(3).returning(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(SendError::UnknownError(anyhow!("connection reset")))
            } else {
                Ok(())
            }
        });

        let (summary, _) = run(
            sender(client, recording_repo(3)),
            job(recipients(), Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed), (2, 1));
    }

    #[tokio::test]
    async fn test_recipient_without_address_is_not_sent() {
        let mut client = connected_client();

        client.expect_send().times(2).returning(|_| Ok(()));

        let mut repo = MockCampaignRepository::new();
        repo.expect_record_outcome()
            .withf(|outcome| {
                (outcome.address == "unknown")
                    == (outcome.error.as_deref() == Some("No email address found"))
            })
            .times(3)
            .returning(|_| Ok(()));
        repo.expect_finish_campaign().times(1).returning(|_| Ok(()));

        let mut rows = recipients();
        rows[1] = Recipient::new().with("Email", "").with("Name", "Bob");

        let (summary, events) = run(
            sender(client, repo),
            job(rows, Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed), (2, 1));
        assert_eq!(deliveries(&events)[1].address, "unknown");
    }

    #[tokio::test]
    async fn test_authentication_failure_fails_every_recipient() {
        let mut client = MockSmtpClient::new();

        client
            .expect_connect()
            .times(1)
            .returning(|_| Err(ConnectAttemptError::Authentication("535 bad credentials".into())));
        client.expect_send().times(0);
        client.expect_disconnect().times(0);

        let mut repo = MockCampaignRepository::new();
        repo.expect_record_outcome()
            .withf(|outcome| {
                outcome.status == DeliveryStatus::Failed
                    && outcome
                        .error
                        .as_deref()
                        .is_some_and(|error| error.contains("535 bad credentials"))
            })
            .times(3)
            .returning(|_| Ok(()));
        repo.expect_finish_campaign().times(1).returning(|_| Ok(()));

        let control = SendControl::new();
        let (summary, events) = run(
            sender(client, repo),
            job(recipients(), Duration::ZERO),
            control.clone(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed, summary.total), (0, 3, 3));
        assert_eq!(control.state(), WorkerState::Completed);
        assert!(statuses(&events).contains(&"Authentication failed. Check credentials."));
        assert_eq!(progress(&events), [100]);
    }

    #[tokio::test]
    async fn test_connection_failure_after_retries() {
        let mut client = MockSmtpClient::new();

        client
            .expect_connect()
            .times(3)
            .returning(|_| Err(ConnectAttemptError::Connection("connection refused".into())));
        client.expect_send().times(0);

        let (summary, events) = run(
            sender(client, recording_repo(3)),
            job(recipients(), Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed), (0, 3));
        assert!(statuses(&events).contains(&"Failed to connect after 3 attempts"));
    }

    #[tokio::test]
    async fn test_stop_before_start_sends_nothing() {
        let mut client = MockSmtpClient::new();

        client.expect_connect().times(0);
        client.expect_send().times(0);
        client.expect_disconnect().times(0);

        let control = SendControl::new();
        control.stop();

        let (summary, events) = run(
            sender(client, recording_repo(0)),
            job(recipients(), Duration::ZERO),
            control,
        )
        .await;

        assert_eq!((summary.successful, summary.failed), (0, 0));
        assert_eq!(summary.unprocessed(), 3);
        assert!(statuses(&events).contains(&"Email sending stopped by user"));
        assert!(deliveries(&events).is_empty());
    }

    #[tokio::test]
    async fn test_stop_mid_run_leaves_rest_unrecorded() {
        let control = SendControl::new();
        let remote = control.clone();
        let mut client = connected_client();

        client.expect_send().times(1).returning(move |_| {
            remote.stop();
            Ok(())
        });

        let (summary, events) = run(
            sender(client, recording_repo(1)),
            job(recipients(), Duration::from_secs(60)),
            control.clone(),
        )
        .await;

        assert_eq!((summary.successful, summary.failed), (1, 0));
        assert_eq!(summary.unprocessed(), 2);
        assert!(summary.elapsed < Duration::from_secs(60));
        assert_eq!(progress(&events), [33]);
        assert_eq!(control.state(), WorkerState::Completed);
    }

    #[tokio::test]
    async fn test_pause_then_resume_continues_from_next_recipient() -> TestResult {
        let control = SendControl::new();
        let remote = control.clone();
        let mut client = connected_client();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = sent.clone();

        client.expect_send().times(3).returning(move |message| {
            let mut log = log.lock().unwrap();

            if log.is_empty() {
                remote.pause();
            }

            log.push(message.to.to_string());
            Ok(())
        });

        let resumer = {
            let control = control.clone();
            let mut state = control.subscribe();

            tokio::spawn(async move {
                let paused = state.wait_for(|state| *state == WorkerState::Paused).await.is_ok();
                control.resume();
                paused
            })
        };

        let (summary, events) = run(
            sender(client, recording_repo(3)),
            job(recipients(), Duration::ZERO),
            control,
        )
        .await;

        assert!(resumer.await?);
        assert_eq!(summary.successful, 3);
        assert_eq!(
            *sent.lock().unwrap(),
            ["ann@example.com", "bob@example.com", "cat@example.com"]
        );

        let statuses = statuses(&events);
        let paused = statuses.iter().position(|s| *s == "Email sending paused");
        let resumed = statuses.iter().position(|s| *s == "Email sending resumed");

        assert!(paused.is_some() && paused < resumed);
        assert_eq!(progress(&events), [33, 67, 100]);

        Ok(())
    }

    #[tokio::test]
    async fn test_stop_while_paused() {
        let control = SendControl::new();
        let remote = control.clone();
        let mut client = connected_client();

        client.expect_send().times(1).returning(move |_| {
            remote.pause();
            Ok(())
        });

        let stopper = {
            let control = control.clone();
            let mut state = control.subscribe();

            tokio::spawn(async move {
                let _ = state.wait_for(|state| *state == WorkerState::Paused).await;
                control.stop();
            })
        };

        let (summary, events) = run(
            sender(client, recording_repo(1)),
            job(recipients(), Duration::ZERO),
            control,
        )
        .await;

        let _ = stopper.await;

        assert_eq!(summary.successful, 1);
        assert!(!statuses(&events).contains(&"Email sending resumed"));
        assert!(statuses(&events).contains(&"Email sending stopped by user"));
    }

    #[tokio::test]
    async fn test_pacing_delay_between_messages() {
        let delay = Duration::from_millis(30);
        let mut client = connected_client();

        client.expect_send().times(3).returning(|_| Ok(()));

        let (summary, _) = run(
            sender(client, recording_repo(3)),
            job(recipients(), delay),
            SendControl::new(),
        )
        .await;

        assert!(summary.elapsed >= delay * 2);
    }

    #[tokio::test]
    async fn test_zero_delay_does_not_sleep() {
        let mut client = connected_client();
        let rows: Vec<Recipient> = (0..5)
            .map(|i| Recipient::new().with("Email", format!("user{i}@example.com")))
            .collect();

        client.expect_send().times(5).returning(|_| Ok(()));

        let (summary, _) = run(
            sender(client, recording_repo(5)),
            job(rows, Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!(summary.successful, 5);
        assert!(summary.elapsed < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_store_failure_does_not_stop_the_run() {
        let mut client = connected_client();

        client.expect_send().times(3).returning(|_| Ok(()));

        let mut repo = MockCampaignRepository::new();
        repo.expect_record_outcome().times(3).returning(|outcome| {
            Err(crate::domain::campaigns::errors::RecordOutcomeError::CampaignNotFound(
                outcome.campaign_id,
            ))
        });
        repo.expect_finish_campaign().times(1).returning(|_| Ok(()));

        let (summary, events) = run(
            sender(client, repo),
            job(recipients(), Duration::ZERO),
            SendControl::new(),
        )
        .await;

        assert_eq!(summary.successful, 3);
        assert_eq!(deliveries(&events).len(), 3);
    }

    #[tokio::test]
    async fn test_start_runs_in_background() -> TestResult {
        let mut client = connected_client();

        client.expect_send().times(3).returning(|_| Ok(()));

        let mut handle = sender(client, recording_repo(3)).start(job(recipients(), Duration::ZERO));

        let mut last = None;
        while let Some(event) = handle.next_event().await {
            last = Some(event);
        }

        let summary = handle.join().await?;

        assert_eq!(summary.successful, 3);
        assert_eq!(last, Some(SendEvent::Completed(summary)));

        Ok(())
    }
}
