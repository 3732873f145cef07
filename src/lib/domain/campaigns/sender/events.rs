//! Events published by a running bulk send

use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::campaigns::DeliveryStatus;

/// One recipient's result, as shown in a live log
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeliveryLog {
    /// Recipient address, `unknown` when the row had none
    pub address: String,

    /// Recipient display name
    pub name: String,

    /// Delivery result
    pub status: DeliveryStatus,

    /// Failure detail, empty on success
    pub error: String,
}

/// Final counts for a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    /// Deliveries accepted by the server
    pub successful: u32,

    /// Deliveries that failed
    pub failed: u32,

    /// Recipients in the job
    pub total: u32,

    /// Wall-clock duration of the run
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

impl SendSummary {
    /// Recipients never attempted because the run was stopped
    pub fn unprocessed(&self) -> u32 {
        self.total.saturating_sub(self.successful + self.failed)
    }
}

fn as_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

/// An event from a running bulk send, delivered in send order
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SendEvent {
    /// Overall progress, non-decreasing within a run
    Progress {
        /// 0 to 100
        percent: u8,
    },

    /// One recipient processed
    Delivery(DeliveryLog),

    /// A human-readable state change
    Status {
        /// The message
        message: String,
    },

    /// The run is over; always the last event
    Completed(SendSummary),
}

/// Publishing side of the event channel. Never blocks; events sent after the
/// receiver is dropped are discarded.
#[derive(Clone, Debug)]
pub(super) struct EventSink {
    sender: UnboundedSender<SendEvent>,
}

impl EventSink {
    pub(super) fn new(sender: UnboundedSender<SendEvent>) -> Self {
        Self { sender }
    }

    pub(super) fn publish(&self, event: SendEvent) {
        let _ = self.sender.send(event);
    }

    pub(super) fn status(&self, message: impl Into<String>) {
        self.publish(SendEvent::Status {
            message: message.into(),
        });
    }

    pub(super) fn progress(&self, percent: u8) {
        self.publish(SendEvent::Progress { percent });
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;
    use tokio::sync::mpsc::unbounded_channel;

    use super::*;

    #[test]
    fn test_events_serialize_tagged() -> TestResult {
        let event = SendEvent::Status {
            message: "Connected to SMTP server".into(),
        };

        assert_eq!(
            serde_json::to_string(&event)?,
            r#"{"event":"status","message":"Connected to SMTP server"}"#
        );

        let event = SendEvent::Completed(SendSummary {
            successful: 2,
            failed: 1,
            total: 3,
            elapsed: Duration::from_millis(1500),
        });

        assert_eq!(
            serde_json::to_string(&event)?,
            r#"{"event":"completed","successful":2,"failed":1,"total":3,"elapsed_secs":1.5}"#
        );

        Ok(())
    }

    #[test]
    fn test_publish_after_receiver_dropped_is_ignored() {
        let (sender, receiver) = unbounded_channel();
        let sink = EventSink::new(sender);

        drop(receiver);

        sink.progress(50);
    }

    #[test]
    fn test_unprocessed() {
        let summary = SendSummary {
            successful: 2,
            failed: 1,
            total: 5,
            elapsed: Duration::ZERO,
        };

        assert_eq!(summary.unprocessed(), 2);
    }
}
