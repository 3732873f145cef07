//! Cooperative pause/stop control shared between a running worker and its owner

use std::{
    io::{self, BufRead},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

/// Where a bulk send is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Not started
    Idle,

    /// Opening the delivery session
    Connecting,

    /// Working through recipients
    Sending,

    /// Waiting for resume or stop
    Paused,

    /// Stop observed; closing down
    Stopping,

    /// Finished, whether by completion, stop or connection failure
    Completed,
}

#[derive(Debug)]
struct Flags {
    paused: AtomicBool,
    stopped: AtomicBool,
    state: watch::Sender<WorkerState>,
}

/// Handle for pausing, resuming and stopping a bulk send.
///
/// Flags are only observed between recipients; an in-flight delivery is never
/// interrupted. Stop takes precedence over pause.
#[derive(Clone, Debug)]
pub struct SendControl {
    flags: Arc<Flags>,
}

impl SendControl {
    /// Create a control in the [`WorkerState::Idle`] state
    pub fn new() -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);

        Self {
            flags: Arc::new(Flags {
                paused: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                state,
            }),
        }
    }

    /// Suspend sending before the next recipient
    pub fn pause(&self) {
        if !self.flags.paused.swap(true, Ordering::SeqCst) {
            info!("pause requested");
        }
    }

    /// Continue from the next unprocessed recipient
    pub fn resume(&self) {
        if self.flags.paused.swap(false, Ordering::SeqCst) {
            info!("resume requested");
        }
    }

    /// End the run before the next recipient. Cannot be undone.
    pub fn stop(&self) {
        if !self.flags.stopped.swap(true, Ordering::SeqCst) {
            info!("stop requested");
        }
    }

    /// Whether a pause is in effect
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.flags.stopped.load(Ordering::SeqCst)
    }

    /// The worker's current state
    pub fn state(&self) -> WorkerState {
        *self.flags.state.borrow()
    }

    /// A receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.flags.state.subscribe()
    }

    pub(super) fn set_state(&self, state: WorkerState) {
        self.flags.state.send_replace(state);
    }
}

impl Default for SendControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies line-based commands (`p`ause, `r`esume, `s`top) from `input` to `control`.
///
/// Reads on a detached OS thread outside the async runtime; a pending read does
/// not keep the process alive. The thread ends at end of input or once the run
/// is stopped.
pub fn spawn_control_reader<I>(input: I, control: SendControl) -> io::Result<JoinHandle<()>>
where
    I: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("send-control".into())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else {
                    break;
                };

                match line.trim().to_lowercase().as_str() {
                    "p" | "pause" => control.pause(),
                    "r" | "resume" => control.resume(),
                    "s" | "stop" => control.stop(),
                    "" => {}
                    other => warn!(command = other, "unknown command; use p, r or s"),
                }

                if control.is_stopped() {
                    break;
                }
            }
        })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_pause_resume_stop() {
        let control = SendControl::new();
        let remote = control.clone();

        assert!(!control.is_paused());
        assert!(!control.is_stopped());

        remote.pause();
        assert!(control.is_paused());

        remote.resume();
        assert!(!control.is_paused());

        remote.stop();
        assert!(control.is_stopped());
    }

    #[test]
    fn test_state_is_shared() {
        let control = SendControl::new();
        let receiver = control.subscribe();

        assert_eq!(control.state(), WorkerState::Idle);

        control.clone().set_state(WorkerState::Sending);

        assert_eq!(control.state(), WorkerState::Sending);
        assert_eq!(*receiver.borrow(), WorkerState::Sending);
    }

    #[test]
    fn test_control_reader_applies_commands() {
        let control = SendControl::new();

        spawn_control_reader(Cursor::new("P\n\nbogus\n"), control.clone())
            .expect("spawn")
            .join()
            .expect("reader thread");

        assert!(control.is_paused());
        assert!(!control.is_stopped());
    }

    #[test]
    fn test_control_reader_stops_at_stop_command() {
        let control = SendControl::new();

        spawn_control_reader(Cursor::new("p\nr\nstop\np\n"), control.clone())
            .expect("spawn")
            .join()
            .expect("reader thread");

        assert!(control.is_stopped());
        assert!(!control.is_paused());
    }

    #[test]
    fn test_control_reader_ends_with_input() {
        let control = SendControl::new();

        let reader = spawn_control_reader(Cursor::new(""), control.clone()).expect("spawn");

        assert!(reader.join().is_ok());
        assert!(!control.is_stopped());
    }
}
