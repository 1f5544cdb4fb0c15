//! Phase-completion notifications.

use anyhow::Result;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tempo_ipc::Phase;
use tracing::{debug, warn};

/// Snapshot taken at the moment a phase ran out (or was skipped).
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCompleted {
    pub completed: Phase,
    pub next: Phase,
    pub completed_work_sessions: u32,
    pub at: DateTime<Local>,
}

impl PhaseCompleted {
    pub fn summary(&self) -> String {
        format!("{} complete", self.completed)
    }

    pub fn body(&self) -> String {
        match self.next {
            Phase::Work => "Back to work.".to_string(),
            Phase::Break => format!(
                "Take a short break. {} session{} done.",
                self.completed_work_sessions,
                if self.completed_work_sessions == 1 { "" } else { "s" }
            ),
            Phase::LongBreak => format!(
                "Time for a long break. {} sessions done.",
                self.completed_work_sessions
            ),
        }
    }
}

/// Receives completion events. Must return promptly; the scheduler does not
/// wait on it and ignores whatever happens downstream.
pub trait NotificationSink {
    fn phase_completed(&self, event: &PhaseCompleted);
}

type Deliver = dyn Fn(&str, &str) -> Result<()> + Send + Sync;

/// Desktop notification through the platform notification daemon.
pub struct DesktopNotifier {
    deliver: Arc<Deliver>,
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::with_delivery(show_desktop)
    }
}

impl DesktopNotifier {
    /// Route summary and body somewhere other than the notification daemon.
    pub fn with_delivery(
        deliver: impl Fn(&str, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }
}

fn show_desktop(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .appname("tempo")
        .show()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(())
}

impl NotificationSink for DesktopNotifier {
    fn phase_completed(&self, event: &PhaseCompleted) {
        let summary = event.summary();
        let body = event.body();
        debug!(
            "Dispatching notification: {} at {}",
            summary,
            event.at.format("%H:%M:%S")
        );
        // Talking to the notification daemon can block, keep it off the loop.
        let deliver = Arc::clone(&self.deliver);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = deliver(&summary, &body) {
                warn!("Failed to send notification: {:#}", e);
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    pub struct RecordingSink {
        pub events: Rc<RefCell<Vec<PhaseCompleted>>>,
    }

    impl NotificationSink for RecordingSink {
        fn phase_completed(&self, event: &PhaseCompleted) {
            self.events.borrow_mut().push(event.clone());
        }
    }

    fn event(next: Phase, sessions: u32) -> PhaseCompleted {
        PhaseCompleted {
            completed: Phase::Work,
            next,
            completed_work_sessions: sessions,
            at: Local::now(),
        }
    }

    #[tokio::test]
    async fn desktop_delivery_happens_off_the_caller() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let notifier = DesktopNotifier::with_delivery(move |summary, body| {
            tx.send((summary.to_string(), body.to_string()))?;
            Ok(())
        });
        notifier.phase_completed(&event(Phase::LongBreak, 4));

        let (summary, body) = rx.recv().await.unwrap();
        assert_eq!(summary, "Work complete");
        assert_eq!(body, "Time for a long break. 4 sessions done.");
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let notifier = DesktopNotifier::with_delivery(|_, _| Err(anyhow::anyhow!("no daemon")));
        notifier.phase_completed(&event(Phase::Break, 1));
        tokio::task::yield_now().await;
    }

    #[test]
    fn body_mentions_what_comes_next() {
        assert_eq!(event(Phase::Break, 1).body(), "Take a short break. 1 session done.");
        assert_eq!(
            event(Phase::LongBreak, 4).body(),
            "Time for a long break. 4 sessions done."
        );
        assert_eq!(event(Phase::Work, 4).summary(), "Work complete");
    }
}
