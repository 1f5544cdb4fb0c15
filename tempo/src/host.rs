//! The host loop's single step, shared by the TUI and headless modes.
//!
//! Every wakeup (clock tick, IPC request, terminal event) is handed to the
//! scheduler one at a time, and whatever the scheduler deferred while
//! handling it runs before the next wakeup is awaited.

use crate::clock::ClockTick;
use crate::ipc::server::{self, Request};
use crate::scheduler::Scheduler;
use std::convert::Infallible;
use std::future::Future;
use tokio::sync::mpsc;

/// Owner of the scheduler plus whatever local events it consumes.
pub trait Driver {
    type Local;

    fn scheduler(&mut self) -> &mut Scheduler;
    fn local(&mut self, event: Self::Local);
}

/// Headless mode has no local events.
impl Driver for Scheduler {
    type Local = Infallible;

    fn scheduler(&mut self) -> &mut Scheduler {
        self
    }

    fn local(&mut self, event: Infallible) {
        match event {}
    }
}

pub struct Host {
    ticks: mpsc::UnboundedReceiver<ClockTick>,
    requests: mpsc::Receiver<Request>,
}

impl Host {
    pub fn new(
        ticks: mpsc::UnboundedReceiver<ClockTick>,
        requests: mpsc::Receiver<Request>,
    ) -> Self {
        Self { ticks, requests }
    }

    /// Wait for one wakeup, apply it, then drain deferred work.
    ///
    /// Returns `false` once every source has closed. Cancel safe: dropping
    /// the future before a wakeup arrives loses nothing.
    pub async fn step<D, F>(&mut self, driver: &mut D, local: F) -> bool
    where
        D: Driver,
        F: Future<Output = Option<D::Local>>,
    {
        tokio::select! {
            Some(tick) = self.ticks.recv() => driver.scheduler().on_clock_tick(tick),
            Some(request) = self.requests.recv() => {
                let response = server::dispatch(driver.scheduler(), request.command);
                let _ = request.reply.send(response);
            }
            Some(event) = local => driver.local(event),
            else => return false,
        }
        driver.scheduler().run_deferred();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::notify::tests::RecordingSink;
    use crate::persistence::{MemoryKeyValue, PreferenceStore};
    use crate::preferences::{Preferences, Preset};
    use std::future::pending;
    use tempo_ipc::{Command, Phase, Response};
    use tokio::sync::oneshot;

    /// Real clock whose ticks pass through a channel the test can also feed.
    fn scheduler_with_clock(
        prefs: Preferences,
    ) -> (Scheduler, Host, mpsc::UnboundedSender<ClockTick>, mpsc::Sender<Request>) {
        let mut store = PreferenceStore::open(Box::new(MemoryKeyValue::default()));
        store.update(prefs);
        let (clock, mut clock_ticks) = TokioClock::new();
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let forward = tick_tx.clone();
        tokio::spawn(async move {
            while let Some(tick) = clock_ticks.recv().await {
                if forward.send(tick).is_err() {
                    break;
                }
            }
        });
        let (request_tx, requests) = mpsc::channel(4);
        let scheduler = Scheduler::new(
            store,
            Box::new(clock),
            Box::new(RecordingSink::default()),
            Preset::builtin(),
        );
        (scheduler, Host::new(ticks, requests), tick_tx, request_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn auto_start_runs_between_wakeups() {
        let (mut scheduler, mut host, inject, _requests) = scheduler_with_clock(Preferences {
            work_minutes: 1,
            auto_start_next: true,
            ..Preferences::default()
        });
        scheduler.start();
        let work = scheduler.subscription().unwrap();

        for _ in 0..60 {
            assert!(host.step(&mut scheduler, pending::<Option<Infallible>>()).await);
        }
        assert_eq!(scheduler.phase(), Phase::Break);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.seconds_remaining(), 300);
        let fresh = scheduler.subscription().unwrap();
        assert_ne!(fresh, work);

        inject.send(ClockTick { subscription: work }).unwrap();
        assert!(host.step(&mut scheduler, pending::<Option<Infallible>>()).await);
        assert_eq!(scheduler.seconds_remaining(), 300);

        assert!(host.step(&mut scheduler, pending::<Option<Infallible>>()).await);
        assert_eq!(scheduler.seconds_remaining(), 299);
        assert_eq!(scheduler.subscription(), Some(fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_answered_in_turn() {
        let (mut scheduler, mut host, _inject, requests) =
            scheduler_with_clock(Preferences::default());
        let (reply, answer) = oneshot::channel();
        requests
            .send(Request {
                command: Command::Start,
                reply,
            })
            .await
            .unwrap();

        assert!(host.step(&mut scheduler, pending::<Option<Infallible>>()).await);
        assert_eq!(answer.await.unwrap(), Response::Ok);
        assert!(scheduler.is_running());
        assert!(scheduler.subscription().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn local_events_reach_the_driver() {
        struct Counting {
            scheduler: Scheduler,
            seen: Vec<u8>,
        }

        impl Driver for Counting {
            type Local = u8;

            fn scheduler(&mut self) -> &mut Scheduler {
                &mut self.scheduler
            }

            fn local(&mut self, event: u8) {
                self.seen.push(event);
                self.scheduler.toggle();
            }
        }

        let (scheduler, mut host, _inject, _requests) =
            scheduler_with_clock(Preferences::default());
        let mut driver = Counting {
            scheduler,
            seen: Vec::new(),
        };
        assert!(host.step(&mut driver, async { Some(7) }).await);
        assert_eq!(driver.seen, [7]);
        assert!(driver.scheduler.is_running());
    }
}
