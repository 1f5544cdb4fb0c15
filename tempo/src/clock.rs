//! Countdown clock: the only thing that moves time forward.
//!
//! A subscription produces roughly one [`ClockTick`] per second until it is
//! cancelled. Ticks carry the id of the subscription that produced them so
//! the scheduler can drop ticks that were already in flight when it
//! cancelled.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub subscription: SubscriptionId,
}

pub trait CountdownClock {
    fn subscribe(&mut self) -> SubscriptionId;

    /// Stop a subscription. Unknown or already-cancelled ids are ignored.
    fn cancel(&mut self, id: SubscriptionId);
}

/// Clock backed by tokio timers, one task per live subscription.
pub struct TokioClock {
    period: Duration,
    ticks: mpsc::UnboundedSender<ClockTick>,
    next_id: u64,
    tasks: HashMap<SubscriptionId, JoinHandle<()>>,
}

impl TokioClock {
    pub const PERIOD: Duration = Duration::from_secs(1);

    /// Create a clock whose ticks arrive on the returned receiver.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClockTick>) {
        Self::with_period(Self::PERIOD)
    }

    pub fn with_period(period: Duration) -> (Self, mpsc::UnboundedReceiver<ClockTick>) {
        let (ticks, rx) = mpsc::unbounded_channel();
        let clock = Self {
            period,
            ticks,
            next_id: 1,
            tasks: HashMap::new(),
        };
        (clock, rx)
    }

    #[cfg(test)]
    pub fn active_subscriptions(&self) -> usize {
        self.tasks.len()
    }
}

impl CountdownClock for TokioClock {
    fn subscribe(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let period = self.period;
        let first = Instant::now() + period;
        let ticks = self.ticks.clone();
        let task = tokio::spawn(async move {
            let mut interval = interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if ticks.send(ClockTick { subscription: id }).is_err() {
                    break;
                }
            }
        });
        trace!("Clock subscription {} started", id.0);
        self.tasks.insert(id, task);
        id
    }

    fn cancel(&mut self, id: SubscriptionId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
            trace!("Clock subscription {} cancelled", id.0);
        }
    }
}

impl Drop for TokioClock {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Subscribe/cancel log shared with the test that built the clock.
    #[derive(Debug, Default)]
    pub struct ClockLog {
        pub next_id: u64,
        pub active: Vec<SubscriptionId>,
        pub subscribed: usize,
        pub cancelled: usize,
    }

    /// Clock that never ticks on its own; tests deliver ticks by hand.
    #[derive(Clone, Default)]
    pub struct ManualClock {
        pub log: Rc<RefCell<ClockLog>>,
    }

    impl CountdownClock for ManualClock {
        fn subscribe(&mut self) -> SubscriptionId {
            let mut log = self.log.borrow_mut();
            log.next_id += 1;
            log.subscribed += 1;
            let id = SubscriptionId(log.next_id);
            log.active.push(id);
            id
        }

        fn cancel(&mut self, id: SubscriptionId) {
            let mut log = self.log.borrow_mut();
            if let Some(pos) = log.active.iter().position(|&active| active == id) {
                log.active.remove(pos);
                log.cancelled += 1;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_arrive_once_per_period_until_cancelled() {
        let (mut clock, mut rx) = TokioClock::new();
        let id = clock.subscribe();

        tokio::time::advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        for _ in 0..3 {
            let tick = rx.recv().await.unwrap();
            assert_eq!(tick.subscription, id);
        }

        clock.cancel(id);
        assert_eq!(clock.active_subscriptions(), 0);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        clock.cancel(id);
    }

    #[tokio::test(start_paused = true)]
    async fn each_subscription_gets_a_fresh_id() {
        let (mut clock, _rx) = TokioClock::new();
        let first = clock.subscribe();
        clock.cancel(first);
        let second = clock.subscribe();
        assert_ne!(first, second);
        drop(clock);
    }
}
