//! Phase scheduler: the work/break state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Work --(complete | skip)--> Break | LongBreak --(complete | skip)--> Work
//! ```
//!
//! Each phase is either running or paused. The scheduler owns at most one
//! clock subscription; holding one is what "running" means. Follow-up work
//! that must not happen inside a tick (auto-starting the next phase) is
//! queued and executed by [`Scheduler::run_deferred`].

use crate::clock::{ClockTick, CountdownClock, SubscriptionId};
use crate::notify::{NotificationSink, PhaseCompleted};
use crate::persistence::PreferenceStore;
use crate::preferences::{find_preset, Preferences, Preset};
use anyhow::Result;
use chrono::Local;
use std::collections::VecDeque;
use tempo_ipc::{Phase, PreferenceField, TimerStatus};
use tracing::{debug, info};

/// Work queued by the scheduler for the host loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    AutoStart,
}

/// Where the cycle goes after `phase`, and the session count once there.
pub fn next_phase(phase: Phase, completed_work_sessions: u32, long_break_every: u32) -> (Phase, u32) {
    match phase {
        Phase::Work => {
            let sessions = completed_work_sessions.saturating_add(1);
            let long_break_due = long_break_every > 0 && sessions % long_break_every == 0;
            let next = if long_break_due {
                Phase::LongBreak
            } else {
                Phase::Break
            };
            (next, sessions)
        }
        Phase::Break | Phase::LongBreak => (Phase::Work, completed_work_sessions),
    }
}

pub struct Scheduler {
    store: PreferenceStore,
    clock: Box<dyn CountdownClock>,
    sink: Box<dyn NotificationSink>,
    presets: Vec<Preset>,
    phase: Phase,
    seconds_remaining: u32,
    /// Length the current countdown was built from; preference edits made
    /// while running do not change it.
    phase_total: u32,
    completed_work_sessions: u32,
    subscription: Option<SubscriptionId>,
    deferred: VecDeque<Deferred>,
}

impl Scheduler {
    /// Paused at the start of a full work phase with no completed sessions.
    pub fn new(
        store: PreferenceStore,
        clock: Box<dyn CountdownClock>,
        sink: Box<dyn NotificationSink>,
        presets: Vec<Preset>,
    ) -> Self {
        let seconds_remaining = store.preferences().duration_secs(Phase::Work);
        Self {
            store,
            clock,
            sink,
            presets,
            phase: Phase::Work,
            seconds_remaining,
            phase_total: seconds_remaining,
            completed_work_sessions: 0,
            subscription: None,
            deferred: VecDeque::new(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn completed_work_sessions(&self) -> u32 {
        self.completed_work_sessions
    }

    pub fn preferences(&self) -> &Preferences {
        self.store.preferences()
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    #[cfg(test)]
    pub fn pending(&self) -> impl Iterator<Item = &Deferred> {
        self.deferred.iter()
    }

    #[cfg(test)]
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    pub fn status(&self) -> TimerStatus {
        TimerStatus {
            phase: self.phase(),
            seconds_remaining: self.seconds_remaining(),
            total_seconds: self.phase_total,
            is_running: self.is_running(),
            completed_work_sessions: self.completed_work_sessions(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let id = self.clock.subscribe();
        self.subscription = Some(id);
        info!(
            "{} started with {}s remaining",
            self.phase, self.seconds_remaining
        );
    }

    pub fn pause(&mut self) {
        if self.is_running() {
            info!("{} paused with {}s remaining", self.phase, self.seconds_remaining);
        }
        self.stop();
    }

    pub fn toggle(&mut self) {
        if self.is_running() {
            self.pause();
        } else {
            self.start();
        }
    }

    /// One unit of countdown. Does nothing unless running.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }
        if self.seconds_remaining <= 1 {
            self.seconds_remaining = 0;
            self.complete_phase();
        } else {
            self.seconds_remaining -= 1;
        }
    }

    /// Entry point for the clock; ticks from a cancelled subscription are dropped.
    pub fn on_clock_tick(&mut self, tick: ClockTick) {
        if self.subscription == Some(tick.subscription) {
            self.tick();
        } else {
            debug!("Dropping stale tick from subscription {}", tick.subscription.0);
        }
    }

    /// Skip to the next phase as if the current one had run out, without
    /// starting it.
    pub fn skip(&mut self) {
        self.stop();
        info!("{} skipped", self.phase);
        self.notify_transition();
        self.advance_phase();
    }

    /// Restart the current phase from its full duration.
    pub fn reset_phase(&mut self) {
        self.stop();
        self.rebuild_countdown();
        info!("{} reset", self.phase);
    }

    /// Back to a fresh work phase with no completed sessions.
    pub fn reset_all(&mut self) {
        self.stop();
        self.phase = Phase::Work;
        self.completed_work_sessions = 0;
        self.rebuild_countdown();
        info!("Cycle reset");
    }

    /// Adopt a preset's durations and cadence. The cycle position is kept;
    /// only the current phase's countdown is rebuilt from the new length.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.stop();
        let mut prefs = *self.store.preferences();
        prefs.apply(preset);
        self.store.update(prefs);
        self.rebuild_countdown();
        info!("Applied preset {:?}", preset.label);
    }

    pub fn apply_preset_by_label(&mut self, label: &str) -> Result<()> {
        let preset = find_preset(&self.presets, label)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Unknown preset: {}", label))?;
        self.apply_preset(&preset);
        Ok(())
    }

    /// Write one preference from raw input. While paused, editing the
    /// current phase's length rebuilds the countdown; a running countdown is
    /// left alone until the next reset or transition.
    pub fn set_preference(&mut self, field: PreferenceField, raw: &str) {
        let mut prefs = *self.store.preferences();
        prefs.set(field, raw);
        self.store.update(prefs);
        debug!("Set {} = {}", field, self.store.preferences().get(field));

        if !self.is_running() && Preferences::phase_of(field) == Some(self.phase) {
            self.rebuild_countdown();
        }
    }

    /// Execute queued follow-up work. The host calls this after every input
    /// it hands to the scheduler.
    pub fn run_deferred(&mut self) {
        while let Some(action) = self.deferred.pop_front() {
            match action {
                Deferred::AutoStart => self.start(),
            }
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Refill the countdown from the current phase's configured length.
    fn rebuild_countdown(&mut self) {
        self.phase_total = self.store.preferences().duration_secs(self.phase);
        self.seconds_remaining = self.phase_total;
    }

    /// Release the clock subscription and drop any pending auto-start.
    fn stop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.clock.cancel(id);
        }
        self.deferred.clear();
    }

    fn complete_phase(&mut self) {
        info!("{} complete", self.phase);
        self.notify_transition();
        self.stop();
        self.advance_phase();
        if self.store.preferences().auto_start_next {
            self.deferred.push_back(Deferred::AutoStart);
        }
    }

    fn notify_transition(&self) {
        let prefs = self.store.preferences();
        if !prefs.notifications_enabled {
            return;
        }
        let (next, sessions) =
            next_phase(self.phase, self.completed_work_sessions, prefs.long_break_every);
        self.sink.phase_completed(&PhaseCompleted {
            completed: self.phase,
            next,
            completed_work_sessions: sessions,
            at: Local::now(),
        });
    }

    fn advance_phase(&mut self) {
        let (next, sessions) = next_phase(
            self.phase,
            self.completed_work_sessions,
            self.store.preferences().long_break_every,
        );
        self.phase = next;
        self.completed_work_sessions = sessions;
        self.rebuild_countdown();
        info!(
            "Now in {} ({}s), {} work sessions completed",
            self.phase, self.seconds_remaining, self.completed_work_sessions
        );
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
