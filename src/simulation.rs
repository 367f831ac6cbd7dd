//! # Simulation Control Module
//!
//! Walks a fixed, repeating schedule of heart conditions and drives the
//! signal generator for whichever condition is active.
//!
//! ## Key Components
//! - `ScheduleState`: The condition cycle, current position and tick counter
//! - `SimulationController`: Owns the patient profile and schedule for one session
//! - `PeriodicTask`: Cancellable repeating timer used to push readings
//!
//! ## Cycle
//! `NORMAL → TACHYCARDIA → NORMAL → BRADYCARDIA → NORMAL → ARRHYTHMIA → ...`,
//! each held for three ticks. There is no terminal state; a fresh controller
//! starts again from the first entry.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::generator::{generate, PatientProfile};
use crate::reading::{ConditionType, Reading};

pub const DEFAULT_SEQUENCE: [ConditionType; 6] = [
    ConditionType::Normal,
    ConditionType::Tachycardia,
    ConditionType::Normal,
    ConditionType::Bradycardia,
    ConditionType::Normal,
    ConditionType::Arrhythmia,
];

pub const TICKS_PER_CONDITION: u32 = 3;

/// Position within the condition cycle.
///
/// `index` is always in `[0, sequence.len())` and `tick` in
/// `[0, ticks_per_condition)`; both wrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    sequence: Vec<ConditionType>,
    index: usize,
    tick: u32,
    ticks_per_condition: u32,
}

impl Default for ScheduleState {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE.to_vec(), TICKS_PER_CONDITION)
    }
}

impl ScheduleState {
    /// An empty sequence falls back to a single `Normal` entry and a zero hold
    /// length to one tick.
    pub fn new(sequence: Vec<ConditionType>, ticks_per_condition: u32) -> Self {
        let sequence = if sequence.is_empty() {
            vec![ConditionType::Normal]
        } else {
            sequence
        };
        Self {
            sequence,
            index: 0,
            tick: 0,
            ticks_per_condition: ticks_per_condition.max(1),
        }
    }

    pub fn current(&self) -> ConditionType {
        self.sequence[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Count one tick, moving to the next condition once the hold length is reached.
    pub fn advance(&mut self) {
        self.tick += 1;
        if self.tick >= self.ticks_per_condition {
            self.tick = 0;
            self.index = (self.index + 1) % self.sequence.len();
        }
    }
}

/// Drives the signal generator through the condition cycle.
///
/// One controller per session; it is moved into that session's push task and
/// never shared.
pub struct SimulationController {
    profile: PatientProfile,
    schedule: ScheduleState,
    rng: StdRng,
}

impl SimulationController {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Controller with a caller-supplied random source, e.g. a fixed seed.
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            profile: PatientProfile::default(),
            schedule: ScheduleState::default(),
            rng,
        }
    }

    pub fn profile(&self) -> &PatientProfile {
        &self.profile
    }

    pub fn schedule(&self) -> &ScheduleState {
        &self.schedule
    }

    pub fn current_condition(&self) -> ConditionType {
        self.schedule.current()
    }

    pub fn advance(&mut self) {
        self.schedule.advance();
    }

    /// Generate one reading for the active condition, then advance the schedule.
    ///
    /// Returns the reading together with the condition that produced it.
    pub fn next_reading(&mut self) -> (Reading, ConditionType) {
        let condition = self.schedule.current();

        self.profile.simulate_tachycardia = condition == ConditionType::Tachycardia;
        self.profile.simulate_bradycardia = condition == ConditionType::Bradycardia;
        self.profile.simulate_arrhythmia = condition == ConditionType::Arrhythmia;

        let reading = generate(&self.profile, &mut self.rng);
        self.advance();

        (reading, condition)
    }

    /// Produce a reading every `interval` and hand it to `on_reading`.
    ///
    /// Consumes the controller; the returned task owns it until stopped.
    /// Returning `ControlFlow::Break` from the callback ends the task.
    pub fn run_with_callback<F, Fut>(self, interval: Duration, mut on_reading: F) -> PeriodicTask
    where
        F: FnMut(Reading, ConditionType) -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let mut controller = self;
        PeriodicTask::start(interval, move || {
            let (reading, condition) = controller.next_reading();
            on_reading(reading, condition)
        })
    }
}

impl Default for SimulationController {
    fn default() -> Self {
        Self::new()
    }
}

/// A repeating timer running `on_tick` as an independent tokio task.
///
/// `stop()` prevents future invocations; an invocation already in flight is
/// allowed to finish. Dropping the handle stops the task as well.
pub struct PeriodicTask {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// First invocation happens one `interval` after start.
    pub fn start<F, Fut>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());

        let task_stop = stop.clone();
        let task_wake = wake.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_wake.notified() => break,
                }
                if task_stop.load(Ordering::Acquire) {
                    break;
                }
                if on_tick().await.is_break() {
                    log::debug!("Periodic task ended by its callback");
                    break;
                }
            }
        });

        Self {
            stop,
            wake,
            handle: Some(handle),
        }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Wait for the task to exit, whether stopped or ended by its callback.
    ///
    /// Cancel-safe: dropping this future leaves the task joinable.
    pub async fn finished(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            if let Err(e) = handle.await {
                log::error!("Periodic task failed: {}", e);
            }
            self.handle = None;
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
