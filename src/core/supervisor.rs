//! # Supervisor: owns the process pool and drives the control signal.
//!
//! The [`Supervisor`] is the master process. It forks the configured workers,
//! replaces them as they exit, and turns OS signals into control-signal
//! escalations that the workers poll.
//!
//! ## Key responsibilities
//! - spawn left/center/right workers and keep the pool table exact
//! - reap exited children and apply the respawn rule
//! - run the restart and stop drains on a one-tick timer
//! - publish [`Event`]s to the [`Bus`] and fan them out to subscribers
//!
//! ## Event loop
//! ```text
//! run():
//!   current-thread runtime
//!   register SIGCHLD, SIGTERM, SIGINT (+ SIGUSR1 in daemon mode)
//!   start(): fork workers; non-daemon → FinishLeft + stop drain
//!   reap once
//!   loop {
//!     select! {
//!       SIGCHLD   ─► reap_exited() ─► reboot_process(pid, how) for each
//!       SIGUSR1   ─► request_restart()   (latched)
//!       SIGTERM   ─► request_stop()      (latched)
//!       tick      ─► restart drain (if armed) else stop drain
//!                      Unblock ─► push sentinels
//!                      StopAll ─► escalate + push sentinels
//!                      Exit    ─► leave loop
//!     }
//!   }
//!   publish MasterExiting, flush subscribers, return RunReport
//! ```
//!
//! ## Respawn rule
//! | signal                 | left  | center | right |
//! |------------------------|-------|--------|-------|
//! | None                   | yes   | yes    | yes   |
//! | FinishLeft / StopLeft  | no    | yes    | yes   |
//! | Restart / StopAll      | no    | no     | no    |
//!
//! ## Example
//! ```no_run
//! use pipevisor::{Message, PipelineConfig, Supervisor};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = PipelineConfig {
//!         left_process: 1,
//!         center_process: 4,
//!         right_process: 1,
//!         queue_name: "example".into(),
//!         ..PipelineConfig::default()
//!     };
//!
//!     let report = Supervisor::builder(cfg)
//!         .on_left_start(|w| {
//!             let mut n = 0u64;
//!             while !w.should_stop() {
//!                 w.input_queue().push_wait(&Message::json(&n)?)?;
//!                 n += 1;
//!             }
//!             Ok(())
//!         })
//!         .on_center_message(|w, msg| {
//!             let n: u64 = msg.decode_json()?;
//!             w.output_queue().push_wait(&Message::json(&(n * n))?)?;
//!             Ok(())
//!         })
//!         .on_right_message(|_, msg| {
//!             println!("{}", msg.as_str().unwrap_or_default());
//!             Ok(())
//!         })
//!         .build()?
//!         .run()?;
//!
//!     println!("{:?} after {} ticks", report.outcome, report.ticks);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use nix::unistd::Pid;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

use super::builder::SupervisorBuilder;
use super::config::PipelineConfig;
use super::drain::{DrainStep, DrainView, RestartDrain, StopDrain};
use super::pool::{ProcessPool, Slot};
use super::reap::{Termination, reap_exited};
use super::signals::{MasterSignal, MasterSignals};
use super::spawn::{Spawn, set_process_title};
use crate::control::{ControlSignal, SignalCell};
use crate::error::PipelineError;
use crate::events::{Bus, Event, EventKind};
use crate::queue::Queue;
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::workers::Role;

/// How the master left its loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Graceful stop completed (or a non-daemon run finished).
    Stopped,
    /// Restart cutover: a fresh instance is expected to take over.
    Restarted,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Stopped => "stopped",
            Outcome::Restarted => "restarted",
        }
    }
}

/// Summary returned by [`Supervisor::run`].
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Why the master exited.
    pub outcome: Outcome,
    /// Drain ticks observed.
    pub ticks: u32,
    /// Workers still alive when the master exited (restart deadline hit).
    pub abandoned: Vec<Pid>,
}

/// The master process: pool table, control signal, drains.
pub struct Supervisor {
    cfg: PipelineConfig,
    signal: SignalCell,
    input: Queue,
    output: Queue,
    pool: ProcessPool,
    spawner: Box<dyn Spawn>,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,

    restart: Option<RestartDrain>,
    stop: Option<StopDrain>,
    restart_latched: bool,
    stop_latched: bool,
    ticks: u32,
}

impl Supervisor {
    /// Starts building a supervisor for `cfg`.
    pub fn builder(cfg: PipelineConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: PipelineConfig,
        signal: SignalCell,
        input: Queue,
        output: Queue,
        spawner: Box<dyn Spawn>,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Self {
        Self {
            cfg,
            signal,
            input,
            output,
            pool: ProcessPool::new(),
            spawner,
            bus,
            subscribers,
            restart: None,
            stop: None,
            restart_latched: false,
            stop_latched: false,
            ticks: 0,
        }
    }

    /// Effective (normalized) configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    /// Event bus; attach receivers before calling [`Supervisor::run`].
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Current control signal.
    pub fn signal(&self) -> ControlSignal {
        self.signal.get()
    }

    /// Live workers.
    pub fn pool(&self) -> &ProcessPool {
        &self.pool
    }

    /// Left → center queue.
    pub fn input_queue(&self) -> &Queue {
        &self.input
    }

    /// Center → right queue.
    pub fn output_queue(&self) -> &Queue {
        &self.output
    }

    /// Whether a drain is armed and the tick timer must run.
    pub fn is_draining(&self) -> bool {
        self.restart.is_some() || self.stop.is_some()
    }

    /// Spawns every configured worker. In non-daemon mode also starts the stop drain.
    ///
    /// A failing `fork` here is an error: the pipeline never reached its configured size.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        for role in Role::ALL {
            for worker_id in 0..self.cfg.count(role) {
                let slot = Slot::new(role, worker_id);
                self.spawn_slot(slot)?;
            }
        }
        tracing::info!(
            workers = self.pool.len(),
            left = self.cfg.left_process,
            center = self.cfg.center_process,
            right = self.cfg.right_process,
            mode = ?self.cfg.mode,
            "pipeline started"
        );

        if !self.cfg.is_daemon() {
            self.stop_latched = true;
            self.publish(Event::new(EventKind::StopRequested));
            self.escalate(ControlSignal::FinishLeft);
            self.stop = Some(StopDrain::new());
        }
        Ok(())
    }

    /// Handles one reaped child: drops its entry and respawns it if the signal allows.
    ///
    /// An unknown pid is an invariant violation and returns [`PipelineError::NoSuchPid`].
    /// A failing respawn is logged and published, not returned.
    pub fn reboot_process(&mut self, pid: Pid, how: Termination) -> Result<(), PipelineError> {
        let entry = self
            .pool
            .remove(pid)
            .ok_or(PipelineError::NoSuchPid { pid })?;
        let slot = entry.slot;
        self.pool.record_exit(slot, how.is_success());

        let mut exited = Event::new(EventKind::WorkerExited)
            .with_role(slot.role)
            .with_worker_id(slot.worker_id)
            .with_pid(pid.as_raw());
        match how.exit_code() {
            Some(code) => exited = exited.with_exit_code(code),
            None => exited = exited.with_reason(how.to_string()),
        }
        self.publish(exited);

        let signal = self.signal.get();
        if !signal.permits_respawn(slot.role) {
            tracing::debug!(role = %slot.role, worker_id = slot.worker_id, %signal, "not respawning");
            self.publish(
                Event::new(EventKind::RespawnSkipped)
                    .with_role(slot.role)
                    .with_worker_id(slot.worker_id)
                    .with_signal(signal),
            );
            return Ok(());
        }

        if let Err(err) = self.spawn_slot(slot) {
            tracing::error!(role = %slot.role, worker_id = slot.worker_id, error = %err, "respawn failed");
            self.publish(
                Event::new(EventKind::SpawnFailed)
                    .with_role(slot.role)
                    .with_worker_id(slot.worker_id)
                    .with_reason(err.to_string()),
            );
        }
        Ok(())
    }

    /// Reaps every exited child and applies [`Supervisor::reboot_process`] to each.
    ///
    /// A child that is not in the pool aborts the run: the surviving workers
    /// are told to stop (`StopAll` plus one sentinel per consumer) before the
    /// error is returned, so none of them outlives the master unnoticed.
    pub fn reap(&mut self) -> Result<(), PipelineError> {
        self.apply_exits(reap_exited())
    }

    fn apply_exits(
        &mut self,
        exits: impl IntoIterator<Item = (Pid, Termination)>,
    ) -> Result<(), PipelineError> {
        for (pid, how) in exits {
            if let Err(err) = self.reboot_process(pid, how) {
                tracing::error!(error = %err, "aborting pipeline, stopping every worker");
                self.escalate(ControlSignal::StopAll);
                let view = self.drain_view();
                self.unblock(view.center_alive, view.right_alive);
                return Err(err);
            }
        }
        Ok(())
    }

    /// SIGUSR1: smooth restart. Ignored outside daemon mode and after the first call.
    pub fn request_restart(&mut self) {
        if !self.cfg.is_daemon() || self.restart_latched {
            return;
        }
        self.restart_latched = true;
        tracing::info!("restart requested");
        self.publish(Event::new(EventKind::RestartRequested));
        self.escalate(ControlSignal::Restart);
        self.restart = Some(RestartDrain::new());
    }

    /// SIGTERM/SIGINT: graceful stop. Ignored after the first call.
    pub fn request_stop(&mut self) {
        if self.stop_latched {
            return;
        }
        self.stop_latched = true;
        tracing::info!("stop requested");
        self.publish(Event::new(EventKind::StopRequested));
        if self.cfg.is_daemon() {
            self.escalate(ControlSignal::StopLeft);
        }
        self.stop = Some(StopDrain::new());
    }

    /// One drain tick. Returns `true` when the master should exit.
    ///
    /// The restart drain takes precedence when both are armed.
    pub fn tick(&mut self) -> bool {
        let view = self.drain_view();
        let step = match (self.restart.as_mut(), self.stop.as_mut()) {
            (Some(drain), _) => drain.on_tick(&view),
            (None, Some(drain)) => drain.on_tick(&view),
            (None, None) => return false,
        };
        self.ticks += 1;
        tracing::debug!(tick = self.ticks, ?view, ?step, "drain tick");

        match step {
            DrainStep::Continue => false,
            DrainStep::Unblock { center, right } => {
                self.unblock(center, right);
                false
            }
            DrainStep::StopAll { center, right } => {
                self.escalate(ControlSignal::StopAll);
                self.unblock(center, right);
                false
            }
            DrainStep::Exit => true,
        }
    }

    /// Runs the master until a drain completes.
    ///
    /// Builds its own current-thread runtime, so it must not be called from
    /// inside another tokio runtime.
    pub fn run(mut self) -> Result<RunReport, PipelineError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        rt.block_on(async move {
            set_process_title(&format!("{} master", self.cfg.name));
            let listener = self.subscriber_listener();

            let result = self.drive().await;
            let report = self.report();
            self.publish(
                Event::new(EventKind::MasterExiting)
                    .with_count(report.abandoned.len())
                    .with_reason(report.outcome.as_str()),
            );
            let _ = listener.await;

            if !report.abandoned.is_empty() {
                tracing::warn!(alive = report.abandoned.len(), "master exiting with live workers");
            }
            result.map(|()| report)
        })
    }

    async fn drive(&mut self) -> Result<(), PipelineError> {
        let mut signals = MasterSignals::register(self.cfg.is_daemon())?;
        self.start()?;
        self.reap()?;

        let mut ticker: Option<Interval> = None;
        loop {
            if ticker.is_none() && self.is_draining() {
                ticker = Some(self.new_ticker());
            }
            let tick = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                sig = signals.recv() => match sig {
                    MasterSignal::ChildExited => self.reap()?,
                    MasterSignal::Restart => self.request_restart(),
                    MasterSignal::Stop => self.request_stop(),
                },
                _ = tick => {
                    if self.tick() {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn new_ticker(&self) -> Interval {
        let period = self.cfg.tick();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Spawns the bus → subscriber fan-out task. It ends after forwarding `MasterExiting`.
    fn subscriber_listener(&mut self) -> JoinHandle<()> {
        let set = SubscriberSet::new(std::mem::take(&mut self.subscribers), self.bus.clone());
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        let last = ev.kind == EventKind::MasterExiting;
                        set.emit(&ev);
                        if last {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            set.shutdown().await;
        })
    }

    fn report(&self) -> RunReport {
        RunReport {
            outcome: if self.restart.is_some() {
                Outcome::Restarted
            } else {
                Outcome::Stopped
            },
            ticks: self.ticks,
            abandoned: self.pool.pids(),
        }
    }

    fn spawn_slot(&mut self, slot: Slot) -> Result<(), PipelineError> {
        let attempt = self.pool.streak(slot);
        let pid = self.spawner.spawn(slot, attempt)?;
        self.pool.insert(pid, slot)?;
        tracing::debug!(role = %slot.role, worker_id = slot.worker_id, %pid, attempt, "worker spawned");
        self.publish(
            Event::new(EventKind::WorkerSpawned)
                .with_role(slot.role)
                .with_worker_id(slot.worker_id)
                .with_pid(pid.as_raw())
                .with_attempt(attempt),
        );
        Ok(())
    }

    fn escalate(&mut self, next: ControlSignal) {
        if self.signal.escalate(next) {
            tracing::info!(signal = %next, "control signal raised");
            self.publish(Event::new(EventKind::SignalRaised).with_signal(next));
        }
    }

    /// Pushes one sentinel per parked consumer so it can observe the signal.
    fn unblock(&mut self, center: usize, right: usize) {
        let mut pushed = 0;
        for (queue, n, label) in [(&self.input, center, "input"), (&self.output, right, "output")] {
            for _ in 0..n {
                match queue.push_empty() {
                    Ok(()) => pushed += 1,
                    Err(error) => {
                        tracing::warn!(queue = label, %error, "failed to push sentinel");
                        break;
                    }
                }
            }
        }
        if pushed > 0 {
            self.publish(
                Event::new(EventKind::WorkersUnblocked)
                    .with_count(pushed)
                    .with_signal(self.signal.get()),
            );
        }
    }

    fn drain_view(&self) -> DrainView {
        DrainView {
            pool_len: self.pool.len(),
            left_alive: self.pool.count(Role::Left),
            center_alive: self.pool.count(Role::Center),
            right_alive: self.pool.count(Role::Right),
            queues_empty: queue_is_empty(&self.input, "input")
                && queue_is_empty(&self.output, "output"),
        }
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }
}

/// Emptiness check for the stop drain. A failing check counts as "not empty".
fn queue_is_empty(queue: &Queue, label: &'static str) -> bool {
    match queue.is_empty() {
        Ok(empty) => empty,
        Err(error) => {
            tracing::warn!(queue = label, %error, "queue depth query failed");
            false
        }
    }
}
