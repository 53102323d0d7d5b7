use std::sync::Arc;

use super::config::PipelineConfig;
use super::spawn::{ForkSpawner, Spawn};
use super::supervisor::Supervisor;
use crate::control::SignalCell;
use crate::error::PipelineError;
use crate::events::Bus;
use crate::queue::{Message, Queue, SpillSettings, Transport};
use crate::subscribers::Subscribe;
use crate::workers::{
    Callbacks, ErrorReporter, Handler, Hook, Role, RunSettings, TracingReporter, Worker,
};

/// Builder for a [`Supervisor`]: configuration, callbacks, subscribers.
pub struct SupervisorBuilder {
    cfg: PipelineConfig,
    callbacks: Callbacks,
    reporter: Arc<dyn ErrorReporter>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    transports: Option<(Arc<dyn Transport>, Arc<dyn Transport>)>,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PipelineConfig) -> Self {
        Self {
            cfg,
            callbacks: Callbacks::default(),
            reporter: Arc::new(TracingReporter),
            subscribers: Vec::new(),
            transports: None,
        }
    }

    /// Producer body. Required when left workers are configured.
    pub fn on_left_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.set_left_start(f);
        self
    }

    pub fn on_center_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.set_center_start(f);
        self
    }

    /// Center message handler. Required when center workers are configured.
    pub fn on_center_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.set_center_message(f);
        self
    }

    pub fn on_right_start<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.set_right_start(f);
        self
    }

    /// Right message handler. Required when right workers are configured.
    pub fn on_right_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&Worker, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.set_right_message(f);
        self
    }

    /// Binds `handler` to `hook`.
    pub fn on(mut self, hook: Hook, handler: Handler) -> Result<Self, PipelineError> {
        self.callbacks.on(hook, handler)?;
        Ok(self)
    }

    /// Binds `handler` to the hook called `name` (`"center_message"`, ...).
    ///
    /// An unknown name fails with [`PipelineError::UnknownEvent`].
    pub fn on_named(self, name: &str, handler: Handler) -> Result<Self, PipelineError> {
        let hook: Hook = name.parse()?;
        self.on(hook, handler)
    }

    /// Replaces the callbacks wholesale.
    pub fn with_callbacks(mut self, callbacks: Callbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Sets where workers report callback failures. Defaults to [`TracingReporter`].
    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive master events through dedicated tasks with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses the given transports instead of the kernel queues derived from `queue_name`.
    ///
    /// Both must survive `fork`: the children inherit them by value.
    pub fn with_transports(mut self, input: Arc<dyn Transport>, output: Arc<dyn Transport>) -> Self {
        self.transports = Some((input, output));
        self
    }

    /// Validates the callbacks, opens the queues and the control cell.
    pub fn build(mut self) -> Result<Supervisor, PipelineError> {
        let cfg = self.cfg.normalized();
        check_required(&cfg, &self.callbacks)?;
        let (input, output) = self.open_queues()?;
        let settings = RunSettings {
            max_executions: cfg.max_executions,
            daemon: cfg.is_daemon(),
            failure_backoff: cfg.failure_backoff(),
        };
        let signal = SignalCell::new()?;
        let spawner = ForkSpawner::new(
            Arc::from(cfg.name.as_str()),
            input.clone(),
            output.clone(),
            signal.clone(),
            Arc::new(std::mem::take(&mut self.callbacks)),
            Arc::clone(&self.reporter),
            settings,
        );
        self.finish(cfg, input, output, signal, Box::new(spawner))
    }

    /// Builds with explicit queues and spawner.
    #[cfg(test)]
    pub(crate) fn build_with(
        self,
        input: Queue,
        output: Queue,
        spawner: Box<dyn Spawn>,
    ) -> Result<Supervisor, PipelineError> {
        let cfg = self.cfg.normalized();
        check_required(&cfg, &self.callbacks)?;
        let signal = SignalCell::new()?;
        self.finish(cfg, input, output, signal, spawner)
    }

    fn finish(
        self,
        cfg: PipelineConfig,
        input: Queue,
        output: Queue,
        signal: SignalCell,
        spawner: Box<dyn Spawn>,
    ) -> Result<Supervisor, PipelineError> {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Ok(Supervisor::new_internal(
            cfg,
            signal,
            input,
            output,
            spawner,
            bus,
            self.subscribers,
        ))
    }

    fn open_queues(&self) -> Result<(Queue, Queue), PipelineError> {
        let spill = SpillSettings {
            dir: self.cfg.temp_dir.clone(),
            threshold: self.cfg.spill_threshold,
        };
        if let Some((input, output)) = &self.transports {
            return Ok((
                Queue::new(Arc::clone(input), spill.clone()),
                Queue::new(Arc::clone(output), spill),
            ));
        }
        default_queues(&self.cfg)
    }
}

/// Every configured role must have its mandatory hook bound.
fn check_required(cfg: &PipelineConfig, callbacks: &Callbacks) -> Result<(), PipelineError> {
    for role in Role::ALL {
        if cfg.count(role) == 0 {
            continue;
        }
        if let Some(hook) = Hook::required_for(role) {
            if !callbacks.is_set(hook) {
                return Err(PipelineError::MissingHandler { hook, role });
            }
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn default_queues(cfg: &PipelineConfig) -> Result<(Queue, Queue), PipelineError> {
    Ok(crate::queue::open_pair(
        &cfg.queue_name,
        &cfg.temp_dir,
        cfg.spill_threshold,
    )?)
}

#[cfg(not(target_os = "linux"))]
fn default_queues(_cfg: &PipelineConfig) -> Result<(Queue, Queue), PipelineError> {
    Err(PipelineError::Config(
        "no kernel queue on this platform; call with_transports".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Mode;
    use crate::queue::memory::MemoryTransport;

    fn cfg(left: usize, center: usize, right: usize) -> PipelineConfig {
        PipelineConfig {
            left_process: left,
            center_process: center,
            right_process: right,
            ..PipelineConfig::default()
        }
    }

    fn memory() -> (Arc<dyn Transport>, Arc<dyn Transport>) {
        (Arc::new(MemoryTransport::new()), Arc::new(MemoryTransport::new()))
    }

    #[test]
    fn missing_mandatory_hook_is_reported_per_role() {
        let (input, output) = memory();
        let err = SupervisorBuilder::new(cfg(1, 1, 1))
            .on_left_start(|_| Ok(()))
            .on_center_message(|_, _| Ok(()))
            .with_transports(input, output)
            .build()
            .err()
            .unwrap();
        assert!(matches!(
            err,
            PipelineError::MissingHandler {
                hook: Hook::RightMessage,
                role: Role::Right
            }
        ));
    }

    #[test]
    fn roles_with_zero_workers_need_no_hooks() {
        let (input, output) = memory();
        let sup = SupervisorBuilder::new(cfg(0, 2, 0))
            .on_center_message(|_, _| Ok(()))
            .with_transports(input, output)
            .build()
            .unwrap();
        assert_eq!(sup.config().center_process, 2);
    }

    #[test]
    fn push_mode_drops_the_right_requirement() {
        let (input, output) = memory();
        let mut c = cfg(1, 1, 3);
        c.mode = Mode::DAEMON | Mode::PUSH;
        let sup = SupervisorBuilder::new(c)
            .on_left_start(|_| Ok(()))
            .on_center_message(|_, _| Ok(()))
            .with_transports(input, output)
            .build()
            .unwrap();
        assert_eq!(sup.config().right_process, 0);
    }

    #[test]
    fn hooks_bind_by_name() {
        let (input, output) = memory();
        let sup = SupervisorBuilder::new(cfg(0, 1, 0))
            .on_named("center_message", Handler::message(|_, _| Ok(())))
            .unwrap()
            .with_transports(input, output)
            .build();
        assert!(sup.is_ok());

        let err = SupervisorBuilder::new(cfg(0, 1, 0))
            .on_named("center_finish", Handler::message(|_, _| Ok(())))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::UnknownEvent(name) if name == "center_finish"));
    }
}
