//! # Callback slots.
//!
//! [`Callbacks`] holds one optional handler per [`Hook`]. Handlers are shared
//! with every forked worker (the whole table is inherited at `fork`), so they
//! must be `Send + Sync` but never cross a process boundary as data.
//!
//! ## Mandatory slots
//! `CenterMessage` and `RightMessage` are required as soon as the matching role
//! has processes configured; the builder rejects the pipeline otherwise, and a
//! worker that still finds the slot empty exits with a setup error.
//!
//! ## Example
//! ```rust
//! use pipevisor::{Callbacks, Handler, Hook};
//!
//! let mut callbacks = Callbacks::default();
//! callbacks.set_center_message(|_worker, msg| {
//!     println!("got {} bytes", msg.len());
//!     Ok(())
//! });
//! callbacks
//!     .on("RightMessage".parse::<Hook>().unwrap(), Handler::message(|_, _| Ok(())))
//!     .unwrap();
//! assert!(callbacks.center_message.is_some());
//! assert!(callbacks.right_message.is_some());
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::Role;
use super::worker::Worker;
use crate::error::PipelineError;
use crate::queue::Message;

/// Handler for the `*Start` hooks.
pub type StartFn = Arc<dyn Fn(&Worker) -> anyhow::Result<()> + Send + Sync>;

/// Handler for the `*Message` hooks.
pub type MessageFn = Arc<dyn Fn(&Worker, &Message) -> anyhow::Result<()> + Send + Sync>;

/// Named callback slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Left worker body.
    LeftStart,
    /// Center worker setup, before the first pop.
    CenterStart,
    /// Center worker, once per input message.
    CenterMessage,
    /// Right worker setup, before the first pop.
    RightStart,
    /// Right worker, once per output message.
    RightMessage,
}

impl Hook {
    /// Every hook.
    pub const ALL: [Hook; 5] = [
        Hook::LeftStart,
        Hook::CenterStart,
        Hook::CenterMessage,
        Hook::RightStart,
        Hook::RightMessage,
    ];

    /// The registration name (`"LeftStart"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Hook::LeftStart => "LeftStart",
            Hook::CenterStart => "CenterStart",
            Hook::CenterMessage => "CenterMessage",
            Hook::RightStart => "RightStart",
            Hook::RightMessage => "RightMessage",
        }
    }

    /// Role whose worker invokes this hook.
    pub fn role(self) -> Role {
        match self {
            Hook::LeftStart => Role::Left,
            Hook::CenterStart | Hook::CenterMessage => Role::Center,
            Hook::RightStart | Hook::RightMessage => Role::Right,
        }
    }

    /// Whether the hook receives a message.
    pub fn is_message(self) -> bool {
        matches!(self, Hook::CenterMessage | Hook::RightMessage)
    }

    /// The message hook a consuming role cannot run without.
    pub fn required_for(role: Role) -> Option<Hook> {
        match role {
            Role::Left => None,
            Role::Center => Some(Hook::CenterMessage),
            Role::Right => Some(Hook::RightMessage),
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hook::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| PipelineError::UnknownEvent(s.to_string()))
    }
}

/// Handler passed to [`Callbacks::on`]; the variant must match the hook kind.
pub enum Handler {
    /// For `LeftStart`, `CenterStart`, `RightStart`.
    Start(StartFn),
    /// For `CenterMessage`, `RightMessage`.
    Message(MessageFn),
}

impl Handler {
    /// Wraps a start handler.
    pub fn start<F>(f: F) -> Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Handler::Start(Arc::new(f))
    }

    /// Wraps a message handler.
    pub fn message<F>(f: F) -> Self
    where
        F: Fn(&Worker, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Handler::Message(Arc::new(f))
    }
}

/// One optional handler per hook.
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Left worker body.
    pub left_start: Option<StartFn>,
    /// Center setup.
    pub center_start: Option<StartFn>,
    /// Center message handler (mandatory with center workers).
    pub center_message: Option<MessageFn>,
    /// Right setup.
    pub right_start: Option<StartFn>,
    /// Right message handler (mandatory with right workers).
    pub right_message: Option<MessageFn>,
}

impl Callbacks {
    pub fn set_left_start<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.left_start = Some(Arc::new(f));
        self
    }

    pub fn set_center_start<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.center_start = Some(Arc::new(f));
        self
    }

    pub fn set_center_message<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Worker, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.center_message = Some(Arc::new(f));
        self
    }

    pub fn set_right_start<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Worker) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.right_start = Some(Arc::new(f));
        self
    }

    pub fn set_right_message<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Worker, &Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.right_message = Some(Arc::new(f));
        self
    }

    /// Binds `handler` to `hook`.
    ///
    /// Fails with [`PipelineError::Config`] when a start handler is given for a
    /// message hook or the other way round.
    pub fn on(&mut self, hook: Hook, handler: Handler) -> Result<&mut Self, PipelineError> {
        match (hook, handler) {
            (Hook::LeftStart, Handler::Start(f)) => self.left_start = Some(f),
            (Hook::CenterStart, Handler::Start(f)) => self.center_start = Some(f),
            (Hook::RightStart, Handler::Start(f)) => self.right_start = Some(f),
            (Hook::CenterMessage, Handler::Message(f)) => self.center_message = Some(f),
            (Hook::RightMessage, Handler::Message(f)) => self.right_message = Some(f),
            (hook, _) => {
                return Err(PipelineError::Config(format!(
                    "handler kind does not match hook {hook}"
                )));
            }
        }
        Ok(self)
    }

    /// Whether `hook` has a handler bound.
    pub fn is_set(&self, hook: Hook) -> bool {
        match hook {
            Hook::LeftStart => self.left_start.is_some(),
            Hook::CenterStart => self.center_start.is_some(),
            Hook::CenterMessage => self.center_message.is_some(),
            Hook::RightStart => self.right_start.is_some(),
            Hook::RightMessage => self.right_message.is_some(),
        }
    }

    /// Start handler of `role`, if any.
    pub(crate) fn start_for(&self, role: Role) -> Option<&StartFn> {
        match role {
            Role::Left => self.left_start.as_ref(),
            Role::Center => self.center_start.as_ref(),
            Role::Right => self.right_start.as_ref(),
        }
    }

    /// Message handler of `role`, if any.
    pub(crate) fn message_for(&self, role: Role) -> Option<&MessageFn> {
        match role {
            Role::Left => None,
            Role::Center => self.center_message.as_ref(),
            Role::Right => self.right_message.as_ref(),
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<_> = Hook::ALL
            .into_iter()
            .filter(|hook| self.is_set(*hook))
            .map(Hook::as_str)
            .collect();
        f.debug_struct("Callbacks").field("set", &set).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for hook in Hook::ALL {
            assert_eq!(hook.as_str().parse::<Hook>().unwrap(), hook);
        }
    }

    #[test]
    fn unknown_name_is_a_configuration_error() {
        let err = "CenterMesage".parse::<Hook>().unwrap_err();
        assert_eq!(err.as_label(), "pipeline_unknown_event");
        assert!(err.to_string().contains("CenterMesage"));
    }

    #[test]
    fn on_binds_the_named_slot() {
        let mut cb = Callbacks::default();
        cb.on(Hook::LeftStart, Handler::start(|_| Ok(()))).unwrap();
        cb.on(Hook::CenterMessage, Handler::message(|_, _| Ok(())))
            .unwrap();
        assert!(cb.is_set(Hook::LeftStart));
        assert!(cb.is_set(Hook::CenterMessage));
        assert!(!cb.is_set(Hook::RightMessage));
    }

    #[test]
    fn on_rejects_mismatched_handler_kind() {
        let mut cb = Callbacks::default();
        let err = cb
            .on(Hook::CenterMessage, Handler::start(|_| Ok(())))
            .unwrap_err();
        assert_eq!(err.as_label(), "pipeline_config");
        assert!(!cb.is_set(Hook::CenterMessage));
    }

    #[test]
    fn required_hooks_per_role() {
        assert_eq!(Hook::required_for(Role::Left), None);
        assert_eq!(Hook::required_for(Role::Center), Some(Hook::CenterMessage));
        assert_eq!(Hook::required_for(Role::Right), Some(Hook::RightMessage));
        assert_eq!(Hook::RightStart.role(), Role::Right);
        assert!(Hook::RightMessage.is_message());
    }
}
