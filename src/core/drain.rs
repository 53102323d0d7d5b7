//! # Drain handlers driven by the master tick.
//!
//! Both handlers are pure: they look at a [`DrainView`] snapshot and return a
//! [`DrainStep`]. The supervisor owns every side effect (escalating the
//! signal, pushing sentinels, leaving the loop).
//!
//! ```text
//! RestartDrain (SIGUSR1, daemon only)         StopDrain (SIGTERM/SIGINT, or non-daemon start)
//!   tick 1: pool empty? ─► Exit                  every tick:
//!           else Unblock{center, right}            pool empty?                   ─► Exit
//!   tick 2: Exit (hard deadline)                   no left AND both queues empty ─► StopAll{center, right}
//!                                                  otherwise                     ─► Continue
//! ```

/// Snapshot the drains decide on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainView {
    /// Live workers of any role.
    pub pool_len: usize,
    /// Live left workers.
    pub left_alive: usize,
    /// Live center workers.
    pub center_alive: usize,
    /// Live right workers.
    pub right_alive: usize,
    /// Both queues reported empty.
    pub queues_empty: bool,
}

/// What the supervisor should do after a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainStep {
    /// Nothing this tick.
    Continue,
    /// Push `center` sentinels to the input queue and `right` sentinels to the output queue.
    Unblock { center: usize, right: usize },
    /// Escalate to `StopAll`, then unblock like [`DrainStep::Unblock`].
    StopAll { center: usize, right: usize },
    /// Leave the event loop.
    Exit,
}

/// Smooth restart with a two-tick hard deadline.
#[derive(Debug, Default)]
pub struct RestartDrain {
    ticks: u32,
}

impl RestartDrain {
    /// Tick on which the master exits regardless of live workers.
    pub const DEADLINE_TICKS: u32 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self, view: &DrainView) -> DrainStep {
        self.ticks += 1;
        if view.pool_len == 0 || self.ticks >= Self::DEADLINE_TICKS {
            return DrainStep::Exit;
        }
        DrainStep::Unblock {
            center: view.center_alive,
            right: view.right_alive,
        }
    }

    /// Ticks observed since the drain was armed.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

/// Graceful stop: let left drain out, then stop everything once queues are empty.
#[derive(Debug, Default)]
pub struct StopDrain {
    ticks: u32,
}

impl StopDrain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&mut self, view: &DrainView) -> DrainStep {
        self.ticks += 1;
        if view.pool_len == 0 {
            return DrainStep::Exit;
        }
        if view.left_alive == 0 && view.queues_empty {
            return DrainStep::StopAll {
                center: view.center_alive,
                right: view.right_alive,
            };
        }
        DrainStep::Continue
    }

    /// Ticks observed since the drain was armed.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(left: usize, center: usize, right: usize, queues_empty: bool) -> DrainView {
        DrainView {
            pool_len: left + center + right,
            left_alive: left,
            center_alive: center,
            right_alive: right,
            queues_empty,
        }
    }

    #[test]
    fn restart_unblocks_once_then_exits_on_second_tick() {
        let mut drain = RestartDrain::new();
        assert_eq!(
            drain.on_tick(&view(1, 3, 2, false)),
            DrainStep::Unblock {
                center: 3,
                right: 2
            }
        );
        assert_eq!(drain.on_tick(&view(1, 3, 2, false)), DrainStep::Exit);
        assert_eq!(drain.ticks(), 2);
    }

    #[test]
    fn restart_exits_immediately_on_empty_pool() {
        let mut drain = RestartDrain::new();
        assert_eq!(drain.on_tick(&view(0, 0, 0, false)), DrainStep::Exit);
    }

    #[test]
    fn stop_waits_for_left_and_queues() {
        let mut drain = StopDrain::new();
        assert_eq!(drain.on_tick(&view(2, 1, 1, true)), DrainStep::Continue);
        assert_eq!(drain.on_tick(&view(0, 1, 1, false)), DrainStep::Continue);
        assert_eq!(
            drain.on_tick(&view(0, 1, 1, true)),
            DrainStep::StopAll {
                center: 1,
                right: 1
            }
        );
        assert_eq!(drain.on_tick(&view(0, 0, 0, false)), DrainStep::Exit);
    }

    #[test]
    fn stop_has_no_deadline() {
        let mut drain = StopDrain::new();
        for _ in 0..100 {
            assert_eq!(drain.on_tick(&view(1, 0, 0, true)), DrainStep::Continue);
        }
    }
}
