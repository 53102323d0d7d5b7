//! # Control signal state machine.
//!
//! [`ControlSignal`] is the single value every process reads to decide whether to
//! keep producing or consuming. Only the master writes it, and it only ever
//! escalates:
//!
//! ```text
//! None ──(non-daemon start | SIGTERM in daemon)──► FinishLeft / StopLeft
//! FinishLeft / StopLeft ──(no left workers AND both queues empty)──► StopAll
//! None ──(SIGUSR1)──► Restart
//! Restart / StopAll ──(pool empty)──► master exits
//! ```

use std::fmt;

use crate::workers::Role;

/// Shared pipeline control signal.
///
/// The discriminants are the values stored in the shared cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlSignal {
    /// Normal operation.
    #[default]
    None = 0,
    /// Smooth restart: drain everything, respawn nothing, exit within two ticks.
    Restart = 1,
    /// Non-daemon run: the single left worker is finishing its batch.
    FinishLeft = 2,
    /// Graceful stop: left workers drain down, center/right keep consuming.
    StopLeft = 3,
    /// Final stage of a stop: every worker exits.
    StopAll = 4,
}

impl ControlSignal {
    /// Decodes a raw cell value. Unknown values read as `None`.
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => ControlSignal::Restart,
            2 => ControlSignal::FinishLeft,
            3 => ControlSignal::StopLeft,
            4 => ControlSignal::StopAll,
            _ => ControlSignal::None,
        }
    }

    /// Raw value stored in the cell.
    #[inline]
    pub fn as_raw(self) -> u8 {
        self as u8
    }

    /// Returns a short stable label (snake_case) for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ControlSignal::None => "none",
            ControlSignal::Restart => "restart",
            ControlSignal::FinishLeft => "finish_left",
            ControlSignal::StopLeft => "stop_left",
            ControlSignal::StopAll => "stop_all",
        }
    }

    /// Whether moving from `self` to `next` is a legal escalation.
    ///
    /// Staying put is not an escalation.
    pub fn can_escalate_to(self, next: ControlSignal) -> bool {
        match (self, next) {
            (ControlSignal::None, next) => next != ControlSignal::None,
            (ControlSignal::FinishLeft | ControlSignal::StopLeft, ControlSignal::StopAll) => true,
            _ => false,
        }
    }

    /// Whether a worker of `role` that just exited may be replaced.
    pub fn permits_respawn(self, role: Role) -> bool {
        match self {
            ControlSignal::None => true,
            ControlSignal::FinishLeft | ControlSignal::StopLeft => role != Role::Left,
            ControlSignal::Restart | ControlSignal::StopAll => false,
        }
    }

    /// Any signal other than `None`.
    #[inline]
    pub fn is_draining(self) -> bool {
        self != ControlSignal::None
    }

    /// Left workers must stop producing.
    #[inline]
    pub fn stops_left(self) -> bool {
        self.is_draining()
    }

    /// Every worker must exit at its next safe point.
    #[inline]
    pub fn stops_all(self) -> bool {
        matches!(self, ControlSignal::Restart | ControlSignal::StopAll)
    }

    /// Whether `role` should stop at its next safe point under this signal.
    pub fn stops(self, role: Role) -> bool {
        match role {
            Role::Left => self.stops_left(),
            Role::Center | Role::Right => self.stops_all(),
        }
    }
}

impl fmt::Display for ControlSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ControlSignal; 5] = [
        ControlSignal::None,
        ControlSignal::Restart,
        ControlSignal::FinishLeft,
        ControlSignal::StopLeft,
        ControlSignal::StopAll,
    ];

    #[test]
    fn raw_values_match_wire_constants() {
        assert_eq!(ControlSignal::None.as_raw(), 0);
        assert_eq!(ControlSignal::Restart.as_raw(), 1);
        assert_eq!(ControlSignal::FinishLeft.as_raw(), 2);
        assert_eq!(ControlSignal::StopLeft.as_raw(), 3);
        assert_eq!(ControlSignal::StopAll.as_raw(), 4);
        for s in ALL {
            assert_eq!(ControlSignal::from_raw(s.as_raw()), s);
        }
        assert_eq!(ControlSignal::from_raw(200), ControlSignal::None);
    }

    #[test]
    fn draining_signals_only_move_to_stop_all() {
        for from in [ControlSignal::FinishLeft, ControlSignal::StopLeft] {
            for to in ALL {
                assert_eq!(
                    from.can_escalate_to(to),
                    to == ControlSignal::StopAll,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn restart_and_stop_all_are_terminal() {
        for from in [ControlSignal::Restart, ControlSignal::StopAll] {
            for to in ALL {
                assert!(!from.can_escalate_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn none_escalates_anywhere_but_itself() {
        for to in ALL {
            assert_eq!(ControlSignal::None.can_escalate_to(to), to != ControlSignal::None);
        }
    }

    #[test]
    fn respawn_rule() {
        for role in [Role::Left, Role::Center, Role::Right] {
            assert!(ControlSignal::None.permits_respawn(role));
            assert!(!ControlSignal::Restart.permits_respawn(role));
            assert!(!ControlSignal::StopAll.permits_respawn(role));
        }
        for s in [ControlSignal::FinishLeft, ControlSignal::StopLeft] {
            assert!(!s.permits_respawn(Role::Left));
            assert!(s.permits_respawn(Role::Center));
            assert!(s.permits_respawn(Role::Right));
        }
    }

    #[test]
    fn stop_points_per_role() {
        assert!(ControlSignal::StopLeft.stops(Role::Left));
        assert!(!ControlSignal::StopLeft.stops(Role::Center));
        assert!(ControlSignal::FinishLeft.stops(Role::Left));
        assert!(ControlSignal::Restart.stops(Role::Right));
        assert!(ControlSignal::StopAll.stops(Role::Center));
        assert!(!ControlSignal::None.stops(Role::Left));
    }
}
