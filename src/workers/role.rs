use std::fmt;

/// Pipeline stage a worker process belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Producer: runs its start callback once and exits.
    Left,
    /// Consumes the input queue.
    Center,
    /// Consumes the output queue.
    Right,
}

impl Role {
    /// Every role, in spawn order.
    pub const ALL: [Role; 3] = [Role::Left, Role::Center, Role::Right];

    /// Returns a short stable label for logs and process titles.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Left => "left",
            Role::Center => "center",
            Role::Right => "right",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
