use core::fmt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Hidden minority that wins by failing missions.
    Saboteur,
    Loyal,
}

impl Role {
    pub const fn is_saboteur(self) -> bool {
        matches!(self, Role::Saboteur)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Saboteur => "saboteur",
            Role::Loyal => "loyal",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
