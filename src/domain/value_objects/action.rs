//! ActionKind Value Object
//!
//! The active-challenge gestures the VERIFY state can ask the user to
//! perform (spec §4.6 "Action predicates").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Blink,
    MouthOpen,
    Nod,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Blink => "blink",
            ActionKind::MouthOpen => "mouth_open",
            ActionKind::Nod => "nod",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
