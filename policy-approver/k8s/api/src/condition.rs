use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a typed condition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(b: bool) -> Self {
        if b {
            Self::True
        } else {
            Self::False
        }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => "True".fmt(f),
            Self::False => "False".fmt(f),
            Self::Unknown => "Unknown".fmt(f),
        }
    }
}
