use serde::{Deserialize, Serialize};

/// Job priority within its type. Lower numeric value = more urgent.
///
/// Deserialized values go through the same clamp as [`Priority::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const MAX_URGENT: Priority = Priority(1);
    pub const NORMAL: Priority = Priority(5);
    pub const MIN_URGENT: Priority = Priority(10);

    /// Build a priority, clamping out-of-range values into
    /// `MAX_URGENT..=MIN_URGENT`.
    pub fn new(value: i64) -> Self {
        let clamped = value.clamp(Self::MAX_URGENT.0 as i64, Self::MIN_URGENT.0 as i64);
        Priority(clamped as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self::new(value as i64)
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
