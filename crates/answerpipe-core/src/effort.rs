//! Reasoning effort / verbosity labels and the effort -> timeout policy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-5-mini";

pub const TIMEOUT_MINIMAL: Duration = Duration::from_secs(90);
pub const TIMEOUT_LOW: Duration = Duration::from_secs(3 * 60);
pub const TIMEOUT_MEDIUM: Duration = Duration::from_secs(5 * 60);
pub const TIMEOUT_HIGH: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Minimal,
    Low,
    Medium,
    High,
}

impl Effort {
    pub const ALL: [Effort; 4] = [Self::Minimal, Self::Low, Self::Medium, Self::High];
    pub const DEFAULT: Effort = Self::Medium;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Exact, case-sensitive label lookup.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minimal" => Some(Self::Minimal),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn timeout(self) -> Duration {
        match self {
            Self::Minimal => TIMEOUT_MINIMAL,
            Self::Low => TIMEOUT_LOW,
            Self::Medium => TIMEOUT_MEDIUM,
            Self::High => TIMEOUT_HIGH,
        }
    }
}

impl Default for Effort {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Effort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

impl Verbosity {
    pub const ALL: [Verbosity; 3] = [Self::Low, Self::Medium, Self::High];
    pub const DEFAULT: Verbosity = Self::Medium;

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Default for Verbosity {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total: any unrecognized input (including "") maps to [`Effort::DEFAULT`].
pub fn validate_effort(s: &str) -> Effort {
    Effort::parse(s).unwrap_or(Effort::DEFAULT)
}

/// Total: any unrecognized input (including "") maps to [`Verbosity::DEFAULT`].
pub fn validate_verbosity(s: &str) -> Verbosity {
    Verbosity::parse(s).unwrap_or(Verbosity::DEFAULT)
}

/// Request timeout for a raw effort label.
///
/// Unrecognized or empty labels get the `low` timeout, not the default effort's.
pub fn timeout_for_effort(s: &str) -> Duration {
    Effort::parse(s).map(Effort::timeout).unwrap_or(TIMEOUT_LOW)
}
