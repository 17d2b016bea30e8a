//! Tier availability
//!
//! Each tier resolves its backend once, at construction. A tier that could not
//! reach its backend stays `Degraded` for the lifetime of the process and
//! answers with empty results instead of failing.

use serde::{Deserialize, Serialize};

/// Observable state of a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierState {
    Available,
    Degraded,
}

impl TierState {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Degraded => "degraded",
        }
    }
}

impl std::fmt::Display for TierState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A backend handle that is either usable or was found unusable at startup
#[derive(Debug, Clone)]
pub enum Capability<T> {
    Available(T),
    Degraded { reason: String },
}

impl<T> Capability<T> {
    /// Build a degraded capability
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    /// The backend, if available
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Available(inner) => Some(inner),
            Self::Degraded { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Why the tier is degraded, if it is
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Degraded { reason } => Some(reason),
        }
    }

    pub fn state(&self) -> TierState {
        match self {
            Self::Available(_) => TierState::Available,
            Self::Degraded { .. } => TierState::Degraded,
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Capability<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(inner) => Self::Available(inner),
            Err(e) => Self::degraded(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available() {
        let cap = Capability::Available(42);
        assert!(cap.is_available());
        assert_eq!(cap.get(), Some(&42));
        assert_eq!(cap.reason(), None);
        assert_eq!(cap.state(), TierState::Available);
    }

    #[test]
    fn test_degraded_from_error() {
        let cap: Capability<u8> = Err::<u8, _>("connection refused").into();
        assert!(!cap.is_available());
        assert_eq!(cap.get(), None);
        assert_eq!(cap.reason(), Some("connection refused"));
        assert_eq!(cap.state().to_string(), "degraded");
    }
}
