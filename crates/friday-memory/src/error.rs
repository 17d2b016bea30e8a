//! Memory Error Types
//!
//! Errors raised by the tier engines. The `MemorySystem` facade never lets
//! these escape; they are logged and turned into sentinels at its boundary.

use thiserror::Error;

/// Memory Result type alias
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory system errors
#[derive(Debug, Error)]
pub enum MemoryError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigValidationError),

    /// Relational store error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// External cache error
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// Embedding generation error
    #[error("embedding error: {message}")]
    Embedding { message: String },

    /// Tier is running in degraded mode
    #[error("{tier} tier unavailable: {reason}")]
    Unavailable { tier: String, reason: String },

    /// Stored data could not be interpreted
    #[error("malformed {entity}: {message}")]
    Malformed { entity: String, message: String },

    /// Blocking task failed to complete
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an unavailable-tier error
    pub fn unavailable(tier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            tier: tier.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-data error
    pub fn malformed(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Check if this error comes from a degraded tier
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Check if this error is a data-shape problem rather than a backend failure
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = MemoryError::unavailable("long_term", "index directory is read-only");
        assert!(err.is_unavailable());
        assert!(err.to_string().contains("long_term"));
        assert!(err.to_string().contains("read-only"));

        let err = MemoryError::malformed("preference", "expected JSON");
        assert!(err.is_malformed());
        assert!(!err.is_unavailable());

        let err = MemoryError::embedding("model missing");
        assert!(err.to_string().contains("model missing"));
    }

    #[test]
    fn test_serde_errors_are_malformed() {
        let err: MemoryError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(err.is_malformed());
    }
}
