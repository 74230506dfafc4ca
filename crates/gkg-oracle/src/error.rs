//! Oracle error types

/// Oracle call failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Response violates the call contract (wrong id, empty result)
    #[error("oracle contract violation: {0}")]
    ContractViolation(String),

    /// Response text could not be parsed into the expected record
    #[error("malformed oracle response: {0}")]
    Malformed(String),

    /// Transient network/service failure
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// Client misconfiguration or rejected request
    #[error("oracle configuration error: {0}")]
    Config(String),
}

impl OracleError {
    /// Worth retrying with backoff
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Worth retrying once with a constraint reminder
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_) | Self::Malformed(_))
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::Config(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_error_classification() {
        assert!(OracleError::Unavailable("503".into()).is_transient());
        assert!(!OracleError::ContractViolation("x".into()).is_transient());
        assert!(OracleError::Malformed("x".into()).is_contract_violation());
        assert!(!OracleError::Config("401".into()).is_contract_violation());
    }
}
