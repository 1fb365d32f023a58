//! Error types for the similarity filter

use thiserror::Error;

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised when configuring the similarity filter
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FilterError {
    /// Threshold outside [0, 1] or not finite
    #[error("Invalid threshold {0}: must be a finite value in [0, 1]")]
    InvalidThreshold(f32),

    /// Threshold scale not strictly positive
    #[error("Invalid threshold scale {0}: must be finite and > 0")]
    InvalidThresholdScale(f32),

    /// Epsilon not strictly positive
    #[error("Invalid epsilon {0}: must be finite and > 0")]
    InvalidEpsilon(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterError::InvalidThreshold(1.5);
        assert!(err.to_string().contains("1.5"));
        assert!(err.to_string().contains("[0, 1]"));

        let err = FilterError::InvalidThresholdScale(-2.0);
        assert!(err.to_string().contains("-2"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FilterError>();
    }
}
