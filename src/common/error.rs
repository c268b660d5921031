//! Error types for min_dispersion_primitives

use std::fmt;

/// Main error type for motion primitive generation
#[derive(Debug)]
pub enum MotionPrimitiveError {
    /// Configuration rejected before any computation starts
    ConfigurationError(String),
    /// Non-finite end states or distances inside one start-grid cell
    NumericDegeneracy {
        /// Start-grid index of the offending cell (empty outside a table build)
        grid_index: Vec<usize>,
        detail: String,
    },
    /// Invalid argument to a primitive query
    InvalidParameter(String),
    /// Lookup table (de)serialization failed
    SerializationError(serde_json::Error),
    /// I/O error
    IoError(std::io::Error),
}

impl MotionPrimitiveError {
    pub fn numeric(detail: impl Into<String>) -> Self {
        MotionPrimitiveError::NumericDegeneracy {
            grid_index: Vec::new(),
            detail: detail.into(),
        }
    }

    /// Attach the start-grid index of the cell that produced this error.
    pub fn at_cell(self, index: &[usize]) -> Self {
        match self {
            MotionPrimitiveError::NumericDegeneracy { detail, .. } => {
                MotionPrimitiveError::NumericDegeneracy {
                    grid_index: index.to_vec(),
                    detail,
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for MotionPrimitiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionPrimitiveError::ConfigurationError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            MotionPrimitiveError::NumericDegeneracy { grid_index, detail } => {
                write!(f, "Numeric degeneracy at cell {:?}: {}", grid_index, detail)
            }
            MotionPrimitiveError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            MotionPrimitiveError::SerializationError(e) => write!(f, "Serialization error: {}", e),
            MotionPrimitiveError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for MotionPrimitiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MotionPrimitiveError::SerializationError(e) => Some(e),
            MotionPrimitiveError::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MotionPrimitiveError {
    fn from(e: std::io::Error) -> Self {
        MotionPrimitiveError::IoError(e)
    }
}

impl From<serde_json::Error> for MotionPrimitiveError {
    fn from(e: serde_json::Error) -> Self {
        MotionPrimitiveError::SerializationError(e)
    }
}

/// Result type alias for motion primitive operations
pub type PrimitiveResult<T> = Result<T, MotionPrimitiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MotionPrimitiveError::ConfigurationError("k too large".to_string());
        assert_eq!(format!("{}", err), "Configuration error: k too large");
    }

    #[test]
    fn test_numeric_error_carries_cell() {
        let err = MotionPrimitiveError::numeric("NaN end state").at_cell(&[2, 0, 1]);
        match &err {
            MotionPrimitiveError::NumericDegeneracy { grid_index, .. } => {
                assert_eq!(grid_index, &vec![2, 0, 1]);
            }
            _ => panic!("expected NumericDegeneracy"),
        }
        assert_eq!(
            format!("{}", err),
            "Numeric degeneracy at cell [2, 0, 1]: NaN end state"
        );
    }

    #[test]
    fn test_at_cell_keeps_other_kinds() {
        let err = MotionPrimitiveError::InvalidParameter("t".to_string()).at_cell(&[1]);
        assert!(matches!(err, MotionPrimitiveError::InvalidParameter(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MotionPrimitiveError = io_err.into();
        assert!(matches!(err, MotionPrimitiveError::IoError(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<Vec<f64>>("not json").unwrap_err();
        let err: MotionPrimitiveError = serde_err.into();
        assert!(matches!(err, MotionPrimitiveError::SerializationError(_)));
    }
}
