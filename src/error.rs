//! Error types for the diagnostic pipeline

use std::path::PathBuf;

use thiserror::Error;

use crate::models::Persona;

#[derive(Debug, Error)]
pub enum DiagnosticError {
    /// Input event log does not exist
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected header: expected [{expected}], found [{found}]")]
    UnexpectedHeader { expected: String, found: String },

    /// A row parsed but holds values outside the event log schema
    #[error("malformed row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("no students available for training")]
    EmptyInput,

    /// Prediction was requested from a model without fitted trees
    #[error("model has no fitted trees")]
    UntrainedModel,

    /// A label cannot appear in both the training and evaluation subsets
    #[error("label {label} has {count} example(s); at least {required} are needed to split")]
    InsufficientClass {
        label: Persona,
        count: usize,
        required: usize,
    },

    #[error("expected {expected} feature values, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("invalid value {value} for {name}: {reason}")]
    InvalidFeature {
        name: String,
        value: f64,
        reason: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown student: {0}")]
    UnknownStudent(String),
}

pub type Result<T> = std::result::Result<T, DiagnosticError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_class_names_the_label() {
        let err = DiagnosticError::InsufficientClass {
            label: Persona::Improver,
            count: 1,
            required: 2,
        };
        let message = err.to_string();
        assert!(message.contains("Improver"));
        assert!(message.contains("1 example"));
    }

    #[test]
    fn missing_input_shows_path() {
        let err = DiagnosticError::MissingInput(PathBuf::from("data/attempts.csv"));
        assert!(err.to_string().contains("data/attempts.csv"));
    }

    #[test]
    fn untrained_model_is_not_reported_as_empty_input() {
        let message = DiagnosticError::UntrainedModel.to_string();
        assert_eq!(message, "model has no fitted trees");
        assert_ne!(message, DiagnosticError::EmptyInput.to_string());
    }

    #[test]
    fn io_errors_convert() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: DiagnosticError = io_err.into();
        assert!(matches!(err, DiagnosticError::Io(_)));
    }
}
