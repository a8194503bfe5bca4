//! Error types for implore-core
//!
//! Provides error handling for:
//! - Dataset manifest loading
//! - Field loads (asset resolution and array decoding)
//! - Parameter panel input

use implore_io::{DecodeError, ResolveError};
use thiserror::Error;

/// Main error type for implore operations
#[derive(Error, Debug, Clone)]
pub enum ImploreError {
    /// Dataset loading errors
    #[error("Failed to load dataset: {0}")]
    DatasetLoad(#[from] DatasetError),

    /// Asset resolution errors
    #[error("Failed to resolve asset: {0}")]
    Resolve(#[from] ResolveError),

    /// Array decoding errors
    #[error("Failed to decode array: {0}")]
    Decode(#[from] DecodeError),

    /// Parameter panel errors
    #[error("Control error: {0}")]
    Panel(#[from] PanelError),

    /// Scene capability errors (e.g. undecodable texture)
    #[error("Scene error: {0}")]
    Scene(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors related to dataset operations
#[derive(Error, Debug, Clone)]
pub enum DatasetError {
    /// Manifest could not be fetched
    #[error("No manifest found for {location}: {message}")]
    ManifestUnavailable { location: String, message: String },

    /// Manifest is not valid JSON or has the wrong structure
    #[error("Invalid dataset manifest: {message}")]
    InvalidManifest { message: String },

    /// Field not found
    #[error("Field '{field}' not found in dataset")]
    FieldNotFound { field: String },

    /// Field arrays have unusable shapes
    #[error("Field '{field}' is unusable: {message}")]
    InvalidField { field: String, message: String },

    /// Dataset has no image stack
    #[error("Dataset has no image stack")]
    NoStack,
}

/// Errors related to parameter panel input
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PanelError {
    /// No control with this name is offered for the current dataset
    #[error("Unknown control: {name}")]
    UnknownControl { name: String },

    /// Value outside the control's range
    #[error("Value {value} for '{name}' is outside [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Value is not one of the offered options
    #[error("'{value}' is not an option for '{name}'")]
    InvalidOption { name: String, value: String },

    /// Value of the wrong type
    #[error("Control '{name}' expects a {expected} value")]
    TypeMismatch { name: String, expected: String },
}

/// Result type alias for implore operations
pub type ImploreResult<T> = Result<T, ImploreError>;

/// Result type alias for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Result type alias for panel operations
pub type PanelResult<T> = Result<T, PanelError>;

/// Validation utilities
pub mod validation {
    use super::*;

    /// Validate a numeric control value against its range
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> PanelResult<()> {
        if !value.is_finite() || value < min || value > max {
            return Err(PanelError::OutOfRange {
                name: name.to_string(),
                value,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Validate that a choice is among the offered options
    pub fn validate_option(name: &str, value: &str, options: &[String]) -> PanelResult<()> {
        if !options.iter().any(|o| o == value) {
            return Err(PanelError::InvalidOption {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// Validate field exists
    pub fn validate_field_exists<'a>(
        field: &str,
        mut available: impl Iterator<Item = &'a str>,
    ) -> DatasetResult<()> {
        if !available.any(|f| f == field) {
            return Err(DatasetError::FieldNotFound {
                field: field.to_string(),
            });
        }
        Ok(())
    }
}
