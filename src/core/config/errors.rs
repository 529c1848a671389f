//! Configuration error types and validation traits.

use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a batch size is invalid (must be greater than 0).
    #[error("batch size must be greater than 0")]
    InvalidBatchSize,

    /// Error indicating that the fixed label length is invalid.
    #[error("string length must be greater than 0")]
    InvalidStringLength,

    /// Error indicating that an input directory does not exist.
    #[error("input directory does not exist: {}", path.display())]
    DirectoryNotFound { path: std::path::PathBuf },

    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// A trait for validating configuration parameters.
///
/// Implementors provide `validate` and `get_defaults`; the remaining methods are
/// shared checks for the fields that recur across the dataset, conversion and
/// visualization configurations.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Returns the default configuration.
    fn get_defaults() -> Self
    where
        Self: Sized;

    /// Validates a batch size.
    fn validate_batch_size(&self, batch_size: usize) -> Result<(), ConfigError> {
        if batch_size == 0 {
            Err(ConfigError::InvalidBatchSize)
        } else {
            Ok(())
        }
    }

    /// Validates the fixed label length.
    fn validate_string_length(&self, string_length: usize) -> Result<(), ConfigError> {
        if string_length == 0 {
            Err(ConfigError::InvalidStringLength)
        } else {
            Ok(())
        }
    }

    /// Validates that a directory exists.
    fn validate_directory(&self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            Err(ConfigError::DirectoryNotFound {
                path: path.to_path_buf(),
            })
        } else if !path.is_dir() {
            Err(ConfigError::InvalidConfig {
                message: format!("Path is not a directory: {}", path.display()),
            })
        } else {
            Ok(())
        }
    }

    /// Validates image dimensions.
    ///
    /// This method checks that image dimensions are positive.
    fn validate_image_dimensions(&self, width: u32, height: u32) -> Result<(), ConfigError> {
        if width == 0 || height == 0 {
            Err(ConfigError::InvalidConfig {
                message: "Image dimensions must be positive".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validates a threshold on the normalized `[0, 1]` range.
    fn validate_threshold(&self, threshold: f32) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&threshold) {
            Err(ConfigError::InvalidConfig {
                message: format!("Threshold must be between 0.0 and 1.0, got {}", threshold),
            })
        } else {
            Ok(())
        }
    }
}

/// Extension trait for ConfigValidator that wraps validation errors into `OCRError`.
pub trait ConfigValidatorExt: ConfigValidator {
    /// Validates configuration and wraps any errors into `OCRError::ConfigError`.
    fn validate_and_wrap_ocr_error(self) -> Result<Self, crate::core::errors::OCRError>
    where
        Self: Sized,
    {
        self.validate()?;
        Ok(self)
    }
}

impl<T: ConfigValidator> ConfigValidatorExt for T {}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestValidator;
    impl ConfigValidator for TestValidator {
        fn validate(&self) -> Result<(), ConfigError> {
            Ok(())
        }

        fn get_defaults() -> Self {
            TestValidator
        }
    }

    #[test]
    fn test_validate_batch_size() {
        let validator = TestValidator;
        assert!(validator.validate_batch_size(1).is_ok());
        assert!(validator.validate_batch_size(128).is_ok());
        assert!(validator.validate_batch_size(0).is_err());
    }

    #[test]
    fn test_validate_string_length() {
        let validator = TestValidator;
        assert!(validator.validate_string_length(10).is_ok());
        assert!(matches!(
            validator.validate_string_length(0),
            Err(ConfigError::InvalidStringLength)
        ));
    }

    #[test]
    fn test_validate_image_dimensions() {
        let validator = TestValidator;
        assert!(validator.validate_image_dimensions(256, 256).is_ok());
        assert!(validator.validate_image_dimensions(0, 256).is_err());
        assert!(validator.validate_image_dimensions(256, 0).is_err());
    }

    #[test]
    fn test_validate_threshold() {
        let validator = TestValidator;
        assert!(validator.validate_threshold(0.0).is_ok());
        assert!(validator.validate_threshold(0.5).is_ok());
        assert!(validator.validate_threshold(1.0).is_ok());
        assert!(validator.validate_threshold(-0.1).is_err());
        assert!(validator.validate_threshold(1.1).is_err());
    }

    #[test]
    fn test_validate_directory() {
        let validator = TestValidator;
        let dir = tempfile::tempdir().unwrap();
        assert!(validator.validate_directory(dir.path()).is_ok());
        assert!(matches!(
            validator.validate_directory(&dir.path().join("missing")),
            Err(ConfigError::DirectoryNotFound { .. })
        ));
    }
}
