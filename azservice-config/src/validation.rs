// Settings validation

use crate::{ConfigError, Result};
use std::fmt::Display;

/// Checks a bound settings struct before it is handed out.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Field-level checks shared by settings types.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(invalid(format_args!("{} is required", field)));
        }
        Ok(())
    }

    /// Inclusive range check.
    pub fn in_range<T: PartialOrd + Display>(value: T, min: T, max: T, field: &str) -> Result<()> {
        if value < min || value > max {
            return Err(invalid(format_args!(
                "{} must be between {} and {}, got {}",
                field, min, max, value
            )));
        }
        Ok(())
    }

    /// `lower <= upper`, e.g. a base delay against its cap.
    pub fn ordered<T: PartialOrd>(lower: T, upper: T, lower_field: &str, upper_field: &str) -> Result<()> {
        if lower > upper {
            return Err(invalid(format_args!("{} must not exceed {}", lower_field, upper_field)));
        }
        Ok(())
    }
}

fn invalid(message: std::fmt::Arguments<'_>) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
