use crate::utils::error::{ClassifyError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Scheme every classification service address must use.
pub const TRANSPORT_SCHEME: &str = "tcp";

pub fn validate_address(field_name: &str, address: &str) -> Result<()> {
    if address.is_empty() {
        return Err(ClassifyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: address.to_string(),
            reason: "Address cannot be empty".to_string(),
        });
    }

    let url = Url::parse(address).map_err(|e| ClassifyError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: address.to_string(),
        reason: format!("Invalid address format: {}", e),
    })?;

    if url.scheme() != TRANSPORT_SCHEME {
        return Err(ClassifyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: address.to_string(),
            reason: format!("Unsupported scheme: {}", url.scheme()),
        });
    }

    Ok(())
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ClassifyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ClassifyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(ClassifyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN is never contained, so it is rejected too.
    if !(min..=max).contains(&value) {
        return Err(ClassifyError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
