use regex::Regex;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("zone name is empty")]
    Empty,
    #[error("label too long (max 63 characters)")]
    LabelTooLong,
    #[error("name too long (max 253 characters)")]
    NameTooLong,
    #[error("empty label")]
    EmptyLabel,
    #[error("label contains invalid characters (only letters, digits, '-' and '_' allowed)")]
    InvalidCharacters,
}

lazy_static::lazy_static! {
    /// Letters, digits, '-' and '_' (service labels)
    static ref LABEL_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    if label.len() > 63 {
        return Err(ValidationError::LabelTooLong);
    }
    if !LABEL_RE.is_match(label) {
        return Err(ValidationError::InvalidCharacters);
    }
    Ok(())
}

/// Zone names become directory paths, so anything outside plain DNS labels
/// (slashes, `..`, whitespace) is refused here.
pub fn validate_zone_name(zone: &str) -> Result<(), ValidationError> {
    let z = zone.trim_end_matches('.');
    if z.is_empty() {
        return Err(ValidationError::Empty);
    }
    if z.len() > 253 {
        return Err(ValidationError::NameTooLong);
    }
    for label in z.split('.') {
        validate_label(label)?;
    }
    Ok(())
}
