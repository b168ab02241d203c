//! Name validation for registered handlers.

use crate::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Namespaced names such as `relicta.plugins.list` or `release-summary`.
static NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_-]+(\.[a-z0-9_-]+)*$").expect("Invalid regex: handler name pattern")
});

/// `scheme://path` URIs such as `relicta://status`.
static URI_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://\S+$").expect("Invalid regex: resource uri pattern")
});

const MAX_NAME_LEN: usize = 128;

pub fn validate_name(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if name.len() > MAX_NAME_LEN || !NAME_REGEX.is_match(name) {
        return Err(ConfigError::InvalidValue {
            field: kind.into(),
            message: format!("'{}' is not a valid {} name", name, kind).into(),
        });
    }
    Ok(())
}

pub fn validate_uri(uri: &str) -> Result<(), ConfigError> {
    if !URI_REGEX.is_match(uri) {
        return Err(ConfigError::InvalidValue {
            field: "resource".into(),
            message: format!("'{}' is not a valid resource uri", uri).into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(validate_name("tool", "relicta.bump").is_ok());
        assert!(validate_name("tool", "relicta.plugins.execute_hook").is_ok());
        assert!(validate_name("prompt", "release-summary").is_ok());

        assert!(validate_name("tool", "").is_err());
        assert!(validate_name("tool", "relicta..bump").is_err());
        assert!(validate_name("tool", ".bump").is_err());
        assert!(validate_name("tool", "has space").is_err());
        assert!(validate_name("tool", "Relicta.Bump").is_err());
        assert!(validate_name("tool", &"x".repeat(200)).is_err());
    }

    #[test]
    fn test_uris() {
        assert!(validate_uri("relicta://status").is_ok());
        assert!(validate_uri("file:///tmp/notes.md").is_ok());

        assert!(validate_uri("status").is_err());
        assert!(validate_uri("relicta://").is_err());
        assert!(validate_uri("://status").is_err());
    }
}
