//! Format checks for client registrations.

use regex::Regex;
use uuid::Uuid;

const UUID_PATTERN: &str =
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";
const BASE_URL_PATTERN: &str = r"^https?://.+/$";

/// Compiled matchers for client ids, tenant ids and base URLs.
///
/// Construct one per process and pass it to whatever needs it; compiling is
/// the only cost and the matchers are immutable afterwards.
#[derive(Debug, Clone)]
pub struct IdentityValidator {
    uuid: Regex,
    base_url: Regex,
}

impl IdentityValidator {
    pub fn new() -> Self {
        Self {
            uuid: Regex::new(UUID_PATTERN).expect("static regex"),
            base_url: Regex::new(BASE_URL_PATTERN).expect("static regex"),
        }
    }

    /// Whether `input` is a hyphenated 8-4-4-4-12 hex UUID.
    pub fn is_uuid(&self, input: &str) -> bool {
        self.uuid.is_match(input)
    }

    /// Whether `input` is an http(s) URL ending in `/`.
    pub fn is_base_url(&self, input: &str) -> bool {
        self.base_url.is_match(input)
    }

    /// Parse a hyphenated UUID, rejecting the other spellings `uuid` accepts.
    pub fn parse_uuid(&self, input: &str) -> Option<Uuid> {
        if !self.is_uuid(input) {
            return None;
        }
        Uuid::parse_str(input).ok()
    }
}

impl Default for IdentityValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_formats() {
        let validator = IdentityValidator::new();

        assert!(validator.is_uuid("62d51730-37d6-430c-b3c5-d2bcaaf4bdb1"));
        assert!(validator.is_uuid("62D51730-37D6-430C-B3C5-D2BCAAF4BDB1"));
        assert!(!validator.is_uuid("not-a-uuid"));
        assert!(!validator.is_uuid("62d5173037d6430cb3c5d2bcaaf4bdb1"));
        assert!(!validator.is_uuid("{62d51730-37d6-430c-b3c5-d2bcaaf4bdb1}"));
        assert!(!validator.is_uuid(" 62d51730-37d6-430c-b3c5-d2bcaaf4bdb1"));
    }

    #[test]
    fn test_parse_uuid_normalizes_case() {
        let validator = IdentityValidator::new();
        let id = validator
            .parse_uuid("62D51730-37D6-430C-B3C5-D2BCAAF4BDB1")
            .unwrap();
        assert_eq!(id.hyphenated().to_string(), "62d51730-37d6-430c-b3c5-d2bcaaf4bdb1");
    }

    #[test]
    fn test_base_url_requires_trailing_slash() {
        let validator = IdentityValidator::new();

        assert!(validator.is_base_url("https://greenfield.example.com/"));
        assert!(validator.is_base_url("http://localhost:8080/api/"));
        assert!(!validator.is_base_url("https://greenfield.example.com"));
        assert!(!validator.is_base_url("ftp://greenfield.example.com/"));
        assert!(!validator.is_base_url("https:///"));
    }
}
