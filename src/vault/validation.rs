//! Input validation rules (spec §3): key names, field names, tags, URLs,
//! password length, and the advisory password-strength classifier.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub const MAX_KEY_LEN: usize = 256;
pub const MAX_VALUE_BYTES: usize = 1024 * 1024;
pub const MAX_NOTES_BYTES: usize = 10 * 1024;
pub const MAX_URL_LEN: usize = 2048;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 64;
pub const MAX_FIELD_NAME_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

const RESERVED_PREFIXES: &[&str] = &["_internal/", "_system/"];

pub fn validate_key_name(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::KeyTooShort);
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(Error::KeyTooLong);
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
    {
        return Err(Error::KeyInvalid(
            "only letters, digits, '.', '_', '/', '-' are allowed".to_string(),
        ));
    }
    if key.starts_with('.') || key.starts_with('-') {
        return Err(Error::KeyInvalid("must not start with '.' or '-'".to_string()));
    }
    if key.contains("..") {
        return Err(Error::KeyInvalid("must not contain '..'".to_string()));
    }
    if key.starts_with('/') || key.ends_with('/') {
        return Err(Error::KeyInvalid("must not start or end with '/'".to_string()));
    }
    for prefix in RESERVED_PREFIXES {
        if key.starts_with(prefix) {
            return Err(Error::KeyInvalid(format!("reserved prefix '{prefix}'")));
        }
    }
    Ok(())
}

pub fn validate_value_size(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_BYTES {
        Err(Error::ValueTooLarge)
    } else {
        Ok(())
    }
}

pub fn validate_notes(notes: &str) -> Result<()> {
    if notes.len() > MAX_NOTES_BYTES {
        Err(Error::NotesTooLarge)
    } else {
        Ok(())
    }
}

pub fn validate_url(url: &str) -> Result<()> {
    if url.chars().count() > MAX_URL_LEN {
        return Err(Error::UrlTooLong);
    }
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| Error::UrlInvalid("scheme must be http or https".to_string()))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    if host.is_empty() {
        return Err(Error::UrlInvalid("host must not be empty".to_string()));
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(Error::TooManyTags);
    }
    for tag in tags {
        let len = tag.chars().count();
        let shape_ok = len >= 1
            && len <= MAX_TAG_LEN
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !shape_ok {
            return Err(Error::TagInvalid(tag.clone()));
        }
    }
    Ok(())
}

pub fn validate_expires_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if expires_at <= now {
        Err(Error::ExpiresInPast)
    } else {
        Ok(())
    }
}

pub fn validate_field_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_FIELD_NAME_LEN {
        return Err(Error::KeyInvalid(format!("field name '{name}' has invalid length")));
    }
    let mut chars = name.chars();
    let first = chars.next().expect("len checked above");
    if !first.is_ascii_lowercase() {
        return Err(Error::KeyInvalid(format!("field name '{name}' must start with a-z")));
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        return Err(Error::KeyInvalid(format!(
            "field name '{name}' must match [a-z][a-z0-9_]*"
        )));
    }
    Ok(())
}

pub fn validate_password_len(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        Err(Error::PasswordTooShort)
    } else if len > MAX_PASSWORD_LEN {
        Err(Error::PasswordTooLong)
    } else {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasswordStrength {
    Weak,
    Fair,
    Good,
    Strong,
}

/// Advisory-only classification by length and character-class variety;
/// never blocks a password change.
pub fn classify_password_strength(password: &str) -> PasswordStrength {
    let len = password.chars().count();
    let classes = [
        password.chars().any(|c| c.is_ascii_uppercase()),
        password.chars().any(|c| c.is_ascii_lowercase()),
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .into_iter()
    .filter(|present| *present)
    .count();

    if len < 10 {
        PasswordStrength::Weak
    } else if len >= 16 && classes >= 3 {
        PasswordStrength::Strong
    } else if len >= 12 && classes >= 2 {
        PasswordStrength::Good
    } else {
        PasswordStrength::Fair
    }
}

pub fn validate_folder_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::FolderNameInvalid("must not be empty".to_string()));
    }
    if name.contains('/') {
        return Err(Error::FolderNameInvalid("must not contain '/'".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_name_accepts_typical_paths() {
        assert!(validate_key_name("api/openai").is_ok());
        assert!(validate_key_name("db.prod-1").is_ok());
    }

    #[test]
    fn key_name_rejects_reserved_prefix() {
        assert!(matches!(validate_key_name("_internal/foo"), Err(Error::KeyInvalid(_))));
    }

    #[test]
    fn key_name_rejects_leading_dot_and_dash() {
        assert!(matches!(validate_key_name(".hidden"), Err(Error::KeyInvalid(_))));
        assert!(matches!(validate_key_name("-flag"), Err(Error::KeyInvalid(_))));
    }

    #[test]
    fn key_name_rejects_double_dot_and_slashes() {
        assert!(matches!(validate_key_name("a..b"), Err(Error::KeyInvalid(_))));
        assert!(matches!(validate_key_name("/abs"), Err(Error::KeyInvalid(_))));
        assert!(matches!(validate_key_name("trailing/"), Err(Error::KeyInvalid(_))));
    }

    #[test]
    fn key_name_length_bounds() {
        assert!(matches!(validate_key_name(""), Err(Error::KeyTooShort)));
        let long = "a".repeat(MAX_KEY_LEN + 1);
        assert!(matches!(validate_key_name(&long), Err(Error::KeyTooLong)));
    }

    #[test]
    fn url_requires_http_scheme_and_host() {
        assert!(validate_url("https://example.com/path").is_ok());
        assert!(validate_url("ftp://example.com").is_err());
        assert!(validate_url("https://").is_err());
    }

    #[test]
    fn tags_enforce_count_and_shape() {
        assert!(validate_tags(&["ok-tag".to_string()]).is_ok());
        assert!(validate_tags(&["bad tag".to_string()]).is_err());
        let too_many: Vec<String> = (0..11).map(|i| format!("t{i}")).collect();
        assert!(matches!(validate_tags(&too_many), Err(Error::TooManyTags)));
    }

    #[test]
    fn field_name_must_be_snake_case_starting_lowercase() {
        assert!(validate_field_name("api_key").is_ok());
        assert!(validate_field_name("1field").is_err());
        assert!(validate_field_name("Field").is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert!(matches!(validate_password_len("short"), Err(Error::PasswordTooShort)));
        assert!(validate_password_len("correcthorsebatterystaple").is_ok());
        let long = "a".repeat(MAX_PASSWORD_LEN + 1);
        assert!(matches!(validate_password_len(&long), Err(Error::PasswordTooLong)));
    }

    #[test]
    fn strength_classifier_is_monotonic_with_variety() {
        assert_eq!(classify_password_strength("short"), PasswordStrength::Weak);
        assert_eq!(classify_password_strength("tr0ub4dor&3-long!"), PasswordStrength::Strong);
    }
}
