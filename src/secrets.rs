//! Secret handling
//!
//! Admin password, session signing key and backend access key are kept in
//! `Zeroizing<String>` so they are wiped from memory when dropped.

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Minimum length a configured session secret should have (256 bits of hex)
pub const MIN_SESSION_SECRET_LENGTH: usize = 32;

/// Error type for secret validation
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Read a secret through `lookup`, treating empty or whitespace-only values as unset
pub fn load_optional<F>(lookup: &F, name: &str) -> Option<Zeroizing<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(Zeroizing::new)
}

/// Validate that a secret meets minimum length requirements
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} characters (minimum: {})",
            secret.len(),
            min_length
        )));
    }

    Ok(())
}

/// Generate a random hex-encoded key for signing session tokens
pub fn generate_session_secret() -> Zeroizing<String> {
    let mut bytes = Zeroizing::new([0u8; 32]);
    OsRng.fill_bytes(&mut bytes[..]);
    Zeroizing::new(hex::encode(&bytes[..]))
}

/// Mask a secret for log output, keeping only the first four characters
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "<REDACTED>".to_string()
    } else {
        format!("{}…<REDACTED>", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("short", 32).is_err());

        let strong_key = "a".repeat(32);
        assert!(validate_secret_strength(&strong_key, 32).is_ok());
    }

    #[test]
    fn test_load_optional_treats_blank_as_unset() {
        let lookup = |name: &str| match name {
            "BLANK" => Some("   ".to_string()),
            "SET" => Some(" value ".to_string()),
            _ => None,
        };

        assert!(load_optional(&lookup, "BLANK").is_none());
        assert!(load_optional(&lookup, "MISSING").is_none());
        assert_eq!(load_optional(&lookup, "SET").unwrap().as_str(), "value");
    }

    #[test]
    fn test_generated_secret_is_random_hex() {
        let a = generate_session_secret();
        let b = generate_session_secret();

        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("abc"), "<REDACTED>");
        assert_eq!(redact("eyJhbGciOi"), "eyJh…<REDACTED>");
    }
}
