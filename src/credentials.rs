// Credential generation backed by the operating system's secure random source

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use thiserror::Error;

// Symbols limited to characters that survive shells, URLs, and config files
// unescaped.
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.@+=";
const ACCESS_KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SECRET_KEY_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.+";

#[derive(Debug, Error)]
pub enum CredentialError {
    /// The OS refused to hand out secure random bytes. Fatal for the run;
    /// falling back to a weaker source is never acceptable for credentials.
    #[error("secure random source unavailable: {0}")]
    EntropyUnavailable(#[source] rand::Error),
}

/// Character set a credential is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Mixed-case alphanumerics plus shell-safe symbols, for passwords.
    Password,
    /// Uppercase plus digits, matching the store's access-key convention.
    AccessKey,
    /// Base62 plus symbols, for secret keys.
    SecretKey,
}

impl Charset {
    fn alphabet(self) -> &'static [u8] {
        match self {
            Charset::Password => PASSWORD_CHARSET,
            Charset::AccessKey => ACCESS_KEY_CHARSET,
            Charset::SecretKey => SECRET_KEY_CHARSET,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Charset::Password => "alphanumeric+symbols",
            Charset::AccessKey => "uppercase+digits",
            Charset::SecretKey => "base62+symbols",
        }
    }
}

/// A freshly generated secret and the parameters it was generated under.
///
/// The value is only reachable through [`Credential::value`] /
/// [`Credential::into_value`]; the `Debug` output redacts it so a credential
/// caught in an error chain or debug log never exposes the secret.
#[derive(Clone)]
pub struct Credential {
    value: String,
    pub generated_at: DateTime<Utc>,
    pub length: usize,
    pub charset: Charset,
}

impl Credential {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn into_value(self) -> String {
        self.value
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("generated_at", &self.generated_at)
            .field("length", &self.length)
            .field("charset", &self.charset.label())
            .finish()
    }
}

/// Lengths for the three credentials a provisioning run needs.
///
/// These are configuration, not constants: callers may tighten or loosen
/// them per deployment. The defaults match the conventions of the target
/// store (20-char access keys) and common password-policy floors.
#[derive(Debug, Clone)]
pub struct CredentialProfile {
    pub admin_password_length: usize,
    pub access_key_length: usize,
    pub secret_key_length: usize,
}

impl Default for CredentialProfile {
    fn default() -> Self {
        Self {
            admin_password_length: 24,
            access_key_length: 20,
            secret_key_length: 40,
        }
    }
}

impl CredentialProfile {
    pub fn admin_password(&self) -> Result<Credential, CredentialError> {
        generate(self.admin_password_length, Charset::Password)
    }

    pub fn access_key(&self) -> Result<Credential, CredentialError> {
        generate(self.access_key_length, Charset::AccessKey)
    }

    pub fn secret_key(&self) -> Result<Credential, CredentialError> {
        generate(self.secret_key_length, Charset::SecretKey)
    }
}

/// Draw a random string of `length` characters from `charset`.
///
/// Bytes come straight from the OS CSPRNG and are rejection-sampled so every
/// character of the alphabet is equally likely. Separate calls share no
/// state, so no generated value is derivable from another.
pub fn generate(length: usize, charset: Charset) -> Result<Credential, CredentialError> {
    let alphabet = charset.alphabet();
    // Reject bytes above the largest multiple of the alphabet size to avoid
    // modulo bias toward the low end of the alphabet.
    let limit = 256 - (256 % alphabet.len());

    let mut value = String::with_capacity(length);
    let mut buf = [0u8; 64];
    while value.len() < length {
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(CredentialError::EntropyUnavailable)?;
        for &byte in &buf {
            if (byte as usize) < limit {
                value.push(alphabet[byte as usize % alphabet.len()] as char);
                if value.len() == length {
                    break;
                }
            }
        }
    }

    Ok(Credential {
        value,
        generated_at: Utc::now(),
        length,
        charset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_length_and_charset() {
        let cred = generate(24, Charset::Password).unwrap();
        assert_eq!(cred.value().len(), 24);
        assert!(cred
            .value()
            .bytes()
            .all(|b| PASSWORD_CHARSET.contains(&b)));

        let key = generate(20, Charset::AccessKey).unwrap();
        assert_eq!(key.value().len(), 20);
        assert!(key
            .value()
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_profile_defaults() {
        let profile = CredentialProfile::default();
        assert_eq!(profile.admin_password().unwrap().value().len(), 24);
        assert_eq!(profile.access_key().unwrap().value().len(), 20);
        assert_eq!(profile.secret_key().unwrap().value().len(), 40);
    }

    #[test]
    fn test_no_collisions_across_many_draws() {
        // Statistical independence check: 10,000 draws with the same
        // parameters must all differ.
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let cred = generate(20, Charset::AccessKey).unwrap();
            assert!(seen.insert(cred.into_value()));
        }
    }

    #[test]
    fn test_distinct_across_charsets() {
        let password = generate(40, Charset::Password).unwrap();
        let secret = generate(40, Charset::SecretKey).unwrap();
        assert_ne!(password.value(), secret.value());
    }

    #[test]
    fn test_debug_redacts_value() {
        let cred = generate(24, Charset::Password).unwrap();
        let debug = format!("{:?}", cred);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(cred.value()));
    }
}
