use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

const SCHEME: &str = "pbkdf2_sha256";
const DEFAULT_ITERATIONS: u32 = 200_000;
const SALT_BYTES: usize = 16;
const KEY_BYTES: usize = 32;

/// A stored credential: `pbkdf2_sha256$<iterations>$<salt>$<key>`, base64
/// without padding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub iterations: u32,
    pub salt: Vec<u8>,
    pub key: Vec<u8>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PasswordHashError {
    #[error("unsupported hash scheme '{0}'")]
    Scheme(String),
    #[error("malformed password hash")]
    Malformed,
}

impl FromStr for PasswordHash {
    type Err = PasswordHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, '$');
        let scheme = parts.next().unwrap_or_default();
        if scheme != SCHEME {
            return Err(PasswordHashError::Scheme(scheme.to_string()));
        }
        let (Some(iterations), Some(salt), Some(key)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(PasswordHashError::Malformed);
        };

        let iterations: u32 = iterations.parse().map_err(|_| PasswordHashError::Malformed)?;
        if iterations == 0 {
            return Err(PasswordHashError::Malformed);
        }
        Ok(Self {
            iterations,
            salt: STANDARD_NO_PAD.decode(salt).map_err(|_| PasswordHashError::Malformed)?,
            key: STANDARD_NO_PAD.decode(key).map_err(|_| PasswordHashError::Malformed)?,
        })
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD_NO_PAD.encode(&self.salt),
            STANDARD_NO_PAD.encode(&self.key)
        )
    }
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    hash_password_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> anyhow::Result<String> {
    let password = password.trim();
    if password.is_empty() {
        anyhow::bail!("password cannot be blank");
    }

    let mut salt = vec![0u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let key = derive(password.as_bytes(), &salt, iterations).to_vec();

    Ok(PasswordHash { iterations, salt, key }.to_string())
}

/// Unparseable hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let password = password.trim();
    if password.is_empty() {
        return false;
    }
    let Ok(hash) = stored.parse::<PasswordHash>() else {
        return false;
    };

    let derived = derive(password.as_bytes(), &hash.salt, hash.iterations);
    derived.ct_eq(hash.key.as_slice()).into()
}

fn derive(password: &[u8], salt: &[u8], iterations: u32) -> [u8; KEY_BYTES] {
    let mut out = [0u8; KEY_BYTES];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_verify_and_reject_wrong_passwords() {
        let stored = hash_password_with_iterations("correct horse", 1_000).unwrap();

        assert!(stored.starts_with("pbkdf2_sha256$1000$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("wrong horse", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password_with_iterations("same", 1_000).unwrap();
        let b = hash_password_with_iterations("same", 1_000).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn blank_passwords_are_refused() {
        assert!(hash_password_with_iterations("   ", 1_000).is_err());
    }

    #[test]
    fn parse_and_display_agree() {
        let stored = hash_password_with_iterations("pw", 1_000).unwrap();
        let parsed: PasswordHash = stored.parse().unwrap();

        assert_eq!(parsed.iterations, 1_000);
        assert_eq!(parsed.salt.len(), SALT_BYTES);
        assert_eq!(parsed.key.len(), KEY_BYTES);
        assert_eq!(parsed.to_string(), stored);
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert_eq!(
            "bcrypt$10$abc$def".parse::<PasswordHash>(),
            Err(PasswordHashError::Scheme("bcrypt".to_string()))
        );
        assert_eq!(
            "pbkdf2_sha256$x$abc$def".parse::<PasswordHash>(),
            Err(PasswordHashError::Malformed)
        );
        assert!(!verify_password("pw", "pbkdf2_sha256$1000"));
        assert!(!verify_password("pw", "plaintext"));
    }
}
