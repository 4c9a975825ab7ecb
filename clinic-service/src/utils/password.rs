use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt;
use std::sync::OnceLock;

/// Plain-text password. `Debug` is redacted so it never reaches the logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// PHC-formatted Argon2 hash as stored in `staff.password_hash`.
#[derive(Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHashString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHashString(***)")
    }
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash. `Err` on mismatch or malformed hash.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<(), anyhow::Error> {
    let parsed_hash = PasswordHash::new(password_hash.as_str())
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .map_err(|_| anyhow::anyhow!("Password verification failed"))
}

fn dummy_hash() -> Option<&'static PasswordHashString> {
    static DUMMY: OnceLock<Option<PasswordHashString>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password(&Password::new("no-such-account")).ok())
        .as_ref()
}

/// Spend one Argon2 verification when there is no account to check against,
/// so unknown and known emails take the same time to reject.
pub fn verify_dummy_password(password: &Password) {
    if let Some(hash) = dummy_hash() {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let password = Password::new("Fluoride-2025");
        let hash = hash_password(&password).expect("hash");

        assert!(hash.as_str().starts_with("$argon2id$"));
        assert!(verify_password(&password, &hash).is_ok());
        assert!(verify_password(&Password::new("fluoride-2025"), &hash).is_err());
    }

    #[test]
    fn salts_differ_between_hashes() {
        let password = Password::new("same-password");
        let a = hash_password(&password).unwrap();
        let b = hash_password(&password).unwrap();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn debug_output_is_redacted() {
        let password = Password::new("hunter22");
        assert_eq!(format!("{:?}", password), "Password(***)");
    }

    #[test]
    fn dummy_hash_is_argon2_and_stable() {
        let first = dummy_hash().expect("dummy hash");
        let second = dummy_hash().expect("dummy hash");

        assert!(first.as_str().starts_with("$argon2id$"));
        assert_eq!(first.as_str(), second.as_str());
        assert!(verify_password(&Password::new("Fluoride-2025"), first).is_err());

        verify_dummy_password(&Password::new("Fluoride-2025"));
    }

    #[test]
    fn malformed_hash_is_an_error() {
        let result = verify_password(
            &Password::new("anything"),
            &PasswordHashString::new("not-a-phc-string".to_string()),
        );
        assert!(result.is_err());
    }
}
