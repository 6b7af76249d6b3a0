//! Startup checks. vhubd refuses to start without a session secret, a
//! data directory and a verifier key hash.

use crate::config::ServerConfig;

pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.session.secret.is_empty() {
        anyhow::bail!("Session secret is empty in configuration.");
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.verifier.key_hash.is_empty() {
        anyhow::bail!(
            "No verifier key hash found in configuration.\n\
             Hash a key with argon2id and set [verifier] key_hash."
        );
    }
    if password_hash::PasswordHash::new(&config.verifier.key_hash).is_err() {
        anyhow::bail!("Verifier key_hash is not a valid PHC string.");
    }
    if config.session.ttl_secs <= 0 {
        anyhow::bail!("Session ttl_secs must be positive.");
    }
    Ok(())
}

/// Check a presented verifier key against the stored argon2id hash.
pub fn verify_verifier_key(key: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::PasswordHash;
    use password_hash::PasswordVerifier;

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default().verify_password(key.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
pub(crate) fn hash_key(key: &str) -> String {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(key.as_bytes(), &salt)
        .unwrap()
        .to_string()
}
