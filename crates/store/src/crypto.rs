//! Password hashing for test actors
//!
//! Stored form is `sha256$<salt hex>$<digest hex>`, the digest covering the
//! salt followed by the password bytes.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Hash a plaintext password with a fresh random salt
pub fn hash_password(plain: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    encode(&salt, plain)
}

/// Check a plaintext password against a stored hash
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt_hex), Some(_)) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if scheme != SCHEME {
        return false;
    }
    match hex::decode(salt_hex) {
        Ok(salt) => encode(&salt, plain) == stored,
        Err(_) => false,
    }
}

fn encode(salt: &[u8], plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plain.as_bytes());
    format!("{}${}${}", SCHEME, hex::encode(salt), hex::encode(hasher.finalize()))
}
