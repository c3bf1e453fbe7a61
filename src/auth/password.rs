use sha2::{Digest, Sha256};

/// Hex SHA-256 digest stored in the users table
pub fn hash_password(plain: &str) -> String {
    format!("{:x}", Sha256::digest(plain.as_bytes()))
}

pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    hash_password(plain).eq_ignore_ascii_case(stored_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_stable_hex() {
        let hash = hash_password("pwd");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_password("pwd"));
        assert!(verify_password("pwd", &hash.to_uppercase()));
        assert!(!verify_password("other", &hash));
    }
}
