use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng, RngCore};
use thiserror::Error;

const SALT_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    Malformed(String),
}

/// 哈希结果：PHC 字符串与其盐 / PHC hash string and the salt inside it
#[derive(Debug, Clone)]
pub struct HashedPassword {
    pub hash: String,
    pub salt: String,
}

/// 生成指定长度的字母数字随机密码
pub fn generate_password(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// 使用随机盐计算 argon2 哈希
pub fn hash_password(password: &str) -> Result<HashedPassword, PasswordError> {
    let mut bytes = [0u8; SALT_LEN];
    thread_rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::Hash(e.to_string()))?;
    Ok(HashedPassword {
        hash: hash.to_string(),
        salt: salt.as_str().to_string(),
    })
}

/// 校验明文密码与存储的 PHC 字符串
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| PasswordError::Malformed(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_are_alphanumeric() {
        let pw = generate_password(12);
        assert_eq!(pw.len(), 12);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(pw, generate_password(12));
    }

    #[test]
    fn hash_verifies_only_the_original() {
        let hashed = hash_password("s3cret-pw").unwrap();
        assert!(hashed.hash.starts_with("$argon2"));
        assert!(hashed.hash.contains(&hashed.salt));
        assert!(verify_password("s3cret-pw", &hashed.hash).unwrap());
        assert!(!verify_password("wrong", &hashed.hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("x", "plain-text"),
            Err(PasswordError::Malformed(_))
        ));
    }
}
