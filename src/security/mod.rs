//! 密码与密钥工具 / Password and key pair helpers

pub mod keys;
pub mod password;

pub use keys::{generate_key_pair, matches_public_key, KeyError, KeyPair};
pub use password::{
    generate_password, hash_password, verify_password, HashedPassword, PasswordError,
};
