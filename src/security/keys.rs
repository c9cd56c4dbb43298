use rand::{thread_rng, RngCore};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generate(String),
    #[error("invalid key: {0}")]
    Invalid(String),
}

/// secp256k1 密钥对（十六进制） / secp256k1 key pair, hex encoded
#[derive(Debug, Clone)]
pub struct KeyPair {
    /// 私钥只在生成时返回一次
    pub private_key: String,
    /// 压缩 SEC1 公钥
    pub public_key: String,
}

pub fn generate_key_pair() -> Result<KeyPair, KeyError> {
    let secp = Secp256k1::new();
    // 超出曲线阶的随机数无效，重新取样
    for _ in 0..4 {
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        if let Ok(secret) = SecretKey::from_slice(&bytes) {
            let public = PublicKey::from_secret_key(&secp, &secret);
            return Ok(KeyPair {
                private_key: hex::encode(secret.secret_bytes()),
                public_key: hex::encode(public.serialize()),
            });
        }
    }
    Err(KeyError::Generate("no valid secret key produced".to_string()))
}

/// 由私钥推导出的公钥是否与给定公钥一致
pub fn matches_public_key(private_hex: &str, public_hex: &str) -> Result<bool, KeyError> {
    let secret_bytes = hex::decode(private_hex).map_err(|e| KeyError::Invalid(e.to_string()))?;
    let secret =
        SecretKey::from_slice(&secret_bytes).map_err(|e| KeyError::Invalid(e.to_string()))?;
    let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
    Ok(hex::encode(public.serialize()) == public_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_pair_is_consistent() {
        let pair = generate_key_pair().unwrap();
        assert_eq!(pair.private_key.len(), 64);
        assert_eq!(pair.public_key.len(), 66);
        assert!(matches_public_key(&pair.private_key, &pair.public_key).unwrap());

        let other = generate_key_pair().unwrap();
        assert!(!matches_public_key(&other.private_key, &pair.public_key).unwrap());
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(matches_public_key("zz", "00").is_err());
    }
}
