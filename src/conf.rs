//! Sa-Token 配置初始化
//! Sa-Token Configuration Initialization

use crate::comm::config_validator::AuthSettings;
use crate::comm::MyListener;
use anyhow::Result;
use sa_token_core::config::TokenStyle;
use sa_token_core::{SaTokenConfig, SaTokenManager};
use sa_token_storage_memory::MemoryStorage;
use std::sync::Arc;

/// Redis配置
/// Redis Configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: Option<String>,
}

/// 初始化 Sa-Token
/// Initialize Sa-Token
///
/// 提供 Redis 配置（且启用 `redis` 特性）时使用 Redis 存储，否则使用内存存储
/// Uses Redis storage when configured and the `redis` feature is on, memory otherwise
pub async fn init_sa_token(
    settings: &AuthSettings,
    redis_config: Option<&RedisConfig>,
) -> Result<Arc<SaTokenManager>> {
    let mut config_builder = SaTokenConfig::builder()
        .token_name(settings.token_name.clone())
        .timeout(settings.timeout_seconds)
        .register_listener(Arc::new(MyListener))
        .token_style(TokenStyle::Tik)
        .auto_renew(true);

    match redis_config {
        #[cfg(feature = "redis")]
        Some(redis_cfg) => {
            use sa_token_storage_redis::{RedisConfig, RedisStorage};

            let redis_storage = RedisStorage::new(RedisConfig {
                url: redis_cfg.url.clone(),
                prefix: redis_cfg
                    .prefix
                    .clone()
                    .unwrap_or_else(|| "sa_token:".to_string()),
            })
            .await?;

            config_builder = config_builder.storage(Arc::new(redis_storage));
            tracing::info!("使用 Redis 存储 / Using Redis storage: {}", redis_cfg.url);
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            tracing::warn!("Redis 功能未启用，回退到内存存储 / redis feature off, using memory");
            config_builder = config_builder.storage(Arc::new(MemoryStorage::new()));
        }
        None => {
            config_builder = config_builder.storage(Arc::new(MemoryStorage::new()));
            tracing::info!("使用内存存储 / Using memory storage");
        }
    }

    Ok(Arc::new(config_builder.build()))
}
