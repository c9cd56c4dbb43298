use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};

/// 配置验证规则
#[derive(Debug, Clone)]
pub struct ConfigValidationRule {
    pub key: String,
    pub data_type: ConfigDataType,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub allowed_values: Option<Vec<String>>,
    pub regex_pattern: Option<String>,
    pub description: String,
}

/// 配置数据类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigDataType {
    String,
    Integer,
    Boolean,
}

/// 应用配置结构体（对应配置文件的分节）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfiguration {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
    pub sa_token: AuthSettings,
    pub mail: MailSettings,
    pub users: UsersSettings,
    pub bootstrap: Option<BootstrapSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub debug: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: Some(4),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// 存储后端 / Storage backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub pass: String,
    pub name: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            pass: String::new(),
            name: "vgo_users".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub token_name: String,
    pub timeout_seconds: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_name: "vgo-token".to_string(),
            timeout_seconds: 86400,
        }
    }
}

/// 邮件投递方式 / Mail transport
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// 只写日志，仅用于开发环境
    #[default]
    Log,
    Smtp,
}

/// SMTP 连接加密方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    #[default]
    Starttls,
    /// 隐式 TLS（SMTPS, 465）
    Wrapper,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub tls: SmtpTls,
    pub timeout_seconds: u64,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            tls: SmtpTls::Starttls,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub sender: String,
    pub transport: MailTransport,
    pub smtp: SmtpSettings,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            sender: "noreply@vgo.local".to_string(),
            transport: MailTransport::Log,
            smtp: SmtpSettings::default(),
        }
    }
}

/// 用户管理相关设置 / User management settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersSettings {
    /// 生成密码的长度
    pub password_length: usize,
    /// 存放匿名视图 IP 的集合名
    pub anonymized_view_key: String,
}

impl Default for UsersSettings {
    fn default() -> Self {
        Self {
            password_length: 12,
            anonymized_view_key: "anonymized_view_starter_ips".to_string(),
        }
    }
}

/// 内存存储启动时创建的超级管理员 / Administrator seeded into the memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSettings {
    pub admin_name: String,
    pub admin_email: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
}

/// 配置验证器
pub struct ConfigValidator {
    rules: HashMap<String, ConfigValidationRule>,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let rules = [
            ConfigValidationRule {
                key: "server.host".to_string(),
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: None,
                regex_pattern: Some(r"^[a-zA-Z0-9.-]+$".to_string()),
                description: "服务器主机地址".to_string(),
            },
            ConfigValidationRule {
                key: "server.port".to_string(),
                data_type: ConfigDataType::Integer,
                min_value: Some(1024.0),
                max_value: Some(65535.0),
                allowed_values: None,
                regex_pattern: None,
                description: "服务器端口".to_string(),
            },
            ConfigValidationRule {
                key: "logging.level".to_string(),
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: Some(
                    ["trace", "debug", "info", "warn", "error"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                ),
                regex_pattern: None,
                description: "日志级别".to_string(),
            },
            ConfigValidationRule {
                key: "storage.backend".to_string(),
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: Some(vec!["memory".to_string(), "postgres".to_string()]),
                regex_pattern: None,
                description: "存储后端".to_string(),
            },
            ConfigValidationRule {
                key: "mail.sender".to_string(),
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: None,
                regex_pattern: Some(r"^[^@\s]+@[^@\s]+$".to_string()),
                description: "发件人地址".to_string(),
            },
            ConfigValidationRule {
                key: "mail.smtp.host".to_string(),
                data_type: ConfigDataType::String,
                min_value: None,
                max_value: None,
                allowed_values: None,
                regex_pattern: Some(r"^[a-zA-Z0-9.-]+$".to_string()),
                description: "SMTP 主机地址".to_string(),
            },
            ConfigValidationRule {
                key: "mail.smtp.port".to_string(),
                data_type: ConfigDataType::Integer,
                min_value: Some(1.0),
                max_value: Some(65535.0),
                allowed_values: None,
                regex_pattern: None,
                description: "SMTP 端口".to_string(),
            },
            ConfigValidationRule {
                key: "logging.json_format".to_string(),
                data_type: ConfigDataType::Boolean,
                min_value: None,
                max_value: None,
                allowed_values: None,
                regex_pattern: None,
                description: "是否输出 JSON 日志".to_string(),
            },
        ];

        Self {
            rules: rules.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    /// 验证配置值
    pub fn validate_value(&self, key: &str, value: &serde_json::Value) -> AppResult<()> {
        if let Some(rule) = self.rules.get(key) {
            self.validate_against_rule(rule, value)?;
        }
        Ok(())
    }

    /// 验证整个配置
    pub fn validate_config(&self, config: &AppConfiguration) -> AppResult<()> {
        self.validate_value("server.host", &serde_json::json!(config.server.host))?;
        self.validate_value("server.port", &serde_json::json!(config.server.port))?;
        self.validate_value("logging.level", &serde_json::json!(config.logging.level))?;
        self.validate_value("mail.sender", &serde_json::json!(config.mail.sender))?;

        if config.mail.transport == MailTransport::Smtp {
            let smtp = &config.mail.smtp;
            self.validate_value("mail.smtp.host", &serde_json::json!(smtp.host))?;
            self.validate_value("mail.smtp.port", &serde_json::json!(smtp.port))?;
            if smtp.username.is_some() != smtp.password.is_some() {
                return Err(AppError::validation(
                    "mail.smtp",
                    "SMTP 用户名和密码必须同时配置",
                ));
            }
            if smtp.timeout_seconds == 0 {
                return Err(AppError::validation("mail.smtp.timeout_seconds", "超时必须为正数"));
            }
        }

        if let Some(workers) = config.server.workers {
            if workers == 0 || workers > 32 {
                return Err(AppError::validation("server.workers", "工作线程数必须在1-32范围内"));
            }
        }

        if config.storage.backend == StorageBackend::Postgres {
            let db = &config.database;
            if db.url.is_none() && (db.host.is_empty() || db.name.is_empty()) {
                return Err(AppError::validation(
                    "database",
                    "postgres 后端需要 database.url 或 host/name",
                ));
            }
            if db.max_connections == 0 || db.max_connections > 100 {
                return Err(AppError::validation(
                    "database.max_connections",
                    "数据库连接池大小必须在1-100范围内",
                ));
            }
        }

        if config.sa_token.token_name.trim().is_empty() {
            return Err(AppError::validation("sa_token.token_name", "令牌名称不能为空"));
        }
        if config.sa_token.timeout_seconds <= 0 {
            return Err(AppError::validation("sa_token.timeout_seconds", "令牌有效期必须为正数"));
        }

        if !(8..=64).contains(&config.users.password_length) {
            return Err(AppError::validation("users.password_length", "密码长度必须在8-64范围内"));
        }
        if config.users.anonymized_view_key.trim().is_empty() {
            return Err(AppError::validation("users.anonymized_view_key", "集合名不能为空"));
        }

        if let Some(bootstrap) = &config.bootstrap {
            if bootstrap.admin_name.trim().is_empty() || bootstrap.admin_password.is_empty() {
                return Err(AppError::validation("bootstrap", "管理员名称和密码不能为空"));
            }
        }

        Ok(())
    }

    /// 根据规则验证值
    fn validate_against_rule(
        &self,
        rule: &ConfigValidationRule,
        value: &serde_json::Value,
    ) -> AppResult<()> {
        match (&rule.data_type, value) {
            (ConfigDataType::String, serde_json::Value::String(s)) => {
                if let Some(pattern) = &rule.regex_pattern {
                    let regex = regex::Regex::new(pattern).map_err(|e| {
                        AppError::validation(&rule.key, format!("正则表达式错误: {}", e))
                    })?;
                    if !regex.is_match(s) {
                        return Err(AppError::validation(
                            &rule.key,
                            format!("{}不匹配 {}", rule.description, pattern),
                        ));
                    }
                }
                if let Some(allowed) = &rule.allowed_values {
                    if !allowed.contains(s) {
                        return Err(AppError::validation(
                            &rule.key,
                            format!("值必须是以下之一: {}", allowed.join(", ")),
                        ));
                    }
                }
            }
            (ConfigDataType::Integer, serde_json::Value::Number(n)) => {
                if let Some(f) = n.as_f64() {
                    if rule.min_value.is_some_and(|min| f < min) {
                        return Err(AppError::validation(
                            &rule.key,
                            format!("{}必须大于等于 {:?}", rule.description, rule.min_value),
                        ));
                    }
                    if rule.max_value.is_some_and(|max| f > max) {
                        return Err(AppError::validation(
                            &rule.key,
                            format!("{}必须小于等于 {:?}", rule.description, rule.max_value),
                        ));
                    }
                }
            }
            (ConfigDataType::Boolean, serde_json::Value::Bool(_)) => {}
            _ => {
                return Err(AppError::validation(
                    &rule.key,
                    format!("数据类型不匹配，期望: {:?}", rule.data_type),
                ));
            }
        }

        Ok(())
    }
}

/// 环境特定配置加载器
pub struct EnvironmentConfigLoader {
    environment: String,
}

impl Default for EnvironmentConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentConfigLoader {
    /// 从 `VGO_ENV` 读取环境，默认 development
    pub fn new() -> Self {
        let environment =
            std::env::var("VGO_ENV").unwrap_or_else(|_| "development".to_string());
        Self { environment }
    }

    pub fn for_environment(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
        }
    }

    /// 获取当前环境
    pub fn get_environment(&self) -> &str {
        &self.environment
    }

    /// 获取环境特定的配置文件路径
    pub fn get_config_paths(&self) -> Vec<String> {
        vec![
            "config/default.toml".to_string(),
            format!("config/{}.toml", self.environment),
            "config/local.toml".to_string(),
        ]
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let validator = ConfigValidator::new();
        let config = AppConfiguration::default();

        assert!(validator.validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_port() {
        let mut config = AppConfiguration::default();
        config.server.port = 80;

        let validator = ConfigValidator::new();
        assert!(validator.validate_config(&config).is_err());
    }

    #[test]
    fn postgres_backend_needs_a_database() {
        let mut config = AppConfiguration::default();
        config.storage.backend = StorageBackend::Postgres;
        config.database.host.clear();

        let validator = ConfigValidator::new();
        assert!(validator.validate_config(&config).is_err());

        config.database.url = Some("postgres://u:p@localhost/db".to_string());
        assert!(validator.validate_config(&config).is_ok());
    }

    #[test]
    fn bootstrap_admin_needs_password() {
        let mut config = AppConfiguration::default();
        config.bootstrap = Some(BootstrapSettings {
            admin_name: "admin".to_string(),
            admin_email: "admin@example.edu".to_string(),
            admin_password: String::new(),
        });
        assert!(ConfigValidator::new().validate_config(&config).is_err());
    }

    #[test]
    fn rule_rejects_unknown_log_level_and_wrong_type() {
        let validator = ConfigValidator::new();
        assert!(validator
            .validate_value("logging.level", &serde_json::json!("loud"))
            .is_err());
        assert!(validator
            .validate_value("logging.json_format", &serde_json::json!("yes"))
            .is_err());
        assert!(validator
            .validate_value("unknown.key", &serde_json::json!(1))
            .is_ok());
    }

    #[test]
    fn smtp_transport_is_checked() {
        let mut config = AppConfiguration::default();
        config.mail.transport = MailTransport::Smtp;
        config.mail.smtp.host = "smtp.example.edu".to_string();
        let validator = ConfigValidator::new();
        assert!(validator.validate_config(&config).is_ok());

        config.mail.smtp.username = Some("mailer".to_string());
        assert!(validator.validate_config(&config).is_err());
        config.mail.smtp.password = Some("secret".to_string());
        assert!(validator.validate_config(&config).is_ok());

        config.mail.smtp.host = "bad host".to_string();
        assert!(validator.validate_config(&config).is_err());
    }

    #[test]
    fn test_environment_loader() {
        let loader = EnvironmentConfigLoader::for_environment("test");
        let paths = loader.get_config_paths();

        assert_eq!(paths.len(), 3);
        assert_eq!(paths[1], "config/test.toml");
        assert!(!loader.is_production());
    }
}
