//! vgo-users：基于角色层级的用户账号管理服务
//! Role-scoped user account management service

pub mod api;
pub mod auth;
#[path = "bootstrap/app_bootstrap.rs"]
pub mod app_bootstrap;
#[path = "bootstrap/command_registry.rs"]
pub mod command_registry;
#[path = "bootstrap/route_registry.rs"]
pub mod route_registry;
pub mod cmd;
pub mod comm;
pub mod conf;
pub mod db;
pub mod error;
pub mod mail;
pub mod model;
pub mod modules;
pub mod repo;
pub mod security;
pub mod service;

/// 初始化所有模块的命令
pub fn init_commands() {
    modules::users::register_users_commands();
}

/// 初始化所有模块的路由
pub fn init_routes() {
    modules::users::register_users_routes();
    auth::register_auth_routes();
}

// Re-export bootstrap modules
pub use app_bootstrap::*;
pub use command_registry::*;
pub use route_registry::*;

// 健康检查接口与状态定义
// Health check interface and status definitions
use async_trait::async_trait;

/// 健康状态结构体：用于表示组件当前健康状况
/// Health status struct: represents the current health of a component
#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct HealthStatus {
    /// 组件名称（如 postgres_pool、memory_store）
    pub component: String,
    pub healthy: bool,
    /// 附加消息（错误信息或提示）
    pub message: Option<String>,
    #[schema(value_type = String)]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthStatus {
    pub fn healthy(component: &str) -> Self {
        Self {
            component: component.to_string(),
            healthy: true,
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn unhealthy(component: &str, message: String) -> Self {
        Self {
            component: component.to_string(),
            healthy: false,
            message: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// 健康检查通用接口：由各服务或资源实现具体检查逻辑
/// Generic health check interface: implemented by services/resources with concrete logic
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// 执行健康检查并返回健康状态
    async fn check_health(&self) -> HealthStatus;
}
