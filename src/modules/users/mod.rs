/// 用户模块
/// 用户账号的增删改查、密钥生成、自动补全与匿名视图

pub mod cmd;
pub mod controller;
pub mod responder;
pub mod routes;

use crate::route_registry::{register_global_route, RouteInfo};

/// 注册用户模块的路由
pub fn register_users_routes() {
    register_global_route(RouteInfo {
        name: "users".to_string(),
        description: "用户管理 / user management".to_string(),
        module: "users".to_string(),
        config_fn: routes::configure_users_routes,
    });
    register_global_route(RouteInfo {
        name: "health".to_string(),
        description: "存储健康检查 / storage health".to_string(),
        module: "users".to_string(),
        config_fn: routes::configure_health_routes,
    });
}

/// 注册用户模块的命令
pub fn register_users_commands() {
    crate::command_registry::register_module(Box::new(cmd::UsersCommands));
}
