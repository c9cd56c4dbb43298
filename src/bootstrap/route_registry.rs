use actix_web::web;
use lazy_static::lazy_static;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// 路由配置函数类型
pub type RouteConfigFn = fn(&mut web::ServiceConfig);

/// 路由信息结构
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub name: String,
    pub description: String,
    pub module: String,
    pub config_fn: RouteConfigFn,
}

/// 全局路由注册器
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: HashMap<String, RouteInfo>,
}

impl RouteRegistry {
    /// 创建新的路由注册器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册路由；同名注册会覆盖旧的
    pub fn register_route(&mut self, route_info: RouteInfo) {
        self.routes.insert(route_info.name.clone(), route_info);
    }

    /// 获取指定模块的路由
    pub fn get_routes_by_module(&self, module: &str) -> Vec<&RouteInfo> {
        self.routes
            .values()
            .filter(|route| route.module == module)
            .collect()
    }

    /// 配置所有路由到 ServiceConfig（按名称排序，保证注册顺序稳定）
    pub fn configure_all_routes(&self, cfg: &mut web::ServiceConfig) {
        let mut routes: Vec<&RouteInfo> = self.routes.values().collect();
        routes.sort_by(|a, b| a.name.cmp(&b.name));
        for route_info in routes {
            (route_info.config_fn)(cfg);
        }
    }

    /// 获取路由统计信息
    pub fn get_stats(&self) -> (usize, Vec<String>) {
        let modules: BTreeSet<String> = self.routes.values().map(|r| r.module.clone()).collect();
        (self.routes.len(), modules.into_iter().collect())
    }

    /// 打印路由信息
    pub fn print_routes_info(&self) {
        let (total, modules) = self.get_stats();
        for module in modules {
            let module_routes = self.get_routes_by_module(&module);
            info!("模块: {} ({} 个路由)", module, module_routes.len());
            for route in module_routes {
                info!("  - {}: {}", route.name, route.description);
            }
        }
        info!("总计: {} 个路由", total);
    }
}

// 全局路由注册器实例
lazy_static! {
    static ref GLOBAL_ROUTE_REGISTRY: RwLock<RouteRegistry> = RwLock::new(RouteRegistry::new());
}

/// 获取全局路由注册器的读锁
pub fn get_global_route_registry() -> RwLockReadGuard<'static, RouteRegistry> {
    GLOBAL_ROUTE_REGISTRY.read()
}

/// 获取全局路由注册器的写锁
pub fn get_global_route_registry_mut() -> RwLockWriteGuard<'static, RouteRegistry> {
    GLOBAL_ROUTE_REGISTRY.write()
}

/// 注册路由到全局注册器
pub fn register_global_route(route_info: RouteInfo) {
    get_global_route_registry_mut().register_route(route_info);
}

/// 配置所有全局路由
pub fn configure_global_routes(cfg: &mut web::ServiceConfig) {
    get_global_route_registry().configure_all_routes(cfg);
}

/// 打印全局路由信息
pub fn print_global_routes_info() {
    get_global_route_registry().print_routes_info();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_cfg: &mut web::ServiceConfig) {}

    #[test]
    fn stats_group_by_module() {
        let mut registry = RouteRegistry::new();
        for (name, module) in [("users", "users"), ("health", "users"), ("auth", "auth")] {
            registry.register_route(RouteInfo {
                name: name.to_string(),
                description: String::new(),
                module: module.to_string(),
                config_fn: noop,
            });
        }
        let (total, modules) = registry.get_stats();
        assert_eq!(total, 3);
        assert_eq!(modules, vec!["auth".to_string(), "users".to_string()]);
        assert_eq!(registry.get_routes_by_module("users").len(), 2);
    }
}
