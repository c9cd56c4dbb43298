//! 认证相关代码：登录签发 sa-token，登出踢下线
//! Authentication: login issues a sa-token, logout kicks the login out

use actix_web::{web, HttpResponse};
use sa_token_plugin_actix_web::{LoginIdExtractor, SaTokenState, StpUtil};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};
use crate::route_registry::{register_global_route, RouteInfo};
use crate::service::UserService;

// ==================== 请求/响应类型 ====================
// ==================== Request/Response Types ====================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub name: String,
    pub role: String,
}

// ==================== 登录接口 ====================
// ==================== Login Endpoint ====================

/// 用户名密码登录 / Log in with name and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = LoginResponse),
        (status = 401, description = "用户名或密码错误")
    )
)]
pub async fn login(
    state: web::Data<SaTokenState>,
    service: web::Data<UserService>,
    req: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    if req.name.is_empty() || req.password.is_empty() {
        return Err(AppError::auth("Invalid username or password"));
    }
    let user = service.authenticate(&req.name, &req.password).await?;
    let session = service.session(&user.id.to_string(), "").await?;

    let token = state
        .manager
        .login(user.id.to_string().as_str())
        .await
        .map_err(|e| {
            AppError::external_service("sa-token", format!("登录失败 / Login failed: {}", e))
        })?;

    info!(user_id = user.id, role = %session.role.name, "✅ 用户登录成功 / user logged in");

    Ok(HttpResponse::Ok().json(LoginResponse {
        token: token.to_string(),
        user_id: user.id,
        name: user.name,
        role: session.role.name,
    }))
}

/// 登出当前用户 / Log the current user out
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 204, description = "已登出"))
)]
pub async fn logout(login_id: LoginIdExtractor) -> AppResult<HttpResponse> {
    StpUtil::kick_out(&login_id.0)
        .await
        .map_err(|e| AppError::external_service("sa-token", e.to_string()))?;
    info!(login_id = %login_id.0, "用户登出 / user logged out");
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/auth/login").route(web::post().to(login)))
        .service(web::resource("/auth/logout").route(web::post().to(logout)));
}

/// 注册认证路由
pub fn register_auth_routes() {
    register_global_route(RouteInfo {
        name: "auth".to_string(),
        description: "登录与登出 / login and logout".to_string(),
        module: "auth".to_string(),
        config_fn: configure_auth_routes,
    });
}
