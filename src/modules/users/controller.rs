//! 用户管理接口 / User management endpoints
//!
//! 每个处理函数先由 sa-token 登录 id 解析会话，再交给 `UserService`，
//! 最后由 `responder::respond` 生成响应。

use actix_web::http::header::{self, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use sa_token_plugin_actix_web::LoginIdExtractor;
use serde::Deserialize;

use crate::error::AppResult;
use crate::model::UserParams;
use crate::modules::users::responder::{client_ip, referer, respond};
use crate::service::user_service::{ListQuery, LIST_PATH};
use crate::service::{Outcome, Session, UserService, View};
use crate::HealthStatus;

/// `user[name]` 查询参数
#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    #[serde(rename = "user[name]", default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RoleQuery {
    pub role: Option<String>,
}

/// `?id=` 原样按字符串接收，空值或非数字视为缺失
#[derive(Debug, Default, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

impl IdQuery {
    pub fn id(&self) -> Option<i64> {
        self.id.as_deref().and_then(|raw| raw.trim().parse().ok())
    }
}

async fn current_session(
    req: &HttpRequest,
    login_id: &LoginIdExtractor,
    service: &UserService,
) -> AppResult<Session> {
    service.session(&login_id.0, &client_ip(req)).await
}

#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    params(ListQuery),
    responses(
        (status = 200, description = "用户列表"),
        (status = 302, description = "学生或无权限时重定向"),
        (status = 401, description = "未登录")
    )
)]
pub async fn index(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.index(&session, &query).await?)
}

#[utoipa::path(
    get,
    path = "/users/list",
    tag = "Users",
    params(ListQuery),
    responses(
        (status = 200, description = "用户列表与分页信息"),
        (status = 302, description = "无权限时重定向")
    )
)]
pub async fn list(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    let outcome = service.list(&session, &query).await?;
    let link = match outcome.view() {
        Some(View::List(view)) => HeaderValue::from_str(&view.page.link).ok(),
        _ => None,
    };
    let mut resp = respond(&req, outcome)?;
    if let Some(link) = link {
        resp.headers_mut().insert(header::LINK, link);
    }
    Ok(resp)
}

#[utoipa::path(
    get,
    path = "/users/show_selection",
    tag = "Users",
    params(("user[name]" = Option<String>, Query, description = "用户名")),
    responses(
        (status = 200, description = "用户详情"),
        (status = 302, description = "不存在或不可见时回到列表")
    )
)]
pub async fn show_selection(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    query: web::Query<NameQuery>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    let name = query.name.as_deref().unwrap_or_default().trim();
    respond(&req, service.show_selection(&session, name).await?)
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "用户 id")),
    responses(
        (status = 200, description = "用户详情"),
        (status = 302, description = "学生访问他人记录时回首页"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn show(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.show(&session, Some(path.into_inner())).await?)
}

#[utoipa::path(
    get,
    path = "/users/new",
    tag = "Users",
    params(("role" = Option<String>, Query, description = "预选角色名")),
    responses((status = 200, description = "新建表单"))
)]
pub async fn new_user(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    query: web::Query<RoleQuery>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.new_user(&session, query.role.as_deref()).await?)
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    request_body(content_type = "application/x-www-form-urlencoded", description = "user[...] 表单字段"),
    responses(
        (status = 302, description = "创建成功，回到列表"),
        (status = 200, description = "校验失败，重新渲染表单"),
        (status = 502, description = "邮件发送失败")
    )
)]
pub async fn create(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    form: web::Form<UserParams>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.create(&session, form.into_inner()).await?)
}

#[utoipa::path(
    get,
    path = "/users/{id}/edit",
    tag = "Users",
    params(("id" = i64, Path, description = "用户 id")),
    responses(
        (status = 200, description = "编辑表单"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn edit(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.edit(&session, path.into_inner()).await?)
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "用户 id")),
    request_body(content_type = "application/x-www-form-urlencoded", description = "user[...] 表单字段"),
    responses(
        (status = 302, description = "更新成功，跳转详情"),
        (status = 200, description = "校验失败，重新渲染表单"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn update(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    path: web::Path<i64>,
    form: web::Form<UserParams>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    let full_path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.path());
    let outcome = service
        .update(&session, path.into_inner(), full_path, form.into_inner())
        .await?;
    respond(&req, outcome)
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "用户 id")),
    responses((status = 302, description = "回到列表，结果见闪存"))
)]
pub async fn destroy(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.destroy(&session, path.into_inner()).await?)
}

/// GET 请求只允许 POST 的动作时回到列表
pub async fn redirect_to_list(req: HttpRequest) -> AppResult<HttpResponse> {
    respond(&req, Outcome::redirect(LIST_PATH))
}

#[utoipa::path(
    get,
    path = "/users/{id}/keys",
    tag = "Users",
    params(("id" = i64, Path, description = "用户 id")),
    responses(
        (status = 200, description = "新密钥对，私钥只返回一次"),
        (status = 302, description = "非学生或访问他人记录")
    )
)]
pub async fn keys(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.keys(&session, Some(path.into_inner())).await?)
}

/// `/users/keys?id=` 形式，缺少 id 时回首页
pub async fn keys_by_query(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    query: web::Query<IdQuery>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    respond(&req, service.keys(&session, query.id()).await?)
}

#[utoipa::path(
    get,
    path = "/users/auto_complete_for_user_name",
    tag = "Users",
    params(("user[name]" = Option<String>, Query, description = "用户名前缀")),
    responses((status = 200, description = "HTML 片段 <ul><li>..</li></ul>", content_type = "text/html"))
)]
pub async fn auto_complete_for_user_name(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
    query: web::Query<NameQuery>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    let prefix = query.name.as_deref().unwrap_or_default();
    respond(&req, service.auto_complete_for_user_name(&session, prefix).await?)
}

#[utoipa::path(
    post,
    path = "/users/set_anonymized_view",
    tag = "Users",
    responses((status = 302, description = "切换匿名视图后返回来源页"))
)]
pub async fn set_anonymized_view(
    req: HttpRequest,
    login_id: LoginIdExtractor,
    service: web::Data<UserService>,
) -> AppResult<HttpResponse> {
    let session = current_session(&req, &login_id, &service).await?;
    let back = referer(&req);
    respond(&req, service.set_anonymized_view(&session, back.as_deref()).await?)
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "存储可用", body = HealthStatus),
        (status = 503, description = "存储不可用", body = HealthStatus)
    )
)]
pub async fn health(service: web::Data<UserService>) -> HttpResponse {
    let status = service.health().await;
    if status.healthy {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}
