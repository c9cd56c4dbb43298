use utoipa::OpenApi;

/// OpenAPI 文档聚合
#[derive(OpenApi)]
#[openapi(
    info(title = "vgo-users", description = "基于角色层级的用户账号管理接口"),
    paths(
        crate::auth::login,
        crate::auth::logout,
        crate::modules::users::controller::index,
        crate::modules::users::controller::list,
        crate::modules::users::controller::show_selection,
        crate::modules::users::controller::show,
        crate::modules::users::controller::new_user,
        crate::modules::users::controller::create,
        crate::modules::users::controller::edit,
        crate::modules::users::controller::update,
        crate::modules::users::controller::destroy,
        crate::modules::users::controller::keys,
        crate::modules::users::controller::auto_complete_for_user_name,
        crate::modules::users::controller::set_anonymized_view,
        crate::modules::users::controller::health,
    ),
    components(
        schemas(
            crate::auth::LoginRequest,
            crate::auth::LoginResponse,
            crate::HealthStatus,
            crate::service::Flash,
            crate::service::pagination::PageMeta,
            crate::model::Role,
            crate::model::FieldError,
            crate::model::ResponseMap,
        )
    ),
    tags(
        (name = "Auth", description = "登录与登出"),
        (name = "Users", description = "用户账号管理"),
        (name = "Health", description = "健康检查")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_user_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        for path in ["/users", "/users/list", "/users/{id}", "/auth/login", "/health"] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
    }
}
