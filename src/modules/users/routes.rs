use actix_web::web;

use crate::modules::users::controller::{
    auto_complete_for_user_name, create, destroy, edit, health, index, keys, keys_by_query, list,
    new_user, redirect_to_list, set_anonymized_view, show, show_selection, update,
};

/// 用户模块路由；固定路径必须注册在 `/users/{id}` 之前
pub fn configure_users_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/users")
            .route(web::get().to(index))
            .route(web::post().to(create)),
    )
    .service(web::resource("/users/list").route(web::get().to(list)))
    .service(web::resource("/users/new").route(web::get().to(new_user)))
    .service(web::resource("/users/show_selection").route(web::get().to(show_selection)))
    .service(
        web::resource("/users/auto_complete_for_user_name")
            .route(web::get().to(auto_complete_for_user_name)),
    )
    .service(
        web::resource("/users/set_anonymized_view").route(web::post().to(set_anonymized_view)),
    )
    .service(web::resource("/users/keys").route(web::get().to(keys_by_query)))
    .service(
        web::resource("/users/{id}")
            .route(web::get().to(show))
            .route(web::post().to(update))
            .route(web::put().to(update))
            .route(web::delete().to(destroy)),
    )
    .service(web::resource("/users/{id}/edit").route(web::get().to(edit)))
    .service(
        web::resource("/users/{id}/destroy")
            .route(web::post().to(destroy))
            .route(web::get().to(redirect_to_list)),
    )
    .service(web::resource("/users/{id}/keys").route(web::get().to(keys)));
}

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)));
}
