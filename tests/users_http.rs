use std::sync::Arc;

use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use sa_token_plugin_actix_web::{SaTokenMiddleware, SaTokenState};
use serde_json::Value;

use vgo_users::auth::{configure_auth_routes, LoginRequest, LoginResponse};
use vgo_users::comm::config_validator::{AuthSettings, BootstrapSettings};
use vgo_users::conf::init_sa_token;
use vgo_users::mail::MemoryMailer;
use vgo_users::model::role::STUDENT;
use vgo_users::model::User;
use vgo_users::modules::users::responder::{decode_flash, FLASH_COOKIE};
use vgo_users::modules::users::routes::{configure_health_routes, configure_users_routes};
use vgo_users::repo::{MemoryStore, Repository, RoleRepository, UserRepository};
use vgo_users::service::{Flash, ServiceSettings, Stores, UserService};

struct Fixture {
    store: Arc<MemoryStore>,
    mailer: Arc<MemoryMailer>,
    service: web::Data<UserService>,
    state: web::Data<SaTokenState>,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::with_default_roles());
    let mailer = Arc::new(MemoryMailer::new());
    let service = UserService::new(
        Stores::memory(store.clone()),
        mailer.clone(),
        ServiceSettings::default(),
    );
    service
        .ensure_admin(&BootstrapSettings {
            admin_name: "admin".into(),
            admin_email: "admin@example.edu".into(),
            admin_password: "admin-pass".into(),
        })
        .await
        .unwrap();
    let manager = init_sa_token(&AuthSettings::default(), None).await.unwrap();
    Fixture {
        store,
        mailer,
        service: web::Data::new(service),
        state: web::Data::new(SaTokenState { manager }),
    }
}

impl Fixture {
    async fn add_student(&self, name: &str) -> User {
        let role = RoleRepository::find_by_name(&*self.store, STUDENT)
            .await
            .unwrap()
            .unwrap();
        let user = User {
            name: name.to_string(),
            email: format!("{}@example.edu", name),
            role_id: Some(role.id),
            ..Default::default()
        };
        self.store.create(&user).await.unwrap()
    }
}

macro_rules! app {
    ($fx:expr) => {
        test::init_service(
            App::new()
                .app_data($fx.state.clone())
                .app_data($fx.service.clone())
                .wrap(SaTokenMiddleware::new($fx.state.get_ref().clone()))
                .configure(configure_auth_routes)
                .configure(configure_health_routes)
                .configure(configure_users_routes),
        )
        .await
    };
}

/// 登录并返回令牌 / Log in and return the token
macro_rules! login {
    ($app:expr, $name:expr, $password:expr) => {{
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(LoginRequest {
                name: $name.to_string(),
                password: $password.to_string(),
            })
            .to_request();
        let login: LoginResponse = test::call_and_read_body_json(&$app, req).await;
        login.token
    }};
}

fn token_header() -> String {
    AuthSettings::default().token_name
}

fn flash_of(resp: &ServiceResponse) -> Flash {
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == FLASH_COOKIE)
        .expect("flash cookie");
    decode_flash(cookie.value()).expect("decodable flash")
}

fn location(resp: &ServiceResponse) -> &str {
    resp.headers().get(header::LOCATION).unwrap().to_str().unwrap()
}

/// 从 Link 头取出指定 rel 的地址
fn link_target(link: &str, rel: &str) -> Option<String> {
    link.split(", ")
        .find(|part| part.ends_with(&format!("rel=\"{}\"", rel)))
        .and_then(|part| {
            let start = part.find('<')? + 1;
            let end = part.find('>')?;
            Some(part[start..end].to_string())
        })
}

#[actix_web::test]
async fn health_reports_memory_store() {
    let fx = fixture().await;
    let app = app!(fx);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["component"], "memory_store");
    assert_eq!(body["healthy"], true);
}

#[actix_web::test]
async fn get_on_destroy_redirects_to_list() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/users/3/destroy").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/users/list");
}

#[actix_web::test]
async fn users_require_login() {
    let fx = fixture().await;
    let app = app!(fx);

    let req = test::TestRequest::get().uri("/users/list").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn logged_in_admin_lists_and_gets_flash_cookie() {
    let fx = fixture().await;
    let app = app!(fx);
    let token = login!(app, "admin", "admin-pass");

    let req = test::TestRequest::get()
        .uri("/users/list?records_per_page=1")
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(header::LINK));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["view"], "list");
    assert_eq!(body["data"]["users"][0]["name"], "admin");
    assert!(body["data"]["users"][0].get("crypted_password").is_none());

    let req = test::TestRequest::get()
        .uri("/users/show_selection?user%5Bname%5D=ghost")
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(flash_of(&resp).note.as_deref(), Some("ghost does not exist."));
}

#[actix_web::test]
async fn next_link_keeps_the_page_size() {
    let fx = fixture().await;
    for i in 0..130 {
        fx.add_student(&format!("u{:03}", i)).await;
    }
    let app = app!(fx);
    let token = login!(app, "admin", "admin-pass");

    let req = test::TestRequest::get()
        .uri("/users/list?records_per_page=2")
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let link = resp.headers().get(header::LINK).unwrap().to_str().unwrap().to_string();
    let next = link_target(&link, "next").unwrap();
    assert_eq!(next, "/users/list?page=2&records_per_page=2");

    let req = test::TestRequest::get()
        .uri(&next)
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let users = body["data"]["users"].as_array().unwrap();
    // admin 占第一行，第二页从第 51 行开始
    assert_eq!(users.len(), 50);
    assert_eq!(users[0]["name"], "u049");
    assert_eq!(body["data"]["page"]["records_per_page"], "2");
}

#[actix_web::test]
async fn create_with_taken_name_registers_the_email() {
    let fx = fixture().await;
    let app = app!(fx);
    let token = login!(app, "admin", "admin-pass");

    let req = test::TestRequest::post()
        .uri("/users")
        .insert_header((token_header().as_str(), token.as_str()))
        .set_form([
            ("user[name]", "admin"),
            ("user[email]", "second@example.edu"),
            ("user[role_id]", "1"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/users/list");
    let flash = flash_of(&resp);
    assert_eq!(
        flash.success.as_deref(),
        Some("The user \"second@example.edu\" has been successfully created.")
    );
    assert_eq!(
        flash.note.as_deref(),
        Some("A new password has been sent to new user's e-mail address.")
    );

    let created = UserRepository::find_by_name(&*fx.store, "second@example.edu").await.unwrap();
    assert!(created.is_some());
    let sent = fx.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "second@example.edu");
}

#[actix_web::test]
async fn update_through_hidden_path_renames_the_user() {
    let fx = fixture().await;
    let target = fx.add_student("leaver").await;
    let app = app!(fx);
    let token = login!(app, "admin", "admin-pass");

    let uri = format!("/users/{}?name={}", target.id, target.id);
    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header((token_header().as_str(), token.as_str()))
        .set_form([("user[fullname]", "Former Student")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), format!("/users/{}", target.id));
    assert_eq!(
        flash_of(&resp).success.as_deref(),
        Some("The user \"leaver_hidden\" has been successfully updated.")
    );

    let stored = fx.store.read_one(target.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "leaver_hidden");
    assert_eq!(stored.fullname.as_deref(), Some("Former Student"));

    // 其它查询串不触发改名
    let req = test::TestRequest::put()
        .uri(&format!("/users/{}?name=other", target.id))
        .insert_header((token_header().as_str(), token.as_str()))
        .set_form([("user[fullname]", "Again")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let stored = fx.store.read_one(target.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "leaver_hidden");
}

#[actix_web::test]
async fn destroy_reports_through_the_flash() {
    let fx = fixture().await;
    let target = fx.add_student("gone").await;
    let app = app!(fx);
    let token = login!(app, "admin", "admin-pass");

    let req = test::TestRequest::post()
        .uri(&format!("/users/{}/destroy", target.id))
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/users/list");
    assert_eq!(
        flash_of(&resp).note.as_deref(),
        Some("The user \"gone\" has been successfully deleted.")
    );
    assert!(fx.store.read_one(target.id).await.unwrap().is_none());

    let req = test::TestRequest::delete()
        .uri("/users/999")
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/users/list");
    assert_eq!(
        flash_of(&resp).error.as_deref(),
        Some("Couldn't find User with 'id'=999")
    );
}

#[actix_web::test]
async fn student_keys_by_path_and_by_empty_query() {
    let fx = fixture().await;
    let app = app!(fx);
    let admin_token = login!(app, "admin", "admin-pass");

    // 管理员创建学生，密码从发件箱取得
    let req = test::TestRequest::post()
        .uri("/users")
        .insert_header((token_header().as_str(), admin_token.as_str()))
        .set_form([
            ("user[name]", "kim"),
            ("user[email]", "kim@example.edu"),
            ("user[role_id]", "1"),
        ])
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FOUND);
    let password = fx.mailer.sent()[0].password.clone().unwrap();
    let kim = UserRepository::find_by_name(&*fx.store, "kim").await.unwrap().unwrap();
    let token = login!(app, "kim", password);

    let req = test::TestRequest::get()
        .uri("/users/keys?id=")
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/student_task/list");

    let req = test::TestRequest::get()
        .uri("/users/keys?id=abc")
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(location(&resp), "/student_task/list");

    let req = test::TestRequest::get()
        .uri(&format!("/users/{}/keys", kim.id))
        .insert_header((token_header().as_str(), token.as_str()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["view"], "keys");
    assert!(!body["data"]["private_key"].as_str().unwrap().is_empty());
    let stored = fx.store.read_one(kim.id).await.unwrap().unwrap();
    assert!(stored.public_key.is_some());
}
