//! 用户管理服务：授权检查、业务规则和闪存消息
//! User management service: authorization gate, business rules and flash

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use utoipa::IntoParams;

use crate::comm::config_validator::{AppConfiguration, BootstrapSettings};
use crate::db::error::{describe_error, DbError};
use crate::error::{AppError, AppResult};
use crate::mail::{MailMessage, Mailer};
use crate::model::role::{ADMINISTRATOR, INSTRUCTOR, NO_ROLE, SUPER_ADMINISTRATOR};
use crate::model::{AssignmentQuestionnaire, FieldError, Role, User, UserParams};
use crate::repo::{KvStore, ParticipationRepository, RoleRepository, UserRepository};
use crate::security::{generate_key_pair, generate_password, hash_password, verify_password};
use crate::service::outcome::{FormView, KeysView, ListView, Outcome, ShowView, View};
use crate::service::pagination::{page_number, PageMeta};
use crate::service::session::{Action, Session};
use crate::service::Stores;
use crate::{HealthCheck, HealthStatus};

pub const LIST_PATH: &str = "/users/list";

/// 列表查询参数 / Listing query
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// 每页条数代码：1→25，2→50，3→100，4→全部
    pub records_per_page: Option<String>,
    /// 页码，默认 1
    pub page: Option<String>,
}

/// 服务运行参数 / Service settings
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub mail_sender: String,
    pub password_length: usize,
    pub anonymized_view_key: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        AppConfiguration::default().into()
    }
}

impl From<AppConfiguration> for ServiceSettings {
    fn from(cfg: AppConfiguration) -> Self {
        Self {
            mail_sender: cfg.mail.sender,
            password_length: cfg.users.password_length,
            anonymized_view_key: cfg.users.anonymized_view_key,
        }
    }
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    participation: Arc<dyn ParticipationRepository>,
    kv: Arc<dyn KvStore>,
    health: Arc<dyn HealthCheck>,
    mailer: Arc<dyn Mailer>,
    settings: ServiceSettings,
}

/// 匿名视图：用角色名和 id 替换身份信息
/// Anonymized view replaces identifying fields with role name and id
pub fn anonymize(user: &mut User, role_name: &str) {
    user.name = format!("{} {}", role_name, user.id);
    user.fullname = Some(format!("{}, {}", role_name, user.id));
    user.email = format!("{}_{}@mailinator.com", role_name, user.id);
}

pub fn html_escape(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn user_path(id: i64) -> String {
    format!("/users/{}", id)
}

impl UserService {
    pub fn new(stores: Stores, mailer: Arc<dyn Mailer>, settings: ServiceSettings) -> Self {
        Self {
            users: stores.users,
            roles: stores.roles,
            participation: stores.participation,
            kv: stores.kv,
            health: stores.health,
            mailer,
            settings,
        }
    }

    pub async fn health(&self) -> HealthStatus {
        self.health.check_health().await
    }

    // ---------- 会话 / sessions ----------

    /// 用户名密码登录校验 / Verify a name and password
    pub async fn authenticate(&self, name: &str, password: &str) -> AppResult<User> {
        let invalid = || AppError::auth("Invalid username or password");
        let user = self.users.find_by_name(name).await?.ok_or_else(invalid)?;
        match verify_password(password, &user.crypted_password) {
            Ok(true) => Ok(user),
            Ok(false) => Err(invalid()),
            Err(e) => {
                warn!(user = %user.name, "stored password hash unusable: {}", e);
                Err(invalid())
            }
        }
    }

    /// 由登录 id 解析会话 / Resolve the session from a login id
    pub async fn session(&self, login_id: &str, remote_ip: &str) -> AppResult<Session> {
        let id: i64 = login_id
            .parse()
            .map_err(|_| AppError::auth(format!("unknown login id {}", login_id)))?;
        let user = self
            .users
            .read_one(id)
            .await?
            .ok_or_else(|| AppError::auth(format!("unknown login id {}", login_id)))?;
        let role = self.role_of(&user).await?;
        Ok(Session {
            user,
            role,
            remote_ip: remote_ip.to_string(),
        })
    }

    /// 内存后端启动时创建超级管理员（已存在则跳过）
    pub async fn ensure_admin(&self, bootstrap: &BootstrapSettings) -> AppResult<Option<User>> {
        if self.users.find_by_name(&bootstrap.admin_name).await?.is_some() {
            return Ok(None);
        }
        let role = self
            .roles
            .find_by_name(SUPER_ADMINISTRATOR)
            .await?
            .ok_or_else(|| AppError::not_found(format!("role {}", SUPER_ADMINISTRATOR)))?;
        let hashed = hash_password(&bootstrap.admin_password)
            .map_err(|e| AppError::Internal(anyhow!(e)))?;
        let admin = User {
            name: bootstrap.admin_name.clone(),
            email: bootstrap.admin_email.clone(),
            role_id: Some(role.id),
            crypted_password: hashed.hash,
            password_salt: hashed.salt,
            is_new_user: false,
            ..Default::default()
        };
        let admin = self.users.create(&admin).await?;
        info!(id = admin.id, name = %admin.name, "bootstrap administrator created");
        Ok(Some(admin))
    }

    // ---------- 辅助 / helpers ----------

    async fn role_of(&self, user: &User) -> AppResult<Role> {
        match user.role_id {
            Some(id) => Ok(self.roles.find(id).await?.unwrap_or_else(Role::none)),
            None => Ok(Role::none()),
        }
    }

    async fn find_user(&self, id: i64) -> AppResult<User> {
        self.users
            .read_one(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id).into())
    }

    /// 当前角色及其可分配的角色 / The current role plus its available roles
    async fn all_roles(&self, session: &Session) -> AppResult<Vec<Role>> {
        let roles = self.roles.all().await?;
        let mut ids = session.role.available_role_ids(&roles);
        ids.push(session.role.id);
        let mut all: Vec<Role> = roles.into_iter().filter(|r| ids.contains(&r.id)).collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }

    async fn anonymized_for(&self, session: &Session) -> AppResult<bool> {
        Ok(self
            .kv
            .is_member(&self.settings.anonymized_view_key, &session.remote_ip)
            .await?)
    }

    async fn name_taken(&self, name: &str, except: i64) -> AppResult<bool> {
        Ok(self
            .users
            .find_by_name(name)
            .await?
            .is_some_and(|u| u.id != except))
    }

    async fn show_view(&self, session: &Session, mut user: User, role: Role) -> AppResult<Outcome> {
        let assignment_participant_num = self.participation.count_participants(user.id).await?;
        let maps = self.participation.response_maps_for(user.id).await?;
        let total_user_num = self.users.count().await?;
        if self.anonymized_for(session).await? {
            anonymize(&mut user, &role.name);
        }
        Ok(Outcome::render(View::Show(Box::new(ShowView {
            user,
            role,
            assignment_participant_num,
            maps,
            total_user_num,
        }))))
    }

    fn home(session: &Session) -> Outcome {
        Outcome::redirect(session.home_path())
    }

    // ---------- 动作 / actions ----------

    #[instrument(skip(self, session, query), fields(actor = session.user.id))]
    pub async fn index(&self, session: &Session, query: &ListQuery) -> AppResult<Outcome> {
        // 学生在这里就被重定向回首页
        if let Some(denied) = session.deny(Action::Index) {
            return Ok(denied);
        }
        self.list_users(session, query).await
    }

    #[instrument(skip(self, session, query), fields(actor = session.user.id))]
    pub async fn list(&self, session: &Session, query: &ListQuery) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::List) {
            return Ok(denied);
        }
        self.list_users(session, query).await
    }

    async fn list_users(&self, session: &Session, query: &ListQuery) -> AppResult<Outcome> {
        let total = self.users.count().await?;
        let page = page_number(query.page.as_deref());
        let meta = PageMeta::new(LIST_PATH, page, query.records_per_page.as_deref(), total);
        let mut users = self.users.page(meta.per_page, meta.offset()).await?;

        if self.anonymized_for(session).await? {
            let role_names: HashMap<i64, String> = self
                .roles
                .all()
                .await?
                .into_iter()
                .map(|r| (r.id, r.name))
                .collect();
            for user in &mut users {
                let role_name = user
                    .role_id
                    .and_then(|id| role_names.get(&id).cloned())
                    .unwrap_or_else(|| NO_ROLE.to_string());
                anonymize(user, &role_name);
            }
        }

        Ok(Outcome::render(View::List(ListView { users, page: meta })))
    }

    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn show_selection(&self, session: &Session, name: &str) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::ShowSelection) {
            return Ok(denied);
        }
        let Some(user) = self.users.find_by_name(name).await? else {
            return Ok(Outcome::redirect(LIST_PATH).with_note(format!("{} does not exist.", name)));
        };
        let role = self.role_of(&user).await?;
        if session.can_view(&user, &role) {
            self.show_view(session, user, role).await
        } else {
            Ok(Outcome::redirect(LIST_PATH)
                .with_note("The specified user is not available for editing."))
        }
    }

    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn show(&self, session: &Session, id: Option<i64>) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::Show) {
            return Ok(denied);
        }
        // 学生已被授权检查拦下，这里实际只处理缺失的 id
        let Some(id) = id.filter(|_| !session.must_go_home(id)) else {
            return Ok(Self::home(session));
        };
        let user = self.find_user(id).await?;
        let role = self.role_of(&user).await?;
        self.show_view(session, user, role).await
    }

    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn new_user(&self, session: &Session, role_name: Option<&str>) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::New) {
            return Ok(denied);
        }
        let role = match role_name {
            Some(name) => self.roles.find_by_name(name).await?,
            None => None,
        };
        Ok(Outcome::render(View::New(FormView {
            user: User::default(),
            role,
            all_roles: self.all_roles(session).await?,
            errors: Vec::new(),
        })))
    }

    #[instrument(skip(self, session, params), fields(actor = session.user.id))]
    pub async fn create(&self, session: &Session, mut params: UserParams) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::Create) {
            return Ok(denied);
        }

        // 用户名已存在时改用邮箱注册
        if let Some(name) = params.name.as_deref() {
            if self.users.find_by_name(name.trim()).await?.is_some() {
                params.name = params.email.clone();
            }
        }

        let mut user = User::default();
        let mut errors = params.apply_to(&mut user);
        user.parent_id = Some(session.user.id);
        user.timezonepref = session.user.timezonepref.clone();
        errors.extend(user.validate());
        if !user.name.trim().is_empty() && self.name_taken(&user.name, 0).await? {
            errors.push(FieldError::new("name", "has already been taken"));
        }
        if !errors.is_empty() {
            return self.render_new(session, user, errors).await;
        }

        let password = generate_password(self.settings.password_length);
        let hashed = hash_password(&password).map_err(|e| AppError::Internal(anyhow!(e)))?;
        user.crypted_password = hashed.hash;
        user.password_salt = hashed.salt;

        let user = match self.users.create(&user).await {
            Ok(user) => user,
            Err(DbError::Conflict(_)) => {
                let errors = vec![FieldError::new("name", "has already been taken")];
                return self.render_new(session, user, errors).await;
            }
            Err(e) => return Err(e.into()),
        };

        self.mailer
            .deliver(MailMessage::welcome(
                &self.settings.mail_sender,
                &user.email,
                &user.name,
                &password,
            ))
            .await
            .map_err(|e| AppError::external_service("mail", e.to_string()))?;

        let role = self.role_of(&user).await?;
        if role.name == INSTRUCTOR || role.name == ADMINISTRATOR {
            self.participation
                .create_questionnaire(&AssignmentQuestionnaire::default_for(user.id))
                .await?;
        }

        info!(id = user.id, name = %user.name, role = %role.name, "user created");
        Ok(Outcome::redirect(LIST_PATH)
            .with_note("A new password has been sent to new user's e-mail address.")
            .with_success(format!(
                "The user \"{}\" has been successfully created.",
                user.name
            )))
    }

    async fn render_new(
        &self,
        session: &Session,
        user: User,
        errors: Vec<FieldError>,
    ) -> AppResult<Outcome> {
        Ok(Outcome::render(View::New(FormView {
            user,
            role: None,
            all_roles: self.all_roles(session).await?,
            errors,
        })))
    }

    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn edit(&self, session: &Session, id: i64) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::Edit) {
            return Ok(denied);
        }
        let user = self.find_user(id).await?;
        self.render_edit(session, user, Vec::new()).await
    }

    async fn render_edit(
        &self,
        session: &Session,
        user: User,
        errors: Vec<FieldError>,
    ) -> AppResult<Outcome> {
        let role = self.role_of(&user).await?;
        Ok(Outcome::render(View::Edit(FormView {
            user,
            role: Some(role),
            all_roles: self.all_roles(session).await?,
            errors,
        })))
    }

    /// `full_path` 为请求的原始路径（含查询串）
    /// `full_path` is the request path including its query string
    #[instrument(skip(self, session, params), fields(actor = session.user.id))]
    pub async fn update(
        &self,
        session: &Session,
        id: i64,
        full_path: &str,
        params: UserParams,
    ) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::Update) {
            return Ok(denied);
        }
        let mut user = self.find_user(id).await?;

        // 无法删除的用户在 show 页面通过 /users/<id>?name=<id> 隐藏改名
        if full_path == format!("/users/{}?name={}", user.id, user.id) {
            user.name.push_str("_hidden");
        }

        let mut errors = params.apply_to(&mut user);
        errors.extend(user.validate());
        if !user.name.trim().is_empty() && self.name_taken(&user.name, user.id).await? {
            errors.push(FieldError::new("name", "has already been taken"));
        }
        if !errors.is_empty() {
            return self.render_edit(session, user, errors).await;
        }

        match self.users.update(&user).await {
            Ok(0) => return Err(DbError::not_found("User", id).into()),
            Ok(_) => {}
            Err(DbError::Conflict(_)) => {
                let errors = vec![FieldError::new("name", "has already been taken")];
                return self.render_edit(session, user, errors).await;
            }
            Err(e) => return Err(e.into()),
        }

        info!(id = user.id, name = %user.name, "user updated");
        Ok(Outcome::redirect(user_path(user.id)).with_success(format!(
            "The user \"{}\" has been successfully updated.",
            user.name
        )))
    }

    /// 失败不会返回错误，而是放进闪存 / Failures end up in the flash, never as errors
    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn destroy(&self, session: &Session, id: i64) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::Destroy) {
            return Ok(denied);
        }
        let removed = async {
            let user = self
                .users
                .read_one(id)
                .await?
                .ok_or_else(|| DbError::not_found("User", id))?;
            let report = self.users.delete_with_dependents(id).await?;
            info!(id, ?report, "user deleted");
            Ok::<User, DbError>(user)
        }
        .await;

        let outcome = Outcome::redirect(LIST_PATH);
        Ok(match removed {
            Ok(user) => outcome.with_note(format!(
                "The user \"{}\" has been successfully deleted.",
                user.name
            )),
            Err(e) => {
                warn!(id, "user delete failed: {}", describe_error(&e));
                outcome.with_error(e.to_string())
            }
        })
    }

    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn keys(&self, session: &Session, id: Option<i64>) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::Keys) {
            return Ok(denied);
        }
        let Some(id) = id.filter(|_| !session.must_go_home(id)) else {
            return Ok(Self::home(session));
        };
        let mut user = self.find_user(id).await?;
        let pair = generate_key_pair().map_err(|e| AppError::Internal(anyhow!(e)))?;
        user.public_key = Some(pair.public_key);
        self.users.update(&user).await?;
        info!(id = user.id, "key pair generated");
        Ok(Outcome::render(View::Keys(KeysView {
            user,
            private_key: pair.private_key,
        })))
    }

    #[instrument(skip(self, session), fields(actor = session.user.id))]
    pub async fn auto_complete_for_user_name(
        &self,
        session: &Session,
        prefix: &str,
    ) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::AutoComplete) {
            return Ok(denied);
        }
        let roles = self.roles.all().await?;
        let available = session.role.available_role_ids(&roles);
        let users = self
            .users
            .search_by_name_prefix(prefix, &available, session.user.id)
            .await?;
        let items: String = users
            .iter()
            .map(|u| format!("<li>{}</li>", html_escape(&u.name)))
            .collect();
        Ok(Outcome::fragment(format!("<ul>{}</ul>", items)))
    }

    #[instrument(skip(self, session), fields(actor = session.user.id, ip = %session.remote_ip))]
    pub async fn set_anonymized_view(
        &self,
        session: &Session,
        referer: Option<&str>,
    ) -> AppResult<Outcome> {
        if let Some(denied) = session.deny(Action::SetAnonymizedView) {
            return Ok(denied);
        }
        let on = self
            .kv
            .toggle_member(&self.settings.anonymized_view_key, &session.remote_ip)
            .await?;
        info!(anonymized = on, "anonymized view toggled");
        let back = referer.filter(|r| !r.is_empty()).unwrap_or(LIST_PATH);
        Ok(Outcome::redirect(back))
    }
}
