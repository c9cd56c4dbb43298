//! 用户模型与 sqlx 映射 / User model and sqlx mapping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 用户记录（对应 users 表） / User row (users table)
///
/// 敏感列（密码哈希、盐、持久化令牌）永远不会被序列化。
/// Sensitive columns are never serialized.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub fullname: Option<String>,
    pub email: String,
    pub role_id: Option<i64>,
    /// 创建该用户的用户 / the user who created this one
    pub parent_id: Option<i64>,
    pub institution_id: Option<i64>,
    #[serde(skip_serializing)]
    pub crypted_password: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub private_by_default: bool,
    pub mru_directory_path: Option<String>,
    pub email_on_review: bool,
    pub email_on_submission: bool,
    pub email_on_review_of_review: bool,
    pub is_new_user: bool,
    pub master_permission_granted: bool,
    pub handle: Option<String>,
    pub digital_certificate: Option<String>,
    #[serde(skip_serializing)]
    pub persistence_token: Option<String>,
    pub timezonepref: Option<String>,
    pub public_key: Option<String>,
    pub copy_of_emails: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: String::new(),
            fullname: None,
            email: String::new(),
            role_id: None,
            parent_id: None,
            institution_id: None,
            crypted_password: String::new(),
            password_salt: String::new(),
            private_by_default: false,
            mru_directory_path: None,
            email_on_review: false,
            email_on_submission: false,
            email_on_review_of_review: false,
            is_new_user: true,
            master_permission_granted: false,
            handle: None,
            digital_certificate: None,
            persistence_token: None,
            timezonepref: None,
            public_key: None,
            copy_of_emails: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 表单白名单参数 / Whitelisted `user[...]` form parameters
///
/// 只有这里列出的字段可以通过表单写入用户记录。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserParams {
    #[serde(rename = "user[name]")]
    pub name: Option<String>,
    #[serde(rename = "user[crypted_password]")]
    pub crypted_password: Option<String>,
    #[serde(rename = "user[role_id]")]
    pub role_id: Option<String>,
    #[serde(rename = "user[password_salt]")]
    pub password_salt: Option<String>,
    #[serde(rename = "user[fullname]")]
    pub fullname: Option<String>,
    #[serde(rename = "user[email]")]
    pub email: Option<String>,
    #[serde(rename = "user[parent_id]")]
    pub parent_id: Option<String>,
    #[serde(rename = "user[private_by_default]")]
    pub private_by_default: Option<String>,
    #[serde(rename = "user[mru_directory_path]")]
    pub mru_directory_path: Option<String>,
    #[serde(rename = "user[email_on_review]")]
    pub email_on_review: Option<String>,
    #[serde(rename = "user[email_on_submission]")]
    pub email_on_submission: Option<String>,
    #[serde(rename = "user[email_on_review_of_review]")]
    pub email_on_review_of_review: Option<String>,
    #[serde(rename = "user[is_new_user]")]
    pub is_new_user: Option<String>,
    #[serde(rename = "user[master_permission_granted]")]
    pub master_permission_granted: Option<String>,
    #[serde(rename = "user[handle]")]
    pub handle: Option<String>,
    #[serde(rename = "user[digital_certificate]")]
    pub digital_certificate: Option<String>,
    #[serde(rename = "user[persistence_token]")]
    pub persistence_token: Option<String>,
    #[serde(rename = "user[timezonepref]")]
    pub timezonepref: Option<String>,
    #[serde(rename = "user[public_key]")]
    pub public_key: Option<String>,
    #[serde(rename = "user[copy_of_emails]")]
    pub copy_of_emails: Option<String>,
    #[serde(rename = "user[institution_id]")]
    pub institution_id: Option<String>,
}

/// 表单字段错误 / Form field error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// 解析复选框样式的布尔值 / Parse checkbox style flags
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        _ => None,
    }
}

/// 解析可空的数字 id，空串视为清空 / Parse optional id, empty clears it
fn parse_id(field: &str, raw: &str) -> Result<Option<i64>, FieldError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| FieldError::new(field, "is not a number"))
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl UserParams {
    /// 将提交的字段写入用户；返回所有无法解析的字段
    /// Apply submitted fields onto `user`, collecting unparsable ones
    pub fn apply_to(&self, user: &mut User) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if let Some(v) = &self.name {
            user.name = v.trim().to_string();
        }
        if let Some(v) = &self.email {
            user.email = v.trim().to_string();
        }
        if let Some(v) = &self.fullname {
            user.fullname = non_empty(v);
        }
        if let Some(v) = &self.crypted_password {
            user.crypted_password = v.clone();
        }
        if let Some(v) = &self.password_salt {
            user.password_salt = v.clone();
        }
        if let Some(v) = &self.mru_directory_path {
            user.mru_directory_path = non_empty(v);
        }
        if let Some(v) = &self.handle {
            user.handle = non_empty(v);
        }
        if let Some(v) = &self.digital_certificate {
            user.digital_certificate = non_empty(v);
        }
        if let Some(v) = &self.persistence_token {
            user.persistence_token = non_empty(v);
        }
        if let Some(v) = &self.timezonepref {
            user.timezonepref = non_empty(v);
        }
        if let Some(v) = &self.public_key {
            user.public_key = non_empty(v);
        }

        for (field, raw, slot) in [
            ("role_id", &self.role_id, &mut user.role_id),
            ("parent_id", &self.parent_id, &mut user.parent_id),
            ("institution_id", &self.institution_id, &mut user.institution_id),
        ] {
            if let Some(raw) = raw {
                match parse_id(field, raw) {
                    Ok(v) => *slot = v,
                    Err(e) => errors.push(e),
                }
            }
        }

        for (field, raw, slot) in [
            ("private_by_default", &self.private_by_default, &mut user.private_by_default),
            ("email_on_review", &self.email_on_review, &mut user.email_on_review),
            ("email_on_submission", &self.email_on_submission, &mut user.email_on_submission),
            (
                "email_on_review_of_review",
                &self.email_on_review_of_review,
                &mut user.email_on_review_of_review,
            ),
            ("is_new_user", &self.is_new_user, &mut user.is_new_user),
            (
                "master_permission_granted",
                &self.master_permission_granted,
                &mut user.master_permission_granted,
            ),
            ("copy_of_emails", &self.copy_of_emails, &mut user.copy_of_emails),
        ] {
            if let Some(raw) = raw {
                match parse_flag(raw) {
                    Some(v) => *slot = v,
                    None => errors.push(FieldError::new(field, "is not a boolean")),
                }
            }
        }

        errors
    }
}

lazy_static::lazy_static! {
    static ref EMAIL_RE: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("email pattern is valid");
}

impl User {
    /// 字段级校验（不含唯一性） / Field validation, uniqueness excluded
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "can't be blank"));
        } else if self.name.chars().any(char::is_whitespace) {
            errors.push(FieldError::new("name", "can't contain spaces"));
        }
        if self.email.trim().is_empty() {
            errors.push(FieldError::new("email", "can't be blank"));
        } else if !EMAIL_RE.is_match(&self.email) {
            errors.push(FieldError::new("email", "is invalid"));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_parses_ids_and_flags() {
        let params = UserParams {
            name: Some(" alice ".into()),
            email: Some("alice@example.edu".into()),
            role_id: Some("3".into()),
            institution_id: Some("".into()),
            email_on_review: Some("1".into()),
            copy_of_emails: Some("off".into()),
            ..Default::default()
        };
        let mut user = User {
            institution_id: Some(9),
            copy_of_emails: true,
            ..Default::default()
        };
        let errors = params.apply_to(&mut user);
        assert!(errors.is_empty());
        assert_eq!(user.name, "alice");
        assert_eq!(user.role_id, Some(3));
        assert_eq!(user.institution_id, None);
        assert!(user.email_on_review);
        assert!(!user.copy_of_emails);
    }

    #[test]
    fn apply_reports_bad_values() {
        let params = UserParams {
            role_id: Some("abc".into()),
            is_new_user: Some("maybe".into()),
            ..Default::default()
        };
        let mut user = User::default();
        let errors = params.apply_to(&mut user);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "role_id");
        assert_eq!(errors[1].field, "is_new_user");
    }

    #[test]
    fn validate_requires_name_and_email() {
        let user = User::default();
        let fields: Vec<_> = user.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["name", "email"]);

        let user = User {
            name: "bob".into(),
            email: "not-an-email".into(),
            ..Default::default()
        };
        assert_eq!(user.validate(), vec![FieldError::new("email", "is invalid")]);
    }

    #[test]
    fn secrets_are_not_serialized() {
        let user = User {
            name: "carol".into(),
            email: "carol@example.edu".into(),
            crypted_password: "hash".into(),
            password_salt: "salt".into(),
            persistence_token: Some("token".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("crypted_password").is_none());
        assert!(json.get("password_salt").is_none());
        assert!(json.get("persistence_token").is_none());
        assert_eq!(json["name"], "carol");
    }
}
