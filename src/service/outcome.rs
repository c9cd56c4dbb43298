//! 处理结果：渲染视图、重定向或 HTML 片段，外加闪存消息
//! Action outcomes: render a view, redirect, or an HTML fragment, plus flash

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::{FieldError, ResponseMap, Role, User};
use crate::service::pagination::PageMeta;

/// 只存活一个请求的提示消息 / One-request-lifetime messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Flash {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Flash {
    pub fn is_empty(&self) -> bool {
        self.note.is_none() && self.success.is_none() && self.error.is_none()
    }

    /// 用上一个请求带来的消息补齐空位，本次设置的优先
    /// Fill empty slots from an earlier request; messages set now win
    pub fn merge(mut self, earlier: Flash) -> Flash {
        self.note = self.note.or(earlier.note);
        self.success = self.success.or(earlier.success);
        self.error = self.error.or(earlier.error);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListView {
    pub users: Vec<User>,
    pub page: PageMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowView {
    pub user: User,
    pub role: Role,
    pub assignment_participant_num: i64,
    pub maps: Vec<ResponseMap>,
    pub total_user_num: i64,
}

/// new / edit 共用的表单视图
#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub user: User,
    pub role: Option<Role>,
    pub all_roles: Vec<Role>,
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeysView {
    pub user: User,
    /// 私钥只显示这一次
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", content = "data", rename_all = "snake_case")]
pub enum View {
    List(ListView),
    Show(Box<ShowView>),
    New(FormView),
    Edit(FormView),
    Keys(KeysView),
}

impl View {
    pub fn name(&self) -> &'static str {
        match self {
            View::List(_) => "list",
            View::Show(_) => "show",
            View::New(_) => "new",
            View::Edit(_) => "edit",
            View::Keys(_) => "keys",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Render(View),
    Redirect(String),
    Fragment(String),
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub reply: Reply,
    pub flash: Flash,
}

impl Outcome {
    pub fn render(view: View) -> Self {
        Self {
            reply: Reply::Render(view),
            flash: Flash::default(),
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            reply: Reply::Redirect(location.into()),
            flash: Flash::default(),
        }
    }

    pub fn fragment(html: String) -> Self {
        Self {
            reply: Reply::Fragment(html),
            flash: Flash::default(),
        }
    }

    pub fn with_note(mut self, message: impl Into<String>) -> Self {
        self.flash.note = Some(message.into());
        self
    }

    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.flash.success = Some(message.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.flash.error = Some(message.into());
        self
    }

    /// 重定向目标（非重定向时为 None）
    pub fn location(&self) -> Option<&str> {
        match &self.reply {
            Reply::Redirect(location) => Some(location),
            _ => None,
        }
    }

    pub fn view(&self) -> Option<&View> {
        match &self.reply {
            Reply::Render(view) => Some(view),
            _ => None,
        }
    }
}
