//! 邮件投递 / Mail delivery
//!
//! 服务只依赖 `Mailer` Trait。生产环境走 SMTP，开发环境可以只写日志，测试使用内存发件箱。

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::comm::config_validator::{SmtpSettings, SmtpTls};

pub const WELCOME_SUBJECT: &str = "Your account and password have been created.";
pub const WELCOME_TEMPLATE: &str = "user_welcome";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    #[error("invalid mail address {address}: {message}")]
    Address { address: String, message: String },

    #[error("mail transport error: {0}")]
    Transport(String),
}

/// 待发送邮件 / Outgoing mail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub template: String,
    /// 收件人用户名
    pub recipient_name: String,
    /// 随信发送的明文密码
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl MailMessage {
    /// 新用户欢迎邮件 / Welcome mail carrying a generated password
    pub fn welcome(from: &str, to: &str, recipient_name: &str, password: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            subject: WELCOME_SUBJECT.to_string(),
            template: WELCOME_TEMPLATE.to_string(),
            recipient_name: recipient_name.to_string(),
            password: Some(password.to_string()),
        }
    }

    /// 渲染纯文本正文 / Plain-text body
    pub fn body(&self) -> String {
        let mut body = format!("Hello {},\n\n{}\n", self.recipient_name, self.subject);
        if let Some(password) = &self.password {
            body.push_str(&format!(
                "\nUser name: {}\nPassword: {}\n",
                self.recipient_name, password
            ));
        }
        body
    }

    /// 构建 MIME 邮件
    pub fn to_message(&self) -> Result<Message, MailError> {
        Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(&self.to)?)
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.body())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse::<Mailbox>().map_err(|e| MailError::Address {
        address: address.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(&self, message: MailMessage) -> Result<(), MailError>;
}

/// 通过 SMTP 投递 / Delivers mail over SMTP
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// 按 `[mail.smtp]` 配置建立传输（连接在首次投递时建立）
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let builder = match settings.tls {
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| MailError::Transport(e.to_string()))?
            }
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| MailError::Transport(e.to_string()))?,
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(settings.host.as_str())
            }
        };
        let mut builder = builder
            .port(settings.port)
            .timeout(Some(Duration::from_secs(settings.timeout_seconds)));
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(&self, message: MailMessage) -> Result<(), MailError> {
        let email = message.to_message()?;
        let response = self.transport.send(email).await.map_err(|e| MailError::Delivery {
            recipient: message.to.clone(),
            message: e.to_string(),
        })?;
        info!(
            to = %message.to,
            template = %message.template,
            code = %response.code(),
            "mail delivered"
        );
        Ok(())
    }
}

/// 只写日志不发信，仅用于开发环境（密码不落日志）
/// Development-only mailer: logs the mail, never sends it, never logs the password
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, message: MailMessage) -> Result<(), MailError> {
        warn!(
            from = %message.from,
            to = %message.to,
            subject = %message.subject,
            template = %message.template,
            with_password = message.password.is_some(),
            "mail.transport = log，邮件未实际发送 / mail NOT sent"
        );
        Ok(())
    }
}

/// 内存发件箱 / In-memory outbox
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: Mutex<Vec<MailMessage>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 之后的投递都以该消息失败
    pub fn fail_deliveries(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }

    pub fn sent(&self) -> Vec<MailMessage> {
        self.outbox.lock().clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn deliver(&self, message: MailMessage) -> Result<(), MailError> {
        if let Some(reason) = self.fail_with.lock().clone() {
            return Err(MailError::Delivery {
                recipient: message.to,
                message: reason,
            });
        }
        self.outbox.lock().push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_mailer_keeps_outbox() {
        let mailer = MemoryMailer::new();
        mailer
            .deliver(MailMessage::welcome("noreply@x.edu", "a@x.edu", "a", "pw123"))
            .await
            .unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, WELCOME_SUBJECT);
        assert_eq!(sent[0].password.as_deref(), Some("pw123"));
    }

    #[tokio::test]
    async fn memory_mailer_can_fail() {
        let mailer = MemoryMailer::new();
        mailer.fail_deliveries("smtp down");
        let err = mailer
            .deliver(MailMessage::welcome("noreply@x.edu", "a@x.edu", "a", "pw"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("smtp down"));
        assert!(mailer.sent().is_empty());
    }

    #[test]
    fn welcome_message_carries_the_password() {
        let message = MailMessage::welcome("noreply@x.edu", "sam@x.edu", "sam", "pw123abc")
            .to_message()
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Your account and password have been created."));
        assert!(raw.contains("Password: pw123abc"));
        assert!(raw.contains("sam@x.edu"));
    }

    #[test]
    fn bad_recipient_address_is_rejected() {
        let err = MailMessage::welcome("noreply@x.edu", "not an address", "sam", "pw")
            .to_message()
            .unwrap_err();
        assert!(matches!(err, MailError::Address { .. }));
    }

    #[tokio::test]
    async fn smtp_mailer_reports_unreachable_server() {
        let settings = SmtpSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            tls: SmtpTls::None,
            timeout_seconds: 2,
            ..SmtpSettings::default()
        };
        let mailer = SmtpMailer::new(&settings).unwrap();
        let err = mailer
            .deliver(MailMessage::welcome("noreply@x.edu", "sam@x.edu", "sam", "pw"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, MailError::Delivery { ref recipient, .. } if recipient == "sam@x.edu")
        );
    }

    #[test]
    fn password_is_not_serialized() {
        let message = MailMessage::welcome("f@x.edu", "t@x.edu", "t", "pw");
        let json = serde_json::to_value(message).unwrap();
        assert!(json.get("password").is_none());
    }
}
