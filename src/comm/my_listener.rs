use async_trait::async_trait;
use sa_token_core::SaTokenListener;
use tracing::info;

/// 登录事件监听器，把会话生命周期写入日志
/// Session lifecycle listener that logs login events
pub struct MyListener;

#[async_trait]
impl SaTokenListener for MyListener {
    async fn on_login(&self, login_id: &str, _token: &str, login_type: &str) {
        info!(login_id, login_type, "用户登录 / user logged in");
    }

    async fn on_logout(&self, login_id: &str, _token: &str, login_type: &str) {
        info!(login_id, login_type, "用户登出 / user logged out");
    }

    async fn on_kick_out(&self, login_id: &str, _token: &str, login_type: &str) {
        info!(login_id, login_type, "用户被踢下线 / user kicked out");
    }
}
