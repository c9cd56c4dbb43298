use actix_web::{middleware::Logger, web, App, HttpServer};
use sa_token_plugin_actix_web::{SaTokenMiddleware, SaTokenState};
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{error, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::comm::config_validator::{AppConfiguration, MailTransport, StorageBackend};
use crate::comm::port::{available_port, is_port_available};
use crate::conf::init_sa_token;
use crate::db::connection::connect_with_retry;
use crate::error::{AppError, AppResult};
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::repo::{MemoryStore, PgStore};
use crate::route_registry::{configure_global_routes, print_global_routes_info};
use crate::service::{ServiceSettings, Stores, UserService};

/// 应用启动器
pub struct AppBootstrap {
    config: AppConfiguration,
}

impl AppBootstrap {
    pub fn new(config: AppConfiguration) -> Self {
        Self { config }
    }

    /// 设置主机地址
    pub fn with_host(mut self, host: String) -> Self {
        self.config.server.host = host;
        self
    }

    /// 设置端口
    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// 设置工作线程数
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.server.workers = Some(workers);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.server.debug = debug;
        self
    }

    pub fn config(&self) -> &AppConfiguration {
        &self.config
    }

    /// 按 `storage.backend` 建立存储
    pub async fn build_stores(&self) -> AppResult<Stores> {
        match self.config.storage.backend {
            StorageBackend::Memory => {
                info!("使用内存存储 / Using memory store");
                Ok(Stores::memory(Arc::new(MemoryStore::with_default_roles())))
            }
            StorageBackend::Postgres => {
                let pool = connect_with_retry(&self.config.database).await?;
                let store = PgStore::new(pool);
                store.apply_schema().await?;
                info!("PostgreSQL 存储就绪 / PostgreSQL store ready");
                Ok(Stores::postgres(store))
            }
        }
    }

    /// 按 `mail.transport` 选择投递方式
    pub fn build_mailer(&self) -> AppResult<Arc<dyn Mailer>> {
        let mail = &self.config.mail;
        match mail.transport {
            MailTransport::Smtp => {
                let mailer = SmtpMailer::new(&mail.smtp)
                    .map_err(|e| AppError::external_service("mail", e.to_string()))?;
                info!(host = %mail.smtp.host, port = mail.smtp.port, "SMTP 邮件投递就绪");
                Ok(Arc::new(mailer))
            }
            MailTransport::Log => {
                warn!("mail.transport = log：新用户密码不会被发送，仅用于开发环境");
                Ok(Arc::new(LogMailer))
            }
        }
    }

    /// 构建用户服务，并按需创建初始管理员
    pub async fn build_service(&self) -> AppResult<UserService> {
        let stores = self.build_stores().await?;
        let service = UserService::new(
            stores,
            self.build_mailer()?,
            ServiceSettings::from(self.config.clone()),
        );
        if let Some(bootstrap) = &self.config.bootstrap {
            if let Some(admin) = service.ensure_admin(bootstrap).await? {
                info!(id = admin.id, "已创建初始管理员 {}", admin.name);
            }
        }
        Ok(service)
    }

    /// 运行应用服务器
    #[instrument(skip(self))]
    pub async fn run(self) -> AppResult<()> {
        let server = &self.config.server;
        info!(
            host = %server.host,
            port = server.port,
            workers = ?server.workers,
            debug = server.debug,
            "启动应用服务器"
        );

        let service = web::Data::new(self.build_service().await?);

        // 初始化 Sa-Token（带超时和重试）
        let sa_token_manager = self.init_sa_token_with_retry().await?;
        let sa_token_data = web::Data::new(SaTokenState {
            manager: sa_token_manager,
        });

        // 检查端口可用性并获取可用端口
        let server_port = if is_port_available(&server.host, server.port) {
            server.port
        } else {
            warn!("端口 {} 不可用，正在寻找可用端口...", server.port);
            available_port(&server.host, server.port)
        };
        info!("服务器将在端口 {} 上启动", server_port);
        print_global_routes_info();

        match self
            .start_http_server(server_port, sa_token_data, service)
            .await
        {
            Ok(_) => {
                info!("服务器已停止");
                Ok(())
            }
            Err(e) => {
                error!("服务器启动失败: {}", e);
                Err(e)
            }
        }
    }

    /// 带重试机制的 Sa-Token 初始化
    async fn init_sa_token_with_retry(
        &self,
    ) -> AppResult<Arc<sa_token_core::SaTokenManager>> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT_DURATION: Duration = Duration::from_secs(30);

        let mut attempt = 1;
        loop {
            info!("Sa-Token初始化尝试 {}/{}", attempt, MAX_RETRIES);

            match timeout(TIMEOUT_DURATION, init_sa_token(&self.config.sa_token, None)).await {
                Ok(Ok(manager)) => {
                    info!("Sa-Token初始化成功");
                    return Ok(manager);
                }
                Ok(Err(e)) => {
                    warn!("Sa-Token初始化失败 (尝试 {}): {}", attempt, e);
                    if attempt == MAX_RETRIES {
                        return Err(AppError::external_service("sa-token", e.to_string()));
                    }
                }
                Err(_) => {
                    warn!("Sa-Token初始化超时 (尝试 {})", attempt);
                    if attempt == MAX_RETRIES {
                        return Err(AppError::timeout("sa-token initialization"));
                    }
                }
            }

            // 指数退避
            let delay = Duration::from_millis(1000 * 2_u64.pow(attempt - 1));
            info!("等待 {:?} 后重试", delay);
            sleep(delay).await;
            attempt += 1;
        }
    }

    /// 启动HTTP服务器
    async fn start_http_server(
        &self,
        server_port: u16,
        sa_token_data: web::Data<SaTokenState>,
        service: web::Data<UserService>,
    ) -> AppResult<()> {
        let mut server = HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .app_data(sa_token_data.clone())
                .app_data(service.clone())
                .wrap(SaTokenMiddleware::new(sa_token_data.get_ref().clone()))
                // 集成 Swagger UI 文档（使用通配路径以兼容静态资源与尾随斜杠）
                .service(SwaggerUi::new("/swagger-ui/{_:.*}").url(
                    "/api-doc/openapi.json",
                    crate::api::swagger::ApiDoc::openapi(),
                ))
                .configure(configure_global_routes)
        });
        if let Some(workers) = self.config.server.workers {
            server = server.workers(workers);
        }

        server
            .bind((self.config.server.host.as_str(), server_port))
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?
            .run()
            .await
            .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

        Ok(())
    }
}
