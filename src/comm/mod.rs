/// 通用基础模块：配置、日志、会话监听
/// Common infrastructure: configuration, logging, session listener

pub mod config;
pub mod config_validator;
pub mod enhanced_config;
pub mod my_listener;
pub mod port;
pub mod tracing;

pub use my_listener::MyListener;
