use std::net::TcpListener;

use tracing::warn;

/// 端口探测的最大尝试次数
const MAX_PROBES: u16 = 10;

/// 检查端口是否可以绑定
///
/// # 参数
/// * `host` - 监听地址
/// * `port` - 要检查的端口号
pub fn is_port_available(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_ok()
}

/// 从 `start_port` 起查找可用端口，找不到时返回 `start_port`
pub fn available_port(host: &str, start_port: u16) -> u16 {
    let end = start_port.saturating_add(MAX_PROBES);
    for port in start_port..end {
        if is_port_available(host, port) {
            if port != start_port {
                warn!("端口 {} 已被占用，改用 {}", start_port, port);
            }
            return port;
        }
    }
    start_port
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occupied_port_is_skipped() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();
        assert!(!is_port_available("127.0.0.1", taken));
        assert_ne!(available_port("127.0.0.1", taken), taken);
    }
}
