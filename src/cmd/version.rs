/// 版本信息字符串
pub fn version_string() -> String {
    format!(
        "{} {} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION")
    )
}

/// 处理 version 命令
pub fn handle_version_command() {
    println!("{}", version_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_names_the_package() {
        let v = version_string();
        assert!(v.starts_with(env!("CARGO_PKG_NAME")));
        assert!(v.contains(env!("CARGO_PKG_VERSION")));
    }
}
