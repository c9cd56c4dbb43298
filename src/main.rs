use clap::ArgMatches;
use std::error::Error;

use vgo_users::cmd::handle_version_command;
use vgo_users::comm::enhanced_config::EnhancedConfigManager;
use vgo_users::comm::tracing::init_tracing;
use vgo_users::{build_app, handle_command, init_commands, init_routes, AppBootstrap};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 初始化所有模块的命令
    init_commands();

    let matches: ArgMatches = build_app().get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            handle_server_command(sub_matches).await?;
        }
        Some(("version", _)) => {
            handle_version_command();
        }
        Some((command_name, sub_matches)) => {
            if let Err(e) = handle_command(command_name, sub_matches) {
                eprintln!("处理命令 '{}' 时出错: {}", command_name, e);
                std::process::exit(1);
            }
        }
        None => {
            eprintln!("未知命令，请使用 --help 查看可用命令");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn handle_server_command(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    // 加载并验证配置
    let config_manager = EnhancedConfigManager::new()?;
    init_tracing(&config_manager.get_app_config().logging)?;
    config_manager.validate_required_config()?;
    config_manager.print_config_summary();

    init_routes();

    // 命令行参数覆盖配置文件
    let mut bootstrap = AppBootstrap::new(config_manager.into_app_config());
    if let Some(host) = matches.get_one::<String>("host") {
        bootstrap = bootstrap.with_host(host.clone());
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        bootstrap = bootstrap.with_port(*port);
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        bootstrap = bootstrap.with_workers(*workers);
    }
    if matches.get_flag("debug") {
        bootstrap = bootstrap.with_debug(true);
    }

    bootstrap.run().await?;
    Ok(())
}
