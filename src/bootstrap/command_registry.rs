use clap::{Arg, ArgAction, Command};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub type CommandResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 命令注册器 trait，各模块实现此 trait 来注册命令
pub trait CommandModule {
    /// 获取模块名称
    fn module_name(&self) -> &'static str;

    /// 注册模块的子命令
    fn register_commands(&self) -> Vec<Command>;

    /// 处理模块命令
    fn handle_command(&self, command_name: &str, matches: &clap::ArgMatches) -> CommandResult;
}

/// 命令注册器，使用单例模式
pub struct CommandRegistry {
    modules: BTreeMap<String, Box<dyn CommandModule + Send + Sync>>,
}

impl CommandRegistry {
    fn new() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// 获取全局单例实例
    pub fn instance() -> &'static Mutex<CommandRegistry> {
        static INSTANCE: OnceLock<Mutex<CommandRegistry>> = OnceLock::new();
        INSTANCE.get_or_init(|| Mutex::new(CommandRegistry::new()))
    }

    /// 注册模块
    pub fn register_module(&mut self, module: Box<dyn CommandModule + Send + Sync>) {
        let module_name = module.module_name().to_string();
        self.modules.insert(module_name, module);
    }

    /// 构建完整的命令行应用
    pub fn build_app(&self) -> Command {
        let mut app = Command::new(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .about(env!("CARGO_PKG_DESCRIPTION"))
            .subcommand_required(true)
            .arg_required_else_help(true);

        // 内置的 server 命令；未给出的参数沿用配置文件
        app = app.subcommand(
            Command::new("server")
                .about("启动 Web 服务器")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("覆盖 server.host"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16))
                        .help("覆盖 server.port"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("WORKERS")
                        .value_parser(clap::value_parser!(usize))
                        .help("覆盖 server.workers"),
                )
                .arg(
                    Arg::new("debug")
                        .short('d')
                        .long("debug")
                        .help("启用调试模式")
                        .action(ArgAction::SetTrue),
                ),
        );

        app = app.subcommand(Command::new("version").about("显示版本信息"));

        for module in self.modules.values() {
            for command in module.register_commands() {
                app = app.subcommand(command);
            }
        }

        app
    }

    /// 查找对应的模块来处理命令
    pub fn handle_command(&self, command_name: &str, matches: &clap::ArgMatches) -> CommandResult {
        for module in self.modules.values() {
            if module
                .register_commands()
                .iter()
                .any(|command| command.get_name() == command_name)
            {
                return module.handle_command(command_name, matches);
            }
        }

        Err(format!("未找到处理命令 '{}' 的模块", command_name).into())
    }

    /// 获取所有注册的模块名称
    pub fn get_registered_modules(&self) -> Vec<&str> {
        self.modules.keys().map(|s| s.as_str()).collect()
    }
}

/// 便捷函数：注册模块
pub fn register_module(module: Box<dyn CommandModule + Send + Sync>) {
    CommandRegistry::instance().lock().register_module(module);
}

pub fn build_app() -> Command {
    CommandRegistry::instance().lock().build_app()
}

pub fn handle_command(command_name: &str, matches: &clap::ArgMatches) -> CommandResult {
    CommandRegistry::instance()
        .lock()
        .handle_command(command_name, matches)
}
