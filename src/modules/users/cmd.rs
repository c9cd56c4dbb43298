use clap::{Arg, Command};

use crate::cmd::SCHEMA_SQL;
use crate::command_registry::{CommandModule, CommandResult};
use crate::security::hash_password;

/// 用户模块的命令处理器
pub struct UsersCommands;

impl CommandModule for UsersCommands {
    fn module_name(&self) -> &'static str {
        "users"
    }

    fn register_commands(&self) -> Vec<Command> {
        vec![
            Command::new("hash-password")
                .about("输出 argon2 密码哈希，用于初始化数据")
                .arg(
                    Arg::new("password")
                        .value_name("PASSWORD")
                        .help("明文密码")
                        .required(true),
                ),
            Command::new("schema").about("输出 PostgreSQL 建表语句"),
        ]
    }

    fn handle_command(&self, command_name: &str, matches: &clap::ArgMatches) -> CommandResult {
        match command_name {
            "hash-password" => {
                let password = matches
                    .get_one::<String>("password")
                    .ok_or("缺少密码参数")?;
                let hashed = hash_password(password)?;
                println!("crypted_password = {}", hashed.hash);
                println!("password_salt    = {}", hashed.salt);
            }
            "schema" => {
                println!("{}", SCHEMA_SQL);
            }
            _ => {
                return Err(format!("未知命令: {}", command_name).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_requires_argument() {
        let cmd = UsersCommands.register_commands().remove(0);
        assert!(cmd.clone().try_get_matches_from(["hash-password"]).is_err());
        let matches = cmd.try_get_matches_from(["hash-password", "pw"]).unwrap();
        assert!(UsersCommands.handle_command("hash-password", &matches).is_ok());
    }

    #[test]
    fn unknown_command_is_an_error() {
        let matches = Command::new("x").get_matches_from(["x"]);
        assert!(UsersCommands.handle_command("nope", &matches).is_err());
        assert!(UsersCommands.handle_command("schema", &matches).is_ok());
    }
}
