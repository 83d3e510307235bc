use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dxfmerge_config::{AppConfig, ConfigError};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod sources;

use commands::{CollapseArgs, MergeArgs};

#[derive(Debug, Parser)]
#[command(name = "dxfmerge")]
#[command(about = "Merge DXF drawings with first-writer-wins resource deduplication", long_about = None)]
#[command(version)]
struct Cli {
    /// 配置文件路径，缺省时按 DXFMERGE_CONFIG 与 ./config/default.toml 查找
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 日志等级或 EnvFilter 表达式，覆盖配置
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 把多个 DXF 文件按顺序合并为一个
    Merge(MergeArgs),
    /// 把每个文件的全部实体收进以文件名命名的组
    Collapse(CollapseArgs),
}

fn main() {
    let cli = Cli::parse();
    let (config, config_warning) = load_configuration(cli.config.clone());
    init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));
    if let Some(message) = config_warning {
        warn!("{message}");
    }
    info!("启动 dxfmerge");

    let outcome = match &cli.command {
        Command::Merge(args) => commands::merge(args, &config.merge).map(|_| ()),
        Command::Collapse(args) => commands::collapse(args, &config.merge).map(|_| ()),
    };
    if let Err(err) = outcome {
        error!(error = %format!("{err:#}"), "执行失败");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

/// 加载失败时退回默认配置。警告在日志初始化之后才能输出，因此随结果一起返回。
fn load_configuration(override_path: Option<PathBuf>) -> (AppConfig, Option<String>) {
    let loaded = match override_path {
        Some(path) => AppConfig::from_file(&path),
        None => AppConfig::discover(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(err) => {
            let message = match &err {
                ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                    format!("加载配置 {} 失败，使用内建默认值: {err}", path.display())
                }
                ConfigError::Context { .. } => format!("加载配置失败，使用内建默认值: {err}"),
            };
            (AppConfig::default(), Some(message))
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
