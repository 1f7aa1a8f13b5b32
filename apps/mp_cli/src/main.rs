// apps/mp_cli/src/main.rs

//! MariPoisson 命令行界面
//!
//! 提供三维 Poisson 方程求解和稠密矩阵乘法基准的命令行工具。
//!
//! # 架构层级
//!
//! 本模块属于应用层：精度通过 `--f32` 开关选择，泛型只出现在
//! 各命令内部的单次分发处。

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// MariPoisson Poisson 求解器命令行工具
#[derive(Parser)]
#[command(name = "mp_cli")]
#[command(author = "MariPoisson Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MariPoisson conjugate gradient Poisson solver", long_about = None)]
struct Cli {
    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 运行 Poisson 求解
    Run(commands::run::RunArgs),
    /// 稠密矩阵乘法基准
    Gemm(commands::gemm::GemmArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // 执行命令
    match cli.command {
        Commands::Run(args) => commands::run::execute(args),
        Commands::Gemm(args) => commands::gemm::execute(args),
    }
}
