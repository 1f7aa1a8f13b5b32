// apps/mp_cli/src/commands/mod.rs

//! 命令实现模块

pub mod gemm;
pub mod run;
