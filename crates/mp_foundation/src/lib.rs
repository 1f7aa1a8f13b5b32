// crates/mp_foundation/src/lib.rs

//! MariPoisson Foundation Layer
//!
//! 基础层，提供整个项目的基础抽象。
//!
//! # 模块概览
//!
//! - [`scalar`]: 密封的运行时标量抽象（f32/f64）
//! - [`error`]: 统一错误类型
//! - [`metrics`]: 核函数调用计数与计时
//!
//! # 设计原则
//!
//! 1. **最小依赖**: 仅依赖 thiserror、num-traits、bytemuck、log
//! 2. **零开销抽象**: `#[inline]` + 编译期单态化
//! 3. **显式状态**: 计时器等状态作为参数传递，禁止全局可变量

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod metrics;
pub mod scalar;

// 重导出常用类型
pub use error::{MpError, MpResult};
pub use metrics::{KernelKind, KernelMetrics};
pub use scalar::RuntimeScalar;

/// Prelude 模块，包含常用类型
pub mod prelude {
    pub use crate::error::{MpError, MpResult};
    pub use crate::metrics::{KernelKind, KernelMetrics};
    pub use crate::scalar::RuntimeScalar;
}
