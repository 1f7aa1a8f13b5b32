// crates/mp_foundation/src/error.rs

//! 错误处理模块，定义统一错误类型
//!
//! 提供 `MpError` 枚举和 `MpResult` 类型别名，用于整个项目的错误处理。
//!
//! # 设计原则
//!
//! 1. **层次化**: 基础层只定义核心错误，IO 相关错误在 mp_io 中扩展
//! 2. **易用性**: 提供便捷的构造方法
//! 3. **可区分**: 数值崩溃（NumericalBreakdown）与正常未收敛严格分离，
//!    后者不是错误而是求解结果的终止状态
//!
//! # 示例
//!
//! ```
//! use mp_foundation::error::{MpError, MpResult};
//!
//! fn check_tolerance(nu_max: f64) -> MpResult<()> {
//!     MpError::check_range("nu_max", nu_max, 0.0, f64::MAX)
//! }
//! ```

use thiserror::Error;

/// 统一结果类型
pub type MpResult<T> = Result<T, MpError>;

/// MariPoisson 错误类型
///
/// 核心错误类型，用于整个项目。IO 相关的错误应在 `mp_io` 中扩展。
#[derive(Error, Debug)]
pub enum MpError {
    /// IO 错误
    #[error("IO错误: {message}")]
    Io {
        /// 描述性错误信息
        message: String,
        #[source]
        /// 可选的底层 IO 错误
        source: Option<std::io::Error>,
    },

    /// 无效输入
    #[error("无效的输入数据: {message}")]
    InvalidInput {
        /// 说明无效原因
        message: String,
    },

    /// 数据超出范围
    #[error("数据超出范围: {field}={value}, 期望范围=[{min}, {max}]")]
    OutOfRange {
        /// 字段名
        field: &'static str,
        /// 实际值
        value: f64,
        /// 最小允许值
        min: f64,
        /// 最大允许值
        max: f64,
    },

    /// 数组大小不匹配
    #[error("数组大小不匹配: {name} 期望{expected}, 实际{actual}")]
    SizeMismatch {
        /// 数据名称
        name: &'static str,
        /// 期望大小
        expected: usize,
        /// 实际大小
        actual: usize,
    },

    /// 索引越界
    #[error("索引越界: {index_type} 索引 {index} 超出范围 0..{len}")]
    IndexOutOfBounds {
        /// 索引类别描述
        index_type: &'static str,
        /// 访问的索引
        index: usize,
        /// 上界（长度）
        len: usize,
    },

    /// 配置错误
    #[error("配置错误: {message}")]
    Config {
        /// 具体错误信息
        message: String,
    },

    /// 配置值无效
    #[error("配置值无效: {key}={value}, 原因: {reason}")]
    InvalidConfig {
        /// 配置键名
        key: String,
        /// 配置值
        value: String,
        /// 无效原因说明
        reason: String,
    },

    /// 数值崩溃
    ///
    /// 迭代过程中出现零或非有限的分母（sigma/rho），
    /// 与达到迭代上限的正常未收敛严格区分。
    #[error("数值崩溃: 第{iteration}次迭代, {quantity} = {value:e}")]
    NumericalBreakdown {
        /// 崩溃的标量名称（sigma 或 rho）
        quantity: &'static str,
        /// 实际值
        value: f64,
        /// 发生崩溃的迭代序号
        iteration: usize,
    },

    /// 序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        /// 序列化失败原因
        message: String,
    },

    /// 内部错误
    #[error("内部错误: {message}")]
    Internal {
        /// 内部错误描述
        message: String,
    },
}

// ========================================================================
// 便捷构造方法
// ========================================================================

impl MpError {
    /// 从IO错误创建
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            source: None,
        }
    }

    /// 从IO错误创建（带源）
    pub fn io_with_source(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(source),
        }
    }

    /// 无效输入
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// 数据超出范围
    pub fn out_of_range(field: &'static str, value: f64, min: f64, max: f64) -> Self {
        Self::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }

    /// 数组大小不匹配
    pub fn size_mismatch(name: &'static str, expected: usize, actual: usize) -> Self {
        Self::SizeMismatch {
            name,
            expected,
            actual,
        }
    }

    /// 索引越界
    pub fn index_out_of_bounds(index_type: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfBounds {
            index_type,
            index,
            len,
        }
    }

    /// 配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// 配置值无效
    pub fn invalid_config(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// 数值崩溃
    pub fn numerical_breakdown(quantity: &'static str, value: f64, iteration: usize) -> Self {
        Self::NumericalBreakdown {
            quantity,
            value,
            iteration,
        }
    }

    /// 序列化错误
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// 内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

// ========================================================================
// 验证辅助方法
// ========================================================================

impl MpError {
    /// 检查数组大小是否匹配
    #[inline]
    pub fn check_size(name: &'static str, expected: usize, actual: usize) -> MpResult<()> {
        if expected != actual {
            Err(Self::size_mismatch(name, expected, actual))
        } else {
            Ok(())
        }
    }

    /// 检查值是否在范围内
    #[inline]
    pub fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> MpResult<()> {
        if value < min || value > max {
            Err(Self::out_of_range(field, value, min, max))
        } else {
            Ok(())
        }
    }

    /// 检查索引是否在范围内
    #[inline]
    pub fn check_index(index_type: &'static str, index: usize, len: usize) -> MpResult<()> {
        if index >= len {
            Err(Self::index_out_of_bounds(index_type, index, len))
        } else {
            Ok(())
        }
    }
}

// ========================================================================
// 标准库错误转换
// ========================================================================

impl From<std::io::Error> for MpError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

// ========================================================================
// 测试
// ========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MpError::config("测试配置错误");
        assert!(err.to_string().contains("配置错误"));
    }

    #[test]
    fn test_io_error() {
        let err = MpError::io("读取失败");
        assert!(err.to_string().contains("IO错误"));
    }

    #[test]
    fn test_numerical_breakdown() {
        let err = MpError::numerical_breakdown("sigma", 0.0, 7);
        let text = err.to_string();
        assert!(text.contains("数值崩溃"));
        assert!(text.contains("sigma"));
        assert!(text.contains('7'));
    }

    #[test]
    fn test_size_mismatch() {
        let err = MpError::size_mismatch("field", 10, 5);
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn test_check_size() {
        assert!(MpError::check_size("test", 10, 10).is_ok());
        assert!(MpError::check_size("test", 10, 5).is_err());
    }

    #[test]
    fn test_check_range() {
        assert!(MpError::check_range("value", 5.0, 0.0, 10.0).is_ok());
        assert!(MpError::check_range("value", -1.0, 0.0, 10.0).is_err());
        assert!(MpError::check_range("value", 11.0, 0.0, 10.0).is_err());
    }

    #[test]
    fn test_check_index() {
        assert!(MpError::check_index("Cell", 5, 10).is_ok());
        assert!(MpError::check_index("Cell", 10, 10).is_err());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let mp_err: MpError = io_err.into();
        assert!(matches!(mp_err, MpError::Io { .. }));
    }
}
