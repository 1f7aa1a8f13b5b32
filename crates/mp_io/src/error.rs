// crates/mp_io/src/error.rs

//! IO 层错误类型

use mp_foundation::MpError;
use thiserror::Error;

/// IO 层结果类型
pub type IoResult<T> = Result<T, IoError>;

/// IO 层错误
#[derive(Error, Debug)]
pub enum IoError {
    /// 底层文件系统错误
    #[error("文件IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// 灰度映射范围无效
    #[error("无效的灰度范围: [{lo}, {hi}]")]
    InvalidRange {
        /// 范围下界
        lo: f64,
        /// 范围上界
        hi: f64,
    },

    /// 快照标签无效
    #[error("无效的快照标签: {0:?}")]
    InvalidTag(String),
}

impl From<IoError> for MpError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Io(source) => MpError::io_with_source("快照写入失败", source),
            other => MpError::io(other.to_string()),
        }
    }
}
