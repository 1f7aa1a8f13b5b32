// crates/mp_io/src/lib.rs

//! MariPoisson IO 层
//!
//! 求解层通过 `SnapshotSink` 接口请求快照输出，本层提供具体的
//! 落盘实现。当前支持 8 位二进制 PGM（P5）灰度图，取网格的
//! 中间 z 切片。
//!
//! IO 错误在本层定义并可转换为基础层的统一错误类型。

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod snapshot;

pub use error::{IoError, IoResult};
pub use snapshot::PgmWriter;
