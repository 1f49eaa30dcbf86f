//! # bink-core
//!
//! Bink 解码库核心 crate, 提供错误类型、位级 I/O 和基础工具.
//!
//! 容器内所有压缩数据 (视频包与音频包) 都以位为单位编码, 本 crate
//! 的比特流读取器是整个解码管线的基础设施.

pub mod bitreader;
pub mod bitwriter;
pub mod error;
pub mod rational;

// 重导出常用类型
pub use error::{BinkError, BinkResult};
pub use rational::Rational;
