//! 统一错误类型定义.
//!
//! 所有 bink crate 共用的错误类型, 支持跨模块传播.
//!
//! 错误分为四类: 打开错误 (签名/头部非法, 会话不可用)、码流错误
//! (单帧解码失败, 画面保持上一帧状态)、读取器下溢 (包内位数耗尽,
//! 当前帧致命) 以及 I/O 错误. 音频缓冲区溢出按约定静默截断,
//! 不对应任何错误变体.

use thiserror::Error;

/// Bink 解码库统一错误类型
#[derive(Debug, Error)]
pub enum BinkError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的容器版本或特性
    #[error("不支持: {0}")]
    Unsupported(String),

    /// 容器格式错误 (头部/索引非法)
    #[error("格式错误: {0}")]
    Format(String),

    /// 无效数据 (码流失步、越界引用等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 已到达流末尾 (包内位数耗尽)
    #[error("已到达流末尾")]
    Eof,
}

/// Bink 解码库统一 Result 类型
pub type BinkResult<T> = Result<T, BinkError>;
