//! # Bink
//!
//! 纯 Rust 实现的 Bink 音视频容器解码库.
//!
//! Bink 是游戏行业广泛使用的过场动画容器: 单条视频流 (基于 8x8 块的
//! 分平面编码) 与若干音轨 (子带量化频谱音频) 按帧交织, 帧索引支持
//! 关键帧定位. 本库只做解码.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use bink::BinkSession;
//!
//! let mut session = BinkSession::open("intro.bik")?;
//! println!("{} 帧 @ {}", session.frame_count(), session.frame_rate());
//! while let Ok(frame) = session.decode_next_frame() {
//!     let luma = &frame.planes[0];
//!     // 按 luma.pitch 逐行取 luma.width 个像素...
//! }
//! # Ok::<(), bink::BinkError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `bink-core` | 比特流读写、错误类型、有理数 |
//! | `bink-codec` | 视频与音频解码器 |
//! | `bink-format` | 容器解析与解码会话 |

/// 核心类型与比特流工具
pub use bink_core as core;

/// 视频与音频解码器
pub use bink_codec as codec;

/// 容器格式与解码会话
pub use bink_format as format;

pub use bink_core::{BinkError, BinkResult, Rational};
pub use bink_format::{AudioTrackInfo, BinkSession, FrameView, IoContext};

/// 获取库版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
