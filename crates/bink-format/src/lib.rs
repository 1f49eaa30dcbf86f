//! # bink-format
//!
//! Bink 容器格式的解析与解码会话.
//!
//! - [`io`]: 统一的字节源抽象 (文件 / 内存缓冲), 小端标量读取.
//! - [`container`]: 容器头解析 — 签名与版本、全局视频参数、
//!   音轨表、帧索引.
//! - [`session`]: [`session::BinkSession`] 把容器、视频解码器与
//!   各音轨解码器编排为顺序解码会话, 支持按关键帧索引定位.

pub mod container;
pub mod io;
pub mod session;

pub use container::{AudioTrackHeader, BinkHeader, VideoFlags};
pub use io::IoContext;
pub use session::{AudioTrackInfo, BinkSession, FrameView};
