//! # bink-codec
//!
//! Bink 容器内嵌的视频与音频编解码器 (仅解码).
//!
//! - [`video`]: 基于 8x8 块的分平面视频编码 — 每个平面由十种块类型
//!   重建 (跳过/运动补偿/DCT/填充/图案等), 符号流经各自的 Huffman 树
//!   解码后存入 bundle 缓冲.
//! - [`audio`]: 子带量化 + Huffman/定长编码的频谱音频, 经逆实数 DFT
//!   或 DCT-III 变换回时域, 块间重叠相加平滑.
//!
//! 两条管线共享 [`bink_core::bitreader::BitReader`] 与本 crate 的
//! VLC 符号解码 ([`vlc`]).

pub mod audio;
pub mod version;
pub mod video;
pub mod vlc;

pub use audio::{AudioTransform, BinkAudioDecoder};
pub use version::Version;
pub use video::{BinkVideoDecoder, PlaneView};
