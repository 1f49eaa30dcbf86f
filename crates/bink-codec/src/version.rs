//! 容器/码流版本.
//!
//! 签名的第 4 字节是版本字母, 决定若干码流细节:
//! 颜色值的符号折叠 (版本 < i)、色度平面顺序交换 (版本 >= h)、
//! 平面数据前的 32 位大小字段 (版本 >= i).

use bink_core::{BinkError, BinkResult};

/// 码流版本 (签名第 4 字节)
///
/// `B` 版是早期变种, 采用不同的头部与量化方案, 能识别但不支持解码.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    /// 'b' — 早期变种, 不支持
    B,
    /// 'f'
    F,
    /// 'g'
    G,
    /// 'h'
    H,
    /// 'i'
    I,
}

impl Version {
    /// 从签名第 4 字节解析版本
    pub fn from_signature_byte(b: u8) -> BinkResult<Self> {
        match b {
            b'b' => Ok(Version::B),
            b'f' => Ok(Version::F),
            b'g' => Ok(Version::G),
            b'h' => Ok(Version::H),
            b'i' => Ok(Version::I),
            _ => Err(BinkError::Format(format!(
                "未知的签名版本字节: 0x{:02X}",
                b
            ))),
        }
    }

    /// 色度平面是否交换 (U/V 顺序对调)
    pub fn swap_planes(self) -> bool {
        self >= Version::H
    }

    /// 颜色字节是否需要符号折叠再加偏置
    pub fn rebias_colors(self) -> bool {
        self < Version::I
    }

    /// 每个平面前是否带 32 位数据大小字段
    pub fn has_plane_sizes(self) -> bool {
        self >= Version::I
    }
}
