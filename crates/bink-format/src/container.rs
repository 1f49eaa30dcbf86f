//! 容器头解析.
//!
//! 文件布局: 4 字节签名 ("BIK" + 版本字母), 全局头 (文件大小、帧数、
//! 尺寸、帧率、视频标志、音轨表), 帧索引 (`frame_count + 1` 个 u32
//! 偏移, 最低位是关键帧标记), 随后是按索引定位的帧数据.

use std::io::Cursor;

use bink_codec::{AudioTransform, Version};
use bink_core::{BinkError, BinkResult};
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::io::IoContext;

/// 容器允许的最大帧数 (防御损坏的头)
const MAX_FRAMES: u32 = 1_000_000;

/// 容器允许的最大音轨数
const MAX_AUDIO_TRACKS: u32 = 256;

bitflags! {
    /// 全局视频标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct VideoFlags: u32 {
        /// 灰度视频 (只有亮度平面)
        const GRAYSCALE = 0x0002_0000;
        /// 携带 alpha 平面
        const ALPHA = 0x0010_0000;
    }
}

/// 音轨标志: DCT 变换 (否则为实数 DFT)
const AUDIO_FLAG_DCT: u16 = 0x1000;
/// 音轨标志: 立体声
const AUDIO_FLAG_STEREO: u16 = 0x2000;

/// 音轨头 (容器中每轨 4 字节的参数对)
#[derive(Debug, Clone, Copy)]
pub struct AudioTrackHeader {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 原始标志位
    pub flags: u16,
}

impl AudioTrackHeader {
    /// 是否立体声
    pub fn is_stereo(&self) -> bool {
        self.flags & AUDIO_FLAG_STEREO != 0
    }

    /// 声道数
    pub fn channels(&self) -> usize {
        if self.is_stereo() { 2 } else { 1 }
    }

    /// 该轨使用的逆变换
    pub fn transform(&self) -> AudioTransform {
        if self.flags & AUDIO_FLAG_DCT != 0 {
            AudioTransform::Dct
        } else {
            AudioTransform::Rdft
        }
    }
}

/// 帧索引条目
#[derive(Debug, Clone, Copy)]
pub struct FrameIndexEntry {
    /// 帧数据在文件中的起始偏移
    pub offset: u64,
    /// 是否关键帧
    pub keyframe: bool,
}

/// 解析后的容器头
#[derive(Debug)]
pub struct BinkHeader {
    /// 码流版本
    pub version: Version,
    /// 文件总大小 (头中记录值 + 8)
    pub file_size: u64,
    /// 帧数
    pub frame_count: u32,
    /// 最大帧的字节数
    pub largest_frame_size: u32,
    /// 视频宽度
    pub width: u32,
    /// 视频高度
    pub height: u32,
    /// 帧率分子
    pub fps_num: u32,
    /// 帧率分母
    pub fps_den: u32,
    /// 视频标志
    pub video_flags: VideoFlags,
    /// 音轨表
    pub audio_tracks: Vec<AudioTrackHeader>,
    /// 帧索引 (`frame_count + 1` 项, 末项指向最后一帧的结束)
    pub index: Vec<FrameIndexEntry>,
}

impl BinkHeader {
    /// 从字节源解析容器头
    pub fn parse(io: &mut IoContext) -> BinkResult<Self> {
        let sig = io.read_tag()?;
        if &sig[..3] != b"BIK" {
            return Err(BinkError::Format(format!("不是 Bink 文件: {:02X?}", sig)));
        }
        let version = Version::from_signature_byte(sig[3])?;
        if version == Version::B {
            return Err(BinkError::Unsupported("早期 'b' 版容器".into()));
        }

        let file_size = u64::from(io.read_u32_le()?) + 8;
        let frame_count = io.read_u32_le()?;
        if frame_count == 0 || frame_count > MAX_FRAMES {
            return Err(BinkError::Format(format!("非法的帧数: {}", frame_count)));
        }
        let largest_frame_size = io.read_u32_le()?;
        if u64::from(largest_frame_size) > file_size {
            return Err(BinkError::Format(format!(
                "最大帧尺寸 {} 超过文件大小 {}",
                largest_frame_size, file_size
            )));
        }
        io.skip(4)?; // 帧数的冗余副本

        let width = io.read_u32_le()?;
        let height = io.read_u32_le()?;
        let fps_num = io.read_u32_le()?;
        let fps_den = io.read_u32_le()?;
        if fps_num == 0 || fps_den == 0 {
            return Err(BinkError::Format(format!(
                "非法的帧率: {}/{}",
                fps_num, fps_den
            )));
        }

        let video_flags = VideoFlags::from_bits_truncate(io.read_u32_le()?);

        let track_count = io.read_u32_le()?;
        if track_count > MAX_AUDIO_TRACKS {
            return Err(BinkError::Format(format!("非法的音轨数: {}", track_count)));
        }

        // 音轨表是三个并列数组: 未知 u32 / {采样率, 标志} / 音轨 ID
        io.skip(4 * track_count as usize)?;
        let mut audio_tracks = Vec::with_capacity(track_count as usize);
        for _ in 0..track_count {
            let sample_rate = u32::from(io.read_u16_le()?);
            let flags = io.read_u16_le()?;
            audio_tracks.push(AudioTrackHeader { sample_rate, flags });
        }
        io.skip(4 * track_count as usize)?;

        // 帧索引: frame_count + 1 个偏移, 最低位为关键帧标记
        let raw = io.read_bytes(4 * (frame_count as usize + 1))?;
        let mut cursor = Cursor::new(raw);
        let mut index = Vec::with_capacity(frame_count as usize + 1);
        let mut prev_offset = 0u64;
        for i in 0..=frame_count {
            let v = cursor
                .read_u32::<LittleEndian>()
                .map_err(BinkError::Io)?;
            let offset = u64::from(v & !1);
            if offset < prev_offset {
                return Err(BinkError::Format(format!("帧索引第 {} 项非单调递增", i)));
            }
            prev_offset = offset;
            index.push(FrameIndexEntry {
                offset,
                keyframe: v & 1 != 0,
            });
        }

        debug!(
            "容器头: 版本 {:?}, {}x{} @ {}/{}, {} 帧, {} 条音轨",
            version, width, height, fps_num, fps_den, frame_count, track_count
        );

        Ok(Self {
            version,
            file_size,
            frame_count,
            largest_frame_size,
            width,
            height,
            fps_num,
            fps_den,
            video_flags,
            audio_tracks,
            index,
        })
    }

    /// 第 `i` 帧的字节范围 `[start, end)`
    pub fn frame_range(&self, i: usize) -> Option<(u64, u64)> {
        if i + 1 >= self.index.len() {
            return None;
        }
        Some((self.index[i].offset, self.index[i + 1].offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 构造一个最小合法容器头 (无音轨, frame_count 帧)
    fn build_header_bytes(sig: &[u8; 4], frame_count: u32, flags: u32) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(sig);
        data.extend_from_slice(&200u32.to_le_bytes()); // 文件大小 - 8
        data.extend_from_slice(&frame_count.to_le_bytes());
        data.extend_from_slice(&16u32.to_le_bytes()); // 最大帧
        data.extend_from_slice(&frame_count.to_le_bytes()); // 冗余副本
        data.extend_from_slice(&8u32.to_le_bytes()); // 宽
        data.extend_from_slice(&8u32.to_le_bytes()); // 高
        data.extend_from_slice(&25u32.to_le_bytes()); // fps 分子
        data.extend_from_slice(&1u32.to_le_bytes()); // fps 分母
        data.extend_from_slice(&flags.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes()); // 音轨数
        // 帧索引: frame_count + 1 项
        let base = data.len() as u32 + 4 * (frame_count + 1);
        for i in 0..=frame_count {
            let offset = (base + i * 16) | u32::from(i == 0);
            data.extend_from_slice(&offset.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_parse_minimal_header() {
        let mut io = IoContext::from_memory(build_header_bytes(b"BIKi", 2, 0x0002_0000));
        let header = BinkHeader::parse(&mut io).unwrap();
        assert_eq!(header.version, Version::I);
        assert_eq!(header.frame_count, 2);
        assert_eq!(header.width, 8);
        assert_eq!(header.fps_num, 25);
        assert!(header.video_flags.contains(VideoFlags::GRAYSCALE));
        assert!(!header.video_flags.contains(VideoFlags::ALPHA));
        assert_eq!(header.index.len(), 3);
        assert!(header.index[0].keyframe);
        assert!(!header.index[1].keyframe);
        let (start, end) = header.frame_range(0).unwrap();
        assert_eq!(end - start, 16);
    }

    #[test]
    fn test_rejects_bad_signature() {
        let mut io = IoContext::from_memory(build_header_bytes(b"RIFF", 1, 0));
        assert!(matches!(
            BinkHeader::parse(&mut io),
            Err(BinkError::Format(_))
        ));
    }

    #[test]
    fn test_rejects_version_b() {
        let mut io = IoContext::from_memory(build_header_bytes(b"BIKb", 1, 0));
        assert!(matches!(
            BinkHeader::parse(&mut io),
            Err(BinkError::Unsupported(_))
        ));
    }

    #[test]
    fn test_rejects_excessive_frame_count() {
        let mut data = build_header_bytes(b"BIKi", 1, 0);
        data[8..12].copy_from_slice(&2_000_000u32.to_le_bytes());
        let mut io = IoContext::from_memory(data);
        assert!(matches!(
            BinkHeader::parse(&mut io),
            Err(BinkError::Format(_))
        ));
    }

    #[test]
    fn test_rejects_nonmonotonic_index() {
        let mut data = build_header_bytes(b"BIKi", 2, 0);
        let len = data.len();
        // 把中间的索引项改为比首项还小的偏移
        data[len - 8..len - 4].copy_from_slice(&2u32.to_le_bytes());
        let mut io = IoContext::from_memory(data);
        assert!(matches!(
            BinkHeader::parse(&mut io),
            Err(BinkError::Format(_))
        ));
    }

    #[test]
    fn test_audio_track_flags() {
        let t = AudioTrackHeader {
            sample_rate: 44100,
            flags: 0x3000,
        };
        assert!(t.is_stereo());
        assert_eq!(t.channels(), 2);
        assert_eq!(t.transform(), AudioTransform::Dct);

        let t = AudioTrackHeader {
            sample_rate: 22050,
            flags: 0,
        };
        assert!(!t.is_stereo());
        assert_eq!(t.transform(), AudioTransform::Rdft);
    }
}
