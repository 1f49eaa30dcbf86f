//! 解码会话.
//!
//! [`BinkSession`] 把容器头、帧索引、视频解码器和各音轨解码器编排为
//! 一个单线程顺序解码会话: 每次推进一帧, 帧内先走音轨数据包
//! (解码出的 PCM 进入各轨缓冲队列), 剩余字节全部属于视频包.
//!
//! 定位只重置游标和音频重叠状态, 不做平面回滚 — 调用方负责从
//! 关键帧开始重建画面.

use std::io::SeekFrom;

use bytes::Bytes;
use log::{debug, warn};

use bink_codec::{BinkAudioDecoder, BinkVideoDecoder, PlaneView};
use bink_core::{BinkError, BinkResult, Rational};

use crate::container::{BinkHeader, VideoFlags};
use crate::io::IoContext;

/// 单条音轨的会话状态
struct AudioTrack {
    decoder: BinkAudioDecoder,
    /// 已解码待取走的 PCM 样本
    queue: Vec<i16>,
}

/// 音轨参数 (对外)
#[derive(Debug, Clone, Copy)]
pub struct AudioTrackInfo {
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 声道数
    pub channels: usize,
    /// 建议的单帧读取缓冲大小 (字节)
    ///
    /// 覆盖一个视频帧时长的解码块数再加一块的余量.
    pub ideal_buffer_bytes: usize,
}

/// 一帧解码结果的平面视图 (借用会话内部缓冲)
pub struct FrameView<'a> {
    /// 平面集合: 亮度, 两个色度, 可选 alpha
    pub planes: Vec<PlaneView<'a>>,
    /// 帧序号 (0 起)
    pub frame_index: usize,
    /// 是否关键帧
    pub keyframe: bool,
}

/// Bink 解码会话
///
/// 单一所有者、单线程使用; 释放即关闭.
pub struct BinkSession {
    io: IoContext,
    header: BinkHeader,
    video: BinkVideoDecoder,
    audio: Vec<AudioTrack>,
    /// 下一个要解码的帧序号
    cursor: usize,
}

impl BinkSession {
    /// 打开文件并解析容器头
    pub fn open(path: &str) -> BinkResult<Self> {
        Self::open_io(IoContext::open_read(path)?)
    }

    /// 从任意字节源打开
    pub fn open_io(mut io: IoContext) -> BinkResult<Self> {
        let header = BinkHeader::parse(&mut io)?;

        let video = BinkVideoDecoder::new(
            header.width,
            header.height,
            header.version,
            header.video_flags.contains(VideoFlags::GRAYSCALE),
            header.video_flags.contains(VideoFlags::ALPHA),
        )?;

        let mut audio = Vec::with_capacity(header.audio_tracks.len());
        for track in &header.audio_tracks {
            audio.push(AudioTrack {
                decoder: BinkAudioDecoder::new(
                    track.sample_rate,
                    track.is_stereo(),
                    track.transform(),
                )?,
                queue: Vec::new(),
            });
        }

        debug!(
            "会话已打开: {} 帧, {} 条音轨",
            header.frame_count,
            audio.len()
        );
        Ok(Self {
            io,
            header,
            video,
            audio,
            cursor: 0,
        })
    }

    /// 总帧数
    pub fn frame_count(&self) -> u32 {
        self.header.frame_count
    }

    /// 下一个要解码的帧序号
    pub fn current_frame_index(&self) -> usize {
        self.cursor
    }

    /// 帧率
    pub fn frame_rate(&self) -> Rational {
        Rational::new(self.header.fps_num, self.header.fps_den)
    }

    /// 视频尺寸 (宽, 高)
    pub fn frame_size(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    /// 音轨数量
    pub fn audio_track_count(&self) -> usize {
        self.audio.len()
    }

    /// 音轨参数
    pub fn audio_track_info(&self, track: usize) -> Option<AudioTrackInfo> {
        let t = self.audio.get(track)?;
        let dec = &t.decoder;
        // 一个视频帧时长内产生的样本数 (含声道)
        let per_frame = u64::from(dec.sample_rate())
            * dec.channels() as u64
            * u64::from(self.header.fps_den)
            / u64::from(self.header.fps_num);
        let blocks = per_frame.div_ceil(dec.block_size() as u64) + 1;
        Some(AudioTrackInfo {
            sample_rate: dec.sample_rate(),
            channels: dec.channels(),
            ideal_buffer_bytes: blocks as usize * dec.block_size() * 2,
        })
    }

    /// 定位到指定帧 (只重置游标与音频重叠状态)
    pub fn seek(&mut self, frame_index: usize) -> BinkResult<()> {
        if frame_index >= self.header.frame_count as usize {
            return Err(BinkError::InvalidArgument(format!(
                "帧序号 {} 超出范围 (共 {} 帧)",
                frame_index, self.header.frame_count
            )));
        }
        self.cursor = frame_index;
        for t in self.audio.iter_mut() {
            t.decoder.reset();
            t.queue.clear();
        }
        Ok(())
    }

    /// 解码下一帧
    ///
    /// 帧内音轨数据包顺带解码进各轨队列 (经 [`read_audio`](Self::read_audio)
    /// 取走). 视频解码失败时已展示的平面保持不变, 游标不前进.
    pub fn decode_next_frame(&mut self) -> BinkResult<FrameView<'_>> {
        let frame_index = self.cursor;
        let Some((start, end)) = self.header.frame_range(frame_index) else {
            return Err(BinkError::Eof);
        };
        self.io.seek(SeekFrom::Start(start))?;
        let mut remaining = (end - start) as usize;

        // 帧内先是每条音轨的数据包
        for (i, track) in self.audio.iter_mut().enumerate() {
            if remaining < 4 {
                return Err(BinkError::InvalidData(format!(
                    "第 {} 帧在音轨 {} 的包头前截断",
                    frame_index, i
                )));
            }
            let packet_size = self.io.read_u32_le()? as usize;
            remaining -= 4;
            if packet_size > remaining {
                return Err(BinkError::InvalidData(format!(
                    "第 {} 帧音轨 {} 的包大小 {} 超出帧范围",
                    frame_index, i, packet_size
                )));
            }
            if packet_size >= 4 {
                let decoded_bytes = self.io.read_u32_le()? as usize;
                let data = Bytes::from(self.io.read_bytes(packet_size - 4)?);
                let pcm = track.decoder.decode_packet(&data, decoded_bytes)?;
                track.queue.extend_from_slice(&pcm);
            } else if packet_size > 0 {
                // 空包只做占位
                self.io.skip(packet_size)?;
            }
            remaining -= packet_size;
        }

        let packet = Bytes::from(self.io.read_bytes(remaining)?);
        self.video.decode_frame(&packet)?;
        self.cursor += 1;

        let planes = (0..self.video.plane_count())
            .map(|i| self.video.plane_view(i).expect("平面索引在范围内"))
            .collect();
        Ok(FrameView {
            planes,
            frame_index,
            keyframe: self.header.index[frame_index].keyframe,
        })
    }

    /// 从音轨队列取走已解码的 PCM (小端 s16), 返回复制的字节数
    pub fn read_audio(&mut self, track: usize, out: &mut [u8]) -> BinkResult<usize> {
        let Some(t) = self.audio.get_mut(track) else {
            return Err(BinkError::InvalidArgument(format!("音轨 {} 不存在", track)));
        };
        let samples = (out.len() / 2).min(t.queue.len());
        for (i, s) in t.queue.drain(..samples).enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&s.to_le_bytes());
        }
        if samples == 0 && !out.is_empty() {
            warn!("音轨 {} 队列为空", track);
        }
        Ok(samples * 2)
    }

    /// 关闭会话 (等价于释放)
    pub fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use bink_core::bitwriter::BitWriter;

    /// 合成 8x8 灰度 FILL 帧的视频包 (版本 i)
    fn build_fill_packet(v: u8) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 32); // 版本 i 的平面大小字段
        // 块类型/子块类型树
        bw.write_bits(0, 4);
        bw.write_bits(0, 4);
        // 颜色: 16 棵高位树 + 自身树
        for _ in 0..17 {
            bw.write_bits(0, 4);
        }
        // 图案, X, Y, 游程树
        for _ in 0..4 {
            bw.write_bits(0, 4);
        }
        // 9 个 bundle 的行数据 (宽 8 时长度字段均为 10 位, 子块类型 9 位)
        bw.write_bits(1, 10); // 块类型: 1 个
        bw.write_bit(0);
        bw.write_bits(6, 4); // FILL
        bw.write_bits(0, 9); // 子块类型
        bw.write_bits(1, 10); // 颜色: 1 个
        bw.write_bit(1);
        bw.write_bits(u32::from(v >> 4), 4);
        bw.write_bits(u32::from(v & 0xF), 4);
        for _ in 0..6 {
            bw.write_bits(0, 10); // 图案, X, Y, 两个 DC, 游程
        }
        bw.align32();
        bw.finish()
    }

    /// 合成单帧的灰度容器文件
    fn build_single_frame_file(v: u8) -> Vec<u8> {
        let packet = build_fill_packet(v);
        let mut data = Vec::new();
        data.extend_from_slice(b"BIKi");
        data.extend_from_slice(&0u32.to_le_bytes()); // 文件大小, 稍后回填
        data.extend_from_slice(&1u32.to_le_bytes()); // 帧数
        data.extend_from_slice(&(packet.len() as u32).to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes()); // 宽
        data.extend_from_slice(&8u32.to_le_bytes()); // 高
        data.extend_from_slice(&25u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0x0002_0000u32.to_le_bytes()); // 灰度
        data.extend_from_slice(&0u32.to_le_bytes()); // 无音轨
        let start = data.len() as u32 + 8;
        data.extend_from_slice(&(start | 1).to_le_bytes());
        data.extend_from_slice(&(start + packet.len() as u32).to_le_bytes());
        data.extend_from_slice(&packet);
        let total = data.len() as u32;
        data[4..8].copy_from_slice(&(total - 8).to_le_bytes());
        data
    }

    #[test]
    fn test_decode_single_frame() {
        let file = build_single_frame_file(0x42);
        let mut session = BinkSession::open_io(IoContext::from_memory(file)).unwrap();
        assert_eq!(session.frame_count(), 1);
        assert_eq!(session.frame_size(), (8, 8));
        assert_eq!(session.frame_rate().to_f64(), 25.0);
        assert_eq!(session.audio_track_count(), 0);

        let view = session.decode_next_frame().unwrap();
        assert_eq!(view.frame_index, 0);
        assert!(view.keyframe);
        let luma = &view.planes[0];
        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(luma.data[row * luma.pitch + col], 0x42);
            }
        }
        assert_eq!(session.current_frame_index(), 1);
        assert!(matches!(session.decode_next_frame(), Err(BinkError::Eof)));
    }

    #[test]
    fn test_seek_and_redecode_is_deterministic() {
        let file = build_single_frame_file(0x7E);
        let mut session = BinkSession::open_io(IoContext::from_memory(file)).unwrap();
        let first: Vec<u8> = {
            let view = session.decode_next_frame().unwrap();
            view.planes[0].data.to_vec()
        };
        session.seek(0).unwrap();
        assert_eq!(session.current_frame_index(), 0);
        let second: Vec<u8> = {
            let view = session.decode_next_frame().unwrap();
            view.planes[0].data.to_vec()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_seek_out_of_range() {
        let file = build_single_frame_file(0);
        let mut session = BinkSession::open_io(IoContext::from_memory(file)).unwrap();
        assert!(matches!(
            session.seek(1),
            Err(BinkError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_truncated_file_fails_cleanly() {
        let mut file = build_single_frame_file(0x42);
        file.truncate(file.len() - 8);
        let mut session = BinkSession::open_io(IoContext::from_memory(file)).unwrap();
        assert!(session.decode_next_frame().is_err());
        // 游标未前进, 可以重试
        assert_eq!(session.current_frame_index(), 0);
    }

    #[test]
    fn test_short_audio_packet_skipped_as_padding() {
        // 小于 4 字节的音轨包是占位填充: 跳过后视频照常解码
        let packet = build_fill_packet(0x33);
        let mut frame = Vec::new();
        frame.extend_from_slice(&2u32.to_le_bytes());
        frame.extend_from_slice(&[0u8; 2]);
        frame.extend_from_slice(&packet);

        let mut data = Vec::new();
        data.extend_from_slice(b"BIKi");
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&8u32.to_le_bytes());
        data.extend_from_slice(&25u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&0x0002_0000u32.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes()); // 1 条音轨
        data.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&11025u16.to_le_bytes());
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&0u32.to_le_bytes());
        let start = data.len() as u32 + 8;
        data.extend_from_slice(&(start | 1).to_le_bytes());
        data.extend_from_slice(&(start + frame.len() as u32).to_le_bytes());
        data.extend_from_slice(&frame);
        let total = data.len() as u32;
        data[4..8].copy_from_slice(&(total - 8).to_le_bytes());

        let mut session = BinkSession::open_io(IoContext::from_memory(data)).unwrap();
        {
            let view = session.decode_next_frame().unwrap();
            assert_eq!(view.planes[0].data[0], 0x33);
        }
        let mut buf = [0u8; 32];
        assert_eq!(session.read_audio(0, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_read_audio_on_missing_track() {
        let file = build_single_frame_file(0);
        let mut session = BinkSession::open_io(IoContext::from_memory(file)).unwrap();
        let mut buf = [0u8; 16];
        assert!(session.read_audio(0, &mut buf).is_err());
        assert!(session.audio_track_info(0).is_none());
    }
}
