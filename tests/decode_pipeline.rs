//! 端到端集成测试: 合成容器文件的完整解码管线.
//!
//! 测试流程: 合成视频/音频码流 → 拼装容器 → 打开会话 → 解码 → 验证,
//! 覆盖文件与内存两种字节源以及定位后的重新解码.

use std::io::Write;

use bink::core::bitwriter::BitWriter;
use bink::{BinkSession, IoContext};

/// 合成 8x8 灰度 FILL 帧的视频包 (版本 i, 单块填充色 `v`)
fn build_fill_packet(v: u8) -> Vec<u8> {
    let mut bw = BitWriter::new();
    bw.write_bits(0, 32); // 版本 i 的平面大小字段
    // 块类型/子块类型树, 17 棵颜色树, 图案/X/Y/游程树, 全部恒等
    for _ in 0..23 {
        bw.write_bits(0, 4);
    }
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

/// 合成一个全零频谱的音频块 (11025 Hz 单声道实数 DFT 轨)
///
/// frame_len 512, 20 个子带, 输出 480 个样本的静音.
fn build_silent_audio_bitstream() -> Vec<u8> {
    let mut bw = BitWriter::new();
    for _ in 0..2 {
        // 原始浮点: 5 位指数 + 23 位尾数 + 符号
        bw.write_bits(0, 5);
        bw.write_bits(0, 23);
        bw.write_bit(0);
    }
    for _ in 0..20 {
        bw.write_bits(0, 8); // 子带量化级
    }
    let mut i = 2usize;
    while i < 512 {
        bw.write_bit(0); // 基础步长 8
        bw.write_bits(0, 4); // 位宽 0 -> 零填充
        i += 8;
    }
    bw.align32();
    bw.finish()
}

/// 拼装单帧容器: 一条音轨 + 灰度视频
fn build_test_file(fill: u8) -> Vec<u8> {
    let video = build_fill_packet(fill);
    let audio = build_silent_audio_bitstream();

    let mut frame = Vec::new();
    frame.extend_from_slice(&((audio.len() + 4) as u32).to_le_bytes()); // 音频包大小
    frame.extend_from_slice(&(480u32 * 2).to_le_bytes()); // 解码后字节数
    frame.extend_from_slice(&audio);
    frame.extend_from_slice(&video);

    let mut data = Vec::new();
    data.extend_from_slice(b"BIKi");
    data.extend_from_slice(&0u32.to_le_bytes()); // 文件大小, 稍后回填
    data.extend_from_slice(&1u32.to_le_bytes()); // 帧数
    data.extend_from_slice(&(frame.len() as u32).to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&8u32.to_le_bytes()); // 宽
    data.extend_from_slice(&8u32.to_le_bytes()); // 高
    data.extend_from_slice(&25u32.to_le_bytes()); // 帧率
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&0x0002_0000u32.to_le_bytes()); // 灰度
    data.extend_from_slice(&1u32.to_le_bytes()); // 1 条音轨
    data.extend_from_slice(&0u32.to_le_bytes()); // 未知字段
    data.extend_from_slice(&11025u16.to_le_bytes()); // 采样率
    data.extend_from_slice(&0u16.to_le_bytes()); // 标志: 单声道 DFT
    data.extend_from_slice(&0u32.to_le_bytes()); // 音轨 ID
    let start = data.len() as u32 + 8;
    data.extend_from_slice(&(start | 1).to_le_bytes());
    data.extend_from_slice(&(start + frame.len() as u32).to_le_bytes());
    data.extend_from_slice(&frame);
    let total = data.len() as u32;
    data[4..8].copy_from_slice(&(total - 8).to_le_bytes());
    data
}

#[test]
fn test_full_pipeline_from_file() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fill.bik");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(&build_test_file(0x42))
        .unwrap();

    let mut session = BinkSession::open(path.to_str().unwrap()).unwrap();
    assert_eq!(session.frame_count(), 1);
    assert_eq!(session.frame_size(), (8, 8));
    assert_eq!(session.audio_track_count(), 1);

    let info = session.audio_track_info(0).unwrap();
    assert_eq!(info.sample_rate, 11025);
    assert_eq!(info.channels, 1);
    assert!(info.ideal_buffer_bytes >= 480 * 2);

    {
        let frame = session.decode_next_frame().unwrap();
        assert!(frame.keyframe);
        let luma = &frame.planes[0];
        assert_eq!(luma.width, 8);
        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(luma.data[row * luma.pitch + col], 0x42);
            }
        }
        // 灰度流的色度平面保持中性
        assert!(frame.planes[1].data.iter().all(|&p| p == 0x80));
    }

    // 帧内的音频包已解码入队: 480 个静音样本
    let mut pcm = vec![0xAAu8; 480 * 2];
    let n = session.read_audio(0, &mut pcm).unwrap();
    assert_eq!(n, 480 * 2);
    assert!(pcm.iter().all(|&b| b == 0));
}

#[test]
fn test_seek_redecode_matches_first_pass() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut session = BinkSession::open_io(IoContext::from_memory(build_test_file(0x7E))).unwrap();
    let first = session.decode_next_frame().unwrap().planes[0].data.to_vec();

    session.seek(0).unwrap();
    let second = session.decode_next_frame().unwrap().planes[0].data.to_vec();
    assert_eq!(first, second);

    // 定位清空了音频队列, 重新解码后再次可取
    let mut pcm = vec![0u8; 64];
    let n = session.read_audio(0, &mut pcm).unwrap();
    assert_eq!(n, 64);
}

#[test]
fn test_open_rejects_garbage() {
    let result = BinkSession::open_io(IoContext::from_memory(vec![0u8; 64]));
    assert!(result.is_err());
}
