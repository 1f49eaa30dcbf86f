//! 子带量化音频解码.
//!
//! 音频以块为单位编码: 每块携带每个声道的完整频谱 (两个原始浮点
//! 低频系数 + 按临界频带量化的系数游程), 经逆变换回时域后与上一块
//! 的尾部做整数重叠相加, 消除块边界的不连续.
//!
//! 实数 DFT 变种把多声道预交织进同一条流 (采样率乘以声道数,
//! 频谱加倍), 解码端始终按单声道处理; DCT 变种每声道独立编码.

mod transform;

use bink_core::bitreader::BitReader;
use bink_core::{BinkError, BinkResult};
use log::warn;

/// 逆变换类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTransform {
    /// 紧凑半谱的逆实数 DFT (声道预交织)
    Rdft,
    /// DCT-III (每声道独立)
    Dct,
}

/// 临界频带边界 (Hz), 用于把频谱划分为量化子带
const CRITICAL_FREQS: [u32; 25] = [
    100, 200, 300, 400, 510, 630, 770, 920, 1080, 1270, 1480, 1720, 2000, 2320, 2700, 3150, 3700,
    4400, 5300, 6400, 7700, 9500, 12000, 15500, 24500,
];

/// 系数游程长度扩展表 (基础步长 8 的倍数)
const RUN_LENGTHS: [usize; 16] = [2, 3, 4, 5, 6, 8, 9, 10, 11, 12, 13, 14, 15, 16, 32, 64];

/// 量化阶指数底数
const QUANT_STEP: f64 = 0.152_891_647_872_219_538_23;

/// Bink 音频解码器 (单轨)
///
/// 一个实例对应容器中的一条音轨, 跨数据包保持重叠相加状态.
pub struct BinkAudioDecoder {
    transform: AudioTransform,
    /// 对外声道数
    out_channels: usize,
    /// 解码内部声道数 (DFT 变种折叠为 1)
    channels: usize,
    /// 对外采样率
    sample_rate: u32,
    frame_len: usize,
    overlap_len: usize,
    /// 每块输出的样本数 (含全部声道)
    block_size: usize,
    num_bands: usize,
    /// 子带在频谱中的起始下标, 末项为 frame_len
    bands: Vec<usize>,
    /// 归一化系数 (已并入量化表)
    root: f32,
    quant_table: [f32; 96],
    /// 上一块末尾 overlap 区的样本
    previous: Vec<i16>,
    /// 首块不做重叠相加
    first: bool,
}

impl BinkAudioDecoder {
    /// 按音轨参数创建解码器
    pub fn new(sample_rate: u32, stereo: bool, transform: AudioTransform) -> BinkResult<Self> {
        if sample_rate == 0 || sample_rate > 192_000 {
            return Err(BinkError::InvalidArgument(format!(
                "非法的采样率: {}",
                sample_rate
            )));
        }

        let out_channels = if stereo { 2 } else { 1 };
        let mut frame_len_bits: u32 = if sample_rate >= 44100 {
            11
        } else if sample_rate >= 22050 {
            10
        } else {
            9
        };

        let mut rate = sample_rate;
        let mut channels = out_channels;
        if transform == AudioTransform::Rdft && channels > 1 {
            // 声道已预交织: 按加倍的采样率和频谱当单声道解
            rate *= channels as u32;
            frame_len_bits += (channels as u32).ilog2();
            channels = 1;
        }

        let frame_len = 1usize << frame_len_bits;
        let overlap_len = frame_len / 16;
        let block_size = (frame_len - overlap_len) * channels;

        let root = match transform {
            AudioTransform::Rdft => 2.0 / ((frame_len as f64).sqrt() * 32768.0),
            AudioTransform::Dct => frame_len as f64 / ((frame_len as f64).sqrt() * 32768.0),
        };
        let quant_table: [f32; 96] =
            std::array::from_fn(|i| ((i as f64 * QUANT_STEP).exp() * root) as f32);

        let sample_rate_half = (rate + 1) / 2;
        let mut num_bands = CRITICAL_FREQS.len();
        for (idx, &freq) in CRITICAL_FREQS.iter().enumerate() {
            if sample_rate_half <= freq {
                num_bands = idx + 1;
                break;
            }
        }

        let mut bands = vec![0usize; num_bands + 1];
        bands[0] = 2;
        for i in 1..num_bands {
            let b = CRITICAL_FREQS[i - 1] as u64 * frame_len as u64 / u64::from(sample_rate_half);
            bands[i] = (b as usize) & !1;
        }
        bands[num_bands] = frame_len;

        Ok(Self {
            transform,
            out_channels,
            channels,
            sample_rate,
            frame_len,
            overlap_len,
            block_size,
            num_bands,
            bands,
            root: root as f32,
            quant_table,
            previous: vec![0; overlap_len * channels],
            first: true,
        })
    }

    /// 对外采样率
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 对外声道数
    pub fn channels(&self) -> usize {
        self.out_channels
    }

    /// 每块输出的样本数 (含全部声道)
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// 丢弃重叠状态 (定位后调用, 避免跨越定位点的串音)
    pub fn reset(&mut self) {
        self.first = true;
        self.previous.fill(0);
    }

    /// 解码一个完整音频数据包
    ///
    /// `expected_bytes` 是包头声明的解码后字节数 (s16 样本).
    /// 块逐个解码, 块间对齐到 32 位; 码流多出的样本截断并告警.
    pub fn decode_packet(&mut self, data: &[u8], expected_bytes: usize) -> BinkResult<Vec<i16>> {
        let expected_samples = expected_bytes / 2;
        let mut out = Vec::with_capacity(expected_samples);
        let mut br = BitReader::new(data);

        while out.len() < expected_samples && br.bits_left() > 0 {
            let budget = expected_samples - out.len();
            self.decode_block(&mut br, &mut out, budget)?;
            br.align32();
        }
        Ok(out)
    }

    /// 读取一个原始浮点数: 5 位指数 + 23 位尾数 + 符号位
    fn read_float(br: &mut BitReader) -> BinkResult<f32> {
        let power = br.read_bits(5)? as i32;
        let mantissa = br.read_bits(23)?;
        let f = (f64::from(mantissa) * f64::powi(2.0, power - 23)) as f32;
        Ok(if br.read_bool()? { -f } else { f })
    }

    /// 解码一个音频块并把至多 `budget` 个样本追加到 `out`
    fn decode_block(
        &mut self,
        br: &mut BitReader,
        out: &mut Vec<i16>,
        budget: usize,
    ) -> BinkResult<()> {
        if self.transform == AudioTransform::Dct {
            br.skip_bits(2)?;
        }

        let mut coeffs = vec![vec![0f32; self.frame_len]; self.channels];
        let mut quants = [0f32; 25];

        for c in coeffs.iter_mut() {
            c[0] = Self::read_float(br)? * self.root;
            c[1] = Self::read_float(br)? * self.root;

            for q in quants.iter_mut().take(self.num_bands) {
                let idx = br.read_bits(8)? as usize;
                *q = self.quant_table[idx.min(95)];
            }

            let mut k = 0usize;
            let mut q = quants[0];
            let mut i = 2usize;
            while i < self.frame_len {
                let j = if br.read_bool()? {
                    i + RUN_LENGTHS[br.read_bits(4)? as usize] * 8
                } else {
                    i + 8
                };
                let j = j.min(self.frame_len);

                let width = br.read_bits(4)?;
                if width == 0 {
                    i = j;
                    while k < self.num_bands && self.bands[k] < i {
                        q = quants[k];
                        k += 1;
                    }
                } else {
                    while i < j {
                        if k < self.num_bands && self.bands[k] == i {
                            q = quants[k];
                            k += 1;
                        }
                        let coeff = br.read_bits(width)?;
                        if coeff != 0 {
                            let v = q * coeff as f32;
                            c[i] = if br.read_bool()? { -v } else { v };
                        }
                        i += 1;
                    }
                }
            }

            match self.transform {
                AudioTransform::Rdft => transform::inverse_rdft(c),
                AudioTransform::Dct => transform::inverse_dct3(c),
            }
        }

        // 交织并截断到 s16
        let total = self.frame_len * self.channels;
        let mut frame = vec![0i16; total];
        for (ch, c) in coeffs.iter().enumerate() {
            for (i, &v) in c.iter().enumerate() {
                frame[i * self.channels + ch] = (v.round() as i32).clamp(-32768, 32767) as i16;
            }
        }

        // 与上一块尾部做整数重叠相加
        let count = self.overlap_len * self.channels;
        if self.first {
            self.first = false;
        } else {
            let shift = count.trailing_zeros();
            for i in 0..count {
                let mixed = i32::from(self.previous[i]) * (count - i) as i32
                    + i32::from(frame[i]) * i as i32;
                frame[i] = (mixed >> shift) as i16;
            }
        }
        self.previous.copy_from_slice(&frame[self.block_size..]);

        let emit = self.block_size.min(budget);
        if emit < self.block_size {
            warn!(
                "音频输出缓冲不足, 截断 {} 个样本",
                self.block_size - emit
            );
        }
        out.extend_from_slice(&frame[..emit]);
        Ok(())
    }
}
