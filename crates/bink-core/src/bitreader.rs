//! 比特流读取器.
//!
//! 提供从字节缓冲区中按位读取数据的能力, 是视频包与音频包解码的
//! 基础设施.
//!
//! 按小端位序读取 (LSB first): 每个字节内先消费最低位, 字节按流序
//! 消费. 这与 FLAC/H.264 等常见的大端位序相反, 是本容器格式的约定.

use crate::{BinkError, BinkResult};

/// 比特流读取器
///
/// 从字节缓冲区中按位读取数据, 使用小端位序 (LSB first).
///
/// 读取超出缓冲区末尾立即返回 [`BinkError::Eof`], 表示包被截断,
/// 调用方应放弃当前帧的解码.
///
/// # 示例
/// ```
/// use bink_core::bitreader::BitReader;
///
/// let data = [0b1011_0001, 0b0101_0101];
/// let mut br = BitReader::new(&data);
/// assert_eq!(br.read_bits(4).unwrap(), 0b0001);
/// assert_eq!(br.read_bits(4).unwrap(), 0b1011);
/// assert_eq!(br.read_bits(8).unwrap(), 0b0101_0101);
/// ```
pub struct BitReader<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前字节索引
    byte_pos: usize,
    /// 当前字节中的位位置 (0-7, 0 表示最低位)
    bit_pos: u8,
}

impl<'a> BitReader<'a> {
    /// 创建新的比特流读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_pos: 0,
        }
    }

    /// 获取已读取的总位数
    pub fn bits_read(&self) -> usize {
        self.byte_pos * 8 + self.bit_pos as usize
    }

    /// 获取总位数
    pub fn size_bits(&self) -> usize {
        self.data.len() * 8
    }

    /// 获取剩余可读位数
    pub fn bits_left(&self) -> usize {
        if self.byte_pos >= self.data.len() {
            return 0;
        }
        (self.data.len() - self.byte_pos) * 8 - self.bit_pos as usize
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> BinkResult<u32> {
        if self.byte_pos >= self.data.len() {
            return Err(BinkError::Eof);
        }

        let bit = (self.data[self.byte_pos] >> self.bit_pos) & 1;
        self.bit_pos += 1;
        if self.bit_pos >= 8 {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }

        Ok(u32::from(bit))
    }

    /// 读取 1 个位并转换为布尔值
    pub fn read_bool(&mut self) -> BinkResult<bool> {
        Ok(self.read_bit()? != 0)
    }

    /// 读取 N 个位 (最多 32 位)
    ///
    /// 按小端位序读取, 先读到的位占据返回值的低位.
    pub fn read_bits(&mut self, n: u32) -> BinkResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(BinkError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n,
            )));
        }
        if (n as usize) > self.bits_left() {
            return Err(BinkError::Eof);
        }

        let mut result: u32 = 0;
        let mut done = 0u32;

        while done < n {
            let available = 8 - u32::from(self.bit_pos);
            let to_read = (n - done).min(available);

            // 从当前字节的低位端提取位
            let mask = ((1u32 << to_read) - 1) as u8;
            let bits = (self.data[self.byte_pos] >> self.bit_pos) & mask;

            result |= u32::from(bits) << done;

            self.bit_pos += to_read as u8;
            if self.bit_pos >= 8 {
                self.bit_pos = 0;
                self.byte_pos += 1;
            }
            done += to_read;
        }

        Ok(result)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> BinkResult<()> {
        if (n as usize) > self.bits_left() {
            return Err(BinkError::Eof);
        }
        let pos = self.bits_read() + n as usize;
        self.byte_pos = pos / 8;
        self.bit_pos = (pos % 8) as u8;
        Ok(())
    }

    /// 跳到下一个 32 位边界
    ///
    /// 每个平面的数据以及每个音频块都从 32 位边界开始.
    /// 已对齐时不消费任何位; 数据在边界前结束时停在数据末尾.
    pub fn align32(&mut self) {
        let rem = self.bits_read() % 32;
        if rem != 0 {
            let skip = (32 - rem).min(self.bits_left());
            let pos = self.bits_read() + skip;
            self.byte_pos = pos / 8;
            self.bit_pos = (pos % 8) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_order() {
        // 0xB1 = 1011_0001: 低位在前逐位读出 1,0,0,0,1,1,0,1
        let data = [0xB1];
        let mut br = BitReader::new(&data);
        let expect = [1, 0, 0, 0, 1, 1, 0, 1];
        for e in expect {
            assert_eq!(br.read_bit().unwrap(), e);
        }
        assert!(br.read_bit().is_err());
    }

    #[test]
    fn test_read_bits_across_bytes() {
        let data = [0x34, 0x12];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(16).unwrap(), 0x1234);
    }

    #[test]
    fn test_position_invariant() {
        // 任意读取序列后 bits_read 等于消费位数之和
        let data = [0xAA; 16];
        let mut br = BitReader::new(&data);
        let widths = [1u32, 3, 7, 8, 13, 32, 5, 2];
        let mut total = 0usize;
        for w in widths {
            br.read_bits(w).unwrap();
            total += w as usize;
            assert_eq!(br.bits_read(), total);
        }
        assert_eq!(br.bits_left(), 128 - total);
    }

    #[test]
    fn test_eof_is_fatal() {
        let data = [0xFF, 0xFF];
        let mut br = BitReader::new(&data);
        br.read_bits(10).unwrap();
        assert!(matches!(br.read_bits(7), Err(BinkError::Eof)));
        // 失败读取不移动位置
        assert_eq!(br.bits_read(), 10);
        assert_eq!(br.read_bits(6).unwrap() & 0x3F, 0x3F);
    }

    #[test]
    fn test_align32() {
        let data = [0u8; 8];
        let mut br = BitReader::new(&data);
        br.read_bits(5).unwrap();
        br.align32();
        assert_eq!(br.bits_read(), 32);
        // 已对齐时不消费
        br.align32();
        assert_eq!(br.bits_read(), 32);
    }

    #[test]
    fn test_align32_clamps_at_end() {
        let data = [0u8; 2];
        let mut br = BitReader::new(&data);
        br.read_bits(5).unwrap();
        br.align32();
        assert_eq!(br.bits_left(), 0);
    }

    #[test]
    fn test_skip_bits() {
        let data = [0x00, 0xFF];
        let mut br = BitReader::new(&data);
        br.skip_bits(8).unwrap();
        assert_eq!(br.read_bits(8).unwrap(), 0xFF);
        assert!(br.skip_bits(1).is_err());
    }
}
