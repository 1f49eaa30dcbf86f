//! 比特流写入器.
//!
//! 向字节缓冲区按位写入数据, 与 BitReader 相同的小端位序 (LSB first).
//!
//! 解码库本身没有编码路径, 写入器用于测试中合成符合格式约定的码流.

/// 比特流写入器
///
/// 向字节缓冲区按位写入数据, 使用小端位序 (LSB first).
///
/// # 示例
/// ```
/// use bink_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(0b0001, 4);
/// bw.write_bits(0b1011, 4);
/// let data = bw.finish();
/// assert_eq!(data, vec![0b1011_0001]);
/// ```
#[derive(Default)]
pub struct BitWriter {
    /// 输出缓冲区
    data: Vec<u8>,
    /// 当前字节 (正在填充)
    current_byte: u8,
    /// 当前字节中已填充的位数 (0-7)
    bit_count: u8,
}

impl BitWriter {
    /// 创建新的比特流写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取已写入的总位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.bit_count as usize
    }

    /// 写入 1 个位
    pub fn write_bit(&mut self, bit: u32) {
        self.current_byte |= ((bit & 1) as u8) << self.bit_count;
        self.bit_count += 1;
        if self.bit_count >= 8 {
            self.data.push(self.current_byte);
            self.current_byte = 0;
            self.bit_count = 0;
        }
    }

    /// 写入 N 个位 (最多 32 位), 值的低 N 位有效
    pub fn write_bits(&mut self, value: u32, n: u32) {
        for i in 0..n {
            self.write_bit((value >> i) & 1);
        }
    }

    /// 用零位填充到下一个 32 位边界
    pub fn align32(&mut self) {
        while self.bits_written() % 32 != 0 {
            self.write_bit(0);
        }
    }

    /// 结束写入, 返回字节缓冲区 (末尾不足一字节的部分补零)
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.data.push(self.current_byte);
        }
        self.data
    }
}
