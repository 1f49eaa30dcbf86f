//! VLC (变长前缀码) 符号解码.
//!
//! 整个容器格式只使用 16 套固定的 4 位符号前缀码 ("树形状"),
//! 每套 16 个叶子. 形状 0 是平坦的定长 4 位码, 其余形状码长 1-7 位.
//! 本模块在进程内一次性构建全部 16 张解码表, 之后所有 bundle 的
//! 符号解码共享这些只读表.
//!
//! 码字按小端位序匹配: 先从码流读到的位对应码字的最低位.

use std::sync::OnceLock;

use bink_core::bitreader::BitReader;
use bink_core::{BinkError, BinkResult};

/// 16 套树形状的码字长度 (单位: 位)
const TREE_LENS: [[u8; 16]; 16] = [
    [4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4],
    [1, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5],
    [2, 2, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5],
    [2, 3, 3, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5],
    [3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5, 5, 5],
    [3, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5],
    [2, 4, 4, 4, 4, 4, 4, 4, 4, 4, 5, 5, 5, 5, 5, 5],
    [1, 3, 3, 5, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6],
    [1, 2, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6],
    [1, 3, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6],
    [2, 2, 3, 4, 4, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6],
    [1, 4, 4, 4, 4, 5, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6],
    [2, 2, 2, 5, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6],
    [1, 3, 3, 3, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7, 7, 7],
    [1, 3, 3, 3, 5, 6, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7],
    [2, 2, 3, 3, 3, 6, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7],
];

/// 16 套树形状的码字 (按小端位序解释)
const TREE_CODES: [[u8; 16]; 16] = [
    [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E,
        0x0F,
    ],
    [
        0x00, 0x01, 0x03, 0x05, 0x07, 0x09, 0x0B, 0x0D, 0x0F, 0x13, 0x15, 0x17, 0x19, 0x1B, 0x1D,
        0x1F,
    ],
    [
        0x00, 0x02, 0x01, 0x09, 0x05, 0x15, 0x0D, 0x1D, 0x03, 0x13, 0x0B, 0x1B, 0x07, 0x17, 0x0F,
        0x1F,
    ],
    [
        0x00, 0x02, 0x06, 0x01, 0x09, 0x05, 0x0D, 0x1D, 0x03, 0x13, 0x0B, 0x1B, 0x07, 0x17, 0x0F,
        0x1F,
    ],
    [
        0x00, 0x04, 0x02, 0x06, 0x01, 0x09, 0x05, 0x0D, 0x03, 0x13, 0x0B, 0x1B, 0x07, 0x17, 0x0F,
        0x1F,
    ],
    [
        0x00, 0x04, 0x02, 0x0A, 0x06, 0x0E, 0x01, 0x09, 0x05, 0x0D, 0x03, 0x0B, 0x07, 0x17, 0x0F,
        0x1F,
    ],
    [
        0x00, 0x02, 0x0A, 0x06, 0x0E, 0x01, 0x09, 0x05, 0x0D, 0x03, 0x0B, 0x1B, 0x07, 0x17, 0x0F,
        0x1F,
    ],
    [
        0x00, 0x01, 0x05, 0x03, 0x13, 0x0B, 0x1B, 0x3B, 0x07, 0x27, 0x17, 0x37, 0x0F, 0x2F, 0x1F,
        0x3F,
    ],
    [
        0x00, 0x01, 0x03, 0x13, 0x0B, 0x2B, 0x1B, 0x3B, 0x07, 0x27, 0x17, 0x37, 0x0F, 0x2F, 0x1F,
        0x3F,
    ],
    [
        0x00, 0x01, 0x05, 0x0D, 0x03, 0x13, 0x0B, 0x1B, 0x07, 0x27, 0x17, 0x37, 0x0F, 0x2F, 0x1F,
        0x3F,
    ],
    [
        0x00, 0x02, 0x01, 0x05, 0x0D, 0x03, 0x13, 0x0B, 0x1B, 0x07, 0x17, 0x37, 0x0F, 0x2F, 0x1F,
        0x3F,
    ],
    [
        0x00, 0x01, 0x09, 0x05, 0x0D, 0x03, 0x13, 0x0B, 0x1B, 0x07, 0x17, 0x37, 0x0F, 0x2F, 0x1F,
        0x3F,
    ],
    [
        0x00, 0x02, 0x01, 0x03, 0x13, 0x0B, 0x1B, 0x3B, 0x07, 0x27, 0x17, 0x37, 0x0F, 0x2F, 0x1F,
        0x3F,
    ],
    [
        0x00, 0x01, 0x05, 0x03, 0x07, 0x27, 0x17, 0x37, 0x0F, 0x4F, 0x2F, 0x6F, 0x1F, 0x5F, 0x3F,
        0x7F,
    ],
    [
        0x00, 0x01, 0x05, 0x03, 0x07, 0x17, 0x37, 0x77, 0x0F, 0x4F, 0x2F, 0x6F, 0x1F, 0x5F, 0x3F,
        0x7F,
    ],
    [
        0x00, 0x02, 0x01, 0x05, 0x03, 0x07, 0x27, 0x17, 0x37, 0x0F, 0x2F, 0x6F, 0x1F, 0x5F, 0x3F,
        0x7F,
    ],
];

/// 单张 VLC 解码表 (二叉树的数组表示)
///
/// 每个节点 = `[bit0_child, bit1_child]`:
/// 正值为子节点索引, 负值为叶子, 符号值 = `-(value + 1)`.
pub struct VlcTable {
    nodes: Vec<[i16; 2]>,
}

impl VlcTable {
    /// 从 (码字, 码长) 表构建解码树
    ///
    /// 码字按小端位序插入: 码字的最低位是最先消费的分支.
    fn build(codes: &[u8; 16], lens: &[u8; 16]) -> Self {
        let mut nodes = vec![[0i16; 2]]; // 根节点
        for (sym, (&code, &len)) in codes.iter().zip(lens.iter()).enumerate() {
            let leaf = -(sym as i16 + 1);
            let mut idx = 0usize;
            for bit_pos in 0..len {
                let bit = ((code >> bit_pos) & 1) as usize;
                if bit_pos == len - 1 {
                    nodes[idx][bit] = leaf;
                } else if nodes[idx][bit] > 0 {
                    idx = nodes[idx][bit] as usize;
                } else {
                    let new_idx = nodes.len();
                    nodes.push([0; 2]);
                    nodes[idx][bit] = new_idx as i16;
                    idx = new_idx;
                }
            }
        }
        Self { nodes }
    }

    /// 从比特流解码一个叶子索引 (0-15)
    ///
    /// 返回的是叶子序号, 尚未经过 bundle 树的符号置换.
    pub fn decode_symbol(&self, br: &mut BitReader) -> BinkResult<u8> {
        let mut idx = 0usize;
        // 最长码字 7 位
        for _ in 0..8 {
            let bit = br.read_bit()? as usize;
            let child = self.nodes[idx][bit];
            if child < 0 {
                return Ok((-(child + 1)) as u8);
            }
            if child == 0 {
                return Err(BinkError::InvalidData("VLC 树无效节点".into()));
            }
            idx = child as usize;
        }
        Err(BinkError::InvalidData("VLC 码字超过 7 位".into()))
    }
}

/// 全部 16 张解码表 (进程内构建一次, 只读共享)
pub fn vlc_tables() -> &'static [VlcTable; 16] {
    static TABLES: OnceLock<[VlcTable; 16]> = OnceLock::new();
    TABLES.get_or_init(|| {
        std::array::from_fn(|i| VlcTable::build(&TREE_CODES[i], &TREE_LENS[i]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bink_core::bitwriter::BitWriter;

    #[test]
    fn test_flat_table_reads_raw_nibble() {
        // 形状 0 是定长 4 位码, 叶子索引即原始 nibble
        let tables = vlc_tables();
        for v in 0u32..16 {
            let mut bw = BitWriter::new();
            bw.write_bits(v, 4);
            let data = bw.finish();
            let mut br = BitReader::new(&data);
            assert_eq!(tables[0].decode_symbol(&mut br).unwrap(), v as u8);
            assert_eq!(br.bits_read(), 4);
        }
    }

    #[test]
    fn test_prefix_table_roundtrip() {
        // 所有形状: 写入每个叶子的码字后应解回对应叶子索引
        let tables = vlc_tables();
        for shape in 0..16 {
            for sym in 0..16 {
                let mut bw = BitWriter::new();
                bw.write_bits(
                    u32::from(TREE_CODES[shape][sym]),
                    u32::from(TREE_LENS[shape][sym]),
                );
                let data = bw.finish();
                let mut br = BitReader::new(&data);
                assert_eq!(
                    tables[shape].decode_symbol(&mut br).unwrap(),
                    sym as u8,
                    "形状 {} 叶子 {}",
                    shape,
                    sym
                );
                assert_eq!(br.bits_read(), TREE_LENS[shape][sym] as usize);
            }
        }
    }
}
