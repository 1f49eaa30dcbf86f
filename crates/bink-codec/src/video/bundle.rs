//! Bundle 符号流解码.
//!
//! 平面内每种语义数据源 (块类型、子块类型、颜色、图案、X/Y 运动偏移、
//! 帧内/帧间 DC、游程长度) 各有一个 bundle: 自带 Huffman 树的类型化
//! 缓冲区. 每 8 行块为一个条带, 条带开始时各 bundle 先从码流补充解码
//! 一批符号, 块重建阶段再按读游标顺序取值.
//!
//! 树的置换构造 (尤其二路归并) 必须逐位复刻码流消费顺序, 任何偏差
//! 都会让后续解码静默失步 — 格式没有任何校验和保护这里.

use bink_core::bitreader::BitReader;
use bink_core::{BinkError, BinkResult};

use crate::version::Version;
use crate::vlc::vlc_tables;

use super::tables::{DC_START_BITS, RLE_LENGTHS};

/// 语义数据源编号 (bundle 下标)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BundleId {
    /// 块类型
    BlockTypes = 0,
    /// 16x16 块的子类型
    SubBlockTypes = 1,
    /// 颜色字节
    Colors = 2,
    /// 图案字节 (每字节 8 个像素的二选一掩码)
    Patterns = 3,
    /// 运动偏移 X
    XOff = 4,
    /// 运动偏移 Y
    YOff = 5,
    /// 帧内 DC
    IntraDc = 6,
    /// 帧间 DC
    InterDc = 7,
    /// 游程长度
    Run = 8,
}

/// bundle 总数
pub(crate) const NUM_BUNDLES: usize = 9;

/// 按条带解码顺序排列的全部数据源
pub(crate) const BUNDLE_ORDER: [BundleId; NUM_BUNDLES] = [
    BundleId::BlockTypes,
    BundleId::SubBlockTypes,
    BundleId::Colors,
    BundleId::Patterns,
    BundleId::XOff,
    BundleId::YOff,
    BundleId::IntraDc,
    BundleId::InterDc,
    BundleId::Run,
];

/// 4 位符号的 Huffman 树描述
///
/// `shape` 选择 16 套固定前缀码之一, `symbols` 是叶子到输出 nibble
/// 的置换. 形状 0 固定为恒等置换 (码流中的快捷方式).
#[derive(Debug, Clone)]
pub(crate) struct Tree {
    /// 树形状索引 (0-15)
    shape: usize,
    /// 叶子索引 -> 输出 nibble 的置换
    symbols: [u8; 16],
}

impl Tree {
    /// 恒等树 (形状 0)
    pub(crate) fn identity() -> Self {
        Self {
            shape: 0,
            symbols: std::array::from_fn(|i| i as u8),
        }
    }

    /// 从码流读取树描述
    ///
    /// 形状 0 直接使用恒等置换; 否则按标志位选择显式列表或递归归并
    /// 两种置换构造方式.
    pub(crate) fn read(br: &mut BitReader) -> BinkResult<Self> {
        let shape = br.read_bits(4)? as usize;
        if shape == 0 {
            return Ok(Self::identity());
        }

        let mut symbols = [0u8; 16];
        if br.read_bool()? {
            // 显式列表: 3 位个数 + 若干原始 nibble, 余下叶子按升序补齐
            let explicit = br.read_bits(3)? as usize;
            let mut used = [false; 16];
            for sym in symbols.iter_mut().take(explicit + 1) {
                *sym = br.read_bits(4)? as u8;
                used[*sym as usize] = true;
            }
            let mut len = explicit;
            for i in 0..16u8 {
                if len >= 15 {
                    break;
                }
                if !used[i as usize] {
                    len += 1;
                    symbols[len] = i;
                }
            }
        } else {
            // 递归归并: k+1 趟对相邻块做码流驱动的二路归并
            let passes = br.read_bits(2)?;
            let mut list: [u8; 16] = std::array::from_fn(|i| i as u8);
            let mut out = [0u8; 16];
            for i in 0..=passes {
                let size = 1usize << i;
                for t in (0..16).step_by(size * 2) {
                    merge(br, &mut out[t..t + size * 2], &list[t..t + size * 2], size)?;
                }
                std::mem::swap(&mut list, &mut out);
            }
            symbols = list;
        }

        Ok(Self { shape, symbols })
    }

    /// 解码一个符号并做置换映射
    pub(crate) fn get_symbol(&self, br: &mut BitReader) -> BinkResult<u8> {
        let leaf = vlc_tables()[self.shape].decode_symbol(br)?;
        Ok(self.symbols[leaf as usize])
    }
}

/// 对两个相邻等长列表做码流驱动的二路归并
///
/// 每输出一个元素消费 1 位 (0 取左侧, 1 取右侧), 直到一侧耗尽后
/// 剩余元素不再消费位直接冲刷. 位消费顺序必须与编码端严格一致.
fn merge(br: &mut BitReader, dst: &mut [u8], src: &[u8], size: usize) -> BinkResult<()> {
    let (mut p1, mut n1) = (0usize, size);
    let (mut p2, mut n2) = (size, size);
    let mut d = 0usize;

    loop {
        if br.read_bool()? {
            dst[d] = src[p2];
            p2 += 1;
            n2 -= 1;
        } else {
            dst[d] = src[p1];
            p1 += 1;
            n1 -= 1;
        }
        d += 1;
        if n1 == 0 || n2 == 0 {
            break;
        }
    }
    while n1 > 0 {
        dst[d] = src[p1];
        p1 += 1;
        n1 -= 1;
        d += 1;
    }
    while n2 > 0 {
        dst[d] = src[p2];
        p2 += 1;
        n2 -= 1;
        d += 1;
    }
    Ok(())
}

/// 单个 bundle: 长度字段位宽 + Huffman 树 + 带读写游标的符号缓冲
///
/// 缓冲统一用 `i16` 存放: 颜色/图案等字节值占用 0-255, 运动偏移为
/// 带符号小值, DC 为带符号 16 位. 写游标越过容量即为致命解码错误.
#[derive(Debug)]
pub(crate) struct Bundle {
    /// 长度字段位宽
    len_bits: u32,
    /// 当前平面的 Huffman 树
    tree: Tree,
    /// 符号缓冲 (容量固定, 每平面复用)
    data: Vec<i16>,
    /// 写游标; `None` 表示本平面符号已全部解码完
    dec_pos: Option<usize>,
    /// 读游标
    read_pos: usize,
}

impl Bundle {
    fn new(capacity: usize) -> Self {
        Self {
            len_bits: 0,
            tree: Tree::identity(),
            data: vec![0; capacity],
            dec_pos: Some(0),
            read_pos: 0,
        }
    }

    /// 条带解码前的公共检查: 返回本次应解码的元素个数
    ///
    /// 写游标已越过读游标 (缓冲数据尚未消费) 或 bundle 已耗尽时
    /// 返回 `None`; 长度字段为 0 时把 bundle 标记为耗尽.
    fn pending_count(&mut self, br: &mut BitReader) -> BinkResult<Option<usize>> {
        let Some(dec) = self.dec_pos else {
            return Ok(None);
        };
        if dec > self.read_pos {
            return Ok(None);
        }
        let t = br.read_bits(self.len_bits)? as usize;
        if t == 0 {
            self.dec_pos = None;
            return Ok(None);
        }
        Ok(Some(t))
    }

    /// 写游标与解码终点的越界检查
    fn checked_end(&self, count: usize, what: &str) -> BinkResult<usize> {
        let dec = self.dec_pos.unwrap_or(0);
        let end = dec + count;
        if end > self.data.len() {
            return Err(BinkError::InvalidData(format!("{} 数量越界", what)));
        }
        Ok(end)
    }
}

/// 一个平面解码过程中的全部 bundle 状态
///
/// 颜色 bundle 额外持有 16 棵高 nibble 树和跨整个平面的
/// `col_lastval` 串行状态.
pub(crate) struct Bundles {
    /// 9 个数据源
    bundles: [Bundle; NUM_BUNDLES],
    /// 颜色高 nibble 树 (按上一个高 nibble 值索引)
    col_high: [Tree; 16],
    /// 上一个颜色高 nibble
    col_lastval: u8,
    /// 颜色字节是否需要符号折叠再加偏置 (版本 < i)
    rebias_colors: bool,
}

/// 整数 floor(log2(x)), x >= 1
fn log2_floor(x: u32) -> u32 {
    31 - x.leading_zeros()
}

impl Bundles {
    /// 按帧尺寸分配各 bundle 缓冲 (以 8x8 块数 * 64 为容量)
    pub(crate) fn new(width: u32, height: u32, version: Version) -> Self {
        let bw = width.div_ceil(8) as usize;
        let bh = height.div_ceil(8) as usize;
        let capacity = bw * bh * 64;
        Self {
            bundles: std::array::from_fn(|_| Bundle::new(capacity)),
            col_high: std::array::from_fn(|_| Tree::identity()),
            col_lastval: 0,
            rebias_colors: version.rebias_colors(),
        }
    }

    /// 设置各 bundle 的长度字段位宽
    ///
    /// `width` 为平面宽度 (至少 8), `bw` 为平面一行的块数.
    pub(crate) fn init_lengths(&mut self, width: u32, bw: u32) {
        let blk = log2_floor((width >> 3) + 511) + 1;
        self.bundles[BundleId::BlockTypes as usize].len_bits = blk;
        self.bundles[BundleId::SubBlockTypes as usize].len_bits =
            log2_floor((width >> 4) + 511) + 1;
        self.bundles[BundleId::Colors as usize].len_bits = log2_floor(bw * 64 + 511) + 1;
        self.bundles[BundleId::IntraDc as usize].len_bits = blk;
        self.bundles[BundleId::InterDc as usize].len_bits = blk;
        self.bundles[BundleId::XOff as usize].len_bits = blk;
        self.bundles[BundleId::YOff as usize].len_bits = blk;
        self.bundles[BundleId::Patterns as usize].len_bits = log2_floor((bw << 3) + 511) + 1;
        self.bundles[BundleId::Run as usize].len_bits = log2_floor(bw * 48 + 511) + 1;
    }

    /// 平面解码开始: 读树并重置读写游标
    pub(crate) fn read_bundle(&mut self, br: &mut BitReader, id: BundleId) -> BinkResult<()> {
        if id == BundleId::Colors {
            for tree in self.col_high.iter_mut() {
                *tree = Tree::read(br)?;
            }
            self.col_lastval = 0;
        }
        if id != BundleId::IntraDc && id != BundleId::InterDc {
            self.bundles[id as usize].tree = Tree::read(br)?;
        }
        let b = &mut self.bundles[id as usize];
        b.dec_pos = Some(0);
        b.read_pos = 0;
        Ok(())
    }

    /// 条带开始时按固定顺序补充全部 bundle
    pub(crate) fn refill_all(&mut self, br: &mut BitReader) -> BinkResult<()> {
        for id in BUNDLE_ORDER {
            match id {
                BundleId::BlockTypes | BundleId::SubBlockTypes => self.read_block_types(br, id)?,
                BundleId::Colors => self.read_colors(br)?,
                BundleId::Patterns => self.read_patterns(br)?,
                BundleId::XOff | BundleId::YOff => self.read_motion_values(br, id)?,
                BundleId::IntraDc => self.read_dcs(br, BundleId::IntraDc, false)?,
                BundleId::InterDc => self.read_dcs(br, BundleId::InterDc, true)?,
                BundleId::Run => self.read_runs(br)?,
            }
        }
        Ok(())
    }

    /// 从 bundle 取下一个值
    pub(crate) fn get_value(&mut self, id: BundleId) -> BinkResult<i32> {
        let b = &mut self.bundles[id as usize];
        let Some(&v) = b.data.get(b.read_pos) else {
            return Err(BinkError::InvalidData("bundle 读游标越界".into()));
        };
        b.read_pos += 1;
        Ok(i32::from(v))
    }

    /// RAW 块专用: 从颜色 bundle 按读游标原样取 64 字节
    pub(crate) fn take_raw_colors(&mut self) -> BinkResult<[u8; 64]> {
        let b = &mut self.bundles[BundleId::Colors as usize];
        if b.read_pos + 64 > b.data.len() {
            return Err(BinkError::InvalidData("颜色 bundle 读游标越界".into()));
        }
        let mut out = [0u8; 64];
        for (i, o) in out.iter_mut().enumerate() {
            *o = b.data[b.read_pos + i] as u8;
        }
        b.read_pos += 64;
        Ok(out)
    }

    /// 解码游程长度值
    fn read_runs(&mut self, br: &mut BitReader) -> BinkResult<()> {
        let b = &mut self.bundles[BundleId::Run as usize];
        let Some(t) = b.pending_count(br)? else {
            return Ok(());
        };
        let end = b.checked_end(t, "游程")?;
        let mut dec = b.dec_pos.unwrap_or(0);

        if br.read_bool()? {
            let v = br.read_bits(4)? as i16;
            b.data[dec..end].fill(v);
        } else {
            while dec < end {
                b.data[dec] = i16::from(b.tree.get_symbol(br)?);
                dec += 1;
            }
        }
        b.dec_pos = Some(end);
        Ok(())
    }

    /// 解码带符号的运动偏移值
    fn read_motion_values(&mut self, br: &mut BitReader, id: BundleId) -> BinkResult<()> {
        let b = &mut self.bundles[id as usize];
        let Some(t) = b.pending_count(br)? else {
            return Ok(());
        };
        let end = b.checked_end(t, "运动偏移")?;
        let mut dec = b.dec_pos.unwrap_or(0);

        if br.read_bool()? {
            let mut v = br.read_bits(4)? as i16;
            if v != 0 && br.read_bool()? {
                v = -v;
            }
            b.data[dec..end].fill(v);
        } else {
            while dec < end {
                let mut v = i16::from(b.tree.get_symbol(br)?);
                if v != 0 && br.read_bool()? {
                    v = -v;
                }
                b.data[dec] = v;
                dec += 1;
            }
        }
        b.dec_pos = Some(end);
        Ok(())
    }

    /// 解码块类型值 (符号 12-15 触发对上一个字面类型的 RLE 展开)
    fn read_block_types(&mut self, br: &mut BitReader, id: BundleId) -> BinkResult<()> {
        let b = &mut self.bundles[id as usize];
        let Some(t) = b.pending_count(br)? else {
            return Ok(());
        };
        let end = b.checked_end(t, "块类型")?;
        let mut dec = b.dec_pos.unwrap_or(0);

        if br.read_bool()? {
            let v = br.read_bits(4)? as i16;
            b.data[dec..end].fill(v);
            dec = end;
        } else {
            let mut last = 0i16;
            while dec < end {
                let v = b.tree.get_symbol(br)?;
                if v < 12 {
                    last = i16::from(v);
                    b.data[dec] = last;
                    dec += 1;
                } else {
                    let run = RLE_LENGTHS[v as usize - 12];
                    if end - dec < run {
                        return Err(BinkError::InvalidData("块类型 RLE 越界".into()));
                    }
                    b.data[dec..dec + run].fill(last);
                    dec += run;
                }
            }
        }
        b.dec_pos = Some(dec);
        Ok(())
    }

    /// 解码图案字节 (低/高两个 nibble 拼合)
    fn read_patterns(&mut self, br: &mut BitReader) -> BinkResult<()> {
        let b = &mut self.bundles[BundleId::Patterns as usize];
        let Some(t) = b.pending_count(br)? else {
            return Ok(());
        };
        let end = b.checked_end(t, "图案")?;
        let mut dec = b.dec_pos.unwrap_or(0);

        while dec < end {
            let lo = b.tree.get_symbol(br)?;
            let hi = b.tree.get_symbol(br)?;
            b.data[dec] = i16::from(lo | (hi << 4));
            dec += 1;
        }
        b.dec_pos = Some(end);
        Ok(())
    }

    /// 解码一个颜色字节: 高 nibble 经串行依赖的二级树, 低 nibble 经自身树
    fn next_color(&mut self, br: &mut BitReader) -> BinkResult<i16> {
        let high = self.col_high[self.col_lastval as usize].get_symbol(br)?;
        self.col_lastval = high;
        let low = self.bundles[BundleId::Colors as usize].tree.get_symbol(br)?;
        let mut v = i32::from((high << 4) | low);
        if self.rebias_colors {
            // 旧版本容器: 按最高位符号折叠后重新偏置到无符号域
            let sign = (v as i8 as i32) >> 7;
            v = (((v & 0x7F) ^ sign) - sign) + 0x80;
        }
        Ok(v as i16)
    }

    /// 解码颜色值
    fn read_colors(&mut self, br: &mut BitReader) -> BinkResult<()> {
        let Some(t) = self.bundles[BundleId::Colors as usize].pending_count(br)? else {
            return Ok(());
        };
        let end = self.bundles[BundleId::Colors as usize].checked_end(t, "颜色")?;
        let mut dec = self.bundles[BundleId::Colors as usize]
            .dec_pos
            .unwrap_or(0);

        if br.read_bool()? {
            let v = self.next_color(br)?;
            self.bundles[BundleId::Colors as usize].data[dec..end].fill(v);
        } else {
            while dec < end {
                let v = self.next_color(br)?;
                self.bundles[BundleId::Colors as usize].data[dec] = v;
                dec += 1;
            }
        }
        self.bundles[BundleId::Colors as usize].dec_pos = Some(end);
        Ok(())
    }

    /// 解码 DC 值序列: 11 位首值 + 按 8 个一组的带位宽前缀的增量编码
    fn read_dcs(&mut self, br: &mut BitReader, id: BundleId, has_sign: bool) -> BinkResult<()> {
        let b = &mut self.bundles[id as usize];
        let Some(len) = b.pending_count(br)? else {
            return Ok(());
        };
        let end = b.checked_end(len, "DC 值")?;
        let mut dec = b.dec_pos.unwrap_or(0);

        let start_bits = DC_START_BITS - u32::from(has_sign);
        let mut v = br.read_bits(start_bits)? as i32;
        if v != 0 && has_sign && br.read_bool()? {
            v = -v;
        }

        b.data[dec] = v as i16;
        dec += 1;
        let mut remaining = len - 1;

        while remaining > 0 {
            let group = remaining.min(8);
            let bsize = br.read_bits(4)?;
            if bsize != 0 {
                for _ in 0..group {
                    let mut delta = br.read_bits(bsize)? as i32;
                    if delta != 0 && br.read_bool()? {
                        delta = -delta;
                    }
                    v += delta;
                    if !(-32768..=32767).contains(&v) {
                        return Err(BinkError::InvalidData(format!("DC 值越界: {}", v)));
                    }
                    b.data[dec] = v as i16;
                    dec += 1;
                }
            } else {
                for _ in 0..group {
                    b.data[dec] = v as i16;
                    dec += 1;
                }
            }
            remaining -= group;
        }

        debug_assert_eq!(dec, end);
        b.dec_pos = Some(dec);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bink_core::bitwriter::BitWriter;

    fn reader(bw: BitWriter) -> Vec<u8> {
        bw.finish()
    }

    #[test]
    fn test_identity_tree_passthrough() {
        // 形状选择 0 -> 恒等置换: 原始 nibble 原样输出
        let mut bw = BitWriter::new();
        bw.write_bits(0, 4);
        bw.write_bits(7, 4); // 形状 0 是定长 4 位码
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        let tree = Tree::read(&mut br).unwrap();
        assert_eq!(tree.get_symbol(&mut br).unwrap(), 7);
    }

    #[test]
    fn test_explicit_list_tree() {
        // 显式列表: 前 3 个叶子 5,0,9, 其余按升序补齐
        let mut bw = BitWriter::new();
        bw.write_bits(1, 4); // 形状 1
        bw.write_bit(1); // 显式列表
        bw.write_bits(2, 3); // 个数-1 = 2
        bw.write_bits(5, 4);
        bw.write_bits(0, 4);
        bw.write_bits(9, 4);
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        let tree = Tree::read(&mut br).unwrap();
        assert_eq!(
            tree.symbols,
            [5, 0, 9, 1, 2, 3, 4, 6, 7, 8, 10, 11, 12, 13, 14, 15]
        );
    }

    #[test]
    fn test_merge_tree_is_permutation() {
        // 任意位序列驱动的归并结果必须是 {0..15} 的置换
        let mut seed = 0x1234_5678u32;
        for _ in 0..64 {
            let mut bw = BitWriter::new();
            bw.write_bits(3, 4); // 形状 3
            bw.write_bit(0); // 归并路径
            bw.write_bits(3, 2); // 4 趟归并
            for _ in 0..256 {
                seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
                bw.write_bit(seed >> 31);
            }
            let data = reader(bw);
            let mut br = BitReader::new(&data);
            let tree = Tree::read(&mut br).unwrap();
            let mut seen = [false; 16];
            for &s in tree.symbols.iter() {
                assert!(!seen[s as usize], "重复的 nibble {}", s);
                seen[s as usize] = true;
            }
        }
    }

    #[test]
    fn test_merge_bit_order() {
        // 单趟归并 [0,1] 与 [2,3]: 位序 1,0 -> 2,0,1,3
        let mut bw = BitWriter::new();
        bw.write_bit(1);
        bw.write_bit(0);
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        let src = [0u8, 1, 2, 3];
        let mut dst = [0u8; 4];
        merge(&mut br, &mut dst, &src, 2).unwrap();
        assert_eq!(dst, [2, 0, 1, 3]);
        // 左侧在第 2 个输出后耗尽... 实际: 1->取2, 0->取0, 左右各剩1,
        // 位耗尽于 n1==0 或 n2==0 时冲刷: 取0后 n1=1,n2=1, 继续需要位
        assert_eq!(br.bits_read(), 2);
    }

    fn fresh_bundles() -> Bundles {
        let mut bundles = Bundles::new(64, 64, Version::I);
        bundles.init_lengths(64, 8);
        bundles
    }

    #[test]
    fn test_block_types_rle() {
        let mut bundles = fresh_bundles();
        let mut bw = BitWriter::new();
        bw.write_bits(0, 4); // 恒等树
        let len_bits = bundles.bundles[BundleId::BlockTypes as usize].len_bits;
        // 写在 read_bundle 之后读取的长度字段
        bw.write_bits(6, len_bits); // 6 个值
        bw.write_bit(0); // 逐符号解码
        bw.write_bits(6, 4); // FILL
        bw.write_bits(12, 4); // RLE: 重复上一类型 4 次
        bw.write_bits(0, 4); // SKIP
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        bundles.read_bundle(&mut br, BundleId::BlockTypes).unwrap();
        bundles
            .read_block_types(&mut br, BundleId::BlockTypes)
            .unwrap();
        let got: Vec<i32> = (0..6)
            .map(|_| bundles.get_value(BundleId::BlockTypes).unwrap())
            .collect();
        assert_eq!(got, [6, 6, 6, 6, 6, 0]);
    }

    #[test]
    fn test_colors_two_level_code() {
        let mut bundles = fresh_bundles();
        let mut bw = BitWriter::new();
        for _ in 0..17 {
            bw.write_bits(0, 4); // 16 棵高位树 + 自身树, 全部恒等
        }
        let len_bits = bundles.bundles[BundleId::Colors as usize].len_bits;
        bw.write_bits(1, len_bits);
        bw.write_bit(1); // 常量填充
        bw.write_bits(4, 4); // 高 nibble
        bw.write_bits(2, 4); // 低 nibble
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        bundles.read_bundle(&mut br, BundleId::Colors).unwrap();
        bundles.read_colors(&mut br).unwrap();
        assert_eq!(bundles.get_value(BundleId::Colors).unwrap(), 0x42);
        assert_eq!(bundles.col_lastval, 4);
    }

    #[test]
    fn test_colors_rebias_old_version() {
        // 版本 < i: 0x42 折叠后 + 0x80 = 0xC2
        let mut bundles = Bundles::new(64, 64, Version::F);
        bundles.init_lengths(64, 8);
        let mut bw = BitWriter::new();
        for _ in 0..17 {
            bw.write_bits(0, 4);
        }
        let len_bits = bundles.bundles[BundleId::Colors as usize].len_bits;
        bw.write_bits(1, len_bits);
        bw.write_bit(1);
        bw.write_bits(4, 4);
        bw.write_bits(2, 4);
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        bundles.read_bundle(&mut br, BundleId::Colors).unwrap();
        bundles.read_colors(&mut br).unwrap();
        assert_eq!(bundles.get_value(BundleId::Colors).unwrap(), 0xC2);
    }

    #[test]
    fn test_dc_delta_groups() {
        let mut bundles = fresh_bundles();
        let mut bw = BitWriter::new();
        let len_bits = bundles.bundles[BundleId::IntraDc as usize].len_bits;
        bw.write_bits(3, len_bits);
        bw.write_bits(100, 11); // 首值 (无符号)
        bw.write_bits(3, 4); // 组位宽 3
        bw.write_bits(5, 3); // +5
        bw.write_bit(0);
        bw.write_bits(2, 3); // -2
        bw.write_bit(1);
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        bundles.read_bundle(&mut br, BundleId::IntraDc).unwrap();
        bundles
            .read_dcs(&mut br, BundleId::IntraDc, false)
            .unwrap();
        assert_eq!(bundles.get_value(BundleId::IntraDc).unwrap(), 100);
        assert_eq!(bundles.get_value(BundleId::IntraDc).unwrap(), 105);
        assert_eq!(bundles.get_value(BundleId::IntraDc).unwrap(), 103);
    }

    #[test]
    fn test_dc_range_rejected() {
        let mut bundles = fresh_bundles();
        let mut bw = BitWriter::new();
        let len_bits = bundles.bundles[BundleId::InterDc as usize].len_bits;
        bw.write_bits(9, len_bits);
        bw.write_bits(1023, 10); // 首值 (10 位 + 符号)
        bw.write_bit(1); // 负
        for _ in 0..8 {
            // 每个增量 -1023, 迅速越过 -32768
            bw.write_bits(10, 4);
            bw.write_bits(1023, 10);
            bw.write_bit(1);
        }
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        bundles.read_bundle(&mut br, BundleId::InterDc).unwrap();
        let err = bundles.read_dcs(&mut br, BundleId::InterDc, true);
        assert!(matches!(err, Err(BinkError::InvalidData(_))));
    }

    #[test]
    fn test_exhausted_bundle_reuses_buffer() {
        // 长度字段 0 -> bundle 耗尽, 后续条带不再消费码流
        let mut bundles = fresh_bundles();
        let mut bw = BitWriter::new();
        bw.write_bits(0, 4);
        let len_bits = bundles.bundles[BundleId::Run as usize].len_bits;
        bw.write_bits(0, len_bits);
        let data = reader(bw);
        let mut br = BitReader::new(&data);
        bundles.read_bundle(&mut br, BundleId::Run).unwrap();
        bundles.read_runs(&mut br).unwrap();
        let pos = br.bits_read();
        bundles.read_runs(&mut br).unwrap();
        assert_eq!(br.bits_read(), pos);
    }
}
