//! 分平面块视频解码.
//!
//! 每帧按 alpha (可选) -> 亮度 -> 两个色度平面的顺序解码, 平面间
//! 对齐到 32 位边界. 每个平面划分为 8x8 块网格, 按行扫描, 每行开始
//! 先补充 9 个 bundle 的符号, 再逐块按十种块类型重建像素.
//!
//! 平面采用双缓冲: 新帧写入 `current`, 参考像素一律取自 `last`
//! (上一帧成功解码的结果), 整帧成功后原子交换. 解码失败时不交换,
//! 已展示的帧保持不变.

mod bundle;
mod dsp;
mod tables;

use bink_core::bitreader::BitReader;
use bink_core::{BinkError, BinkResult};
use log::trace;

use crate::version::Version;

use bundle::{BundleId, Bundles, BUNDLE_ORDER};
use tables::{INTER_QUANT, INTRA_QUANT, RUN_PATTERNS};

/// 块类型 (码流中的 0-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    /// 原样照搬参考帧同位置块
    Skip,
    /// 16x16 块: 解码 8x8 子块后放大一倍
    Scaled,
    /// 带偏移的运动补偿复制
    Motion,
    /// 按图案顺序的游程颜色填充
    Run,
    /// 运动补偿 + 位平面残差
    Residue,
    /// 帧内 DCT 块
    Intra,
    /// 单色填充
    Fill,
    /// 运动补偿 + 帧间 DCT
    Inter,
    /// 双色图案
    Pattern,
    /// 64 字节原始像素
    Raw,
}

impl BlockType {
    fn from_value(v: i32) -> BinkResult<Self> {
        Ok(match v {
            0 => BlockType::Skip,
            1 => BlockType::Scaled,
            2 => BlockType::Motion,
            3 => BlockType::Run,
            4 => BlockType::Residue,
            5 => BlockType::Intra,
            6 => BlockType::Fill,
            7 => BlockType::Inter,
            8 => BlockType::Pattern,
            9 => BlockType::Raw,
            _ => return Err(BinkError::InvalidData(format!("未知的块类型: {}", v))),
        })
    }
}

/// 单个平面的双缓冲像素存储
///
/// `pitch` 对齐到 16 字节, 分配高度对齐到 8 行, 保证任何合法块写入
/// 和运动参考都落在缓冲内.
struct Plane {
    width: usize,
    height: usize,
    pitch: usize,
    current: Vec<u8>,
    last: Vec<u8>,
}

impl Plane {
    fn new(width: usize, height: usize, fill: u8) -> Self {
        let pitch = (width + 15) & !15;
        let alloc_height = (height + 7) & !7;
        Self {
            width,
            height,
            pitch,
            current: vec![fill; pitch * alloc_height],
            last: vec![fill; pitch * alloc_height],
        }
    }

    fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.last);
    }
}

/// 对外暴露的平面像素视图 (借用自解码器内部缓冲)
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    /// 像素数据, 行间距为 `pitch`
    pub data: &'a [u8],
    /// 有效宽度
    pub width: usize,
    /// 有效高度
    pub height: usize,
    /// 行间距 (>= width)
    pub pitch: usize,
}

/// Bink 视频解码器
///
/// 一个实例对应一条视频流, 持有全部平面的双缓冲与版本信息.
/// [`decode_frame`](Self::decode_frame) 消费一个完整视频包.
pub struct BinkVideoDecoder {
    width: u32,
    height: u32,
    version: Version,
    grayscale: bool,
    has_alpha: bool,
    planes: Vec<Plane>,
}

impl BinkVideoDecoder {
    /// 创建解码器并分配平面缓冲
    ///
    /// 色度平面初始填充 0x80 (中性色度), 灰度流不编码色度时保持中性.
    pub fn new(
        width: u32,
        height: u32,
        version: Version,
        grayscale: bool,
        has_alpha: bool,
    ) -> BinkResult<Self> {
        if version == Version::B {
            return Err(BinkError::Unsupported("早期 'b' 版码流".into()));
        }
        if width == 0 || height == 0 || width > 7680 || height > 4800 {
            return Err(BinkError::InvalidArgument(format!(
                "非法的视频尺寸: {}x{}",
                width, height
            )));
        }
        if grayscale && has_alpha {
            return Err(BinkError::Unsupported("灰度与 alpha 组合".into()));
        }

        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let mut planes = vec![
            Plane::new(w, h, 0),
            Plane::new(cw, ch, 0x80),
            Plane::new(cw, ch, 0x80),
        ];
        if has_alpha {
            planes.push(Plane::new(w, h, 0));
        }

        Ok(Self {
            width,
            height,
            version,
            grayscale,
            has_alpha,
            planes,
        })
    }

    /// 视频宽度
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 视频高度
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 是否携带 alpha 平面
    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    /// 容器是否声明为灰度流
    pub fn is_grayscale(&self) -> bool {
        self.grayscale
    }

    /// 平面数量 (亮度 + 2 色度, alpha 流为 4)
    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    /// 最近一次成功解码的帧的平面视图
    ///
    /// 索引 0 为亮度, 1/2 为色度, 3 为 alpha (若存在).
    pub fn plane_view(&self, idx: usize) -> Option<PlaneView<'_>> {
        self.planes.get(idx).map(|p| PlaneView {
            data: &p.last,
            width: p.width,
            height: p.height,
            pitch: p.pitch,
        })
    }

    /// 解码一个完整视频包
    ///
    /// 成功后新帧经缓冲交换对 [`plane_view`](Self::plane_view) 可见;
    /// 失败时缓冲不交换, 之前的帧保持可见.
    pub fn decode_frame(&mut self, packet: &[u8]) -> BinkResult<()> {
        let mut br = BitReader::new(packet);

        if self.has_alpha {
            if self.version.has_plane_sizes() {
                br.skip_bits(32)?;
            }
            self.decode_plane(&mut br, 3)?;
        }
        if self.version.has_plane_sizes() {
            br.skip_bits(32)?;
        }

        // 灰度流不单独分支: 其码流在亮度平面后耗尽, 由下面的 break 终止
        for plane in 0..3 {
            let plane_idx = if plane > 0 && self.version.swap_planes() {
                plane ^ 3
            } else {
                plane
            };
            self.decode_plane(&mut br, plane_idx)?;
            if br.bits_left() == 0 {
                break;
            }
        }

        for p in self.planes.iter_mut() {
            p.swap();
        }
        trace!("视频帧解码完成, 消费 {} 位", br.bits_read());
        Ok(())
    }

    /// 解码单个平面 (块网格由平面自身尺寸决定)
    fn decode_plane(&mut self, br: &mut BitReader, plane_idx: usize) -> BinkResult<()> {
        let version = self.version;
        let plane = &mut self.planes[plane_idx];
        let width = plane.width;
        let height = plane.height;
        let pitch = plane.pitch;
        let bw = width.div_ceil(8);
        let bh = height.div_ceil(8);

        let mut bundles = Bundles::new(width as u32, height as u32, version);
        bundles.init_lengths(width.max(8) as u32, bw as u32);
        for id in BUNDLE_ORDER {
            bundles.read_bundle(br, id)?;
        }

        // 运动参考的合法偏移上界 (左上角为 0)
        let ref_max = (bw - 1 + pitch * (bh - 1)) * 8;
        let coordmap: [usize; 64] = std::array::from_fn(|i| (i & 7) + (i >> 3) * pitch);

        let current = &mut plane.current;
        let last = &plane.last;

        for by in 0..bh {
            bundles.refill_all(br)?;

            let row_off = 8 * by * pitch;
            let mut bx = 0usize;
            while bx < bw {
                let dst_off = row_off + bx * 8;
                let blk = bundles.get_value(BundleId::BlockTypes)?;
                let blk = BlockType::from_value(blk)?;

                // 奇数行遇到 16x16 块类型: 属于上一行已解码的块, 跳过一对
                if (by & 1) == 1 && blk == BlockType::Scaled {
                    bx += 2;
                    continue;
                }

                match blk {
                    BlockType::Skip => {
                        dsp::copy_block_from(current, dst_off, last, dst_off, pitch);
                    }
                    BlockType::Scaled => {
                        Self::decode_scaled_block(br, &mut bundles, current, dst_off, pitch)?;
                        bx += 1;
                    }
                    BlockType::Motion => {
                        let ref_off = Self::motion_ref(&mut bundles, dst_off, pitch, ref_max)?;
                        dsp::copy_block_from(current, dst_off, last, ref_off, pitch);
                    }
                    BlockType::Run => {
                        let scan = &RUN_PATTERNS[br.read_bits(4)? as usize];
                        let mut i = 0usize;
                        loop {
                            let run = bundles.get_value(BundleId::Run)? as usize + 1;
                            if i + run > 64 {
                                return Err(BinkError::InvalidData("游程超出块边界".into()));
                            }
                            if br.read_bool()? {
                                let v = bundles.get_value(BundleId::Colors)? as u8;
                                for &pos in &scan[i..i + run] {
                                    current[dst_off + coordmap[pos as usize]] = v;
                                }
                            } else {
                                for &pos in &scan[i..i + run] {
                                    current[dst_off + coordmap[pos as usize]] =
                                        bundles.get_value(BundleId::Colors)? as u8;
                                }
                            }
                            i += run;
                            if i >= 63 {
                                break;
                            }
                        }
                        if i == 63 {
                            current[dst_off + coordmap[scan[63] as usize]] =
                                bundles.get_value(BundleId::Colors)? as u8;
                        }
                    }
                    BlockType::Residue => {
                        let ref_off = Self::motion_ref(&mut bundles, dst_off, pitch, ref_max)?;
                        let masks = br.read_bits(7)? as i32;
                        let mut block = [0i32; 64];
                        dsp::read_residue(br, &mut block, masks)?;
                        dsp::add_block_from(current, dst_off, last, ref_off, pitch, &block);
                    }
                    BlockType::Intra => {
                        let mut dct = [0i32; 64];
                        dct[0] = bundles.get_value(BundleId::IntraDc)?;
                        dsp::read_dct_coefficients(br, &mut dct, INTRA_QUANT, None)?;
                        dsp::idct_put(current, dst_off, pitch, &dct);
                    }
                    BlockType::Fill => {
                        let v = bundles.get_value(BundleId::Colors)? as u8;
                        for row in 0..8 {
                            current[dst_off + row * pitch..dst_off + row * pitch + 8].fill(v);
                        }
                    }
                    BlockType::Inter => {
                        let ref_off = Self::motion_ref(&mut bundles, dst_off, pitch, ref_max)?;
                        dsp::copy_block_from(current, dst_off, last, ref_off, pitch);
                        let mut dct = [0i32; 64];
                        dct[0] = bundles.get_value(BundleId::InterDc)?;
                        dsp::read_dct_coefficients(br, &mut dct, INTER_QUANT, None)?;
                        dsp::idct_add(current, dst_off, pitch, &dct);
                    }
                    BlockType::Pattern => {
                        let c0 = bundles.get_value(BundleId::Colors)? as u8;
                        let c1 = bundles.get_value(BundleId::Colors)? as u8;
                        for row in 0..8 {
                            let mut v = bundles.get_value(BundleId::Patterns)?;
                            for col in 0..8 {
                                current[dst_off + row * pitch + col] =
                                    if v & 1 != 0 { c1 } else { c0 };
                                v >>= 1;
                            }
                        }
                    }
                    BlockType::Raw => {
                        let raw = bundles.take_raw_colors()?;
                        for row in 0..8 {
                            current[dst_off + row * pitch..dst_off + row * pitch + 8]
                                .copy_from_slice(&raw[row * 8..row * 8 + 8]);
                        }
                    }
                }
                bx += 1;
            }
        }

        br.align32();
        Ok(())
    }

    /// 解码 16x16 块: 先在 8x8 工作块中按子类型重建, 再放大一倍
    fn decode_scaled_block(
        br: &mut BitReader,
        bundles: &mut Bundles,
        current: &mut [u8],
        dst_off: usize,
        pitch: usize,
    ) -> BinkResult<()> {
        let sub = bundles.get_value(BundleId::SubBlockTypes)?;
        let sub = BlockType::from_value(sub)?;
        let mut ublock = [0u8; 64];

        match sub {
            BlockType::Run => {
                let scan = &RUN_PATTERNS[br.read_bits(4)? as usize];
                let mut i = 0usize;
                loop {
                    let run = bundles.get_value(BundleId::Run)? as usize + 1;
                    if i + run > 64 {
                        return Err(BinkError::InvalidData("游程超出块边界".into()));
                    }
                    if br.read_bool()? {
                        let v = bundles.get_value(BundleId::Colors)? as u8;
                        for &pos in &scan[i..i + run] {
                            ublock[pos as usize] = v;
                        }
                    } else {
                        for &pos in &scan[i..i + run] {
                            ublock[pos as usize] = bundles.get_value(BundleId::Colors)? as u8;
                        }
                    }
                    i += run;
                    if i >= 63 {
                        break;
                    }
                }
                if i == 63 {
                    ublock[scan[63] as usize] = bundles.get_value(BundleId::Colors)? as u8;
                }
            }
            BlockType::Intra => {
                let mut dct = [0i32; 64];
                dct[0] = bundles.get_value(BundleId::IntraDc)?;
                dsp::read_dct_coefficients(br, &mut dct, INTRA_QUANT, None)?;
                dsp::idct_put(&mut ublock, 0, 8, &dct);
            }
            BlockType::Fill => {
                let v = bundles.get_value(BundleId::Colors)? as u8;
                for row in 0..16 {
                    current[dst_off + row * pitch..dst_off + row * pitch + 16].fill(v);
                }
                return Ok(());
            }
            BlockType::Pattern => {
                let c0 = bundles.get_value(BundleId::Colors)? as u8;
                let c1 = bundles.get_value(BundleId::Colors)? as u8;
                for row in 0..8 {
                    let mut v = bundles.get_value(BundleId::Patterns)?;
                    for col in 0..8 {
                        ublock[row * 8 + col] = if v & 1 != 0 { c1 } else { c0 };
                        v >>= 1;
                    }
                }
            }
            BlockType::Raw => {
                for b in ublock.iter_mut() {
                    *b = bundles.get_value(BundleId::Colors)? as u8;
                }
            }
            _ => {
                return Err(BinkError::InvalidData(format!(
                    "非法的 16x16 子块类型: {:?}",
                    sub
                )));
            }
        }

        dsp::scale_block(&ublock, current, dst_off, pitch);
        Ok(())
    }

    /// 读取运动偏移并检查参考块落在平面缓冲内
    fn motion_ref(
        bundles: &mut Bundles,
        dst_off: usize,
        pitch: usize,
        ref_max: usize,
    ) -> BinkResult<usize> {
        let xoff = bundles.get_value(BundleId::XOff)?;
        let yoff = bundles.get_value(BundleId::YOff)?;
        let ref_off = dst_off as i64 + i64::from(xoff) + i64::from(yoff) * pitch as i64;
        if ref_off < 0 || ref_off > ref_max as i64 {
            return Err(BinkError::InvalidData(format!(
                "运动参考越界: 偏移 ({}, {})",
                xoff, yoff
            )));
        }
        Ok(ref_off as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bink_core::bitwriter::BitWriter;

    /// 写入一棵恒等树 (4 位形状 0)
    fn write_identity_tree(bw: &mut BitWriter) {
        bw.write_bits(0, 4);
    }

    /// 写入一个平面的全部 bundle 树: 颜色先有 16 棵高位树
    fn write_plane_trees(bw: &mut BitWriter) {
        // 块类型, 子块类型
        write_identity_tree(bw);
        write_identity_tree(bw);
        // 颜色: 16 棵高位树 + 自身树
        for _ in 0..17 {
            write_identity_tree(bw);
        }
        // 图案, X, Y, 游程 (DC 无自身树)
        for _ in 0..4 {
            write_identity_tree(bw);
        }
    }

    fn len_bits(width: u32, shift: u32) -> u32 {
        31 - ((width >> shift) + 511).leading_zeros() + 1
    }

    /// 为 8x8 的单块平面合成一行 bundle 数据: 单个 FILL 块, 颜色 v
    fn write_fill_plane(bw: &mut BitWriter, width: u32, v: u8) {
        write_plane_trees(bw);
        let bw_blocks = width.div_ceil(8);
        // 块类型: 1 个 FILL
        bw.write_bits(1, len_bits(width, 3));
        bw.write_bit(0);
        bw.write_bits(6, 4);
        // 子块类型: 空
        bw.write_bits(0, len_bits(width, 4));
        // 颜色: 1 个值
        bw.write_bits(1, 31 - (bw_blocks * 64 + 511).leading_zeros() + 1);
        bw.write_bit(1); // 常量填充
        bw.write_bits(u32::from(v >> 4), 4);
        bw.write_bits(u32::from(v & 0xF), 4);
        // 图案
        bw.write_bits(0, 31 - ((bw_blocks << 3) + 511).leading_zeros() + 1);
        // X, Y
        bw.write_bits(0, len_bits(width, 3));
        bw.write_bits(0, len_bits(width, 3));
        // 帧内/帧间 DC
        bw.write_bits(0, len_bits(width, 3));
        bw.write_bits(0, len_bits(width, 3));
        // 游程
        bw.write_bits(0, 31 - (bw_blocks * 48 + 511).leading_zeros() + 1);
        bw.align32();
    }

    /// 合成一个 8x8 灰度帧: 亮度平面唯一块为 FILL(v)
    fn make_fill_frame(v: u8) -> Vec<u8> {
        let mut bw = BitWriter::new();
        bw.write_bits(0, 32); // 版本 i 的平面大小字段
        write_fill_plane(&mut bw, 8, v);
        bw.finish()
    }

    #[test]
    fn test_fill_block_uniform_frame() {
        let mut dec = BinkVideoDecoder::new(8, 8, Version::I, true, false).unwrap();
        let packet = make_fill_frame(0x42);
        dec.decode_frame(&packet).unwrap();
        let view = dec.plane_view(0).unwrap();
        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(view.data[row * view.pitch + col], 0x42);
            }
        }
    }

    /// 合成三平面彩色帧 (版本 g/h 无平面大小字段), 每个平面单块 FILL
    fn make_three_plane_frame(l: u8, u: u8, v: u8) -> Vec<u8> {
        let mut bw = BitWriter::new();
        write_fill_plane(&mut bw, 8, l);
        write_fill_plane(&mut bw, 8, u);
        write_fill_plane(&mut bw, 8, v);
        bw.finish()
    }

    fn plane_is_uniform(view: &PlaneView<'_>, v: u8) -> bool {
        (0..view.height)
            .all(|row| (0..view.width).all(|col| view.data[row * view.pitch + col] == v))
    }

    #[test]
    fn test_color_frame_decodes_all_planes() {
        let mut dec = BinkVideoDecoder::new(8, 8, Version::G, false, false).unwrap();
        dec.decode_frame(&make_three_plane_frame(0x11, 0x22, 0x33))
            .unwrap();
        // 版本 i 之前颜色带 0x80 偏置
        assert!(plane_is_uniform(&dec.plane_view(0).unwrap(), 0x91));
        assert!(plane_is_uniform(&dec.plane_view(1).unwrap(), 0xA2));
        assert!(plane_is_uniform(&dec.plane_view(2).unwrap(), 0xB3));
        let u = dec.plane_view(1).unwrap();
        assert_eq!((u.width, u.height), (4, 4));
    }

    #[test]
    fn test_color_frame_swaps_chroma_planes() {
        // 版本 h 起两个色度平面的解码顺序对调
        let mut dec = BinkVideoDecoder::new(8, 8, Version::H, false, false).unwrap();
        dec.decode_frame(&make_three_plane_frame(0x11, 0x22, 0x33))
            .unwrap();
        assert!(plane_is_uniform(&dec.plane_view(0).unwrap(), 0x91));
        assert!(plane_is_uniform(&dec.plane_view(2).unwrap(), 0xA2));
        assert!(plane_is_uniform(&dec.plane_view(1).unwrap(), 0xB3));
    }

    #[test]
    fn test_skip_block_preserves_previous_frame() {
        let mut dec = BinkVideoDecoder::new(8, 8, Version::I, true, false).unwrap();
        dec.decode_frame(&make_fill_frame(0x55)).unwrap();

        // 第二帧: 唯一块为 SKIP, 像素应与第一帧一致
        let mut bw = BitWriter::new();
        bw.write_bits(0, 32);
        write_plane_trees(&mut bw);
        bw.write_bits(1, len_bits(8, 3));
        bw.write_bit(0);
        bw.write_bits(0, 4); // SKIP
        bw.write_bits(0, len_bits(8, 4));
        bw.write_bits(0, 31 - (64u32 + 511).leading_zeros() + 1);
        bw.write_bits(0, 31 - (8u32 + 511).leading_zeros() + 1);
        bw.write_bits(0, len_bits(8, 3));
        bw.write_bits(0, len_bits(8, 3));
        bw.write_bits(0, len_bits(8, 3));
        bw.write_bits(0, len_bits(8, 3));
        bw.write_bits(0, 31 - (48u32 + 511).leading_zeros() + 1);
        bw.align32();
        dec.decode_frame(&bw.finish()).unwrap();

        let view = dec.plane_view(0).unwrap();
        for row in 0..8 {
            for col in 0..8 {
                assert_eq!(view.data[row * view.pitch + col], 0x55);
            }
        }
    }

    #[test]
    fn test_out_of_range_motion_rejected() {
        let mut dec = BinkVideoDecoder::new(8, 8, Version::I, true, false).unwrap();
        dec.decode_frame(&make_fill_frame(0x10)).unwrap();

        // 单块平面的参考偏移上界是 0, (7, 7) 的运动矢量必然越界
        let mut bw = BitWriter::new();
        bw.write_bits(0, 32);
        write_plane_trees(&mut bw);
        bw.write_bits(1, len_bits(8, 3));
        bw.write_bit(0);
        bw.write_bits(2, 4); // MOTION
        bw.write_bits(0, len_bits(8, 4));
        bw.write_bits(0, 31 - (64u32 + 511).leading_zeros() + 1); // 颜色
        bw.write_bits(0, 31 - (8u32 + 511).leading_zeros() + 1); // 图案
        for _ in 0..2 {
            // X / Y 偏移: 常量填充 7, 正号
            bw.write_bits(1, len_bits(8, 3));
            bw.write_bit(1);
            bw.write_bits(7, 4);
            bw.write_bit(0);
        }
        bw.write_bits(0, len_bits(8, 3));
        bw.write_bits(0, len_bits(8, 3));
        bw.write_bits(0, 31 - (48u32 + 511).leading_zeros() + 1);
        bw.align32();

        assert!(matches!(
            dec.decode_frame(&bw.finish()),
            Err(BinkError::InvalidData(_))
        ));
        // 失败的帧不交换缓冲, 画面保持上一帧
        let view = dec.plane_view(0).unwrap();
        assert_eq!(view.data[0], 0x10);
    }

    #[test]
    fn test_rejects_version_b() {
        assert!(matches!(
            BinkVideoDecoder::new(8, 8, Version::B, false, false),
            Err(BinkError::Unsupported(_))
        ));
    }

    #[test]
    fn test_rejects_bad_dimensions() {
        assert!(BinkVideoDecoder::new(0, 8, Version::I, false, false).is_err());
        assert!(BinkVideoDecoder::new(8, 0, Version::I, false, false).is_err());
    }

    #[test]
    fn test_chroma_planes_neutral_for_gray() {
        let dec = BinkVideoDecoder::new(8, 8, Version::I, true, false).unwrap();
        let u = dec.plane_view(1).unwrap();
        assert!(u.data.iter().all(|&p| p == 0x80));
        assert_eq!(u.width, 4);
        assert_eq!(u.height, 4);
    }
}
