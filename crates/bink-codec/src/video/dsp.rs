//! 块级信号处理: 整数 IDCT、DCT 系数与残差的位平面解码、像素搬运.
//!
//! IDCT 是定点 8x8 二维变换: 先列后行, 常数为 11 位定点缩放的
//! 旋转因子, 行输出带 `(x + 0x7F) >> 8` 的归一化. 全零 AC 的列走
//! 直接广播的快速路径.
//!
//! 系数解码用 128 槽的工作列表模拟四叉细分: 每个表项是 (起始系数,
//! 模式), 自高位向低位逐位平面细化, 模式 3 的单系数表项会被压入
//! 列表前端在后续位平面处理.

use bink_core::bitreader::BitReader;
use bink_core::BinkResult;

use super::tables::SCAN_ORDER;

const A1: i32 = 2896; // (1/sqrt(2)) << 12
const A2: i32 = 2217;
const A3: i32 = 3784;
const A4: i32 = -5352;

/// 8 点一维蝶形变换 (不含归一化)
#[inline]
fn idct_transform(s: [i32; 8]) -> [i32; 8] {
    let a0 = s[0] + s[4];
    let a1 = s[0] - s[4];
    let a2 = s[2] + s[6];
    let a3 = (A1 * (s[2] - s[6])) >> 11;
    let a4 = s[5] + s[3];
    let a5 = s[5] - s[3];
    let a6 = s[1] + s[7];
    let a7 = s[1] - s[7];
    let b0 = a4 + a6;
    let b1 = (A3 * (a5 + a7)) >> 11;
    let b2 = ((A4 * a5) >> 11) - b0 + b1;
    let b3 = ((A1 * (a6 - a4)) >> 11) - b2;
    let b4 = ((A2 * a7) >> 11) + b3 - b1;
    [
        a0 + a2 + b0,
        a1 + a3 - a2 + b2,
        a1 - a3 + a2 + b3,
        a0 - a2 - b4,
        a0 - a2 + b4,
        a1 - a3 + a2 - b3,
        a1 + a3 - a2 - b2,
        a0 + a2 - b0,
    ]
}

/// 行归一化
#[inline]
fn munge_row(x: i32) -> i32 {
    (x + 0x7F) >> 8
}

/// 对块做完整二维 IDCT, 输出行已归一化
fn idct_2d(block: &[i32; 64]) -> [i32; 64] {
    let mut temp = [0i32; 64];
    for col in 0..8 {
        // AC 全零的列直接广播 DC
        if (1..8).all(|r| block[col + r * 8] == 0) {
            for r in 0..8 {
                temp[col + r * 8] = block[col];
            }
        } else {
            let out = idct_transform(std::array::from_fn(|r| block[col + r * 8]));
            for r in 0..8 {
                temp[col + r * 8] = out[r];
            }
        }
    }
    let mut result = [0i32; 64];
    for row in 0..8 {
        let out = idct_transform(std::array::from_fn(|c| temp[row * 8 + c]));
        for c in 0..8 {
            result[row * 8 + c] = munge_row(out[c]);
        }
    }
    result
}

/// IDCT 后把 8x8 结果直接写入平面
pub(crate) fn idct_put(dst: &mut [u8], offset: usize, stride: usize, block: &[i32; 64]) {
    let pix = idct_2d(block);
    for row in 0..8 {
        let base = offset + row * stride;
        for col in 0..8 {
            dst[base + col] = pix[row * 8 + col] as u8;
        }
    }
}

/// IDCT 后把 8x8 结果叠加到平面已有像素上 (低 8 位回绕)
pub(crate) fn idct_add(dst: &mut [u8], offset: usize, stride: usize, block: &[i32; 64]) {
    let pix = idct_2d(block);
    for row in 0..8 {
        let base = offset + row * stride;
        for col in 0..8 {
            dst[base + col] = (i32::from(dst[base + col]) + pix[row * 8 + col]) as u8;
        }
    }
}

/// 把 8x8 子块放大为 16x16 (横纵各复制一次)
pub(crate) fn scale_block(src: &[u8; 64], dst: &mut [u8], offset: usize, stride: usize) {
    for row in 0..8 {
        let base = offset + row * 2 * stride;
        for col in 0..8 {
            let v = src[row * 8 + col];
            dst[base + col * 2] = v;
            dst[base + col * 2 + 1] = v;
            dst[base + stride + col * 2] = v;
            dst[base + stride + col * 2 + 1] = v;
        }
    }
}

/// 跨缓冲的 8x8 块复制
pub(crate) fn copy_block_from(
    dst: &mut [u8],
    dst_offset: usize,
    src: &[u8],
    src_offset: usize,
    stride: usize,
) {
    for row in 0..8 {
        dst[dst_offset + row * stride..dst_offset + row * stride + 8]
            .copy_from_slice(&src[src_offset + row * stride..src_offset + row * stride + 8]);
    }
}

/// 从参考块复制并叠加残差块 (低 8 位回绕)
pub(crate) fn add_block_from(
    dst: &mut [u8],
    dst_offset: usize,
    src: &[u8],
    src_offset: usize,
    stride: usize,
    residue: &[i32; 64],
) {
    for row in 0..8 {
        for col in 0..8 {
            let v = i32::from(src[src_offset + row * stride + col]) + residue[row * 8 + col];
            dst[dst_offset + row * stride + col] = v as u8;
        }
    }
}

/// 在指定位平面读取一个系数值
#[inline]
fn read_coef(br: &mut BitReader, nbits: i32, mask: i32) -> BinkResult<i32> {
    if nbits <= 0 {
        Ok(1 - ((br.read_bit()? as i32) << 1))
    } else {
        let t = br.read_bits(nbits as u32)? as i32 | mask;
        Ok(if br.read_bool()? { -t } else { t })
    }
}

/// 解码一个 8x8 块的 DCT 系数并反量化
///
/// `q` 为 `None` 时量化级从码流读取 (4 位), 否则使用给定级别.
/// 系数按扫描顺序写入 `block`, 反量化对 DC 与本次解出的系数做
/// `(c * quant) >> 11`.
pub(crate) fn read_dct_coefficients(
    br: &mut BitReader,
    block: &mut [i32; 64],
    quant_matrices: &[[i32; 64]; 16],
    q: Option<usize>,
) -> BinkResult<()> {
    let mut coef_list = [0i32; 128];
    let mut mode_list = [0i32; 128];
    let mut list_start = 64usize;
    let mut list_end = 64usize;
    let mut coef_idx = [0usize; 64];
    let mut coef_count = 0usize;

    for &(c, m) in &[(4, 0), (24, 0), (44, 0), (1, 3), (2, 3), (3, 3)] {
        coef_list[list_end] = c;
        mode_list[list_end] = m;
        list_end += 1;
    }

    let mut nbits = br.read_bits(4)? as i32 - 1;
    let mut mask = if nbits >= 0 { 1i32 << nbits } else { 0 };

    while nbits >= 0 {
        let mut list_pos = list_start;
        while list_pos < list_end {
            if (mode_list[list_pos] | coef_list[list_pos]) == 0 || !br.read_bool()? {
                list_pos += 1;
                continue;
            }
            let mut ccoef = coef_list[list_pos] as usize;
            let mode = mode_list[list_pos];
            match mode {
                0 | 2 => {
                    if mode == 0 {
                        // 细分为 4 个系数, 本表项降级为模式 1 待下次访问
                        coef_list[list_pos] = ccoef as i32 + 4;
                        mode_list[list_pos] = 1;
                    } else {
                        coef_list[list_pos] = 0;
                        mode_list[list_pos] = 0;
                        list_pos += 1;
                    }
                    for _ in 0..4 {
                        if br.read_bool()? {
                            // 压入前端, 在更低的位平面单独解码
                            list_start -= 1;
                            coef_list[list_start] = ccoef as i32;
                            mode_list[list_start] = 3;
                        } else {
                            block[SCAN_ORDER[ccoef]] = read_coef(br, nbits, mask)?;
                            coef_idx[coef_count] = ccoef;
                            coef_count += 1;
                        }
                        ccoef += 1;
                    }
                }
                1 => {
                    mode_list[list_pos] = 2;
                    for _ in 0..3 {
                        ccoef += 4;
                        coef_list[list_end] = ccoef as i32;
                        mode_list[list_end] = 2;
                        list_end += 1;
                    }
                }
                _ => {
                    block[SCAN_ORDER[ccoef]] = read_coef(br, nbits, mask)?;
                    coef_idx[coef_count] = ccoef;
                    coef_count += 1;
                    coef_list[list_pos] = 0;
                    mode_list[list_pos] = 0;
                    list_pos += 1;
                }
            }
        }
        mask >>= 1;
        nbits -= 1;
    }

    let quant_idx = match q {
        Some(q) => q,
        None => br.read_bits(4)? as usize,
    };
    let quant = &quant_matrices[quant_idx];

    block[0] = (block[0] * quant[0]) >> 11;
    for &idx in coef_idx.iter().take(coef_count) {
        block[SCAN_ORDER[idx]] = (block[SCAN_ORDER[idx]] * quant[idx]) >> 11;
    }
    Ok(())
}

/// 解码运动补偿后的残差块
///
/// `masks_count` 限制本块允许解出的非零位总数, 预算耗尽立即停止.
/// 每个位平面先对已有非零系数做 ±mask 的细化, 再走列表发现新系数.
pub(crate) fn read_residue(
    br: &mut BitReader,
    block: &mut [i32; 64],
    mut masks_count: i32,
) -> BinkResult<()> {
    let mut coef_list = [0i32; 128];
    let mut mode_list = [0i32; 128];
    let mut list_start = 64usize;
    let mut list_end = 64usize;
    let mut nz_coeff = [0usize; 64];
    let mut nz_count = 0usize;

    for &(c, m) in &[(4, 0), (24, 0), (44, 0), (0, 2)] {
        coef_list[list_end] = c;
        mode_list[list_end] = m;
        list_end += 1;
    }

    let mut mask = 1i32 << br.read_bits(3)?;
    while mask != 0 {
        // 细化已发现的非零系数
        for i in 0..nz_count {
            if !br.read_bool()? {
                continue;
            }
            if block[nz_coeff[i]] < 0 {
                block[nz_coeff[i]] -= mask;
            } else {
                block[nz_coeff[i]] += mask;
            }
            masks_count -= 1;
            if masks_count < 0 {
                return Ok(());
            }
        }

        let mut list_pos = list_start;
        while list_pos < list_end {
            if (coef_list[list_pos] | mode_list[list_pos]) == 0 || !br.read_bool()? {
                list_pos += 1;
                continue;
            }
            let mut ccoef = coef_list[list_pos] as usize;
            let mode = mode_list[list_pos];
            match mode {
                0 | 2 => {
                    if mode == 0 {
                        coef_list[list_pos] = ccoef as i32 + 4;
                        mode_list[list_pos] = 1;
                    } else {
                        coef_list[list_pos] = 0;
                        mode_list[list_pos] = 0;
                        list_pos += 1;
                    }
                    for _ in 0..4 {
                        if br.read_bool()? {
                            list_start -= 1;
                            coef_list[list_start] = ccoef as i32;
                            mode_list[list_start] = 3;
                        } else {
                            nz_coeff[nz_count] = SCAN_ORDER[ccoef];
                            nz_count += 1;
                            let neg = br.read_bool()?;
                            block[SCAN_ORDER[ccoef]] = if neg { -mask } else { mask };
                            masks_count -= 1;
                            if masks_count < 0 {
                                return Ok(());
                            }
                        }
                        ccoef += 1;
                    }
                }
                1 => {
                    mode_list[list_pos] = 2;
                    for _ in 0..3 {
                        ccoef += 4;
                        coef_list[list_end] = ccoef as i32;
                        mode_list[list_end] = 2;
                        list_end += 1;
                    }
                }
                _ => {
                    nz_coeff[nz_count] = SCAN_ORDER[ccoef];
                    nz_count += 1;
                    let neg = br.read_bool()?;
                    block[SCAN_ORDER[ccoef]] = if neg { -mask } else { mask };
                    coef_list[list_pos] = 0;
                    mode_list[list_pos] = 0;
                    list_pos += 1;
                    masks_count -= 1;
                    if masks_count < 0 {
                        return Ok(());
                    }
                }
            }
        }
        mask >>= 1;
    }
    Ok(())
}
