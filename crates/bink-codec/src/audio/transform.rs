//! 频域到时域的逆变换.
//!
//! 两种变换都采用直接求值的参考实现 (O(n^2)), 频谱长度固定为 2 的幂
//! (512/1024/2048), 在这个量级下仍然足够快, 且不引入额外依赖.
//!
//! 逆实数 DFT 的输入是紧凑排布的半谱: `c[0]` 为直流分量实部,
//! `c[1]` 为奈奎斯特分量实部, 其后按 (实部, 虚部) 成对排列
//! 第 1 到 n/2-1 号频点. 输出约定为
//!
//! ```text
//! x[j] = 0.5*c[0] + 0.5*(-1)^j*c[1]
//!        + sum_{k=1}^{n/2-1} (re_k*cos(2*pi*j*k/n) - im_k*sin(2*pi*j*k/n))
//! ```
//!
//! DCT-III 的 0 号系数预先折半, 输出整体乘以 n:
//!
//! ```text
//! x[j] = n * (0.5*c[0] + sum_{k=1}^{n-1} c[k]*cos(pi*k*(2j+1)/(2n)))
//! ```

use std::f64::consts::PI;

/// 原地计算紧凑半谱的逆实数 DFT
pub fn inverse_rdft(buf: &mut [f32]) {
    let n = buf.len();
    debug_assert!(n.is_power_of_two() && n >= 4);
    let half = n / 2;

    let mut out = vec![0f32; n];
    let step = 2.0 * PI / n as f64;
    for (j, o) in out.iter_mut().enumerate() {
        let mut acc = 0.5 * f64::from(buf[0]);
        if j & 1 == 0 {
            acc += 0.5 * f64::from(buf[1]);
        } else {
            acc -= 0.5 * f64::from(buf[1]);
        }
        for k in 1..half {
            let phase = step * (j * k) as f64;
            acc += f64::from(buf[2 * k]) * phase.cos() - f64::from(buf[2 * k + 1]) * phase.sin();
        }
        *o = acc as f32;
    }
    buf.copy_from_slice(&out);
}

/// 原地计算 DCT-III (0 号系数折半, 输出乘以 n)
pub fn inverse_dct3(buf: &mut [f32]) {
    let n = buf.len();
    debug_assert!(n.is_power_of_two() && n >= 4);

    let mut out = vec![0f32; n];
    let step = PI / (2 * n) as f64;
    for (j, o) in out.iter_mut().enumerate() {
        let mut acc = 0.5 * f64::from(buf[0]);
        for k in 1..n {
            acc += f64::from(buf[k]) * (step * (k * (2 * j + 1)) as f64).cos();
        }
        *o = (acc * n as f64) as f32;
    }
    buf.copy_from_slice(&out);
}
