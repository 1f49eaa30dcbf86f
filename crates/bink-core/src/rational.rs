//! 有理数类型, 用于帧率等场景.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// 容器头部以 `fps_numerator / fps_denominator` 两个整数描述帧率,
/// 用有理数原样保存, 避免过早的浮点舍入.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: u32,
    /// 分母
    pub den: u32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_f64() {
        assert_eq!(Rational::new(30, 1).to_f64(), 30.0);
        assert!((Rational::new(30000, 1001).to_f64() - 29.97).abs() < 0.01);
        assert!(Rational::new(1, 0).to_f64().is_nan());
    }
}
