// crates/mp_foundation/src/scalar.rs

//! RuntimeScalar - 密封的标量类型抽象
//!
//! 提供编译期精度选择的唯一接口，支持求解核在 f32 和 f64 之间零成本切换。
//!
//! # 设计原则
//!
//! 1. **密封 Trait**: 只有 f32 和 f64 可以实现（通过 private::Sealed）
//! 2. **零成本抽象**: `#[inline]` + 编译期单态化
//! 3. **双精度归约**: 无论场精度如何，归约的中间累加始终通过
//!    [`RuntimeScalar::accum`] 提升到 f64，以控制大网格上的求和舍入漂移
//!
//! # 使用规范
//!
//! ```rust
//! use mp_foundation::RuntimeScalar;
//!
//! // 求解核使用泛型，累加走 f64
//! fn sum_squares<S: RuntimeScalar>(xs: &[S]) -> S {
//!     let acc: f64 = xs.iter().map(|&x| x.accum() * x.accum()).sum();
//!     S::from_accum(acc)
//! }
//! ```

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, NumAssign};

/// 密封模块，禁止外部实现
mod private {
    /// 密封 trait
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// 运行时标量类型（密封，仅 f32/f64 可实现）
///
/// 所有求解核必须使用此 trait 作为泛型边界，
/// 确保计算核心层可在 f32 和 f64 之间零成本切换。
///
/// # 实现类型
///
/// - `f32`: 内存占用减半，适合大规模网格；归约仍以 f64 累加
/// - `f64`: 高精度模式，适合科学验证
pub trait RuntimeScalar:
    private::Sealed
    + Pod
    + Float
    + FromPrimitive
    + NumAssign
    + Copy
    + Clone
    + Debug
    + Display
    + Send
    + Sync
    + Sum
    + Default
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
{
    /// 零值
    const ZERO: Self;
    /// 一
    const ONE: Self;
    /// 二
    const TWO: Self;
    /// 二分之一
    const HALF: Self;
    /// 机器精度
    const EPSILON: Self;
    /// 最小正值
    const MIN_POSITIVE: Self;
    /// 最大值
    const MAX: Self;
    /// 最小值
    const MIN: Self;

    /// 提升到 f64 累加精度
    fn accum(self) -> f64;

    /// 从 f64 累加结果收窄回场精度
    fn from_accum(value: f64) -> Self;

    /// 安全除法
    ///
    /// 当除数绝对值小于 MIN_POSITIVE 时返回 fallback
    #[inline]
    fn safe_div(self, rhs: Self, fallback: Self) -> Self {
        if rhs.abs() < Self::MIN_POSITIVE {
            fallback
        } else {
            self / rhs
        }
    }

    /// 检查是否有限（非 NaN、非 Inf）
    #[inline]
    fn is_safe(self) -> bool {
        self.is_finite()
    }

    /// 近似相等判断
    #[inline]
    fn approx_eq(self, other: Self, epsilon: Self) -> bool {
        (self - other).abs() < epsilon
    }

    /// 检查是否接近零
    #[inline]
    fn is_near_zero(self, epsilon: Self) -> bool {
        self.abs() < epsilon
    }

    /// 批量验证切片中所有值是否有限
    fn validate_slice(data: &[Self]) -> Result<(), (usize, Self)> {
        for (i, &v) in data.iter().enumerate() {
            if !v.is_safe() {
                return Err((i, v));
            }
        }
        Ok(())
    }
}

// =============================================================================
// f32 实现
// =============================================================================

impl RuntimeScalar for f32 {
    const ZERO: f32 = 0.0;
    const ONE: f32 = 1.0;
    const TWO: f32 = 2.0;
    const HALF: f32 = 0.5;
    const EPSILON: f32 = f32::EPSILON;
    const MIN_POSITIVE: f32 = f32::MIN_POSITIVE;
    const MAX: f32 = f32::MAX;
    const MIN: f32 = f32::MIN;

    #[inline]
    fn accum(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_accum(value: f64) -> Self {
        value as f32
    }
}

// =============================================================================
// f64 实现
// =============================================================================

impl RuntimeScalar for f64 {
    const ZERO: f64 = 0.0;
    const ONE: f64 = 1.0;
    const TWO: f64 = 2.0;
    const HALF: f64 = 0.5;
    const EPSILON: f64 = f64::EPSILON;
    const MIN_POSITIVE: f64 = f64::MIN_POSITIVE;
    const MAX: f64 = f64::MAX;
    const MIN: f64 = f64::MIN;

    #[inline]
    fn accum(self) -> f64 {
        self
    }

    #[inline]
    fn from_accum(value: f64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_constants() {
        assert_eq!(f32::ZERO, 0.0f32);
        assert_eq!(f32::ONE, 1.0f32);
        assert_eq!(f32::TWO, 2.0f32);
        assert_eq!(f32::HALF, 0.5f32);
    }

    #[test]
    fn test_f64_constants() {
        assert_eq!(f64::ZERO, 0.0f64);
        assert_eq!(f64::ONE, 1.0f64);
        assert_eq!(f64::TWO, 2.0f64);
        assert_eq!(f64::HALF, 0.5f64);
    }

    #[test]
    fn test_accum_round_trip() {
        let v = 9.81f32;
        assert_eq!(f32::from_accum(v.accum()), v);
        let w = 9.81f64;
        assert_eq!(f64::from_accum(w.accum()), w);
    }

    #[test]
    fn test_accum_precision() {
        // f32 乘积在 f64 中精确表示
        let a = 1.0000001f32;
        let product = a.accum() * a.accum();
        assert!((product - (a as f64) * (a as f64)).abs() == 0.0);
    }

    #[test]
    fn test_safe_div() {
        let x = 1.0f64;
        let y = 0.0f64;
        assert_eq!(x.safe_div(y, 999.0), 999.0);
        assert_eq!(x.safe_div(2.0, 999.0), 0.5);
    }

    #[test]
    fn test_validate_slice() {
        let data = vec![1.0f64, 2.0, 3.0];
        assert!(f64::validate_slice(&data).is_ok());

        let bad_data = vec![1.0f64, f64::NAN, 3.0];
        assert!(f64::validate_slice(&bad_data).is_err());
    }

    #[test]
    fn test_approx_eq() {
        let a = 1.0f64;
        let b = 1.0 + 1e-15;
        assert!(a.approx_eq(b, 1e-14));
        assert!(!a.approx_eq(b, 1e-16));
    }
}
