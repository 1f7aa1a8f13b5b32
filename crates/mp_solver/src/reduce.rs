// crates/mp_solver/src/reduce.rs

//! 内部点并行归约
//!
//! 最大范数与内积，按 x 切片并行：每个切片先在本线程内
//! 以 f64 累加出部分结果，再由 rayon 以结合律合并。
//! 部分结果的合并顺序随线程数与调度变化，不保证可复现；
//! 测试必须使用容差比较而非逐位相等。
//!
//! 无论场精度是 f32 还是 f64，内部累加始终使用 f64，
//! 以控制大网格归约的舍入漂移，返回时收窄到场精度。
//!
//! 内部点为空的网格（任一轴长小于 3）返回 0。

use crate::grid::Field;
use mp_foundation::RuntimeScalar;
use rayon::prelude::*;

/// 内部点最大范数: max_i |x[i]|
pub fn norm_inf_interior<S: RuntimeScalar>(x: &Field<S>) -> S {
    let dims = x.dims();
    if dims.interior_len() == 0 {
        return S::ZERO;
    }
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let data = x.as_slice();

    let max = (1..nx - 1)
        .into_par_iter()
        .map(|i| {
            let base = i * slab;
            let mut local = 0.0f64;
            for j in 1..ny - 1 {
                let row = base + j * nz;
                for k in 1..nz - 1 {
                    let v = data[row + k].accum().abs();
                    if v > local {
                        local = v;
                    }
                }
            }
            local
        })
        .reduce(|| 0.0f64, f64::max);

    S::from_accum(max)
}

/// 内部点内积: sum_i x[i]*y[i]
///
/// 乘积在 f64 中计算并累加，返回时收窄到场精度。
pub fn inner_product_interior<S: RuntimeScalar>(x: &Field<S>, y: &Field<S>) -> S {
    debug_assert_eq!(x.dims(), y.dims());
    let dims = x.dims();
    if dims.interior_len() == 0 {
        return S::ZERO;
    }
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let x_data = x.as_slice();
    let y_data = y.as_slice();

    let sum = (1..nx - 1)
        .into_par_iter()
        .map(|i| {
            let base = i * slab;
            let mut local = 0.0f64;
            for j in 1..ny - 1 {
                let row = base + j * nz;
                for k in 1..nz - 1 {
                    let idx = row + k;
                    local += x_data[idx].accum() * y_data[idx].accum();
                }
            }
            local
        })
        .sum::<f64>();

    S::from_accum(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;

    fn dims() -> GridDims {
        GridDims::new(6, 6, 6).unwrap()
    }

    #[test]
    fn test_norm_non_negative_and_zero_iff_zero() {
        let zero = Field::<f32>::zeros(dims());
        assert_eq!(norm_inf_interior(&zero), 0.0);

        let mut field = Field::<f32>::zeros(dims());
        field.set(2, 3, 2, -1e-20);
        let nu = norm_inf_interior(&field);
        assert!(nu > 0.0);
    }

    #[test]
    fn test_norm_ignores_boundary() {
        let mut field = Field::<f64>::zeros(dims());
        field.set(0, 0, 0, 1e9);
        field.set(5, 5, 5, -1e9);
        assert_eq!(norm_inf_interior(&field), 0.0);
    }

    #[test]
    fn test_norm_picks_max_abs() {
        let mut field = Field::<f64>::zeros(dims());
        field.set(1, 1, 1, 3.0);
        field.set(3, 3, 3, -7.0);
        assert_eq!(norm_inf_interior(&field), 7.0);
    }

    #[test]
    fn test_inner_product_matches_norm_squared() {
        let field = Field::from_fn(dims(), |i, j, k| {
            (i as f32 * 0.3 - j as f32 * 0.1 + k as f32 * 0.07).sin()
        });

        let ip = inner_product_interior(&field, &field) as f64;

        // 串行参考累加
        let d = field.dims();
        let mut expected = 0.0f64;
        for i in 1..d.nx - 1 {
            for j in 1..d.ny - 1 {
                for k in 1..d.nz - 1 {
                    let v = field.get(i, j, k) as f64;
                    expected += v * v;
                }
            }
        }
        assert!((ip - expected).abs() <= expected.abs() * 1e-4 + 1e-12);
        assert!(ip >= 0.0);
    }

    #[test]
    fn test_inner_product_orthogonal() {
        let mut x = Field::<f64>::zeros(dims());
        let mut y = Field::<f64>::zeros(dims());
        x.set(1, 1, 1, 5.0);
        y.set(2, 2, 2, 5.0);
        assert_eq!(inner_product_interior(&x, &y), 0.0);
    }

    #[test]
    fn test_inner_product_f64_accumulation() {
        // f32 直接累加会显著丢失精度的构造：大量同号小值
        let field = Field::from_fn(dims(), |_, _, _| 0.1f32);
        let d = field.dims();
        let n = d.interior_len() as f64;
        let ip = inner_product_interior(&field, &field) as f64;
        let expected = n * (0.1f32 as f64) * (0.1f32 as f64);
        assert!((ip - expected).abs() <= expected * 1e-5);
    }

    #[test]
    fn test_empty_interior_returns_zero() {
        let flat = GridDims::new(2, 6, 6).unwrap();
        let field = Field::from_fn(flat, |_, _, _| 9.0f64);
        assert_eq!(norm_inf_interior(&field), 0.0);
        assert_eq!(inner_product_interior(&field, &field), 0.0);
    }
}
