// crates/mp_solver/src/pointwise.rs

//! 内部点逐点运算（BLAS Level 1 风格）
//!
//! 所有运算只写内部点，边界单元保持不变，与模板算子的读写模式一致。
//! 网格按 x 切片划分给 rayon 线程池，各线程写入互不相交的切片。
//!
//! # 函数列表
//!
//! - [`copy_interior`]: dst = src
//! - [`axpy_interior`]: y = α*x + y
//! - [`xpay_interior`]: y = x + α*y
//! - [`saxpy_interior`]: dst = α*x + y（dst 与 x、y 不同）
//!
//! 调用方保证各场维度一致；热路径用 `debug_assert` 校验。

use crate::grid::Field;
use mp_foundation::RuntimeScalar;
use rayon::prelude::*;

/// 内部点复制: dst = src
pub fn copy_interior<S: RuntimeScalar>(src: &Field<S>, dst: &mut Field<S>) {
    debug_assert_eq!(src.dims(), dst.dims());
    let dims = src.dims();
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let src_data = src.as_slice();

    dst.as_mut_slice()
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(i, dst_slab)| {
            if i == 0 || i + 1 >= nx {
                return;
            }
            let base = i * slab;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    dst_slab[row + k] = src_data[base + row + k];
                }
            }
        });
}

/// 内部点 AXPY: y = α*x + y
pub fn axpy_interior<S: RuntimeScalar>(alpha: S, x: &Field<S>, y: &mut Field<S>) {
    debug_assert_eq!(x.dims(), y.dims());
    let dims = x.dims();
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let x_data = x.as_slice();

    y.as_mut_slice()
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(i, y_slab)| {
            if i == 0 || i + 1 >= nx {
                return;
            }
            let base = i * slab;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    y_slab[row + k] += alpha * x_data[base + row + k];
                }
            }
        });
}

/// 内部点 XPAY: y = x + α*y
///
/// 搜索方向更新 `p = z + β*p` 的原地形式。
pub fn xpay_interior<S: RuntimeScalar>(x: &Field<S>, alpha: S, y: &mut Field<S>) {
    debug_assert_eq!(x.dims(), y.dims());
    let dims = x.dims();
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let x_data = x.as_slice();

    y.as_mut_slice()
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(i, y_slab)| {
            if i == 0 || i + 1 >= nx {
                return;
            }
            let base = i * slab;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    let idx = row + k;
                    y_slab[idx] = x_data[base + idx] + alpha * y_slab[idx];
                }
            }
        });
}

/// 内部点 SAXPY: dst = α*x + y
///
/// `dst` 必须是与 `x`、`y` 不同的场；别名场景使用
/// [`axpy_interior`] 或 [`xpay_interior`] 的原地形式。
pub fn saxpy_interior<S: RuntimeScalar>(alpha: S, x: &Field<S>, y: &Field<S>, dst: &mut Field<S>) {
    debug_assert_eq!(x.dims(), dst.dims());
    debug_assert_eq!(y.dims(), dst.dims());
    let dims = dst.dims();
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let x_data = x.as_slice();
    let y_data = y.as_slice();

    dst.as_mut_slice()
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(i, dst_slab)| {
            if i == 0 || i + 1 >= nx {
                return;
            }
            let base = i * slab;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    let idx = row + k;
                    dst_slab[idx] = alpha * x_data[base + idx] + y_data[base + idx];
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridDims;

    fn dims() -> GridDims {
        GridDims::new(5, 4, 4).unwrap()
    }

    #[test]
    fn test_copy_interior_only() {
        let src = Field::from_fn(dims(), |i, j, k| (i * 100 + j * 10 + k) as f64);
        let mut dst = Field::from_fn(dims(), |_, _, _| -1.0);

        copy_interior(&src, &mut dst);

        // 内部点被复制
        assert_eq!(dst.get(1, 1, 1), src.get(1, 1, 1));
        assert_eq!(dst.get(3, 2, 2), src.get(3, 2, 2));
        // 边界保持不变
        assert_eq!(dst.get(0, 0, 0), -1.0);
        assert_eq!(dst.get(4, 3, 3), -1.0);
        assert_eq!(dst.get(2, 0, 2), -1.0);
    }

    #[test]
    fn test_axpy() {
        let x = Field::from_fn(dims(), |_, _, _| 2.0f64);
        let mut y = Field::from_fn(dims(), |_, _, _| 1.0f64);

        axpy_interior(3.0, &x, &mut y);

        assert_eq!(y.get(2, 2, 2), 7.0);
        assert_eq!(y.get(0, 2, 2), 1.0); // 边界不变
    }

    #[test]
    fn test_xpay() {
        let x = Field::from_fn(dims(), |_, _, _| 1.0f64);
        let mut y = Field::from_fn(dims(), |_, _, _| 2.0f64);

        xpay_interior(&x, 3.0, &mut y);

        // y = 1 + 3*2 = 7
        assert_eq!(y.get(1, 2, 1), 7.0);
        assert_eq!(y.get(4, 2, 1), 2.0); // 边界不变
    }

    #[test]
    fn test_saxpy_zero_scale_is_copy_of_y() {
        let x = Field::from_fn(dims(), |i, _, _| i as f32 * 1.5);
        let y = Field::from_fn(dims(), |_, j, _| j as f32 * 0.25);
        let mut dst = Field::zeros(dims());

        saxpy_interior(0.0f32, &x, &y, &mut dst);

        // α = 0 时 dst 内部点与 y 逐位相等
        let d = dst.dims();
        for i in 1..d.nx - 1 {
            for j in 1..d.ny - 1 {
                for k in 1..d.nz - 1 {
                    assert_eq!(dst.get(i, j, k), y.get(i, j, k));
                }
            }
        }
    }

    #[test]
    fn test_saxpy_negative_scale() {
        let x = Field::from_fn(dims(), |_, _, _| 4.0f64);
        let y = Field::from_fn(dims(), |_, _, _| 10.0f64);
        let mut dst = Field::zeros(dims());

        saxpy_interior(-1.0, &x, &y, &mut dst);

        // dst = -4 + 10 = 6
        assert_eq!(dst.get(2, 1, 2), 6.0);
        assert_eq!(dst.get(0, 1, 2), 0.0);
    }

    #[test]
    fn test_empty_interior_noop() {
        let flat = GridDims::new(2, 4, 4).unwrap();
        let x = Field::from_fn(flat, |_, _, _| 1.0f64);
        let mut y = Field::from_fn(flat, |_, _, _| 5.0f64);

        axpy_interior(1.0, &x, &mut y);

        // 无内部点，场不变
        assert!(y.as_slice().iter().all(|&v| v == 5.0));
    }
}
