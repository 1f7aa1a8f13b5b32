// crates/mp_dense/src/lib.rs

//! 稠密矩阵乘法微基准核
//!
//! n×n 行主序方阵乘法 `C = A · B`，用于对比机器的稠密浮点
//! 吞吐与模板求解核的内存受限吞吐。提供并行候选实现、
//! 朴素串行参考实现和逐元最大偏差校验。
//!
//! 候选实现按行并行，内层按 ikj 顺序遍历使 B 与 C 的访问
//! 连续；与参考实现的求和顺序不同，校验须用容差而非逐位比较。

#![warn(missing_docs)]
#![warn(clippy::all)]

use mp_foundation::RuntimeScalar;
use rayon::prelude::*;

/// 并行矩阵乘法: C = A · B（n×n 行主序）
///
/// # Panics
/// 三个切片长度不等于 `n * n` 时 panic。
pub fn mat_mat_multiply<S: RuntimeScalar>(a: &[S], b: &[S], c: &mut [S], n: usize) {
    assert_eq!(a.len(), n * n, "A 长度必须为 n*n");
    assert_eq!(b.len(), n * n, "B 长度必须为 n*n");
    assert_eq!(c.len(), n * n, "C 长度必须为 n*n");

    c.par_chunks_mut(n).enumerate().for_each(|(i, c_row)| {
        c_row.fill(S::ZERO);
        let a_row = &a[i * n..(i + 1) * n];
        for (l, &a_il) in a_row.iter().enumerate() {
            let b_row = &b[l * n..(l + 1) * n];
            for (c_ij, &b_lj) in c_row.iter_mut().zip(b_row.iter()) {
                *c_ij += a_il * b_lj;
            }
        }
    });
}

/// 朴素串行参考实现: C = A · B（ijk 顺序，内积形式）
///
/// # Panics
/// 三个切片长度不等于 `n * n` 时 panic。
pub fn mat_mat_multiply_reference<S: RuntimeScalar>(a: &[S], b: &[S], c: &mut [S], n: usize) {
    assert_eq!(a.len(), n * n, "A 长度必须为 n*n");
    assert_eq!(b.len(), n * n, "B 长度必须为 n*n");
    assert_eq!(c.len(), n * n, "C 长度必须为 n*n");

    for i in 0..n {
        for j in 0..n {
            let mut sum = S::ZERO;
            for l in 0..n {
                sum += a[i * n + l] * b[l * n + j];
            }
            c[i * n + j] = sum;
        }
    }
}

/// 逐元最大绝对偏差（f64 累加精度）
///
/// # Panics
/// 两个切片长度不等时 panic。
pub fn max_abs_difference<S: RuntimeScalar>(x: &[S], y: &[S]) -> f64 {
    assert_eq!(x.len(), y.len(), "比较的切片长度必须相等");

    x.par_iter()
        .zip(y.par_iter())
        .map(|(&a, &b)| (a.accum() - b.accum()).abs())
        .reduce(|| 0.0f64, f64::max)
}
