// crates/mp_solver/src/precondition.rs

//! 预条件器
//!
//! CG 引擎通过 [`Preconditioner`] 计算 `z = M⁻¹ r`。提供两个实现：
//!
//! - [`IdentityPreconditioner`]: M = I，即无预条件路径
//! - [`IncompleteFactor`]: 不完全 LU 分解（零填充，ILU(0)），
//!   应用时做一次前向替换和一次后向替换
//!
//! 三角替换沿行依赖链串行执行，apply 过程不分配内存。

use mp_foundation::{MpError, MpResult, RuntimeScalar};

use crate::csr::CsrMatrix;

// =============================================================================
// 预条件器 trait
// =============================================================================

/// 预条件算子: z = M⁻¹ r
///
/// `r` 与 `z` 为相同长度的平铺场切片。实现不得分配内存。
pub trait Preconditioner<S: RuntimeScalar>: Send + Sync {
    /// 应用预条件: z = M⁻¹ r
    fn apply(&self, r: &[S], z: &mut [S]);

    /// 预条件器名称（日志用）
    fn name(&self) -> &'static str;
}

/// 恒等预条件器（z = r）
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityPreconditioner;

impl<S: RuntimeScalar> Preconditioner<S> for IdentityPreconditioner {
    #[inline]
    fn apply(&self, r: &[S], z: &mut [S]) {
        debug_assert_eq!(r.len(), z.len());
        z.copy_from_slice(r);
    }

    #[inline]
    fn name(&self) -> &'static str {
        "identity"
    }
}

// =============================================================================
// 不完全 LU 分解
// =============================================================================

/// 不完全 LU 分解（零填充）
///
/// L 和 U 共用原矩阵的稀疏模式存储在 `lu_values` 中：
/// 对角线以下是 L 的严格下三角（L 的对角隐含为 1），
/// 对角线及以上是 U。`diag_ptr[i]` 指向第 i 行对角元在
/// 值数组中的位置。
///
/// 分解仅在模式内消元，丢弃全部填充项，因此 M = L*U 只是
/// 原矩阵的近似；对三对角等无填充模式则精确。
#[derive(Debug, Clone)]
pub struct IncompleteFactor<S: RuntimeScalar> {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu_values: Vec<S>,
    diag_ptr: Vec<usize>,
}

impl<S: RuntimeScalar> IncompleteFactor<S> {
    /// 对 CSR 方阵做 ILU(0) 分解
    ///
    /// # 错误
    ///
    /// - 矩阵非方阵
    /// - 某行缺少对角元
    /// - 消元过程中出现零或非有限主元
    pub fn from_matrix(matrix: &CsrMatrix<S>) -> MpResult<Self> {
        MpError::check_size("ilu matrix", matrix.n_rows(), matrix.n_cols())?;

        let n = matrix.n_rows();
        let row_ptr = matrix.row_ptr().to_vec();
        let col_idx = matrix.col_idx().to_vec();
        let mut lu_values = matrix.values().to_vec();

        // 定位每行对角元
        let mut diag_ptr = Vec::with_capacity(n);
        for row in 0..n {
            let start = row_ptr[row];
            let end = row_ptr[row + 1];
            let local = col_idx[start..end]
                .binary_search(&row)
                .map_err(|_| MpError::config(format!("ILU(0): 第 {row} 行缺少对角元")))?;
            diag_ptr.push(start + local);
        }

        // IKJ 顺序消元，只更新模式内的位置
        for i in 0..n {
            let row_start = row_ptr[i];
            let row_end = row_ptr[i + 1];

            for idx in row_start..diag_ptr[i] {
                let k = col_idx[idx];
                let pivot = lu_values[diag_ptr[k]];
                if !pivot.is_safe() || pivot == S::ZERO {
                    return Err(MpError::numerical_breakdown("ilu pivot", pivot.accum(), i));
                }
                let factor = lu_values[idx] / pivot;
                lu_values[idx] = factor;

                // 用第 k 行的 U 部分更新第 i 行中 k 之后的模式内位置
                let k_diag = diag_ptr[k];
                let k_end = row_ptr[k + 1];
                for jdx in (idx + 1)..row_end {
                    let j = col_idx[jdx];
                    if let Ok(local) = col_idx[(k_diag + 1)..k_end].binary_search(&j) {
                        let u_kj = lu_values[k_diag + 1 + local];
                        lu_values[jdx] -= factor * u_kj;
                    }
                }
            }

            let diag = lu_values[diag_ptr[i]];
            if !diag.is_safe() || diag == S::ZERO {
                return Err(MpError::numerical_breakdown("ilu pivot", diag.accum(), i));
            }
        }

        Ok(Self {
            n,
            row_ptr,
            col_idx,
            lu_values,
            diag_ptr,
        })
    }

    /// 从已有的分解数据创建
    ///
    /// 用于加载外部计算好的因子。校验数组长度和主元有效性。
    pub fn from_raw(
        n: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        lu_values: Vec<S>,
        diag_ptr: Vec<usize>,
    ) -> MpResult<Self> {
        MpError::check_size("ilu row_ptr", n + 1, row_ptr.len())?;
        MpError::check_size("ilu values", col_idx.len(), lu_values.len())?;
        MpError::check_size("ilu diag_ptr", n, diag_ptr.len())?;

        for (row, &d) in diag_ptr.iter().enumerate() {
            MpError::check_index("ilu diag", d, lu_values.len())?;
            if col_idx[d] != row {
                return Err(MpError::config(format!(
                    "ILU(0): diag_ptr[{row}] 指向列 {}",
                    col_idx[d]
                )));
            }
            let pivot = lu_values[d];
            if !pivot.is_safe() || pivot == S::ZERO {
                return Err(MpError::numerical_breakdown("ilu pivot", pivot.accum(), row));
            }
        }

        Ok(Self {
            n,
            row_ptr,
            col_idx,
            lu_values,
            diag_ptr,
        })
    }

    /// 未知数个数
    #[inline]
    pub fn len(&self) -> usize {
        self.n
    }

    /// 是否为空分解
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// 前向替换: 解 L y = b（L 单位对角）
    ///
    /// 行依赖前序行的结果，按行序串行执行。
    pub fn forward_solve(&self, b: &[S], y: &mut [S]) {
        debug_assert_eq!(b.len(), self.n);
        debug_assert_eq!(y.len(), self.n);

        for i in 0..self.n {
            let mut sum = b[i];
            for idx in self.row_ptr[i]..self.diag_ptr[i] {
                sum -= self.lu_values[idx] * y[self.col_idx[idx]];
            }
            y[i] = sum;
        }
    }

    /// 后向替换: 原地解 U z = y
    pub fn backward_solve(&self, y: &mut [S]) {
        debug_assert_eq!(y.len(), self.n);

        for i in (0..self.n).rev() {
            let mut sum = y[i];
            for idx in (self.diag_ptr[i] + 1)..self.row_ptr[i + 1] {
                sum -= self.lu_values[idx] * y[self.col_idx[idx]];
            }
            y[i] = sum / self.lu_values[self.diag_ptr[i]];
        }
    }
}

impl<S: RuntimeScalar> Preconditioner<S> for IncompleteFactor<S> {
    fn apply(&self, r: &[S], z: &mut [S]) {
        debug_assert_eq!(r.len(), self.n);
        debug_assert_eq!(z.len(), self.n);
        // z 先作为前向替换的输出，再原地完成后向替换
        self.forward_solve(r, z);
        self.backward_solve(z);
    }

    #[inline]
    fn name(&self) -> &'static str {
        "ilu0"
    }
}
