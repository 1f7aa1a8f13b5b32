// crates/mp_solver/src/operator.rs

//! 线性算子抽象
//!
//! CG 引擎通过 [`LinearOperator`] 访问系统矩阵，不关心其表示形式。
//! 提供两个实现：
//!
//! - [`LaplaceStencil`]: 无矩阵 7 点模板，热路径默认选择
//! - [`CsrOperator`]: 显式 CSR 矩阵后备路径，用于交叉验证和
//!   非模板系数的扩展场景
//!
//! 两者对边界值为零的场逐位一致（见各自测试）。

use mp_foundation::{MpError, MpResult, RuntimeScalar};
use rayon::prelude::*;

use crate::csr::{laplacian_matrix, CsrMatrix};
use crate::grid::{check_same_dims, Field, GridDims};

// =============================================================================
// 算子 trait
// =============================================================================

/// 网格上的线性算子
///
/// `apply` 计算 `lu = L(u)`，只写内部点，边界单元保持不变。
/// 实现必须是 `Send + Sync`，算子在求解期间被 rayon 线程池共享。
pub trait LinearOperator<S: RuntimeScalar>: Send + Sync {
    /// 算子作用的网格维度
    fn dims(&self) -> GridDims;

    /// 应用算子: lu = L(u)
    fn apply(&self, u: &Field<S>, lu: &mut Field<S>) -> MpResult<()>;

    /// 算子名称（日志用）
    fn name(&self) -> &'static str;
}

// =============================================================================
// 无矩阵 7 点模板
// =============================================================================

/// 无矩阵 7 点 Laplace 模板
///
/// `L(u) = -6*u[c] + u[x±1] + u[y±1] + u[z±1]`，
/// 越界邻居通过钳制索引读取边界哨兵值（边复制语义）。
#[derive(Debug, Clone, Copy)]
pub struct LaplaceStencil {
    dims: GridDims,
}

impl LaplaceStencil {
    /// 创建模板算子
    pub fn new(dims: GridDims) -> Self {
        Self { dims }
    }
}

impl<S: RuntimeScalar> LinearOperator<S> for LaplaceStencil {
    #[inline]
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn apply(&self, u: &Field<S>, lu: &mut Field<S>) -> MpResult<()> {
        check_same_dims("stencil input", self.dims, u.dims())?;
        check_same_dims("stencil output", self.dims, lu.dims())?;

        let dims = self.dims;
        let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
        let slab = dims.slab_len();
        let six = S::from_accum(6.0);
        let u_data = u.as_slice();

        lu.as_mut_slice()
            .par_chunks_mut(slab)
            .enumerate()
            .for_each(|(i, lu_slab)| {
                if i == 0 || i + 1 >= nx {
                    return;
                }
                let si = i as isize;
                for j in 1..ny - 1 {
                    let sj = j as isize;
                    let row = j * nz;
                    for k in 1..nz - 1 {
                        let sk = k as isize;
                        let center = u_data[dims.index(i, j, k)];
                        let sum = u_data[dims.clamped_index(si + 1, sj, sk)]
                            + u_data[dims.clamped_index(si - 1, sj, sk)]
                            + u_data[dims.clamped_index(si, sj + 1, sk)]
                            + u_data[dims.clamped_index(si, sj - 1, sk)]
                            + u_data[dims.clamped_index(si, sj, sk + 1)]
                            + u_data[dims.clamped_index(si, sj, sk - 1)];
                        lu_slab[row + k] = sum - six * center;
                    }
                }
            });

        Ok(())
    }

    #[inline]
    fn name(&self) -> &'static str {
        "laplace-stencil"
    }
}

// =============================================================================
// CSR 后备路径
// =============================================================================

/// 基于显式 CSR 矩阵的算子
///
/// 矩阵覆盖包括边界在内的全部单元（边界行为单位对角），
/// `apply` 对整个平铺场做并行矩阵-向量乘法。
pub struct CsrOperator<S: RuntimeScalar> {
    matrix: CsrMatrix<S>,
    dims: GridDims,
}

impl<S: RuntimeScalar> CsrOperator<S> {
    /// 从矩阵创建算子
    ///
    /// 矩阵必须是 `dims.len()` 阶方阵。
    pub fn new(matrix: CsrMatrix<S>, dims: GridDims) -> MpResult<Self> {
        MpError::check_size("csr operator rows", dims.len(), matrix.n_rows())?;
        MpError::check_size("csr operator cols", dims.len(), matrix.n_cols())?;
        Ok(Self { matrix, dims })
    }

    /// 装配 7 点算子矩阵并创建算子
    pub fn laplacian(dims: GridDims) -> Self {
        Self {
            matrix: laplacian_matrix(dims),
            dims,
        }
    }

    /// 底层矩阵引用
    #[inline]
    pub fn matrix(&self) -> &CsrMatrix<S> {
        &self.matrix
    }
}

impl<S: RuntimeScalar> LinearOperator<S> for CsrOperator<S> {
    #[inline]
    fn dims(&self) -> GridDims {
        self.dims
    }

    fn apply(&self, u: &Field<S>, lu: &mut Field<S>) -> MpResult<()> {
        check_same_dims("csr input", self.dims, u.dims())?;
        check_same_dims("csr output", self.dims, lu.dims())?;
        self.matrix.mul_vec_parallel(u.as_slice(), lu.as_mut_slice());
        Ok(())
    }

    #[inline]
    fn name(&self) -> &'static str {
        "csr-laplacian"
    }
}
