// crates/mp_solver/src/csr.rs

//! 压缩稀疏行（CSR）矩阵格式
//!
//! 为 7 点算子的矩阵后备路径和不完全分解预条件器提供
//! 固定结构的稀疏存储。不追求通用稀疏代数，仅保留
//! 求解器需要的构建、取值和矩阵-向量乘法。
//!
//! # 格式说明
//!
//! CSR 使用三个数组存储：
//! - `row_ptr`: 行指针，长度 n_rows + 1，row_ptr[i] 是第 i 行第一个非零元的索引
//! - `col_idx`: 列索引，与非零元一一对应（行内升序）
//! - `values`: 非零元值

use mp_foundation::RuntimeScalar;
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::grid::GridDims;

// =============================================================================
// 稀疏模式（与值分离，用于复用）
// =============================================================================

/// CSR 矩阵的稀疏模式
///
/// 存储矩阵的结构信息（哪些位置有非零元），与值分离。
#[derive(Debug, Clone)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 获取行指针切片
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// 获取列索引切片
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// 查找 (row, col) 对应的值索引
    ///
    /// 列索引行内有序，使用二分查找。
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        let indices = &self.col_idx[start..end];

        match indices.binary_search(&col) {
            Ok(local_idx) => Some(start + local_idx),
            Err(_) => None,
        }
    }
}

// =============================================================================
// CSR 矩阵主体
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone)]
pub struct CsrMatrix<S: RuntimeScalar> {
    pattern: CsrPattern,
    values: Vec<S>,
}

impl<S: RuntimeScalar> CsrMatrix<S> {
    /// 从原始 CSR 数据创建矩阵
    ///
    /// # 安全性
    ///
    /// - `row_ptr` 必须长度正确且最后一个元素等于 `col_idx.len()`
    /// - `col_idx` 和 `values` 长度必须相等
    pub fn from_raw(
        n_rows: usize,
        n_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<S>,
    ) -> Self {
        debug_assert_eq!(row_ptr.len(), n_rows + 1, "row_ptr 长度必须为 n_rows + 1");
        debug_assert_eq!(col_idx.len(), values.len(), "col_idx 和 values 长度必须相等");
        debug_assert_eq!(row_ptr[n_rows], col_idx.len(), "row_ptr 末尾必须等于 nnz");

        Self {
            pattern: CsrPattern {
                n_rows,
                n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 获取行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows()
    }

    /// 获取列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols()
    }

    /// 获取非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 获取稀疏模式引用
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// 获取值切片
    #[inline]
    pub fn values(&self) -> &[S] {
        &self.values
    }

    /// 获取行指针
    #[inline]
    pub fn row_ptr(&self) -> &[usize] {
        self.pattern.row_ptr()
    }

    /// 获取列索引
    #[inline]
    pub fn col_idx(&self) -> &[usize] {
        self.pattern.col_idx()
    }

    /// 获取 (row, col) 位置的值（如果不存在返回 0）
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> S {
        self.pattern
            .find_index(row, col)
            .map_or(S::ZERO, |idx| self.values[idx])
    }

    /// 获取对角元素值（第 row 行）
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<S> {
        self.pattern.find_index(row, row).map(|idx| self.values[idx])
    }

    /// 矩阵-向量乘法 y = A * x（串行）
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for row in 0..self.n_rows() {
            let start = self.pattern.row_ptr[row];
            let end = self.pattern.row_ptr[row + 1];

            let mut sum = S::ZERO;
            for idx in start..end {
                let col = self.pattern.col_idx[idx];
                sum += self.values[idx] * x[col];
            }
            y[row] = sum;
        }
    }

    /// 并行矩阵-向量乘法 y = A * x
    ///
    /// 按行划分给 rayon 线程池，各线程写入互不相交的行。
    ///
    /// # Panics
    /// - `x.len() != self.n_cols()`
    /// - `y.len() != self.n_rows()`
    pub fn mul_vec_parallel(&self, x: &[S], y: &mut [S]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        y.par_iter_mut().enumerate().for_each(|(row, out)| {
            let start = self.pattern.row_ptr[row];
            let end = self.pattern.row_ptr[row + 1];

            let mut sum = S::ZERO;
            for idx in start..end {
                let col = self.pattern.col_idx[idx];
                sum += self.values[idx] * x[col];
            }
            *out = sum;
        });
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// CSR 矩阵构建器
///
/// 使用 BTreeMap 临时存储，构建时转换为紧凑 CSR 格式。
/// 适合逐元素构建，列索引自动保持行内有序。
pub struct CsrBuilder<S: RuntimeScalar> {
    n_rows: usize,
    n_cols: usize,
    rows: Vec<BTreeMap<usize, S>>,
}

impl<S: RuntimeScalar> CsrBuilder<S> {
    /// 创建方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 创建构建器
    ///
    /// # Panics
    /// - `n_rows == 0` 或 `n_cols == 0`（空矩阵无意义）
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        assert!(n_rows > 0, "行数必须大于 0");
        assert!(n_cols > 0, "列数必须大于 0");

        Self {
            n_rows,
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 设置 (row, col) 的值（覆盖）
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn set(&mut self, row: usize, col: usize, value: S) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// - `row >= n_rows` 或 `col >= n_cols`
    pub fn add(&mut self, row: usize, col: usize, value: S) {
        assert!(row < self.n_rows, "行索引越界");
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(S::ZERO) += value;
    }

    /// 获取当前非零元总数
    #[inline]
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// 构建 CSR 矩阵（消耗构建器）
    pub fn build(self) -> CsrMatrix<S> {
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(self.n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);

        for row_map in self.rows {
            for (col, val) in row_map {
                col_idx.push(col);
                values.push(val);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows: self.n_rows,
                n_cols: self.n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }
}

// =============================================================================
// 7 点算子装配
// =============================================================================

/// 装配全网格 7 点算子矩阵
///
/// 行与列覆盖包括边界层在内的全部单元：
/// - 内部行: 中心 -6，六个相邻单元各 +1
/// - 边界行: 对角 1（哨兵单元保持自身值，也为分解提供非零主元）
///
/// 对边界值为零的场，乘此矩阵与无矩阵模板算子逐位一致。
pub fn laplacian_matrix<S: RuntimeScalar>(dims: GridDims) -> CsrMatrix<S> {
    let n = dims.len();
    let mut builder = CsrBuilder::<S>::new_square(n);
    let center = S::from_accum(-6.0);

    for i in 0..dims.nx {
        for j in 0..dims.ny {
            for k in 0..dims.nz {
                let row = dims.index(i, j, k);
                if !dims.is_interior(i, j, k) {
                    builder.set(row, row, S::ONE);
                    continue;
                }
                builder.add(row, row, center);
                let (si, sj, sk) = (i as isize, j as isize, k as isize);
                let neighbors = [
                    dims.clamped_index(si + 1, sj, sk),
                    dims.clamped_index(si - 1, sj, sk),
                    dims.clamped_index(si, sj + 1, sk),
                    dims.clamped_index(si, sj - 1, sk),
                    dims.clamped_index(si, sj, sk + 1),
                    dims.clamped_index(si, sj, sk - 1),
                ];
                for col in neighbors {
                    builder.add(row, col, S::ONE);
                }
            }
        }
    }

    builder.build()
}

// =============================================================================
// 测试
// =============================================================================
