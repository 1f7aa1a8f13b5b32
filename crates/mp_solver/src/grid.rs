// crates/mp_solver/src/grid.rs

//! 网格维度与三维标量场
//!
//! 提供结构网格的维度描述 [`GridDims`]、三维标量场 [`Field`]
//! 和融合求解器使用的 [`DoubleBuffer`]。
//!
//! # 布局
//!
//! 场以行主序平铺存储：`index(i,j,k) = (i * ny + j) * nz + k`。
//! 每个轴包含一层边界单元；内部点是各轴严格位于 `1..n-1` 的索引。
//! 求解核只写内部点，边界值作为只读哨兵由模板通过钳制索引读取。
//!
//! # 边界语义
//!
//! 越界邻居索引通过 [`GridDims::clamped_index`] 钳制到最近的合法
//! 边界索引（边复制语义）。所有网格遍历组件共用这一个钳制辅助函数，
//! 保证边界语义处处一致。

use mp_foundation::{MpError, MpResult, RuntimeScalar};
use serde::{Deserialize, Serialize};

// =============================================================================
// 网格维度
// =============================================================================

/// 网格维度（含边界层）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridDims {
    /// x 方向单元数
    pub nx: usize,
    /// y 方向单元数
    pub ny: usize,
    /// z 方向单元数
    pub nz: usize,
}

impl Default for GridDims {
    fn default() -> Self {
        Self { nx: 1, ny: 1, nz: 1 }
    }
}

impl GridDims {
    /// 创建网格维度
    ///
    /// 各轴至少 1 个单元；小于 3 的轴没有内部点。
    pub fn new(nx: usize, ny: usize, nz: usize) -> MpResult<Self> {
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(MpError::invalid_config(
                "dims",
                format!("{nx}x{ny}x{nz}"),
                "各轴单元数必须大于 0",
            ));
        }
        Ok(Self { nx, ny, nz })
    }

    /// 总单元数（含边界）
    #[inline]
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 内部点数量
    #[inline]
    pub fn interior_len(&self) -> usize {
        self.nx.saturating_sub(2) * self.ny.saturating_sub(2) * self.nz.saturating_sub(2)
    }

    /// 一个 x 切片的单元数
    #[inline]
    pub fn slab_len(&self) -> usize {
        self.ny * self.nz
    }

    /// 行主序线性索引
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny && k < self.nz);
        (i * self.ny + j) * self.nz + k
    }

    /// 钳制后的线性索引（边复制语义）
    ///
    /// 所有模板遍历必须通过此函数访问邻居，保证边界语义唯一。
    #[inline]
    pub fn clamped_index(&self, i: isize, j: isize, k: isize) -> usize {
        let ci = Self::clamp_axis(i, self.nx);
        let cj = Self::clamp_axis(j, self.ny);
        let ck = Self::clamp_axis(k, self.nz);
        (ci * self.ny + cj) * self.nz + ck
    }

    #[inline]
    fn clamp_axis(v: isize, n: usize) -> usize {
        if v < 0 {
            0
        } else if v as usize >= n {
            n - 1
        } else {
            v as usize
        }
    }

    /// 判断索引是否为内部点
    #[inline]
    pub fn is_interior(&self, i: usize, j: usize, k: usize) -> bool {
        i >= 1 && i + 1 < self.nx && j >= 1 && j + 1 < self.ny && k >= 1 && k + 1 < self.nz
    }
}

/// 检查两个维度是否一致
#[inline]
pub fn check_same_dims(name: &'static str, expected: GridDims, actual: GridDims) -> MpResult<()> {
    if expected != actual {
        Err(MpError::size_mismatch(name, expected.len(), actual.len()))
    } else {
        Ok(())
    }
}

// =============================================================================
// 三维标量场
// =============================================================================

/// 三维标量场（平铺存储）
#[derive(Debug, Clone)]
pub struct Field<S: RuntimeScalar> {
    dims: GridDims,
    data: Vec<S>,
}

impl<S: RuntimeScalar> Field<S> {
    /// 创建全零场
    pub fn zeros(dims: GridDims) -> Self {
        Self {
            dims,
            data: vec![S::ZERO; dims.len()],
        }
    }

    /// 按函数初始化场（含边界单元）
    pub fn from_fn(dims: GridDims, f: impl Fn(usize, usize, usize) -> S) -> Self {
        let mut data = Vec::with_capacity(dims.len());
        for i in 0..dims.nx {
            for j in 0..dims.ny {
                for k in 0..dims.nz {
                    data.push(f(i, j, k));
                }
            }
        }
        Self { dims, data }
    }

    /// 获取维度
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// 总单元数
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 只读切片视图
    #[inline]
    pub fn as_slice(&self) -> &[S] {
        &self.data
    }

    /// 可变切片视图
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [S] {
        &mut self.data
    }

    /// 读取单元值
    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> S {
        self.data[self.dims.index(i, j, k)]
    }

    /// 写入单元值
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, value: S) {
        let idx = self.dims.index(i, j, k);
        self.data[idx] = value;
    }

    /// 钳制索引读取（边复制语义）
    #[inline]
    pub fn at_clamped(&self, i: isize, j: isize, k: isize) -> S {
        self.data[self.dims.clamped_index(i, j, k)]
    }

    /// 全场填充
    pub fn fill(&mut self, value: S) {
        self.data.fill(value);
    }
}

// =============================================================================
// 双缓冲
// =============================================================================

/// 双缓冲场
///
/// 两个自有缓冲加一个角色标志：当前活动缓冲可读为最新状态，
/// 另一个作为下一轮的写入目标。交换通过翻转标志完成，
/// 绝不重新分配或深拷贝。
#[derive(Debug, Clone)]
pub struct DoubleBuffer<S: RuntimeScalar> {
    bufs: [Field<S>; 2],
    active: usize,
}

impl<S: RuntimeScalar> DoubleBuffer<S> {
    /// 创建双缓冲（两个缓冲均为全零）
    pub fn new(dims: GridDims) -> Self {
        Self {
            bufs: [Field::zeros(dims), Field::zeros(dims)],
            active: 0,
        }
    }

    /// 获取维度
    #[inline]
    pub fn dims(&self) -> GridDims {
        self.bufs[0].dims()
    }

    /// 活动缓冲（最新状态）
    #[inline]
    pub fn active(&self) -> &Field<S> {
        &self.bufs[self.active]
    }

    /// 同时借出活动缓冲（只读）与非活动缓冲（可写）
    #[inline]
    pub fn split(&mut self) -> (&Field<S>, &mut Field<S>) {
        let (lo, hi) = self.bufs.split_at_mut(1);
        if self.active == 0 {
            (&lo[0], &mut hi[0])
        } else {
            (&hi[0], &mut lo[0])
        }
    }

    /// 交换活动角色
    #[inline]
    pub fn swap(&mut self) {
        self.active = 1 - self.active;
    }

    /// 两个缓冲全部清零并重置角色
    pub fn clear(&mut self) {
        self.bufs[0].fill(S::ZERO);
        self.bufs[1].fill(S::ZERO);
        self.active = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_validation() {
        assert!(GridDims::new(4, 4, 4).is_ok());
        assert!(GridDims::new(0, 4, 4).is_err());
    }

    #[test]
    fn test_index_row_major() {
        let dims = GridDims::new(4, 3, 2).unwrap();
        assert_eq!(dims.index(0, 0, 0), 0);
        assert_eq!(dims.index(0, 0, 1), 1);
        assert_eq!(dims.index(0, 1, 0), 2);
        assert_eq!(dims.index(1, 0, 0), 6);
        assert_eq!(dims.index(3, 2, 1), 23);
    }

    #[test]
    fn test_interior_len() {
        let dims = GridDims::new(10, 10, 10).unwrap();
        assert_eq!(dims.interior_len(), 8 * 8 * 8);

        // 轴长不足 3 时无内部点
        let flat = GridDims::new(2, 10, 10).unwrap();
        assert_eq!(flat.interior_len(), 0);
    }

    #[test]
    fn test_clamped_index() {
        let dims = GridDims::new(4, 4, 4).unwrap();
        // 负索引钳制到 0
        assert_eq!(dims.clamped_index(-1, 2, 2), dims.index(0, 2, 2));
        // 越上界钳制到 n-1
        assert_eq!(dims.clamped_index(4, 2, 2), dims.index(3, 2, 2));
        // 界内不变
        assert_eq!(dims.clamped_index(2, 2, 2), dims.index(2, 2, 2));
    }

    #[test]
    fn test_is_interior() {
        let dims = GridDims::new(4, 4, 4).unwrap();
        assert!(dims.is_interior(1, 1, 1));
        assert!(dims.is_interior(2, 2, 2));
        assert!(!dims.is_interior(0, 2, 2));
        assert!(!dims.is_interior(3, 2, 2));
    }

    #[test]
    fn test_field_from_fn() {
        let dims = GridDims::new(3, 3, 3).unwrap();
        let field = Field::from_fn(dims, |i, j, k| (i + j + k) as f64);
        assert_eq!(field.get(0, 0, 0), 0.0);
        assert_eq!(field.get(2, 2, 2), 6.0);
        assert_eq!(field.get(1, 2, 0), 3.0);
    }

    #[test]
    fn test_field_clamped_read() {
        let dims = GridDims::new(3, 3, 3).unwrap();
        let field = Field::from_fn(dims, |i, _, _| i as f32);
        assert_eq!(field.at_clamped(-5, 1, 1), 0.0);
        assert_eq!(field.at_clamped(7, 1, 1), 2.0);
    }

    #[test]
    fn test_double_buffer_swap_no_copy() {
        let dims = GridDims::new(3, 3, 3).unwrap();
        let mut buf = DoubleBuffer::<f32>::new(dims);

        {
            let (_cur, next) = buf.split();
            next.set(1, 1, 1, 42.0);
        }
        // 交换前活动缓冲不受影响
        assert_eq!(buf.active().get(1, 1, 1), 0.0);

        buf.swap();
        assert_eq!(buf.active().get(1, 1, 1), 42.0);

        buf.swap();
        assert_eq!(buf.active().get(1, 1, 1), 0.0);
    }

    #[test]
    fn test_check_same_dims() {
        let a = GridDims::new(4, 4, 4).unwrap();
        let b = GridDims::new(4, 4, 4).unwrap();
        let c = GridDims::new(4, 4, 5).unwrap();
        assert!(check_same_dims("field", a, b).is_ok());
        assert!(check_same_dims("field", a, c).is_err());
    }

    #[test]
    fn test_dims_serde() {
        let dims = GridDims::new(8, 9, 10).unwrap();
        let json = serde_json::to_string(&dims).unwrap();
        let parsed: GridDims = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, dims);
    }
}
