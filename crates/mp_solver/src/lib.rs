// crates/mp_solver/src/lib.rs

//! MariPoisson 求解层
//!
//! 三维结构网格上离散 Laplace/Poisson 方程的共轭梯度（CG）求解器族：
//! 无矩阵 7 点模板算子、内部点逐点运算、并行归约、
//! 不完全分解预条件的三角替换，以及融合/双缓冲变体。
//!
//! # 模块
//!
//! - [`grid`]: 网格维度、三维标量场、双缓冲
//! - [`pointwise`]: 内部点逐点运算（copy / axpy / xpay / saxpy）
//! - [`reduce`]: 内部点并行归约（max-norm、内积）
//! - [`csr`]: 压缩稀疏行矩阵与 7 点算子装配
//! - [`operator`]: 线性算子抽象（无矩阵模板 / CSR 后备路径）
//! - [`precondition`]: 预条件器（恒等 / 不完全 LU 分解）
//! - [`solver`]: 标准 CG 迭代引擎
//! - [`fused`]: 融合双缓冲 CG 变体（每次迭代两趟网格遍历）
//!
//! # 并行模型
//!
//! 所有网格遍历按 x 方向切片划分给 rayon 线程池，fork-join 语义，
//! 每个核函数结束处有隐式屏障。归约的部分和合并顺序不保证可复现，
//! 结果仅保证在浮点舍入容差内稳定。

#![warn(clippy::all)]

pub mod csr;
pub mod fused;
pub mod grid;
pub mod operator;
pub mod pointwise;
pub mod precondition;
pub mod reduce;
pub mod solver;

// 重导出常用类型
pub use csr::{laplacian_matrix, CsrBuilder, CsrMatrix, CsrPattern};
pub use fused::FusedConjugateGradients;
pub use grid::{DoubleBuffer, Field, GridDims};
pub use operator::{CsrOperator, LaplaceStencil, LinearOperator};
pub use precondition::{IdentityPreconditioner, IncompleteFactor, Preconditioner};
pub use solver::{
    ConjugateGradients, NullSink, SnapshotSink, SolverConfig, SolverResult, SolverStatus,
};
