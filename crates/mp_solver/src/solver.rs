// crates/mp_solver/src/solver.rs

//! 标准共轭梯度迭代引擎
//!
//! 预条件 CG，算子与预条件器均为注入的 trait 对象，
//! 引擎本身不持有全局状态。工作区场在引擎内复用，
//! 求解循环内不分配内存。
//!
//! # 终止语义
//!
//! 每次迭代先更新残差并计算 `nu = ‖r‖∞`，再做退出判定：
//! `nu < nu_max` 或 `k == max_iter` 时应用最后一次 `x += α·p`
//! 并返回。已收敛（`Converged`）与达到迭代上限
//! （`MaxIterationsReached`）都是正常结果；迭代标量 sigma/rho
//! 出现零或非有限值则返回 [`MpError::NumericalBreakdown`]。

use mp_foundation::{KernelKind, KernelMetrics, MpError, MpResult, RuntimeScalar};
use serde::{Deserialize, Serialize};

use crate::grid::{check_same_dims, Field, GridDims};
use crate::operator::LinearOperator;
use crate::pointwise::{axpy_interior, saxpy_interior, xpay_interior};
use crate::precondition::Preconditioner;
use crate::reduce::{inner_product_interior, norm_inf_interior};

// =============================================================================
// 配置
// =============================================================================

fn default_nu_max() -> f64 {
    1e-5
}

fn default_max_iter() -> usize {
    200
}

/// CG 求解器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    /// 收敛阈值: 残差最大范数低于此值即收敛
    #[serde(default = "default_nu_max")]
    pub nu_max: f64,
    /// 最大迭代次数
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// 是否输出每次迭代的 trace 日志
    #[serde(default)]
    pub verbose: bool,
    /// 每隔多少次迭代输出一次解快照（0 表示关闭）
    #[serde(default)]
    pub snapshot_every: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            nu_max: default_nu_max(),
            max_iter: default_max_iter(),
            verbose: false,
            snapshot_every: 0,
        }
    }
}

impl SolverConfig {
    /// 创建配置
    pub fn new(nu_max: f64, max_iter: usize) -> Self {
        Self {
            nu_max,
            max_iter,
            ..Default::default()
        }
    }

    /// 启用每次迭代的 trace 日志
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// 设置快照间隔
    pub fn with_snapshot_every(mut self, every: usize) -> Self {
        self.snapshot_every = every;
        self
    }

    /// 校验配置值
    pub fn validate(&self) -> MpResult<()> {
        MpError::check_range("nu_max", self.nu_max, 0.0, f64::MAX)?;
        Ok(())
    }
}

// =============================================================================
// 结果
// =============================================================================

/// 求解终止状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// 残差范数低于阈值
    Converged,
    /// 达到最大迭代次数
    MaxIterationsReached,
}

/// 求解结果
#[derive(Debug, Clone, Copy)]
pub struct SolverResult<S: RuntimeScalar> {
    /// 终止状态
    pub status: SolverStatus,
    /// 执行的迭代次数
    pub iterations: usize,
    /// 终止时的残差最大范数
    pub residual_norm: S,
}

impl<S: RuntimeScalar> SolverResult<S> {
    /// 是否收敛
    #[inline]
    pub fn is_converged(&self) -> bool {
        self.status == SolverStatus::Converged
    }
}

// =============================================================================
// 快照槽
// =============================================================================

/// 迭代快照的输出目标
///
/// 求解层只定义接口，具体落盘格式由上层提供。
pub trait SnapshotSink<S: RuntimeScalar> {
    /// 输出一帧快照
    fn emit(&mut self, tag: &str, field: &Field<S>, iteration: usize) -> MpResult<()>;
}

/// 丢弃一切快照的空实现
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<S: RuntimeScalar> SnapshotSink<S> for NullSink {
    #[inline]
    fn emit(&mut self, _tag: &str, _field: &Field<S>, _iteration: usize) -> MpResult<()> {
        Ok(())
    }
}

// =============================================================================
// 工作区
// =============================================================================

/// CG 工作区（残差、搜索方向、临时场）
#[derive(Debug, Clone)]
struct CgWorkspace<S: RuntimeScalar> {
    r: Field<S>,
    p: Field<S>,
    z: Field<S>,
}

impl<S: RuntimeScalar> CgWorkspace<S> {
    fn new(dims: GridDims) -> Self {
        Self {
            r: Field::zeros(dims),
            p: Field::zeros(dims),
            z: Field::zeros(dims),
        }
    }

    /// 按需重分配并清零
    ///
    /// 上一次求解可能在场中留下非零值（包括 NaN），
    /// 无论是否重分配都必须清零。
    fn resize(&mut self, dims: GridDims) {
        if self.r.dims() != dims {
            *self = Self::new(dims);
        } else {
            self.r.fill(S::ZERO);
            self.p.fill(S::ZERO);
            self.z.fill(S::ZERO);
        }
    }
}

// =============================================================================
// 求解引擎
// =============================================================================

/// 预条件共轭梯度求解器
///
/// 持有配置、可复用的工作区和核函数计时器。
/// 同一实例可对不同尺寸的问题重复调用 [`solve`](Self::solve)。
pub struct ConjugateGradients<S: RuntimeScalar> {
    config: SolverConfig,
    workspace: CgWorkspace<S>,
    metrics: KernelMetrics,
}

impl<S: RuntimeScalar> ConjugateGradients<S> {
    /// 创建求解器
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            workspace: CgWorkspace::new(GridDims::default()),
            metrics: KernelMetrics::new(),
        }
    }

    /// 配置引用
    #[inline]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// 核函数计时统计
    #[inline]
    pub fn metrics(&self) -> &KernelMetrics {
        &self.metrics
    }

    /// 求解 L x = f
    ///
    /// `x` 传入初始猜测，返回时为近似解。边界单元在整个求解
    /// 过程中保持调用方设置的值不变。
    ///
    /// # 错误
    ///
    /// - 场维度与算子不一致
    /// - 迭代标量 sigma/rho 为零或非有限（[`MpError::NumericalBreakdown`]）
    pub fn solve<A, P>(
        &mut self,
        op: &A,
        x: &mut Field<S>,
        f: &Field<S>,
        precond: &P,
        sink: &mut dyn SnapshotSink<S>,
    ) -> MpResult<SolverResult<S>>
    where
        A: LinearOperator<S>,
        P: Preconditioner<S>,
    {
        self.config.validate()?;
        let dims = op.dims();
        check_same_dims("solution field", dims, x.dims())?;
        check_same_dims("rhs field", dims, f.dims())?;

        self.workspace.resize(dims);
        let ws = &mut self.workspace;
        let metrics = &mut self.metrics;
        let config = &self.config;

        log::debug!(
            "CG start: {}x{}x{}, operator={}, preconditioner={}, nu_max={:.3e}, k_max={}",
            dims.nx,
            dims.ny,
            dims.nz,
            op.name(),
            Preconditioner::<S>::name(precond),
            config.nu_max,
            config.max_iter
        );

        // 初始残差: r = f - L(x)
        metrics.time(KernelKind::Stencil, || op.apply(x, &mut ws.z))?;
        metrics.time(KernelKind::Pointwise, || {
            saxpy_interior(-S::ONE, &ws.z, f, &mut ws.r)
        });
        let mut nu = metrics
            .time(KernelKind::Reduce, || norm_inf_interior(&ws.r))
            .accum();

        if nu < config.nu_max {
            log::debug!("CG already converged: residual = {nu:.6e}");
            return Ok(SolverResult {
                status: SolverStatus::Converged,
                iterations: 0,
                residual_norm: S::from_accum(nu),
            });
        }

        // p = M⁻¹ r, rho = <p, r>
        metrics.time(KernelKind::Precondition, || {
            precond.apply(ws.r.as_slice(), ws.p.as_mut_slice())
        });
        let mut rho = metrics
            .time(KernelKind::Reduce, || inner_product_interior(&ws.p, &ws.r))
            .accum();
        if !rho.is_finite() || rho == 0.0 {
            return Err(MpError::numerical_breakdown("rho", rho, 0));
        }

        for k in 1..=config.max_iter {
            // z = L(p), sigma = <p, z>
            metrics.time(KernelKind::Stencil, || op.apply(&ws.p, &mut ws.z))?;
            let sigma = metrics
                .time(KernelKind::Reduce, || inner_product_interior(&ws.p, &ws.z))
                .accum();
            if !sigma.is_finite() || sigma == 0.0 {
                return Err(MpError::numerical_breakdown("sigma", sigma, k));
            }
            let alpha = rho / sigma;
            let alpha_s = S::from_accum(alpha);

            // r -= alpha * z
            metrics.time(KernelKind::Pointwise, || {
                axpy_interior(-alpha_s, &ws.z, &mut ws.r)
            });
            nu = metrics
                .time(KernelKind::Reduce, || norm_inf_interior(&ws.r))
                .accum();

            if config.verbose {
                log::trace!("CG iter {k}: residual = {nu:.6e}");
            }

            // 退出判定在解更新之前，最后一次更新在退出路径上完成
            if nu < config.nu_max || k == config.max_iter {
                metrics.time(KernelKind::Pointwise, || axpy_interior(alpha_s, &ws.p, x));
                let status = if nu < config.nu_max {
                    SolverStatus::Converged
                } else {
                    SolverStatus::MaxIterationsReached
                };
                if config.snapshot_every > 0 {
                    sink.emit("x", x, k)?;
                }
                log::debug!("CG done: status={status:?}, iterations={k}, residual={nu:.6e}");
                return Ok(SolverResult {
                    status,
                    iterations: k,
                    residual_norm: S::from_accum(nu),
                });
            }

            // z = M⁻¹ r, rho_new = <z, r>
            metrics.time(KernelKind::Precondition, || {
                precond.apply(ws.r.as_slice(), ws.z.as_mut_slice())
            });
            let rho_new = metrics
                .time(KernelKind::Reduce, || inner_product_interior(&ws.z, &ws.r))
                .accum();
            if !rho_new.is_finite() || rho_new == 0.0 {
                return Err(MpError::numerical_breakdown("rho", rho_new, k));
            }
            let beta = rho_new / rho;

            // x += alpha * p, p = z + beta * p
            metrics.time(KernelKind::Pointwise, || {
                axpy_interior(alpha_s, &ws.p, x);
                xpay_interior(&ws.z, S::from_accum(beta), &mut ws.p);
            });
            rho = rho_new;

            if config.snapshot_every > 0 && k % config.snapshot_every == 0 {
                sink.emit("x", x, k)?;
            }
        }

        // max_iter == 0 时循环体不执行
        log::debug!("CG done: no iterations executed, residual={nu:.6e}");
        Ok(SolverResult {
            status: SolverStatus::MaxIterationsReached,
            iterations: 0,
            residual_norm: S::from_accum(nu),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::laplacian_matrix;
    use crate::operator::LaplaceStencil;
    use crate::precondition::{IdentityPreconditioner, IncompleteFactor};

    fn dims() -> GridDims {
        GridDims::new(8, 8, 8).unwrap()
    }

    fn point_source_rhs(dims: GridDims) -> Field<f64> {
        let mut f = Field::zeros(dims);
        f.set(2, 2, 2, 1.0);
        f.set(dims.nx - 3, dims.ny - 3, dims.nz - 3, -1.0);
        f
    }

    fn residual_norm(op: &LaplaceStencil, x: &Field<f64>, f: &Field<f64>) -> f64 {
        let mut lx = Field::zeros(x.dims());
        LinearOperator::<f64>::apply(op, x, &mut lx).unwrap();
        let mut r = Field::zeros(x.dims());
        saxpy_interior(-1.0, &lx, f, &mut r);
        norm_inf_interior(&r)
    }

    #[test]
    fn test_zero_rhs_converges_at_zero_iterations() {
        let op = LaplaceStencil::new(dims());
        let f = Field::<f64>::zeros(dims());
        let mut x = Field::zeros(dims());

        let mut solver = ConjugateGradients::new(SolverConfig::new(1e-8, 100));
        let result = solver
            .solve(&op, &mut x, &f, &IdentityPreconditioner, &mut NullSink)
            .unwrap();

        assert_eq!(result.status, SolverStatus::Converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.residual_norm, 0.0);
    }

    #[test]
    fn test_point_source_converges() {
        let op = LaplaceStencil::new(dims());
        let f = point_source_rhs(dims());
        let mut x = Field::zeros(dims());

        let mut solver = ConjugateGradients::new(SolverConfig::new(1e-10, 500));
        let result = solver
            .solve(&op, &mut x, &f, &IdentityPreconditioner, &mut NullSink)
            .unwrap();

        assert!(result.is_converged());
        assert!(result.iterations > 0);
        assert!(residual_norm(&op, &x, &f) < 1e-9);
    }

    #[test]
    fn test_recovers_manufactured_solution() {
        // 构造边界为零的参考解, f = L(x_ref), 从零初值求解应还原 x_ref
        let d = dims();
        let x_ref = Field::from_fn(d, |i, j, k| {
            if d.is_interior(i, j, k) {
                ((i * 5 + j * 3 + k) as f64 * 0.21).sin()
            } else {
                0.0
            }
        });
        let op = LaplaceStencil::new(d);
        let mut f = Field::zeros(d);
        LinearOperator::<f64>::apply(&op, &x_ref, &mut f).unwrap();

        let mut x = Field::zeros(d);
        let mut solver = ConjugateGradients::new(SolverConfig::new(1e-10, 500));
        let result = solver
            .solve(&op, &mut x, &f, &IdentityPreconditioner, &mut NullSink)
            .unwrap();
        assert!(result.is_converged());

        for i in 1..d.nx - 1 {
            for j in 1..d.ny - 1 {
                for k in 1..d.nz - 1 {
                    let got = x.get(i, j, k);
                    let want = x_ref.get(i, j, k);
                    assert!(
                        (got - want).abs() < 1e-3,
                        "mismatch at ({i},{j},{k}): {got} vs {want}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_max_iterations_exact() {
        let op = LaplaceStencil::new(dims());
        let f = point_source_rhs(dims());
        let mut x = Field::zeros(dims());

        // nu_max = 0 使 nu < nu_max 恒为假
        let mut solver = ConjugateGradients::new(SolverConfig::new(0.0, 3));
        let result = solver
            .solve(&op, &mut x, &f, &IdentityPreconditioner, &mut NullSink)
            .unwrap();

        assert_eq!(result.status, SolverStatus::MaxIterationsReached);
        assert_eq!(result.iterations, 3);
    }

    #[test]
    fn test_preconditioned_matches_plain() {
        let op = LaplaceStencil::new(dims());
        let f = point_source_rhs(dims());
        let factor = IncompleteFactor::from_matrix(&laplacian_matrix::<f64>(dims())).unwrap();

        let mut x_plain = Field::zeros(dims());
        let mut x_ilu = Field::zeros(dims());

        let mut solver = ConjugateGradients::new(SolverConfig::new(1e-10, 500));
        let plain = solver
            .solve(&op, &mut x_plain, &f, &IdentityPreconditioner, &mut NullSink)
            .unwrap();
        let ilu = solver
            .solve(&op, &mut x_ilu, &f, &factor, &mut NullSink)
            .unwrap();

        assert!(plain.is_converged());
        assert!(ilu.is_converged());
        // 预条件加速收敛
        assert!(ilu.iterations <= plain.iterations);

        let d = dims();
        for i in 1..d.nx - 1 {
            for j in 1..d.ny - 1 {
                for k in 1..d.nz - 1 {
                    let a = x_plain.get(i, j, k);
                    let b = x_ilu.get(i, j, k);
                    assert!((a - b).abs() < 1e-6, "mismatch at ({i},{j},{k})");
                }
            }
        }
    }

    #[test]
    fn test_breakdown_on_degenerate_operator() {
        // 输出恒为零的算子使 sigma = 0
        struct ZeroOperator(GridDims);
        impl LinearOperator<f64> for ZeroOperator {
            fn dims(&self) -> GridDims {
                self.0
            }
            fn apply(&self, _u: &Field<f64>, lu: &mut Field<f64>) -> MpResult<()> {
                lu.fill(0.0);
                Ok(())
            }
            fn name(&self) -> &'static str {
                "zero"
            }
        }

        let op = ZeroOperator(dims());
        let f = point_source_rhs(dims());
        let mut x = Field::zeros(dims());

        let mut solver = ConjugateGradients::new(SolverConfig::new(1e-8, 10));
        let result = solver.solve(&op, &mut x, &f, &IdentityPreconditioner, &mut NullSink);
        assert!(matches!(
            result,
            Err(MpError::NumericalBreakdown { quantity: "sigma", .. })
        ));
    }

    #[test]
    fn test_snapshot_sink_invoked() {
        struct CountingSink(Vec<usize>);
        impl SnapshotSink<f64> for CountingSink {
            fn emit(&mut self, _tag: &str, _field: &Field<f64>, iteration: usize) -> MpResult<()> {
                self.0.push(iteration);
                Ok(())
            }
        }

        let op = LaplaceStencil::new(dims());
        let f = point_source_rhs(dims());
        let mut x = Field::zeros(dims());
        let mut sink = CountingSink(Vec::new());

        let config = SolverConfig::new(1e-10, 500).with_snapshot_every(1);
        let mut solver = ConjugateGradients::new(config);
        let result = solver
            .solve(&op, &mut x, &f, &IdentityPreconditioner, &mut sink)
            .unwrap();

        // 每次迭代一帧，含退出迭代
        assert_eq!(sink.0.len(), result.iterations);
        assert_eq!(*sink.0.last().unwrap(), result.iterations);
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: SolverConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.nu_max, 1e-5);
        assert_eq!(config.max_iter, 200);
        assert!(!config.verbose);
        assert_eq!(config.snapshot_every, 0);

        let config: SolverConfig = serde_json::from_str(r#"{"nu_max": 1e-8}"#).unwrap();
        assert_eq!(config.nu_max, 1e-8);
        assert_eq!(config.max_iter, 200);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let op = LaplaceStencil::new(dims());
        let f = Field::<f64>::zeros(dims());
        let mut x = Field::zeros(dims());

        let mut solver = ConjugateGradients::new(SolverConfig::new(-1.0, 10));
        let result = solver.solve(&op, &mut x, &f, &IdentityPreconditioner, &mut NullSink);
        assert!(result.is_err());
    }
}
