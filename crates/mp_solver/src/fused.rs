// crates/mp_solver/src/fused.rs

//! 融合双缓冲共轭梯度变体
//!
//! 与标准引擎算法等价（无预条件、7 点模板），但每次迭代
//! 只做两趟网格遍历，把模板、逐点更新和归约融合进同一趟：
//!
//! - **初始趟**: 融合 `z = L(x)`、`r = f - z`、`nu`、`rho`
//! - **F1 趟**: 在中心和六个邻居处按 `p_new = r + β·p` 现场重建
//!   搜索方向，对其求模板得 `z`，累加 `sigma`，将 `p_new` 中心值
//!   写入非活动缓冲，随后翻转缓冲角色
//! - **F2 趟**: 融合 `r -= α·z`、`nu`、`rho_new`、`x += α·p`
//!
//! 搜索方向保存在 [`DoubleBuffer`] 中，F1 读活动缓冲、写非活动
//! 缓冲，趟结束后翻转标志，不做任何深拷贝。
//!
//! # 等价性
//!
//! r 与 p 的边界单元始终为零，因此 F1 对边界邻居的
//! `r + β·p` 重建自然得到 0，无需分支；重建出的搜索方向与
//! 标准引擎逐位一致，两个变体的终止状态和迭代次数相同，
//! 解只相差归约顺序带来的浮点舍入。

use mp_foundation::{KernelKind, KernelMetrics, MpError, MpResult, RuntimeScalar};
use rayon::prelude::*;

use crate::grid::{check_same_dims, DoubleBuffer, Field, GridDims};
use crate::solver::{SnapshotSink, SolverConfig, SolverResult, SolverStatus};

/// 融合双缓冲 CG 求解器
///
/// 无预条件路径专用；算子固定为 7 点 Laplace 模板。
pub struct FusedConjugateGradients<S: RuntimeScalar> {
    config: SolverConfig,
    p: DoubleBuffer<S>,
    r: Field<S>,
    z: Field<S>,
    metrics: KernelMetrics,
}

impl<S: RuntimeScalar> FusedConjugateGradients<S> {
    /// 创建求解器
    pub fn new(config: SolverConfig) -> Self {
        let dims = GridDims::default();
        Self {
            config,
            p: DoubleBuffer::new(dims),
            r: Field::zeros(dims),
            z: Field::zeros(dims),
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

    /// 工作区按需重分配并清零
    ///
    /// 双缓冲和残差场必须清零：F1 依赖 p 与 r 的边界为零，
    /// 且 β=0 的首趟会读到上一次求解遗留的值。
    fn ensure_workspace(&mut self, dims: GridDims) {
        if self.r.dims() != dims {
            self.p = DoubleBuffer::new(dims);
            self.r = Field::zeros(dims);
            self.z = Field::zeros(dims);
        } else {
            self.p.clear();
            self.r.fill(S::ZERO);
            self.z.fill(S::ZERO);
        }
    }

    /// 求解 L x = f（L 为 7 点 Laplace 模板）
    ///
    /// 终止语义与标准引擎一致：退出判定在解更新之前，
    /// sigma/rho 为零或非有限时返回 [`MpError::NumericalBreakdown`]。
    pub fn solve(
        &mut self,
        x: &mut Field<S>,
        f: &Field<S>,
        sink: &mut dyn SnapshotSink<S>,
    ) -> MpResult<SolverResult<S>> {
        self.config.validate()?;
        let dims = x.dims();
        check_same_dims("rhs field", dims, f.dims())?;

        self.ensure_workspace(dims);
        let config = &self.config;
        let metrics = &mut self.metrics;

        log::debug!(
            "融合 CG start: {}x{}x{}, nu_max={:.3e}, k_max={}",
            dims.nx,
            dims.ny,
            dims.nz,
            config.nu_max,
            config.max_iter
        );

        // 初始趟: r = f - L(x)，同时归约 nu 与 rho = <r, r>
        let (mut nu, mut rho) = metrics.time(KernelKind::Stencil, || {
            init_pass(dims, x, f, &mut self.r)
        });

        if nu < config.nu_max {
            log::debug!("融合 CG already converged: residual = {nu:.6e}");
            return Ok(SolverResult {
                status: SolverStatus::Converged,
                iterations: 0,
                residual_norm: S::from_accum(nu),
            });
        }
        if !rho.is_finite() || rho == 0.0 {
            return Err(MpError::numerical_breakdown("rho", rho, 0));
        }

        // β=0 的首趟 F1 从零缓冲重建出 p = r
        let mut beta = 0.0f64;

        for k in 1..=config.max_iter {
            // F1: 现场重建 p_new = r + β·p，z = L(p_new)，累加 sigma
            let sigma = {
                let (p_cur, p_next) = self.p.split();
                metrics.time(KernelKind::Stencil, || {
                    direction_pass(dims, &self.r, p_cur, beta, p_next, &mut self.z)
                })
            };
            self.p.swap();

            if !sigma.is_finite() || sigma == 0.0 {
                return Err(MpError::numerical_breakdown("sigma", sigma, k));
            }
            let alpha = rho / sigma;

            // F2: r -= α·z，x += α·p，同时归约 nu 与 rho_new
            let (nu_new, rho_new) = metrics.time(KernelKind::Pointwise, || {
                update_pass(dims, &self.z, self.p.active(), alpha, &mut self.r, x)
            });
            nu = nu_new;

            if config.verbose {
                log::trace!("融合 CG iter {k}: residual = {nu:.6e}");
            }

            if nu < config.nu_max || k == config.max_iter {
                let status = if nu < config.nu_max {
                    SolverStatus::Converged
                } else {
                    SolverStatus::MaxIterationsReached
                };
                if config.snapshot_every > 0 {
                    sink.emit("x", x, k)?;
                }
                log::debug!("融合 CG done: status={status:?}, iterations={k}, residual={nu:.6e}");
                return Ok(SolverResult {
                    status,
                    iterations: k,
                    residual_norm: S::from_accum(nu),
                });
            }

            if !rho_new.is_finite() || rho_new == 0.0 {
                return Err(MpError::numerical_breakdown("rho", rho_new, k));
            }
            beta = rho_new / rho;
            rho = rho_new;

            if config.snapshot_every > 0 && k % config.snapshot_every == 0 {
                sink.emit("x", x, k)?;
            }
        }

        // max_iter == 0 时循环体不执行
        Ok(SolverResult {
            status: SolverStatus::MaxIterationsReached,
            iterations: 0,
            residual_norm: S::from_accum(nu),
        })
    }
}

// =============================================================================
// 融合网格趟
// =============================================================================

/// 初始趟: r = f - L(x)，返回 (nu, rho)
fn init_pass<S: RuntimeScalar>(
    dims: GridDims,
    x: &Field<S>,
    f: &Field<S>,
    r: &mut Field<S>,
) -> (f64, f64) {
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let six = S::from_accum(6.0);
    let x_data = x.as_slice();
    let f_data = f.as_slice();

    r.as_mut_slice()
        .par_chunks_mut(slab)
        .enumerate()
        .map(|(i, r_slab)| {
            if i == 0 || i + 1 >= nx {
                return (0.0f64, 0.0f64);
            }
            let base = i * slab;
            let mut local_nu = 0.0f64;
            let mut local_rho = 0.0f64;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    let idx = row + k;
                    let g = base + idx;
                    // 内部点的六个邻居恒在界内，直接平铺索引
                    let lap = x_data[g + slab]
                        + x_data[g - slab]
                        + x_data[g + nz]
                        + x_data[g - nz]
                        + x_data[g + 1]
                        + x_data[g - 1]
                        - six * x_data[g];
                    let res = f_data[g] - lap;
                    r_slab[idx] = res;

                    let v = res.accum();
                    let a = v.abs();
                    if a > local_nu {
                        local_nu = a;
                    }
                    local_rho += v * v;
                }
            }
            (local_nu, local_rho)
        })
        .reduce(
            || (0.0f64, 0.0f64),
            |a, b| (a.0.max(b.0), a.1 + b.1),
        )
}

/// F1 趟: p_new = r + β·p_cur（现场重建），z = L(p_new)，返回 sigma
///
/// r 与 p_cur 的边界单元为零，重建对边界邻居自然得到 0。
fn direction_pass<S: RuntimeScalar>(
    dims: GridDims,
    r: &Field<S>,
    p_cur: &Field<S>,
    beta: f64,
    p_next: &mut Field<S>,
    z: &mut Field<S>,
) -> f64 {
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let six = S::from_accum(6.0);
    let beta_s = S::from_accum(beta);
    let r_data = r.as_slice();
    let p_data = p_cur.as_slice();

    let reconstruct = move |g: usize| r_data[g] + beta_s * p_data[g];

    p_next
        .as_mut_slice()
        .par_chunks_mut(slab)
        .zip(z.as_mut_slice().par_chunks_mut(slab))
        .enumerate()
        .map(|(i, (p_slab, z_slab))| {
            if i == 0 || i + 1 >= nx {
                return 0.0f64;
            }
            let base = i * slab;
            let mut local_sigma = 0.0f64;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    let idx = row + k;
                    let g = base + idx;
                    let center = reconstruct(g);
                    let lap = reconstruct(g + slab)
                        + reconstruct(g - slab)
                        + reconstruct(g + nz)
                        + reconstruct(g - nz)
                        + reconstruct(g + 1)
                        + reconstruct(g - 1)
                        - six * center;
                    p_slab[idx] = center;
                    z_slab[idx] = lap;
                    local_sigma += center.accum() * lap.accum();
                }
            }
            local_sigma
        })
        .sum::<f64>()
}

/// F2 趟: r -= α·z，x += α·p，返回 (nu, rho_new)
fn update_pass<S: RuntimeScalar>(
    dims: GridDims,
    z: &Field<S>,
    p: &Field<S>,
    alpha: f64,
    r: &mut Field<S>,
    x: &mut Field<S>,
) -> (f64, f64) {
    let (nx, ny, nz) = (dims.nx, dims.ny, dims.nz);
    let slab = dims.slab_len();
    let alpha_s = S::from_accum(alpha);
    let z_data = z.as_slice();
    let p_data = p.as_slice();

    r.as_mut_slice()
        .par_chunks_mut(slab)
        .zip(x.as_mut_slice().par_chunks_mut(slab))
        .enumerate()
        .map(|(i, (r_slab, x_slab))| {
            if i == 0 || i + 1 >= nx {
                return (0.0f64, 0.0f64);
            }
            let base = i * slab;
            let mut local_nu = 0.0f64;
            let mut local_rho = 0.0f64;
            for j in 1..ny - 1 {
                let row = j * nz;
                for k in 1..nz - 1 {
                    let idx = row + k;
                    let g = base + idx;
                    let res = r_slab[idx] - alpha_s * z_data[g];
                    r_slab[idx] = res;
                    x_slab[idx] += alpha_s * p_data[g];

                    let v = res.accum();
                    let a = v.abs();
                    if a > local_nu {
                        local_nu = a;
                    }
                    local_rho += v * v;
                }
            }
            (local_nu, local_rho)
        })
        .reduce(
            || (0.0f64, 0.0f64),
            |a, b| (a.0.max(b.0), a.1 + b.1),
        )
}
