// apps/mp_cli/src/commands/run.rs

//! 运行 Poisson 求解命令
//!
//! 在规则网格上放置一对正负点源作为右端项，按命令行开关选择
//! 求解器变体（标准/融合）、算子路径（模板/CSR）和预条件器
//! （无/ILU(0)），求解后输出迭代统计和核函数计时。

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{info, warn};

use mp_foundation::RuntimeScalar;
use mp_io::PgmWriter;
use mp_solver::{
    laplacian_matrix, ConjugateGradients, CsrOperator, Field, FusedConjugateGradients, GridDims,
    IdentityPreconditioner, IncompleteFactor, LaplaceStencil, NullSink, SnapshotSink,
    SolverConfig, SolverResult,
};

/// 运行求解参数
#[derive(Args)]
pub struct RunArgs {
    /// x 方向单元数
    #[arg(long, default_value = "64")]
    pub nx: usize,

    /// y 方向单元数
    #[arg(long, default_value = "64")]
    pub ny: usize,

    /// z 方向单元数
    #[arg(long, default_value = "64")]
    pub nz: usize,

    /// 收敛阈值（残差最大范数）
    #[arg(long, default_value = "1e-5")]
    pub nu_max: f64,

    /// 最大迭代次数
    #[arg(long, default_value = "200")]
    pub k_max: usize,

    /// 求解器配置 JSON 文件（覆盖 --nu-max / --k-max）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 使用融合双缓冲变体
    #[arg(long)]
    pub fused: bool,

    /// 使用 ILU(0) 预条件
    #[arg(long)]
    pub precondition: bool,

    /// 使用显式 CSR 矩阵代替无矩阵模板
    #[arg(long)]
    pub csr: bool,

    /// 每次迭代写一帧解的 PGM 快照
    #[arg(long)]
    pub write_iterations: bool,

    /// 快照灰度范围半宽（映射 [-r, r] 到 0..255）
    #[arg(long, default_value = "0.05")]
    pub snapshot_range: f64,

    /// 输出目录
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// 使用 f32 精度
    #[arg(long)]
    pub f32: bool,
}

/// 执行运行命令
pub fn execute(args: RunArgs) -> Result<()> {
    info!("=== MariPoisson 求解启动 ===");

    if args.f32 {
        info!("使用精度: f32");
        run_case::<f32>(&args)
    } else {
        info!("使用精度: f64");
        run_case::<f64>(&args)
    }
}

fn run_case<S: RuntimeScalar>(args: &RunArgs) -> Result<()> {
    let dims = GridDims::new(args.nx, args.ny, args.nz)?;
    info!(
        "网格: {}x{}x{} ({} 单元, {} 内部点)",
        dims.nx,
        dims.ny,
        dims.nz,
        dims.len(),
        dims.interior_len()
    );
    if dims.interior_len() == 0 {
        bail!("网格无内部点, 各轴至少 3 个单元");
    }

    let config = load_config(args)?;
    info!(
        "配置: nu_max={:.3e}, k_max={}, 变体={}",
        config.nu_max,
        config.max_iter,
        if args.fused { "融合" } else { "标准" }
    );

    // 右端项: 四分点处一对正负点源
    let f = point_source_rhs::<S>(dims);
    let mut x = Field::<S>::zeros(dims);

    let mut sink: Box<dyn SnapshotSink<S>> = if args.write_iterations {
        let r = args.snapshot_range;
        let writer =
            PgmWriter::new(&args.output, -r, r).context("创建快照目录失败")?;
        info!("迭代快照: {}", writer.out_dir().display());
        Box::new(writer)
    } else {
        Box::new(NullSink)
    };

    let start = Instant::now();
    let result = if args.fused {
        if args.precondition || args.csr {
            warn!("融合变体不支持 --precondition / --csr, 忽略");
        }
        let mut solver = FusedConjugateGradients::<S>::new(config);
        let result = solver.solve(&mut x, &f, sink.as_mut())?;
        solver.metrics().log_summary();
        result
    } else {
        run_standard(args, config, dims, &mut x, &f, sink.as_mut())?
    };
    let elapsed = start.elapsed();

    report(&result, elapsed.as_secs_f64(), dims);
    Ok(())
}

fn run_standard<S: RuntimeScalar>(
    args: &RunArgs,
    config: SolverConfig,
    dims: GridDims,
    x: &mut Field<S>,
    f: &Field<S>,
    sink: &mut dyn SnapshotSink<S>,
) -> Result<SolverResult<S>> {
    let mut solver = ConjugateGradients::<S>::new(config);

    // ILU(0) 需要显式矩阵; --csr 单独指定时只切换算子路径
    let result = if args.precondition {
        let matrix = laplacian_matrix::<S>(dims);
        let factor = IncompleteFactor::from_matrix(&matrix).context("ILU(0) 分解失败")?;
        if args.csr {
            let op = CsrOperator::new(matrix, dims)?;
            solver.solve(&op, x, f, &factor, sink)?
        } else {
            let op = LaplaceStencil::new(dims);
            solver.solve(&op, x, f, &factor, sink)?
        }
    } else if args.csr {
        let op = CsrOperator::<S>::laplacian(dims);
        solver.solve(&op, x, f, &IdentityPreconditioner, sink)?
    } else {
        let op = LaplaceStencil::new(dims);
        solver.solve(&op, x, f, &IdentityPreconditioner, sink)?
    };

    solver.metrics().log_summary();
    Ok(result)
}

fn load_config(args: &RunArgs) -> Result<SolverConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("解析配置文件失败: {}", path.display()))?
        }
        None => SolverConfig::new(args.nu_max, args.k_max),
    };
    if args.write_iterations {
        config.snapshot_every = 1;
    }
    config.validate()?;
    Ok(config)
}

/// 四分点处的正负点源对
fn point_source_rhs<S: RuntimeScalar>(dims: GridDims) -> Field<S> {
    let mut f = Field::zeros(dims);
    let (i1, j1, k1) = (dims.nx / 4, dims.ny / 4, dims.nz / 4);
    let (i2, j2, k2) = (3 * dims.nx / 4, 3 * dims.ny / 4, 3 * dims.nz / 4);
    if dims.is_interior(i1, j1, k1) {
        f.set(i1, j1, k1, S::ONE);
    }
    if dims.is_interior(i2, j2, k2) {
        f.set(i2, j2, k2, -S::ONE);
    }
    f
}

fn report<S: RuntimeScalar>(result: &SolverResult<S>, seconds: f64, dims: GridDims) {
    info!("=== 求解完成 ===");
    info!("状态: {:?}", result.status);
    info!("迭代次数: {}", result.iterations);
    info!("终止残差: {:.6e}", result.residual_norm.accum());
    info!("计算时间: {:.3} s", seconds);
    if result.iterations > 0 {
        let cells = dims.interior_len() as f64;
        let rate = cells * result.iterations as f64 / seconds / 1e6;
        info!("吞吐: {:.1} M 内部点·迭代/s", rate);
    }
}
