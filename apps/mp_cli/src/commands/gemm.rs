// apps/mp_cli/src/commands/gemm.rs

//! 稠密矩阵乘法基准命令
//!
//! 用线性同余序列填充两个 n×n 矩阵，先与朴素参考实现
//! 交叉校验，再对并行实现计时若干轮，报告 GFLOPS。

use std::time::Instant;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use mp_dense::{mat_mat_multiply, mat_mat_multiply_reference, max_abs_difference};
use mp_foundation::RuntimeScalar;

/// 基准参数
#[derive(Args)]
pub struct GemmArgs {
    /// 矩阵阶数
    #[arg(short = 'n', long, default_value = "512")]
    pub size: usize,

    /// 计时轮数
    #[arg(short, long, default_value = "5")]
    pub reps: usize,

    /// 校验容差（逐元最大偏差）
    #[arg(long, default_value = "1e-3")]
    pub tolerance: f64,

    /// 使用 f32 精度
    #[arg(long)]
    pub f32: bool,
}

/// 执行基准命令
pub fn execute(args: GemmArgs) -> Result<()> {
    info!("=== 稠密矩阵乘法基准 ===");
    if args.size == 0 || args.reps == 0 {
        bail!("矩阵阶数和轮数必须大于 0");
    }

    if args.f32 {
        info!("使用精度: f32");
        run_bench::<f32>(&args)
    } else {
        info!("使用精度: f64");
        run_bench::<f64>(&args)
    }
}

fn run_bench<S: RuntimeScalar>(args: &GemmArgs) -> Result<()> {
    let n = args.size;
    info!("矩阵: {n}x{n}, 计时 {} 轮", args.reps);

    let a = lcg_fill::<S>(n * n, 0x9e3779b97f4a7c15);
    let b = lcg_fill::<S>(n * n, 0xc2b2ae3d27d4eb4f);
    let mut c = vec![S::ZERO; n * n];

    // 正确性校验
    let mut c_ref = vec![S::ZERO; n * n];
    mat_mat_multiply(&a, &b, &mut c, n);
    mat_mat_multiply_reference(&a, &b, &mut c_ref, n);
    let diff = max_abs_difference(&c, &c_ref);
    info!("与参考实现的最大偏差: {diff:.3e}");
    if diff > args.tolerance {
        bail!("校验失败: 偏差 {diff:.3e} 超过容差 {:.3e}", args.tolerance);
    }

    // 计时
    let flops = 2.0 * (n as f64).powi(3);
    let mut best = f64::MAX;
    for rep in 1..=args.reps {
        let start = Instant::now();
        mat_mat_multiply(&a, &b, &mut c, n);
        let seconds = start.elapsed().as_secs_f64();
        best = best.min(seconds);
        info!("第 {rep} 轮: {:.3} s, {:.2} GFLOPS", seconds, flops / seconds / 1e9);
    }

    info!("=== 基准完成 ===");
    info!("最佳: {:.3} s, {:.2} GFLOPS", best, flops / best / 1e9);
    Ok(())
}

/// 线性同余伪随机填充，与运行环境无关
fn lcg_fill<S: RuntimeScalar>(len: usize, seed: u64) -> Vec<S> {
    let mut state = seed;
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            S::from_accum(((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5)
        })
        .collect()
}
