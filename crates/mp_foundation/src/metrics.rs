// crates/mp_foundation/src/metrics.rs

//! 核函数调用计数与计时
//!
//! 记录求解过程中各类核函数（模板算子、逐点运算、归约、预条件）
//! 的调用次数和累计耗时。指标对象作为显式状态由引擎持有并传递，
//! 不使用任何全局可变量。

use std::time::{Duration, Instant};

/// 核函数类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    /// 模板算子（7 点 Laplace）
    Stencil,
    /// 逐点运算（copy / axpy / xpay）
    Pointwise,
    /// 归约（max-norm / 内积）
    Reduce,
    /// 预条件求解（三角替换）
    Precondition,
}

/// 单类核函数的统计
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelTally {
    /// 调用次数
    pub calls: usize,
    /// 累计耗时
    pub total_duration: Duration,
}

impl KernelTally {
    /// 记录一次调用
    pub fn record(&mut self, duration: Duration) {
        self.calls += 1;
        self.total_duration += duration;
    }

    /// 平均每次调用耗时
    pub fn avg_duration(&self) -> Duration {
        if self.calls > 0 {
            self.total_duration / self.calls as u32
        } else {
            Duration::ZERO
        }
    }
}

/// 核函数指标集合
#[derive(Debug, Clone, Default)]
pub struct KernelMetrics {
    /// 模板算子统计
    pub stencil: KernelTally,
    /// 逐点运算统计
    pub pointwise: KernelTally,
    /// 归约统计
    pub reduce: KernelTally,
    /// 预条件求解统计
    pub precondition: KernelTally,
}

impl KernelMetrics {
    /// 创建空指标
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次核函数调用
    pub fn record(&mut self, kind: KernelKind, duration: Duration) {
        match kind {
            KernelKind::Stencil => self.stencil.record(duration),
            KernelKind::Pointwise => self.pointwise.record(duration),
            KernelKind::Reduce => self.reduce.record(duration),
            KernelKind::Precondition => self.precondition.record(duration),
        }
    }

    /// 计时执行一个核函数并记录
    #[inline]
    pub fn time<R>(&mut self, kind: KernelKind, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.record(kind, start.elapsed());
        out
    }

    /// 重置指标
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 所有类别的累计耗时
    pub fn total_duration(&self) -> Duration {
        self.stencil.total_duration
            + self.pointwise.total_duration
            + self.reduce.total_duration
            + self.precondition.total_duration
    }

    /// 将指标摘要写入日志
    pub fn log_summary(&self) {
        log::debug!(
            "核函数统计: 模板 {}次/{:.3}ms, 逐点 {}次/{:.3}ms, 归约 {}次/{:.3}ms, 预条件 {}次/{:.3}ms",
            self.stencil.calls,
            self.stencil.total_duration.as_secs_f64() * 1e3,
            self.pointwise.calls,
            self.pointwise.total_duration.as_secs_f64() * 1e3,
            self.reduce.calls,
            self.reduce.total_duration.as_secs_f64() * 1e3,
            self.precondition.calls,
            self.precondition.total_duration.as_secs_f64() * 1e3,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record() {
        let mut metrics = KernelMetrics::new();
        metrics.record(KernelKind::Stencil, Duration::from_millis(2));
        metrics.record(KernelKind::Stencil, Duration::from_millis(4));
        metrics.record(KernelKind::Reduce, Duration::from_millis(1));

        assert_eq!(metrics.stencil.calls, 2);
        assert_eq!(metrics.reduce.calls, 1);
        assert_eq!(metrics.stencil.total_duration, Duration::from_millis(6));
        assert_eq!(metrics.stencil.avg_duration(), Duration::from_millis(3));
    }

    #[test]
    fn test_time_helper() {
        let mut metrics = KernelMetrics::new();
        let value = metrics.time(KernelKind::Pointwise, || 21 * 2);
        assert_eq!(value, 42);
        assert_eq!(metrics.pointwise.calls, 1);
    }

    #[test]
    fn test_reset() {
        let mut metrics = KernelMetrics::new();
        metrics.record(KernelKind::Precondition, Duration::from_millis(1));
        metrics.reset();
        assert_eq!(metrics.precondition.calls, 0);
        assert_eq!(metrics.total_duration(), Duration::ZERO);
    }

    #[test]
    fn test_avg_empty() {
        let tally = KernelTally::default();
        assert_eq!(tally.avg_duration(), Duration::ZERO);
    }
}
