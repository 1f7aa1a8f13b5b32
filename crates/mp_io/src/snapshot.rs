// crates/mp_io/src/snapshot.rs

//! PGM 迭代快照
//!
//! 取场的中间 z 切片，按固定灰度范围映射到 8 位，
//! 以二进制 PGM（P5）写入 `{tag}_{iteration:04}.pgm`。
//! 固定范围保证同一求解过程的各帧灰度可比。

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mp_foundation::{MpResult, RuntimeScalar};
use mp_solver::{Field, SnapshotSink};

use crate::error::{IoError, IoResult};

/// PGM 快照写入器
///
/// 实现求解层的 [`SnapshotSink`]，每帧一个文件。
#[derive(Debug)]
pub struct PgmWriter {
    out_dir: PathBuf,
    lo: f64,
    hi: f64,
}

impl PgmWriter {
    /// 创建写入器，输出目录不存在时自动创建
    ///
    /// `lo` 与 `hi` 是灰度映射的值域，`lo` 映射到 0、`hi` 映射到 255，
    /// 超出范围的值钳制。
    pub fn new(out_dir: impl AsRef<Path>, lo: f64, hi: f64) -> IoResult<Self> {
        if !(lo < hi) || !lo.is_finite() || !hi.is_finite() {
            return Err(IoError::InvalidRange { lo, hi });
        }
        let out_dir = out_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&out_dir)?;
        Ok(Self { out_dir, lo, hi })
    }

    /// 输出目录
    #[inline]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn to_byte(&self, value: f64) -> u8 {
        let t = (value - self.lo) / (self.hi - self.lo);
        (t.clamp(0.0, 1.0) * 255.0).round() as u8
    }

    /// 写一帧中间 z 切片
    ///
    /// 图像宽为 ny、高为 nx，像素按 i 行 j 列排列。
    pub fn write_slice<S: RuntimeScalar>(
        &self,
        tag: &str,
        field: &Field<S>,
        iteration: usize,
    ) -> IoResult<PathBuf> {
        if tag.is_empty() || tag.contains(['/', '\\']) {
            return Err(IoError::InvalidTag(tag.to_string()));
        }

        let dims = field.dims();
        let k = dims.nz / 2;
        let path = self.out_dir.join(format!("{tag}_{iteration:04}.pgm"));

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        write!(writer, "P5\n{} {}\n255\n", dims.ny, dims.nx)?;

        let mut row = Vec::with_capacity(dims.ny);
        for i in 0..dims.nx {
            row.clear();
            for j in 0..dims.ny {
                row.push(self.to_byte(field.get(i, j, k).accum()));
            }
            writer.write_all(&row)?;
        }
        writer.flush()?;

        log::debug!("快照写入: {}", path.display());
        Ok(path)
    }
}

impl<S: RuntimeScalar> SnapshotSink<S> for PgmWriter {
    fn emit(&mut self, tag: &str, field: &Field<S>, iteration: usize) -> MpResult<()> {
        self.write_slice(tag, field, iteration)?;
        Ok(())
    }
}
