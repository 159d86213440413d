//! # pfs-resample
//!
//! PFS 复采样的相干降采样库.
//!
//! 提供:
//! - 相干求和降采样 (检波前对复采样求和, 保留相位)
//! - I/Q 交换与直流偏移处理
//! - 线性相位旋转 (频率偏移补偿)
//! - 降采样输出的缩放与 8 位截断

mod iq;
mod rotate;
mod scale;

use log::{debug, warn};
use num_complex::Complex32;
use pfs_core::{PfsError, PfsResult};

pub use iq::{DcOffset, swap_iq};
pub use rotate::PhaseRotator;
pub use scale::OutputScale;

/// 按从左到右的顺序求一组采样的和
#[inline]
fn sum_group(group: &[Complex32]) -> Complex32 {
    let mut acc = group[0];
    for s in &group[1..] {
        acc.re += s.re;
        acc.im += s.im;
    }
    acc
}

/// 对缓冲区做一次性降采样, 结果写入 `out`
///
/// 每个输出是 `factor` 个连续输入之和, I 与 Q 分别求和.
/// 返回被丢弃的尾部采样数 (不足一组时发出警告).
pub fn downsample_into(samples: &[Complex32], factor: usize, out: &mut Vec<Complex32>) -> usize {
    out.clear();
    if factor == 0 {
        return samples.len();
    }
    let whole = samples.len() / factor * factor;
    out.extend(samples[..whole].chunks_exact(factor).map(sum_group));
    let dropped = samples.len() - whole;
    if dropped != 0 {
        warn!(
            "采样数 {} 不是降采样因子 {factor} 的整数倍, 丢弃末尾 {dropped} 个采样",
            samples.len()
        );
    }
    dropped
}

/// 对缓冲区做一次性降采样
pub fn downsample(samples: &[Complex32], factor: usize) -> PfsResult<Vec<Complex32>> {
    if factor == 0 {
        return Err(PfsError::InvalidArgument("降采样因子必须大于 0".into()));
    }
    let mut out = Vec::new();
    out.try_reserve_exact(samples.len() / factor)
        .map_err(|_| PfsError::OutOfMemory("降采样输出".into()))?;
    downsample_into(samples, factor, &mut out);
    Ok(out)
}

/// 流式相干降采样器
///
/// 跨缓冲区保留不足一组的采样, 只有流末尾不足一组的部分会被丢弃.
/// 可在开始时丢弃若干采样, 用于对齐非整字的跳过位置.
#[derive(Debug)]
pub struct Downsampler {
    /// 降采样因子
    factor: usize,
    /// 尚需丢弃的起始采样数
    pending_skip: usize,
    /// 上一缓冲区遗留的采样
    carry: Vec<Complex32>,
}

impl Downsampler {
    /// 创建降采样器
    pub fn new(factor: usize) -> PfsResult<Self> {
        if factor == 0 {
            return Err(PfsError::Config("降采样因子必须大于 0".into()));
        }
        Ok(Self {
            factor,
            pending_skip: 0,
            carry: Vec::with_capacity(factor),
        })
    }

    /// 设置开始时需要丢弃的采样数
    pub fn with_skip(mut self, samples: usize) -> Self {
        self.pending_skip = samples;
        self
    }

    /// 降采样因子
    pub fn factor(&self) -> usize {
        self.factor
    }

    /// 是否需要降采样
    pub fn is_needed(&self) -> bool {
        self.factor > 1
    }

    /// 处理一个缓冲区, 输出追加到 `out`, 返回本次输出的采样数
    pub fn process(&mut self, input: &[Complex32], out: &mut Vec<Complex32>) -> usize {
        let start = out.len();
        let mut input = input;

        if self.pending_skip > 0 {
            let n = self.pending_skip.min(input.len());
            debug!("丢弃起始 {n} 个采样");
            input = &input[n..];
            self.pending_skip -= n;
        }

        if !self.carry.is_empty() {
            let take = (self.factor - self.carry.len()).min(input.len());
            self.carry.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.carry.len() < self.factor {
                return 0;
            }
            out.push(sum_group(&self.carry));
            self.carry.clear();
        }

        let whole = input.len() / self.factor * self.factor;
        out.extend(input[..whole].chunks_exact(self.factor).map(sum_group));
        self.carry.extend_from_slice(&input[whole..]);
        out.len() - start
    }

    /// 结束流, 返回被丢弃的尾部采样数
    pub fn finish(&mut self) -> usize {
        let dropped = self.carry.len();
        if dropped != 0 {
            warn!("流末尾 {dropped} 个采样不足降采样因子 {}, 已丢弃", self.factor);
        }
        self.carry.clear();
        dropped
    }
}
