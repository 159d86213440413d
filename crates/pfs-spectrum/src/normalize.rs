//! 参考频带统计与归一化.
//!
//! 第一遍在参考频带内计算均值与标准差; 第二遍剔除偏离第一遍均值
//! 超过 3.5 倍标准差的频点后重新计算. 未指定频带时均值为 0, 标准差为 1.

use std::ops::Range;

use log::debug;
use pfs_core::{PfsError, PfsResult};

/// 离群剔除阈值 (标准差倍数)
pub const OUTLIER_SIGMAS: f64 = 3.5;

/// 归一化参考频带 (Hz, 相对中心频率)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RmsBand {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl RmsBand {
    pub fn new(min_hz: f64, max_hz: f64) -> Self {
        Self { min_hz, max_hz }
    }

    /// 是否指定了频带 (两端均为 0 表示未指定)
    pub fn is_set(&self) -> bool {
        self.min_hz != 0.0 || self.max_hz != 0.0
    }

    /// 检查频带是否位于处理带宽内
    pub fn validate(&self, freqres_hz: f64, fft_len: usize) -> PfsResult<()> {
        if !self.is_set() {
            return Ok(());
        }
        let half = freqres_hz * fft_len as f64 / 2.0;
        if self.min_hz > self.max_hz || self.min_hz < -half || self.max_hz > half {
            return Err(PfsError::Config(format!(
                "参考频带 [{}, {}] Hz 无效 (处理带宽 ±{half} Hz)",
                self.min_hz, self.max_hz
            )));
        }
        let range = self.bin_range(freqres_hz, fft_len);
        if range.is_empty() {
            return Err(PfsError::Config(format!(
                "参考频带 [{}, {}] Hz 不包含任何频点",
                self.min_hz, self.max_hz
            )));
        }
        Ok(())
    }

    /// 频带对应的频点下标范围 `[imin, imax)`, 向零截断
    pub fn bin_range(&self, freqres_hz: f64, fft_len: usize) -> Range<usize> {
        let center = (fft_len / 2) as f64;
        let to_bin = |hz: f64| -> usize {
            let i = (center + hz / freqres_hz).trunc();
            i.clamp(0.0, fft_len as f64) as usize
        };
        to_bin(self.min_hz)..to_bin(self.max_hz)
    }
}

/// 归一化统计量
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStatistics {
    /// 最终均值 (第二遍)
    pub mean: f64,
    /// 最终标准差 (第二遍)
    pub sigma: f64,
    /// 第一遍均值
    pub first_mean: f64,
    /// 第一遍标准差
    pub first_sigma: f64,
    /// 第二遍使用的频点数
    pub used: usize,
    /// 被剔除的频点数
    pub rejected: usize,
}

impl BandStatistics {
    /// 恒等归一化
    pub const IDENTITY: BandStatistics = BandStatistics {
        mean: 0.0,
        sigma: 1.0,
        first_mean: 0.0,
        first_sigma: 1.0,
        used: 0,
        rejected: 0,
    };

    /// 在 `range` 内做两遍统计
    pub fn compute(data: &[f32], range: Range<usize>) -> PfsResult<Self> {
        let band = data.get(range.clone()).ok_or_else(|| {
            PfsError::InvalidArgument(format!(
                "参考频带 {range:?} 超出频谱长度 {}",
                data.len()
            ))
        })?;
        if band.is_empty() {
            return Err(PfsError::Config("参考频带不包含任何频点".into()));
        }

        let (first_mean, first_sigma) = mean_sigma(band.iter().map(|&v| v as f64));

        let kept = band
            .iter()
            .map(|&v| v as f64)
            .filter(|&v| !is_outlier(v, first_mean, first_sigma));
        let used = kept.clone().count();
        let (mean, sigma) = mean_sigma(kept);
        let rejected = band.len() - used;
        if rejected != 0 {
            debug!(
                "参考频带剔除 {rejected} 个离群频点: 均值 {first_mean:.6e} -> {mean:.6e}, \
                 标准差 {first_sigma:.6e} -> {sigma:.6e}"
            );
        }

        Ok(Self {
            mean,
            sigma,
            first_mean,
            first_sigma,
            used,
            rejected,
        })
    }

    /// 归一化单个值
    #[inline]
    pub fn normalize(&self, value: f32) -> f32 {
        ((value as f64 - self.mean) / self.sigma) as f32
    }

    /// 原地归一化
    pub fn apply(&self, data: &mut [f32]) {
        for v in data {
            *v = self.normalize(*v);
        }
    }
}

impl Default for BandStatistics {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// 偏离超过阈值 (严格大于) 即为离群; 标准差为 0 时不剔除
#[inline]
fn is_outlier(value: f64, mean: f64, sigma: f64) -> bool {
    sigma > 0.0 && ((value - mean) / sigma).abs() > OUTLIER_SIGMAS
}

/// 总体均值与标准差
fn mean_sigma(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (mut n, mut sum, mut sum2) = (0usize, 0.0f64, 0.0f64);
    for v in values {
        n += 1;
        sum += v;
        sum2 += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = (sum2 / n as f64 - mean * mean).max(0.0);
    (mean, var.sqrt())
}
