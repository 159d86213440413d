//! 线性相位旋转.

use std::f64::consts::PI;

use num_complex::Complex32;
use pfs_core::{PfsError, PfsResult};

/// 线性相位旋转器
///
/// 第 k 个采样乘以 `exp(i·2π·f·t_k)`, 时间跨缓冲区连续.
pub struct PhaseRotator {
    /// 角频率 (rad/s)
    omega: f64,
    /// 采样间隔 (s)
    interval: f64,
    /// 已处理的采样数
    elapsed: u64,
}

impl PhaseRotator {
    /// 按采样频率 (MHz) 与频率偏移 (Hz) 创建
    pub fn new(fsamp_mhz: f64, freq_hz: f64) -> PfsResult<Self> {
        if fsamp_mhz.is_nan() || fsamp_mhz <= 0.0 {
            return Err(PfsError::Config("相位旋转需要指定采样频率".into()));
        }
        Ok(Self {
            omega: 2.0 * PI * freq_hz,
            interval: 1.0 / (fsamp_mhz * 1e6),
            elapsed: 0,
        })
    }

    /// 当前时间 (s)
    pub fn time(&self) -> f64 {
        self.elapsed as f64 * self.interval
    }

    /// 对缓冲区原地旋转
    pub fn apply(&mut self, samples: &mut [Complex32]) {
        for (k, s) in samples.iter_mut().enumerate() {
            let t = (self.elapsed + k as u64) as f64 * self.interval;
            let (sin, cos) = (self.omega * t).sin_cos();
            *s *= Complex32::new(cos as f32, sin as f32);
        }
        self.elapsed += samples.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quarter_turn_per_sample() {
        // fsamp = 1 MHz, 偏移 250 kHz: 每个采样旋转 90 度
        let mut rot = PhaseRotator::new(1.0, 250_000.0).unwrap();
        let mut x = vec![Complex32::new(1.0, 0.0); 4];
        rot.apply(&mut x);
        let expected = [(1.0, 0.0), (0.0, 1.0), (-1.0, 0.0), (0.0, -1.0)];
        for (s, (re, im)) in x.iter().zip(expected) {
            assert!((s.re - re).abs() < 1e-6 && (s.im - im).abs() < 1e-6, "{s}");
        }
    }

    #[test]
    fn test_time_is_continuous() {
        let mut a = PhaseRotator::new(2.0, 12_345.0).unwrap();
        let mut b = PhaseRotator::new(2.0, 12_345.0).unwrap();
        let mut whole = vec![Complex32::new(1.0, 1.0); 10];
        let mut parts = whole.clone();
        a.apply(&mut whole);
        b.apply(&mut parts[..3]);
        b.apply(&mut parts[3..]);
        assert_eq!(whole, parts);
        assert!((b.time() - 5e-6).abs() < 1e-15);
    }

    #[test]
    fn test_requires_fsamp() {
        assert!(PhaseRotator::new(0.0, 10.0).is_err());
    }
}
