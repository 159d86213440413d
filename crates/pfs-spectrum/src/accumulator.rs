//! 非相干累加与直流频点修补.

use num_complex::Complex32;
use pfs_core::{PfsError, PfsResult, alloc_zeroed};

use crate::SpectrumStage;

/// 功率谱累加器
///
/// 每个周期开始时清零, 之后逐帧加入检波后的功率.
pub struct SpectralAccumulator {
    total: Vec<f32>,
    frames: usize,
}

impl SpectralAccumulator {
    pub fn new(len: usize) -> PfsResult<Self> {
        Ok(Self {
            total: alloc_zeroed(len, "频谱累加器")?,
            frames: 0,
        })
    }

    /// 清零, 开始新的周期
    pub fn reset(&mut self) {
        self.total.fill(0.0);
        self.frames = 0;
    }

    /// 检波 (`re² + im²`) 并累加一帧频谱
    pub fn add_power(&mut self, spectrum: &[Complex32]) -> PfsResult<()> {
        self.check_len(spectrum.len())?;
        for (acc, x) in self.total.iter_mut().zip(spectrum) {
            *acc += x.re * x.re + x.im * x.im;
        }
        self.frames += 1;
        Ok(())
    }

    /// 累加另一份功率谱
    pub fn add(&mut self, power: &[f32]) -> PfsResult<()> {
        self.check_len(power.len())?;
        for (acc, p) in self.total.iter_mut().zip(power) {
            *acc += *p;
        }
        self.frames += 1;
        Ok(())
    }

    fn check_len(&self, len: usize) -> PfsResult<()> {
        if len != self.total.len() {
            return Err(PfsError::Internal(format!(
                "累加长度 {len} 与累加器长度 {} 不符",
                self.total.len()
            )));
        }
        Ok(())
    }

    /// 已累加的帧数
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.total
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.total
    }
}

/// 直流频点修补
///
/// 第 `n/2` 个频点替换为相邻两个频点的平均值.
#[derive(Debug, Clone, Copy, Default)]
pub struct DcPatch;

impl SpectrumStage for DcPatch {
    fn name(&self) -> &str {
        "dcpatch"
    }

    fn apply(&self, power: &mut [f32]) -> PfsResult<()> {
        let n = power.len();
        if n < 3 {
            return Err(PfsError::InvalidArgument(format!(
                "频谱长度 {n} 过短, 无法修补直流频点"
            )));
        }
        let dc = n / 2;
        power[dc] = (power[dc - 1] + power[dc + 1]) / 2.0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_accumulation() {
        let mut acc = SpectralAccumulator::new(3).unwrap();
        let frame = [
            Complex32::new(1.0, 2.0),
            Complex32::new(0.0, -3.0),
            Complex32::new(0.5, 0.0),
        ];
        acc.add_power(&frame).unwrap();
        acc.add_power(&frame).unwrap();
        assert_eq!(acc.as_slice(), &[10.0, 18.0, 0.5]);
        assert_eq!(acc.frames(), 2);

        acc.reset();
        assert!(acc.as_slice().iter().all(|&v| v == 0.0));
        assert_eq!(acc.frames(), 0);
    }

    #[test]
    fn test_length_checked() {
        let mut acc = SpectralAccumulator::new(4).unwrap();
        assert!(acc.add(&[1.0; 3]).is_err());
        assert!(acc.add_power(&[Complex32::default(); 5]).is_err());
    }

    #[test]
    fn test_dc_patch_invariant() {
        for n in [3usize, 4, 7, 16, 1001] {
            let mut p: Vec<f32> = (0..n).map(|i| (i * i) as f32 * 0.37 + 1.0).collect();
            DcPatch.apply(&mut p).unwrap();
            let dc = n / 2;
            assert_eq!(p[dc], (p[dc - 1] + p[dc + 1]) / 2.0, "n={n}");
        }
        assert!(DcPatch.apply(&mut [1.0, 2.0]).is_err());
    }
}
