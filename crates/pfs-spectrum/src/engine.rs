//! 复数 FFT 与频率中心化.

use std::sync::Arc;

use num_complex::Complex32;
use pfs_core::{PfsError, PfsResult, alloc_zeroed};
use rustfft::{Fft, FftPlanner};

/// 固定长度的正向复数 FFT
///
/// 计划与 scratch 缓冲在创建时分配, 之后每次变换复用.
pub struct SpectralEngine {
    fft: Arc<dyn Fft<f32>>,
    len: usize,
    scratch: Vec<Complex32>,
}

impl SpectralEngine {
    /// 为 `len` 点变换创建引擎
    pub fn new(len: usize) -> PfsResult<Self> {
        if len == 0 {
            return Err(PfsError::Config("FFT 长度必须大于 0".into()));
        }
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = alloc_zeroed(fft.get_inplace_scratch_len(), "FFT scratch")?;
        Ok(Self { fft, len, scratch })
    }

    /// 变换长度
    pub fn fft_len(&self) -> usize {
        self.len
    }

    /// 原地正向变换 (未归一化, 核为 `exp(-i·2π·jk/n)`)
    pub fn forward(&mut self, buffer: &mut [Complex32]) -> PfsResult<()> {
        if buffer.len() != self.len {
            return Err(PfsError::Internal(format!(
                "FFT 输入长度 {} 与变换长度 {} 不符",
                buffer.len(),
                self.len
            )));
        }
        self.fft.process_with_scratch(buffer, &mut self.scratch);
        Ok(())
    }
}

/// 将 FFT 输出重排为从最负频率到最正频率
///
/// 偶数长度时等价于交换前后两半; 之后第 `i` 个频点对应频率 `(i - n/2)·freqres`.
pub fn swap_freq<T>(data: &mut [T]) {
    let n = data.len();
    data.rotate_left(n - n / 2);
}
