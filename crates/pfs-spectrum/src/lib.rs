//! # pfs-spectrum
//!
//! PFS 非相干累加频谱仪.
//!
//! 每个周期: 读入 `sum` 个缓冲区, 逐个解包、(去直流)、(降采样)、(交换 I/Q)、
//! (Hanning 加窗)、FFT、频率中心化、检波并累加; 然后修补直流频点,
//! (Chebyshev 校正), 在参考频带内统计均值与标准差并归一化输出.
//!
//! ## 使用示例
//!
//! ```rust
//! use pfs_spectrum::{DcPatch, StageChain};
//!
//! let mut chain = StageChain::new();
//! chain.add_stage(Box::new(DcPatch));
//!
//! let mut power = vec![1.0f32, 2.0, 100.0, 4.0];
//! chain.process(&mut power).unwrap();
//! assert_eq!(power[2], 3.0);
//! ```

pub mod accumulator;
pub mod engine;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod window;

use pfs_core::PfsResult;

/// 检波后功率谱的处理阶段
///
/// 阶段原地修改累加后的功率谱, 如直流修补、Chebyshev 校正.
pub trait SpectrumStage: Send {
    /// 获取阶段名称
    fn name(&self) -> &str;

    /// 原地处理功率谱
    fn apply(&self, power: &mut [f32]) -> PfsResult<()>;
}

/// 阶段链
///
/// 功率谱依次流经每个阶段; 空链为透传.
pub struct StageChain {
    stages: Vec<Box<dyn SpectrumStage>>,
}

impl StageChain {
    /// 创建空的阶段链
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// 添加阶段到链尾
    pub fn add_stage(&mut self, stage: Box<dyn SpectrumStage>) {
        self.stages.push(stage);
    }

    /// 阶段数量
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// 依次执行所有阶段
    pub fn process(&self, power: &mut [f32]) -> PfsResult<()> {
        for stage in &self.stages {
            stage.apply(power)?;
        }
        Ok(())
    }

    /// 获取阶段名称列表 (调试用)
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for StageChain {
    fn default() -> Self {
        Self::new()
    }
}

// 便捷重导出
pub use accumulator::{DcPatch, SpectralAccumulator};
pub use engine::{SpectralEngine, swap_freq};
pub use normalize::{BandStatistics, OUTLIER_SIGMAS, RmsBand};
pub use output::{FreqWindow, OutputFormat, SpectrumWriter};
pub use pipeline::{DcRemoval, RunSummary, SpectrometerConfig, SpectrometerContext};
pub use window::{ChebyshevWindow, MAX_CHEB_COEFFS, hanning};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_阶段链_空链透传() {
        let chain = StageChain::new();
        let mut power = vec![1.0f32, 2.0, 3.0];
        chain.process(&mut power).unwrap();
        assert_eq!(power, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_阶段链_直流修补后校正() {
        let mut chain = StageChain::new();
        chain.add_stage(Box::new(DcPatch));
        chain.add_stage(Box::new(ChebyshevWindow::from_coeffs(vec![2.0]).unwrap()));
        assert_eq!(chain.stage_names(), vec!["dcpatch", "chebyshev"]);

        let mut power = vec![2.0f32, 4.0, 50.0, 8.0];
        chain.process(&mut power).unwrap();
        // 直流 = (4 + 8) / 2 = 6, 再整体除以常数 2
        assert_eq!(power, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
