//! 窗函数.
//!
//! - Hanning 窗: FFT 前作用于时域复采样
//! - Chebyshev 校正: 检波累加后作用于功率谱, 逐频点除以多项式权重

use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;
use num_complex::Complex32;
use pfs_core::{PfsError, PfsResult};

use crate::SpectrumStage;

/// Chebyshev 系数的最大个数
pub const MAX_CHEB_COEFFS: usize = 64;

/// 对复采样原地施加 Hanning 窗
///
/// 第 `i` 个采样的权重为 `0.5 - 0.5·cos(2π·i/(len-1))`, I 与 Q 相同.
pub fn hanning(samples: &mut [Complex32]) {
    let len = samples.len();
    if len < 2 {
        return;
    }
    let denom = (len - 1) as f64;
    for (i, s) in samples.iter_mut().enumerate() {
        let w = (0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos()) as f32;
        s.re *= w;
        s.im *= w;
    }
}

/// Chebyshev 通带校正
///
/// 系数按 `c[0]..c[degree]` 顺序保存, 加载后不可变.
#[derive(Debug, Clone, PartialEq)]
pub struct ChebyshevWindow {
    coeffs: Vec<f64>,
}

impl ChebyshevWindow {
    /// 由系数创建
    pub fn from_coeffs(coeffs: Vec<f64>) -> PfsResult<Self> {
        if coeffs.is_empty() {
            return Err(PfsError::Config("Chebyshev 系数为空".into()));
        }
        if coeffs.len() > MAX_CHEB_COEFFS {
            return Err(PfsError::Config(format!(
                "Chebyshev 系数过多: {} (最多 {MAX_CHEB_COEFFS})",
                coeffs.len()
            )));
        }
        Ok(Self { coeffs })
    }

    /// 从文本读取系数, 以空白分隔, 读到 EOF 为止
    pub fn from_reader<R: BufRead>(reader: R) -> PfsResult<Self> {
        let mut coeffs = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            for token in line.split_whitespace() {
                let c = token.parse::<f64>().map_err(|_| {
                    PfsError::Config(format!(
                        "Chebyshev 系数第 {} 行无法解析: {token:?}",
                        lineno + 1
                    ))
                })?;
                coeffs.push(c);
            }
        }
        Self::from_coeffs(coeffs)
    }

    /// 从文件读取系数
    pub fn open<P: AsRef<Path>>(path: P) -> PfsResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PfsError::Config(format!("无法打开 Chebyshev 系数文件 {}: {e}", path.display()))
        })?;
        let window = Self::from_reader(BufReader::new(file))?;
        debug!(
            "读取 Chebyshev 系数 {} 个 (阶数 {})",
            window.coeffs.len(),
            window.degree()
        );
        Ok(window)
    }

    /// 多项式阶数
    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// 系数
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// 用 Clenshaw 递推在 `x` 处求值
    pub fn evaluate(&self, x: f64) -> f64 {
        let c = &self.coeffs;
        let deg = c.len() - 1;
        if deg == 0 {
            return c[0];
        }
        let x2 = 2.0 * x;
        let mut c0 = c[deg - 1];
        let mut c1 = c[deg];
        for i in 2..=deg {
            let tmp = c0;
            c0 = c[deg - i] - c1;
            c1 = tmp + c1 * x2;
        }
        c0 + c1 * x
    }

    /// 第 `i` 个频点 (共 `len` 个) 的权重, 归一化频率 `x = -0.5 + i/len`
    pub fn weight_at(&self, i: usize, len: usize) -> f64 {
        self.evaluate(-0.5 + i as f64 / len as f64)
    }
}

impl SpectrumStage for ChebyshevWindow {
    fn name(&self) -> &str {
        "chebyshev"
    }

    fn apply(&self, power: &mut [f32]) -> PfsResult<()> {
        let len = power.len();
        for (i, p) in power.iter_mut().enumerate() {
            *p = (*p as f64 / self.weight_at(i, len)) as f32;
        }
        Ok(())
    }
}
