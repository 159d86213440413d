//! 频谱输出.
//!
//! 文本输出每行 `频率 值`, 频率为 `(i - n/2)·freqres`, 格式与 C `"% .3f % .3e"` 一致;
//! 二进制输出为小端 32 位浮点. 时间序列模式每个周期写出整帧归一化频谱.

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use pfs_core::PfsResult;
use pfs_core::text::{format_fixed, format_sci};

use crate::normalize::BandStatistics;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 文本: 每行频率与值
    #[default]
    Text,
    /// 二进制: 仅输出值 (f32)
    Binary,
}

/// 输出频率窗口 (Hz), 两端均为 0 表示输出全部频点
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreqWindow {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FreqWindow {
    pub fn new(min_hz: f64, max_hz: f64) -> Self {
        Self { min_hz, max_hz }
    }

    pub fn is_set(&self) -> bool {
        self.min_hz != 0.0 || self.max_hz != 0.0
    }

    /// 频率是否在闭区间 `[min, max]` 内
    pub fn contains(&self, freq_hz: f64) -> bool {
        !self.is_set() || (freq_hz >= self.min_hz && freq_hz <= self.max_hz)
    }
}

/// 频谱写出器
pub struct SpectrumWriter<W: Write> {
    inner: W,
    format: OutputFormat,
    db: bool,
    window: FreqWindow,
}

impl<W: Write> SpectrumWriter<W> {
    pub fn new(inner: W, format: OutputFormat) -> Self {
        Self {
            inner,
            format,
            db: false,
            window: FreqWindow::default(),
        }
    }

    /// 输出 `10·log10(value)`
    pub fn with_db(mut self, db: bool) -> Self {
        self.db = db;
        self
    }

    /// 只输出窗口内的频点
    pub fn with_window(mut self, window: FreqWindow) -> Self {
        self.window = window;
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// 写出一条累加频谱, 返回写出的频点数
    pub fn write_spectrum(
        &mut self,
        power: &[f32],
        stats: &BandStatistics,
        freqres_hz: f64,
    ) -> PfsResult<usize> {
        let center = (power.len() / 2) as f64;
        let mut written = 0;
        for (i, &p) in power.iter().enumerate() {
            let freq = (i as f64 - center) * freqres_hz;
            if !self.window.contains(freq) {
                continue;
            }
            let mut value = stats.normalize(p);
            if self.db {
                value = 10.0 * value.log10();
            }
            match self.format {
                OutputFormat::Binary => self.inner.write_f32::<LittleEndian>(value)?,
                OutputFormat::Text => writeln!(
                    self.inner,
                    "{} {}",
                    format_fixed(freq, 3),
                    format_sci(value as f64, 3)
                )?,
            }
            written += 1;
        }
        self.inner.flush()?;
        Ok(written)
    }

    /// 写出一帧时间序列 (归一化后的整帧 f32) 并刷新
    pub fn write_frame(&mut self, power: &[f32], stats: &BandStatistics) -> PfsResult<()> {
        for &p in power {
            self.inner.write_f32::<LittleEndian>(stats.normalize(p))?;
        }
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
