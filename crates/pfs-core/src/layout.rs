//! 缓冲区尺寸与跳过位置计算.
//!
//! 读缓冲区大小由变换长度和模式的每字采样数决定:
//! `bufsize = fftlen * 4 / samples_per_word`, 按整数截断.

use log::warn;

use crate::error::{PfsError, PfsResult};
use crate::mode::QuantMode;

/// 一个打包字的字节数
pub const WORD_BYTES: usize = 4;

/// 频谱计算的缓冲区布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// 量化模式
    pub mode: QuantMode,
    /// 降采样前的变换长度 (复采样数)
    pub fft_len_full: usize,
    /// 降采样因子
    pub downsample: usize,
    /// 实际 FFT 长度
    pub fft_len: usize,
    /// 每次变换读取的字节数
    pub buf_size: usize,
    /// 每个缓冲区解出的复采样数
    pub nsamples: usize,
}

impl BufferLayout {
    /// 按采样频率 (MHz) 与频率分辨率 (Hz) 计算布局
    pub fn for_spectrum(
        mode: QuantMode,
        fsamp_mhz: f64,
        freqres_hz: f64,
        downsample: usize,
    ) -> PfsResult<Self> {
        if fsamp_mhz.is_nan() || fsamp_mhz <= 0.0 {
            return Err(PfsError::Config("必须指定采样频率".into()));
        }
        if freqres_hz.is_nan() || freqres_hz <= 0.0 {
            return Err(PfsError::Config(format!("无效频率分辨率: {freqres_hz}")));
        }
        if downsample == 0 {
            return Err(PfsError::Config("降采样因子必须大于 0".into()));
        }

        let full = (fsamp_mhz / freqres_hz * 1e6).round_ties_even();
        if !full.is_finite() || full < 1.0 {
            return Err(PfsError::Config(format!(
                "变换长度无效: fsamp={fsamp_mhz} MHz, 分辨率={freqres_hz} Hz"
            )));
        }
        Self::for_fft_len(mode, full as usize, downsample)
    }

    /// 按降采样前的变换长度计算布局
    pub fn for_fft_len(mode: QuantMode, fft_len_full: usize, downsample: usize) -> PfsResult<Self> {
        if downsample == 0 {
            return Err(PfsError::Config("降采样因子必须大于 0".into()));
        }
        let smpwd = mode.samples_per_word();
        let buf_size = (fft_len_full as f64 * WORD_BYTES as f64 / smpwd) as usize;
        if buf_size % mode.unit_bytes() != 0 {
            return Err(PfsError::Config(format!(
                "变换长度 {fft_len_full} 在模式 {mode} 下不能对齐到整字 (每字 {smpwd} 个采样)"
            )));
        }
        let fft_len = fft_len_full / downsample;
        if fft_len < 4 {
            return Err(PfsError::Config(format!(
                "FFT 长度过短: {fft_len_full} / {downsample} = {fft_len}"
            )));
        }
        let nsamples = (buf_size as f64 * smpwd / WORD_BYTES as f64) as usize;

        Ok(Self {
            mode,
            fft_len_full,
            downsample,
            fft_len,
            buf_size,
            nsamples,
        })
    }

    /// 处理带宽 (Hz)
    pub fn bandwidth(&self, freqres_hz: f64) -> f64 {
        freqres_hz * self.fft_len as f64
    }
}

/// 将字节数拆分为可解包的整单元部分与剩余字节
pub fn split_units(mode: QuantMode, len: usize) -> (usize, usize) {
    let unit = mode.unit_bytes();
    let rem = len % unit;
    (len - rem, rem)
}

/// 指定字节数 (整单元) 可解出的复采样数
pub fn samples_in(mode: QuantMode, bytes: usize) -> usize {
    bytes / mode.unit_bytes() * mode.samples_per_unit()
}

/// 计算流式处理的读缓冲区字节数
///
/// 结果为整单元, 且解出的采样数是 `factor` 的整数倍, 大小接近 `target` 字节.
/// 若 `limit` (如文件剩余长度) 更小, 则截断为不超过它的整单元.
pub fn chunk_bytes(
    mode: QuantMode,
    target: usize,
    factor: usize,
    limit: Option<u64>,
) -> PfsResult<usize> {
    if factor == 0 {
        return Err(PfsError::Config("降采样因子必须大于 0".into()));
    }
    let per_unit = mode.samples_per_unit();
    let units = factor / gcd(per_unit, factor);
    let step = units * mode.unit_bytes();
    let count = ((target as f64 / step as f64).round() as usize).max(1);
    let mut bytes = count * step;

    if let Some(limit) = limit {
        if (bytes as u64) > limit {
            let (whole, _) = split_units(mode, limit as usize);
            bytes = whole;
        }
    }
    if bytes == 0 {
        return Err(PfsError::InvalidData(format!(
            "输入不足一个完整单元 ({} 字节)",
            mode.unit_bytes()
        )));
    }
    Ok(bytes)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// 文件起始处的跳过计划
///
/// 只能按整单元 seek, 不足一个单元的采样在解包后丢弃.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkipPlan {
    /// seek 的字节数 (整单元)
    pub seek_bytes: u64,
    /// 解包后需要额外丢弃的复采样数
    pub residual_samples: usize,
}

impl SkipPlan {
    /// 不跳过
    pub const NONE: SkipPlan = SkipPlan {
        seek_bytes: 0,
        residual_samples: 0,
    };

    /// 按复采样数跳过
    pub fn from_samples(mode: QuantMode, samples: u64) -> Self {
        let per_unit = mode.samples_per_unit() as u64;
        let units = samples / per_unit;
        Self {
            seek_bytes: units * mode.unit_bytes() as u64,
            residual_samples: (samples % per_unit) as usize,
        }
    }

    /// 按秒数跳过, seek 位置向下对齐到整单元
    pub fn from_seconds(mode: QuantMode, fsamp_mhz: f64, seconds: f64) -> PfsResult<Self> {
        if seconds.is_nan() || seconds < 0.0 {
            return Err(PfsError::Config(format!("跳过秒数无效: {seconds}")));
        }
        let bytes =
            (fsamp_mhz * 1e6 * seconds * WORD_BYTES as f64 / mode.samples_per_word())
                .round_ties_even() as u64;
        let unit = mode.unit_bytes() as u64;
        let aligned = bytes - bytes % unit;
        if aligned != bytes {
            warn!("跳过 {bytes} 字节未对齐到整字, 改为 {aligned} 字节");
        }
        Ok(Self {
            seek_bytes: aligned,
            residual_samples: 0,
        })
    }

    /// 是否需要跳过
    pub fn is_empty(&self) -> bool {
        self.seek_bytes == 0 && self.residual_samples == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_layout_mode1() {
        // 10 MHz, 1 kHz 分辨率 -> 10000 点
        let layout = BufferLayout::for_spectrum(QuantMode::Dual2Bit, 10.0, 1000.0, 1).unwrap();
        assert_eq!(layout.fft_len, 10000);
        assert_eq!(layout.buf_size, 5000);
        assert_eq!(layout.nsamples, 10000);
    }

    #[test]
    fn test_spectrum_layout_downsample() {
        let layout = BufferLayout::for_spectrum(QuantMode::Dual8Bit, 1.0, 1000.0, 4).unwrap();
        assert_eq!(layout.fft_len_full, 1000);
        assert_eq!(layout.fft_len, 250);
        assert_eq!(layout.buf_size, 2000);
        assert_eq!(layout.nsamples, 1000);
    }

    #[test]
    fn test_spectrum_layout_float32() {
        let layout = BufferLayout::for_fft_len(QuantMode::Float32, 64, 1).unwrap();
        assert_eq!(layout.buf_size, 512);
        assert_eq!(layout.nsamples, 64);
    }

    #[test]
    fn test_spectrum_layout_unaligned() {
        // 2c2b 每字 8 个采样, 12 点不能整字
        let err = BufferLayout::for_fft_len(QuantMode::Dual2Bit, 12, 1).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_spectrum_layout_missing_fsamp() {
        assert!(BufferLayout::for_spectrum(QuantMode::Dual2Bit, 0.0, 1.0, 1).is_err());
        assert!(BufferLayout::for_spectrum(QuantMode::Dual2Bit, 1.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_split_units() {
        assert_eq!(split_units(QuantMode::Dual2Bit, 10), (8, 2));
        assert_eq!(split_units(QuantMode::Float32, 20), (16, 4));
        assert_eq!(samples_in(QuantMode::Dual2Bit, 8), 16);
        assert_eq!(samples_in(QuantMode::Float32, 16), 2);
    }

    #[test]
    fn test_chunk_bytes_multiple_of_factor() {
        for mode in QuantMode::ALL {
            for factor in [1, 3, 7, 16] {
                let bytes = chunk_bytes(mode, 1_000_000, factor, None).unwrap();
                assert_eq!(bytes % mode.unit_bytes(), 0);
                assert_eq!(samples_in(mode, bytes) % factor, 0, "{mode} d={factor}");
            }
        }
    }

    #[test]
    fn test_chunk_bytes_limited_by_file() {
        let bytes = chunk_bytes(QuantMode::Dual2Bit, 1_000_000, 1, Some(1001)).unwrap();
        assert_eq!(bytes, 1000);
        assert!(chunk_bytes(QuantMode::Float32, 1_000_000, 1, Some(7)).is_err());
    }

    #[test]
    fn test_skip_from_samples() {
        // 2c2b: 8 个采样一字, 19 个采样 = 2 字 + 3 个采样
        let plan = SkipPlan::from_samples(QuantMode::Dual2Bit, 19);
        assert_eq!(plan.seek_bytes, 8);
        assert_eq!(plan.residual_samples, 3);

        let plan = SkipPlan::from_samples(QuantMode::Float32, 5);
        assert_eq!(plan.seek_bytes, 40);
        assert_eq!(plan.residual_samples, 0);
    }

    #[test]
    fn test_skip_from_seconds() {
        // 1 MHz, 1 s, 2c8b: 2 个采样一字 -> 2e6 字节
        let plan = SkipPlan::from_seconds(QuantMode::Dual8Bit, 1.0, 1.0).unwrap();
        assert_eq!(plan.seek_bytes, 2_000_000);
        assert!(SkipPlan::from_seconds(QuantMode::Dual8Bit, 1.0, -1.0).is_err());
        assert!(SkipPlan::NONE.is_empty());
    }
}
