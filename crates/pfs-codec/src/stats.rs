//! I/Q 统计量: 直流、均方根与 I/Q 相关系数.

use num_complex::Complex32;
use pfs_core::{PfsError, PfsResult};
use serde::Serialize;

/// I/Q 累加器
#[derive(Debug, Clone, Default)]
pub struct IqAccumulator {
    samples: u64,
    sum_i: f64,
    sum_q: f64,
    sum_ii: f64,
    sum_qq: f64,
    sum_iq: f64,
}

impl IqAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn push(&mut self, i: f64, q: f64) {
        self.samples += 1;
        self.sum_i += i;
        self.sum_q += q;
        self.sum_ii += i * i;
        self.sum_qq += q * q;
        self.sum_iq += i * q;
    }

    /// 累加 I/Q 交错的 i8 采样
    pub fn add_i8(&mut self, interleaved: &[i8]) {
        for pair in interleaved.chunks_exact(2) {
            self.push(pair[0] as f64, pair[1] as f64);
        }
    }

    /// 累加复数采样
    pub fn add_complex(&mut self, samples: &[Complex32]) {
        for s in samples {
            self.push(s.re as f64, s.im as f64);
        }
    }

    /// 已累加的复采样数
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// 计算统计结果
    pub fn finish(&self) -> PfsResult<IqStats> {
        if self.samples == 0 {
            return Err(PfsError::InvalidData("没有可统计的采样".into()));
        }
        let n = self.samples as f64;
        let dc_i = self.sum_i / n;
        let dc_q = self.sum_q / n;
        let rms_i = (self.sum_ii / n - dc_i * dc_i).max(0.0).sqrt();
        let rms_q = (self.sum_qq / n - dc_q * dc_q).max(0.0).sqrt();
        let iq = self.sum_iq / n;
        let r_iq = if rms_i > 0.0 && rms_q > 0.0 {
            (iq - dc_i * dc_q).abs() / rms_i / rms_q
        } else {
            0.0
        };
        Ok(IqStats {
            samples: self.samples,
            dc_i,
            rms_i,
            dc_q,
            rms_q,
            r_iq,
        })
    }
}

/// I/Q 统计结果 (单位: 数字化计数)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqStats {
    /// 复采样数
    pub samples: u64,
    /// I 直流
    pub dc_i: f64,
    /// I 均方根
    pub rms_i: f64,
    /// Q 直流
    pub dc_q: f64,
    /// Q 均方根
    pub rms_q: f64,
    /// I/Q 相关系数
    pub r_iq: f64,
}

impl IqStats {
    /// 换算为电压: 数值 / 电平数 / 2
    pub fn to_volts(&self, levels: u32) -> IqStats {
        let scale = levels as f64 * 2.0;
        IqStats {
            dc_i: self.dc_i / scale,
            rms_i: self.rms_i / scale,
            dc_q: self.dc_q / scale,
            rms_q: self.rms_q / scale,
            ..*self
        }
    }

    /// I 与 Q 均方根功率 (dBm)
    pub fn rms_dbm(&self, levels: u32) -> (f64, f64) {
        let volts = self.to_volts(levels);
        (
            20.0 * volts.rms_i.log10() + 13.0,
            20.0 * volts.rms_q.log10() + 13.0,
        )
    }
}

/// 单个通道的完整统计报告
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    /// 通道名 (单极化模式为 None)
    pub channel: Option<String>,
    /// 数字化计数
    pub counts: IqStats,
    /// 电压 (仅量化模式)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volts: Option<IqStats>,
    /// I/Q 均方根功率 dBm (仅量化模式)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms_dbm: Option<(f64, f64)>,
}

impl ChannelReport {
    pub fn new(channel: Option<String>, counts: IqStats, levels: Option<u32>) -> Self {
        Self {
            channel,
            counts,
            volts: levels.map(|l| counts.to_volts(l)),
            rms_dbm: levels.map(|l| counts.rms_dbm(l)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_signal() {
        let mut acc = IqAccumulator::new();
        acc.add_i8(&[3, -1, 3, -1, 3, -1]);
        let stats = acc.finish().unwrap();
        assert_eq!(stats.samples, 3);
        assert_eq!(stats.dc_i, 3.0);
        assert_eq!(stats.dc_q, -1.0);
        assert_eq!(stats.rms_i, 0.0);
        assert_eq!(stats.r_iq, 0.0);
    }

    #[test]
    fn test_rms_and_correlation() {
        // I = Q = ±1 交替: 完全相关
        let mut acc = IqAccumulator::new();
        acc.add_i8(&[1, 1, -1, -1, 1, 1, -1, -1]);
        let stats = acc.finish().unwrap();
        assert_eq!(stats.dc_i, 0.0);
        assert!((stats.rms_i - 1.0).abs() < 1e-12);
        assert!((stats.r_iq - 1.0).abs() < 1e-12);

        // Q 与 I 独立
        let mut acc = IqAccumulator::new();
        acc.add_complex(&[
            Complex32::new(1.0, 1.0),
            Complex32::new(1.0, -1.0),
            Complex32::new(-1.0, 1.0),
            Complex32::new(-1.0, -1.0),
        ]);
        assert_eq!(acc.finish().unwrap().r_iq, 0.0);
    }

    #[test]
    fn test_volts_and_dbm() {
        let stats = IqStats {
            samples: 1,
            dc_i: 0.0,
            rms_i: 8.0,
            dc_q: 0.0,
            rms_q: 8.0,
            r_iq: 0.0,
        };
        let volts = stats.to_volts(4);
        assert_eq!(volts.rms_i, 1.0);
        let (di, dq) = stats.rms_dbm(4);
        assert!((di - 13.0).abs() < 1e-12);
        assert_eq!(di, dq);
    }

    #[test]
    fn test_empty_is_error() {
        assert!(IqAccumulator::new().finish().is_err());
    }
}
