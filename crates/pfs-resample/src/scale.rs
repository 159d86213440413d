//! 降采样输出缩放.
//!
//! 输出值为 `scale * sum - dc * factor * scale`, 其中
//! `scale = fudge * 0.25 * 128 / (max_level * sqrt(factor))`.

use num_complex::Complex32;
use pfs_core::QuantMode;

use crate::iq::DcOffset;

/// 降采样输出缩放器
#[derive(Debug, Clone)]
pub struct OutputScale {
    /// 缩放系数
    scale: f32,
    /// I 直流项 (已乘因子与缩放)
    dc_i: f32,
    /// Q 直流项
    dc_q: f32,
    /// 输出时交换 I/Q
    swap_iq: bool,
    /// 降采样后的最大幅度
    max_value: f64,
}

impl OutputScale {
    pub fn new(mode: QuantMode, factor: usize, fudge: f64, dc: DcOffset, swap_iq: bool) -> Self {
        let max_value = mode.max_level() * (factor as f64).sqrt();
        let scale = (fudge * 0.25 * 128.0 / max_value) as f32;
        Self {
            scale,
            dc_i: dc.i * factor as f32 * scale,
            dc_q: dc.q * factor as f32 * scale,
            swap_iq,
            max_value,
        }
    }

    /// 缩放系数
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// 8 位输出是否可能超出动态范围
    pub fn may_clip(&self) -> bool {
        self.max_value > 255.0
    }

    #[inline]
    fn apply(&self, s: &Complex32) -> (f32, f32) {
        let i = self.scale * s.re - self.dc_i;
        let q = self.scale * s.im - self.dc_q;
        if self.swap_iq { (q, i) } else { (i, q) }
    }

    /// 转换为 I/Q 交错的浮点输出
    pub fn to_f32(&self, summed: &[Complex32], out: &mut Vec<f32>) {
        out.clear();
        for s in summed {
            let (a, b) = self.apply(s);
            out.push(a);
            out.push(b);
        }
    }

    /// 转换为 I/Q 交错的有符号字节, 返回被截断的分量数
    pub fn to_i8(&self, summed: &[Complex32], out: &mut Vec<i8>) -> u64 {
        out.clear();
        let mut clipped = 0u64;
        let mut clip = |v: f32| -> i8 {
            // 向零截断后限幅
            let v = v as i32;
            if v > i8::MAX as i32 {
                clipped += 1;
                i8::MAX
            } else if v < i8::MIN as i32 {
                clipped += 1;
                i8::MIN
            } else {
                v as i8
            }
        };
        for s in summed {
            let (a, b) = self.apply(s);
            out.push(clip(a));
            out.push(clip(b));
        }
        clipped
    }
}
