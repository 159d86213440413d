//! I/Q 分量处理.

use num_complex::Complex32;

/// 交换每个采样的 I 与 Q (等价于频率轴反转)
pub fn swap_iq(samples: &mut [Complex32]) {
    for s in samples {
        std::mem::swap(&mut s.re, &mut s.im);
    }
}

/// I/Q 直流偏移
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DcOffset {
    pub i: f32,
    pub q: f32,
}

impl DcOffset {
    pub fn new(i: f32, q: f32) -> Self {
        Self { i, q }
    }

    /// 计算缓冲区的 I/Q 均值
    pub fn mean_of(samples: &[Complex32]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let (mut i, mut q) = (0.0f64, 0.0f64);
        for s in samples {
            i += s.re as f64;
            q += s.im as f64;
        }
        let n = samples.len() as f64;
        Self {
            i: (i / n) as f32,
            q: (q / n) as f32,
        }
    }

    /// 是否为零偏移
    pub fn is_zero(&self) -> bool {
        self.i == 0.0 && self.q == 0.0
    }

    /// 从每个采样中减去偏移
    pub fn remove(&self, samples: &mut [Complex32]) {
        if self.is_zero() {
            return;
        }
        for s in samples {
            s.re -= self.i;
            s.im -= self.q;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_iq() {
        let mut x = vec![Complex32::new(1.0, 2.0), Complex32::new(-3.0, 4.0)];
        swap_iq(&mut x);
        assert_eq!(x, vec![Complex32::new(2.0, 1.0), Complex32::new(4.0, -3.0)]);
    }

    #[test]
    fn test_mean_and_remove() {
        let mut x = vec![Complex32::new(3.0, -1.0), Complex32::new(1.0, 1.0)];
        let dc = DcOffset::mean_of(&x);
        assert_eq!(dc, DcOffset::new(2.0, 0.0));
        dc.remove(&mut x);
        assert_eq!(x, vec![Complex32::new(1.0, -1.0), Complex32::new(-1.0, 1.0)]);
        assert_eq!(DcOffset::mean_of(&[]), DcOffset::default());
    }
}
