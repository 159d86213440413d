//! 量化电平直方图.

use pfs_core::{PfsError, PfsResult, QuantMode};
use serde::Serialize;

/// 直方图的一行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistogramRow {
    /// 电平值
    pub level: i32,
    /// I 计数
    pub i_count: u64,
    /// Q 计数
    pub q_count: u64,
}

/// I/Q 量化电平直方图
///
/// 2/4 位模式的电平为奇数 `-(levels-1)..=levels-1`, 步长 2;
/// 8 位模式覆盖 `-levels/2..levels/2`.
#[derive(Debug, Clone)]
pub struct LevelHistogram {
    /// 最小电平
    min_level: i32,
    /// 相邻电平间距
    step: i32,
    i_counts: Vec<u64>,
    q_counts: Vec<u64>,
    /// 落在电平网格之外的分量数
    outliers: u64,
}

impl LevelHistogram {
    /// 为量化模式创建直方图
    pub fn for_mode(mode: QuantMode) -> PfsResult<Self> {
        let levels = mode
            .levels()
            .ok_or_else(|| PfsError::Unsupported(format!("模式 {mode} 没有量化电平")))?
            as i32;
        let (min_level, step, bins) = if mode.bits_per_component() == 8 {
            (-levels / 2, 1, levels as usize)
        } else {
            (-(levels - 1), 2, levels as usize)
        };
        Ok(Self {
            min_level,
            step,
            i_counts: vec![0; bins],
            q_counts: vec![0; bins],
            outliers: 0,
        })
    }

    fn bin(&self, value: i8) -> Option<usize> {
        let offset = value as i32 - self.min_level;
        if offset < 0 || offset % self.step != 0 {
            return None;
        }
        let idx = (offset / self.step) as usize;
        (idx < self.i_counts.len()).then_some(idx)
    }

    /// 累加 I/Q 交错的 i8 采样
    pub fn add_i8(&mut self, interleaved: &[i8]) {
        for pair in interleaved.chunks_exact(2) {
            match self.bin(pair[0]) {
                Some(k) => self.i_counts[k] += 1,
                None => self.outliers += 1,
            }
            match self.bin(pair[1]) {
                Some(k) => self.q_counts[k] += 1,
                None => self.outliers += 1,
            }
        }
    }

    /// 电平网格之外的分量数
    pub fn outliers(&self) -> u64 {
        self.outliers
    }

    /// 按电平升序输出各行
    pub fn rows(&self) -> Vec<HistogramRow> {
        self.i_counts
            .iter()
            .zip(&self.q_counts)
            .enumerate()
            .map(|(k, (&i_count, &q_count))| HistogramRow {
                level: self.min_level + k as i32 * self.step,
                i_count,
                q_count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2bit_levels() {
        let mut hist = LevelHistogram::for_mode(QuantMode::Dual2Bit).unwrap();
        hist.add_i8(&[3, -3, 3, 1, -1, 1]);
        let rows = hist.rows();
        let levels: Vec<i32> = rows.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![-3, -1, 1, 3]);
        assert_eq!(rows[3].i_count, 2);
        assert_eq!(rows[0].q_count, 1);
        assert_eq!(rows[2].q_count, 2);
        assert_eq!(hist.outliers(), 0);
    }

    #[test]
    fn test_8bit_levels() {
        let mut hist = LevelHistogram::for_mode(QuantMode::SignedBytes).unwrap();
        hist.add_i8(&[-128, 127]);
        let rows = hist.rows();
        assert_eq!(rows.len(), 256);
        assert_eq!(rows[0].level, -128);
        assert_eq!(rows[0].i_count, 1);
        assert_eq!(rows[255].q_count, 1);
    }

    #[test]
    fn test_off_grid_values() {
        let mut hist = LevelHistogram::for_mode(QuantMode::Dual4Bit).unwrap();
        hist.add_i8(&[0, 15]);
        assert_eq!(hist.outliers(), 1);
        assert!(LevelHistogram::for_mode(QuantMode::Float32).is_err());
    }
}
