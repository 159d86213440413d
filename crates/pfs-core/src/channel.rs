//! 极化通道选择.

use std::fmt;

use crate::error::{PfsError, PfsResult};

/// 双极化模式下的通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    /// 右旋圆极化 (选择器 1)
    #[default]
    Rcp,
    /// 左旋圆极化 (选择器 2)
    Lcp,
}

impl Channel {
    /// 从命令行选择器 (1 或 2) 解析
    pub fn from_selector(selector: u8) -> PfsResult<Self> {
        match selector {
            1 => Ok(Self::Rcp),
            2 => Ok(Self::Lcp),
            other => Err(PfsError::Config(format!("通道必须为 1 或 2, 实际为 {other}"))),
        }
    }

    /// 命令行选择器
    pub const fn selector(&self) -> u8 {
        match self {
            Self::Rcp => 1,
            Self::Lcp => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rcp => write!(f, "RCP"),
            Self::Lcp => write!(f, "LCP"),
        }
    }
}
