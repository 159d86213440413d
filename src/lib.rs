//! # PFS
//!
//! 便携式快速采样器 (PFS) 原始数据处理工具集.
//!
//! 提供:
//! - **解包**: 2/4/8 位量化、16 位整数与 32 位浮点等打包模式的 I/Q 解码
//! - **降采样**: 检波前的相干求和
//! - **频谱**: 加窗、FFT、非相干累加与参考频带归一化
//! - **统计**: 直流、均方根、I/Q 相关与电平直方图
//!
//! # 快速开始
//!
//! ```rust
//! use pfs::core::{Channel, QuantMode};
//! use pfs::codec::Unpacker;
//!
//! let mode = QuantMode::from_code(1).unwrap();
//! let mut unpacker = Unpacker::new(mode, Channel::Rcp);
//! let mut samples = Vec::new();
//! let n = unpacker.unpack_complex(&[0u8; 4], &mut samples).unwrap();
//! assert_eq!(n, 8);
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `pfs-core` | 模式、错误与缓冲区布局 |
//! | `pfs-codec` | 采样解包与统计 |
//! | `pfs-resample` | 相干降采样与 I/Q 处理 |
//! | `pfs-spectrum` | 非相干累加频谱仪 |

/// 核心类型与工具
pub use pfs_core as core;

/// 采样解包与统计
pub use pfs_codec as codec;

/// 相干降采样
pub use pfs_resample as resample;

/// 频谱仪
pub use pfs_spectrum as spectrum;

pub mod cli;
pub mod logging;

/// 获取版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
