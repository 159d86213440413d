//! # pfs-codec
//!
//! PFS 采样解包库, 将位打包的原始字节解码为 I/Q 采样流.
//!
//! ## 支持的模式
//!
//! - **量化模式**: 2c2b, 2c4b, 2c8b, 4c2b, 4c4b, 4c8b, 有符号字节, 旧式 2 位
//! - **直接解释**: 有符号 16 位, 32 位浮点
//!
//! ## 使用示例
//!
//! ```rust
//! use pfs_codec::Unpacker;
//! use pfs_core::{Channel, QuantMode};
//!
//! let unpacker = Unpacker::new(QuantMode::Dual2Bit, Channel::Rcp);
//! let mut samples = Vec::new();
//! let n = unpacker.unpack_i8(&[0u8; 4], &mut samples).unwrap();
//! assert_eq!(n, 8);
//! assert!(samples.iter().all(|&v| v == 3));
//! ```

pub mod histogram;
pub mod stats;
pub mod tables;
pub mod unpack;

// 重导出常用类型
pub use histogram::{HistogramRow, LevelHistogram};
pub use stats::{ChannelReport, IqAccumulator, IqStats};
pub use tables::PFS_BYTE_ORDER;
pub use unpack::Unpacker;
