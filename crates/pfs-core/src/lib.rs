//! # pfs-core
//!
//! PFS (便携式快速采样器) 数据处理核心库, 提供模式定义、错误处理和缓冲区尺寸计算.
//!
//! 其余 crate 共用这里的基础类型.

pub mod channel;
pub mod error;
pub mod io;
pub mod layout;
pub mod mode;
pub mod text;

// 重导出常用类型
pub use channel::Channel;
pub use error::{PfsError, PfsResult, alloc_zeroed};
pub use layout::{BufferLayout, SkipPlan, WORD_BYTES};
pub use mode::QuantMode;
