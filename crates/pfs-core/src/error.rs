//! 统一错误类型定义.
//!
//! 所有 PFS crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// PFS 工具集统一错误类型
#[derive(Debug, Error)]
pub enum PfsError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 配置错误 (参数组合非法, 在任何 I/O 之前检测)
    #[error("配置错误: {0}")]
    Config(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 读取不足 (数据丢失或流提前结束)
    #[error("读取错误或 EOF: 需要 {expected} 字节, 实际读取 {got} 字节")]
    ShortRead { expected: usize, got: usize },

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 内存分配失败
    #[error("内存分配失败: {0}")]
    OutOfMemory(String),

    /// 无效数据
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl PfsError {
    /// 是否为配置类错误 (命令行需要打印用法)
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::InvalidArgument(_))
    }
}

/// PFS 工具集统一 Result 类型
pub type PfsResult<T> = Result<T, PfsError>;

/// 分配指定容量的零初始化缓冲区, 失败时返回 `OutOfMemory`
pub fn alloc_zeroed<T: Default + Clone>(len: usize, what: &str) -> PfsResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| PfsError::OutOfMemory(format!("{what}: {len} 个元素")))?;
    buf.resize(len, T::default());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_classification() {
        assert!(PfsError::Config("x".into()).is_config());
        assert!(PfsError::InvalidArgument("x".into()).is_config());
        assert!(!PfsError::Eof.is_config());
        assert!(!PfsError::ShortRead { expected: 4, got: 1 }.is_config());
    }

    #[test]
    fn test_alloc_zeroed() {
        let buf: Vec<f32> = alloc_zeroed(16, "测试").unwrap();
        assert_eq!(buf.len(), 16);
        assert!(buf.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_short_read_message() {
        let err = PfsError::ShortRead {
            expected: 1024,
            got: 12,
        };
        assert!(err.to_string().contains("1024"));
    }
}
