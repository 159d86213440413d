//! 量化/打包模式定义.
//!
//! 每种模式确定 4 字节字内的复采样数、子流数和每分量位宽.

use std::fmt;

use crate::error::{PfsError, PfsResult};

/// PFS 量化模式
///
/// 命令行中以整数编码指定, 如 `-m 1` 表示 2 通道 2 位.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantMode {
    /// 旧式采样盒 2 位 (编码 -1), 字节按顺序读取
    Gsb2Bit,
    /// 2 通道 2 位 (编码 1)
    Dual2Bit,
    /// 2 通道 4 位 (编码 2)
    Dual4Bit,
    /// 2 通道 8 位, 偏移二进制 (编码 3)
    Dual8Bit,
    /// 4 通道 2 位, 双极化 (编码 5)
    Quad2Bit,
    /// 4 通道 4 位, 双极化 (编码 6)
    Quad4Bit,
    /// 4 通道 8 位, 双极化 (编码 7)
    Quad8Bit,
    /// 有符号字节, 补码 (编码 8)
    SignedBytes,
    /// 有符号 16 位小端 (编码 16)
    Signed16,
    /// 32 位浮点小端 (编码 32)
    Float32,
}

impl QuantMode {
    /// 所有支持的模式
    pub const ALL: [QuantMode; 10] = [
        Self::Gsb2Bit,
        Self::Dual2Bit,
        Self::Dual4Bit,
        Self::Dual8Bit,
        Self::Quad2Bit,
        Self::Quad4Bit,
        Self::Quad8Bit,
        Self::SignedBytes,
        Self::Signed16,
        Self::Float32,
    ];

    /// 从命令行整数编码解析模式
    pub fn from_code(code: i32) -> PfsResult<Self> {
        Ok(match code {
            -1 => Self::Gsb2Bit,
            1 => Self::Dual2Bit,
            2 => Self::Dual4Bit,
            3 => Self::Dual8Bit,
            5 => Self::Quad2Bit,
            6 => Self::Quad4Bit,
            7 => Self::Quad8Bit,
            8 => Self::SignedBytes,
            16 => Self::Signed16,
            32 => Self::Float32,
            _ => return Err(PfsError::Config(format!("无效模式: {code}"))),
        })
    }

    /// 整数编码
    pub const fn code(&self) -> i32 {
        match self {
            Self::Gsb2Bit => -1,
            Self::Dual2Bit => 1,
            Self::Dual4Bit => 2,
            Self::Dual8Bit => 3,
            Self::Quad2Bit => 5,
            Self::Quad4Bit => 6,
            Self::Quad8Bit => 7,
            Self::SignedBytes => 8,
            Self::Signed16 => 16,
            Self::Float32 => 32,
        }
    }

    /// 每个 4 字节字包含的 (单极化) 复采样数
    pub const fn samples_per_word(&self) -> f64 {
        match self {
            Self::Gsb2Bit | Self::Dual2Bit => 8.0,
            Self::Dual4Bit | Self::Quad2Bit => 4.0,
            Self::Dual8Bit | Self::Quad4Bit | Self::SignedBytes => 2.0,
            Self::Quad8Bit | Self::Signed16 => 1.0,
            Self::Float32 => 0.5,
        }
    }

    /// 打包在一起的子流数 (I/Q 各算一个)
    pub const fn streams(&self) -> u32 {
        match self {
            Self::Quad2Bit | Self::Quad4Bit | Self::Quad8Bit => 4,
            _ => 2,
        }
    }

    /// 每个分量的位宽
    pub const fn bits_per_component(&self) -> u32 {
        match self {
            Self::Gsb2Bit | Self::Dual2Bit | Self::Quad2Bit => 2,
            Self::Dual4Bit | Self::Quad4Bit => 4,
            Self::Dual8Bit | Self::Quad8Bit | Self::SignedBytes => 8,
            Self::Signed16 => 16,
            Self::Float32 => 32,
        }
    }

    /// 是否为双极化 (需要通道选择)
    pub const fn is_dual_pol(&self) -> bool {
        self.streams() == 4
    }

    /// 是否为查表量化模式 (可解包为 i8)
    pub const fn is_quantized(&self) -> bool {
        !matches!(self, Self::Signed16 | Self::Float32)
    }

    /// 8 位数据是否为补码 (否则为偏移二进制, 需减 128)
    pub const fn twos_complement(&self) -> bool {
        matches!(self, Self::SignedBytes)
    }

    /// A/D 量化电平数, 非量化模式返回 None
    pub const fn levels(&self) -> Option<u32> {
        match self.bits_per_component() {
            2 => Some(4),
            4 => Some(16),
            8 => Some(256),
            _ => None,
        }
    }

    /// 解包后单个分量的最大幅度 (用于降采样输出缩放)
    pub const fn max_level(&self) -> f64 {
        match self.bits_per_component() {
            2 => 3.0,
            4 => 15.0,
            16 => 32767.0,
            _ => 255.0,
        }
    }

    /// 一个复采样在解包前占用的字节数
    pub fn bytes_per_sample(&self) -> f64 {
        4.0 / self.samples_per_word()
    }

    /// 可解出整数个复采样的最小字节单元
    ///
    /// 除 32 位浮点 (一个复采样占两个字) 外均为一个字.
    pub const fn unit_bytes(&self) -> usize {
        match self {
            Self::Float32 => 8,
            _ => 4,
        }
    }

    /// 每个字节单元包含的复采样数
    pub const fn samples_per_unit(&self) -> usize {
        match self {
            Self::Gsb2Bit | Self::Dual2Bit => 8,
            Self::Dual4Bit | Self::Quad2Bit => 4,
            Self::Dual8Bit | Self::Quad4Bit | Self::SignedBytes => 2,
            Self::Quad8Bit | Self::Signed16 | Self::Float32 => 1,
        }
    }
}

impl fmt::Display for QuantMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Gsb2Bit => "gsb2b",
            Self::Dual2Bit => "2c2b",
            Self::Dual4Bit => "2c4b",
            Self::Dual8Bit => "2c8b",
            Self::Quad2Bit => "4c2b",
            Self::Quad4Bit => "4c4b",
            Self::Quad8Bit => "4c8b",
            Self::SignedBytes => "signed bytes",
            Self::Signed16 => "signed 16bit",
            Self::Float32 => "32bit floats",
        };
        write!(f, "{name}")
    }
}
