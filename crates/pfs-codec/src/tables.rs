//! 解包查找表与字节顺序常量.

/// PFS 2 位/4 位双通道模式在一个字内读取字节的顺序
///
/// 这是采样器硬件接线造成的, 必须逐位保留以兼容已录制的数据.
pub const PFS_BYTE_ORDER: [usize; 4] = [1, 0, 3, 2];

/// 旧式采样盒按顺序读取字节
pub const SEQUENTIAL_BYTE_ORDER: [usize; 4] = [0, 1, 2, 3];

/// 4c4b 模式 RCP 所在字节
pub const QUAD4_RCP_BYTES: [usize; 2] = [0, 2];
/// 4c4b 模式 LCP 所在字节
pub const QUAD4_LCP_BYTES: [usize; 2] = [1, 3];

/// 4c8b 模式 RCP 所在字节
pub const QUAD8_RCP_BYTES: [usize; 2] = [0, 1];
/// 4c8b 模式 LCP 所在字节
pub const QUAD8_LCP_BYTES: [usize; 2] = [2, 3];

/// 2 位编码 0..3 对应的电平
pub const LEVELS_2BIT: [i8; 4] = [3, 1, -1, -3];

/// 4 位编码 k 对应的电平 `15 - 2k`
pub const LEVELS_4BIT: [i8; 16] = [
    15, 13, 11, 9, 7, 5, 3, 1, -1, -3, -5, -7, -9, -11, -13, -15,
];

/// 偏移二进制 8 位转有符号 (`byte - 128`)
#[inline]
pub fn offset_binary(byte: u8) -> i8 {
    byte.wrapping_sub(128) as i8
}

/// 一个 4 位半字节中的 2 位 I/Q 对 (低 2 位为 I, 高 2 位为 Q)
#[inline]
pub fn level_pair_2bit(nibble: u8) -> (i8, i8) {
    (
        LEVELS_2BIT[(nibble & 0x03) as usize],
        LEVELS_2BIT[((nibble >> 2) & 0x03) as usize],
    )
}

/// 一个字节中的 4 位 I/Q 对 (低半字节为 I, 高半字节为 Q)
#[inline]
pub fn level_pair_4bit(byte: u8) -> (i8, i8) {
    (
        LEVELS_4BIT[(byte & 0x0F) as usize],
        LEVELS_4BIT[(byte >> 4) as usize],
    )
}
