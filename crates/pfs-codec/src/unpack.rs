//! 位打包采样解包器.
//!
//! 将 PFS 原始字节按模式解包为 I/Q 交错的采样流.
//! 量化模式通过查找表解包为 i8, 16 位整数与 32 位浮点模式直接按小端解释.

use byteorder::{ByteOrder, LittleEndian};
use log::debug;
use num_complex::Complex32;
use pfs_core::{Channel, PfsError, PfsResult, QuantMode, WORD_BYTES};

use crate::tables::{
    PFS_BYTE_ORDER, QUAD4_LCP_BYTES, QUAD4_RCP_BYTES, QUAD8_LCP_BYTES, QUAD8_RCP_BYTES,
    SEQUENTIAL_BYTE_ORDER, level_pair_2bit, level_pair_4bit, offset_binary,
};

/// 模式描述, 描述各模式解包方式的差异
#[derive(Clone, Copy)]
struct ModeDesc {
    /// 量化模式
    mode: QuantMode,
    /// 查表解包函数: 原始字节 -> I/Q 交错 i8, 非量化模式为 None
    unpack_fn: Option<fn(&[u8], &mut Vec<i8>)>,
}

fn unpack_2bit_dual(src: &[u8], dst: &mut Vec<i8>, order: &[usize; 4]) {
    for word in src.chunks_exact(WORD_BYTES) {
        for &b in order {
            let value = word[b];
            // 先高半字节, 后低半字节
            for nibble in [value >> 4, value & 0x0F] {
                let (i, q) = level_pair_2bit(nibble);
                dst.push(i);
                dst.push(q);
            }
        }
    }
}

/// 2c2b: 每字 8 个复采样
fn unpack_2c2b(src: &[u8], dst: &mut Vec<i8>) {
    unpack_2bit_dual(src, dst, &PFS_BYTE_ORDER);
}

/// 旧式采样盒 2 位, 字节顺序读取
fn unpack_gsb(src: &[u8], dst: &mut Vec<i8>) {
    unpack_2bit_dual(src, dst, &SEQUENTIAL_BYTE_ORDER);
}

/// 2c4b: 每字节一个复采样, 低半字节为 I
fn unpack_2c4b(src: &[u8], dst: &mut Vec<i8>) {
    for word in src.chunks_exact(WORD_BYTES) {
        for &b in &PFS_BYTE_ORDER {
            let (i, q) = level_pair_4bit(word[b]);
            dst.push(i);
            dst.push(q);
        }
    }
}

/// 2c8b: 偏移二进制, 字节顺序读取
fn unpack_2c8b(src: &[u8], dst: &mut Vec<i8>) {
    dst.extend(src.iter().map(|&b| offset_binary(b)));
}

fn unpack_4c2b(src: &[u8], dst: &mut Vec<i8>, shift: u32) {
    for word in src.chunks_exact(WORD_BYTES) {
        for &b in &PFS_BYTE_ORDER {
            let (i, q) = level_pair_2bit((word[b] >> shift) & 0x0F);
            dst.push(i);
            dst.push(q);
        }
    }
}

/// 4c2b RCP: 每字节的低半字节
fn unpack_4c2b_rcp(src: &[u8], dst: &mut Vec<i8>) {
    unpack_4c2b(src, dst, 0);
}

/// 4c2b LCP: 每字节的高半字节
fn unpack_4c2b_lcp(src: &[u8], dst: &mut Vec<i8>) {
    unpack_4c2b(src, dst, 4);
}

fn unpack_4c4b(src: &[u8], dst: &mut Vec<i8>, bytes: &[usize; 2]) {
    for word in src.chunks_exact(WORD_BYTES) {
        for &b in bytes {
            let (i, q) = level_pair_4bit(word[b]);
            dst.push(i);
            dst.push(q);
        }
    }
}

fn unpack_4c4b_rcp(src: &[u8], dst: &mut Vec<i8>) {
    unpack_4c4b(src, dst, &QUAD4_RCP_BYTES);
}

fn unpack_4c4b_lcp(src: &[u8], dst: &mut Vec<i8>) {
    unpack_4c4b(src, dst, &QUAD4_LCP_BYTES);
}

fn unpack_4c8b(src: &[u8], dst: &mut Vec<i8>, bytes: &[usize; 2]) {
    for word in src.chunks_exact(WORD_BYTES) {
        dst.push(offset_binary(word[bytes[0]]));
        dst.push(offset_binary(word[bytes[1]]));
    }
}

fn unpack_4c8b_rcp(src: &[u8], dst: &mut Vec<i8>) {
    unpack_4c8b(src, dst, &QUAD8_RCP_BYTES);
}

fn unpack_4c8b_lcp(src: &[u8], dst: &mut Vec<i8>) {
    unpack_4c8b(src, dst, &QUAD8_LCP_BYTES);
}

/// 补码有符号字节, 直接拷贝
fn unpack_signed_bytes(src: &[u8], dst: &mut Vec<i8>) {
    dst.extend(src.iter().map(|&b| b as i8));
}

/// 获取指定模式与通道的解包描述
fn get_mode_desc(mode: QuantMode, channel: Channel) -> ModeDesc {
    let unpack_fn: Option<fn(&[u8], &mut Vec<i8>)> = match mode {
        QuantMode::Gsb2Bit => Some(unpack_gsb),
        QuantMode::Dual2Bit => Some(unpack_2c2b),
        QuantMode::Dual4Bit => Some(unpack_2c4b),
        QuantMode::Dual8Bit => Some(unpack_2c8b),
        QuantMode::Quad2Bit => match channel {
            Channel::Rcp => Some(unpack_4c2b_rcp),
            Channel::Lcp => Some(unpack_4c2b_lcp),
        },
        QuantMode::Quad4Bit => match channel {
            Channel::Rcp => Some(unpack_4c4b_rcp),
            Channel::Lcp => Some(unpack_4c4b_lcp),
        },
        QuantMode::Quad8Bit => match channel {
            Channel::Rcp => Some(unpack_4c8b_rcp),
            Channel::Lcp => Some(unpack_4c8b_lcp),
        },
        QuantMode::SignedBytes => Some(unpack_signed_bytes),
        QuantMode::Signed16 | QuantMode::Float32 => None,
    };
    ModeDesc { mode, unpack_fn }
}

/// 采样解包器
///
/// 绑定一个模式与极化通道, 可对任意多个缓冲区重复使用.
pub struct Unpacker {
    /// 模式描述
    desc: ModeDesc,
    /// 极化通道 (仅双极化模式有效)
    channel: Channel,
    /// 复数输出时的中间 i8 缓冲
    scratch: Vec<i8>,
}

impl Unpacker {
    /// 创建解包器
    pub fn new(mode: QuantMode, channel: Channel) -> Self {
        if channel == Channel::Lcp && !mode.is_dual_pol() {
            debug!("模式 {mode} 只有一个极化, 忽略通道选择 {channel}");
        }
        Self {
            desc: get_mode_desc(mode, channel),
            channel,
            scratch: Vec::new(),
        }
    }

    /// 量化模式
    pub fn mode(&self) -> QuantMode {
        self.desc.mode
    }

    /// 极化通道
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// 指定字节数 (整单元) 可解出的复采样数
    pub fn samples_in(&self, bytes: usize) -> usize {
        pfs_core::layout::samples_in(self.desc.mode, bytes)
    }

    fn check_input(&self, input: &[u8]) -> PfsResult<usize> {
        let unit = self.desc.mode.unit_bytes();
        if input.len() % unit != 0 {
            return Err(PfsError::InvalidArgument(format!(
                "输入长度 {} 不是 {unit} 字节的整数倍 (模式 {})",
                input.len(),
                self.desc.mode
            )));
        }
        Ok(self.samples_in(input.len()))
    }

    /// 解包为 I/Q 交错的 i8 采样, 返回复采样数
    ///
    /// 仅适用于查表量化模式; 16 位与浮点模式返回 `Unsupported`.
    pub fn unpack_i8(&self, input: &[u8], out: &mut Vec<i8>) -> PfsResult<usize> {
        let nsamples = self.check_input(input)?;
        let unpack_fn = self.desc.unpack_fn.ok_or_else(|| {
            PfsError::Unsupported(format!("模式 {} 不能解包为 8 位整数", self.desc.mode))
        })?;

        out.clear();
        out.try_reserve(2 * nsamples)
            .map_err(|_| PfsError::OutOfMemory(format!("解包缓冲: {nsamples} 个采样")))?;
        unpack_fn(input, out);
        debug_assert_eq!(out.len(), 2 * nsamples);
        Ok(nsamples)
    }

    /// 解包为复数采样, 返回复采样数
    pub fn unpack_complex(&mut self, input: &[u8], out: &mut Vec<Complex32>) -> PfsResult<usize> {
        let nsamples = self.check_input(input)?;
        out.clear();
        out.try_reserve(nsamples)
            .map_err(|_| PfsError::OutOfMemory(format!("复数缓冲: {nsamples} 个采样")))?;

        match self.desc.mode {
            QuantMode::Signed16 => {
                out.extend(input.chunks_exact(4).map(|c| {
                    Complex32::new(
                        LittleEndian::read_i16(&c[0..2]) as f32,
                        LittleEndian::read_i16(&c[2..4]) as f32,
                    )
                }));
            }
            QuantMode::Float32 => {
                out.extend(input.chunks_exact(8).map(|c| {
                    Complex32::new(
                        LittleEndian::read_f32(&c[0..4]),
                        LittleEndian::read_f32(&c[4..8]),
                    )
                }));
            }
            _ => {
                let mut scratch = std::mem::take(&mut self.scratch);
                let result = self.unpack_i8(input, &mut scratch);
                if result.is_ok() {
                    out.extend(
                        scratch
                            .chunks_exact(2)
                            .map(|p| Complex32::new(p[0] as f32, p[1] as f32)),
                    );
                }
                self.scratch = scratch;
                result?;
            }
        }
        Ok(nsamples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpack(mode: QuantMode, channel: Channel, input: &[u8]) -> Vec<i8> {
        let mut out = Vec::new();
        Unpacker::new(mode, channel).unpack_i8(input, &mut out).unwrap();
        out
    }

    #[test]
    fn test_2c2b_byte_order() {
        // 第一个被读取的是字节 1: 0xE4 = 1110_0100
        // 高半字节 1110: I=10(-1), Q=11(-3); 低半字节 0100: I=00(+3), Q=01(+1)
        let out = unpack(QuantMode::Dual2Bit, Channel::Rcp, &[0x00, 0xE4, 0x00, 0x00]);
        assert_eq!(out.len(), 16);
        assert_eq!(&out[..4], &[-1, -3, 3, 1]);
        assert!(out[4..].iter().all(|&v| v == 3));
    }

    #[test]
    fn test_2c2b_all_codes() {
        // 字节 2 最后被读取, 编码 0..3 依次放在低 2 位
        for (code, expected) in [3i8, 1, -1, -3].iter().enumerate() {
            let out = unpack(QuantMode::Dual2Bit, Channel::Rcp, &[0, 0, code as u8, 0]);
            assert_eq!(out[14], *expected);
        }
    }

    #[test]
    fn test_gsb_sequential_order() {
        let out = unpack(QuantMode::Gsb2Bit, Channel::Rcp, &[0xE4, 0x00, 0x00, 0x00]);
        assert_eq!(&out[..4], &[-1, -3, 3, 1]);
    }

    #[test]
    fn test_2c4b() {
        let out = unpack(QuantMode::Dual4Bit, Channel::Rcp, &[0x10, 0x32, 0x54, 0x76]);
        assert_eq!(out, vec![11, 9, 15, 13, 3, 1, 7, 5]);
    }

    #[test]
    fn test_2c8b_offset_binary() {
        let out = unpack(QuantMode::Dual8Bit, Channel::Rcp, &[0, 128, 255, 1]);
        assert_eq!(out, vec![-128, 0, 127, -127]);
    }

    #[test]
    fn test_4c2b_channels() {
        let word = [0x1B, 0xE4, 0x00, 0x00];
        let rcp = unpack(QuantMode::Quad2Bit, Channel::Rcp, &word);
        let lcp = unpack(QuantMode::Quad2Bit, Channel::Lcp, &word);
        assert_eq!(rcp.len(), 8);
        assert_eq!(&rcp[..4], &[3, 1, -3, -1]);
        assert_eq!(&lcp[..4], &[-1, -3, 1, 3]);
        assert!(rcp[4..].iter().chain(&lcp[4..]).all(|&v| v == 3));
    }

    #[test]
    fn test_4c4b_channels() {
        let word = [0x10, 0x32, 0x54, 0x76];
        assert_eq!(unpack(QuantMode::Quad4Bit, Channel::Rcp, &word), vec![15, 13, 7, 5]);
        assert_eq!(unpack(QuantMode::Quad4Bit, Channel::Lcp, &word), vec![11, 9, 3, 1]);
    }

    #[test]
    fn test_4c8b_channels() {
        let word = [0, 128, 255, 1];
        assert_eq!(unpack(QuantMode::Quad8Bit, Channel::Rcp, &word), vec![-128, 0]);
        assert_eq!(unpack(QuantMode::Quad8Bit, Channel::Lcp, &word), vec![127, -127]);
    }

    #[test]
    fn test_signed_bytes() {
        let out = unpack(QuantMode::SignedBytes, Channel::Rcp, &[0xFF, 0x01, 0x80, 0x7F]);
        assert_eq!(out, vec![-1, 1, -128, 127]);
    }

    #[test]
    fn test_zero_bits_are_not_zero_signal() {
        let zeros = [0u8; 16];
        let out = unpack(QuantMode::Dual2Bit, Channel::Rcp, &zeros);
        assert!(out.iter().all(|&v| v == 3));
        let out = unpack(QuantMode::Dual4Bit, Channel::Rcp, &zeros);
        assert!(out.iter().all(|&v| v == 15));
    }

    #[test]
    fn test_signed16_complex() {
        let mut unpacker = Unpacker::new(QuantMode::Signed16, Channel::Rcp);
        let mut out = Vec::new();
        let n = unpacker
            .unpack_complex(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0x7F], &mut out)
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(out[0], Complex32::new(1.0, -1.0));
        assert_eq!(out[1], Complex32::new(-32768.0, 32767.0));
    }

    #[test]
    fn test_float32_complex() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_le_bytes());
        bytes.extend_from_slice(&(-2.0f32).to_le_bytes());
        let mut unpacker = Unpacker::new(QuantMode::Float32, Channel::Rcp);
        let mut out = Vec::new();
        assert_eq!(unpacker.unpack_complex(&bytes, &mut out).unwrap(), 1);
        assert_eq!(out[0], Complex32::new(1.5, -2.0));
    }

    #[test]
    fn test_quantized_complex_matches_i8() {
        let input: Vec<u8> = (0..64u8).map(|v| v.wrapping_mul(37)).collect();
        for mode in QuantMode::ALL.into_iter().filter(|m| m.is_quantized()) {
            let mut unpacker = Unpacker::new(mode, Channel::Lcp);
            let mut ints = Vec::new();
            let mut cplx = Vec::new();
            let n = unpacker.unpack_i8(&input, &mut ints).unwrap();
            assert_eq!(unpacker.unpack_complex(&input, &mut cplx).unwrap(), n);
            assert_eq!(n, unpacker.samples_in(input.len()), "{mode}");
            for (k, c) in cplx.iter().enumerate() {
                assert_eq!(c.re, ints[2 * k] as f32);
                assert_eq!(c.im, ints[2 * k + 1] as f32);
            }
        }
    }

    #[test]
    fn test_partial_word_rejected() {
        let unpacker = Unpacker::new(QuantMode::Dual2Bit, Channel::Rcp);
        let mut out = Vec::new();
        let err = unpacker.unpack_i8(&[0, 0, 0], &mut out).unwrap_err();
        assert!(matches!(err, PfsError::InvalidArgument(_)));

        let mut unpacker = Unpacker::new(QuantMode::Float32, Channel::Rcp);
        let mut cplx = Vec::new();
        assert!(unpacker.unpack_complex(&[0; 4], &mut cplx).is_err());
    }

    #[test]
    fn test_i8_unsupported_for_wide_modes() {
        let unpacker = Unpacker::new(QuantMode::Signed16, Channel::Rcp);
        let mut out = Vec::new();
        let err = unpacker.unpack_i8(&[0; 4], &mut out).unwrap_err();
        assert!(matches!(err, PfsError::Unsupported(_)));
    }
}
