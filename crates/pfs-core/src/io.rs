//! 阻塞读取工具.

use std::io::{ErrorKind, Read};

use log::debug;

use crate::error::{PfsError, PfsResult};

/// 尽量读满缓冲区, 返回实际读取的字节数
///
/// 返回值小于 `buf.len()` 表示已到达 EOF. 被信号中断的读取会重试.
pub fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> PfsResult<usize> {
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(got)
}

/// 读满缓冲区, 不足时返回 `ShortRead`
pub fn read_exact_or_short<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> PfsResult<()> {
    let got = read_full(reader, buf)?;
    if got != buf.len() {
        return Err(PfsError::ShortRead {
            expected: buf.len(),
            got,
        });
    }
    Ok(())
}

/// 读取并丢弃 `count` 字节, 用于无法 seek 的输入 (如标准输入)
pub fn discard_bytes<R: Read + ?Sized>(reader: &mut R, count: u64) -> PfsResult<()> {
    let mut scratch = [0u8; 64 * 1024];
    let mut left = count;
    while left > 0 {
        let want = left.min(scratch.len() as u64) as usize;
        let got = read_full(reader, &mut scratch[..want])?;
        if got < want {
            return Err(PfsError::ShortRead {
                expected: count as usize,
                got: (count - left) as usize + got,
            });
        }
        left -= want as u64;
    }
    debug!("已丢弃 {count} 字节");
    Ok(())
}
