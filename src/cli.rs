//! 命令行工具共用的参数解析与输入输出.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, StdinLock, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, bail};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use pfs_core::io::discard_bytes;
use pfs_core::{Channel, PfsError, QuantMode};

/// 解析命令行; 参数错误时打印用法并以状态 1 退出
pub fn parse_args<P: Parser>() -> P {
    P::try_parse().unwrap_or_else(|e| {
        if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            e.exit();
        }
        let _ = e.print();
        process::exit(1);
    })
}

/// 打印错误并以状态 1 退出; 配置错误附带用法
pub fn exit_with_error<P: CommandFactory>(err: anyhow::Error) -> ! {
    eprintln!("错误: {err:#}");
    let is_config = err
        .downcast_ref::<PfsError>()
        .is_some_and(PfsError::is_config);
    if is_config {
        eprintln!("{}", P::command().render_usage());
    }
    process::exit(1);
}

/// 解析模式代码
pub fn parse_mode(s: &str) -> Result<QuantMode, String> {
    let code: i32 = s.trim().parse().map_err(|_| format!("无效模式: {s}"))?;
    QuantMode::from_code(code).map_err(|e| e.to_string())
}

/// 解析极化通道 (1 或 2)
pub fn parse_channel(s: &str) -> Result<Channel, String> {
    let selector: u8 = s.trim().parse().map_err(|_| format!("无效通道: {s}"))?;
    Channel::from_selector(selector).map_err(|e| e.to_string())
}

/// 解析 `min,max` 形式的范围
pub fn parse_range(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("范围参数之间需要逗号: {s}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|_| format!("无效数值: {v}"))
    };
    Ok((parse(a)?, parse(b)?))
}

/// 输入源: 文件或标准输入
pub enum InputSource {
    Stdin(StdinLock<'static>),
    File { file: File, path: PathBuf, len: u64 },
}

impl InputSource {
    /// 打开输入; `None` 或 `-` 表示标准输入
    pub fn open(path: Option<&str>) -> Result<Self> {
        match path {
            None | Some("-") => Ok(Self::Stdin(io::stdin().lock())),
            Some(p) => {
                let file = File::open(p).with_context(|| format!("无法打开输入文件 {p}"))?;
                let len = file
                    .metadata()
                    .with_context(|| format!("无法读取文件信息 {p}"))?
                    .len();
                Ok(Self::File {
                    file,
                    path: PathBuf::from(p),
                    len,
                })
            }
        }
    }

    /// 文件长度 (标准输入未知)
    pub fn file_len(&self) -> Option<u64> {
        match self {
            Self::Stdin(_) => None,
            Self::File { len, .. } => Some(*len),
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Stdin(_) => "<stdin>".to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }

    /// 从开头跳过 `bytes` 字节; 文件用 seek, 标准输入读取丢弃
    pub fn skip(&mut self, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }
        match self {
            Self::Stdin(stdin) => discard_bytes(stdin, bytes)
                .with_context(|| format!("跳过 {bytes} 字节时读取错误"))?,
            Self::File { file, path, len } => {
                if bytes > *len {
                    bail!(
                        "跳过 {bytes} 字节超出文件长度 {len} ({}), 请检查文件大小",
                        path.display()
                    );
                }
                file.seek(SeekFrom::Start(bytes))?;
            }
        }
        Ok(())
    }
}

impl Read for InputSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Stdin(stdin) => stdin.read(buf),
            Self::File { file, .. } => file.read(buf),
        }
    }
}

/// 打开输出; `None` 或 `-` 表示标准输出
pub fn open_output(path: Option<&str>) -> Result<Box<dyn Write>> {
    match path {
        None | Some("-") => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
        Some(p) => {
            let file = File::create(p).with_context(|| format!("无法创建输出文件 {p}"))?;
            Ok(Box::new(BufWriter::new(file)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("-1").unwrap(), QuantMode::Gsb2Bit);
        assert_eq!(parse_mode("32").unwrap(), QuantMode::Float32);
        assert!(parse_mode("4").is_err());
        assert!(parse_mode("abc").is_err());
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("-1000,2.5e3").unwrap(), (-1000.0, 2500.0));
        assert_eq!(parse_range(" 1 , 2 ").unwrap(), (1.0, 2.0));
        assert!(parse_range("1000").is_err());
        assert!(parse_range("1,x").is_err());
    }

    #[test]
    fn test_parse_channel() {
        assert_eq!(parse_channel("2").unwrap(), Channel::Lcp);
        assert!(parse_channel("3").is_err());
    }

    #[test]
    fn test_input_skip() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&(0..100u8).collect::<Vec<_>>()).unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut input = InputSource::open(Some(&path)).unwrap();
        assert_eq!(input.file_len(), Some(100));
        input.skip(10).unwrap();
        let mut b = [0u8; 1];
        input.read_exact(&mut b).unwrap();
        assert_eq!(b[0], 10);
        assert!(input.skip(101).is_err());
    }
}
