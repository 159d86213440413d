//! pfs-unpack - PFS 采样解包
//!
//! 将打包的原始采样解为 f32 I/Q 对 (或文本), 可选检波输出幅度,
//! 以及按频率偏移做连续相位旋转.

use std::io::Write;

use anyhow::{Context, Result, bail};
use byteorder::{LittleEndian, WriteBytesExt};
use clap::Parser;
use log::{debug, info, warn};
use num_complex::Complex32;

use pfs::cli::{InputSource, exit_with_error, open_output, parse_args, parse_channel, parse_mode};
use pfs::logging::{self, LoggingConfig};
use pfs_codec::Unpacker;
use pfs_core::io::read_full;
use pfs_core::layout::split_units;
use pfs_core::text::format_fixed;
use pfs_core::{Channel, PfsError, QuantMode, alloc_zeroed};
use pfs_resample::PhaseRotator;

/// 默认读缓冲区大小
const DEFAULT_BUFFER_BYTES: usize = 1 << 20;

/// PFS 采样解包
#[derive(Parser, Debug)]
#[command(name = "pfs-unpack", version, about = "PFS 采样解包")]
struct Cli {
    /// 量化模式 (-1, 1, 2, 3, 5, 6, 7, 8, 16, 32)
    #[arg(short = 'm', long, value_parser = parse_mode, allow_hyphen_values = true)]
    mode: QuantMode,

    /// 极化通道 (1 或 2, 仅模式 5/6/7)
    #[arg(short = 'c', long, value_parser = parse_channel, default_value = "1")]
    channel: Channel,

    /// 文本输出
    #[arg(short = 'a', long)]
    ascii: bool,

    /// 检波: 输出幅度 sqrt(I^2+Q^2)
    #[arg(short = 'd', long)]
    detect: bool,

    /// 采样频率 (MHz), 相位旋转时需要
    #[arg(short = 'f', long)]
    fsamp: Option<f64>,

    /// 相位旋转的频率偏移 (Hz)
    #[arg(short = 'x', long = "freq-offset", allow_hyphen_values = true, requires = "fsamp")]
    freq_offset: Option<f64>,

    /// 输出文件 (缺省为标准输出)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// 日志文件目录
    #[arg(long = "log-dir")]
    log_dir: Option<String>,

    /// 日志详细程度 (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// 只输出警告与错误
    #[arg(short = 'q', long)]
    quiet: bool,

    /// 输入文件 (缺省或 "-" 为标准输入)
    input: Option<String>,
}

/// 按输出格式写出一个缓冲区的采样
struct SampleSink<W: Write> {
    inner: W,
    ascii: bool,
    detect: bool,
}

impl<W: Write> SampleSink<W> {
    fn write(&mut self, samples: &[Complex32]) -> Result<()> {
        match (self.detect, self.ascii) {
            (true, false) => {
                for s in samples {
                    self.inner.write_f32::<LittleEndian>(s.norm())?;
                }
            }
            (true, true) => {
                for s in samples {
                    writeln!(self.inner, "{}", format_fixed(s.norm() as f64, 3))?;
                }
            }
            (false, false) => {
                for s in samples {
                    self.inner.write_f32::<LittleEndian>(s.re)?;
                    self.inner.write_f32::<LittleEndian>(s.im)?;
                }
            }
            (false, true) => {
                for s in samples {
                    writeln!(
                        self.inner,
                        "{} {}",
                        format_fixed(s.re as f64, 0),
                        format_fixed(s.im as f64, 0)
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn buffer_bytes(mode: QuantMode, file_len: Option<u64>) -> Result<usize> {
    let (target, _) = split_units(mode, DEFAULT_BUFFER_BYTES);
    let bytes = match file_len {
        Some(len) if (len as usize) < target => {
            let (whole, rem) = split_units(mode, len as usize);
            if rem != 0 {
                warn!("文件长度不是整数个缓冲单元, 末尾 {rem} 字节将被忽略");
            }
            whole
        }
        _ => target,
    };
    if bytes == 0 {
        bail!(PfsError::InvalidData(format!(
            "输入不足一个完整单元 ({} 字节)",
            mode.unit_bytes()
        )));
    }
    Ok(bytes)
}

fn run(cli: &Cli) -> Result<()> {
    let mut rotator = match (cli.freq_offset, cli.fsamp) {
        (Some(freq), Some(fsamp)) => Some(PhaseRotator::new(fsamp, freq)?),
        (Some(_), None) => bail!(PfsError::Config("相位旋转需要指定采样频率 -f".into())),
        _ => None,
    };

    let mut input = InputSource::open(cli.input.as_deref())?;
    let bufsize = buffer_bytes(cli.mode, input.file_len())?;
    match input.file_len() {
        Some(len) => info!("解包 {len} 字节的文件, 缓冲区 {bufsize} 字节"),
        None => info!("解包 {}, 缓冲区 {bufsize} 字节", input.name()),
    }

    let mut sink = SampleSink {
        inner: open_output(cli.output.as_deref())?,
        ascii: cli.ascii,
        detect: cli.detect,
    };
    let mut unpacker = Unpacker::new(cli.mode, cli.channel);
    let mut buf: Vec<u8> = alloc_zeroed(bufsize, "读缓冲")?;
    let mut samples = Vec::new();
    let mut total = 0u64;

    loop {
        let n = read_full(&mut input, &mut buf).context("读取输入失败")?;
        if n == 0 {
            break;
        }
        let (whole, rem) = split_units(cli.mode, n);
        if rem != 0 {
            warn!("输入末尾 {rem} 字节不足一个字, 已丢弃");
        }
        let count = unpacker.unpack_complex(&buf[..whole], &mut samples)?;
        if let Some(rotator) = rotator.as_mut() {
            rotator.apply(&mut samples);
        }
        sink.write(&samples)?;
        total += count as u64;
        if n < bufsize {
            break;
        }
    }

    sink.inner.flush().context("写出失败")?;
    debug!("共解包 {total} 个复采样");
    if let Some(rotator) = &rotator {
        debug!("相位旋转结束于 t = {:e} s", rotator.time());
    }
    Ok(())
}

fn main() {
    let cli: Cli = parse_args();
    let log_config = LoggingConfig::for_tool("pfs-unpack", cli.verbose, cli.quiet)
        .with_directory(cli.log_dir.clone());
    if let Err(e) = logging::init(&log_config) {
        eprintln!("警告: {e:#}");
    }
    debug!("pfs-unpack 版本 {}", pfs::version());

    if let Err(e) = run(&cli) {
        exit_with_error::<Cli>(e);
    }
}
