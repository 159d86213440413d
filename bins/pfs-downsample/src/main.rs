//! pfs-downsample - PFS 相干降采样
//!
//! 每 `factor` 个连续复采样求和为一个输出采样, 缩放后以 f32 或有符号字节写出.

use std::io::Write;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use clap::Parser;
use log::{debug, info, warn};
use num_complex::Complex32;

use pfs::cli::{InputSource, exit_with_error, open_output, parse_args, parse_channel, parse_mode};
use pfs::logging::{self, LoggingConfig};
use pfs_codec::Unpacker;
use pfs_core::io::read_full;
use pfs_core::layout::{chunk_bytes, split_units};
use pfs_core::{Channel, QuantMode, SkipPlan, alloc_zeroed};
use pfs_resample::{DcOffset, Downsampler, OutputScale};

/// 目标读缓冲区大小
const TARGET_BUFFER_BYTES: usize = 1 << 20;

/// PFS 相干降采样
#[derive(Parser, Debug)]
#[command(name = "pfs-downsample", version, about = "PFS 相干降采样")]
struct Cli {
    /// 量化模式 (-1, 1, 2, 3, 5, 6, 7, 8, 16, 32)
    #[arg(short = 'm', long, value_parser = parse_mode, allow_hyphen_values = true)]
    mode: QuantMode,

    /// 降采样因子
    #[arg(short = 'd', long)]
    factor: usize,

    /// 极化通道 (1 或 2, 仅模式 5/6/7)
    #[arg(short = 'c', long, value_parser = parse_channel, default_value = "1")]
    channel: Channel,

    /// I 直流偏移
    #[arg(short = 'I', long = "dc-i", allow_hyphen_values = true, default_value_t = 0.0)]
    dc_i: f32,

    /// Q 直流偏移
    #[arg(short = 'Q', long = "dc-q", allow_hyphen_values = true, default_value_t = 0.0)]
    dc_q: f32,

    /// 输出时交换 I/Q
    #[arg(short = 'i', long = "swap-iq")]
    swap_iq: bool,

    /// 输出缩放的修正因子
    #[arg(short = 'f', long, default_value_t = 1.0)]
    fudge: f64,

    /// 开始前跳过的复采样数
    #[arg(short = 's', long = "skip", default_value_t = 0)]
    skip_samples: u64,

    /// 输出有符号字节 (缺省为 f32)
    #[arg(short = 'b', long)]
    bytes: bool,

    /// 只输出警告与错误
    #[arg(short = 'q', long)]
    quiet: bool,

    /// 日志详细程度 (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// 日志文件目录
    #[arg(long = "log-dir")]
    log_dir: Option<String>,

    /// 输出文件 (缺省为标准输出)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// 输入文件 (缺省或 "-" 为标准输入)
    input: Option<String>,
}

/// 降采样输出端: 缩放并按格式写出
struct ScaledWriter<W: Write> {
    inner: W,
    scale: OutputScale,
    bytes: bool,
    floats: Vec<f32>,
    ints: Vec<i8>,
    /// 被限幅的分量数
    clipped: u64,
}

impl<W: Write> ScaledWriter<W> {
    fn new(inner: W, scale: OutputScale, bytes: bool) -> Self {
        Self {
            inner,
            scale,
            bytes,
            floats: Vec::new(),
            ints: Vec::new(),
            clipped: 0,
        }
    }

    fn write(&mut self, summed: &[Complex32]) -> Result<()> {
        if self.bytes {
            self.clipped += self.scale.to_i8(summed, &mut self.ints);
            let raw: Vec<u8> = self.ints.iter().map(|&v| v as u8).collect();
            self.inner.write_all(&raw)?;
        } else {
            self.scale.to_f32(summed, &mut self.floats);
            for &v in &self.floats {
                self.inner.write_f32::<LittleEndian>(v)?;
            }
        }
        Ok(())
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mode = cli.mode;
    let mut downsampler = Downsampler::new(cli.factor)?;

    let mut input = InputSource::open(cli.input.as_deref())?;
    let skip = SkipPlan::from_samples(mode, cli.skip_samples);
    input.skip(skip.seek_bytes)?;
    downsampler = downsampler.with_skip(skip.residual_samples);
    let remaining = input.file_len().map(|len| len - skip.seek_bytes);

    let bufsize = chunk_bytes(mode, TARGET_BUFFER_BYTES, cli.factor, remaining)?;
    info!(
        "降采样 {}: 因子 {}, 缓冲区 {bufsize} 字节",
        input.name(),
        cli.factor
    );
    if !skip.is_empty() {
        info!(
            "跳过 {} 个采样 ({} 字节 + {} 个采样)",
            cli.skip_samples, skip.seek_bytes, skip.residual_samples
        );
    }

    let scale = OutputScale::new(
        mode,
        cli.factor,
        cli.fudge,
        DcOffset::new(cli.dc_i, cli.dc_q),
        cli.swap_iq,
    );
    debug!("输出缩放系数 {}", scale.scale());
    let check_clip = cli.bytes && scale.may_clip();
    let mut writer = ScaledWriter::new(open_output(cli.output.as_deref())?, scale, cli.bytes);

    let mut unpacker = Unpacker::new(mode, cli.channel);
    let mut buf: Vec<u8> = alloc_zeroed(bufsize, "读缓冲")?;
    let mut samples = Vec::new();
    let mut summed = Vec::new();
    let mut produced = 0u64;

    loop {
        let n = read_full(&mut input, &mut buf).context("读取输入失败")?;
        if n == 0 {
            break;
        }
        let (whole, rem) = split_units(mode, n);
        if rem != 0 {
            warn!("最后一个缓冲区不是整数个字, 末尾 {rem} 字节已丢弃");
        }
        unpacker.unpack_complex(&buf[..whole], &mut samples)?;
        summed.clear();
        produced += downsampler.process(&samples, &mut summed) as u64;
        writer.write(&summed)?;
        if n < bufsize {
            break;
        }
    }
    downsampler.finish();
    writer.inner.flush().context("写出失败")?;

    debug!("共输出 {produced} 个采样");
    if check_clip {
        if writer.clipped > 0 {
            warn!(
                "{} 个分量超出 8 位范围被限幅 (占 {:.4}%)",
                writer.clipped,
                100.0 * writer.clipped as f64 / (2 * produced.max(1)) as f64
            );
        } else {
            info!("没有分量被限幅");
        }
    }
    Ok(())
}

fn main() {
    let cli: Cli = parse_args();
    let log_config = LoggingConfig::for_tool("pfs-downsample", cli.verbose, cli.quiet)
        .with_directory(cli.log_dir.clone());
    if let Err(e) = logging::init(&log_config) {
        eprintln!("警告: {e:#}");
    }
    debug!("pfs-downsample 版本 {}", pfs::version());

    if let Err(e) = run(&cli) {
        exit_with_error::<Cli>(e);
    }
}
