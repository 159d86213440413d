//! pfs-stats - PFS 采样统计
//!
//! 计算各极化的 I/Q 直流、均方根与相关系数, 可选输出量化电平直方图.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use serde::Serialize;

use pfs::cli::{InputSource, exit_with_error, open_output, parse_args, parse_mode};
use pfs::logging::{self, LoggingConfig};
use pfs_codec::{ChannelReport, HistogramRow, IqAccumulator, LevelHistogram, Unpacker};
use pfs_core::io::read_full;
use pfs_core::layout::split_units;
use pfs_core::text::format_fixed_width;
use pfs_core::{Channel, PfsError, QuantMode, alloc_zeroed};

/// 读缓冲区大小, 也是缺省统计的字节数
const BLOCK_BYTES: usize = 1 << 20;

const COLUMN_HEADER: &str = "     DC I      RMS I       DC Q      RMS Q       rIQ";

/// PFS 采样统计
#[derive(Parser, Debug)]
#[command(name = "pfs-stats", version, about = "PFS 采样统计与电平直方图")]
struct Cli {
    /// 量化模式 (-1, 1, 2, 3, 5, 6, 7, 8, 16, 32)
    #[arg(short = 'm', long, value_parser = parse_mode, allow_hyphen_values = true)]
    mode: QuantMode,

    /// 统计整个文件 (缺省只统计开头 1 MB)
    #[arg(short = 'a', long, conflicts_with = "end")]
    all: bool,

    /// 统计文件末尾 1 MB
    #[arg(short = 'e', long)]
    end: bool,

    /// 输出量化电平直方图
    #[arg(long)]
    hist: bool,

    /// JSON 输出
    #[arg(long)]
    json: bool,

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

/// 单个极化通道的统计收集器
struct ChannelCollector {
    unpacker: Unpacker,
    acc: IqAccumulator,
    hist: Option<LevelHistogram>,
    levels: Vec<i8>,
    samples: Vec<num_complex::Complex32>,
}

impl ChannelCollector {
    fn new(mode: QuantMode, channel: Channel, with_hist: bool) -> Result<Self> {
        let hist = if with_hist && mode.is_quantized() {
            Some(LevelHistogram::for_mode(mode)?)
        } else {
            None
        };
        Ok(Self {
            unpacker: Unpacker::new(mode, channel),
            acc: IqAccumulator::new(),
            hist,
            levels: Vec::new(),
            samples: Vec::new(),
        })
    }

    fn add(&mut self, block: &[u8]) -> Result<()> {
        if self.unpacker.mode().is_quantized() {
            self.unpacker.unpack_i8(block, &mut self.levels)?;
            self.acc.add_i8(&self.levels);
            if let Some(hist) = self.hist.as_mut() {
                hist.add_i8(&self.levels);
            }
        } else {
            self.unpacker.unpack_complex(block, &mut self.samples)?;
            self.acc.add_complex(&self.samples);
        }
        Ok(())
    }
}

/// 一个通道的直方图
#[derive(Debug, Serialize)]
struct ChannelHistogram {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    rows: Vec<HistogramRow>,
    outliers: u64,
}

/// 完整统计结果
#[derive(Debug, Serialize)]
struct StatsReport {
    mode: i32,
    samples: u64,
    channels: Vec<ChannelReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    histograms: Vec<ChannelHistogram>,
}

impl StatsReport {
    fn from_collectors(mode: QuantMode, collectors: &[ChannelCollector]) -> Result<Self> {
        let dual = collectors.len() > 1;
        let mut channels = Vec::with_capacity(collectors.len());
        let mut histograms = Vec::new();
        for c in collectors {
            let label = dual.then(|| c.unpacker.channel().to_string());
            let counts = c.acc.finish()?;
            if counts.rms_i == 0.0 || counts.rms_q == 0.0 {
                warn!("通道均方根为 0, 相关系数记为 0");
            }
            channels.push(ChannelReport::new(label.clone(), counts, mode.levels()));
            if let Some(hist) = &c.hist {
                if hist.outliers() > 0 {
                    warn!("{} 个分量不在量化电平上", hist.outliers());
                }
                histograms.push(ChannelHistogram {
                    channel: label,
                    rows: hist.rows(),
                    outliers: hist.outliers(),
                });
            }
        }
        Ok(Self {
            mode: mode.code(),
            samples: collectors.first().map_or(0, |c| c.acc.samples()),
            channels,
            histograms,
        })
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let quantized = self.channels.iter().any(|c| c.volts.is_some());

        let _ = writeln!(out, "Statistics on {} samples:", self.samples);
        if quantized {
            let _ = writeln!(out, "In digitizer counts (x2):");
        }
        let _ = writeln!(out, "{COLUMN_HEADER}");
        for c in &self.channels {
            let s = &c.counts;
            render_row(&mut out, c, &[s.dc_i, s.rms_i, s.dc_q, s.rms_q, s.r_iq]);
        }

        if quantized {
            let _ = writeln!(out, "\nIn Volts:\n{COLUMN_HEADER}");
            for c in &self.channels {
                if let Some(v) = &c.volts {
                    render_row(&mut out, c, &[v.dc_i, v.rms_i, v.dc_q, v.rms_q]);
                }
            }
            let _ = writeln!(out, "\nIn dBm:\n{COLUMN_HEADER}");
            for c in &self.channels {
                if let Some((di, dq)) = c.rms_dbm {
                    render_row(&mut out, c, &[0.0, di, 0.0, dq]);
                }
            }
        }

        for h in &self.histograms {
            out.push('\n');
            if let Some(label) = &h.channel {
                let _ = writeln!(out, "{label} hist");
            }
            for row in &h.rows {
                let _ = writeln!(
                    out,
                    "{:>10} {:>15}\t{:>10} {:>15}",
                    row.level, row.i_count, row.level, row.q_count
                );
            }
        }
        out
    }
}

fn render_row(out: &mut String, report: &ChannelReport, values: &[f64]) {
    if let Some(label) = &report.channel {
        let _ = writeln!(out, "{label} stats");
    }
    for &v in values {
        out.push_str(&format_fixed_width(v, 10, 4));
        out.push(' ');
    }
    out.push('\n');
}

/// 计算统计的起始位置与字节数上限
fn select_region(cli: &Cli, file_len: Option<u64>) -> Result<(u64, Option<u64>)> {
    let block = BLOCK_BYTES as u64;
    if cli.all {
        return Ok((0, None));
    }
    if !cli.end {
        return Ok((0, Some(block)));
    }
    let Some(len) = file_len else {
        bail!(PfsError::Config("-e 需要指定输入文件".into()));
    };
    let unit = cli.mode.unit_bytes() as u64;
    let start = len.saturating_sub(block).div_ceil(unit) * unit;
    Ok((start, Some(block)))
}

fn run(cli: &Cli) -> Result<()> {
    let mode = cli.mode;
    let mut input = InputSource::open(cli.input.as_deref())?;
    if let Some(len) = input.file_len() {
        if len % mode.unit_bytes() as u64 != 0 {
            warn!("文件长度 {len} 不是 {} 的整数倍", mode.unit_bytes());
        }
    }
    let (start, limit) = select_region(cli, input.file_len())?;
    input.skip(start)?;
    debug!("从第 {start} 字节开始统计, 上限 {limit:?} 字节");

    let channels: &[Channel] = if mode.is_dual_pol() {
        &[Channel::Rcp, Channel::Lcp]
    } else {
        &[Channel::Rcp]
    };
    let mut collectors = channels
        .iter()
        .map(|&ch| ChannelCollector::new(mode, ch, cli.hist))
        .collect::<Result<Vec<_>>>()?;
    if cli.hist && !mode.is_quantized() {
        warn!("模式 {mode} 没有量化电平, 忽略直方图");
    }

    let mut buf: Vec<u8> = alloc_zeroed(BLOCK_BYTES, "读缓冲")?;
    let mut consumed = 0u64;
    loop {
        let want = match limit {
            Some(l) => (l - consumed).min(BLOCK_BYTES as u64) as usize,
            None => BLOCK_BYTES,
        };
        if want == 0 {
            break;
        }
        let n = read_full(&mut input, &mut buf[..want]).context("读取输入失败")?;
        let (whole, rem) = split_units(mode, n);
        if rem != 0 {
            warn!("末尾 {rem} 字节不足一个字, 已丢弃");
        }
        for c in collectors.iter_mut() {
            c.add(&buf[..whole])?;
        }
        consumed += n as u64;
        if n < want {
            break;
        }
    }
    info!("统计了 {consumed} 字节");

    let report = StatsReport::from_collectors(mode, &collectors)?;
    let mut out = open_output(cli.output.as_deref())?;
    if cli.json {
        serde_json::to_writer_pretty(&mut out, &report).context("JSON 序列化失败")?;
        writeln!(out)?;
    } else {
        out.write_all(report.render_text().as_bytes())?;
    }
    out.flush().context("写出失败")?;
    Ok(())
}

fn main() {
    let cli: Cli = parse_args();
    let log_config = LoggingConfig::for_tool("pfs-stats", cli.verbose, cli.quiet)
        .with_directory(cli.log_dir.clone());
    if let Err(e) = logging::init(&log_config) {
        eprintln!("警告: {e:#}");
    }
    debug!("pfs-stats 版本 {}", pfs::version());

    if let Err(e) = run(&cli) {
        exit_with_error::<Cli>(e);
    }
}
