//! pfs-fft - PFS 非相干累加频谱仪
//!
//! 按指定分辨率对 PFS 原始采样做 FFT, 累加功率谱后输出归一化频谱;
//! 时间序列模式下循环输出整帧频谱直到输入结束.

use anyhow::{Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;

use pfs::cli::{
    InputSource, exit_with_error, open_output, parse_args, parse_channel, parse_mode, parse_range,
};
use pfs::logging::{self, LoggingConfig};
use pfs_core::{Channel, PfsError, QuantMode, SkipPlan};
use pfs_resample::DcOffset;
use pfs_spectrum::{
    ChebyshevWindow, DcRemoval, FreqWindow, OutputFormat, RmsBand, SpectrometerConfig,
    SpectrometerContext, SpectrumWriter,
};

/// PFS 非相干累加 FFT 频谱仪
#[derive(Parser, Debug)]
#[command(name = "pfs-fft", version, about = "PFS 非相干累加 FFT 频谱仪")]
struct Cli {
    /// 量化模式 (-1, 1, 2, 3, 5, 6, 7, 8, 16, 32)
    #[arg(short = 'm', long, value_parser = parse_mode, allow_hyphen_values = true)]
    mode: QuantMode,

    /// 采样频率 (MHz)
    #[arg(short = 'f', long)]
    fsamp: f64,

    /// 频率分辨率 (Hz)
    #[arg(short = 'r', long, default_value_t = 1.0)]
    freqres: f64,

    /// 相干降采样因子
    #[arg(short = 'd', long, default_value_t = 1)]
    downsample: usize,

    /// 每个输出累加的变换数
    #[arg(short = 'n', long, default_value_t = 1)]
    sum: usize,

    /// 极化通道 (1 或 2, 仅模式 5/6/7)
    #[arg(short = 'c', long, value_parser = parse_channel, default_value = "1")]
    channel: Channel,

    /// 变换前交换 I/Q (频率轴反转)
    #[arg(short = 'i', long = "swap-iq")]
    swap_iq: bool,

    /// 变换前施加 Hanning 窗
    #[arg(short = 'H', long, short_alias = 'w')]
    hanning: bool,

    /// Chebyshev 系数文件, 检波后校正通带
    #[arg(short = 'C', long)]
    chebyshev: Option<PathBuf>,

    /// 开始前跳过的秒数
    #[arg(short = 'S', long = "skip", default_value_t = 0.0)]
    skip_seconds: f64,

    /// 只输出该频率范围 fmin,fmax (Hz)
    #[arg(short = 'x', long = "freq-range", value_parser = parse_range, allow_hyphen_values = true)]
    freq_range: Option<(f64, f64)>,

    /// 按该频率范围 smin,smax (Hz) 的均值与标准差归一化
    #[arg(short = 's', long = "rms-range", value_parser = parse_range, allow_hyphen_values = true)]
    rms_range: Option<(f64, f64)>,

    /// 输出 dB
    #[arg(short = 'l', long)]
    db: bool,

    /// 二进制输出 (f32)
    #[arg(short = 'b', long)]
    binary: bool,

    /// 时间序列模式
    #[arg(short = 't', long = "time-series")]
    time_series: bool,

    /// I 直流偏移
    #[arg(short = 'I', long = "dc-i", allow_hyphen_values = true, conflicts_with = "dc_mean")]
    dc_i: Option<f32>,

    /// Q 直流偏移
    #[arg(short = 'Q', long = "dc-q", allow_hyphen_values = true, conflicts_with = "dc_mean")]
    dc_q: Option<f32>,

    /// 变换前减去每个缓冲区的均值
    #[arg(short = 'D', long = "dc-mean")]
    dc_mean: bool,

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

    /// 输入文件 (最多两个, 缺省或 "-" 为标准输入)
    #[arg(num_args = 0..=2)]
    inputs: Vec<String>,
}

impl Cli {
    /// 转换为频谱仪参数 (不读取任何文件)
    fn to_config(&self) -> SpectrometerConfig {
        let mut config = SpectrometerConfig::new(self.mode, self.fsamp);
        config.channel = self.channel;
        config.freqres_hz = self.freqres;
        config.downsample = self.downsample;
        config.sum = self.sum;
        config.swap_iq = self.swap_iq;
        config.hanning = self.hanning;
        config.skip_seconds = self.skip_seconds;
        config.db = self.db;
        config.time_series = self.time_series;
        config.format = if self.binary {
            OutputFormat::Binary
        } else {
            OutputFormat::Text
        };
        if let Some((min, max)) = self.freq_range {
            config.freq_window = FreqWindow::new(min, max);
        }
        if let Some((min, max)) = self.rms_range {
            config.rms_band = RmsBand::new(min, max);
        }
        config.dc = if self.dc_mean {
            DcRemoval::Mean
        } else if self.dc_i.is_some() || self.dc_q.is_some() {
            DcRemoval::Fixed(DcOffset::new(
                self.dc_i.unwrap_or(0.0),
                self.dc_q.unwrap_or(0.0),
            ))
        } else {
            DcRemoval::None
        };
        config
    }

    fn input_paths(&self) -> Result<Vec<Option<&str>>> {
        if self.inputs.is_empty() {
            return Ok(vec![None]);
        }
        if self.inputs.iter().filter(|p| p.as_str() == "-").count() > 1 {
            bail!(PfsError::Config("标准输入只能作为一个输入".into()));
        }
        Ok(self.inputs.iter().map(|p| Some(p.as_str())).collect())
    }
}

/// 校验参数组合, 通过后才读取 Chebyshev 系数文件
fn prepare(cli: &Cli) -> Result<(SpectrometerConfig, SkipPlan)> {
    let mut config = cli.to_config();
    config.validate()?;
    let skip = config.skip_plan()?;
    config.chebyshev = cli
        .chebyshev
        .as_ref()
        .map(ChebyshevWindow::open)
        .transpose()?;
    Ok((config, skip))
}

fn run(cli: &Cli) -> Result<()> {
    let (config, skip) = prepare(cli)?;

    let mut inputs = Vec::new();
    for path in cli.input_paths()? {
        let mut input = InputSource::open(path)?;
        input.skip(skip.seek_bytes)?;
        debug!("输入: {}", input.name());
        inputs.push(input);
    }

    let writer = open_output(cli.output.as_deref())?;
    let mut writer = SpectrumWriter::new(writer, config.format)
        .with_db(config.db)
        .with_window(config.freq_window);

    let time_series = config.time_series;
    let mut ctx = SpectrometerContext::new(config, inputs)?;
    ctx.describe();
    if !skip.is_empty() {
        info!(
            "从文件开头跳过          : {} 秒 ({} 字节)",
            cli.skip_seconds, skip.seek_bytes
        );
    }

    match ctx.run(&mut writer) {
        Ok(summary) => {
            debug!(
                "完成: {} 个输出, {} 次变换",
                summary.frames, summary.transforms
            );
            Ok(())
        }
        Err(e) => {
            if time_series {
                warn!("已写出 {} 帧", ctx.cycles());
            }
            Err(e.into())
        }
    }
}

fn main() {
    let cli: Cli = parse_args();
    let log_config = LoggingConfig::for_tool("pfs-fft", cli.verbose, cli.quiet)
        .with_directory(cli.log_dir.clone());
    if let Err(e) = logging::init(&log_config) {
        eprintln!("警告: {e:#}");
    }
    debug!("pfs-fft 版本 {}", pfs::version());

    if let Err(e) = run(&cli) {
        exit_with_error::<Cli>(e);
    }
}
