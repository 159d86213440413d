//! 频谱仪流水线.
//!
//! [`SpectrometerConfig`] 描述一次运行的全部参数, 在任何 I/O 之前校验;
//! [`SpectrometerContext`] 持有输入、缓冲区与累加器, 逐周期处理直到结束.

use std::io::{Read, Write};
use std::ops::Range;

use log::{debug, info, warn};
use num_complex::Complex32;
use pfs_codec::Unpacker;
use pfs_core::io::read_full;
use pfs_core::{BufferLayout, Channel, PfsError, PfsResult, QuantMode, SkipPlan, alloc_zeroed};
use pfs_resample::{DcOffset, downsample_into, swap_iq};

use crate::accumulator::{DcPatch, SpectralAccumulator};
use crate::engine::{SpectralEngine, swap_freq};
use crate::normalize::{BandStatistics, RmsBand};
use crate::output::{FreqWindow, OutputFormat, SpectrumWriter};
use crate::window::{ChebyshevWindow, hanning};
use crate::{SpectrumStage, StageChain};

/// FFT 前的直流偏移处理
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DcRemoval {
    /// 不处理
    #[default]
    None,
    /// 减去固定偏移
    Fixed(DcOffset),
    /// 减去每个缓冲区自身的均值
    Mean,
}

/// 频谱仪参数
#[derive(Debug, Clone)]
pub struct SpectrometerConfig {
    pub mode: QuantMode,
    pub channel: Channel,
    /// 采样频率 (MHz)
    pub fsamp_mhz: f64,
    /// 频率分辨率 (Hz)
    pub freqres_hz: f64,
    /// 相干降采样因子
    pub downsample: usize,
    /// 每个输出周期累加的变换数
    pub sum: usize,
    pub swap_iq: bool,
    pub hanning: bool,
    pub chebyshev: Option<ChebyshevWindow>,
    /// 文件开头跳过的秒数
    pub skip_seconds: f64,
    pub freq_window: FreqWindow,
    pub rms_band: RmsBand,
    pub db: bool,
    pub format: OutputFormat,
    /// 时间序列模式: 循环输出整帧直到输入结束
    pub time_series: bool,
    pub dc: DcRemoval,
}

impl SpectrometerConfig {
    pub fn new(mode: QuantMode, fsamp_mhz: f64) -> Self {
        Self {
            mode,
            channel: Channel::Rcp,
            fsamp_mhz,
            freqres_hz: 1.0,
            downsample: 1,
            sum: 1,
            swap_iq: false,
            hanning: false,
            chebyshev: None,
            skip_seconds: 0.0,
            freq_window: FreqWindow::default(),
            rms_band: RmsBand::default(),
            db: false,
            format: OutputFormat::Text,
            time_series: false,
            dc: DcRemoval::None,
        }
    }

    /// 校验参数组合并计算缓冲区布局
    pub fn validate(&self) -> PfsResult<BufferLayout> {
        if self.sum == 0 {
            return Err(PfsError::Config("累加次数必须大于 0".into()));
        }
        if self.time_series && self.db {
            return Err(PfsError::Config("时间序列模式不能与 dB 输出同时使用".into()));
        }
        if self.time_series && self.freq_window.is_set() {
            return Err(PfsError::Config("时间序列模式不能与频率窗口同时使用".into()));
        }
        if self.freq_window.min_hz > self.freq_window.max_hz {
            return Err(PfsError::Config(format!(
                "频率窗口 [{}, {}] Hz 无效",
                self.freq_window.min_hz, self.freq_window.max_hz
            )));
        }

        let layout =
            BufferLayout::for_spectrum(self.mode, self.fsamp_mhz, self.freqres_hz, self.downsample)?;
        self.rms_band.validate(self.freqres_hz, layout.fft_len)?;
        Ok(layout)
    }

    /// 文件开头的跳过计划
    pub fn skip_plan(&self) -> PfsResult<SkipPlan> {
        if self.skip_seconds == 0.0 {
            return Ok(SkipPlan::NONE);
        }
        SkipPlan::from_seconds(self.mode, self.fsamp_mhz, self.skip_seconds)
    }
}

/// 运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// 写出的频谱数 (时间序列模式下为帧数)
    pub frames: u64,
    /// 执行的 FFT 次数
    pub transforms: u64,
}

/// 频谱仪上下文
///
/// 每个输入文件有独立的部分累加器; 周期结束时各自修补直流频点后求和.
pub struct SpectrometerContext<R: Read> {
    config: SpectrometerConfig,
    layout: BufferLayout,
    inputs: Vec<R>,
    unpacker: Unpacker,
    engine: SpectralEngine,
    /// 求和之后作用于总频谱的阶段
    post: StageChain,
    rms_range: Option<Range<usize>>,
    raw: Vec<u8>,
    samples: Vec<Complex32>,
    reduced: Vec<Complex32>,
    fft_buf: Vec<Complex32>,
    partials: Vec<SpectralAccumulator>,
    total: SpectralAccumulator,
    stats: BandStatistics,
    cycles: u64,
    transforms: u64,
    pad_warned: bool,
}

impl<R: Read> SpectrometerContext<R> {
    /// 创建上下文, 输入为一个或两个已定位到起始位置的数据流
    pub fn new(config: SpectrometerConfig, inputs: Vec<R>) -> PfsResult<Self> {
        let layout = config.validate()?;
        if inputs.is_empty() || inputs.len() > 2 {
            return Err(PfsError::InvalidArgument(format!(
                "输入数必须为 1 或 2, 实际为 {}",
                inputs.len()
            )));
        }

        if layout.fft_len_full % layout.downsample != 0 {
            warn!(
                "变换长度 {} 不是降采样因子 {} 的整数倍, FFT 长度截断为 {}",
                layout.fft_len_full, layout.downsample, layout.fft_len
            );
        }

        let fft_len = layout.fft_len;
        let mut post = StageChain::new();
        if let Some(cheb) = &config.chebyshev {
            post.add_stage(Box::new(cheb.clone()));
        }
        let rms_range = config
            .rms_band
            .is_set()
            .then(|| config.rms_band.bin_range(config.freqres_hz, fft_len));

        let mut partials = Vec::with_capacity(inputs.len());
        for _ in 0..inputs.len() {
            partials.push(SpectralAccumulator::new(fft_len)?);
        }

        Ok(Self {
            unpacker: Unpacker::new(config.mode, config.channel),
            engine: SpectralEngine::new(fft_len)?,
            raw: alloc_zeroed(layout.buf_size, "读缓冲")?,
            samples: Vec::new(),
            reduced: Vec::new(),
            fft_buf: alloc_zeroed(fft_len, "FFT 缓冲")?,
            total: SpectralAccumulator::new(fft_len)?,
            partials,
            post,
            rms_range,
            stats: BandStatistics::IDENTITY,
            cycles: 0,
            transforms: 0,
            pad_warned: false,
            config,
            layout,
            inputs,
        })
    }

    pub fn config(&self) -> &SpectrometerConfig {
        &self.config
    }

    pub fn layout(&self) -> &BufferLayout {
        &self.layout
    }

    /// 以 info 级别输出处理参数摘要
    pub fn describe(&self) {
        let c = &self.config;
        let l = &self.layout;
        info!("FFT 长度                : {}", l.fft_len);
        info!("频率分辨率              : {:e} Hz", c.freqres_hz);
        info!("处理带宽                : {:e} Hz", l.bandwidth(c.freqres_hz));
        if c.rms_band.is_set() {
            info!(
                "归一化参考频带          : [{:e}, {:e}] Hz",
                c.rms_band.min_hz, c.rms_band.max_hz
            );
        }
        info!("每次变换数据量          : {} 字节", l.buf_size);
        info!("每周期累加变换数        : {}", c.sum);
        info!("每周期数据量            : {} 字节", c.sum * l.buf_size);
        info!("每周期积分时间          : {:e} s", c.sum as f64 / c.freqres_hz);
        if self.inputs.len() > 1 {
            info!("输入文件数              : {}", self.inputs.len());
        }
        if let Some(cheb) = &c.chebyshev {
            info!("Chebyshev 多项式阶数    : {}", cheb.degree());
        }
        debug!("检波后处理阶段          : {:?}", self.post.stage_names());
    }

    /// 对 `self.raw` 中的一个缓冲区执行解包到检波前的全部步骤, 结果留在 `fft_buf`
    fn transform(&mut self) -> PfsResult<()> {
        let fft_len = self.layout.fft_len;
        let factor = self.layout.downsample;

        let n = self.unpacker.unpack_complex(&self.raw, &mut self.samples)?;
        let used = n.min(fft_len * factor) / factor * factor;
        let samples = &mut self.samples[..used];

        match self.config.dc {
            DcRemoval::None => {}
            DcRemoval::Fixed(offset) => offset.remove(samples),
            DcRemoval::Mean => DcOffset::mean_of(samples).remove(samples),
        }

        let input: &[Complex32] = if factor > 1 {
            downsample_into(samples, factor, &mut self.reduced);
            &self.reduced
        } else {
            samples
        };
        let count = input.len().min(fft_len);
        self.fft_buf[..count].copy_from_slice(&input[..count]);
        self.fft_buf[count..].fill(Complex32::default());
        if count < fft_len && !self.pad_warned {
            warn!("每个缓冲区只有 {count} 个采样, FFT 输入末尾补零到 {fft_len}");
            self.pad_warned = true;
        }

        if self.config.swap_iq {
            swap_iq(&mut self.fft_buf);
        }
        if self.config.hanning {
            hanning(&mut self.fft_buf);
        }
        self.engine.forward(&mut self.fft_buf)?;
        swap_freq(&mut self.fft_buf);
        Ok(())
    }

    /// 读入并累加一个周期的全部变换 (不做收尾处理)
    ///
    /// 返回 `false` 表示时间序列模式下输入在周期开始处结束.
    pub fn accumulate_cycle(&mut self) -> PfsResult<bool> {
        for p in &mut self.partials {
            p.reset();
        }
        let expected = self.layout.buf_size;

        for k in 0..self.config.sum {
            for idx in 0..self.inputs.len() {
                let got = read_full(&mut self.inputs[idx], &mut self.raw)?;
                if got < expected {
                    if self.config.time_series && k == 0 && idx == 0 {
                        if got > 0 {
                            warn!("输入末尾 {got} 字节不足一次变换, 已丢弃");
                        }
                        debug!("输入结束, 共 {} 个周期", self.cycles);
                        return Ok(false);
                    }
                    return Err(PfsError::ShortRead { expected, got });
                }
                self.transform()?;
                self.partials[idx].add_power(&self.fft_buf)?;
                self.transforms += 1;
            }
        }
        Ok(true)
    }

    /// 收尾: 修补直流频点、求和、校正并计算归一化统计量
    pub fn finalize(&mut self) -> PfsResult<BandStatistics> {
        self.total.reset();
        for p in &mut self.partials {
            DcPatch.apply(p.as_mut_slice())?;
            self.total.add(p.as_slice())?;
        }
        self.post.process(self.total.as_mut_slice())?;

        self.stats = match &self.rms_range {
            Some(range) => BandStatistics::compute(self.total.as_slice(), range.clone())?,
            None => BandStatistics::IDENTITY,
        };
        if self.stats.sigma == 0.0 {
            warn!("参考频带标准差为 0, 归一化结果无意义");
        }
        self.cycles += 1;
        Ok(self.stats)
    }

    /// 处理一个完整周期; 返回 `false` 表示输入已结束
    pub fn process_cycle(&mut self) -> PfsResult<bool> {
        if !self.accumulate_cycle()? {
            return Ok(false);
        }
        self.finalize()?;
        Ok(true)
    }

    /// 第 `idx` 个输入的部分累加频谱 (收尾前为原始检波功率)
    pub fn partial(&self, idx: usize) -> Option<&[f32]> {
        self.partials.get(idx).map(|p| p.as_slice())
    }

    /// 最近一次收尾后的总频谱 (未归一化)
    pub fn spectrum(&self) -> &[f32] {
        self.total.as_slice()
    }

    /// 最近一次收尾的归一化统计量
    pub fn statistics(&self) -> &BandStatistics {
        &self.stats
    }

    /// 已完成的周期数
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// 运行到结束, 结果写入 `writer`
    pub fn run<W: Write>(&mut self, writer: &mut SpectrumWriter<W>) -> PfsResult<RunSummary> {
        let mut frames = 0u64;
        if self.config.time_series {
            while self.process_cycle()? {
                writer.write_frame(self.total.as_slice(), &self.stats)?;
                frames += 1;
            }
            info!("共写出 {frames} 帧");
        } else {
            if !self.process_cycle()? {
                return Err(PfsError::Eof);
            }
            writer.write_spectrum(self.total.as_slice(), &self.stats, self.config.freqres_hz)?;
            frames = 1;
        }
        Ok(RunSummary {
            frames,
            transforms: self.transforms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;
    use std::io::Cursor;

    use super::*;

    /// 64 点 FFT 的配置: 64 kHz 采样, 1 kHz 分辨率
    fn config_64(mode: QuantMode) -> SpectrometerConfig {
        let mut cfg = SpectrometerConfig::new(mode, 0.064);
        cfg.freqres_hz = 1000.0;
        cfg
    }

    fn float32_bytes(samples: &[Complex32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(samples.len() * 8);
        for s in samples {
            out.extend_from_slice(&s.re.to_le_bytes());
            out.extend_from_slice(&s.im.to_le_bytes());
        }
        out
    }

    fn tone(n: usize, bin: f32) -> Vec<Complex32> {
        (0..n)
            .map(|k| {
                let ph = 2.0 * PI * bin * k as f32 / n as f32;
                Complex32::new(ph.cos(), ph.sin())
            })
            .collect()
    }

    fn peak(data: &[f32]) -> usize {
        (0..data.len())
            .max_by(|&a, &b| data[a].total_cmp(&data[b]))
            .unwrap()
    }

    #[test]
    fn test_all_zero_bits_give_dc_spike() {
        let cfg = config_64(QuantMode::Dual2Bit);
        let layout = cfg.validate().unwrap();
        assert_eq!(layout.fft_len, 64);
        assert_eq!(layout.buf_size, 32);

        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(vec![0u8; 32])]).unwrap();
        assert!(ctx.accumulate_cycle().unwrap());

        // 全零码字解为 (+3, +3): 直流功率 = |64·(3+3i)|² = 64²·18
        let raw = ctx.partial(0).unwrap();
        assert!((raw[32] - 64.0 * 64.0 * 18.0).abs() < 1.0);
        for (i, &p) in raw.iter().enumerate() {
            if i != 32 {
                assert!(p < 1e-3, "bin {i} = {p}");
            }
        }

        ctx.finalize().unwrap();
        let spec = ctx.spectrum();
        assert_eq!(spec[32], (spec[31] + spec[33]) / 2.0);
        assert!(spec[32] < 1e-3);
    }

    #[test]
    fn test_tone_lands_on_centered_bin() {
        let cfg = config_64(QuantMode::Float32);
        let input = float32_bytes(&tone(64, 4.0));
        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(input)]).unwrap();
        assert!(ctx.process_cycle().unwrap());
        // 第 i 个频点的频率为 (i - 32)·1 kHz
        assert_eq!(peak(ctx.spectrum()), 36);
    }

    #[test]
    fn test_swap_iq_mirrors_spectrum() {
        let mut cfg = config_64(QuantMode::Float32);
        cfg.swap_iq = true;
        let input = float32_bytes(&tone(64, 4.0));
        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(input)]).unwrap();
        assert!(ctx.process_cycle().unwrap());
        assert_eq!(peak(ctx.spectrum()), 28);
    }

    #[test]
    fn test_downsample_halves_fft_len() {
        let mut cfg = config_64(QuantMode::Float32);
        cfg.downsample = 2;
        // 降采样后 32 点; 原 64 点中第 2 个频点的单音在 32 点中仍为第 2 个频点
        let input = float32_bytes(&tone(64, 2.0));
        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(input)]).unwrap();
        assert_eq!(ctx.layout().fft_len, 32);
        assert!(ctx.process_cycle().unwrap());
        assert_eq!(peak(ctx.spectrum()), 18);
    }

    #[test]
    fn test_mean_dc_removal() {
        let mut cfg = config_64(QuantMode::Float32);
        cfg.dc = DcRemoval::Mean;
        let samples: Vec<Complex32> = tone(64, 4.0)
            .into_iter()
            .map(|s| s + Complex32::new(5.0, -2.0))
            .collect();
        let mut ctx =
            SpectrometerContext::new(cfg, vec![Cursor::new(float32_bytes(&samples))]).unwrap();
        assert!(ctx.accumulate_cycle().unwrap());
        assert!(ctx.partial(0).unwrap()[32] < 1e-2);
    }

    #[test]
    fn test_sum_and_two_inputs() {
        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.sum = 2;
        let data: Vec<u8> = (0..64u32).map(|i| (i * 37 % 251) as u8).collect();

        let mut single =
            SpectrometerContext::new(cfg.clone(), vec![Cursor::new(data.clone())]).unwrap();
        assert!(single.process_cycle().unwrap());
        let one = single.spectrum().to_vec();

        let inputs = vec![Cursor::new(data.clone()), Cursor::new(data)];
        let mut dual = SpectrometerContext::new(cfg, inputs).unwrap();
        let mut writer = SpectrumWriter::new(Vec::new(), OutputFormat::Binary);
        let summary = dual.run(&mut writer).unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.transforms, 4);
        for (a, b) in dual.spectrum().iter().zip(&one) {
            assert!((a - 2.0 * b).abs() <= 1e-3 * b.abs().max(1.0));
        }
    }

    #[test]
    fn test_time_series_stops_at_eof() {
        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.time_series = true;
        let mut data = vec![0x5Au8; 32 * 3];
        data.extend_from_slice(&[1, 2, 3, 4, 5]);

        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(data)]).unwrap();
        let mut writer = SpectrumWriter::new(Vec::new(), OutputFormat::Binary);
        let summary = ctx.run(&mut writer).unwrap();
        assert_eq!(summary.frames, 3);
        assert_eq!(ctx.cycles(), 3);
        assert_eq!(writer.into_inner().len(), 3 * 64 * 4);
    }

    #[test]
    fn test_short_read_is_fatal() {
        let cfg = config_64(QuantMode::Dual2Bit);
        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(vec![0u8; 20])]).unwrap();
        let mut writer = SpectrumWriter::new(Vec::new(), OutputFormat::Text);
        match ctx.run(&mut writer) {
            Err(PfsError::ShortRead { expected, got }) => assert_eq!((expected, got), (32, 20)),
            other => panic!("期望 ShortRead, 实际 {other:?}"),
        }
        assert!(writer.into_inner().is_empty());
    }

    #[test]
    fn test_short_read_mid_cycle_in_time_series() {
        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.time_series = true;
        cfg.sum = 2;
        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(vec![0u8; 48])]).unwrap();
        let mut writer = SpectrumWriter::new(Vec::new(), OutputFormat::Binary);
        assert!(matches!(ctx.run(&mut writer), Err(PfsError::ShortRead { .. })));
    }

    #[test]
    fn test_rms_band_normalizes() {
        let mut cfg = config_64(QuantMode::Dual8Bit);
        cfg.rms_band = RmsBand::new(-20_000.0, 20_000.0);
        let data: Vec<u8> = (0..256u32).map(|i| (i * 97 % 256) as u8).collect();
        let mut ctx = SpectrometerContext::new(cfg, vec![Cursor::new(data)]).unwrap();
        assert!(ctx.process_cycle().unwrap());
        let stats = *ctx.statistics();
        assert!(stats.sigma > 0.0);

        let kept: Vec<f64> = ctx.spectrum()[12..52]
            .iter()
            .map(|&v| v as f64)
            .filter(|&v| ((v - stats.first_mean) / stats.first_sigma).abs() <= 3.5)
            .collect();
        let mean = kept.iter().sum::<f64>() / kept.len() as f64;
        assert!((mean - stats.mean).abs() < 1e-6 * stats.mean.abs().max(1.0));
    }

    #[test]
    fn test_config_rejections() {
        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.time_series = true;
        cfg.db = true;
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.time_series = true;
        cfg.freq_window = FreqWindow::new(-1000.0, 1000.0);
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.sum = 0;
        assert!(cfg.validate().unwrap_err().is_config());

        let mut cfg = config_64(QuantMode::Dual2Bit);
        cfg.rms_band = RmsBand::new(0.0, 1e9);
        assert!(cfg.validate().unwrap_err().is_config());

        let cfg = SpectrometerConfig::new(QuantMode::Dual2Bit, 0.0);
        assert!(cfg.validate().unwrap_err().is_config());

        let cfg = config_64(QuantMode::Dual2Bit);
        assert!(SpectrometerContext::<Cursor<Vec<u8>>>::new(cfg, Vec::new()).is_err());
    }

    #[test]
    fn test_skip_plan() {
        let mut cfg = config_64(QuantMode::Dual2Bit);
        assert!(cfg.skip_plan().unwrap().is_empty());
        // 64 kHz, 1 s, 每字 8 个采样: 32000 字节
        cfg.skip_seconds = 1.0;
        assert_eq!(cfg.skip_plan().unwrap().seek_bytes, 32_000);
    }
}
