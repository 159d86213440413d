//! 日志初始化模块.
//!
//! 双输出:
//! - console: 标准错误, 终端下彩色, 默认 info, 可通过 -v/-vv/-q 或 PFS_LOG 环境变量调整
//! - file: 可选, 无色, 按天滚动, 输出到 {directory}/{prefix}.{date}.log
//!
//! 结果数据写标准输出, 所以日志一律不写标准输出.
//! 库 crate 通过 `log` 门面记录, 由 tracing-subscriber 转发.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// 覆盖日志级别的环境变量
pub const LOG_ENV: &str = "PFS_LOG";

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 日志级别或 EnvFilter 指令
    #[serde(default = "default_level")]
    pub level: String,
    /// 日志文件目录, 为空时不写文件
    #[serde(default)]
    pub directory: Option<String>,
    pub file_prefix: String,
    #[serde(default = "default_true")]
    pub console: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl LoggingConfig {
    /// 命令行工具的默认配置
    ///
    /// - `verbosity`: 0=info, 1=debug, 2+=trace (由 -v/-vv 控制)
    /// - `quiet`: 只输出警告与错误
    pub fn for_tool(file_prefix: &str, verbosity: u8, quiet: bool) -> Self {
        Self {
            level: level_for(verbosity, quiet).to_string(),
            directory: None,
            file_prefix: file_prefix.to_string(),
            console: true,
        }
    }

    /// 同时写入指定目录下的日志文件
    pub fn with_directory(mut self, directory: Option<String>) -> Self {
        self.directory = directory;
        self
    }
}

/// 命令行参数对应的日志级别
pub fn level_for(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn make_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level))
}

/// 初始化日志系统
pub fn init(config: &LoggingConfig) -> Result<()> {
    let console_layer = config.console.then(|| {
        fmt::Layer::default()
            .with_writer(std::io::stderr)
            .with_ansi(std::io::stderr().is_terminal())
            .event_format(ConsoleFormatter {
                ansi: std::io::stderr().is_terminal(),
            })
            .with_filter(make_filter(&config.level))
    });

    let file_layer = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("创建日志目录失败, path={dir}"))?;
            let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(Path::new(dir))
                .context("创建日志文件失败")?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            LOG_GUARD.set(guard).ok();
            Some(
                fmt::Layer::default()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .event_format(FileFormatter)
                    .with_filter(make_filter(&config.level)),
            )
        }
        None => None,
    };

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("日志系统初始化失败")?;
    Ok(())
}

/// Console 格式: 时间戳 + 级别 + 消息, 终端下级别带颜色
struct ConsoleFormatter {
    ansi: bool,
}

impl<S, N> FormatEvent<S, N> for ConsoleFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        let meta = event.metadata();
        write!(
            writer,
            "[{:02}:{:02}:{:02}.{:03}] ",
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
        )?;
        if self.ansi {
            let color = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                _ => "\x1b[34m",
            };
            write!(writer, "{color}{:5}\x1b[0m > ", meta.level())?;
        } else {
            write!(writer, "{:5} > ", meta.level())?;
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// File 格式: 无色, 日期时间 + 级别 + 消息
struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &fmt::FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = Local::now();
        write!(
            writer,
            "[{:02}-{:02} {:02}:{:02}:{:02}.{:03}] {:5} > ",
            now.month(),
            now.day(),
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis(),
            event.metadata().level(),
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
