//! 日志系统.
//!
//! 解码管线的日志分两路:
//! - 终端 (stderr): 彩色, 显示模块路径. 逐帧的 trace 默认不显示
//! - 文件: 无色, 带源码位置, 写入 `{directory}/{prefix}.{YYYY-MM-DD}.log`
//!
//! 各库 crate 只依赖 `log` 门面, 由 `tracing-subscriber` 统一接收.
//! 安装时先做一次日志维护 (过期删除、历史压缩). 如果调用方处于
//! tokio 运行时内, 还会启动按日翻滚与定期清理的后台任务.

use anyhow::{Context, Result, bail};
use chrono::{Datelike, Local, NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

mod task;

/// 日志配置, 可与管线配置一样从 JSON 读取
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// 文件日志过滤规则 (EnvFilter 语法, 如 "info" 或 "nalflow_codec=trace")
    pub level: String,
    #[serde(default = "default_console_level")]
    pub console_level: String,
    pub directory: String,
    pub file_prefix: String,
    /// 保留天数, 更早的日志文件被删除
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// 是否把往日日志压缩为 `.log.gz`
    #[serde(default = "default_true")]
    pub compress_history: bool,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_level: default_console_level(),
            directory: "logs".to_string(),
            file_prefix: "nalflow".to_string(),
            retention_days: default_retention_days(),
            compress_history: true,
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl LoggingConfig {
    /// 从 JSON 文件读取并校验
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取日志配置失败, path={}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("解析日志配置失败, path={}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 检查过滤规则可解析、前缀与保留天数合法
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level)
            .with_context(|| format!("无效的文件日志级别: {}", self.level))?;
        EnvFilter::try_new(&self.console_level)
            .with_context(|| format!("无效的控制台日志级别: {}", self.console_level))?;
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            bail!("日志文件前缀非法: {:?}", self.file_prefix);
        }
        if self.retention_days < 1 {
            bail!("日志保留天数必须 >= 1, 实际为 {}", self.retention_days);
        }
        Ok(())
    }

    /// 指定日期的日志文件路径
    pub fn log_path_for(&self, date: NaiveDate) -> PathBuf {
        build_current_log_path(Path::new(&self.directory), &self.file_prefix, date)
    }
}

fn default_true() -> bool {
    true
}

fn default_console_level() -> String {
    "info".to_string()
}

fn default_retention_days() -> i64 {
    30
}

fn default_cleanup_interval() -> u64 {
    3600
}

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 安装全局日志订阅器, 每个进程只能调用一次
pub fn init(config: LoggingConfig) -> Result<()> {
    config.validate()?;
    std::fs::create_dir_all(&config.directory)
        .with_context(|| format!("创建日志目录失败, path={}", config.directory))?;

    let rotate_requested = Arc::new(AtomicBool::new(false));
    let daily_file = DailyLogFile::open(&config, Arc::clone(&rotate_requested))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(daily_file);
    LOG_GUARD.set(guard).ok();

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LogLine::Console)
        .with_filter(EnvFilter::try_new(&config.console_level)?);
    let file_layer = fmt::Layer::default()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(LogLine::File)
        .with_filter(EnvFilter::try_new(&config.level)?);

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("全局日志订阅器已安装")?;

    task::start_log_maintenance(config, rotate_requested);
    Ok(())
}

/// 当日日志文件. 后台任务在零点置位翻滚标志, 下一次写入时换到新日期的文件
struct DailyLogFile {
    config: LoggingConfig,
    date: NaiveDate,
    rotate_requested: Arc<AtomicBool>,
    file: File,
}

impl DailyLogFile {
    fn open(config: &LoggingConfig, rotate_requested: Arc<AtomicBool>) -> Result<Self> {
        let date = Local::now().date_naive();
        let file = open_append_file(&config.log_path_for(date))?;
        Ok(Self {
            config: config.clone(),
            date,
            rotate_requested,
            file,
        })
    }

    fn roll_over(&mut self) -> std::io::Result<()> {
        let today = Local::now().date_naive();
        if today == self.date {
            return Ok(());
        }
        self.file.flush()?;
        self.file =
            open_append_file(&self.config.log_path_for(today)).map_err(std::io::Error::other)?;
        self.date = today;
        Ok(())
    }
}

impl Write for DailyLogFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if self.rotate_requested.swap(false, Ordering::AcqRel) {
            self.roll_over()?;
        }
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

fn open_append_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("打开日志文件失败, path={}", path.display()))
}

pub(crate) fn build_current_log_path(directory: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    directory.join(format!("{}.{}.log", prefix, date.format("%Y-%m-%d")))
}

/// 单行日志格式
#[derive(Debug, Clone, Copy)]
enum LogLine {
    /// `[时:分:秒.毫秒] 级别 模块 > 消息`, 级别着色
    Console,
    /// `[月-日 时:分:秒.毫秒] 级别 文件:行 > 消息`
    File,
}

impl LogLine {
    fn level_color(level: &tracing::Level) -> &'static str {
        match *level {
            tracing::Level::ERROR => "\x1b[31m",
            tracing::Level::WARN => "\x1b[33m",
            tracing::Level::INFO => "\x1b[32m",
            _ => "\x1b[34m",
        }
    }
}

impl<S, N> FormatEvent<S, N> for LogLine
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
        let clock = format!(
            "{:02}:{:02}:{:02}.{:03}",
            now.hour(),
            now.minute(),
            now.second(),
            now.timestamp_subsec_millis()
        );
        match self {
            Self::Console => write!(
                writer,
                "[{}] {}{:5}\x1b[0m {} > ",
                clock,
                Self::level_color(meta.level()),
                meta.level(),
                meta.target()
            )?,
            Self::File => write!(
                writer,
                "[{:02}-{:02} {}] {:5} {}:{} > ",
                now.month(),
                now.day(),
                clock,
                meta.level(),
                meta.file().unwrap_or(meta.target()),
                meta.line().unwrap_or(0)
            )?,
        }
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
