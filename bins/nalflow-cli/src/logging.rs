//! 日志初始化模块.
//!
//! 双输出:
//! - console (stderr): 彩色, 默认 warn, `-v` 起与文件级别一致
//! - file: 无色, 默认 info, 可通过 -v/-vv 或 NALFLOW_LOG 环境变量调整
//!
//! 日志文件输出到 $cwd/logs/{prefix}.{date}.log

use chrono::{Local, Timelike};
use std::sync::OnceLock;
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, FormatEvent, FormatFields, format::Writer},
    layer::{Layer, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// 初始化日志系统
///
/// - `file_prefix`: 日志文件前缀
/// - `verbosity`: 0=info, 1=debug, 2+=trace
///
/// 日志目录不可写时只保留控制台输出.
pub fn init(file_prefix: &str, verbosity: u8) {
    let file_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let console_level = if verbosity == 0 { "warn" } else { file_level };

    let console_layer = fmt::Layer::default()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .event_format(LineFormatter { color: true })
        .with_filter(EnvFilter::new(console_level));

    let file_layer = open_file_appender(file_prefix).map(|appender| {
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        LOG_GUARD.set(guard).ok();
        let file_filter =
            EnvFilter::try_from_env("NALFLOW_LOG").unwrap_or_else(|_| EnvFilter::new(file_level));
        fmt::Layer::default()
            .with_writer(non_blocking)
            .with_ansi(false)
            .event_format(LineFormatter { color: false })
            .with_filter(file_filter)
    });

    Registry::default()
        .with(console_layer)
        .with(file_layer)
        .init();
}

fn open_file_appender(file_prefix: &str) -> Option<tracing_appender::rolling::RollingFileAppender> {
    std::fs::create_dir_all("logs").ok()?;
    tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(file_prefix)
        .filename_suffix("log")
        .build("logs")
        .ok()
}

/// 单行格式: 时间戳 + 级别 + 模块 + 消息
struct LineFormatter {
    color: bool,
}

impl<S, N> FormatEvent<S, N> for LineFormatter
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
        if self.color {
            let color = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                _ => "\x1b[34m",
            };
            write!(writer, "{}{:5}\x1b[0m ", color, meta.level())?;
        } else {
            write!(writer, "{:5} ", meta.level())?;
        }
        write!(writer, "{} > ", meta.target())?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
