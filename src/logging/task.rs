use super::LoggingConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, TimeZone, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, error};

/// 立即执行一次维护; 若当前线程处于 tokio 运行时内, 再启动后台翻滚任务
///
/// 命令行工具这类短进程没有运行时, 只做启动时的一次维护.
pub(super) fn start_log_maintenance(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    if let Err(err) = ensure_current_log_file(&config) {
        error!("初始化当前日志文件失败: {}", err);
    }
    match cleanup_logs(&config) {
        Ok(summary) => debug!(
            "日志维护: 删除 {} 个过期文件, 压缩 {} 个历史文件",
            summary.removed, summary.compressed
        ),
        Err(err) => error!("启动时清理日志失败: {}", err),
    }

    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!("未检测到 tokio 运行时, 跳过后台日志维护任务");
        return;
    };
    handle.spawn(maintenance_loop(config, rotate_requested));
}

async fn maintenance_loop(config: LoggingConfig, rotate_requested: Arc<AtomicBool>) {
    let mut cleanup_interval =
        tokio::time::interval(Duration::from_secs(config.cleanup_interval_seconds.max(1)));
    // 第一次 tick 立即完成, 启动时的维护已经做过
    cleanup_interval.tick().await;

    let mut next_rollover_at = next_rollover_or_retry(Local::now());
    loop {
        tokio::select! {
            _ = cleanup_interval.tick() => {
                if let Err(err) = cleanup_logs(&config) {
                    error!("清理日志失败: {}", err);
                }
            }
            _ = tokio::time::sleep_until(next_rollover_at) => {
                match ensure_current_log_file(&config) {
                    Ok(()) => rotate_requested.store(true, Ordering::Release),
                    Err(err) => error!("日志翻滚失败: {}", err),
                }
                if let Err(err) = cleanup_logs(&config) {
                    error!("翻滚后清理日志失败: {}", err);
                }
                next_rollover_at = next_rollover_or_retry(Local::now());
            }
        }
    }
}

fn next_rollover_or_retry(now: DateTime<Local>) -> tokio::time::Instant {
    match compute_next_rollover(now) {
        Ok(after) => tokio::time::Instant::now() + after,
        Err(err) => {
            error!("计算下一次翻滚时间失败: {}", err);
            tokio::time::Instant::now() + Duration::from_secs(1)
        }
    }
}

/// 创建 (或打开) 当日日志文件
fn ensure_current_log_file(config: &LoggingConfig) -> Result<()> {
    fs::create_dir_all(&config.directory)?;
    let current_path = config.log_path_for(Local::now().date_naive());
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&current_path)
        .with_context(|| format!("创建当前日志文件失败, path={}", current_path.display()))?;
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CleanupSummary {
    removed: usize,
    compressed: usize,
}

fn cleanup_logs(config: &LoggingConfig) -> Result<CleanupSummary> {
    cleanup_logs_at(config, Local::now().date_naive())
}

fn cleanup_logs_at(config: &LoggingConfig, today: NaiveDate) -> Result<CleanupSummary> {
    let mut summary = CleanupSummary::default();
    let directory = Path::new(&config.directory);
    if !directory.exists() {
        return Ok(summary);
    }

    let cutoff = today - ChronoDuration::days(config.retention_days);

    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        let Some((date, compressed)) = parse_rotated_log_name(&file_name, &config.file_prefix)
        else {
            continue;
        };

        let file_path = entry.path();
        if date < cutoff {
            if fs::remove_file(&file_path).is_ok() {
                summary.removed += 1;
            }
            continue;
        }

        if config.compress_history && !compressed && date < today {
            match compress_to_gz(&file_path) {
                Ok(()) => summary.compressed += 1,
                Err(err) => error!("压缩历史日志失败: {}", err),
            }
        }
    }

    Ok(summary)
}

fn compress_to_gz(path: &Path) -> Result<()> {
    let gz_path = PathBuf::from(format!("{}.gz", path.display()));
    if gz_path.exists() {
        return Ok(());
    }

    let mut input =
        File::open(path).with_context(|| format!("打开待压缩日志失败, path={}", path.display()))?;
    let output = File::create(&gz_path)
        .with_context(|| format!("创建压缩日志失败, path={}", gz_path.display()))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?.flush()?;

    fs::remove_file(path)
        .with_context(|| format!("删除已压缩日志失败, path={}", path.display()))?;
    Ok(())
}

fn parse_rotated_log_name(file_name: &str, prefix: &str) -> Option<(NaiveDate, bool)> {
    let with_dot = file_name.strip_prefix(prefix)?.strip_prefix('.')?;

    if let Some(date_part) = with_dot.strip_suffix(".log.gz") {
        return Some((parse_date(date_part)?, true));
    }
    if let Some(date_part) = with_dot.strip_suffix(".log") {
        return Some((parse_date(date_part)?, false));
    }
    None
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// 距离下一个本地午夜的时长
fn compute_next_rollover(now: DateTime<Local>) -> Result<Duration> {
    let next_date = now.date_naive() + ChronoDuration::days(1);
    let next_midnight = next_date
        .and_hms_opt(0, 0, 0)
        .context("计算下一次日志翻滚时间失败")?;
    let next_local = Local
        .from_local_datetime(&next_midnight)
        .earliest()
        .context("转换本地时间失败")?;
    let system_time = SystemTime::from(next_local.with_timezone(&Utc));
    Ok(system_time
        .duration_since(SystemTime::now())
        .unwrap_or(Duration::ZERO))
}
