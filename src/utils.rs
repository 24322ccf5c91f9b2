use std::path::PathBuf;

use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

/// 获取当前时间
pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Milliseconds since the unix epoch, used to make blob paths unique.
pub fn unix_millis() -> i128 {
    now_utc().unix_timestamp_nanos() / 1_000_000
}

/// 初始化日志
pub fn init_log(log: Option<PathBuf>) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber_builder = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true);
    let (non_blocking, guard) = if let Some(log) = log {
        // output to file，daily rotate, non-blocking
        if !log.is_dir() {
            anyhow::bail!("log path {} is not a directory", log.display());
        }
        let file_appender = tracing_appender::rolling::daily(log, "elders_wisdom.log");
        tracing_appender::non_blocking(file_appender)
    } else {
        // output to stdout
        tracing_appender::non_blocking(std::io::stdout())
    };
    tracing::subscriber::set_global_default(
        subscriber_builder.with_writer(non_blocking).finish(),
    )?;
    Ok(guard)
}

/// Lowercase, dash-separated form of a label, for storage paths.
pub fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[test]
fn slug_collapses_separators() {
    assert_eq!(slug("Elder Story"), "elder-story");
    assert_eq!(slug("  INT-3_DAMD "), "int-3-damd");
    assert_eq!(slug("cover"), "cover");
}
