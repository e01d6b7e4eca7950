//! Ambient logging setup (`SPEC_FULL.md` §2). Initializes a global
//! `tracing` subscriber: compact formatting to stdout, optionally
//! duplicated to a daily-rolling log file, filtered by `RUST_LOG` (falling
//! back to a configured default directive).

use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// Where, if anywhere, logs are duplicated on disk.
pub struct LogFileConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

pub struct TracingOptions {
    /// Default level when `RUST_LOG` is unset.
    pub default_level: LevelFilter,
    pub disk_logging: Option<LogFileConfig>,
}

impl Default for TracingOptions {
    fn default() -> Self {
        Self { default_level: LevelFilter::INFO, disk_logging: None }
    }
}

/// Installs the process-global tracing subscriber. Call once at startup;
/// a second call panics (`tracing_subscriber::util::SubscriberInitExt::init`
/// enforces this).
pub fn configure_tracing(opts: TracingOptions) {
    let env_filter = EnvFilter::builder().with_default_directive(opts.default_level.into()).from_env_lossy();

    let format = tracing_subscriber::fmt::format::Format::default().with_line_number(true).with_file(true).with_target(false).compact();

    let writer = match opts.disk_logging {
        Some(cfg) => {
            let roller = tracing_appender::rolling::daily(cfg.directory, cfg.file_prefix);
            BoxMakeWriter::new(std::io::stdout.and(roller))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::fmt().with_writer(writer).event_format(format).with_env_filter(env_filter).init();
}
