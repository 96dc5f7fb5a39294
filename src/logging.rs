use std::path::Path;

use anyhow::Context;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

use crate::config;

/// Opt-in logger for applications embedding this crate.
///
/// The library itself only emits through the `log` facade and installs nothing; without a
/// logger, log calls are no-ops. `spec` is a flexi_logger/env_logger style spec such as
/// `"info"` or `"header_tools=debug"`. With `log_dir`, logs go to a rotating file there and
/// warnings are duplicated to stderr; without it, everything goes to stderr.
///
/// Keep the returned handle alive until the program exits so buffered lines are flushed.
pub fn init_logging(spec: &str, log_dir: Option<&Path>) -> anyhow::Result<LoggerHandle> {
    let logger = Logger::try_with_str(spec)
        .with_context(|| format!("invalid log spec {spec:?}"))?
        .format(flexi_logger::detailed_format);

    let logger = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed creating log dir {}", dir.display()))?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(config::logging::LOG_FILE_NAME))
                .rotate(
                    Criterion::Size(config::logging::LOG_ROTATE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(config::logging::LOG_ROTATE_KEEP_FILES),
                )
                .duplicate_to_stderr(Duplicate::Warn)
        }
        None => logger.log_to_stderr(),
    };

    let handle = logger.start().context("failed to start logger")?;

    log::info!("header-tools {} logging started", config::CRATE_VERSION);
    Ok(handle)
}
