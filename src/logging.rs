use std::path::Path;

use flexi_logger::{opt_format, Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming};

use crate::Result;

/// Starts the global logger.
///
/// `RUST_LOG` wins over `level`. Without `log_dir` everything goes to stderr;
/// with it, logs rotate at 10 MB and the last 3 files are kept.
/// The returned handle must stay alive for the lifetime of the program.
pub fn setup_logging(level: &str, log_dir: Option<&Path>) -> Result<LoggerHandle> {
    let logger = Logger::try_with_env_or_str(level)?.format(opt_format);

    let handle = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .rotate(
                Criterion::Size(10 * 1024 * 1024),
                Naming::Numbers,
                Cleanup::KeepLogFiles(3),
            )
            .start()?,
        None => logger.log_to_stderr().start()?,
    };
    Ok(handle)
}
