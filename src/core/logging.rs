//! Logging initialization
//!
//! Configures the `log` facade via flexi_logger once at startup. The
//! returned handle must be kept alive for the lifetime of the process.

use flexi_logger::{FileSpec, Logger, LoggerHandle};

/// Initialize logging from startup flags
///
/// `level` accepts a log-spec string ("info", "debug", "repolens=trace", ...),
/// `format` selects "detailed" output, and `file` redirects output to a file
/// instead of stderr.
pub fn init_logging(
    level: Option<&str>,
    format: Option<&str>,
    file: Option<&str>,
) -> Result<LoggerHandle, Box<dyn std::error::Error>> {
    let mut logger = Logger::try_with_env_or_str(level.unwrap_or("info"))?;

    if format == Some("detailed") {
        logger = logger.format(flexi_logger::detailed_format);
    }

    if let Some(path) = file {
        logger = logger.log_to_file(FileSpec::try_from(path)?);
    }

    Ok(logger.start()?)
}

/// Map -v / -q counts onto a log-spec string
pub fn level_for_verbosity(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-2 => "off",
        -1 => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
