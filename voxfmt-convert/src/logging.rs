//! Logging to stderr.

use anyhow::Context as _;
use log::Log as _;

/// A [`clap::Args`] struct for options controlling log output to stderr.
#[derive(Clone, Debug, Default, clap::Args)]
#[expect(clippy::module_name_repetitions)]
pub struct LoggingArgs {
    /// Additional logging to stderr.
    #[arg(long = "verbose", short = 'v')]
    pub verbose: bool,

    /// Remove timestamps from logs so that they are deterministic.
    ///
    /// This option is intended for internal tests only.
    #[arg(long = "simplify-log-format", hide = true)]
    pub simplify_log_format: bool,
}

/// Install a [`log`] global logger based on user-provided `options`.
pub fn install(options: &LoggingArgs) -> Result<(), anyhow::Error> {
    use log::LevelFilter::{Debug, Error, Info, Off};

    let &LoggingArgs {
        verbose,
        simplify_log_format,
    } = options;

    let logger = simplelog::WriteLogger::new(
        if verbose { Debug } else { Info },
        simplelog::ConfigBuilder::new()
            .set_target_level(Off)
            .set_location_level(Off)
            .set_time_level(if simplify_log_format { Off } else { Error })
            .build(),
        std::io::stderr(),
    );
    let max_level = simplelog::SharedLogger::level(&*logger);

    log::set_boxed_logger(Box::new(ConvertLogger { stderr_logger: logger }))
        .context("failed to initialize logging")?;
    log::set_max_level(max_level);
    Ok(())
}

/// [`log::Log`] implementation that [`install()`] registers globally.
struct ConvertLogger {
    stderr_logger: Box<simplelog::WriteLogger<std::io::Stderr>>,
}

impl log::Log for ConvertLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        standard_filter(metadata) && self.stderr_logger.enabled(metadata)
    }

    fn log(&self, record: &log::Record<'_>) {
        if standard_filter(record.metadata()) {
            self.stderr_logger.log(record);
        }
    }

    fn flush(&self) {
        self.stderr_logger.flush();
    }
}

/// Below warnings, only our own crates' messages are shown; the image decoder
/// and compression crates are noisy at debug level.
pub(crate) fn standard_filter(metadata: &log::Metadata<'_>) -> bool {
    metadata.level() <= log::Level::Warn || metadata.target().starts_with("voxfmt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter() {
        let metadata = |target, level| log::Metadata::builder().target(target).level(level).build();
        assert!(standard_filter(&metadata("voxfmt_port::qb", log::Level::Debug)));
        assert!(!standard_filter(&metadata("png::decoder", log::Level::Debug)));
        assert!(standard_filter(&metadata("png::decoder", log::Level::Warn)));
    }
}
