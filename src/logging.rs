//! log4rs backend for the `log` macros used throughout the crate
use crate::error::{AttackError, Result};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    pub pattern: String,
    /// Also log to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            pattern: "{d(%H:%M:%S)} {l} {t} - {m}{n}".to_string(),
            file: None,
        }
    }
}

/// # Errors
/// On an unknown level, an unopenable log file or an inconsistent log4rs config
pub fn build_config(config: &LoggingConfig) -> Result<Config> {
    let level = LevelFilter::from_str(&config.level)
        .map_err(|_| AttackError::Logging(format!("unknown log level '{}'", config.level)))?;
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(&config.pattern)))
        .build();
    let mut builder =
        Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");
    if let Some(path) = &config.file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(&config.pattern)))
            .build(path)?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }
    builder
        .build(root.build(level))
        .map_err(|e| AttackError::Logging(e.to_string()))
}

/// Installs the global logger. Only the first call in a process succeeds.
///
/// # Errors
/// See [`build_config`], or if a logger is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    log4rs::init_config(build_config(config)?)
        .map(|_handle| ())
        .map_err(|e| AttackError::Logging(e.to_string()))
}
