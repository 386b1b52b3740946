//! Process-wide logger for the `vibe-coder` binary.
//!
//! The wizard draws on stdout, so terminal logging goes to stderr and the
//! default destination is `./vibe_coder.log`.

use std::fs::File;

use clap::ValueEnum;
use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, Config, ConfigBuilder, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};

const LOG_FILE: &str = "./vibe_coder.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogDestination {
    /// ./vibe_coder.log in the working directory
    File,
    /// stderr
    Terminal,
    /// Both of the above
    Both,
}

impl LogDestination {
    fn to_file(self) -> bool {
        matches!(self, LogDestination::File | LogDestination::Both)
    }

    fn to_terminal(self) -> bool {
        matches!(self, LogDestination::Terminal | LogDestination::Both)
    }
}

pub fn initialize(destination: LogDestination, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::with_capacity(2);
    if destination.to_terminal() {
        loggers.push(TermLogger::new(
            level,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    if destination.to_file() {
        if let Some(file_logger) = file_logger(level, config) {
            loggers.push(file_logger);
        }
    }
    if loggers.is_empty() {
        return;
    }
    if CombinedLogger::init(loggers).is_err() {
        eprintln!("Warning: a logger was already installed");
    }
}

fn file_logger(level: LevelFilter, config: Config) -> Option<Box<WriteLogger<File>>> {
    match File::create(LOG_FILE) {
        Ok(file) => Some(WriteLogger::new(level, config, file)),
        Err(err) => {
            eprintln!("Warning: cannot write {LOG_FILE}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LogDestination;

    #[test]
    fn destinations_cover_file_and_terminal() {
        assert!(LogDestination::File.to_file());
        assert!(!LogDestination::File.to_terminal());
        assert!(LogDestination::Terminal.to_terminal());
        assert!(LogDestination::Both.to_file() && LogDestination::Both.to_terminal());
    }
}
