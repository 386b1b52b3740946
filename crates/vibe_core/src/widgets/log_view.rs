use std::collections::VecDeque;
use std::fmt;

/// Oldest lines are evicted beyond this many.
pub const MAX_LOG_LINES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Parses backend level names; `WARN` and `WARNING` are the same level.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARN" | "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" | "FATAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
    pub details: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogFilter {
    /// `None` shows every level.
    pub level: Option<LogLevel>,
    /// Stored lowercase.
    search: String,
}

impl LogFilter {
    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn matches(&self, line: &LogLine) -> bool {
        if self.level.is_some_and(|level| level != line.level) {
            return false;
        }
        if self.search.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {}",
            line.message,
            line.details.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        haystack.contains(&self.search)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogStats {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Bounded buffer of streamed log lines with client-side filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogView {
    lines: VecDeque<LogLine>,
    capacity: usize,
    filter: LogFilter,
}

impl Default for LogView {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }
}

impl LogView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(MAX_LOG_LINES)),
            capacity,
            filter: LogFilter::default(),
        }
    }

    /// Appends a line, evicting the oldest one when full. Returns whether
    /// the new line passes the current filter.
    pub fn push(&mut self, line: LogLine) -> bool {
        let visible = self.filter.matches(&line);
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        visible
    }

    pub fn set_level_filter(&mut self, level: Option<LogLevel>) {
        self.filter.level = level;
    }

    pub fn set_search(&mut self, search: &str) {
        self.filter.search = search.trim().to_lowercase();
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    /// Lines passing the filter, re-evaluated over the whole buffer.
    pub fn visible(&self) -> Vec<&LogLine> {
        self.lines
            .iter()
            .filter(|line| self.filter.matches(line))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn stats(&self) -> LogStats {
        self.lines.iter().fold(
            LogStats {
                total: self.lines.len(),
                ..LogStats::default()
            },
            |mut stats, line| {
                match line.level {
                    LogLevel::Error | LogLevel::Critical => stats.errors += 1,
                    LogLevel::Warning => stats.warnings += 1,
                    LogLevel::Debug | LogLevel::Info => {}
                }
                stats
            },
        )
    }
}
