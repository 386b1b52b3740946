//! Self-contained models for the side panels. None of them share state with
//! the wizard or with each other.
mod iterations;
mod log_view;
mod rules;

pub use iterations::{
    IterationBoard, IterationFilter, IterationMetrics, IterationRecord, IterationStatus,
    IterationStep, DURATION_TREND_LEN,
};
pub use log_view::{LogFilter, LogLevel, LogLine, LogStats, LogView, MAX_LOG_LINES};
pub use rules::{display_name, format_size, RuleEntry, RuleSelection};
