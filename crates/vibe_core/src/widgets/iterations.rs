/// How many recent durations the trend shows.
pub const DURATION_TREND_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationStatus {
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl IterationStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|status| status.trim().to_ascii_lowercase()).as_deref() {
            None | Some("") | Some("in_progress") => IterationStatus::InProgress,
            Some("completed") => IterationStatus::Completed,
            Some("failed") => IterationStatus::Failed,
            Some(other) => IterationStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            IterationStatus::InProgress => "in_progress",
            IterationStatus::Completed => "completed",
            IterationStatus::Failed => "failed",
            IterationStatus::Other(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationStep {
    pub name: String,
    pub timestamp: Option<f64>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub id: String,
    pub status: IterationStatus,
    pub description: Option<String>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub duration: Option<f64>,
    pub steps: Vec<IterationStep>,
    pub errors: Vec<String>,
}

impl IterationRecord {
    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map_or(self.id.len(), |(idx, _)| idx);
        &self.id[..end]
    }

    /// Elapsed seconds: recorded duration, or end minus start, or running
    /// time against `now` while unfinished.
    pub fn elapsed(&self, now: f64) -> Option<f64> {
        if let Some(duration) = self.duration {
            return Some(duration);
        }
        let start = self.start_time?;
        Some(self.end_time.unwrap_or(now) - start)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IterationFilter {
    pub search: String,
    /// `None` means every status.
    pub status: Option<IterationStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IterationMetrics {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    /// Percentage of completed iterations, 0 when there are none.
    pub success_rate: f64,
    pub average_duration: f64,
    pub total_errors: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct IterationBoard {
    iterations: Vec<IterationRecord>,
    current: Option<IterationRecord>,
    filter: IterationFilter,
}

impl IterationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, iterations: Vec<IterationRecord>, current: Option<IterationRecord>) {
        self.iterations = iterations;
        self.current = current;
    }

    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn current(&self) -> Option<&IterationRecord> {
        self.current.as_ref()
    }

    /// The dashboard only keeps refreshing while an iteration is running.
    pub fn needs_refresh(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|current| current.status == IterationStatus::InProgress)
    }

    pub fn set_search(&mut self, search: &str) {
        self.filter.search = search.trim().to_lowercase();
    }

    pub fn set_status_filter(&mut self, status: Option<IterationStatus>) {
        self.filter.status = status;
    }

    pub fn visible(&self) -> Vec<&IterationRecord> {
        self.iterations
            .iter()
            .filter(|record| self.matches(record))
            .collect()
    }

    fn matches(&self, record: &IterationRecord) -> bool {
        if let Some(status) = &self.filter.status {
            if &record.status != status {
                return false;
            }
        }
        if self.filter.search.is_empty() {
            return true;
        }
        let haystack = format!(
            "{} {} {}",
            record.id,
            record.description.as_deref().unwrap_or_default(),
            record.status.as_str()
        )
        .to_lowercase();
        haystack.contains(&self.filter.search)
    }

    pub fn metrics(&self) -> IterationMetrics {
        let total = self.iterations.len();
        let count = |status: IterationStatus| {
            self.iterations
                .iter()
                .filter(|record| record.status == status)
                .count()
        };
        let completed = count(IterationStatus::Completed);
        let durations: Vec<f64> = self
            .iterations
            .iter()
            .filter_map(|record| record.duration)
            .filter(|duration| *duration > 0.0)
            .collect();
        let average_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        IterationMetrics {
            total,
            completed,
            failed: count(IterationStatus::Failed),
            in_progress: count(IterationStatus::InProgress),
            success_rate: if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64 * 100.0
            },
            average_duration,
            total_errors: self.iterations.iter().map(|record| record.errors.len()).sum(),
        }
    }

    /// `(short id, duration)` of the most recent timed iterations.
    pub fn duration_trend(&self) -> Vec<(&str, f64)> {
        let timed: Vec<_> = self
            .iterations
            .iter()
            .filter_map(|record| {
                record
                    .duration
                    .filter(|duration| *duration > 0.0)
                    .map(|duration| (record.short_id(), duration))
            })
            .collect();
        let skip = timed.len().saturating_sub(DURATION_TREND_LEN);
        timed.into_iter().skip(skip).collect()
    }
}
