//! Side panels next to the wizard: live backend logs, the iteration
//! dashboard, project rules and the Docker probe.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use vibe_client::{
    ClientEvent, IterationPayload, LogRecord, LogStreamStatus, RulePayload, RuleTemplate,
};
use vibe_core::widgets::{
    IterationBoard, IterationRecord, IterationStatus, IterationStep, LogLevel, LogLine, LogView,
    RuleEntry, RuleSelection,
};
use vibe_logging::{vibe_debug, vibe_info, vibe_warn};

#[derive(Debug, Default)]
pub struct SidePanels {
    pub logs: LogView,
    pub log_status: Option<LogStreamStatus>,
    pub board: IterationBoard,
    /// Diff of the iteration last opened on the dashboard.
    pub iteration_diff: Option<(String, String)>,
    pub rules: RuleSelection,
    pub templates: Vec<RuleTemplate>,
    pub docker: Option<bool>,
    /// Latest panel-level error or confirmation, kept apart from the wizard notice.
    pub status: Option<String>,
}

impl SidePanels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one client event into the panels. Returns whether anything
    /// visible changed.
    pub fn apply(&mut self, event: ClientEvent) -> bool {
        match event {
            ClientEvent::LogStream(status) => {
                self.log_status = Some(status);
                true
            }
            ClientEvent::LogLine(record) => self.logs.push(log_line(record)),
            ClientEvent::IterationsLoaded(Ok(history)) => {
                let iterations = history.iterations.into_iter().map(iteration_record).collect();
                let current = history.current_iteration.map(iteration_record);
                self.board.replace(iterations, current);
                true
            }
            ClientEvent::IterationsLoaded(Err(err)) => {
                vibe_debug!("Iteration history unavailable: {}", err);
                false
            }
            ClientEvent::IterationDiffLoaded {
                iteration_id,
                result,
            } => {
                match result {
                    Ok(Some(diff)) => self.iteration_diff = Some((iteration_id, diff)),
                    Ok(None) => self.status = Some("No diff available".to_string()),
                    Err(err) => self.status = Some(format!("Error loading diff: {err}")),
                }
                true
            }
            ClientEvent::RulesLoaded(Ok(rules)) => {
                self.rules.set_rules(rules.into_iter().map(rule_entry).collect());
                true
            }
            ClientEvent::RulesLoaded(Err(err)) => {
                self.status = Some(format!("Error loading rules: {err}"));
                true
            }
            ClientEvent::TemplatesLoaded(Ok(templates)) => {
                self.templates = templates;
                true
            }
            ClientEvent::TemplatesLoaded(Err(err)) => {
                self.status = Some(format!("Error loading templates: {err}"));
                true
            }
            ClientEvent::TemplateImported(Ok(name)) => {
                vibe_info!("Imported rule template as {}", name);
                self.status = Some(format!("Template imported as {name}"));
                true
            }
            ClientEvent::TemplateImported(Err(err)) => {
                self.status = Some(format!("Error importing template: {err}"));
                true
            }
            ClientEvent::DockerChecked(result) => {
                let available = result.unwrap_or_else(|err| {
                    vibe_warn!("Docker check failed: {}", err);
                    false
                });
                self.docker = Some(available);
                true
            }
            other => {
                vibe_debug!("Panels ignore {:?}", other);
                false
            }
        }
    }
}

fn log_line(record: LogRecord) -> LogLine {
    let details = record.details_text();
    LogLine {
        timestamp: record
            .timestamp
            .filter(|stamp| !stamp.is_empty())
            .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        level: record
            .level
            .as_deref()
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info),
        message: record.message,
        details,
        source: record.source,
    }
}

fn iteration_record(payload: IterationPayload) -> IterationRecord {
    IterationRecord {
        id: payload.id,
        status: IterationStatus::parse(payload.status.as_deref()),
        description: payload.description,
        start_time: payload.start_time,
        end_time: payload.end_time,
        duration: payload.duration,
        steps: payload
            .steps
            .into_iter()
            .map(|step| IterationStep {
                name: step.name,
                timestamp: step.timestamp,
                details: step.details.map(|details| match details {
                    Value::String(text) => text,
                    other => other.to_string(),
                }),
            })
            .collect(),
        errors: payload.errors.into_iter().map(|error| error.error).collect(),
    }
}

fn rule_entry(rule: RulePayload) -> RuleEntry {
    RuleEntry {
        id: rule.id,
        filename: rule.filename,
        name: rule.name,
        size: rule.size,
    }
}
