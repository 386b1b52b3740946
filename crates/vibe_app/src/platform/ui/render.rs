//! Plain-text rendering of the view model and side panels.

use std::fmt::Write;

use chrono::DateTime;
use vibe_core::widgets::{display_name, format_size};
use vibe_core::{AppViewModel, CommitSummary, ProgressView, ResultBundle, TestReport};

use crate::platform::ui::panels::SidePanels;

const BAR_WIDTH: usize = 30;
/// Generated context is cut at this many lines on screen; `save` writes all of it.
const PREVIEW_LINES: usize = 20;
const LOG_TAIL: usize = 15;

pub fn render_wizard(view: &AppViewModel) -> String {
    let mut out = String::new();
    let steps: Vec<String> = view
        .panels
        .iter()
        .map(|panel| {
            if panel.visible {
                format!("[{}]", panel.step.number())
            } else {
                format!(" {} ", panel.step.number())
            }
        })
        .collect();
    let _ = writeln!(out, "{}", steps.join(""));
    for panel in view.visible_panels() {
        let _ = writeln!(
            out,
            "== Step {}: {} (stage {}) ==",
            panel.step.number(),
            panel.title,
            view.stage.code()
        );
    }

    let repo = if view.repo_url.is_empty() {
        "(none)"
    } else {
        view.repo_url.as_str()
    };
    let _ = writeln!(out, "Repository: {repo} @ {}", view.branch);
    if let Some(session) = &view.session_id {
        let _ = writeln!(out, "Session: {session}");
    }
    let _ = writeln!(out, "Vibe ({} chars): {}", view.vibe_chars, first_line(&view.vibe));
    if view.refining {
        let _ = writeln!(out, "Refining prompt...");
    }
    if let Some(refined) = &view.refined_vibe {
        let _ = writeln!(out, "Refined: {refined}");
        let _ = writeln!(out, "  (accept | reject)");
    }
    if view.planner_output_chars > 0 {
        let _ = writeln!(out, "Planner output: {} chars", view.planner_output_chars);
    }
    if view.feedback_chars > 0 {
        let _ = writeln!(out, "Feedback: {} chars", view.feedback_chars);
    }

    match (&view.progress, view.job_status) {
        (Some(progress), _) => render_progress(&mut out, progress),
        (None, Some(status)) => {
            let _ = writeln!(out, "Last job: {}", status.as_str());
        }
        (None, None) => {}
    }
    if let Some(output) = &view.output {
        render_output(&mut out, output);
    }
    if view.tests_running {
        let _ = writeln!(out, "Running tests...");
    }
    if let Some(tests) = &view.tests {
        render_tests(&mut out, tests);
    }
    if !view.commits.is_empty() {
        render_commits(&mut out, &view.commits);
    }
    if let Some(diff) = &view.recent_diff {
        let _ = writeln!(
            out,
            "Recent changes: +{} -{} in {} file(s)",
            diff.additions,
            diff.deletions,
            diff.files.len()
        );
        for file in &diff.files {
            let _ = writeln!(out, "  {file}");
        }
    }

    if let Some(validation) = &view.validation {
        let _ = writeln!(out, "! {validation}");
    }
    if let Some(notice) = &view.notice {
        let _ = writeln!(out, "!! {notice}  (dismiss)");
    }

    let mut actions = Vec::new();
    if view.can_go_back {
        actions.push("back");
    }
    if view.can_generate {
        actions.push("generate");
    }
    if view.can_advance {
        actions.push("next");
    }
    actions.push("reset");
    let _ = writeln!(out, "> {}", actions.join(" | "));
    out
}

fn render_progress(out: &mut String, progress: &ProgressView) {
    let filled = BAR_WIDTH * usize::from(progress.percent.min(100)) / 100;
    let _ = write!(
        out,
        "{} [{}{}] {:>3}% {}",
        progress.stage.label(),
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress.percent,
        progress.message
    );
    if progress.total > 0 {
        let _ = write!(out, " ({}/{})", progress.current, progress.total);
    }
    out.push('\n');
}

fn render_output(out: &mut String, output: &ResultBundle) {
    let _ = writeln!(
        out,
        "Generated context: {} files, {} tokens, {} skipped",
        output.files_processed, output.tokens_used, output.files_skipped
    );
    for skipped in &output.skipped_files {
        let _ = writeln!(out, "  skipped {} ({})", skipped.path, skipped.reason);
    }
    let _ = writeln!(out, "---");
    let mut lines = output.copy_text.lines();
    for line in lines.by_ref().take(PREVIEW_LINES) {
        let _ = writeln!(out, "{line}");
    }
    let rest = lines.count();
    if rest > 0 {
        let _ = writeln!(out, "... {rest} more lines");
    }
    let _ = writeln!(out, "---");
}

fn render_tests(out: &mut String, tests: &TestReport) {
    let verdict = if tests.all_passed() { "PASS" } else { "FAIL" };
    let _ = writeln!(
        out,
        "Tests {verdict}: {} passed, {} failed of {}{}",
        tests.passed,
        tests.failed,
        tests.total(),
        tests
            .framework
            .as_deref()
            .map(|framework| format!(" [{framework}]"))
            .unwrap_or_default()
    );
    for case in tests.details.iter().filter(|case| case.outcome != "passed") {
        let _ = writeln!(
            out,
            "  {} {} ({:.2}s)",
            case.outcome, case.name, case.duration_secs
        );
    }
}

fn render_commits(out: &mut String, commits: &[CommitSummary]) {
    let _ = writeln!(out, "Commits:");
    for commit in commits {
        let date = DateTime::from_timestamp(commit.timestamp, 0)
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "?".to_string());
        let _ = writeln!(
            out,
            "  {} {} {} {}",
            commit.short_sha(),
            date,
            commit.author,
            first_line(&commit.message)
        );
    }
}

pub fn render_panels(panels: &SidePanels, now: f64) -> String {
    let mut out = String::new();

    if let Some(status) = panels.log_status {
        let stats = panels.logs.stats();
        let _ = writeln!(
            out,
            "-- Logs ({status:?}): {} total, {} errors, {} warnings --",
            stats.total, stats.errors, stats.warnings
        );
        let visible = panels.logs.visible();
        let skip = visible.len().saturating_sub(LOG_TAIL);
        for line in visible.into_iter().skip(skip) {
            let _ = writeln!(out, "{} {:<8} {}", line.timestamp, line.level, line.message);
            if let Some(details) = &line.details {
                let _ = writeln!(out, "    {details}");
            }
        }
    }

    let board = &panels.board;
    if !board.iterations().is_empty() || board.current().is_some() {
        let metrics = board.metrics();
        let _ = writeln!(
            out,
            "-- Iterations{}: {} total, {:.0}% success, avg {:.1}s, {} errors --",
            if board.needs_refresh() { " (live)" } else { "" },
            metrics.total,
            metrics.success_rate,
            metrics.average_duration,
            metrics.total_errors
        );
        let trend: Vec<String> = board
            .duration_trend()
            .into_iter()
            .map(|(_, secs)| format!("{secs:.0}"))
            .collect();
        if !trend.is_empty() {
            let _ = writeln!(out, "  durations: {}", trend.join(" "));
        }
        if let Some(current) = board.current() {
            let _ = writeln!(
                out,
                "  running {} {}",
                current.short_id(),
                current
                    .elapsed(now)
                    .map(|secs| format!("{secs:.0}s"))
                    .unwrap_or_default()
            );
        }
        for record in board.visible() {
            let _ = writeln!(
                out,
                "  {} {:<12} {:>7} {}",
                record.short_id(),
                record.status.as_str(),
                record
                    .elapsed(now)
                    .map(|secs| format!("{secs:.1}s"))
                    .unwrap_or_else(|| "-".to_string()),
                record.description.as_deref().unwrap_or("")
            );
        }
    }
    if let Some((id, diff)) = &panels.iteration_diff {
        let _ = writeln!(out, "-- Diff of {id} --\n{diff}");
    }

    if !panels.rules.rules().is_empty() {
        let _ = writeln!(out, "-- Rules --");
        for rule in panels.rules.rules() {
            let mark = if panels.rules.is_selected(&rule.filename) {
                "x"
            } else {
                " "
            };
            let _ = writeln!(
                out,
                "  [{mark}] {} ({}, {})",
                display_name(&rule.filename),
                rule.filename,
                format_size(rule.size)
            );
        }
    }
    if !panels.templates.is_empty() {
        let _ = writeln!(out, "-- Rule templates --");
        for template in &panels.templates {
            let _ = writeln!(
                out,
                "  {} ({}) {}",
                template.name, template.filename, template.description
            );
        }
    }

    if let Some(docker) = panels.docker {
        let _ = writeln!(
            out,
            "Docker: {}",
            if docker { "available" } else { "unavailable" }
        );
    }
    if let Some(status) = &panels.status {
        let _ = writeln!(out, "* {status}");
    }
    out
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_core::{update, AppState, JobStatus, Msg};

    #[test]
    fn wizard_shows_current_step_and_validation() {
        let (state, _) = update(AppState::new(), Msg::NextClicked);
        let text = render_wizard(&state.view());
        assert!(text.contains("[1]"));
        assert!(text.contains("== Step 1:"));
        assert!(text.contains("! "));
        assert!(text.contains("> generate") || text.contains("> next"));
    }

    #[test]
    fn progress_bar_scales_with_percent() {
        let mut out = String::new();
        render_progress(
            &mut out,
            &ProgressView {
                stage: vibe_core::Stage::Plan,
                message: "AI is processing your request...".to_string(),
                percent: 70,
                current: 3,
                total: 10,
            },
        );
        assert!(out.contains(&"#".repeat(21)));
        assert!(out.contains(" 70%"));
        assert!(out.contains("(3/10)"));
    }

    #[test]
    fn long_output_is_previewed() {
        let mut out = String::new();
        render_output(
            &mut out,
            &ResultBundle {
                copy_text: (0..25).map(|n| format!("line {n}\n")).collect(),
                ..ResultBundle::default()
            },
        );
        assert!(out.contains("line 19"));
        assert!(!out.contains("line 20"));
        assert!(out.contains("... 5 more lines"));
    }

    #[test]
    fn finished_job_status_replaces_the_bar() {
        let view = AppViewModel {
            job_status: Some(JobStatus::Error),
            ..AppViewModel::default()
        };
        assert!(render_wizard(&view).contains("Last job: error"));
    }

    #[test]
    fn empty_panels_render_nothing() {
        assert_eq!(render_panels(&SidePanels::new(), 0.0), "");
    }
}
