use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use vibe_client::{AtomicFileWriter, ClientEvent, ClientHandle, KeyValueStore};
use vibe_core::{update, AppState, AppViewModel, Msg, WizardConfig};
use vibe_logging::{vibe_debug, vibe_info, vibe_warn};

use crate::platform::effects::{route_event, EffectRunner, Routed};
use crate::platform::persistence::SnapshotPersistence;
use crate::platform::ui::commands::{
    self, Command, DashboardCommand, LogCommand, ParseError, RulesCommand, TextField, TextSource,
};
use crate::platform::ui::panels::SidePanels;
use crate::platform::ui::render;

/// How long the loop waits for input before draining client events.
const TICK: Duration = Duration::from_millis(75);

/// What the terminal should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Redraw,
    Print(String),
    Quit,
}

/// One wizard session: core state, its effect runner and the side panels.
pub struct Session<S: KeyValueStore> {
    state: AppState,
    runner: EffectRunner<S>,
    panels: SidePanels,
    panels_changed: bool,
}

impl<S: KeyValueStore> Session<S> {
    /// Compacts storage, then restores whatever the previous run left behind.
    pub fn start(
        config: WizardConfig,
        client: ClientHandle,
        persistence: SnapshotPersistence<S>,
    ) -> Self {
        let mut runner = EffectRunner::new(client, persistence);
        let removed = runner.persistence_mut().compact();
        if removed > 0 {
            vibe_info!("Removed {} stale state entries", removed);
        }
        let snapshot = runner.persistence_mut().load();
        vibe_info!("Resuming at step {}", snapshot.current_step);

        let mut session = Self {
            state: AppState::with_config(config),
            runner,
            panels: SidePanels::new(),
            panels_changed: false,
        };
        session.dispatch(Msg::RestoreSnapshot(snapshot));
        session
    }

    pub fn view(&self) -> AppViewModel {
        self.state.view()
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.run(effects);
    }

    /// Drains pending client events into the wizard and the panels.
    pub fn pump(&mut self) {
        while let Some(event) = self.runner.client().try_recv() {
            if matches!(event, ClientEvent::TemplateImported(Ok(_))) {
                self.runner.client().list_rules();
            }
            match route_event(event) {
                Routed::Wizard(msg) => self.dispatch(msg),
                Routed::Panel(event) => {
                    if self.panels.apply(event) {
                        self.panels_changed = true;
                    }
                }
            }
        }
    }

    /// Whether anything visible changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        let wizard = self.state.consume_dirty();
        let panels = std::mem::take(&mut self.panels_changed);
        wizard || panels
    }

    pub fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::Wizard(msg) => {
                self.dispatch(msg);
                Reply::Redraw
            }
            Command::SetText { field, source } => match read_text(source) {
                Ok(text) => {
                    self.dispatch(match field {
                        TextField::Vibe => Msg::VibeChanged(text),
                        TextField::PlannerOutput => Msg::PlannerOutputChanged(text),
                        TextField::Feedback => Msg::FeedbackChanged(text),
                        TextField::IterationPlan => Msg::IterationPlannerOutputChanged(text),
                    });
                    Reply::Redraw
                }
                Err(message) => Reply::Print(message),
            },
            Command::Logs(command) => self.handle_logs(command),
            Command::Dashboard(command) => self.handle_dashboard(command),
            Command::Rules(command) => self.handle_rules(command),
            Command::CheckDocker => {
                self.runner.client().check_docker();
                Reply::Print("Checking Docker...".to_string())
            }
            Command::SaveOutput(path) => self.save_output(&path),
            Command::Show => Reply::Redraw,
            Command::Help => Reply::Print(commands::HELP.to_string()),
            Command::Quit => Reply::Quit,
        }
    }

    fn handle_logs(&mut self, command: LogCommand) -> Reply {
        let client = self.runner.client();
        match command {
            LogCommand::Start => client.start_log_stream(),
            LogCommand::Stop => {
                client.stop_log_stream();
                self.panels.log_status = None;
            }
            LogCommand::Clear => self.panels.logs.clear(),
            LogCommand::Level(level) => self.panels.logs.set_level_filter(level),
            LogCommand::Search(text) => self.panels.logs.set_search(&text),
        }
        Reply::Redraw
    }

    fn handle_dashboard(&mut self, command: DashboardCommand) -> Reply {
        let client = self.runner.client();
        match command {
            DashboardCommand::Start => client.start_iteration_polling(),
            DashboardCommand::Stop => client.stop_iteration_polling(),
            DashboardCommand::Search(text) => self.panels.board.set_search(&text),
            DashboardCommand::Status(status) => self.panels.board.set_status_filter(status),
            DashboardCommand::Diff(id) => client.fetch_iteration_diff(id),
        }
        Reply::Redraw
    }

    fn handle_rules(&mut self, command: RulesCommand) -> Reply {
        let client = self.runner.client();
        match command {
            RulesCommand::List => client.list_rules(),
            RulesCommand::Templates => client.list_rule_templates(),
            RulesCommand::Import(filename) => client.import_rule_template(filename),
            RulesCommand::Toggle(filename) => {
                if !self
                    .panels
                    .rules
                    .rules()
                    .iter()
                    .any(|rule| rule.filename == filename)
                {
                    return Reply::Print(format!("No rule named {filename}; try `rules list`"));
                }
                self.panels.rules.toggle(&filename);
            }
        }
        Reply::Redraw
    }

    fn save_output(&self, path: &Path) -> Reply {
        let Some(output) = self.state.view().output else {
            return Reply::Print("Nothing generated on this step yet".to_string());
        };
        let Some(filename) = path.file_name().and_then(|name| name.to_str()) else {
            return Reply::Print(format!("Not a file path: {}", path.display()));
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        match AtomicFileWriter::new(dir).write(filename, &output.copy_text) {
            Ok(written) => Reply::Print(format!("Saved {}", written.display())),
            Err(err) => {
                vibe_warn!("Saving output to {} failed: {}", path.display(), err);
                Reply::Print(format!("Could not save: {err}"))
            }
        }
    }

    fn screen(&self) -> String {
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        let mut screen = render::render_wizard(&self.state.view());
        let panels = render::render_panels(&self.panels, now);
        if !panels.is_empty() {
            screen.push('\n');
            screen.push_str(&panels);
        }
        screen
    }
}

fn read_text(source: TextSource) -> Result<String, String> {
    match source {
        TextSource::Inline(text) => Ok(text),
        TextSource::File(path) => fs::read_to_string(&path)
            .map_err(|err| format!("Could not read {}: {err}", path.display())),
    }
}

/// Reads commands from stdin until `quit` or end of input.
pub fn run_terminal<S: KeyValueStore>(session: &mut Session<S>) -> anyhow::Result<()> {
    let (line_tx, line_rx) = mpsc::channel::<String>();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        vibe_warn!("Reading stdin failed: {}", err);
                        break;
                    }
                }
            }
        })
        .context("spawning input thread")?;

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", session.screen())?;
    writeln!(stdout, "Type `help` for commands.")?;
    session.take_dirty();

    loop {
        let mut redraw = false;
        match line_rx.recv_timeout(TICK) {
            Ok(line) => match commands::parse(&line) {
                Ok(command) => match session.handle(command) {
                    Reply::Redraw => redraw = true,
                    Reply::Print(text) => writeln!(stdout, "{text}")?,
                    Reply::Quit => break,
                },
                Err(ParseError::Empty) => {}
                Err(err) => writeln!(stdout, "{err}")?,
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                vibe_debug!("Input closed");
                break;
            }
        }

        session.pump();
        if session.take_dirty() || redraw {
            writeln!(stdout, "\n{}", session.screen())?;
            stdout.flush()?;
        }
    }

    vibe_info!("Session ended at step {}", session.view().step.number());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vibe_client::{ClientSettings, MemoryStore};
    use vibe_core::Step;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::platform::persistence::STATE_KEY;

    fn session_against(base_url: String, store: MemoryStore) -> Session<MemoryStore> {
        let client = ClientHandle::new(ClientSettings::with_base_url(base_url)).unwrap();
        Session::start(
            WizardConfig::default(),
            client,
            SnapshotPersistence::new(store, 4 * 1024 * 1024),
        )
    }

    async fn pump_until<S: KeyValueStore>(
        session: &mut Session<S>,
        done: impl Fn(&AppViewModel) -> bool,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            session.pump();
            if done(&session.view()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stage_a_job_runs_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate_context"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "job_id": "job-42",
                "session_id": "sess-1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/job_status/job-42"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"phase\":\"extracting\"}\n\n\
                 data: {\"status\":\"completed\",\"result\":{\"copy_text\":\"# Context for widgets\",\"stats\":{\"files_processed\":3,\"used\":1200,\"skipped\":0}}}\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let mut session = session_against(server.uri(), MemoryStore::new());
        for line in [
            "repo https://github.com/acme/widgets",
            "vibe Add dark mode to the settings page",
            "next",
            "generate",
        ] {
            assert_eq!(session.handle(commands::parse(line).unwrap()), Reply::Redraw);
        }
        assert!(session.view().progress.is_some());

        let advanced = pump_until(&mut session, |view| view.step == Step::PlannerOutput).await;
        assert!(advanced, "wizard never reached the planner output step");

        let view = session.view();
        assert_eq!(view.progress, None);
        assert_eq!(view.session_id.as_deref(), Some("sess-1"));
        let output = view.output.expect("stage A output");
        assert_eq!(output.copy_text, "# Context for widgets");
        assert_eq!(output.tokens_used, 1200);
        assert!(session.screen().contains("# Context for widgets"));

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("context.md");
        let reply = session.handle(Command::SaveOutput(target.clone()));
        assert!(matches!(reply, Reply::Print(text) if text.starts_with("Saved")));
        assert_eq!(fs::read_to_string(&target).unwrap(), "# Context for widgets");

        let saved = session.runner.persistence_mut().load();
        assert_eq!(saved.current_step, 3);
        assert_eq!(saved.session_id.as_deref(), Some("sess-1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_backend_reports_error_and_allows_retry() {
        let mut session = session_against("http://127.0.0.1:1".to_string(), MemoryStore::new());
        for line in [
            "repo https://github.com/acme/widgets",
            "vibe Add dark mode",
            "next",
            "generate",
        ] {
            session.handle(commands::parse(line).unwrap());
        }

        let failed = pump_until(&mut session, |view| view.notice.is_some()).await;
        assert!(failed, "no notice after failed submission");
        let view = session.view();
        assert_eq!(view.step, Step::PlanContext);
        assert_eq!(view.progress, None);
        assert!(view.can_generate);
        let notice = view.notice.unwrap();
        assert!(
            notice.starts_with("network error: ") || notice.starts_with("request timed out: "),
            "unexpected notice {notice}"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restores_previous_progress() {
        let mut store = MemoryStore::new();
        store
            .set(
                STATE_KEY,
                r#"{"currentStep":4,"repoUrl":"https://github.com/acme/widgets","branch":"dev","sessionId":"sess-9"}"#,
            )
            .unwrap();
        let session = session_against("http://127.0.0.1:1".to_string(), store);
        let view = session.view();
        assert_eq!(view.step, Step::CoderContext);
        assert_eq!(view.branch, "dev");
        assert_eq!(view.session_id.as_deref(), Some("sess-9"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reset_clears_saved_state() {
        let mut session = session_against("http://127.0.0.1:1".to_string(), MemoryStore::new());
        session.handle(commands::parse("repo https://github.com/acme/widgets").unwrap());
        assert!(session.runner.persistence_mut().store().get(STATE_KEY).unwrap().is_some());

        session.handle(Command::Wizard(Msg::ResetClicked));
        assert_eq!(session.runner.persistence_mut().store().get(STATE_KEY).unwrap(), None);
        assert_eq!(session.view().repo_url, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_needs_generated_output() {
        let mut session = session_against("http://127.0.0.1:1".to_string(), MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let reply = session.handle(Command::SaveOutput(dir.path().join("context.md")));
        assert_eq!(
            reply,
            Reply::Print("Nothing generated on this step yet".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_rule_toggle_is_explained() {
        let mut session = session_against("http://127.0.0.1:1".to_string(), MemoryStore::new());
        let reply = session.handle(commands::parse("rules toggle ghost.md").unwrap());
        assert!(matches!(reply, Reply::Print(text) if text.contains("ghost.md")));
        assert!(session.panels.rules.selected().is_empty());
    }
}
