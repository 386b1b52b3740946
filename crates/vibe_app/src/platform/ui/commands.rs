//! Line-oriented command language of the terminal front-end.

use std::path::PathBuf;

use thiserror::Error;
use vibe_core::widgets::{IterationStatus, LogLevel};
use vibe_core::Msg;

pub const HELP: &str = "\
Wizard:
  repo <url>            set the GitHub repository URL
  branch <name>         set the branch (blank means main)
  vibe <text|@file>     describe the feature
  planner <text|@file>  paste the planner output
  feedback <text|@file> describe what went wrong
  plan <text|@file>     paste the iteration plan
  next | back | reset   move through the wizard
  generate              generate context for this step
  iterate               start another iteration
  refine | accept | reject
  tests | commits | diff
  dismiss               hide the current notice
  save <file>           write the generated context to a file
Panels:
  logs on|off|clear     live backend logs
  logs level <level|all>, logs search <text>
  dashboard on|off      iteration dashboard
  dashboard search <text>, dashboard status <status|all>, dashboard diff <id>
  rules [list|templates], rules toggle <file>, rules import <file>
  docker                check Docker availability
Other:
  show | help | quit
Text arguments accept \\n for line breaks.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextField {
    Vibe,
    PlannerOutput,
    Feedback,
    IterationPlan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Inline(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogCommand {
    Start,
    Stop,
    Clear,
    Level(Option<LogLevel>),
    Search(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCommand {
    Start,
    Stop,
    Search(String),
    Status(Option<IterationStatus>),
    Diff(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesCommand {
    List,
    Templates,
    Toggle(String),
    Import(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Wizard(Msg),
    SetText { field: TextField, source: TextSource },
    Logs(LogCommand),
    Dashboard(DashboardCommand),
    Rules(RulesCommand),
    CheckDocker,
    SaveOutput(PathBuf),
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`; type `help`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
    #[error("unknown log level `{0}`")]
    BadLevel(String),
}

pub fn parse(line: &str) -> Result<Command, ParseError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Err(ParseError::Empty),
        "repo" => Command::Wizard(Msg::RepoUrlChanged(rest.to_string())),
        "branch" => Command::Wizard(Msg::BranchChanged(rest.to_string())),
        "vibe" => set_text(TextField::Vibe, rest),
        "planner" => set_text(TextField::PlannerOutput, rest),
        "feedback" => set_text(TextField::Feedback, rest),
        "plan" => set_text(TextField::IterationPlan, rest),
        "next" => Command::Wizard(Msg::NextClicked),
        "back" => Command::Wizard(Msg::BackClicked),
        "reset" => Command::Wizard(Msg::ResetClicked),
        "generate" => Command::Wizard(Msg::GenerateClicked),
        "iterate" => Command::Wizard(Msg::StartIterationClicked),
        "refine" => Command::Wizard(Msg::RefineClicked),
        "accept" => Command::Wizard(Msg::RefineAccepted),
        "reject" => Command::Wizard(Msg::RefineRejected),
        "tests" => Command::Wizard(Msg::RunTestsClicked),
        "commits" => Command::Wizard(Msg::ViewCommitsClicked),
        "diff" => Command::Wizard(Msg::ViewDiffClicked),
        "dismiss" => Command::Wizard(Msg::NoticeDismissed),
        "logs" => Command::Logs(parse_logs(rest)?),
        "dashboard" => Command::Dashboard(parse_dashboard(rest)?),
        "rules" => Command::Rules(parse_rules(rest)?),
        "docker" => Command::CheckDocker,
        "save" if rest.is_empty() => return Err(ParseError::MissingArgument("save")),
        "save" => Command::SaveOutput(PathBuf::from(rest)),
        "show" => Command::Show,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn set_text(field: TextField, rest: &str) -> Command {
    let source = match rest.strip_prefix('@') {
        Some(path) if !path.trim().is_empty() => TextSource::File(PathBuf::from(path.trim())),
        _ => TextSource::Inline(rest.replace("\\n", "\n")),
    };
    Command::SetText { field, source }
}

fn split_sub(rest: &str) -> (String, &str) {
    match rest.split_once(char::is_whitespace) {
        Some((sub, arg)) => (sub.to_ascii_lowercase(), arg.trim()),
        None => (rest.to_ascii_lowercase(), ""),
    }
}

fn parse_logs(rest: &str) -> Result<LogCommand, ParseError> {
    let (sub, arg) = split_sub(rest);
    Ok(match sub.as_str() {
        "" | "on" => LogCommand::Start,
        "off" => LogCommand::Stop,
        "clear" => LogCommand::Clear,
        "search" => LogCommand::Search(arg.to_string()),
        "level" => match arg {
            "" => return Err(ParseError::MissingArgument("logs level")),
            "all" => LogCommand::Level(None),
            raw => LogCommand::Level(Some(
                LogLevel::parse(raw).ok_or_else(|| ParseError::BadLevel(raw.to_string()))?,
            )),
        },
        other => return Err(ParseError::Unknown(format!("logs {other}"))),
    })
}

fn parse_dashboard(rest: &str) -> Result<DashboardCommand, ParseError> {
    let (sub, arg) = split_sub(rest);
    Ok(match sub.as_str() {
        "" | "on" => DashboardCommand::Start,
        "off" => DashboardCommand::Stop,
        "search" => DashboardCommand::Search(arg.to_string()),
        "status" => match arg {
            "" | "all" => DashboardCommand::Status(None),
            raw => DashboardCommand::Status(Some(IterationStatus::parse(Some(raw)))),
        },
        "diff" if arg.is_empty() => return Err(ParseError::MissingArgument("dashboard diff")),
        "diff" => DashboardCommand::Diff(arg.to_string()),
        other => return Err(ParseError::Unknown(format!("dashboard {other}"))),
    })
}

fn parse_rules(rest: &str) -> Result<RulesCommand, ParseError> {
    let (sub, arg) = split_sub(rest);
    Ok(match sub.as_str() {
        "" | "list" => RulesCommand::List,
        "templates" => RulesCommand::Templates,
        "toggle" if arg.is_empty() => return Err(ParseError::MissingArgument("rules toggle")),
        "toggle" => RulesCommand::Toggle(arg.to_string()),
        "import" if arg.is_empty() => return Err(ParseError::MissingArgument("rules import")),
        "import" => RulesCommand::Import(arg.to_string()),
        other => return Err(ParseError::Unknown(format!("rules {other}"))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wizard_words_map_to_messages() {
        assert_eq!(parse("next"), Ok(Command::Wizard(Msg::NextClicked)));
        assert_eq!(parse("  Generate "), Ok(Command::Wizard(Msg::GenerateClicked)));
        assert_eq!(
            parse("repo https://github.com/acme/widgets"),
            Ok(Command::Wizard(Msg::RepoUrlChanged(
                "https://github.com/acme/widgets".to_string()
            )))
        );
        assert_eq!(
            parse("branch"),
            Ok(Command::Wizard(Msg::BranchChanged(String::new())))
        );
    }

    #[test]
    fn text_fields_take_inline_text_or_files() {
        assert_eq!(
            parse("vibe Add dark mode\\nto settings"),
            Ok(Command::SetText {
                field: TextField::Vibe,
                source: TextSource::Inline("Add dark mode\nto settings".to_string()),
            })
        );
        assert_eq!(
            parse("planner @plan.md"),
            Ok(Command::SetText {
                field: TextField::PlannerOutput,
                source: TextSource::File(PathBuf::from("plan.md")),
            })
        );
    }

    #[test]
    fn panel_commands() {
        assert_eq!(parse("logs"), Ok(Command::Logs(LogCommand::Start)));
        assert_eq!(
            parse("save out/context.md"),
            Ok(Command::SaveOutput(PathBuf::from("out/context.md")))
        );
        assert_eq!(
            parse("logs level warn"),
            Ok(Command::Logs(LogCommand::Level(Some(LogLevel::Warning))))
        );
        assert_eq!(parse("logs level all"), Ok(Command::Logs(LogCommand::Level(None))));
        assert_eq!(
            parse("dashboard status failed"),
            Ok(Command::Dashboard(DashboardCommand::Status(Some(
                IterationStatus::Failed
            ))))
        );
        assert_eq!(
            parse("rules toggle my_rule.md"),
            Ok(Command::Rules(RulesCommand::Toggle("my_rule.md".to_string())))
        );
    }

    #[test]
    fn bad_input_is_reported() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert_eq!(parse("launch"), Err(ParseError::Unknown("launch".to_string())));
        assert_eq!(
            parse("logs level loud"),
            Err(ParseError::BadLevel("loud".to_string()))
        );
        assert_eq!(
            parse("rules import"),
            Err(ParseError::MissingArgument("rules import"))
        );
    }
}
