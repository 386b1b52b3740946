use std::sync::Once;

use vibe_core::{update, AppState, Effect, Msg, Stage, Step, ValidationError};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(vibe_logging::initialize_for_tests);
}

fn apply(state: AppState, msgs: Vec<Msg>) -> (AppState, Vec<Effect>) {
    msgs.into_iter().fold((state, Vec::new()), |(state, mut all), msg| {
        let (state, effects) = update(state, msg);
        all.extend(effects);
        (state, all)
    })
}

fn described() -> AppState {
    let (state, _) = apply(
        AppState::new(),
        vec![
            Msg::RepoUrlChanged("https://github.com/acme/widgets".to_string()),
            Msg::VibeChanged("add dark mode".to_string()),
        ],
    );
    state
}

fn has_network_effect(effects: &[Effect]) -> bool {
    effects.iter().any(|effect| {
        !matches!(
            effect,
            Effect::PersistSnapshot(_) | Effect::ClearSnapshot | Effect::CancelJob { .. }
        )
    })
}

#[test]
fn advance_without_vibe_is_rejected() {
    init_logging();
    let (state, _) = apply(
        AppState::new(),
        vec![Msg::RepoUrlChanged("https://github.com/acme/widgets".to_string())],
    );

    let (state, effects) = update(state, Msg::NextClicked);

    assert_eq!(state.step(), Step::Describe);
    assert_eq!(state.validation(), Some(&ValidationError::MissingVibe));
    assert!(state.view().validation.is_some());
    assert!(effects.is_empty());
}

#[test]
fn advance_with_malformed_url_is_rejected_without_network() {
    init_logging();
    let (state, _) = apply(
        AppState::new(),
        vec![
            Msg::RepoUrlChanged("not-a-url".to_string()),
            Msg::VibeChanged("add dark mode".to_string()),
        ],
    );

    let (state, effects) = update(state, Msg::NextClicked);
    assert_eq!(state.step(), Step::Describe);
    assert_eq!(state.validation(), Some(&ValidationError::InvalidRepoUrl));
    assert!(!has_network_effect(&effects));

    let (state, effects) = update(state, Msg::GenerateClicked);
    assert_eq!(state.step(), Step::Describe);
    assert!(!has_network_effect(&effects));
    assert!(state.job().is_none());
}

#[test]
fn every_rejected_advance_keeps_the_step() {
    init_logging();
    // Walk to each gated step with its field left empty.
    let (state, _) = apply(described(), vec![Msg::NextClicked, Msg::NextClicked]);
    assert_eq!(state.step(), Step::PlannerOutput);
    let (state, _) = update(state, Msg::NextClicked);
    assert_eq!(state.step(), Step::PlannerOutput);
    assert_eq!(state.validation(), Some(&ValidationError::MissingPlannerOutput));

    let (state, _) = apply(
        state,
        vec![
            Msg::PlannerOutputChanged("plan".to_string()),
            Msg::NextClicked,
            Msg::NextClicked,
        ],
    );
    assert_eq!(state.step(), Step::Feedback);
    let (state, _) = update(state, Msg::NextClicked);
    assert_eq!(state.step(), Step::Feedback);
    assert_eq!(state.validation(), Some(&ValidationError::MissingFeedback));
}

#[test]
fn valid_advance_shows_exactly_one_panel_and_persists() {
    init_logging();
    let state = described();

    let (state, effects) = update(state, Msg::NextClicked);

    assert_eq!(state.step(), Step::PlanContext);
    let view = state.view();
    let visible: Vec<_> = view.visible_panels().map(|panel| panel.step).collect();
    assert_eq!(visible, vec![Step::PlanContext]);
    assert_eq!(view.panels.len(), Step::ALL.len());
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::PersistSnapshot(snapshot) if snapshot.current_step == 2
    )));
}

#[test]
fn one_panel_visible_after_any_transition() {
    init_logging();
    let mut state = described();
    let transitions = [
        Msg::NextClicked,
        Msg::NextClicked,
        Msg::BackClicked,
        Msg::BackClicked,
        Msg::BackClicked,
        Msg::NextClicked,
    ];
    for msg in transitions {
        state = update(state, msg).0;
        assert_eq!(state.view().visible_panels().count(), 1);
        let visible = state.view().visible_panels().next().map(|panel| panel.step);
        assert_eq!(visible, Some(state.step()));
    }
}

#[test]
fn retreat_stops_at_first_step() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::BackClicked);
    assert_eq!(state.step(), Step::Describe);
    assert!(effects.is_empty());
    assert!(!state.view().can_go_back);
}

#[test]
fn stage_follows_step() {
    init_logging();
    let (state, _) = apply(described(), vec![Msg::NextClicked]);
    assert_eq!(state.stage(), Stage::Plan);
    let (state, _) = update(state, Msg::NextClicked);
    assert_eq!(state.stage(), Stage::Code);
}

#[test]
fn reset_clears_state_and_snapshot() {
    init_logging();
    let (state, _) = apply(described(), vec![Msg::NextClicked]);

    let (state, effects) = update(state, Msg::ResetClicked);

    assert_eq!(state.step(), Step::Describe);
    assert_eq!(state.repo_url(), "");
    assert_eq!(state.branch(), "main");
    assert_eq!(effects, vec![Effect::ClearSnapshot]);
}

#[test]
fn changing_repository_drops_refined_vibe() {
    init_logging();
    let (state, effects) = update(described(), Msg::RefineClicked);
    let request = match effects.as_slice() {
        [Effect::RefinePrompt { request, .. }] => *request,
        other => panic!("unexpected effects {other:?}"),
    };
    let (state, _) = update(
        state,
        Msg::RefineDone {
            request,
            result: Ok("Add a dark mode toggle to the settings page".to_string()),
        },
    );
    assert!(state.refined_vibe().is_some());

    let (state, _) = update(
        state,
        Msg::RepoUrlChanged("https://github.com/acme/gadgets".to_string()),
    );
    assert_eq!(state.refined_vibe(), None);
}

#[test]
fn accepting_refined_vibe_replaces_vibe() {
    init_logging();
    let (state, effects) = update(described(), Msg::RefineClicked);
    let Some(Effect::RefinePrompt { request, prompt, .. }) = effects.first().cloned() else {
        panic!("expected refine effect");
    };
    assert_eq!(prompt, "add dark mode");

    let (state, _) = update(
        state,
        Msg::RefineDone {
            request,
            result: Ok("Add a dark mode toggle".to_string()),
        },
    );
    let (state, effects) = update(state, Msg::RefineAccepted);

    assert_eq!(state.vibe(), "Add a dark mode toggle");
    assert_eq!(state.refined_vibe(), None);
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::PersistSnapshot(_))));
}

#[test]
fn refine_without_vibe_is_a_validation_error() {
    init_logging();
    let (state, effects) = update(AppState::new(), Msg::RefineClicked);
    assert_eq!(state.validation(), Some(&ValidationError::NothingToRefine));
    assert!(effects.is_empty());
}

#[test]
fn vibe_pointing_at_other_repository_blocks_generation() {
    init_logging();
    let (state, _) = apply(
        described(),
        vec![
            Msg::VibeChanged("port https://github.com/other/thing features".to_string()),
            Msg::NextClicked,
        ],
    );
    assert_eq!(state.step(), Step::PlanContext);

    let (state, effects) = update(state, Msg::GenerateClicked);
    assert_eq!(
        state.validation(),
        Some(&ValidationError::VibeReferencesOtherRepo)
    );
    assert!(!has_network_effect(&effects));
}

#[test]
fn blank_branch_falls_back_to_main() {
    init_logging();
    let (state, _) = apply(
        described(),
        vec![
            Msg::BranchChanged("develop".to_string()),
            Msg::BranchChanged("   ".to_string()),
        ],
    );
    assert_eq!(state.branch(), "main");
}

#[test]
fn commits_remember_latest_sha() {
    init_logging();
    let (state, effects) = update(described(), Msg::ViewCommitsClicked);
    let request = match effects.as_slice() {
        [Effect::FetchCommits { request, branch, .. }] => {
            assert_eq!(branch, "main");
            *request
        }
        other => panic!("unexpected effects {other:?}"),
    };

    let (state, effects) = update(
        state,
        Msg::CommitsLoaded {
            request,
            result: Ok(vec![vibe_core::CommitSummary {
                sha: "0123456789abcdef".to_string(),
                author: "dev".to_string(),
                timestamp: 1_700_000_000,
                message: "dark mode".to_string(),
                diff: None,
            }]),
        },
    );

    assert_eq!(state.last_commit_sha(), Some("0123456789abcdef"));
    assert_eq!(state.view().commits[0].short_sha(), "0123456");
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::PersistSnapshot(snapshot) if snapshot.last_commit_sha.as_deref() == Some("0123456789abcdef")
    )));
}

#[test]
fn diff_needs_a_known_commit() {
    init_logging();
    let (state, effects) = update(described(), Msg::ViewDiffClicked);
    assert_eq!(state.validation(), Some(&ValidationError::NoCommitSelected));
    assert!(effects.is_empty());
}
