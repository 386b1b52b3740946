use pretty_assertions::assert_eq;
use vibe_core::{
    update, AppState, Msg, Step, WizardConfig, WizardSnapshot, PLANNER_TEXT_LIMIT,
    SNAPSHOT_TEXT_LIMIT,
};

#[test]
fn projection_truncates_free_text() {
    let long_vibe = "x".repeat(SNAPSHOT_TEXT_LIMIT + 500);
    let (state, _) = update(AppState::new(), Msg::VibeChanged(long_vibe));

    let snapshot = state.snapshot();
    assert_eq!(
        snapshot.vibe.map(|vibe| vibe.chars().count()),
        Some(SNAPSHOT_TEXT_LIMIT)
    );
}

#[test]
fn projection_skips_planner_output_unless_configured() {
    let (state, _) = update(
        AppState::new(),
        Msg::PlannerOutputChanged("plan".to_string()),
    );
    assert_eq!(state.snapshot().planner_output, None);

    let configured = AppState::with_config(WizardConfig {
        persist_planner_output: true,
    });
    let (state, _) = update(
        configured,
        Msg::PlannerOutputChanged("p".repeat(PLANNER_TEXT_LIMIT + 1)),
    );
    assert_eq!(
        state.snapshot().planner_output.map(|text| text.len()),
        Some(PLANNER_TEXT_LIMIT)
    );
}

#[test]
fn restore_uses_defaults_for_missing_fields() {
    let (state, effects) = update(
        AppState::new(),
        Msg::RestoreSnapshot(WizardSnapshot {
            current_step: 42,
            branch: "  ".to_string(),
            ..WizardSnapshot::default()
        }),
    );

    assert!(effects.is_empty());
    assert_eq!(state.step(), Step::Describe);
    assert_eq!(state.branch(), "main");
    assert_eq!(state.vibe(), "");
    assert!(state.job().is_none());
}

#[test]
fn restore_round_trips_projection() {
    let (state, _) = update(
        AppState::new(),
        Msg::RestoreSnapshot(WizardSnapshot {
            current_step: 3,
            repo_url: "https://github.com/acme/widgets".to_string(),
            branch: "develop".to_string(),
            vibe: Some("add dark mode".to_string()),
            refined_vibe: Some("Add a dark mode toggle".to_string()),
            planner_output: None,
            session_id: Some("sess-1".to_string()),
            last_commit_sha: None,
        }),
    );

    assert_eq!(state.step(), Step::PlannerOutput);
    assert_eq!(state.refined_vibe(), Some("Add a dark mode toggle"));
    assert_eq!(state.snapshot().branch, "develop");
    assert_eq!(state.snapshot().current_step, 3);
}

#[test]
fn essential_projection_drops_free_text() {
    let snapshot = WizardSnapshot {
        current_step: 4,
        repo_url: "https://github.com/acme/widgets".to_string(),
        vibe: Some("add dark mode".to_string()),
        refined_vibe: Some("refined".to_string()),
        session_id: Some("sess-1".to_string()),
        ..WizardSnapshot::default()
    };

    let essential = snapshot.essential();
    assert!(essential.is_essential());
    assert!(!snapshot.is_essential());
    assert_eq!(essential.current_step, 4);
    assert_eq!(essential.session_id.as_deref(), Some("sess-1"));
    assert_eq!(essential.vibe, None);
}

#[test]
fn editing_vibe_emits_persist_with_latest_value() {
    let (state, effects) = update(AppState::new(), Msg::VibeChanged("a".to_string()));
    let (_, more) = update(state, Msg::VibeChanged("ab".to_string()));

    let persisted: Vec<_> = effects
        .into_iter()
        .chain(more)
        .filter_map(|effect| match effect {
            vibe_core::Effect::PersistSnapshot(snapshot) => snapshot.vibe,
            _ => None,
        })
        .collect();
    assert_eq!(persisted, vec!["a".to_string(), "ab".to_string()]);
}
