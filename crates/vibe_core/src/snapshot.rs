use crate::AppState;

/// Free-text fields are cut to this many characters before persisting.
pub const SNAPSHOT_TEXT_LIMIT: usize = 1000;
/// Bound for planner output when `persist_planner_output` is enabled.
pub const PLANNER_TEXT_LIMIT: usize = 64 * 1024;

/// Size-bounded projection of the wizard state that survives restarts.
///
/// Job progress, generated outputs, test results and the feedback text are
/// never part of the projection; they return to their defaults on restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardSnapshot {
    pub current_step: u8,
    pub repo_url: String,
    pub branch: String,
    pub vibe: Option<String>,
    pub refined_vibe: Option<String>,
    pub planner_output: Option<String>,
    pub session_id: Option<String>,
    pub last_commit_sha: Option<String>,
}

impl Default for WizardSnapshot {
    fn default() -> Self {
        Self {
            current_step: 1,
            repo_url: String::new(),
            branch: crate::DEFAULT_BRANCH.to_string(),
            vibe: None,
            refined_vibe: None,
            planner_output: None,
            session_id: None,
            last_commit_sha: None,
        }
    }
}

impl WizardSnapshot {
    pub(crate) fn project(state: &AppState) -> Self {
        let planner_output = if state.config().persist_planner_output {
            non_empty(state.planner_output()).map(|text| truncate(text, PLANNER_TEXT_LIMIT))
        } else {
            None
        };

        Self {
            current_step: state.step().number(),
            repo_url: state.repo_url().to_string(),
            branch: state.branch().to_string(),
            vibe: non_empty(state.vibe()).map(|text| truncate(text, SNAPSHOT_TEXT_LIMIT)),
            refined_vibe: state
                .refined_vibe()
                .and_then(non_empty)
                .map(|text| truncate(text, SNAPSHOT_TEXT_LIMIT)),
            planner_output,
            session_id: state.session_id().map(ToOwned::to_owned),
            last_commit_sha: state.last_commit_sha().map(ToOwned::to_owned),
        }
    }

    /// Identifiers only: what is left when storage is under quota pressure.
    pub fn essential(&self) -> Self {
        Self {
            current_step: self.current_step,
            repo_url: self.repo_url.clone(),
            branch: self.branch.clone(),
            vibe: None,
            refined_vibe: None,
            planner_output: None,
            session_id: self.session_id.clone(),
            last_commit_sha: self.last_commit_sha.clone(),
        }
    }

    pub fn is_essential(&self) -> bool {
        self.vibe.is_none() && self.refined_vibe.is_none() && self.planner_output.is_none()
    }
}

fn non_empty(text: &str) -> Option<&str> {
    (!text.is_empty()).then_some(text)
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
