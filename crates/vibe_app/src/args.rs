use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use vibe_client::{ClientSettings, StatusRoute, StoreSettings, SubmitRoute};
use vibe_core::WizardConfig;

use crate::platform::logging::LogDestination;

/// Terminal wizard that turns a feature idea into LLM-ready context bundles
/// for a GitHub repository, backed by a Vibe Coder server.
#[derive(Parser, Debug)]
#[command(version, about, name = "vibe-coder")]
pub struct Args {
    /// Base URL of the backend
    #[arg(long, env = "VIBE_CODER_SERVER", default_value = "http://127.0.0.1:5000")]
    pub server: String,

    /// Directory where wizard progress is kept between runs
    #[arg(long, default_value = ".vibe_coder")]
    pub state_dir: PathBuf,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogDestination::File)]
    pub log: LogDestination,

    /// Log at debug level
    #[arg(long, short)]
    pub verbose: bool,

    /// Also keep pasted planner output in the saved state
    #[arg(long)]
    pub persist_planner_output: bool,

    /// Endpoint family streaming job progress
    #[arg(long, value_enum, default_value_t = StatusRouteArg::JobStatus)]
    pub status_route: StatusRouteArg,

    /// Endpoint used to submit generation jobs
    #[arg(long, value_enum, default_value_t = SubmitRouteArg::GenerateContext)]
    pub submit_route: SubmitRouteArg,

    /// Size limit of the state directory in bytes
    #[arg(long, default_value_t = StoreSettings::default().quota_bytes)]
    pub quota_bytes: u64,

    /// Seconds between iteration dashboard refreshes
    #[arg(long, default_value_t = 5)]
    pub poll_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusRouteArg {
    /// /api/job_status/{id}
    JobStatus,
    /// /api/status/{id}
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SubmitRouteArg {
    /// JSON to /api/generate_context
    GenerateContext,
    /// Form data to /api/analyze
    Analyze,
}

impl Args {
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            status_route: match self.status_route {
                StatusRouteArg::JobStatus => StatusRoute::JobStatus,
                StatusRouteArg::Status => StatusRoute::Status,
            },
            submit_route: match self.submit_route {
                SubmitRouteArg::GenerateContext => SubmitRoute::GenerateContext,
                SubmitRouteArg::Analyze => SubmitRoute::Analyze,
            },
            dashboard_poll_interval: Duration::from_secs(self.poll_secs.max(1)),
            ..ClientSettings::with_base_url(self.server.clone())
        }
    }

    pub fn wizard_config(&self) -> WizardConfig {
        WizardConfig {
            persist_planner_output: self.persist_planner_output,
        }
    }

    /// The soft cap stays below the quota.
    pub fn store_settings(&self) -> StoreSettings {
        let defaults = StoreSettings::default();
        StoreSettings {
            quota_bytes: self.quota_bytes,
            soft_cap_bytes: defaults.soft_cap_bytes.min(self.quota_bytes / 5 * 4),
        }
    }
}
