mod app;
mod effects;
pub mod logging;
mod persistence;
mod ui;

use anyhow::Context;
use vibe_client::{ClientHandle, FileStore};
use vibe_logging::vibe_info;

use crate::args::Args;
use app::Session;
use persistence::SnapshotPersistence;

/// Wires storage, client and session together and runs the terminal loop.
pub fn run_app(args: Args) -> anyhow::Result<()> {
    logging::initialize(args.log, args.verbose);
    vibe_info!("vibe-coder starting against {}", args.server);

    let store_settings = args.store_settings();
    let store = FileStore::open(args.state_dir.clone(), store_settings)
        .with_context(|| format!("opening state directory {}", args.state_dir.display()))?;
    let client = ClientHandle::new(args.client_settings())
        .with_context(|| format!("configuring backend client for {}", args.server))?;

    let persistence = SnapshotPersistence::new(store, store_settings.soft_cap_bytes);
    let mut session = Session::start(args.wizard_config(), client, persistence);
    app::run_terminal(&mut session)
}
