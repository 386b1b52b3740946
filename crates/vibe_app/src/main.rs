//! `vibe-coder`: terminal front-end of the Vibe Coder wizard.
mod args;
mod platform;

use clap::Parser;

use crate::args::Args;

fn main() -> anyhow::Result<()> {
    platform::run_app(Args::parse())
}
