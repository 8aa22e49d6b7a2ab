use super::{Session, WorkspaceArgs};
use anyhow::{Context, Result};
use clap::Args;
use projection_core::classify;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Network to classify for
    #[arg(long)]
    pub network: String,
}

pub fn run(settings_path: Option<&Path>, args: ClassifyArgs) -> Result<()> {
    let session = Session::open(&args.workspace, settings_path)?;

    // Unknown networks are rejected the same way a real run would
    session
        .settings
        .target(&args.network, None)
        .with_context(|| format!("Cannot classify for network '{}'", args.network))?;

    let classification = classify(&session.services, &args.network);
    let yaml = serde_yaml::to_string(&classification).context("Failed to render classification")?;
    print!("{yaml}");

    Ok(())
}
