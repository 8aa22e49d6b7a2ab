use super::{Session, WorkspaceArgs};
use anyhow::{Context, Result};
use clap::Args;
use projection_core::{CommandBuild, NginxOptions, project_nginx};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Args, Debug)]
pub struct NginxArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Network the proxy serves
    #[arg(long)]
    pub network: String,

    /// Domain suffix, overriding the network table
    #[arg(long)]
    pub domain_name: Option<String>,

    /// Prefix for generated file names
    #[arg(long, default_value = "")]
    pub output_prefix: String,

    /// Base record file; names it defines get no server block
    #[arg(long)]
    pub base_file: Option<PathBuf>,

    /// Write the intermediate payloads without running the external build
    #[arg(long)]
    pub skip_build: bool,
}

pub async fn run(settings_path: Option<&Path>, args: NginxArgs) -> Result<()> {
    let session = Session::open(&args.workspace, settings_path)?;
    let build = CommandBuild::from_settings(&session.settings.build);

    let options = NginxOptions {
        network: args.network,
        domain_name: args.domain_name,
        output_prefix: args.output_prefix,
        base_file: args.base_file,
        skip_build: args.skip_build,
    };

    let artifacts = project_nginx(
        &session.workspace,
        &session.settings,
        &session.services,
        &options,
        &build,
    )
    .await
    .with_context(|| format!("Failed to generate nginx config for network '{}'", options.network))?;

    for artifact in &artifacts {
        info!(
            kind = %artifact.kind,
            blocks = artifact.blocks,
            output = %artifact.output.display(),
            "Generated nginx config"
        );
    }

    Ok(())
}
