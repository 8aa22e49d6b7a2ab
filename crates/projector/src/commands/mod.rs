//! Subcommand handlers

use anyhow::{Context, Result};
use clap::Args;
use projection_config::{EnvContext, SETTINGS_FILE, Services, Settings, load_settings};
use projection_core::{Workspace, load_services};
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod classify;
pub mod nginx;
pub mod records;

/// Where a run reads its inputs from
#[derive(Args, Debug, Clone)]
pub struct WorkspaceArgs {
    /// Directory holding templates, manifests and generated files
    #[arg(long)]
    pub workspace_path: PathBuf,

    /// Manifest directory relative to the workspace; all manifests in it are merged
    #[arg(long)]
    pub output_subdir: Option<PathBuf>,
}

/// Loaded inputs shared by every subcommand
pub struct Session {
    pub workspace: Workspace,
    pub settings: Settings,
    pub services: Services,
}

impl Session {
    pub fn open(args: &WorkspaceArgs, settings_path: Option<&Path>) -> Result<Self> {
        let workspace = Workspace::new(&args.workspace_path);
        let env = EnvContext::from_process();

        let settings_path = settings_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workspace.join(SETTINGS_FILE));
        let settings = load_settings(&settings_path, &env)
            .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

        let services = load_services(&workspace, &settings, args.output_subdir.as_deref(), &env)
            .context("Failed to load service manifests")?;
        debug!(services = services.len(), workspace = %workspace.root().display(), "Loaded inputs");

        Ok(Self {
            workspace,
            settings,
            services,
        })
    }
}
